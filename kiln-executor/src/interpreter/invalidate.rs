//! Cache invalidation.

use super::CachedInterpreter;
use kiln_core::error::Result;
use kiln_core::logging::{LogCategory, LogEvent};
use kiln_core::types::PersistentId;
use tracing::instrument;

impl CachedInterpreter {
    /// Remove every module whose instance refuses caching, with dependents.
    pub fn clean_non_cacheable_modules(&mut self) -> Result<Vec<PersistentId>> {
        let seeds = self.cache.non_cacheable();
        if seeds.is_empty() {
            return Ok(Vec::new());
        }
        let removed = self.clean_modules(seeds)?;
        tracing::debug!(removed = removed.len(), "Purged non-cacheable modules");
        Ok(removed)
    }

    /// Remove `seeds` and everything downstream of them, dependents first.
    ///
    /// Returns the removed ids in removal order.
    pub fn clean_modules(
        &mut self,
        seeds: impl IntoIterator<Item = PersistentId>,
    ) -> Result<Vec<PersistentId>> {
        let closure = self.cache.dependents_closure(seeds);
        let order = self.cache.removal_order(&closure)?;
        let log = self.log_context();
        for &id in &order {
            let module = self.cache.remove_module(id)?;
            log.log(
                LogEvent::debug(LogCategory::Cache, "module_removed")
                    .with_persistent_id(id)
                    .with_field("module", module.key().to_string()),
            );
        }
        Ok(order)
    }

    /// Drop the whole cache. Returns the number of modules removed.
    #[instrument(skip(self), fields(cached_modules = self.cache.len()))]
    pub fn flush(&mut self) -> usize {
        let removed = self.cache.clear();
        self.log_context().log(
            LogEvent::info(LogCategory::Cache, "flushed").with_field("removed", removed),
        );
        tracing::info!(removed, "Cache flushed");
        removed
    }

    /// Drop the whole cache and the event log.
    #[instrument(skip(self))]
    pub fn cleanup(&mut self) -> usize {
        let removed = self.cache.clear();
        self.log.clear();
        tracing::info!(removed, "Interpreter cleaned up");
        removed
    }
}
