//! Thread-safe access to one interpreter.

use crate::cache::PersistentPipeline;
use crate::interpreter::{CachedInterpreter, ExecuteOptions, ExecutionResult};
use kiln_core::error::Result;
use kiln_core::logging::BufferedCollector;
use kiln_core::pipeline::Pipeline;
use kiln_core::types::ModuleId;
use parking_lot::Mutex;
use std::sync::Arc;

/// A cloneable handle that serializes calls into one [`CachedInterpreter`].
///
/// Every method holds the lock for its whole duration, so two concurrent
/// `execute()` calls never interleave. Results are value snapshots and stay
/// valid after the lock is released.
#[derive(Clone)]
pub struct SharedInterpreter {
    inner: Arc<Mutex<CachedInterpreter>>,
    log: Arc<BufferedCollector>,
}

impl SharedInterpreter {
    /// Wrap an interpreter.
    pub fn new(interpreter: CachedInterpreter) -> Self {
        let log = Arc::clone(interpreter.log());
        Self {
            inner: Arc::new(Mutex::new(interpreter)),
            log,
        }
    }

    /// See [`CachedInterpreter::execute`].
    pub fn execute(
        &self,
        pipeline: &Pipeline,
        sinks: Option<&[ModuleId]>,
        options: ExecuteOptions,
    ) -> Result<ExecutionResult> {
        self.inner.lock().execute(pipeline, sinks, options)
    }

    /// See [`CachedInterpreter::flush`].
    pub fn flush(&self) -> usize {
        self.inner.lock().flush()
    }

    /// See [`CachedInterpreter::cleanup`].
    pub fn cleanup(&self) -> usize {
        self.inner.lock().cleanup()
    }

    /// Inspect the cache under the lock.
    pub fn with_cache<R>(&self, f: impl FnOnce(&PersistentPipeline) -> R) -> R {
        f(self.inner.lock().cache())
    }

    /// Run `f` with exclusive access to the interpreter.
    pub fn with_interpreter<R>(&self, f: impl FnOnce(&mut CachedInterpreter) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut *guard)
    }

    /// Event log, readable without taking the interpreter lock.
    pub fn log(&self) -> &Arc<BufferedCollector> {
        &self.log
    }
}

impl std::fmt::Debug for SharedInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedInterpreter")
            .field("strong_count", &Arc::strong_count(&self.inner))
            .finish()
    }
}
