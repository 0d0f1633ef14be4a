//! Log filtering for querying collected events.

use super::event::{LogCategory, LogEvent, LogLevel};
use crate::types::{ExecutionId, PersistentId};
use serde::{Deserialize, Serialize};

/// A filter for log events. An empty filter matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFilter {
    /// Minimum log level (inclusive).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_level: Option<LogLevel>,
    /// Allowed categories (empty = all).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<LogCategory>,
    /// Filter by execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    /// Filter by cached module.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_id: Option<PersistentId>,
    /// Exact message match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Maximum number of events to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl LogFilter {
    /// Create a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set minimum log level.
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    /// Add an allowed category.
    pub fn category(mut self, category: LogCategory) -> Self {
        self.categories.push(category);
        self
    }

    /// Restrict to one execution.
    pub fn execution_id(mut self, execution_id: ExecutionId) -> Self {
        self.execution_id = Some(execution_id);
        self
    }

    /// Restrict to one cached module.
    pub fn persistent_id(mut self, persistent_id: PersistentId) -> Self {
        self.persistent_id = Some(persistent_id);
        self
    }

    /// Restrict to one message, e.g. `end_update`.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set result limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if an event matches this filter.
    pub fn matches(&self, event: &LogEvent) -> bool {
        if self.min_level.is_some_and(|min| event.level < min) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&event.category) {
            return false;
        }
        if self
            .execution_id
            .is_some_and(|id| event.execution_id != Some(id))
        {
            return false;
        }
        if self
            .persistent_id
            .is_some_and(|id| event.persistent_id != Some(id))
        {
            return false;
        }
        if let Some(ref message) = self.message {
            if event.message != *message {
                return false;
            }
        }
        true
    }

    /// Apply the filter, including the limit.
    pub fn apply<'a>(&self, events: impl Iterator<Item = &'a LogEvent>) -> Vec<LogEvent> {
        let matching = events.filter(|e| self.matches(e)).cloned();
        match self.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}
