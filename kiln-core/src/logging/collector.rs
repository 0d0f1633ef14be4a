//! Event sinks.
//!
//! [`BufferedCollector`] keeps the last `capacity` events in arrival order and
//! numbers them from 1. [`LogContext`] stamps events with the execution they
//! belong to before handing them over.

use super::event::{LogCategory, LogEvent};
use super::filter::LogFilter;
use crate::types::{ExecutionId, PersistentId};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Events kept by [`BufferedCollector::default`].
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Anything that accepts interpreter events.
pub trait LogCollector: Send + Sync {
    fn collect(&self, event: LogEvent);

    /// Number of events currently retained.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Callback invoked synchronously for every collected event.
pub type LogSubscriber = Arc<dyn Fn(&LogEvent) + Send + Sync>;

struct Ring {
    events: VecDeque<LogEvent>,
    next_id: u64,
}

/// Bounded in-memory event log.
pub struct BufferedCollector {
    ring: RwLock<Ring>,
    capacity: usize,
    subscribers: RwLock<Vec<LogSubscriber>>,
}

impl BufferedCollector {
    /// A capacity of zero keeps nothing but still numbers events and
    /// notifies subscribers.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: RwLock::new(Ring {
                events: VecDeque::new(),
                next_id: 1,
            }),
            capacity,
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, subscriber: LogSubscriber) {
        self.subscribers.write().push(subscriber);
    }

    pub fn query(&self, filter: &LogFilter) -> Vec<LogEvent> {
        filter.apply(self.ring.read().events.iter())
    }

    pub fn by_execution(&self, execution_id: ExecutionId) -> Vec<LogEvent> {
        self.query(&LogFilter::new().execution_id(execution_id))
    }

    /// Events about one cached module, across executions.
    pub fn by_module(&self, persistent_id: PersistentId) -> Vec<LogEvent> {
        self.query(&LogFilter::new().persistent_id(persistent_id))
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEvent> {
        self.ring.read().events.iter().rev().take(limit).cloned().collect()
    }

    /// Oldest first.
    pub fn all(&self) -> Vec<LogEvent> {
        self.ring.read().events.iter().cloned().collect()
    }

    /// Drop retained events. Numbering continues where it left off.
    pub fn clear(&self) {
        self.ring.write().events.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl LogCollector for BufferedCollector {
    fn collect(&self, mut event: LogEvent) {
        {
            let mut ring = self.ring.write();
            event.id = ring.next_id;
            ring.next_id += 1;
            if self.capacity > 0 {
                while ring.events.len() >= self.capacity {
                    ring.events.pop_front();
                }
                ring.events.push_back(event.clone());
            }
        }

        for subscriber in self.subscribers.read().iter() {
            subscriber(&event);
        }
    }

    fn len(&self) -> usize {
        self.ring.read().events.len()
    }
}

impl Default for BufferedCollector {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl fmt::Debug for BufferedCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedCollector")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}

/// Collector handle bound to one execution.
#[derive(Clone)]
pub struct LogContext {
    collector: Arc<dyn LogCollector>,
    execution_id: Option<ExecutionId>,
}

impl LogContext {
    pub fn new(collector: Arc<dyn LogCollector>) -> Self {
        Self {
            collector,
            execution_id: None,
        }
    }

    pub fn with_execution_id(self, execution_id: ExecutionId) -> Self {
        Self {
            execution_id: Some(execution_id),
            ..self
        }
    }

    pub fn execution_id(&self) -> Option<ExecutionId> {
        self.execution_id
    }

    /// Forward `event`, filling in the execution id unless it already has one.
    pub fn log(&self, mut event: LogEvent) {
        event.execution_id = event.execution_id.or(self.execution_id);
        self.collector.collect(event);
    }

    pub fn info(&self, category: LogCategory, message: impl Into<String>) {
        self.log(LogEvent::info(category, message));
    }

    pub fn warn(&self, category: LogCategory, message: impl Into<String>) {
        self.log(LogEvent::warn(category, message));
    }
}

impl fmt::Debug for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogContext")
            .field("execution_id", &self.execution_id)
            .finish_non_exhaustive()
    }
}
