//! Structured logging for executions.
//!
//! The interpreter emits one event per module update phase
//! (`begin_update`, `update_cached`, `end_update`) plus cache and execution
//! lifecycle events. Events land in a [`LogCollector`]; the
//! [`BufferedCollector`] keeps a bounded ring buffer that tests and the CLI
//! query with a [`LogFilter`].
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ LogEvent    │────>│ LogCollector │────>│ Subscribers   │
//! │ (with IDs)  │     │ (buffer)     │     │ (callbacks)   │
//! └─────────────┘     └──────────────┘     └───────────────┘
//! ```

mod collector;
mod event;
mod filter;

pub use collector::{
    BufferedCollector, DEFAULT_BUFFER_CAPACITY, LogCollector, LogContext, LogSubscriber,
};
pub use event::{LogCategory, LogEvent, LogLevel};
pub use filter::LogFilter;

/// Event message for a module whose update starts.
pub const BEGIN_UPDATE: &str = "begin_update";
/// Event message for a module served from the temporal cache.
pub const UPDATE_CACHED: &str = "update_cached";
/// Event message for a finished module update, successful or not.
pub const END_UPDATE: &str = "end_update";
