//! Core types for Kiln.
//!
//! - `ModuleId` / `ConnectionId`: local ids inside one ephemeral pipeline
//! - `PersistentId` / `PersistentConnectionId`: ids of cached entries
//! - `ExecutionId`: correlation id of one `execute()` call

mod ids;

pub use ids::{
    ConnectionId, ExecutionId, IdAllocator, ModuleId, PersistentConnectionId, PersistentId,
};
