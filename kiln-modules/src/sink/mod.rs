//! Modules with external side effects.
//!
//! - [`FileSink`] - Writes a value to a file on every execution

mod file;

pub use file::FileSink;
