//! Pass-through and control modules.
//!
//! - [`Identity`] - Forwards its input unchanged
//! - [`Fail`] - Always fails, for exercising failure isolation

mod fail;
mod identity;

pub use fail::Fail;
pub use identity::Identity;
