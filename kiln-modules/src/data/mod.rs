//! Value shaping modules.
//!
//! - [`Sum`] - Adds every value arriving on a multi-connection port
//! - [`Concat`] - Joins two values into a string
//! - [`Pair`] - Unpacks an `(integer, integer)` tuple port

mod aggregate;
mod concat;
mod pair;

pub use aggregate::Sum;
pub use concat::Concat;
pub use pair::Pair;
