//! Standard module library for Kiln.
//!
//! Every module lives in the `kiln.basic` package:
//!
//! ## Sources (`source::*`)
//! - [`source::IntegerSource`], [`source::FloatSource`], [`source::StringSource`]
//!
//! ## Arithmetic (`arithmetic::*`)
//! - [`arithmetic::Add`] - `a + b`
//! - [`arithmetic::Multiply`] - `a * b`
//!
//! ## Data (`data::*`)
//! - [`data::Sum`] - Total of every connected value
//! - [`data::Concat`] - String concatenation
//! - [`data::Pair`] - Tuple port unpacking
//!
//! ## Flow (`flow::*`)
//! - [`flow::Identity`] - Pass-through
//! - [`flow::Fail`] - Always fails
//!
//! ## Sinks (`sink::*`)
//! - [`sink::FileSink`] - Writes a value to disk (never cached)
//!
//! [`standard_registry`] returns a registry with all of them.

pub mod arithmetic;
pub mod data;
pub mod flow;
pub mod registry;
pub mod sink;
pub mod source;

/// Package every standard module is registered under.
pub const PACKAGE: &str = "kiln.basic";

pub use arithmetic::{Add, Multiply};
pub use data::{Concat, Pair, Sum};
pub use flow::{Fail, Identity};
pub use registry::{
    CatalogEntry, ModuleCategory, ModuleMetadata, StandardLibrary, create_standard_library,
    standard_registry,
};
pub use sink::FileSink;
pub use source::{FloatSource, IntegerSource, StringSource};

/// Prelude for commonly used types.
pub mod prelude {
    pub use crate::registry::{ModuleMetadata, create_standard_library, standard_registry};
    pub use crate::{
        Add, Concat, Fail, FileSink, FloatSource, Identity, IntegerSource, Multiply, Pair,
        StringSource, Sum,
    };
}
