//! Parameter-fed sources.
//!
//! Each source copies its `value` input, normally set by a parameter
//! function, to its `value` output after checking the type.

use crate::PACKAGE;
use crate::registry::{ModuleCategory, ModuleMetadata};
use kiln_core::error::ComputeError;
use kiln_core::traits::{ComputeContext, Module, ModuleInfo, Port, PortType};
use kiln_core::value::Value;

fn source_info(name: &str, port_type: PortType) -> ModuleInfo {
    ModuleInfo::new(PACKAGE, name)
        .with_description(format!("Emit a constant {port_type}"))
        .with_inputs(vec![Port::input("value", port_type)])
        .with_outputs(vec![Port::output("value", port_type)])
}

/// Emits an integer.
#[derive(Debug, Default)]
pub struct IntegerSource;

impl ModuleMetadata for IntegerSource {
    fn metadata() -> ModuleInfo {
        source_info("IntegerSource", PortType::Integer)
    }

    fn category() -> ModuleCategory {
        ModuleCategory::Source
    }
}

impl Module for IntegerSource {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        let value = ctx.require_i64("value")?;
        ctx.set_output("value", value)
    }
}

/// Emits a float. Integer parameters are widened.
#[derive(Debug, Default)]
pub struct FloatSource;

impl ModuleMetadata for FloatSource {
    fn metadata() -> ModuleInfo {
        source_info("FloatSource", PortType::Float)
    }

    fn category() -> ModuleCategory {
        ModuleCategory::Source
    }
}

impl Module for FloatSource {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        let value = ctx.require_f64("value")?;
        let value = Value::float(value)
            .ok_or_else(|| ComputeError::failed(format!("{value} is not a finite float")))?;
        ctx.set_output("value", value)
    }
}

/// Emits a string.
#[derive(Debug, Default)]
pub struct StringSource;

impl ModuleMetadata for StringSource {
    fn metadata() -> ModuleInfo {
        source_info("StringSource", PortType::String)
    }

    fn category() -> ModuleCategory {
        ModuleCategory::Source
    }
}

impl Module for StringSource {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        let value = ctx.require_str("value")?.to_string();
        ctx.set_output("value", value)
    }
}
