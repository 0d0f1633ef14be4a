//! Identity module.

use crate::PACKAGE;
use crate::registry::{ModuleCategory, ModuleMetadata};
use kiln_core::error::ComputeError;
use kiln_core::traits::{ComputeContext, Module, ModuleInfo, Port, PortType};

/// Forwards `value` to `value`.
#[derive(Debug, Default)]
pub struct Identity;

impl ModuleMetadata for Identity {
    fn metadata() -> ModuleInfo {
        ModuleInfo::new(PACKAGE, "Identity")
            .with_description("Forward the input value unchanged")
            .with_inputs(vec![Port::input("value", PortType::Any)])
            .with_outputs(vec![Port::output("value", PortType::Any)])
    }

    fn category() -> ModuleCategory {
        ModuleCategory::Flow
    }
}

impl Module for Identity {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        let value = ctx.require("value")?.clone();
        ctx.set_output("value", value)
    }
}
