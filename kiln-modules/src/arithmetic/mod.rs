//! Binary numeric modules.
//!
//! - [`Add`] - `result = a + b`
//! - [`Multiply`] - `result = a * b`
//!
//! Both ports accept integers or floats. Two integers produce an integer;
//! integer overflow fails the module instead of wrapping.

mod number;

pub(crate) use number::Number;

use crate::PACKAGE;
use crate::registry::{ModuleCategory, ModuleMetadata};
use kiln_core::error::ComputeError;
use kiln_core::traits::{ComputeContext, Module, ModuleInfo, Port, PortType};

fn binary_info(name: &str, description: &str) -> ModuleInfo {
    ModuleInfo::new(PACKAGE, name)
        .with_description(description)
        .with_inputs(vec![
            Port::input("a", PortType::Float).with_description("Left operand"),
            Port::input("b", PortType::Float).with_description("Right operand"),
        ])
        .with_outputs(vec![Port::output("result", PortType::Float)])
}

fn operands(ctx: &ComputeContext<'_>) -> Result<(Number, Number), ComputeError> {
    let a = Number::from_value("a", ctx.require("a")?)?;
    let b = Number::from_value("b", ctx.require("b")?)?;
    Ok((a, b))
}

/// Adds `a` and `b`.
#[derive(Debug, Default)]
pub struct Add;

impl ModuleMetadata for Add {
    fn metadata() -> ModuleInfo {
        binary_info("Add", "Add two numbers")
    }

    fn category() -> ModuleCategory {
        ModuleCategory::Arithmetic
    }
}

impl Module for Add {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        let (a, b) = operands(ctx)?;
        ctx.set_output("result", a.add(b)?.into_value()?)
    }
}

/// Multiplies `a` by `b`.
#[derive(Debug, Default)]
pub struct Multiply;

impl ModuleMetadata for Multiply {
    fn metadata() -> ModuleInfo {
        binary_info("Multiply", "Multiply two numbers")
    }

    fn category() -> ModuleCategory {
        ModuleCategory::Arithmetic
    }
}

impl Module for Multiply {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        let (a, b) = operands(ctx)?;
        ctx.set_output("result", a.mul(b)?.into_value()?)
    }
}
