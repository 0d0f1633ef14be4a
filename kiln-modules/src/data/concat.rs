//! Concat module (string combination).

use crate::PACKAGE;
use crate::registry::{ModuleCategory, ModuleMetadata};
use kiln_core::error::ComputeError;
use kiln_core::traits::{ComputeContext, Module, ModuleInfo, Port, PortType};
use kiln_core::value::Value;

/// Concat module - joins `left` and `right` into one string.
///
/// Scalars are rendered as text, so numbers can be concatenated directly.
/// An optional `separator` goes between the two parts.
///
/// # Ports
/// - Input: "left", "right" - Scalar values
/// - Input: "separator" - String placed between them (optional)
/// - Output: "result" - The joined string
#[derive(Debug, Default)]
pub struct Concat;

fn render(port: &str, value: &Value) -> Result<String, ComputeError> {
    value.as_string().ok_or_else(|| ComputeError::InvalidInput {
        port: port.to_string(),
        expected: "scalar".to_string(),
        found: value.type_name().to_string(),
    })
}

impl ModuleMetadata for Concat {
    fn metadata() -> ModuleInfo {
        ModuleInfo::new(PACKAGE, "Concat")
            .with_description("Concatenate two values as strings")
            .with_inputs(vec![
                Port::input("left", PortType::Any),
                Port::input("right", PortType::Any),
                Port::input("separator", PortType::String).optional(),
            ])
            .with_outputs(vec![Port::output("result", PortType::String)])
    }

    fn category() -> ModuleCategory {
        ModuleCategory::Data
    }
}

impl Module for Concat {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        let left = render("left", ctx.require("left")?)?;
        let right = render("right", ctx.require("right")?)?;
        let separator = match ctx.input("separator") {
            Some(value) if !value.is_null() => render("separator", value)?,
            _ => String::new(),
        };
        ctx.set_output("result", format!("{left}{separator}{right}"))
    }
}
