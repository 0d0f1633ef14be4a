//! Fail module.

use crate::PACKAGE;
use crate::registry::{ModuleCategory, ModuleMetadata};
use kiln_core::error::ComputeError;
use kiln_core::traits::{ComputeContext, Module, ModuleInfo, Port, PortType};

const DEFAULT_MESSAGE: &str = "Fail module always fails";

/// Always returns [`ComputeError::Failed`].
///
/// The optional `message` input replaces the default failure text. The
/// optional `value` input lets it sit downstream of other modules.
#[derive(Debug, Default)]
pub struct Fail;

impl ModuleMetadata for Fail {
    fn metadata() -> ModuleInfo {
        ModuleInfo::new(PACKAGE, "Fail")
            .with_description("Always fail")
            .with_inputs(vec![
                Port::input("value", PortType::Any).optional(),
                Port::input("message", PortType::String).optional(),
            ])
            .with_outputs(vec![Port::output("value", PortType::Any)])
    }

    fn category() -> ModuleCategory {
        ModuleCategory::Flow
    }
}

impl Module for Fail {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        let message = ctx
            .input("message")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_MESSAGE);
        Err(ComputeError::failed(message))
    }
}
