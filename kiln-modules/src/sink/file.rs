//! File sink.

use crate::PACKAGE;
use crate::registry::{ModuleCategory, ModuleMetadata};
use kiln_core::error::{ComputeError, ComputeResultExt};
use kiln_core::traits::{ComputeContext, Module, ModuleInfo, Port, PortType};
use kiln_core::value::Value;
use std::path::Path;

/// Writes `value` to the file at `path`.
///
/// Strings are written as-is; every other value as pretty-printed JSON.
/// The module is never cached, so the file is rewritten on every execution
/// that reaches it. Missing parent directories are created.
///
/// # Ports
/// - Input: "value" - Value to write
/// - Input: "path" - Destination file
/// - Output: "bytes" - Number of bytes written
#[derive(Debug, Default)]
pub struct FileSink;

fn contents(value: &Value) -> Result<String, ComputeError> {
    match value.as_str() {
        Some(s) => Ok(s.to_string()),
        None => serde_json::to_string_pretty(value.inner()).compute_context("serialize value"),
    }
}

impl ModuleMetadata for FileSink {
    fn metadata() -> ModuleInfo {
        ModuleInfo::new(PACKAGE, "FileSink")
            .with_description("Write a value to a file")
            .with_inputs(vec![
                Port::input("value", PortType::Any),
                Port::input("path", PortType::String),
            ])
            .with_outputs(vec![Port::output("bytes", PortType::Integer)])
    }

    fn category() -> ModuleCategory {
        ModuleCategory::Sink
    }
}

impl Module for FileSink {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        let path = Path::new(ctx.require_str("path")?).to_path_buf();
        let body = contents(ctx.require("value")?)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).compute_context("create parent directory")?;
        }
        std::fs::write(&path, body.as_bytes())
            .compute_context(&format!("write {}", path.display()))?;

        tracing::debug!(path = %path.display(), bytes = body.len(), "FileSink: wrote value");

        ctx.set_output("bytes", body.len() as i64)
    }

    fn is_cacheable(&self) -> bool {
        false
    }
}
