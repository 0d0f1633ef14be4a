//! Validate command - check a pipeline definition without computing.

use anyhow::Result;
use kiln_executor::CachedInterpreter;
use kiln_modules::standard_registry;
use std::sync::Arc;

/// Run the validate command.
///
/// The pipeline is merged into a throwaway cache, which resolves every
/// module, checks every port and adapts every parameter function.
pub fn run(file: &str) -> Result<()> {
    tracing::info!(file = %file, "Validating pipeline");

    println!("Validation Results for: {}", file);
    println!("========================{}", "=".repeat(file.len()));
    println!();

    let loaded = match super::load(file) {
        Ok(loaded) => loaded,
        Err(e) => {
            println!("✗ LOAD ERROR:");
            println!("  {:#}", e);
            anyhow::bail!("Pipeline validation failed");
        }
    };
    println!("✓ Definition parsed");

    let order = loaded.pipeline.topological_order()?;
    println!("✓ Topological sort passed ({} modules)", order.len());

    let mut interpreter = CachedInterpreter::new(Arc::new(standard_registry()));
    match interpreter.merge(&loaded.pipeline, None) {
        Ok(outcome) => {
            println!("✓ Modules, ports and parameters check out");
            println!();
            println!("Pipeline Summary:");
            println!("  Name: {}", loaded.name);
            println!("  Modules: {}", loaded.pipeline.module_count());
            println!("  Distinct modules: {}", outcome.modules_added.len());
            println!("  Connections: {}", loaded.pipeline.connection_count());
            let sinks = loaded
                .sinks
                .clone()
                .unwrap_or_else(|| loaded.pipeline.sinks());
            let sinks: Vec<String> = sinks.iter().map(|id| id.as_u32().to_string()).collect();
            println!("  Sinks: {}", sinks.join(", "));
        }
        Err(e) => {
            println!("✗ [{}] {}", e.code(), e);
            println!();
            println!("✗ Validation FAILED");
            anyhow::bail!("Pipeline validation failed");
        }
    }

    println!();
    println!("✓ Validation PASSED");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_yaml(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn valid_pipeline_passes() {
        let file = write_yaml(
            r#"
name: ok
modules:
  - id: 1
    package: kiln.basic
    name: IntegerSource
    functions:
      - name: value
        params: [3]
"#,
        );
        assert!(run(file.path().to_str().unwrap()).is_ok());
    }

    #[test]
    fn unknown_port_fails() {
        let file = write_yaml(
            r#"
name: bad
modules:
  - id: 1
    package: kiln.basic
    name: IntegerSource
    functions:
      - name: nope
        params: [3]
"#,
        );
        assert!(run(file.path().to_str().unwrap()).is_err());
    }
}
