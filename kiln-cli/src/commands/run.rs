//! Run command - execute a pipeline against one in-process cache.

use anyhow::Result;
use kiln_core::pipeline::LoadedPipeline;
use kiln_core::types::ModuleId;
use kiln_executor::{CachedInterpreter, ExecuteOptions, ExecutionResult, InterpreterConfig};
use kiln_modules::standard_registry;
use serde_json::{Map, Value as JsonValue, json};
use std::sync::Arc;

/// Arguments of the run command.
pub struct RunArgs<'a> {
    pub file: &'a str,
    pub sinks: &'a [u32],
    pub repeat: u32,
    pub reason: Option<&'a str>,
    pub json: bool,
}

/// Run the run command.
pub fn run(args: &RunArgs<'_>) -> Result<()> {
    let loaded = super::load(args.file)?;
    let sinks: Option<Vec<ModuleId>> = if args.sinks.is_empty() {
        loaded.sinks.clone()
    } else {
        Some(args.sinks.iter().copied().map(ModuleId::new).collect())
    };

    let mut interpreter =
        CachedInterpreter::with_config(Arc::new(standard_registry()), InterpreterConfig::from_env());

    let repeat = args.repeat.max(1);
    let mut failed = 0;
    for round in 1..=repeat {
        let mut options = ExecuteOptions::new();
        if let Some(reason) = args.reason {
            options = options.with_reason(reason);
        }

        let result = interpreter.execute(&loaded.pipeline, sinks.as_deref(), options)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report(&loaded, &result, round))?);
        } else {
            print_result(&loaded, &result, round, repeat);
        }
        failed = result.errors.len();
    }

    tracing::info!(
        file = %args.file,
        runs = repeat,
        cached_modules = interpreter.cache().len(),
        "Run finished"
    );
    interpreter.shutdown();

    if failed > 0 {
        anyhow::bail!("{} module(s) failed", failed);
    }
    Ok(())
}

fn key_of(loaded: &LoadedPipeline, id: ModuleId) -> String {
    loaded
        .pipeline
        .module(id)
        .map(|d| d.key.to_string())
        .unwrap_or_default()
}

/// JSON document for one execution.
pub fn report(loaded: &LoadedPipeline, result: &ExecutionResult, round: u32) -> JsonValue {
    let mut modules = Map::new();
    for (id, handle) in &result.objects {
        let outputs: Map<String, JsonValue> = handle
            .outputs
            .iter()
            .map(|(port, value)| (port.clone(), value.inner().clone()))
            .collect();
        modules.insert(
            id.as_u32().to_string(),
            json!({
                "key": key_of(loaded, *id),
                "persistent_id": handle.persistent_id.as_u64(),
                "signature": handle.signature.to_hex(),
                "computed": result.was_executed(*id),
                "outputs": outputs,
                "error": result.error(*id).map(|e| e.error.to_string()),
            }),
        );
    }

    json!({
        "pipeline": loaded.name,
        "run": round,
        "execution_id": result.execution_id.to_string(),
        "success": result.is_success(),
        "computed": result.executed_count(),
        "modules_added": result.modules_added.len(),
        "connections_added": result.connections_added.len(),
        "modules": modules,
    })
}

fn print_result(loaded: &LoadedPipeline, result: &ExecutionResult, round: u32, repeat: u32) {
    println!(
        "Run {}/{} of '{}' ({})",
        round, repeat, loaded.name, result.execution_id
    );

    for (id, handle) in &result.objects {
        let state = match result.error(*id) {
            Some(_) => "failed",
            None if result.was_executed(*id) => "computed",
            None => "cached",
        };
        println!(
            "  [{}] {} {} {}",
            id.as_u32(),
            key_of(loaded, *id),
            handle.signature.short(),
            state
        );
        if let Some(error) = result.error(*id) {
            println!("      error: {}", error.error);
        }
        for (port, value) in &handle.outputs {
            println!("      {} = {}", port, value.inner());
        }
    }

    println!(
        "  {} computed, {} failed, {} new cache entries",
        result.executed_count(),
        result.errors.len(),
        result.modules_added.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::pipeline::PipelineDefinition;

    const YAML: &str = r#"
name: add_one
modules:
  - id: 1
    package: kiln.basic
    name: IntegerSource
    functions:
      - name: value
        params: [1]
  - id: 2
    package: kiln.basic
    name: Add
    functions:
      - name: b
        params: [1]
connections:
  - from: 1.value
    to: 2.a
"#;

    #[test]
    fn report_lists_outputs_and_cache_state() {
        let loaded = PipelineDefinition::from_yaml(YAML)
            .unwrap()
            .into_pipeline()
            .unwrap();
        let mut interpreter = CachedInterpreter::new(Arc::new(standard_registry()));

        let first = interpreter
            .execute(&loaded.pipeline, None, ExecuteOptions::new())
            .unwrap();
        let doc = report(&loaded, &first, 1);
        assert_eq!(doc["success"], true);
        assert_eq!(doc["computed"], 2);
        assert_eq!(doc["modules"]["2"]["outputs"]["result"], 2);
        assert_eq!(doc["modules"]["2"]["key"], "kiln.basic:Add");

        let second = interpreter
            .execute(&loaded.pipeline, None, ExecuteOptions::new())
            .unwrap();
        let doc = report(&loaded, &second, 2);
        assert_eq!(doc["computed"], 0);
        assert_eq!(doc["modules"]["2"]["computed"], false);
        assert_eq!(doc["modules_added"], 0);
    }

    #[test]
    fn run_missing_file_fails() {
        let args = RunArgs {
            file: "/nonexistent/pipeline.yaml",
            sinks: &[],
            repeat: 1,
            reason: None,
            json: false,
        };
        assert!(run(&args).is_err());
    }
}
