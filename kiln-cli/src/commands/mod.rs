//! CLI command implementations.

pub mod modules;
pub mod run;
pub mod signature;
pub mod validate;
pub mod version;

use anyhow::{Context, Result};
use kiln_core::pipeline::{LoadedPipeline, PipelineDefinition};
use std::path::Path;

/// Read and build a pipeline definition.
pub fn load(file: &str) -> Result<LoadedPipeline> {
    let path = Path::new(file);
    if !path.exists() {
        anyhow::bail!("Pipeline file not found: {}", file);
    }

    let definition = PipelineDefinition::from_file(path)
        .with_context(|| format!("Failed to load {}", file))?;
    let loaded = definition
        .into_pipeline()
        .with_context(|| format!("Invalid pipeline in {}", file))?;

    tracing::debug!(
        file = %file,
        name = %loaded.name,
        modules = loaded.pipeline.module_count(),
        connections = loaded.pipeline.connection_count(),
        "Loaded pipeline"
    );

    Ok(loaded)
}
