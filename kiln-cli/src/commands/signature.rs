//! Signature command - print content signatures.

use anyhow::Result;
use kiln_core::signature::SignatureIndex;
use kiln_modules::standard_registry;

/// Run the signature command.
///
/// Modules that print the same subpipeline signature share one cache entry
/// at execution time.
pub fn run(file: &str) -> Result<()> {
    let loaded = super::load(file)?;
    let registry = standard_registry();
    let mut index = SignatureIndex::with_registry(&loaded.pipeline, &registry);

    for id in loaded.pipeline.topological_order()? {
        let key = loaded
            .pipeline
            .module(id)
            .map(|d| d.key.to_string())
            .unwrap_or_default();
        let signature = index.subpipeline_signature(id)?;
        println!("{:>6}  {}  {}", id.as_u32(), signature, key);
    }

    Ok(())
}
