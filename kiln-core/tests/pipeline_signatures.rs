//! Signature properties over pipelines loaded from YAML.

use kiln_core::pipeline::PipelineDefinition;
use kiln_core::prelude::*;

fn load(yaml: &str) -> Pipeline {
    PipelineDefinition::from_yaml(yaml)
        .unwrap()
        .into_pipeline()
        .unwrap()
        .pipeline
}

const DIAMOND: &str = r#"
name: diamond
modules:
  - { id: 1, package: kiln.basic, name: IntegerSource, functions: [{ name: value, params: [3] }] }
  - { id: 2, package: kiln.basic, name: Add, functions: [{ name: b, params: [1] }] }
  - { id: 3, package: kiln.basic, name: Multiply, functions: [{ name: b, params: [2] }] }
  - { id: 4, package: kiln.basic, name: Add }
connections:
  - { from: 1.value, to: 2.a }
  - { from: 1.value, to: 3.a }
  - { from: 2.result, to: 4.a }
  - { from: 3.result, to: 4.b }
"#;

// Same structure, different ids and document order.
const DIAMOND_RENUMBERED: &str = r#"
name: diamond
modules:
  - { id: 40, package: kiln.basic, name: Add }
  - { id: 31, package: kiln.basic, name: Multiply, functions: [{ name: b, params: [2] }] }
  - { id: 7, package: kiln.basic, name: IntegerSource, functions: [{ name: value, params: [3] }] }
  - { id: 12, package: kiln.basic, name: Add, functions: [{ name: b, params: [1] }] }
connections:
  - { from: 31.result, to: 40.b }
  - { from: 12.result, to: 40.a }
  - { from: 7.value, to: 31.a }
  - { from: 7.value, to: 12.a }
"#;

#[test]
fn renumbered_pipelines_hash_identically() {
    let p1 = load(DIAMOND);
    let p2 = load(DIAMOND_RENUMBERED);
    let mut i1 = SignatureIndex::new(&p1);
    let mut i2 = SignatureIndex::new(&p2);

    let pairs = [(1, 7), (2, 12), (3, 31), (4, 40)];
    for (a, b) in pairs {
        assert_eq!(
            i1.subpipeline_signature(ModuleId::new(a)).unwrap(),
            i2.subpipeline_signature(ModuleId::new(b)).unwrap(),
            "module {a} vs {b}"
        );
    }
}

#[test]
fn swapping_ports_changes_the_sink() {
    let swapped = DIAMOND
        .replace("{ from: 2.result, to: 4.a }", "{ from: 2.result, to: 4.b }")
        .replace("{ from: 3.result, to: 4.b }", "{ from: 3.result, to: 4.a }");
    let p1 = load(DIAMOND);
    let p2 = load(&swapped);

    let mut i1 = SignatureIndex::new(&p1);
    let mut i2 = SignatureIndex::new(&p2);
    let sink = ModuleId::new(4);
    assert_eq!(
        i1.module_signature(sink).unwrap(),
        i2.module_signature(sink).unwrap()
    );
    assert_ne!(
        i1.subpipeline_signature(sink).unwrap(),
        i2.subpipeline_signature(sink).unwrap()
    );
}

#[test]
fn every_module_signature_is_distinct_in_diamond() {
    let p = load(DIAMOND);
    let mut index = SignatureIndex::new(&p);
    let mut seen = std::collections::BTreeSet::new();
    for id in p.topological_order().unwrap() {
        assert!(seen.insert(index.subpipeline_signature(id).unwrap()));
    }
    assert_eq!(seen.len(), 4);
}

#[test]
fn cyclic_definition_is_rejected() {
    let yaml = r#"
name: loop
modules:
  - { id: 1, package: kiln.basic, name: Identity }
  - { id: 2, package: kiln.basic, name: Identity }
connections:
  - { from: 1.value, to: 2.value }
  - { from: 2.value, to: 1.value }
"#;
    let err = PipelineDefinition::from_yaml(yaml)
        .unwrap()
        .into_pipeline()
        .unwrap_err();
    assert!(matches!(err, KilnError::CycleDetected { .. }));
}
