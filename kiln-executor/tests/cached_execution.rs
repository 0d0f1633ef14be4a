//! Integration tests for cached execution.
//!
//! Covers temporal caching, idempotence, non-cacheable freshness, partial
//! failure isolation and rollback.

mod common;

use common::{Counters, RecordingHook, add, module, source, test_interpreter};
use kiln_core::error::ComputeError;
use kiln_core::logging::{BEGIN_UPDATE, END_UPDATE, LogCollector, LogFilter, UPDATE_CACHED};
use kiln_core::pipeline::{Function, Pipeline, PipelineDefinition};
use kiln_core::types::ModuleId;
use kiln_core::value::Value;
use kiln_executor::ExecuteOptions;
use std::collections::BTreeSet;
use std::sync::Arc;

/// `Source(value) -> Add(b)` wired on port `a`.
fn source_add(value: i64, b: i64) -> (Pipeline, ModuleId, ModuleId) {
    let mut p = Pipeline::new();
    let m = p.add_module(source(value));
    let n = p.add_module(add(b));
    p.connect(m, "value", n, "a").unwrap();
    (p, m, n)
}

#[test]
fn integer_source_add_three_runs() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let (mut p, m, n) = source_add(1, 1);

    let first = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    assert!(first.is_success());
    assert_eq!(first.output(n, "result"), Some(&Value::int(2)));
    assert_eq!(first.modules_added, BTreeSet::from([m, n]));
    assert_eq!(first.connections_added.len(), 1);
    assert!(first.was_executed(m) && first.was_executed(n));
    assert_eq!(counters.get("Source"), 1);
    assert_eq!(counters.get("Add"), 1);

    let second = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    assert_eq!(second.output(n, "result"), Some(&Value::int(2)));
    assert!(second.modules_added.is_empty());
    assert!(second.connections_added.is_empty());
    assert_eq!(second.executed_count(), 0);
    assert_eq!(counters.get("Source"), 1);
    assert_eq!(counters.get("Add"), 1);
    assert_eq!(
        first.objects[&n].persistent_id,
        second.objects[&n].persistent_id
    );

    p.set_function(m, Function::single("value", 2)).unwrap();
    let third = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    assert_eq!(third.output(n, "result"), Some(&Value::int(3)));
    assert_eq!(third.modules_added, BTreeSet::from([m, n]));
    assert_eq!(counters.get("Source"), 2);
    assert_eq!(counters.get("Add"), 2);
    assert_ne!(
        first.objects[&n].persistent_id,
        third.objects[&n].persistent_id
    );

    // Old entries stay cached; merging is strictly additive.
    assert_eq!(interp.cache().len(), 4);
    assert!(interp.cache().contains(first.objects[&n].persistent_id));
}

#[test]
fn renumbered_pipeline_hits_cache() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let (p1, _, n1) = source_add(5, 1);
    let first = interp.execute(&p1, None, ExecuteOptions::new()).unwrap();

    let mut p2 = Pipeline::new();
    let n2 = ModuleId::new(40);
    let m2 = ModuleId::new(90);
    p2.add_module_with_id(n2, add(1)).unwrap();
    p2.add_module_with_id(m2, source(5)).unwrap();
    p2.connect(m2, "value", n2, "a").unwrap();
    let second = interp.execute(&p2, None, ExecuteOptions::new()).unwrap();

    assert_eq!(second.executed_count(), 0);
    assert!(second.modules_added.is_empty());
    assert_eq!(second.output(n2, "result"), Some(&Value::int(6)));
    assert_eq!(
        first.objects[&n1].persistent_id,
        second.objects[&n2].persistent_id
    );
    assert_eq!(first.objects[&n1].signature, second.objects[&n2].signature);
    assert_eq!(counters.get("Add"), 1);
}

#[test]
fn identical_modules_share_one_entry() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let mut p = Pipeline::new();
    let a = p.add_module(source(5));
    let b = p.add_module(source(5));
    let sum = p.add_module(module("Add"));
    p.connect(a, "value", sum, "a").unwrap();
    p.connect(b, "value", sum, "b").unwrap();

    let result = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    assert_eq!(result.output(sum, "result"), Some(&Value::int(10)));
    assert_eq!(result.objects[&a].persistent_id, result.objects[&b].persistent_id);
    assert_eq!(counters.get("Source"), 1);
    assert_eq!(interp.cache().len(), 2);
    assert_eq!(interp.cache().connection_count(), 2);
}

#[test]
fn non_cacheable_module_recomputes_every_call() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let mut p = Pipeline::new();
    let s = p.add_module(source(3));
    let v = p.add_module(module("Volatile"));
    let n = p.add_module(add(1));
    p.connect(s, "value", v, "value").unwrap();
    p.connect(v, "value", n, "a").unwrap();

    for run in 1..=3 {
        let result = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
        assert_eq!(result.output(n, "result"), Some(&Value::int(4)));
        assert!(result.was_executed(v));
        assert!(result.was_executed(n), "dependents of a volatile module are rebuilt");
        let mut expected = BTreeSet::from([v, n]);
        if run == 1 {
            expected.insert(s);
        }
        assert_eq!(result.modules_added, expected);
        assert_eq!(counters.get("Volatile"), run);
    }
    assert_eq!(counters.get("Source"), 1);
}

#[test]
fn non_cacheable_module_runs_once_per_call() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let mut p = Pipeline::new();
    let s = p.add_module(source(3));
    let v = p.add_module(module("Volatile"));
    let x = p.add_module(add(1));
    let y = p.add_module(add(2));
    p.connect(s, "value", v, "value").unwrap();
    p.connect(v, "value", x, "a").unwrap();
    p.connect(v, "value", y, "a").unwrap();

    let result = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    assert_eq!(result.output(x, "result"), Some(&Value::int(4)));
    assert_eq!(result.output(y, "result"), Some(&Value::int(5)));
    assert_eq!(counters.get("Volatile"), 1);

    interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    assert_eq!(counters.get("Volatile"), 2);
}

#[test]
fn failure_is_isolated_and_rolled_back() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let mut p = Pipeline::new();
    let s = p.add_module(source(1));
    let f = p.add_module(module("Fail"));
    let bad = p.add_module(add(1));
    let good = p.add_module(add(2));
    p.connect(s, "value", f, "value").unwrap();
    p.connect(f, "value", bad, "a").unwrap();
    p.connect(s, "value", good, "a").unwrap();

    let result = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    assert!(!result.is_success());
    assert_eq!(result.output(good, "result"), Some(&Value::int(3)));
    assert_eq!(
        result.errors.keys().copied().collect::<BTreeSet<_>>(),
        BTreeSet::from([f, bad])
    );
    assert_eq!(result.error(f).unwrap().error, ComputeError::failed("boom"));
    let fail_id = result.objects[&f].persistent_id;
    assert_eq!(
        result.error(bad).unwrap().error,
        ComputeError::UpstreamFailed { upstream: fail_id }
    );

    let cache = interp.cache();
    assert!(!cache.contains(fail_id));
    assert!(!cache.contains(result.objects[&bad].persistent_id));
    assert!(cache.contains(result.objects[&s].persistent_id));
    assert!(cache.contains(result.objects[&good].persistent_id));

    let retry = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    assert_eq!(counters.get("Fail"), 2);
    assert!(!retry.was_executed(good));
    assert!(!retry.was_executed(s));
    assert_eq!(retry.modules_added, BTreeSet::from([f, bad]));
}

#[test]
fn panic_is_captured_as_module_error() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let mut p = Pipeline::new();
    let boom = p.add_module(module("Explode"));
    let fine = p.add_module(source(9));

    let result = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    match &result.error(boom).unwrap().error {
        ComputeError::Panicked { message } => assert!(message.contains("kaboom")),
        other => panic!("expected a panic error, got {other:?}"),
    }
    assert_eq!(result.output(fine, "value"), Some(&Value::int(9)));
    assert_eq!(interp.cache().len(), 1);
}

#[test]
fn unset_outputs_are_pruned_from_inputs() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);

    for (emit, expected) in [(false, 1), (true, 2)] {
        let mut p = Pipeline::new();
        let maybe = p.add_module(module("Maybe").with_param("emit", emit));
        let s = p.add_module(source(7));
        let count = p.add_module(module("Count"));
        p.connect(maybe, "value", count, "values").unwrap();
        p.connect(s, "value", count, "values").unwrap();

        let result = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
        assert!(result.is_success());
        assert_eq!(result.output(count, "count"), Some(&Value::int(expected)));
    }
}

#[test]
fn cascading_invalidation_removes_dependents_first() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let (p, m, n) = source_add(1, 1);
    let result = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    let (pm, pn) = (result.objects[&m].persistent_id, result.objects[&n].persistent_id);

    let removed = interp.clean_modules([pm]).unwrap();
    assert_eq!(removed, vec![pn, pm]);
    assert!(interp.cache().is_empty());

    let again = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    assert_eq!(again.executed_count(), 2);
}

#[test]
fn explicit_sinks_limit_computation() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let mut p = Pipeline::new();
    let s = p.add_module(source(1));
    let x = p.add_module(add(10));
    let y = p.add_module(add(20));
    p.connect(s, "value", x, "a").unwrap();
    p.connect(s, "value", y, "a").unwrap();

    let first = interp.execute(&p, Some(&[x]), ExecuteOptions::new()).unwrap();
    assert_eq!(first.output(x, "result"), Some(&Value::int(11)));
    assert!(first.output(y, "result").is_none());
    assert!(!first.was_executed(y));
    assert_eq!(counters.get("Add"), 1);

    let second = interp.execute(&p, Some(&[y]), ExecuteOptions::new()).unwrap();
    assert_eq!(second.output(y, "result"), Some(&Value::int(21)));
    assert!(!second.was_executed(s));
    assert_eq!(counters.get("Add"), 2);
}

#[test]
fn structural_errors_leave_cache_untouched() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let (p, _, _) = source_add(1, 1);
    interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    let before = interp.cache().len();

    let mut unknown = p.clone();
    unknown.add_module(module("Nope"));
    let err = interp.execute(&unknown, None, ExecuteOptions::new()).unwrap_err();
    assert_eq!(err.code(), "E101");

    let mut bad_port = Pipeline::new();
    let s = bad_port.add_module(source(2));
    let n = bad_port.add_module(add(1));
    bad_port.connect(s, "value", n, "c").unwrap();
    let err = interp.execute(&bad_port, None, ExecuteOptions::new()).unwrap_err();
    assert_eq!(err.code(), "E104");

    let mut bad_param = Pipeline::new();
    bad_param.add_module(module("Add").with_param("b", "one"));
    let err = interp.execute(&bad_param, None, ExecuteOptions::new()).unwrap_err();
    assert_eq!(err.code(), "E105");

    let err = interp
        .execute(&p, Some(&[ModuleId::new(77)]), ExecuteOptions::new())
        .unwrap_err();
    assert_eq!(err.code(), "E102");

    assert_eq!(interp.cache().len(), before);
}

#[test]
fn options_reason_remap_and_hooks() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let (p, m, n) = source_add(1, 1);
    let outer = ModuleId::new(100);
    let hook = Arc::new(RecordingHook::default());

    let options = ExecuteOptions::new()
        .with_reason("nightly build")
        .with_remap(n, outer)
        .with_hook(hook.clone());
    let result = interp.execute(&p, None, options).unwrap();

    assert_eq!(result.output(outer, "result"), Some(&Value::int(2)));
    assert!(result.objects.get(&n).is_none());
    assert_eq!(result.modules_added, BTreeSet::from([m, outer]));
    let pn = result.objects[&outer].persistent_id;
    assert_eq!(interp.cache().reason_of(pn), Some("nightly build"));

    assert_eq!(hook.summoned.lock().as_slice(), &[BTreeSet::from([m, outer])]);
    assert_eq!(hook.sinks.lock().as_slice(), &[vec![outer]]);
    let done = hook.done.lock();
    assert_eq!(done.len(), 2);
    assert!(done.iter().all(|(_, _, computed, failed)| *computed && !*failed));
    assert!(done.iter().any(|(id, locals, _, _)| *id == pn && locals == &vec![outer]));
    assert_eq!(hook.executions.lock().len(), 1);
}

#[test]
fn update_events_are_logged_per_execution() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let (p, _, _) = source_add(1, 1);

    let first = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    let second = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    let log = interp.log();

    let count = |execution, message: &str| {
        log.query(&LogFilter::new().execution_id(execution).message(message))
            .len()
    };
    assert_eq!(count(first.execution_id, BEGIN_UPDATE), 2);
    assert_eq!(count(first.execution_id, END_UPDATE), 2);
    assert_eq!(count(second.execution_id, BEGIN_UPDATE), 0);
    assert_eq!(count(second.execution_id, UPDATE_CACHED), 2);
}

#[test]
fn failure_event_carries_error_field() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let mut p = Pipeline::new();
    p.add_module(module("Fail"));

    let result = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    let events = interp
        .log()
        .query(&LogFilter::new().execution_id(result.execution_id).message(END_UPDATE));
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].field("error"),
        Some(&serde_json::Value::String("boom".into()))
    );
}

#[test]
fn flush_forces_recomputation() {
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let (p, _, _) = source_add(1, 1);
    interp.execute(&p, None, ExecuteOptions::new()).unwrap();

    assert_eq!(interp.flush(), 2);
    assert!(interp.cache().is_empty());
    let result = interp.execute(&p, None, ExecuteOptions::new()).unwrap();
    assert_eq!(result.executed_count(), 2);

    interp.cleanup();
    assert!(interp.cache().is_empty());
    assert!(interp.log().is_empty());
}

#[test]
fn yaml_definition_executes() {
    const YAML: &str = r#"
name: add_one
modules:
  - id: 1
    package: test
    name: Source
    functions:
      - name: value
        params: [41]
  - id: 2
    package: test
    name: Add
    functions:
      - name: b
        params: [1]
connections:
  - from: 1.value
    to: 2.a
sinks: [2]
"#;
    let counters = Counters::new();
    let mut interp = test_interpreter(&counters);
    let loaded = PipelineDefinition::from_yaml(YAML)
        .unwrap()
        .into_pipeline()
        .unwrap();

    let result = interp
        .execute(&loaded.pipeline, loaded.sinks.as_deref(), ExecuteOptions::new())
        .unwrap();
    assert_eq!(result.output(ModuleId::new(2), "result"), Some(&Value::int(42)));
}
