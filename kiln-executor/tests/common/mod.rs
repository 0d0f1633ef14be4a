//! Common test utilities for integration tests.

#![allow(dead_code)]

use kiln_core::error::ComputeError;
use kiln_core::pipeline::{ModuleDescriptor, ModuleKey};
use kiln_core::traits::{ComputeContext, Module, ModuleInfo, Port, PortType, Registry};
use kiln_core::types::{ExecutionId, ModuleId, PersistentId};
use kiln_executor::{CachedInterpreter, ExecutionHook, InterpreterConfig, ModuleDone};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Package used by every test module.
pub const PACKAGE: &str = "test";

/// Counts successful and failed `compute()` calls per module name.
#[derive(Clone, Default)]
pub struct Counters {
    inner: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, name: &'static str) {
        *self.inner.lock().entry(name).or_default() += 1;
    }

    /// Number of `compute()` calls for a module name.
    pub fn get(&self, name: &str) -> usize {
        self.inner.lock().get(name).copied().unwrap_or(0)
    }
}

/// Copies its `value` parameter to its `value` output.
struct Source(Counters);

impl Module for Source {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        self.0.bump("Source");
        let value = ctx.require_i64("value")?;
        ctx.set_output("value", value)
    }
}

/// `a + b`.
struct Add(Counters);

impl Module for Add {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        self.0.bump("Add");
        let a = ctx.require_i64("a")?;
        let b = ctx.require_i64("b")?;
        ctx.set_output("result", a + b)
    }
}

/// Number of values that arrived on `values`.
struct Count(Counters);

impl Module for Count {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        self.0.bump("Count");
        let count = ctx.inputs("values").len() as i64;
        ctx.set_output("count", count)
    }
}

/// Pass-through that refuses caching.
struct Volatile(Counters);

impl Module for Volatile {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        self.0.bump("Volatile");
        let value = ctx.require_i64("value")?;
        ctx.set_output("value", value)
    }

    fn is_cacheable(&self) -> bool {
        false
    }
}

/// Always fails.
struct Fail(Counters);

impl Module for Fail {
    fn compute(&mut self, _ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        self.0.bump("Fail");
        Err(ComputeError::failed("boom"))
    }
}

/// Always panics.
struct Explode(Counters);

impl Module for Explode {
    fn compute(&mut self, _ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        self.0.bump("Explode");
        panic!("kaboom");
    }
}

/// Writes `value` only when `emit` is true.
struct Maybe(Counters);

impl Module for Maybe {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        self.0.bump("Maybe");
        if ctx.input("emit").and_then(|v| v.as_bool()).unwrap_or(false) {
            ctx.set_output("value", 1_i64)?;
        }
        Ok(())
    }
}

fn int_in(name: &str) -> Port {
    Port::input(name, PortType::Integer)
}

fn int_out(name: &str) -> Port {
    Port::output(name, PortType::Integer)
}

/// Registry with every test module, all reporting to `counters`.
pub fn test_registry(counters: &Counters) -> Arc<Registry> {
    let registry = Registry::new();

    let c = counters.clone();
    registry.register_fn(
        ModuleInfo::new(PACKAGE, "Source")
            .with_inputs(vec![int_in("value")])
            .with_outputs(vec![int_out("value")]),
        move || Box::new(Source(c.clone())),
    );
    let c = counters.clone();
    registry.register_fn(
        ModuleInfo::new(PACKAGE, "Add")
            .with_inputs(vec![int_in("a"), int_in("b")])
            .with_outputs(vec![int_out("result")]),
        move || Box::new(Add(c.clone())),
    );
    let c = counters.clone();
    registry.register_fn(
        ModuleInfo::new(PACKAGE, "Count")
            .with_inputs(vec![Port::input("values", PortType::Any)])
            .with_outputs(vec![int_out("count")]),
        move || Box::new(Count(c.clone())),
    );
    let c = counters.clone();
    registry.register_fn(
        ModuleInfo::new(PACKAGE, "Volatile")
            .with_inputs(vec![int_in("value")])
            .with_outputs(vec![int_out("value")]),
        move || Box::new(Volatile(c.clone())),
    );
    let c = counters.clone();
    registry.register_fn(
        ModuleInfo::new(PACKAGE, "Fail")
            .with_inputs(vec![Port::input("value", PortType::Any).optional()])
            .with_outputs(vec![int_out("value")]),
        move || Box::new(Fail(c.clone())),
    );
    let c = counters.clone();
    registry.register_fn(
        ModuleInfo::new(PACKAGE, "Explode")
            .with_inputs(vec![Port::input("value", PortType::Any).optional()])
            .with_outputs(vec![int_out("value")]),
        move || Box::new(Explode(c.clone())),
    );
    let c = counters.clone();
    registry.register_fn(
        ModuleInfo::new(PACKAGE, "Maybe")
            .with_inputs(vec![Port::input("emit", PortType::Boolean)])
            .with_outputs(vec![int_out("value")]),
        move || Box::new(Maybe(c.clone())),
    );

    Arc::new(registry)
}

/// Interpreter over [`test_registry`] that validates signatures after every
/// merge.
pub fn test_interpreter(counters: &Counters) -> CachedInterpreter {
    CachedInterpreter::with_config(
        test_registry(counters),
        InterpreterConfig::default().with_validate_signatures(true),
    )
}

/// Descriptor for a test module.
pub fn module(name: &str) -> ModuleDescriptor {
    ModuleDescriptor::new(ModuleKey::new(PACKAGE, name))
}

/// `Source(value)`.
pub fn source(value: i64) -> ModuleDescriptor {
    module("Source").with_param("value", value)
}

/// `Add` with a constant `b`.
pub fn add(b: i64) -> ModuleDescriptor {
    module("Add").with_param("b", b)
}

/// Records every hook invocation.
#[derive(Default)]
pub struct RecordingHook {
    pub summoned: Mutex<Vec<BTreeSet<ModuleId>>>,
    pub done: Mutex<Vec<(PersistentId, Vec<ModuleId>, bool, bool)>>,
    pub sinks: Mutex<Vec<Vec<ModuleId>>>,
    pub executions: Mutex<BTreeSet<String>>,
}

impl ExecutionHook for RecordingHook {
    fn modules_summoned(&self, execution_id: ExecutionId, added: &BTreeSet<ModuleId>) {
        self.executions.lock().insert(execution_id.to_string());
        self.summoned.lock().push(added.clone());
    }

    fn module_done(&self, event: &ModuleDone<'_>) {
        self.executions.lock().insert(event.execution_id.to_string());
        self.done.lock().push((
            event.persistent_id,
            event.module_ids.to_vec(),
            event.computed,
            event.error.is_some(),
        ));
    }

    fn sinks_updated(&self, execution_id: ExecutionId, sinks: &[ModuleId]) {
        self.executions.lock().insert(execution_id.to_string());
        self.sinks.lock().push(sinks.to_vec());
    }
}
