//! Parameter adapters.
//!
//! A [`Function`] on a module descriptor becomes a constant connector on the
//! input port it names. No parameters feed a null, one parameter feeds itself,
//! and several are packed into a tuple (a list value) checked element by
//! element against the port's declared signature.

use crate::cache::Connector;
use kiln_core::error::{KilnError, Result};
use kiln_core::pipeline::{Function, ModuleDescriptor};
use kiln_core::traits::{ModuleInfo, Port};
use kiln_core::types::ModuleId;
use kiln_core::value::Value;

/// Adapt every function of `descriptor` to a `(port, connector)` pair, in
/// declaration order.
pub fn parameter_connectors(
    module_id: ModuleId,
    descriptor: &ModuleDescriptor,
    info: &ModuleInfo,
) -> Result<Vec<(String, Connector)>> {
    descriptor
        .functions
        .iter()
        .map(|function| {
            let port = info.input(&function.name).ok_or_else(|| KilnError::InvalidPort {
                module_id,
                key: descriptor.key.to_string(),
                port: function.name.clone(),
            })?;
            let value = adapt(module_id, function, port)?;
            Ok((function.name.clone(), Connector::Parameter(value)))
        })
        .collect()
}

/// Adapt one function's parameters to the value its port receives.
pub fn adapt(module_id: ModuleId, function: &Function, port: &Port) -> Result<Value> {
    let mismatch = |cause: String| KilnError::ParameterMismatch {
        module_id,
        function: function.name.clone(),
        cause,
    };

    match function.params.as_slice() {
        [] => Ok(Value::null()),
        [single] => {
            if port.is_tuple() {
                return Err(mismatch(format!(
                    "port expects {} parameters {}, got 1",
                    port.signature.len(),
                    port.signature_string()
                )));
            }
            if let Some(expected) = port.signature.first() {
                if !expected.accepts(single) {
                    return Err(mismatch(format!(
                        "expected {expected}, found {}",
                        single.type_name()
                    )));
                }
            }
            Ok(single.clone())
        }
        params => {
            if params.len() != port.signature.len() {
                return Err(mismatch(format!(
                    "port expects {} parameters {}, got {}",
                    port.signature.len(),
                    port.signature_string(),
                    params.len()
                )));
            }
            for (position, (param, expected)) in params.iter().zip(&port.signature).enumerate() {
                if !expected.accepts(param) {
                    return Err(mismatch(format!(
                        "parameter {position}: expected {expected}, found {}",
                        param.type_name()
                    )));
                }
            }
            Ok(Value::list(params.iter().cloned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::pipeline::ModuleKey;
    use kiln_core::traits::PortType;

    fn info() -> ModuleInfo {
        ModuleInfo::new("kiln.basic", "Pair").with_inputs(vec![
            Port::tuple_input("pair", vec![PortType::Integer, PortType::Integer]),
            Port::input("label", PortType::String),
            Port::input("flag", PortType::Any),
        ])
    }

    fn id() -> ModuleId {
        ModuleId::new(1)
    }

    #[test]
    fn zero_params_is_null() {
        let function = Function::new("flag", Vec::new());
        let value = adapt(id(), &function, info().input("flag").unwrap()).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn single_param_is_constant() {
        let function = Function::single("label", "hello");
        let value = adapt(id(), &function, info().input("label").unwrap()).unwrap();
        assert_eq!(value.as_str(), Some("hello"));
    }

    #[test]
    fn several_params_become_tuple() {
        let function = Function::new("pair", vec![Value::int(1), Value::int(2)]);
        let value = adapt(id(), &function, info().input("pair").unwrap()).unwrap();
        assert_eq!(value, Value::list(vec![Value::int(1), Value::int(2)]));
    }

    #[test]
    fn arity_and_type_mismatches() {
        let info = info();
        let short = Function::single("pair", 1);
        let err = adapt(id(), &short, info.input("pair").unwrap()).unwrap_err();
        assert_eq!(err.code(), "E105");

        let wrong = Function::new("pair", vec![Value::int(1), Value::string("x")]);
        let err = adapt(id(), &wrong, info.input("pair").unwrap()).unwrap_err();
        assert!(err.to_string().contains("parameter 1"));

        let typed = Function::single("label", 3);
        let err = adapt(id(), &typed, info.input("label").unwrap()).unwrap_err();
        assert_eq!(err.code(), "E105");
    }

    #[test]
    fn undeclared_port_is_invalid() {
        let descriptor =
            ModuleDescriptor::new(ModuleKey::new("kiln.basic", "Pair")).with_param("nope", 1);
        let err = parameter_connectors(id(), &descriptor, &info()).unwrap_err();
        assert_eq!(err.code(), "E104");
    }

    #[test]
    fn connectors_keep_declaration_order() {
        let descriptor = ModuleDescriptor::new(ModuleKey::new("kiln.basic", "Pair"))
            .with_param("label", "a")
            .with_function(Function::new("pair", vec![Value::int(1), Value::int(2)]));
        let connectors = parameter_connectors(id(), &descriptor, &info()).unwrap();
        let ports: Vec<&str> = connectors.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(ports, vec!["label", "pair"]);
    }
}
