//! Pair module (tuple port unpacking).

use crate::PACKAGE;
use crate::registry::{ModuleCategory, ModuleMetadata};
use kiln_core::error::ComputeError;
use kiln_core::traits::{ComputeContext, Module, ModuleInfo, Port, PortType};

/// Pair module - splits an `(integer, integer)` tuple.
///
/// The `pair` port is a tuple port: a parameter function feeding it must
/// supply exactly two integers, which arrive as a two-element list.
///
/// # Ports
/// - Input: "pair" - `(integer, integer)`
/// - Output: "first", "second"
#[derive(Debug, Default)]
pub struct Pair;

impl ModuleMetadata for Pair {
    fn metadata() -> ModuleInfo {
        ModuleInfo::new(PACKAGE, "Pair")
            .with_description("Unpack a pair of integers")
            .with_inputs(vec![Port::tuple_input(
                "pair",
                vec![PortType::Integer, PortType::Integer],
            )])
            .with_outputs(vec![
                Port::output("first", PortType::Integer),
                Port::output("second", PortType::Integer),
            ])
    }

    fn category() -> ModuleCategory {
        ModuleCategory::Data
    }
}

impl Module for Pair {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        let value = ctx.require("pair")?;
        let (first, second) = match value.as_list().as_deref() {
            Some([a, b]) => (a.as_i64(), b.as_i64()),
            _ => (None, None),
        };
        let (Some(first), Some(second)) = (first, second) else {
            return Err(ComputeError::InvalidInput {
                port: "pair".to_string(),
                expected: "(integer,integer)".to_string(),
                found: value.type_name().to_string(),
            });
        };
        ctx.set_output("first", first)?;
        ctx.set_output("second", second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::run;
    use kiln_core::value::Value;

    #[test]
    fn pair_unpacks() {
        let out = run::<Pair>(&[("pair", Value::list(vec![Value::int(4), Value::int(9)]))]).unwrap();
        assert_eq!(out.get("first"), Some(&Value::int(4)));
        assert_eq!(out.get("second"), Some(&Value::int(9)));
    }

    #[test]
    fn pair_rejects_wrong_arity() {
        let err = run::<Pair>(&[("pair", Value::list(vec![Value::int(4)]))]).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidInput { .. }));
    }

    #[test]
    fn pair_port_is_tuple() {
        assert!(Pair::metadata().input("pair").unwrap().is_tuple());
    }
}
