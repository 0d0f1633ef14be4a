//! Sum module (numeric aggregation over connections).

use crate::PACKAGE;
use crate::arithmetic::Number;
use crate::registry::{ModuleCategory, ModuleMetadata};
use kiln_core::error::ComputeError;
use kiln_core::traits::{ComputeContext, Module, ModuleInfo, Port, PortType};
use kiln_core::value::Value;

/// Sum module - adds every value on `values`.
///
/// `values` accepts any number of connections. Each arriving value is a
/// number or a list of numbers; lists are flattened one level. With nothing
/// connected the result is `0`.
///
/// # Ports
/// - Input: "values" - Numbers or lists of numbers (optional, multiple)
/// - Output: "result" - The total
///
/// # Example Definition
/// ```yaml
/// modules:
///   - id: 3
///     package: kiln.basic
///     name: Sum
/// connections:
///   - from: 1.value
///     to: 3.values
///   - from: 2.result
///     to: 3.values
/// ```
#[derive(Debug, Default)]
pub struct Sum;

impl Sum {
    fn total(values: &[Value]) -> Result<Number, ComputeError> {
        let mut total = Number::Int(0);
        for value in values {
            match value.as_list() {
                Some(items) => {
                    for item in &items {
                        total = total.add(Number::from_value("values", item)?)?;
                    }
                }
                None => total = total.add(Number::from_value("values", value)?)?,
            }
        }
        Ok(total)
    }
}

impl ModuleMetadata for Sum {
    fn metadata() -> ModuleInfo {
        ModuleInfo::new(PACKAGE, "Sum")
            .with_description("Sum every number arriving on the values port")
            .with_inputs(vec![
                Port::input("values", PortType::Any)
                    .optional()
                    .with_description("Numbers or lists of numbers, one per connection"),
            ])
            .with_outputs(vec![Port::output("result", PortType::Float)])
    }

    fn category() -> ModuleCategory {
        ModuleCategory::Data
    }
}

impl Module for Sum {
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
        let values = ctx.inputs("values");
        let total = Self::total(values)?;

        tracing::debug!(
            value_count = values.len(),
            result = ?total,
            "Sum: computed result"
        );

        ctx.set_output("result", total.into_value()?)
    }
}
