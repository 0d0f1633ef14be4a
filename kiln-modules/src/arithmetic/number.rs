//! Integer-preserving numeric values.

use kiln_core::error::ComputeError;
use kiln_core::traits::PortType;
use kiln_core::value::Value;

/// A number read from a port.
///
/// Integer operands stay integers; any float operand widens the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Read a number, reporting `port` on a type mismatch.
    pub(crate) fn from_value(port: &str, value: &Value) -> Result<Self, ComputeError> {
        if value.type_name() == "integer" {
            if let Some(i) = value.as_i64() {
                return Ok(Self::Int(i));
            }
        }
        value
            .as_f64()
            .map(Self::Float)
            .ok_or_else(|| ComputeError::InvalidInput {
                port: port.to_string(),
                expected: PortType::Float.to_string(),
                found: value.type_name().to_string(),
            })
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    pub(crate) fn add(self, other: Self) -> Result<Self, ComputeError> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_add(b)
                .map(Self::Int)
                .ok_or_else(|| ComputeError::failed(format!("integer overflow: {a} + {b}"))),
            (a, b) => Ok(Self::Float(a.as_f64() + b.as_f64())),
        }
    }

    pub(crate) fn mul(self, other: Self) -> Result<Self, ComputeError> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_mul(b)
                .map(Self::Int)
                .ok_or_else(|| ComputeError::failed(format!("integer overflow: {a} * {b}"))),
            (a, b) => Ok(Self::Float(a.as_f64() * b.as_f64())),
        }
    }
}

impl Number {
    /// Fails when a float result overflowed to infinity or became NaN.
    pub(crate) fn into_value(self) -> Result<Value, ComputeError> {
        match self {
            Self::Int(i) => Ok(Value::int(i)),
            Self::Float(f) => Value::float(f)
                .ok_or_else(|| ComputeError::failed(format!("float result {f} is not finite"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_stay_integers() {
        let a = Number::from_value("a", &Value::int(2)).unwrap();
        let b = Number::from_value("b", &Value::int(3)).unwrap();
        assert_eq!(a.add(b).unwrap(), Number::Int(5));
        assert_eq!(a.mul(b).unwrap(), Number::Int(6));
    }

    #[test]
    fn float_widens() {
        let a = Number::from_value("a", &Value::int(2)).unwrap();
        let b = Number::from_value("b", &Value::float(0.5).unwrap()).unwrap();
        assert_eq!(a.add(b).unwrap(), Number::Float(2.5));
        assert_eq!(a.mul(b).unwrap().into_value().unwrap(), Value::float(1.0).unwrap());
    }

    #[test]
    fn float_overflow_is_failure() {
        let huge = Number::Float(f64::MAX);
        let product = huge.mul(Number::Int(2)).unwrap();
        assert!(matches!(
            product.into_value(),
            Err(ComputeError::Failed { .. })
        ));
    }

    #[test]
    fn overflow_is_failure() {
        let max = Number::Int(i64::MAX);
        assert!(matches!(
            max.add(Number::Int(1)),
            Err(ComputeError::Failed { .. })
        ));
    }

    #[test]
    fn non_number_rejected() {
        let err = Number::from_value("a", &Value::string("x")).unwrap_err();
        assert_eq!(
            err,
            ComputeError::InvalidInput {
                port: "a".into(),
                expected: "float".into(),
                found: "string".into(),
            }
        );
    }
}
