//! Dynamic value type carried by parameters and ports.
//!
//! Parameters of a module's functions and the values flowing between ports
//! are both [`Value`]s. [`Value::canonical_bytes`] feeds the signature
//! hasher, so it must be stable across runs and processes.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;

/// JSON-backed dynamic value.
///
/// Object keys stay sorted (the default `serde_json` map), which keeps the
/// canonical encoding independent of insertion order. Integers and floats
/// are distinct: `1` and `1.0` hash differently. NaN and infinities have no
/// encoding and are rejected wherever a value is built or parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Value(pub JsonValue);

impl Value {
    pub fn null() -> Self {
        Self(JsonValue::Null)
    }

    pub fn bool(v: bool) -> Self {
        Self(v.into())
    }

    pub fn int(v: i64) -> Self {
        Self(v.into())
    }

    /// `None` for NaN and infinities.
    pub fn float(v: f64) -> Option<Self> {
        serde_json::Number::from_f64(v).map(|n| Self(JsonValue::Number(n)))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self(JsonValue::String(v.into()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self(items.into_iter().map(Value::into_inner).collect())
    }

    /// Compact JSON encoding used for hashing.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Infallible for a `serde_json::Value`.
        serde_json::to_vec(&self.0).unwrap_or_default()
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Integer view. Floats with no fractional part are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match &self.0 {
            JsonValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            _ => None,
        }
    }

    /// Float view. Integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.as_f64()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.0.as_bool()
    }

    pub fn as_list(&self) -> Option<Vec<Value>> {
        self.0
            .as_array()
            .map(|items| items.iter().cloned().map(Value).collect())
    }

    /// Text rendering for concatenation. Strings are unquoted; null has none.
    pub fn as_string(&self) -> Option<String> {
        match &self.0 {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match &self.0 {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "boolean",
            JsonValue::Number(n) if n.is_f64() => "float",
            JsonValue::Number(_) => "integer",
            JsonValue::String(_) => "string",
            JsonValue::Array(_) => "list",
            JsonValue::Object(_) => "object",
        }
    }

    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    pub fn into_inner(self) -> JsonValue {
        self.0
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    /// Goes through `serde_yaml::Value` so `.inf` and `.nan` reach
    /// [`from_yaml`] intact instead of collapsing into null.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        from_yaml(raw).map(Value).map_err(D::Error::custom)
    }
}

fn from_yaml(raw: serde_yaml::Value) -> Result<JsonValue, String> {
    use serde_yaml::Value as Yaml;

    Ok(match raw {
        Yaml::Null => JsonValue::Null,
        Yaml::Bool(b) => JsonValue::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else if let Some(u) = n.as_u64() {
                u.into()
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .ok_or_else(|| format!("non-finite number {n} is not a valid value"))?
            }
        }
        Yaml::String(s) => JsonValue::String(s),
        Yaml::Sequence(items) => JsonValue::Array(
            items
                .into_iter()
                .map(from_yaml)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(entries) => {
            let mut object = serde_json::Map::new();
            for (key, value) in entries {
                let Yaml::String(key) = key else {
                    return Err("mapping keys must be strings".to_string());
                };
                object.insert(key, from_yaml(value)?);
            }
            JsonValue::Object(object)
        }
        Yaml::Tagged(tagged) => return Err(format!("tagged value {} is not supported", tagged.tag)),
    })
}

impl From<Value> for JsonValue {
    fn from(v: Value) -> Self {
        v.0
    }
}

macro_rules! value_from {
    ($($ty:ty => $ctor:path),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    $ctor(v)
                }
            }
        )*
    };
}

value_from! {
    JsonValue => Value,
    &str => Value::string,
    String => Value::string,
    i64 => Value::int,
    bool => Value::bool,
}
