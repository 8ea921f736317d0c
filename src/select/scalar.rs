//! Scalar decoding and canonical mock placeholders.

use serde_json_bytes::Value;

use crate::error::DecodeError;

/// A GraphQL scalar the engine can read out of response data and mock
/// deterministically.
///
/// The mock values are the canonical "empty" family: empty string, zero,
/// `false`, `None`, empty list. Generated bindings implement this trait
/// for custom schema scalars.
pub trait Scalar: Sized {
    /// The fixed placeholder returned in mocking mode.
    fn mock() -> Self;

    /// Reads a value of this scalar type out of decoded response data.
    fn decode(value: &Value) -> Result<Self, DecodeError>;
}

impl Scalar for String {
    fn mock() -> Self {
        String::new()
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::String(s) => Ok(s.as_str().to_owned()),
            other => Err(mismatch("a string", other)),
        }
    }
}

impl Scalar for i32 {
    fn mock() -> Self {
        0
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        value
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| mismatch("an Int", value))
    }
}

impl Scalar for i64 {
    fn mock() -> Self {
        0
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        value.as_i64().ok_or_else(|| mismatch("an integer", value))
    }
}

impl Scalar for f64 {
    fn mock() -> Self {
        0.0
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        value.as_f64().ok_or_else(|| mismatch("a Float", value))
    }
}

impl Scalar for bool {
    fn mock() -> Self {
        false
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("a Boolean", other)),
        }
    }
}

/// Raw passthrough, for schema scalars with no narrower representation.
impl Scalar for Value {
    fn mock() -> Self {
        Value::Null
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        Ok(value.clone())
    }
}

impl<S: Scalar> Scalar for Option<S> {
    fn mock() -> Self {
        None
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(None),
            other => S::decode(other).map(Some),
        }
    }
}

impl<S: Scalar> Scalar for Vec<S> {
    fn mock() -> Self {
        Vec::new()
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Array(items) => items.iter().map(S::decode).collect(),
            other => Err(mismatch("a list", other)),
        }
    }
}

fn mismatch(expected: &str, found: &Value) -> DecodeError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    };
    DecodeError::new(format!("expected {expected}, found {found}"))
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn mocks_are_the_canonical_empty_values() {
        assert_eq!(String::mock(), "");
        assert_eq!(i32::mock(), 0);
        assert_eq!(f64::mock(), 0.0);
        assert!(!bool::mock());
        assert_eq!(Option::<String>::mock(), None);
        assert_eq!(Vec::<i32>::mock(), Vec::<i32>::new());
    }

    #[test]
    fn nullable_accepts_null_and_values() {
        assert_eq!(Option::<i32>::decode(&Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::decode(&json!(4)).unwrap(), Some(4));
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let err = String::decode(&json!(12)).unwrap_err();
        assert_eq!(err.reason(), "expected a string, found a number");
        assert!(i32::decode(&json!(i64::MAX)).is_err());
    }
}
