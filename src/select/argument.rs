//! Typed field arguments and the stable content hash used for aliasing.

use serde::Serialize;
use serde_json_bytes::Value;
use sha2::Digest;
use sha2::Sha256;

/// One argument of a requested field: its GraphQL name, its declared wire
/// type (e.g. `"Int"`, `"String!"`), and an encoded value.
///
/// The value is three-state: omitted entirely (the argument appears in
/// neither the wire query nor the hash input), explicitly `null`, or a
/// concrete scalar/object/list. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    name: &'static str,
    type_name: &'static str,
    value: Option<Value>,
}

impl Argument {
    /// Encodes a typed value into a wire-ready argument.
    ///
    /// A value that cannot be represented as a GraphQL value is a static
    /// contract violation by the generated bindings, not a runtime
    /// condition, so encoding failure panics rather than returning a
    /// `Result`.
    pub fn new<V: Serialize>(name: &'static str, type_name: &'static str, value: &V) -> Self {
        let value = match serde_json_bytes::to_value(value) {
            Ok(value) => value,
            Err(err) => panic!("argument `{name}` cannot be encoded as a GraphQL value: {err}"),
        };
        Self {
            name,
            type_name,
            value: Some(value),
        }
    }

    /// An argument the caller chose not to provide. It is absent from the
    /// composed query, the variables section and the alias hash.
    pub fn omitted(name: &'static str, type_name: &'static str) -> Self {
        Self {
            name,
            type_name,
            value: None,
        }
    }

    /// An argument explicitly set to `null`. Unlike [`Argument::omitted`]
    /// this is sent over the wire and participates in the hash.
    pub fn null(name: &'static str, type_name: &'static str) -> Self {
        Self {
            name,
            type_name,
            value: Some(Value::Null),
        }
    }

    /// Builds an argument from an optional value, omitting it when absent.
    /// This is the shape generated bindings use for optional parameters.
    pub fn optional<V: Serialize>(
        name: &'static str,
        type_name: &'static str,
        value: &Option<V>,
    ) -> Self {
        match value {
            Some(value) => Self::new(name, type_name, value),
            None => Self::omitted(name, type_name),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The encoded value, or `None` when the argument is omitted.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub(crate) fn is_present(&self) -> bool {
        self.value.is_some()
    }

    /// The content hash of this argument, used as its variable key in the
    /// composed query. `None` when the argument is omitted.
    pub(crate) fn hash(&self) -> Option<String> {
        self.value
            .as_ref()
            .map(|value| truncated_sha256(&hash_input(self.name, value)))
    }
}

/// Hashes the present arguments of one field into the 8-hex-char suffix
/// of its alias.
///
/// The input is the concatenation of `name:canonical(value);` for every
/// present argument, sorted by argument name, so the hash is independent
/// of declaration order and stable across repeated selection builds.
/// Golden-query tests depend on this exact scheme (SHA-256, first 8 hex
/// characters).
pub(crate) fn arguments_hash(arguments: &[Argument]) -> String {
    let mut inputs: Vec<String> = arguments
        .iter()
        .filter_map(|argument| {
            argument
                .value
                .as_ref()
                .map(|value| hash_input(argument.name, value))
        })
        .collect();
    inputs.sort();
    truncated_sha256(&inputs.concat())
}

fn hash_input(name: &str, value: &Value) -> String {
    format!("{name}:{};", canonical(value))
}

fn truncated_sha256(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..4])
}

/// Renders a value in a canonical textual form: JSON-shaped, with object
/// keys visited in sorted order so that two structurally equal values
/// always hash identically. Internal to hashing, never sent on the wire.
fn canonical(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("{:?}", s.as_str()),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(object) => {
            let mut keys: Vec<&str> = object.keys().map(|key| key.as_str()).collect();
            keys.sort_unstable();
            let entries: Vec<String> = keys
                .iter()
                .map(|key| {
                    // Key presence is guaranteed, we iterate the same map.
                    let value = object.get(*key).unwrap_or(&Value::Null);
                    format!("{:?}:{}", key, canonical(value))
                })
                .collect();
            format!("{{{}}}", entries.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn hash_is_stable_across_encodings() {
        let first = arguments_hash(&[Argument::new("take", "Int", &5)]);
        let second = arguments_hash(&[Argument::new("take", "Int", &5)]);
        assert_eq!(first, second);
        assert_eq!(first, "fd747326");
    }

    #[test]
    fn hash_is_independent_of_declaration_order() {
        let forward = arguments_hash(&[
            Argument::new("name", "String", &"x"),
            Argument::new("take", "Int", &5),
        ]);
        let backward = arguments_hash(&[
            Argument::new("take", "Int", &5),
            Argument::new("name", "String", &"x"),
        ]);
        assert_eq!(forward, backward);
        assert_eq!(forward, "e7a36fe2");
    }

    #[test]
    fn omitted_arguments_do_not_affect_the_hash() {
        let with_omitted = arguments_hash(&[
            Argument::new("take", "Int", &5),
            Argument::omitted("name", "String"),
        ]);
        let without = arguments_hash(&[Argument::new("take", "Int", &5)]);
        assert_eq!(with_omitted, without);
    }

    #[test]
    fn explicit_null_differs_from_omitted() {
        let null = arguments_hash(&[Argument::null("title", "String")]);
        let omitted = arguments_hash(&[Argument::omitted("title", "String")]);
        assert_ne!(null, omitted);
        assert_eq!(omitted, arguments_hash(&[]));
    }

    #[test]
    fn object_values_hash_independently_of_key_order() {
        let a = json!({"take": 5, "offset": 1});
        let b = json!({"offset": 1, "take": 5});
        assert_eq!(
            arguments_hash(&[Argument::new("filter", "Filter", &a)]),
            arguments_hash(&[Argument::new("filter", "Filter", &b)]),
        );
    }

    #[test]
    #[should_panic(expected = "cannot be encoded as a GraphQL value")]
    fn unencodable_value_fails_fast() {
        // Maps with non-string keys have no JSON representation.
        let mut bogus: BTreeMap<Vec<u8>, i32> = BTreeMap::new();
        bogus.insert(vec![1, 2], 3);
        let _ = Argument::new("filter", "Filter", &bogus);
    }
}
