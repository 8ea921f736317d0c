//! The dual-mode field accumulator selections run against.

use std::collections::HashSet;
use std::marker::PhantomData;

use serde_json_bytes::Value;

use crate::error::DecodeError;
use crate::graphql::Object;
use crate::select::argument::Argument;
use crate::select::field::Field;
use crate::select::field::TYPENAME;
use crate::select::field::alias_for;
use crate::select::scalar::Scalar;
use crate::select::selection::Fragment;
use crate::select::selection::Selection;

/// The operating mode of one selection run: producing real values out of
/// decoded response data, or deterministic placeholders.
pub(crate) enum State {
    Decoding(Value),
    Mocking,
}

/// The call-local accumulator a selection's accessors append to.
///
/// `T` is the type-lock: generated bindings define field accessors only
/// for the matching marker type, which is what makes an invalid field
/// request a compile error. A fresh `Fields` is allocated for every
/// build, decode and mock run, so replays of one selection never share a
/// descriptor list.
pub struct Fields<T> {
    selection: Vec<Field>,
    state: State,
    lock: PhantomData<fn() -> T>,
}

impl<T> Fields<T> {
    pub(crate) fn decoding(data: Value) -> Self {
        Self {
            selection: Vec::new(),
            state: State::Decoding(data),
            lock: PhantomData,
        }
    }

    pub(crate) fn mocking() -> Self {
        Self {
            selection: Vec::new(),
            state: State::Mocking,
            lock: PhantomData,
        }
    }

    /// Appends a field descriptor to this run's selection. Side effect
    /// only: it never influences the value an accessor returns.
    pub fn select(&mut self, field: Field) {
        self.selection.push(field);
    }

    pub(crate) fn state(&self) -> &State {
        &self.state
    }

    pub(crate) fn into_selection(self) -> Vec<Field> {
        self.selection
    }

    /// Reads a scalar field: records the descriptor, then either looks the
    /// value up by the field's alias or returns the scalar's placeholder.
    pub fn leaf<V: Scalar>(
        &mut self,
        name: &'static str,
        arguments: Vec<Argument>,
    ) -> Result<V, DecodeError> {
        let alias = alias_for(name, &arguments);
        self.select(Field::leaf(name, arguments));
        match &self.state {
            State::Decoding(data) => {
                let value = field_value(data, name, &alias)?;
                V::decode(value)
                    .map_err(|err| DecodeError::new(format!("field `{name}`: {}", err.reason())))
            }
            State::Mocking => Ok(V::mock()),
        }
    }

    /// Reads a nested object or list field, delegating to the nested
    /// selection with the aliased slice of the data (or nothing, when
    /// mocking).
    pub fn composite<R: 'static, U: 'static>(
        &mut self,
        name: &'static str,
        arguments: Vec<Argument>,
        selection: &Selection<R, U>,
    ) -> Result<R, DecodeError> {
        let alias = alias_for(name, &arguments);
        self.select(Field::composite(name, arguments, selection.fields()));
        match &self.state {
            State::Decoding(data) => {
                let value = field_value(data, name, &alias)?;
                selection.decode_value(value)
            }
            State::Mocking => selection.mock(),
        }
    }

    /// Reads a polymorphic (union or interface) field.
    ///
    /// Selects `__typename` plus one fragment per declared variant. When
    /// decoding, dispatches on the discriminator and runs only the
    /// matching variant's selection against a slice restricted to that
    /// variant's own fields. When mocking, always the first declared
    /// variant.
    pub fn fragments<R: 'static>(&mut self, variants: Vec<Fragment<R>>) -> Result<R, DecodeError> {
        self.select(Field::Typename);
        for variant in &variants {
            self.select(Field::fragment(
                variant.type_condition(),
                variant.fields().to_vec(),
            ));
        }
        match &self.state {
            State::Decoding(data) => {
                let object = data
                    .as_object()
                    .ok_or_else(|| DecodeError::new("expected an object for a polymorphic field"))?;
                let type_name = object
                    .get(TYPENAME)
                    .and_then(|value| value.as_str())
                    .ok_or_else(|| {
                        DecodeError::new(format!("missing `{TYPENAME}` discriminator"))
                    })?;
                let variant = variants
                    .iter()
                    .find(|variant| variant.type_condition() == type_name)
                    .ok_or_else(|| {
                        DecodeError::new(format!(
                            "discriminator `{type_name}` matches no declared variant"
                        ))
                    })?;
                variant.decode(&variant_slice(object, variant.fields(), type_name))
            }
            State::Mocking => match variants.first() {
                Some(variant) => variant.mock(),
                None => Err(DecodeError::new(
                    "polymorphic selection declares no variants",
                )),
            },
        }
    }

    /// Guards against server or schema drift: any key of an object-shaped
    /// payload that this run never selected (other than the discriminator)
    /// is a structural error.
    pub(crate) fn ensure_known_keys(&self) -> Result<(), DecodeError> {
        let State::Decoding(Value::Object(object)) = &self.state else {
            return Ok(());
        };
        let mut known = HashSet::new();
        known.insert(TYPENAME.to_owned());
        response_keys(&self.selection, &mut known);
        for key in object.keys() {
            if !known.contains(key.as_str()) {
                return Err(DecodeError::new(format!(
                    "unexpected key `{}` in response object",
                    key.as_str()
                )));
            }
        }
        Ok(())
    }
}

fn field_value<'a>(data: &'a Value, name: &str, alias: &str) -> Result<&'a Value, DecodeError> {
    let object = data
        .as_object()
        .ok_or_else(|| DecodeError::new(format!("expected an object while reading `{name}`")))?;
    object.get(alias).ok_or_else(|| {
        DecodeError::new(format!("missing required field `{name}` (alias `{alias}`)"))
    })
}

/// The response keys a selection can legitimately produce: field aliases,
/// the discriminator, and — fragments being inlined — the keys of every
/// fragment's own selection.
fn response_keys(fields: &[Field], keys: &mut HashSet<String>) {
    for field in fields {
        match field {
            Field::Typename => {
                keys.insert(TYPENAME.to_owned());
            }
            Field::Fragment { selection, .. } => response_keys(selection, keys),
            field => {
                if let Some(alias) = field.alias() {
                    keys.insert(alias);
                }
            }
        }
    }
}

/// Rebuilds a concrete-typed view of a polymorphic payload: only the
/// resolved variant's own fields plus the discriminator survive.
fn variant_slice(object: &Object, variant_fields: &[Field], type_name: &str) -> Value {
    let mut keys = HashSet::new();
    response_keys(variant_fields, &mut keys);
    let mut slice = Object::with_capacity(keys.len() + 1);
    slice.insert(TYPENAME, Value::String(type_name.to_owned().into()));
    for (key, value) in object.iter() {
        if keys.contains(key.as_str()) {
            slice.insert(key.clone(), value.clone());
        }
    }
    Value::Object(slice)
}
