//! Reusable, replayable typed selections.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json_bytes::Value;

use crate::error::DecodeError;
use crate::select::field::Field;
use crate::select::fields::Fields;
use crate::select::fields::State;

/// A typed, replayable description of which fields to request and how to
/// turn the response into an `R`.
///
/// `T` is the type-lock: a `Selection<R, T>` can only be passed to field
/// accessors whose result type is `T`, so requesting a field that does
/// not exist on the current type fails to compile. The same selection
/// value is replayed to build the query text, to decode a response, and
/// to produce a mock; each replay runs against a fresh [`Fields`]
/// accumulator.
pub struct Selection<R, T> {
    decoder: Arc<dyn Fn(&mut Fields<T>) -> Result<R, DecodeError> + Send + Sync>,
}

impl<R, T> Clone for Selection<R, T> {
    fn clone(&self) -> Self {
        Self {
            decoder: Arc::clone(&self.decoder),
        }
    }
}

/// Marker for the type-lock of a list field. Produced by
/// [`Selection::list`], never constructed.
pub struct ListOf<T> {
    lock: PhantomData<fn() -> T>,
}

/// Marker for the type-lock of a nullable field. Produced by
/// [`Selection::nullable`], never constructed.
pub struct NullableOf<T> {
    lock: PhantomData<fn() -> T>,
}

impl<R: 'static, T: 'static> Selection<R, T> {
    /// Wraps an accessor body into a selection. Generated bindings call
    /// this with a closure that reads fields off the [`Fields`] argument.
    pub fn new(
        decoder: impl Fn(&mut Fields<T>) -> Result<R, DecodeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            decoder: Arc::new(decoder),
        }
    }

    /// Decodes response data shaped as this selection's query requested.
    pub fn decode(&self, data: &Value) -> Result<R, DecodeError> {
        self.decode_value(data)
    }

    /// Produces the deterministic placeholder value of this selection
    /// without touching any data.
    pub fn mock(&self) -> Result<R, DecodeError> {
        let mut fields = Fields::mocking();
        (self.decoder)(&mut fields)
    }

    /// Harvests the descriptor list of one build. The run happens in
    /// mocking mode purely for its `select` side effects; the returned
    /// list is freshly allocated on every call.
    pub(crate) fn fields(&self) -> Vec<Field> {
        let mut fields = Fields::mocking();
        let _ = (self.decoder)(&mut fields);
        fields.into_selection()
    }

    pub(crate) fn decode_value(&self, data: &Value) -> Result<R, DecodeError> {
        let mut fields = Fields::decoding(data.clone());
        let decoded = (self.decoder)(&mut fields)?;
        fields.ensure_known_keys()?;
        Ok(decoded)
    }

    /// Projects the decoded value. The descriptor list is unchanged.
    pub fn map<R2: 'static>(
        self,
        f: impl Fn(R) -> R2 + Send + Sync + 'static,
    ) -> Selection<R2, T> {
        Selection {
            decoder: Arc::new(move |fields| (self.decoder)(fields).map(&f)),
        }
    }

    /// Adapts this selection to a list field: the data is expected to be
    /// an array and this selection decodes every element. Mocks to an
    /// empty list.
    pub fn list(self) -> Selection<Vec<R>, ListOf<T>> {
        Selection::new(move |fields: &mut Fields<ListOf<T>>| {
            for field in self.fields() {
                fields.select(field);
            }
            match fields.state() {
                State::Decoding(data) => match data.as_array() {
                    Some(items) => items.iter().map(|item| self.decode_value(item)).collect(),
                    None => Err(DecodeError::new("expected a list")),
                },
                State::Mocking => Ok(Vec::new()),
            }
        })
    }

    /// Adapts this selection to a nullable field: absent data becomes
    /// `None` instead of failing. The underlying descriptor list is not
    /// altered. Mocks to `None`.
    pub fn nullable(self) -> Selection<Option<R>, NullableOf<T>> {
        Selection::new(move |fields: &mut Fields<NullableOf<T>>| {
            for field in self.fields() {
                fields.select(field);
            }
            match fields.state() {
                State::Decoding(data) => {
                    if data.is_null() {
                        Ok(None)
                    } else {
                        self.decode_value(data).map(Some)
                    }
                }
                State::Mocking => Ok(None),
            }
        })
    }
}

/// One declared concrete variant of a polymorphic field: its type
/// condition and the (type-erased) selection to run when the
/// discriminator resolves to it.
pub struct Fragment<R> {
    type_condition: &'static str,
    fields: Vec<Field>,
    decode: Box<dyn Fn(&Value) -> Result<R, DecodeError>>,
    mock: Box<dyn Fn() -> Result<R, DecodeError>>,
}

impl<R: 'static> Fragment<R> {
    /// Declares that when the payload's concrete type is `type_condition`,
    /// `selection` decodes it.
    pub fn on<U: 'static>(type_condition: &'static str, selection: Selection<R, U>) -> Self {
        let fields = selection.fields();
        let mock_selection = selection.clone();
        Self {
            type_condition,
            fields,
            decode: Box::new(move |value| selection.decode_value(value)),
            mock: Box::new(move || mock_selection.mock()),
        }
    }

    pub(crate) fn type_condition(&self) -> &'static str {
        self.type_condition
    }

    pub(crate) fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn decode(&self, value: &Value) -> Result<R, DecodeError> {
        (self.decode)(value)
    }

    pub(crate) fn mock(&self) -> Result<R, DecodeError> {
        (self.mock)()
    }
}
