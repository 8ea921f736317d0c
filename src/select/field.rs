//! Immutable descriptors for requested fields.

use crate::select::argument::Argument;
use crate::select::argument::arguments_hash;

/// The discriminator key servers attach to polymorphic payloads.
pub(crate) const TYPENAME: &str = "__typename";

/// One requested field, recorded by a selection build. Immutable once
/// created.
///
/// Leaf and composite fields carry a deterministic alias derived from the
/// field name and the hash of its arguments, so two requests for the same
/// field with different arguments coexist in one query without colliding.
#[derive(Debug, Clone)]
pub enum Field {
    /// A scalar field with no nested selection.
    Leaf {
        name: &'static str,
        arguments: Vec<Argument>,
    },
    /// An object or list field carrying the nested selection it was built
    /// with.
    Composite {
        name: &'static str,
        arguments: Vec<Argument>,
        selection: Vec<Field>,
    },
    /// One `... on Type` block of a polymorphic field.
    Fragment {
        type_condition: &'static str,
        selection: Vec<Field>,
    },
    /// The bare `__typename` discriminator, rendered without an alias.
    Typename,
}

impl Field {
    pub fn leaf(name: &'static str, arguments: Vec<Argument>) -> Self {
        Field::Leaf { name, arguments }
    }

    pub fn composite(
        name: &'static str,
        arguments: Vec<Argument>,
        selection: Vec<Field>,
    ) -> Self {
        Field::Composite {
            name,
            arguments,
            selection,
        }
    }

    pub fn fragment(type_condition: &'static str, selection: Vec<Field>) -> Self {
        Field::Fragment {
            type_condition,
            selection,
        }
    }

    /// The alias this field is requested (and its value returned) under,
    /// or `None` for fragments and `__typename`.
    pub fn alias(&self) -> Option<String> {
        match self {
            Field::Leaf { name, arguments } | Field::Composite {
                name, arguments, ..
            } => Some(alias_for(name, arguments)),
            Field::Fragment { .. } | Field::Typename => None,
        }
    }

    pub(crate) fn arguments(&self) -> &[Argument] {
        match self {
            Field::Leaf { arguments, .. } | Field::Composite { arguments, .. } => arguments,
            Field::Fragment { .. } | Field::Typename => &[],
        }
    }
}

/// Derives the deterministic alias of a field from its name and the hash
/// of its present arguments.
pub(crate) fn alias_for(name: &str, arguments: &[Argument]) -> String {
    format!("{name}_{}", arguments_hash(arguments))
}
