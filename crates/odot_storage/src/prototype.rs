//! Prototypes: the behavior descriptor shared by every instance of a kind.
//!
//! A prototype holds a method table, a field table (calculated, to-one and
//! to-many fields), the kind's ephemeral field names, and default data
//! values. Instances keep only a kind tag, so swapping a kind's prototype in
//! the registry is all a hot reload needs.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use odot_foundation::{EntityRef, Kind, Record, Result, Value};

use crate::entity::Entity;
use crate::store::Store;
use crate::view::View;

/// Computes a calculated field from the instance when no override is stored.
///
/// Returning `Value::Null` means "no value".
pub type Calculator = Arc<dyn Fn(&View<'_>) -> Value + Send + Sync>;

/// A prototype method. Receives the whole store, the instance it was
/// invoked on, and the call arguments.
pub type Method = Arc<dyn Fn(&mut Store, &EntityRef, &[Value]) -> Result<Value> + Send + Sync>;

/// Post-processes an instance's record before it is written to the document.
pub type SerializeHook = Arc<dyn Fn(&Entity, Record) -> Record + Send + Sync>;

/// How a declared field is backed.
#[derive(Clone)]
pub enum FieldKind {
    /// Shadow override, falling back to the calculator.
    Calculated(Calculator),
    /// Shadow id resolved against the target kind.
    One(Kind),
    /// Shadow id sequence resolved against the target kind.
    Many(Kind),
}

impl FieldKind {
    /// Short label for messages.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Calculated(_) => "calculated",
            Self::One(_) => "one",
            Self::Many(_) => "many",
        }
    }

    /// The kind a relationship field resolves against.
    #[must_use]
    pub const fn target(&self) -> Option<&Kind> {
        match self {
            Self::Calculated(_) => None,
            Self::One(kind) | Self::Many(kind) => Some(kind),
        }
    }
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calculated(_) => f.write_str("Calculated"),
            Self::One(kind) => write!(f, "One({kind})"),
            Self::Many(kind) => write!(f, "Many({kind})"),
        }
    }
}

/// Behavior descriptor for one kind.
///
/// Built by a [`DefinitionScope`](crate::DefinitionScope); immutable once
/// installed in the registry.
#[derive(Clone)]
pub struct Prototype {
    pub(crate) kind: Kind,
    pub(crate) fields: IndexMap<String, FieldKind>,
    pub(crate) ephemera: Vec<String>,
    pub(crate) defaults: Record,
    pub(crate) methods: IndexMap<String, Method>,
    pub(crate) serialize_hook: Option<SerializeHook>,
}

impl Prototype {
    pub(crate) fn empty(kind: Kind) -> Self {
        Self {
            kind,
            fields: IndexMap::new(),
            ephemera: Vec::new(),
            defaults: Record::new(),
            methods: IndexMap::new(),
            serialize_hook: None,
        }
    }

    /// Returns the kind this prototype describes.
    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Returns the declaration for a field, if it is not a plain field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }

    /// Iterates declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), kind))
    }

    /// Returns the ephemeral field names.
    #[must_use]
    pub fn ephemera(&self) -> &[String] {
        &self.ephemera
    }

    /// Returns true if `name` is never written to the document.
    #[must_use]
    pub fn is_ephemeral(&self, name: &str) -> bool {
        self.ephemera.iter().any(|e| e == name)
    }

    /// Returns a prototype-level default value.
    #[must_use]
    pub fn default_value(&self, name: &str) -> Option<&Value> {
        self.defaults.get(name)
    }

    /// Returns all default values.
    #[must_use]
    pub fn defaults(&self) -> &Record {
        &self.defaults
    }

    /// Returns a method by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// Iterates method names in declaration order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Produces the record written to the document for `entity`: its own
    /// fields minus ephemeral ones, passed through the custom hook if any.
    ///
    /// The live entity is left untouched.
    #[must_use]
    pub fn serialize(&self, entity: &Entity) -> Record {
        let mut record = entity.to_record();
        for name in &self.ephemera {
            record.remove(name);
        }
        match &self.serialize_hook {
            Some(hook) => hook(entity, record),
            None => record,
        }
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prototype")
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .field("ephemera", &self.ephemera)
            .field("defaults", &self.defaults)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("serialize_hook", &self.serialize_hook.is_some())
            .finish()
    }
}
