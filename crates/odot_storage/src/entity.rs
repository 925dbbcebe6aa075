//! Entity instances.
//!
//! An entity stores only its own data. Behavior (methods, calculated fields,
//! relationship accessors, defaults) lives on its kind's prototype and is
//! reached through the store, so redefining a prototype changes every live
//! instance without touching stored fields.

use odot_foundation::{EntityId, ID_FIELD, INHERITS_FIELD, Kind, Record, Value};

/// One instance of a kind.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    /// The kind whose prototype this entity delegates to.
    kind: Kind,
    /// Id within the kind; detached entities have none.
    id: Option<EntityId>,
    /// Same-kind instance this entity delegates data lookups to first.
    inherits: Option<EntityId>,
    /// Own stored fields, including shadow fields.
    fields: Record,
}

impl Entity {
    /// Creates a detached entity of the given kind with no fields.
    #[must_use]
    pub fn new(kind: impl Into<Kind>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            inherits: None,
            fields: Record::new(),
        }
    }

    /// Creates a detached entity that inherits from `ancestor`.
    ///
    /// The inherits-from link is only recorded when the ancestor has an id.
    #[must_use]
    pub fn derived_from(ancestor: &Entity) -> Self {
        Self {
            kind: ancestor.kind.clone(),
            id: None,
            inherits: ancestor.id.clone(),
            fields: Record::new(),
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the inherits-from id.
    #[must_use]
    pub fn inheriting(mut self, ancestor: Option<EntityId>) -> Self {
        self.inherits = ancestor;
        self
    }

    /// Adds an own field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_own(name, value.into());
        self
    }

    /// Returns the kind.
    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Returns the id, if the entity has one.
    #[must_use]
    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    /// Returns the id of the instance this entity inherits from.
    #[must_use]
    pub fn inherits(&self) -> Option<&EntityId> {
        self.inherits.as_ref()
    }

    /// Returns all own fields in insertion order.
    #[must_use]
    pub fn fields(&self) -> &Record {
        &self.fields
    }

    /// Returns an own field, ignoring inheritance and prototype defaults.
    #[must_use]
    pub fn own(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns an own field for in-place mutation.
    pub fn own_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    /// Returns true if the entity stores `name` itself.
    #[must_use]
    pub fn has_own(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Stores an own field, returning the previous value.
    ///
    /// The id and inherits-from fields live outside the field map; writes
    /// to those names are ignored.
    pub fn set_own(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        if odot_foundation::is_reserved_field(&name) {
            return None;
        }
        self.fields.insert(name, value)
    }

    /// Deletes an own field, returning its value.
    pub fn remove_own(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Returns the entity as a flat record: `id`, then `iproto` when
    /// inherited, then every own field.
    #[must_use]
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        if let Some(id) = &self.id {
            record.insert(ID_FIELD.to_owned(), Value::String(id.as_str().to_owned()));
        }
        if let Some(ancestor) = &self.inherits {
            record.insert(
                INHERITS_FIELD.to_owned(),
                Value::String(ancestor.as_str().to_owned()),
            );
        }
        for (name, value) in &self.fields {
            record.insert(name.clone(), value.clone());
        }
        record
    }
}
