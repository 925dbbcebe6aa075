//! Read-only, delegating views of stored entities.
//!
//! A [`View`] pairs an entity with the store it lives in, so field reads can
//! follow the delegation chain (own fields → inherits-from ancestors →
//! prototype defaults) and relationship reads can resolve ids against the
//! store at access time. Nothing is cached: a view taken after a mutation
//! always sees the current graph.

use std::fmt;
use std::sync::Arc;

use odot_foundation::{EntityId, EntityRef, ID_FIELD, Kind, Value, shadow_name, value_to_id, value_to_ids};

use crate::entity::Entity;
use crate::prototype::{FieldKind, Prototype};
use crate::store::Store;

/// A stored entity seen through its kind's prototype.
#[derive(Clone, Copy)]
pub struct View<'a> {
    store: &'a Store,
    entity: &'a Entity,
}

impl<'a> View<'a> {
    pub(crate) const fn new(store: &'a Store, entity: &'a Entity) -> Self {
        Self { store, entity }
    }

    /// The underlying entity.
    #[must_use]
    pub const fn entity(&self) -> &'a Entity {
        self.entity
    }

    /// The store the entity lives in.
    #[must_use]
    pub const fn store(&self) -> &'a Store {
        self.store
    }

    /// The entity's kind.
    #[must_use]
    pub fn kind(&self) -> &'a Kind {
        self.entity.kind()
    }

    /// The entity's id.
    #[must_use]
    pub fn id(&self) -> Option<&'a EntityId> {
        self.entity.id()
    }

    /// A reference to the entity, if it has an id.
    #[must_use]
    pub fn reference(&self) -> Option<EntityRef> {
        self.id()
            .map(|id| EntityRef::new(self.kind().clone(), id.clone()))
    }

    /// The kind's installed prototype.
    #[must_use]
    pub fn prototype(&self) -> Option<&'a Arc<Prototype>> {
        self.store.prototype(self.kind().as_str())
    }

    /// The instance this entity inherits from, if it is still stored.
    #[must_use]
    pub fn ancestor(&self) -> Option<View<'a>> {
        let ancestor = self.entity.inherits()?;
        self.store.view_of(self.kind().as_str(), ancestor.as_str())
    }

    /// Finds the raw stored value for `name` along the delegation chain.
    ///
    /// Own fields win, then each inherits-from ancestor's own fields, then
    /// the prototype's defaults.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        let mut current = Some(*self);
        // Bounded walk: a chain can never be longer than the kind's size.
        let mut remaining = self.store.count(self.kind().as_str()) + 1;
        while let Some(view) = current {
            if let Some(value) = view.entity.own(name) {
                return Some(value);
            }
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            current = view.ancestor();
        }
        self.prototype().and_then(|proto| proto.default_value(name))
    }

    /// Reads a field.
    ///
    /// - `id` reads the entity's id.
    /// - Calculated fields return the stored override, else the calculator's
    ///   result.
    /// - Relationship fields return their raw shadow ids; use
    ///   [`View::one`] / [`View::many`] to resolve them.
    /// - Anything else is a plain field read through delegation.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == ID_FIELD {
            return self.id().map(|id| Value::String(id.as_str().to_owned()));
        }
        match self.field_kind(name) {
            Some(FieldKind::Calculated(calculator)) => {
                match self.lookup(&shadow_name(name)) {
                    Some(value) if !value.is_null() => Some(value.clone()),
                    _ => {
                        let value = calculator(self);
                        (!value.is_null()).then_some(value)
                    }
                }
            }
            Some(FieldKind::One(_) | FieldKind::Many(_)) => {
                self.lookup(&shadow_name(name)).cloned()
            }
            None => self.lookup(name).cloned(),
        }
    }

    /// Resolves a to-one relationship. Unset, undeclared, or dangling
    /// relationships read as `None`.
    #[must_use]
    pub fn one(&self, name: &str) -> Option<View<'a>> {
        let Some(FieldKind::One(target)) = self.field_kind(name) else {
            return None;
        };
        let id = value_to_id(self.lookup(&shadow_name(name))?)?;
        self.store.view_of(target.as_str(), id.as_str())
    }

    /// Resolves a to-many relationship in stored order. Dangling ids keep
    /// their slot as `None`; unset or undeclared relationships are empty.
    #[must_use]
    pub fn many(&self, name: &str) -> Vec<Option<View<'a>>> {
        let Some(FieldKind::Many(target)) = self.field_kind(name) else {
            return Vec::new();
        };
        self.resolve_all(target.as_str(), &shadow_name(name))
    }

    /// Resolves the inverse index kept by `add`/`remove` for entities of
    /// `kind` (stored in `i<kind>`).
    #[must_use]
    pub fn inverse(&self, kind: &str) -> Vec<Option<View<'a>>> {
        self.resolve_all(kind, &shadow_name(kind))
    }

    /// The raw ids in the inverse index for `kind`.
    #[must_use]
    pub fn inverse_ids(&self, kind: &str) -> Vec<EntityId> {
        self.lookup(&shadow_name(kind))
            .map(value_to_ids)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect()
    }

    fn resolve_all(&self, target: &str, shadow: &str) -> Vec<Option<View<'a>>> {
        let Some(raw) = self.lookup(shadow) else {
            return Vec::new();
        };
        value_to_ids(raw)
            .into_iter()
            .map(|slot| slot.and_then(|id| self.store.view_of(target, id.as_str())))
            .collect()
    }

    fn field_kind(&self, name: &str) -> Option<&'a FieldKind> {
        self.prototype().and_then(|proto| proto.field(name))
    }
}

impl fmt::Debug for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("kind", self.kind())
            .field("id", &self.id())
            .field("fields", self.entity.fields())
            .finish()
    }
}
