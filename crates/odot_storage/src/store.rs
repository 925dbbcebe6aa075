//! The entity store: kind → (id → entity), plus the prototype registry the
//! entities delegate to.
//!
//! The store is the single live graph. Persistence and the console hold it by
//! reference and repopulate it in place, so a handle taken before a reload
//! stays valid after it.

use std::sync::Arc;

use indexmap::IndexMap;
use odot_foundation::{
    EntityId, EntityRef, Error, ErrorKind, Kind, Result, Value, is_reserved_field, shadow_name,
};
use tracing::debug;

use crate::entity::Entity;
use crate::prototype::{FieldKind, Prototype};
use crate::registry::Registry;
use crate::scope::PrototypeSource;
use crate::view::View;

/// Entities of one kind, keyed by id in insertion order.
pub type Entries = IndexMap<EntityId, Entity>;

/// The live object graph.
#[derive(Debug, Default)]
pub struct Store {
    registry: Registry,
    entries: IndexMap<Kind, Entries>,
}

impl Store {
    /// Creates an empty store with no registered kinds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the prototype registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the prototype registry mutably.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Returns the installed prototype for a kind.
    #[must_use]
    pub fn prototype(&self, kind: &str) -> Option<&Arc<Prototype>> {
        self.registry.prototype(kind)
    }

    /// Records where a kind's behavior lives. Nothing runs until the next
    /// recode or load.
    pub fn register_source(&mut self, kind: impl Into<Kind>, source: Arc<dyn PrototypeSource>) {
        self.registry.register_source(kind.into(), source);
    }

    /// Registers and immediately defines a kind, creating its (empty) entry
    /// map if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails; the previous prototype, if any,
    /// stays installed.
    pub fn define_prototype(
        &mut self,
        kind: impl Into<Kind>,
        source: Arc<dyn PrototypeSource>,
    ) -> Result<()> {
        let kind = kind.into();
        let result = self.registry.define_prototype(kind.clone(), source);
        self.entries.entry(kind).or_default();
        result
    }

    /// Re-runs every registered prototype source without touching stored
    /// data.
    ///
    /// # Errors
    ///
    /// Returns the first definition failure; other kinds are still recoded.
    pub fn recode(&mut self) -> Result<()> {
        let result = self.registry.recode();
        self.ensure_registered_kinds();
        result
    }

    /// Returns true if the kind is registered or holds entities.
    #[must_use]
    pub fn has_kind(&self, kind: &str) -> bool {
        self.registry.is_registered(kind) || self.entries.contains_key(kind)
    }

    /// Creates an entity of `kind` under `id`, delegating first to the
    /// same-kind instance `ancestor` when given, else to the prototype.
    ///
    /// An existing entity with the same id is replaced in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is unknown, the ancestor does not exist,
    /// or the ancestor chain would loop back to `id`.
    pub fn construct(
        &mut self,
        kind: impl Into<Kind>,
        id: impl Into<EntityId>,
        ancestor: Option<&EntityId>,
    ) -> Result<EntityRef> {
        let kind = kind.into();
        let id = id.into();
        if !self.has_kind(kind.as_str()) {
            return Err(Error::unknown_kind(&kind));
        }

        if let Some(ancestor) = ancestor {
            if self.get(kind.as_str(), ancestor.as_str()).is_none() {
                return Err(Error::entity_not_found(&EntityRef::new(
                    kind.clone(),
                    ancestor.clone(),
                )));
            }
            if self.chain_reaches(&kind, ancestor, &id) {
                return Err(Error::new(ErrorKind::InheritanceCycle {
                    kind: kind.to_string(),
                    id: id.to_string(),
                }));
            }
        }

        let entity = Entity::new(kind.clone())
            .with_id(id.clone())
            .inheriting(ancestor.cloned());
        debug!(%kind, %id, ancestor = ?ancestor, "constructed entity");
        self.entries.entry(kind.clone()).or_default().insert(id.clone(), entity);
        Ok(EntityRef { kind, id })
    }

    /// Creates an instance of `kind` without storing it, delegating to the
    /// same-kind instance `ancestor` when given. Give it an id and
    /// [`insert`](Self::insert) it to store it.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is unknown or the ancestor does not exist.
    pub fn detached(&self, kind: impl Into<Kind>, ancestor: Option<&EntityId>) -> Result<Entity> {
        let kind = kind.into();
        if !self.has_kind(kind.as_str()) {
            return Err(Error::unknown_kind(&kind));
        }
        let Some(ancestor) = ancestor else {
            return Ok(Entity::new(kind));
        };
        self.get(kind.as_str(), ancestor.as_str())
            .map(Entity::derived_from)
            .ok_or_else(|| Error::entity_not_found(&EntityRef::new(kind.clone(), ancestor.clone())))
    }

    /// Stores a detached entity under its own id.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity has no id or its kind is unknown.
    pub fn insert(&mut self, entity: Entity) -> Result<EntityRef> {
        let kind = entity.kind().clone();
        let id = entity
            .id()
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::MissingId(kind.to_string())))?;
        if !self.has_kind(kind.as_str()) {
            return Err(Error::unknown_kind(&kind));
        }
        self.entries.entry(kind.clone()).or_default().insert(id.clone(), entity);
        Ok(EntityRef { kind, id })
    }

    /// Looks an entity up directly. Absent entities are not an error.
    #[must_use]
    pub fn get(&self, kind: &str, id: &str) -> Option<&Entity> {
        self.entries.get(kind).and_then(|entries| entries.get(id))
    }

    /// Looks an entity up mutably.
    pub fn get_mut(&mut self, kind: &str, id: &str) -> Option<&mut Entity> {
        self.entries
            .get_mut(kind)
            .and_then(|entries| entries.get_mut(id))
    }

    /// Returns true if the referenced entity exists.
    #[must_use]
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.get(entity.kind.as_str(), entity.id.as_str()).is_some()
    }

    /// Returns a delegating view of the referenced entity.
    #[must_use]
    pub fn view(&self, entity: &EntityRef) -> Option<View<'_>> {
        self.view_of(entity.kind.as_str(), entity.id.as_str())
    }

    /// Returns a delegating view of the entity `kind`/`id`.
    #[must_use]
    pub fn view_of(&self, kind: &str, id: &str) -> Option<View<'_>> {
        self.get(kind, id).map(|entity| View::new(self, entity))
    }

    /// Removes an entity. References to it elsewhere become stale and read
    /// as absent; nothing cascades.
    pub fn remove(&mut self, entity: &EntityRef) -> Option<Entity> {
        let removed = self
            .entries
            .get_mut(entity.kind.as_str())
            .and_then(|entries| entries.shift_remove(entity.id.as_str()));
        if removed.is_some() {
            debug!(entity = %entity, "removed entity");
        }
        removed
    }

    /// Iterates kinds in the order they were added.
    pub fn kinds(&self) -> impl Iterator<Item = &Kind> {
        self.entries.keys()
    }

    /// Iterates a kind's ids in insertion (or restoration) order.
    pub fn ids<'a>(&'a self, kind: &str) -> impl Iterator<Item = &'a EntityId> + use<'a> {
        self.entries.get(kind).into_iter().flat_map(IndexMap::keys)
    }

    /// Iterates a kind's entities in insertion (or restoration) order.
    pub fn entities<'a>(&'a self, kind: &str) -> impl Iterator<Item = &'a Entity> + use<'a> {
        self.entries.get(kind).into_iter().flat_map(IndexMap::values)
    }

    /// Iterates every kind with its entries.
    pub fn iter(&self) -> impl Iterator<Item = (&Kind, &Entries)> {
        self.entries.iter()
    }

    /// Number of entities of one kind.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.entries.get(kind).map_or(0, IndexMap::len)
    }

    /// Total number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(IndexMap::len).sum()
    }

    /// Returns true if the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(IndexMap::is_empty)
    }

    /// Drops every kind and entity in place. Registered sources and installed
    /// prototypes are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replaces all entries in place with `entries`, then makes sure every
    /// registered kind has an entry map.
    pub fn replace_entries(&mut self, entries: IndexMap<Kind, Entries>) {
        self.entries.clear();
        self.entries.extend(entries);
        self.ensure_registered_kinds();
    }

    /// Reads a field through delegation. See [`View::get`].
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn read(&self, entity: &EntityRef, name: &str) -> Result<Option<Value>> {
        self.view(entity)
            .map(|view| view.get(name))
            .ok_or_else(|| Error::entity_not_found(entity))
    }

    /// Writes a plain or calculated field.
    ///
    /// For calculated fields a value stores the override and `None` clears
    /// it. For plain fields `None` deletes the own field, exposing inherited
    /// and default values again.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist, the name is reserved,
    /// or the field is a relationship (use [`Store::set_one`] /
    /// [`Store::set_many`]).
    pub fn set(&mut self, entity: &EntityRef, name: &str, value: Option<Value>) -> Result<()> {
        if is_reserved_field(name) {
            return Err(Error::invalid_argument(format!(
                "field {name} is managed by the store"
            )));
        }
        let stored_name = match self.field_kind(entity.kind.as_str(), name) {
            Some(FieldKind::Calculated(_)) => shadow_name(name),
            Some(other) => {
                return Err(Error::field_kind_mismatch(name, "plain", other.label()));
            }
            None => name.to_owned(),
        };

        let target = self.entity_mut(entity)?;
        match value {
            Some(value) if !value.is_null() => {
                target.set_own(stored_name, value);
            }
            _ => {
                target.remove_own(&stored_name);
            }
        }
        Ok(())
    }

    /// Invokes a prototype method on an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or method does not exist, or whatever
    /// the method itself returns.
    pub fn call(&mut self, entity: &EntityRef, method: &str, args: &[Value]) -> Result<Value> {
        if !self.contains(entity) {
            return Err(Error::entity_not_found(entity));
        }
        let method_fn = self
            .prototype(entity.kind.as_str())
            .and_then(|proto| proto.method(method))
            .cloned()
            .ok_or_else(|| {
                Error::new(ErrorKind::MethodNotFound {
                    kind: entity.kind.to_string(),
                    method: method.to_owned(),
                })
            })?;
        debug!(entity = %entity, method, args = args.len(), "calling method");
        method_fn(self, entity, args)
    }

    pub(crate) fn field_kind(&self, kind: &str, name: &str) -> Option<&FieldKind> {
        self.prototype(kind).and_then(|proto| proto.field(name))
    }

    pub(crate) fn entity_mut(&mut self, entity: &EntityRef) -> Result<&mut Entity> {
        self.get_mut(entity.kind.as_str(), entity.id.as_str())
            .ok_or_else(|| Error::entity_not_found(entity))
    }

    /// True if following inherits-from links from `start` reaches `target`.
    fn chain_reaches(&self, kind: &Kind, start: &EntityId, target: &EntityId) -> bool {
        let limit = self.count(kind.as_str()) + 1;
        let mut current = Some(start);
        for _ in 0..=limit {
            match current {
                Some(id) if id == target => return true,
                Some(id) => {
                    current = self
                        .get(kind.as_str(), id.as_str())
                        .and_then(Entity::inherits);
                }
                None => return false,
            }
        }
        true
    }

    fn ensure_registered_kinds(&mut self) {
        let kinds: Vec<Kind> = self.registry.kinds().cloned().collect();
        for kind in kinds {
            self.entries.entry(kind).or_default();
        }
    }
}
