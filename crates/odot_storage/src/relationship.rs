//! Relationship writes and inverse-index bookkeeping.
//!
//! Relationships are stored as raw ids in shadow fields and resolved at read
//! time (see [`View::one`](crate::View::one)), so nothing here has to chase
//! references when a target changes or disappears. The inverse index on the
//! owned side is maintained explicitly through [`Store::add_related`] and
//! [`Store::remove_related`]; keeping it consistent with the owner's `many`
//! field is up to the caller.

use odot_foundation::{EntityId, EntityRef, Error, Result, Value, ids_to_value, shadow_name};
use tracing::trace;

use crate::entity::Entity;
use crate::prototype::FieldKind;
use crate::store::Store;

impl Store {
    /// Points a to-one relationship at `target`, or clears it with `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or `name` is not a
    /// declared `one` field.
    pub fn set_one(&mut self, entity: &EntityRef, name: &str, target: Option<&EntityId>) -> Result<()> {
        self.expect_field(entity, name, "one")?;
        let value = target.map(|id| Value::String(id.as_str().to_owned()));
        self.write_shadow(entity, name, value)
    }

    /// Overwrites a to-many relationship with `targets` (order and
    /// duplicates kept), or deletes it with `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or `name` is not a
    /// declared `many` field.
    pub fn set_many(
        &mut self,
        entity: &EntityRef,
        name: &str,
        targets: Option<&[EntityId]>,
    ) -> Result<()> {
        self.expect_field(entity, name, "many")?;
        self.write_shadow(entity, name, targets.map(ids_to_value))
    }

    /// Appends `related` to `entity`'s inverse index for `related`'s kind.
    ///
    /// An index the entity owns is extended in place. One inherited from an
    /// ancestor is copied before it is extended, so the ancestor's own index
    /// is never touched.
    ///
    /// # Errors
    ///
    /// Returns an error if `entity` does not exist.
    pub fn add_related(&mut self, entity: &EntityRef, related: &EntityRef) -> Result<()> {
        let shadow = shadow_name(related.kind.as_str());
        if let Some(ids) = owned_index(self.entity_mut(entity)?, &shadow) {
            ids.push(Value::String(related.id.as_str().to_owned()));
            trace!(entity = %entity, related = %related, len = ids.len(), "added to inverse index");
            return Ok(());
        }

        let mut ids = self.inverse(entity, related.kind.as_str())?;
        ids.push(related.id.clone());
        trace!(entity = %entity, related = %related, len = ids.len(), "copied inverse index");
        self.entity_mut(entity)?.set_own(shadow, ids_to_value(&ids));
        Ok(())
    }

    /// Removes every occurrence of `related` from `entity`'s inverse index.
    /// Removing an id that is not indexed is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if `entity` does not exist.
    pub fn remove_related(&mut self, entity: &EntityRef, related: &EntityRef) -> Result<()> {
        let shadow = shadow_name(related.kind.as_str());
        if let Some(ids) = owned_index(self.entity_mut(entity)?, &shadow) {
            let before = ids.len();
            ids.retain(|slot| slot.as_str() != Some(related.id.as_str()));
            if ids.len() < before {
                trace!(
                    entity = %entity,
                    related = %related,
                    removed = before - ids.len(),
                    "removed from inverse index"
                );
            }
            return Ok(());
        }

        let mut ids = self.inverse(entity, related.kind.as_str())?;
        let before = ids.len();
        ids.retain(|id| id != &related.id);
        if ids.len() == before {
            return Ok(());
        }
        trace!(
            entity = %entity,
            related = %related,
            removed = before - ids.len(),
            "copied inverse index"
        );
        self.entity_mut(entity)?.set_own(shadow, ids_to_value(&ids));
        Ok(())
    }

    /// The ids in `entity`'s inverse index for entities of `kind`, read
    /// through delegation.
    ///
    /// # Errors
    ///
    /// Returns an error if `entity` does not exist.
    pub fn inverse(&self, entity: &EntityRef, kind: &str) -> Result<Vec<EntityId>> {
        self.view(entity)
            .map(|view| view.inverse_ids(kind))
            .ok_or_else(|| Error::entity_not_found(entity))
    }

    fn expect_field(&self, entity: &EntityRef, name: &str, expected: &'static str) -> Result<()> {
        if !self.contains(entity) {
            return Err(Error::entity_not_found(entity));
        }
        match self.field_kind(entity.kind.as_str(), name) {
            Some(FieldKind::One(_)) if expected == "one" => Ok(()),
            Some(FieldKind::Many(_)) if expected == "many" => Ok(()),
            Some(other) => Err(Error::field_kind_mismatch(name, expected, other.label())),
            None => Err(Error::field_kind_mismatch(name, expected, "plain")),
        }
    }

    fn write_shadow(&mut self, entity: &EntityRef, name: &str, value: Option<Value>) -> Result<()> {
        let shadow = shadow_name(name);
        let target = self.entity_mut(entity)?;
        match value {
            Some(value) => {
                target.set_own(shadow, value);
            }
            None => {
                target.remove_own(&shadow);
            }
        }
        Ok(())
    }
}

/// The inverse index array `entity` stores itself, if any.
fn owned_index<'a>(entity: &'a mut Entity, shadow: &str) -> Option<&'a mut Vec<Value>> {
    entity.own_mut(shadow).and_then(Value::as_array_mut)
}
