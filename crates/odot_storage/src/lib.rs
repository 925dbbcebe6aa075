//! Prototype registry, entity store, and relationships for odot.
//!
//! This crate provides:
//! - [`Prototype`] and [`DefinitionScope`] - Per-kind behavior descriptors
//! - [`Registry`] - Prototype sources with hot redefinition
//! - [`Store`] - The live kind → id → entity graph
//! - [`View`] - Delegating reads through ancestors, defaults, and relationships

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod entity;
pub mod prototype;
pub mod registry;
mod relationship;
pub mod scope;
pub mod store;
pub mod view;

pub use entity::Entity;
pub use prototype::{Calculator, FieldKind, Method, Prototype, SerializeHook};
pub use registry::Registry;
pub use scope::{DefinitionScope, PrototypeSource};
pub use store::{Entries, Store};
pub use view::View;
