//! odot - In-process object database with prototype-backed entities
//!
//! This crate re-exports all layers of odot for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: odot_runtime    — Document persistence, manifests, session, console
//! Layer 1: odot_storage    — Prototypes, registry, entity store, relationships
//! Layer 0: odot_foundation — Core types (Kind, EntityId, Value, Error)
//! ```

pub use odot_foundation as foundation;
pub use odot_runtime as runtime;
pub use odot_storage as storage;

pub use odot_foundation::{EntityId, EntityRef, Error, ErrorKind, Kind, Record, Result, Value};
pub use odot_runtime::{Session, SessionConfig};
pub use odot_storage::{DefinitionScope, PrototypeSource, Store, View};
