//! Identifiers, values, and error types for odot.
//!
//! This crate provides:
//! - [`Kind`], [`EntityId`], [`EntityRef`] - Entity addressing
//! - [`Value`] and [`Record`] - Schema-less field data
//! - Shadow field naming helpers ([`shadow_name`])
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod entity;
pub mod error;
pub mod value;

pub use entity::{EntityId, EntityRef, Kind};
pub use error::{Error, ErrorContext, ErrorKind};
pub use value::{
    ID_FIELD, INHERITS_FIELD, Record, SHADOW_PREFIX, Value, ids_to_value, is_reserved_field,
    shadow_name, type_name, value_to_id, value_to_ids,
};

/// Result type alias for odot operations.
pub type Result<T> = std::result::Result<T, Error>;
