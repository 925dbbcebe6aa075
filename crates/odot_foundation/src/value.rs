//! Field values and the naming rules for stored fields.
//!
//! Every stored field holds a JSON-equivalent value. Relationship and
//! calculated fields keep their raw data in a *shadow* field named
//! `i<name>`; instance-level inheritance is recorded in [`INHERITS_FIELD`].

use crate::entity::EntityId;

/// A field value. Entities are schema-less, so any JSON value is accepted.
pub type Value = serde_json::Value;

/// An ordered field-name → value mapping (insertion order is preserved).
pub type Record = serde_json::Map<String, Value>;

/// Field holding an entity's id in its persisted record.
pub const ID_FIELD: &str = "id";

/// Field holding the id of the instance an entity inherits from.
pub const INHERITS_FIELD: &str = "iproto";

/// Prefix of shadow fields.
pub const SHADOW_PREFIX: char = 'i';

/// Returns the shadow field name backing the public field `name`.
///
/// ```
/// assert_eq!(odot_foundation::shadow_name("station"), "istation");
/// ```
#[must_use]
pub fn shadow_name(name: &str) -> String {
    let mut shadow = String::with_capacity(name.len() + 1);
    shadow.push(SHADOW_PREFIX);
    shadow.push_str(name);
    shadow
}

/// Returns true if `name` is managed by the store rather than by callers.
#[must_use]
pub fn is_reserved_field(name: &str) -> bool {
    name == ID_FIELD || name == INHERITS_FIELD
}

/// Interprets a raw shadow value as an entity id.
///
/// Strings are taken verbatim; integers are accepted because document keys
/// are always strings while ids written by hand are often numbers.
#[must_use]
pub fn value_to_id(value: &Value) -> Option<EntityId> {
    match value {
        Value::String(s) => Some(EntityId::new(s.as_str())),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(EntityId::new(n.to_string())),
        _ => None,
    }
}

/// Interprets a raw shadow sequence as a list of id slots.
///
/// Slots that cannot be read as ids are kept as `None` so positions line up
/// with the stored sequence. A non-array value reads as an empty list.
#[must_use]
pub fn value_to_ids(value: &Value) -> Vec<Option<EntityId>> {
    match value {
        Value::Array(items) => items.iter().map(value_to_id).collect(),
        _ => Vec::new(),
    }
}

/// Converts ids into the raw shadow sequence representation.
#[must_use]
pub fn ids_to_value<'a>(ids: impl IntoIterator<Item = &'a EntityId>) -> Value {
    Value::Array(
        ids.into_iter()
            .map(|id| Value::String(id.as_str().to_owned()))
            .collect(),
    )
}

/// Short name of a value's JSON type, for error messages.
#[must_use]
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
