//! Integration tests for entity construction and delegation

use std::sync::Arc;

use odot_foundation::{EntityId, EntityRef, ErrorKind, Result};
use odot_storage::{DefinitionScope, Store};
use serde_json::json;

fn station_store() -> Store {
    let mut store = Store::new();
    store
        .define_prototype(
            "station",
            Arc::new(|scope: &mut DefinitionScope| -> Result<()> {
                scope.default("mile", 0)?.default("open", true)?;
                Ok(())
            }),
        )
        .unwrap();
    store
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn construct_requires_a_known_kind() {
    let mut store = station_store();
    let err = store.construct("train", "t1", None).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownKind(_)));
    assert!(store.is_empty());
}

#[test]
fn construct_records_id_and_kind() {
    let mut store = station_store();
    let den = store.construct("station", "den", None).unwrap();

    assert_eq!(den, EntityRef::new("station", "den"));
    let entity = store.get("station", "den").unwrap();
    assert_eq!(entity.id(), Some(&EntityId::new("den")));
    assert_eq!(entity.kind().as_str(), "station");
    assert_eq!(store.read(&den, "id").unwrap(), Some(json!("den")));
    assert_eq!(store.count("station"), 1);
}

#[test]
fn construct_replaces_an_existing_id() {
    let mut store = station_store();
    let den = store.construct("station", "den", None).unwrap();
    store.set(&den, "name", Some(json!("Denver"))).unwrap();

    store.construct("station", "den", None).unwrap();
    assert_eq!(store.read(&den, "name").unwrap(), None);
    assert_eq!(store.count("station"), 1);
}

#[test]
fn construct_needs_an_existing_ancestor() {
    let mut store = station_store();
    let err = store
        .construct("station", "den", Some(&EntityId::new("hub")))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::EntityNotFound(_)));
}

#[test]
fn construct_rejects_inheritance_loops() {
    let mut store = station_store();
    store.construct("station", "a", None).unwrap();
    store
        .construct("station", "b", Some(&EntityId::new("a")))
        .unwrap();

    // Re-creating `a` from `b` would make a -> b -> a.
    let err = store
        .construct("station", "a", Some(&EntityId::new("b")))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InheritanceCycle { .. }));
}

// =============================================================================
// Delegation
// =============================================================================

#[test]
fn reads_fall_back_to_defaults() {
    let mut store = station_store();
    let den = store.construct("station", "den", None).unwrap();

    assert_eq!(store.read(&den, "mile").unwrap(), Some(json!(0)));
    assert_eq!(store.read(&den, "open").unwrap(), Some(json!(true)));
    assert_eq!(store.read(&den, "name").unwrap(), None);
}

#[test]
fn reads_walk_the_ancestor_chain() {
    let mut store = station_store();
    let hub = store.construct("station", "hub", None).unwrap();
    store.set(&hub, "mile", Some(json!(500))).unwrap();
    store.set(&hub, "name", Some(json!("Hub"))).unwrap();
    let mid = store
        .construct("station", "mid", Some(&EntityId::new("hub")))
        .unwrap();
    store.set(&mid, "name", Some(json!("Mid"))).unwrap();
    let leaf = store
        .construct("station", "leaf", Some(&EntityId::new("mid")))
        .unwrap();

    assert_eq!(store.read(&leaf, "name").unwrap(), Some(json!("Mid")));
    assert_eq!(store.read(&leaf, "mile").unwrap(), Some(json!(500)));
    assert_eq!(store.read(&leaf, "open").unwrap(), Some(json!(true)));
    assert_eq!(store.read(&leaf, "id").unwrap(), Some(json!("leaf")));

    // Ancestors see later writes.
    store.set(&hub, "mile", Some(json!(600))).unwrap();
    assert_eq!(store.read(&leaf, "mile").unwrap(), Some(json!(600)));
}

#[test]
fn own_writes_shadow_and_unset_reveals_inherited() {
    let mut store = station_store();
    let hub = store.construct("station", "hub", None).unwrap();
    store.set(&hub, "mile", Some(json!(500))).unwrap();
    let den = store
        .construct("station", "den", Some(&EntityId::new("hub")))
        .unwrap();

    store.set(&den, "mile", Some(json!(1000))).unwrap();
    assert_eq!(store.read(&den, "mile").unwrap(), Some(json!(1000)));
    assert_eq!(store.read(&hub, "mile").unwrap(), Some(json!(500)));

    store.set(&den, "mile", None).unwrap();
    assert_eq!(store.read(&den, "mile").unwrap(), Some(json!(500)));
}

#[test]
fn reserved_fields_are_managed_by_the_store() {
    let mut store = station_store();
    let den = store.construct("station", "den", None).unwrap();
    for name in ["id", "iproto"] {
        let err = store.set(&den, name, Some(json!("x"))).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidArgument(_)), "{name}");
    }
}

#[test]
fn operations_on_missing_entities_fail() {
    let mut store = station_store();
    let ghost = EntityRef::new("station", "ghost");
    assert!(matches!(
        store.read(&ghost, "mile").unwrap_err().kind,
        ErrorKind::EntityNotFound(_)
    ));
    assert!(store.set(&ghost, "mile", Some(json!(1))).is_err());
    assert!(store.remove(&ghost).is_none());
}

#[test]
fn removing_an_ancestor_leaves_descendants_reading_defaults() {
    let mut store = station_store();
    let hub = store.construct("station", "hub", None).unwrap();
    store.set(&hub, "mile", Some(json!(500))).unwrap();
    let den = store
        .construct("station", "den", Some(&EntityId::new("hub")))
        .unwrap();

    store.remove(&hub).unwrap();
    assert_eq!(store.read(&den, "mile").unwrap(), Some(json!(0)));
    assert_eq!(
        store.get("station", "den").unwrap().inherits(),
        Some(&EntityId::new("hub"))
    );
}

// =============================================================================
// Detached Instances
// =============================================================================

#[test]
fn detached_instances_are_stored_by_insert() {
    let mut store = station_store();
    let hub = store.construct("station", "hub", None).unwrap();
    store.set(&hub, "name", Some(json!("Hub"))).unwrap();

    let draft = store
        .detached("station", Some(&EntityId::new("hub")))
        .unwrap();
    assert!(draft.id().is_none());
    assert_eq!(draft.inherits(), Some(&EntityId::new("hub")));
    assert_eq!(store.count("station"), 1);

    let err = store.insert(draft.clone()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MissingId(_)));

    let den = store.insert(draft.with_id("den")).unwrap();
    assert_eq!(store.read(&den, "name").unwrap(), Some(json!("Hub")));
    assert_eq!(store.ids("station").map(EntityId::as_str).collect::<Vec<_>>(), ["hub", "den"]);

    assert!(store.detached("train", None).is_err());
    assert!(store.detached("station", Some(&EntityId::new("nowhere"))).is_err());
}
