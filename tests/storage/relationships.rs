//! Integration tests for relationship storage
//!
//! Tests to-one and to-many resolution, dangling ids, and the inverse index.

use std::sync::Arc;

use odot_foundation::{EntityId, EntityRef, ErrorKind, Result};
use odot_storage::{DefinitionScope, Store};
use serde_json::json;

fn ids(names: &[&str]) -> Vec<EntityId> {
    names.iter().map(|name| EntityId::new(*name)).collect()
}

fn rail_store() -> Store {
    let mut store = Store::new();
    store
        .define_prototype(
            "station",
            Arc::new(|scope: &mut DefinitionScope| -> Result<()> {
                scope.default("mile", 0)?;
                Ok(())
            }),
        )
        .unwrap();
    store
        .define_prototype(
            "train",
            Arc::new(|scope: &mut DefinitionScope| -> Result<()> {
                scope
                    .one("station")?
                    .one_to("home", "station")?
                    .many_to("stops", "station")?;
                Ok(())
            }),
        )
        .unwrap();
    for id in ["ord", "den", "sfo"] {
        store.construct("station", id, None).unwrap();
    }
    store
}

// =============================================================================
// To-One
// =============================================================================

#[test]
fn one_resolves_against_the_target_kind() {
    let mut store = rail_store();
    let t1 = store.construct("train", "t1", None).unwrap();
    store
        .set_one(&t1, "home", Some(&EntityId::new("ord")))
        .unwrap();

    let view = store.view(&t1).unwrap();
    let home = view.one("home").unwrap();
    assert_eq!(home.reference(), Some(EntityRef::new("station", "ord")));
    assert_eq!(home.get("mile"), Some(json!(0)));
    assert!(view.one("station").is_none());
    assert_eq!(store.read(&t1, "home").unwrap(), Some(json!("ord")));
    assert!(store.get("train", "t1").unwrap().has_own("ihome"));
}

#[test]
fn one_to_a_removed_target_reads_as_none() {
    let mut store = rail_store();
    let t1 = store.construct("train", "t1", None).unwrap();
    store
        .set_one(&t1, "station", Some(&EntityId::new("den")))
        .unwrap();
    store.remove(&EntityRef::new("station", "den")).unwrap();

    assert!(store.view(&t1).unwrap().one("station").is_none());
    assert_eq!(store.read(&t1, "station").unwrap(), Some(json!("den")));
}

#[test]
fn one_is_inherited_until_overridden() {
    let mut store = rail_store();
    let t1 = store.construct("train", "t1", None).unwrap();
    store
        .set_one(&t1, "station", Some(&EntityId::new("ord")))
        .unwrap();
    let t2 = store
        .construct("train", "t2", Some(&EntityId::new("t1")))
        .unwrap();

    let station = |store: &Store, t: &EntityRef| {
        store
            .view(t)
            .and_then(|v| v.one("station"))
            .and_then(|s| s.id().cloned())
    };
    assert_eq!(station(&store, &t2), Some(EntityId::new("ord")));

    store
        .set_one(&t2, "station", Some(&EntityId::new("sfo")))
        .unwrap();
    assert_eq!(station(&store, &t2), Some(EntityId::new("sfo")));
    assert_eq!(station(&store, &t1), Some(EntityId::new("ord")));

    store.set_one(&t2, "station", None).unwrap();
    assert_eq!(station(&store, &t2), Some(EntityId::new("ord")));
}

#[test]
fn relationship_writes_check_the_declared_kind() {
    let mut store = rail_store();
    let t1 = store.construct("train", "t1", None).unwrap();

    let err = store
        .set_one(&t1, "stops", Some(&EntityId::new("ord")))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FieldKindMismatch { .. }));

    let err = store
        .set_many(&t1, "station", Some(ids(&["ord"]).as_slice()))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FieldKindMismatch { .. }));

    let err = store.set(&t1, "station", Some(json!("ord"))).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FieldKindMismatch { .. }));

    let err = store
        .set_one(&t1, "color", Some(&EntityId::new("red")))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FieldKindMismatch { .. }));
}

// =============================================================================
// To-Many
// =============================================================================

#[test]
fn many_keeps_order_duplicates_and_dangling_slots() {
    let mut store = rail_store();
    let t1 = store.construct("train", "t1", None).unwrap();
    store
        .set_many(&t1, "stops", Some(ids(&["sfo", "ghost", "ord", "sfo"]).as_slice()))
        .unwrap();

    let view = store.view(&t1).unwrap();
    let stops: Vec<Option<String>> = view
        .many("stops")
        .into_iter()
        .map(|slot| slot.and_then(|s| s.id()).map(|id| id.to_string()))
        .collect();
    assert_eq!(
        stops,
        vec![
            Some("sfo".to_string()),
            None,
            Some("ord".to_string()),
            Some("sfo".to_string()),
        ]
    );
    assert_eq!(
        store.read(&t1, "stops").unwrap(),
        Some(json!(["sfo", "ghost", "ord", "sfo"]))
    );
}

#[test]
fn unset_many_is_empty() {
    let mut store = rail_store();
    let t1 = store.construct("train", "t1", None).unwrap();
    assert!(store.view(&t1).unwrap().many("stops").is_empty());

    store
        .set_many(&t1, "stops", Some(ids(&["ord"]).as_slice()))
        .unwrap();
    store.set_many(&t1, "stops", None).unwrap();
    assert!(store.view(&t1).unwrap().many("stops").is_empty());
    assert_eq!(store.read(&t1, "stops").unwrap(), None);
}

// =============================================================================
// Inverse Index
// =============================================================================

#[test]
fn add_and_remove_maintain_the_inverse_index() {
    let mut store = rail_store();
    let den = EntityRef::new("station", "den");
    let t1 = store.construct("train", "t1", None).unwrap();
    let t2 = store.construct("train", "t2", None).unwrap();

    store.add_related(&den, &t1).unwrap();
    store.add_related(&den, &t2).unwrap();
    store.add_related(&den, &t1).unwrap();
    assert_eq!(store.inverse(&den, "train").unwrap(), ids(&["t1", "t2", "t1"]));
    assert_eq!(store.read(&den, "itrain").unwrap(), Some(json!(["t1", "t2", "t1"])));

    store.remove_related(&den, &t1).unwrap();
    assert_eq!(store.inverse(&den, "train").unwrap(), ids(&["t2"]));

    // Absent ids are a no-op.
    store.remove_related(&den, &t1).unwrap();
    assert_eq!(store.inverse(&den, "train").unwrap(), ids(&["t2"]));

    let resolved = store.view(&den).unwrap().inverse("train");
    assert_eq!(resolved.len(), 1);
    assert_eq!(
        resolved[0].and_then(|v| v.reference()),
        Some(EntityRef::new("train", "t2"))
    );
}

#[test]
fn adding_to_an_inherited_index_copies_it() {
    let mut store = rail_store();
    let hub = EntityRef::new("station", "ord");
    let t1 = store.construct("train", "t1", None).unwrap();
    let t2 = store.construct("train", "t2", None).unwrap();
    store.add_related(&hub, &t1).unwrap();
    let branch = store
        .construct("station", "branch", Some(&EntityId::new("ord")))
        .unwrap();

    assert_eq!(store.inverse(&branch, "train").unwrap(), ids(&["t1"]));
    store.add_related(&branch, &t2).unwrap();

    assert_eq!(store.inverse(&branch, "train").unwrap(), ids(&["t1", "t2"]));
    assert_eq!(store.inverse(&hub, "train").unwrap(), ids(&["t1"]));
}

#[test]
fn inverse_on_a_missing_entity_fails() {
    let mut store = rail_store();
    let ghost = EntityRef::new("station", "ghost");
    let t1 = store.construct("train", "t1", None).unwrap();
    assert!(store.inverse(&ghost, "train").is_err());
    assert!(store.add_related(&ghost, &t1).is_err());
}

#[test]
fn relationship_reads_see_later_target_writes() {
    let mut store = rail_store();
    let t1 = store.construct("train", "t1", None).unwrap();
    store
        .set_one(&t1, "station", Some(&EntityId::new("den")))
        .unwrap();
    let den = EntityRef::new("station", "den");

    store.set(&den, "mile", Some(json!(1000))).unwrap();
    let mile = |store: &Store| {
        store
            .view(&t1)
            .and_then(|v| v.one("station"))
            .and_then(|s| s.get("mile"))
    };
    assert_eq!(mile(&store), Some(json!(1000)));

    store.set(&den, "mile", Some(json!(1001))).unwrap();
    assert_eq!(mile(&store), Some(json!(1001)));

    // Replacing the target is visible too.
    store.construct("station", "den", None).unwrap();
    assert_eq!(mile(&store), Some(json!(0)));
}
