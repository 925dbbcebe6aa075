//! Integration tests for Layer 2: Persistence
//!
//! Tests the single JSON document: round trips, ephemeral fields, reloading
//! behavior, and recovery from bad documents.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use odot_foundation::{EntityId, EntityRef, ErrorKind, Result, Value};
use odot_runtime::serialize::{self, load_all, parse_document, reset, save_all, to_string};
use odot_storage::{DefinitionScope, PrototypeSource, Store};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn station() -> Arc<dyn PrototypeSource> {
    Arc::new(|scope: &mut DefinitionScope| -> Result<()> {
        scope.default("mile", 0)?.ephemeral("visitors")?;
        Ok(())
    })
}

/// A train whose `whoami` method answers differently once `v2` is set.
fn train(v2: Arc<AtomicBool>) -> Arc<dyn PrototypeSource> {
    Arc::new(move |scope: &mut DefinitionScope| -> Result<()> {
        let version = if v2.load(Ordering::SeqCst) { 2 } else { 1 };
        scope
            .default("speed", 10)?
            .one("station")?
            .many_to("stops", "station")?
            .method("whoami", move |store, this, _| {
                let name = store.read(this, "name")?.unwrap_or(Value::Null);
                Ok(json!(format!("v{version} {name}")))
            })?;
        Ok(())
    })
}

fn fresh_store(v2: &Arc<AtomicBool>) -> Store {
    let mut store = Store::new();
    store.register_source("station", station());
    store.register_source("train", train(Arc::clone(v2)));
    store
}

fn document(dir: &TempDir) -> PathBuf {
    dir.path().join("o.json")
}

/// Stations ord/den, den inheriting from ord, and a train at den.
fn populate(store: &mut Store) -> EntityRef {
    store.recode().unwrap();
    let ord = store.construct("station", "ord", None).unwrap();
    store.set(&ord, "mile", Some(json!(0))).unwrap();
    store.set(&ord, "name", Some(json!("Chicago"))).unwrap();
    let den = store
        .construct("station", "den", Some(&EntityId::new("ord")))
        .unwrap();
    store.set(&den, "mile", Some(json!(1000))).unwrap();
    store.set(&den, "visitors", Some(json!(250))).unwrap();

    let t1 = store.construct("train", "t1", None).unwrap();
    store.set(&t1, "name", Some(json!("Zephyr"))).unwrap();
    store
        .set_one(&t1, "station", Some(&EntityId::new("den")))
        .unwrap();
    store
        .set_many(
            &t1,
            "stops",
            Some([EntityId::new("ord"), EntityId::new("den")].as_slice()),
        )
        .unwrap();
    store.add_related(&den, &t1).unwrap();
    t1
}

// =============================================================================
// Round Trip
// =============================================================================

#[test]
fn save_then_load_restores_the_graph() {
    let dir = TempDir::new().unwrap();
    let v2 = Arc::new(AtomicBool::new(false));
    let mut original = fresh_store(&v2);
    let t1 = populate(&mut original);
    save_all(&original, document(&dir)).unwrap();

    let mut loaded = fresh_store(&v2);
    let report = load_all(&mut loaded, document(&dir)).unwrap();
    assert_eq!(report.kinds, 2);
    assert_eq!(report.entities, 3);
    assert!(report.unregistered.is_empty());
    assert_eq!(report.dangling, 0);
    assert_eq!(report.deepest, 1);

    let den = EntityRef::new("station", "den");
    assert_eq!(loaded.read(&den, "name").unwrap(), Some(json!("Chicago")));
    assert_eq!(loaded.read(&den, "mile").unwrap(), Some(json!(1000)));
    assert_eq!(loaded.inverse(&den, "train").unwrap(), vec![EntityId::new("t1")]);

    let view = loaded.view(&t1).unwrap();
    assert_eq!(view.one("station").and_then(|s| s.id().cloned()), Some(EntityId::new("den")));
    assert_eq!(view.many("stops").len(), 2);
    assert_eq!(loaded.read(&t1, "speed").unwrap(), Some(json!(10)));
    assert_eq!(to_string(&loaded).unwrap(), to_string(&original).unwrap());
}

#[test]
fn document_layout_is_kind_then_id_then_record() {
    let dir = TempDir::new().unwrap();
    let v2 = Arc::new(AtomicBool::new(false));
    let mut store = fresh_store(&v2);
    populate(&mut store);
    save_all(&store, document(&dir)).unwrap();

    let text = fs::read_to_string(document(&dir)).unwrap();
    assert!(text.starts_with("{\n \"station\": {\n  \"ord\": {"), "{text}");

    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        value["station"]["den"],
        json!({"id": "den", "iproto": "ord", "mile": 1000, "itrain": ["t1"]})
    );
    assert_eq!(
        value["train"]["t1"],
        json!({"id": "t1", "name": "Zephyr", "istation": "den", "istops": ["ord", "den"]})
    );
}

#[test]
fn ephemeral_fields_are_not_persisted_but_stay_live() {
    let dir = TempDir::new().unwrap();
    let v2 = Arc::new(AtomicBool::new(false));
    let mut store = fresh_store(&v2);
    populate(&mut store);
    save_all(&store, document(&dir)).unwrap();

    let den = EntityRef::new("station", "den");
    assert_eq!(store.read(&den, "visitors").unwrap(), Some(json!(250)));

    let mut loaded = fresh_store(&v2);
    load_all(&mut loaded, document(&dir)).unwrap();
    assert_eq!(loaded.read(&den, "visitors").unwrap(), None);
}

#[test]
fn loaded_entities_use_the_current_prototype() {
    let dir = TempDir::new().unwrap();
    let v2 = Arc::new(AtomicBool::new(false));
    let mut store = fresh_store(&v2);
    let t1 = populate(&mut store);
    assert_eq!(store.call(&t1, "whoami", &[]).unwrap(), json!("v1 \"Zephyr\""));
    save_all(&store, document(&dir)).unwrap();

    v2.store(true, Ordering::SeqCst);
    let mut loaded = fresh_store(&v2);
    load_all(&mut loaded, document(&dir)).unwrap();
    assert_eq!(loaded.call(&t1, "whoami", &[]).unwrap(), json!("v2 \"Zephyr\""));
}

// =============================================================================
// First Run and Reset
// =============================================================================

#[test]
fn missing_document_starts_empty() {
    let dir = TempDir::new().unwrap();
    let v2 = Arc::new(AtomicBool::new(false));
    let mut store = fresh_store(&v2);

    let report = load_all(&mut store, document(&dir)).unwrap();
    assert!(report.missing_document);
    assert_eq!(report.kinds, 0);
    assert!(store.is_empty());
    assert!(store.prototype("train").is_some());
    assert!(store.construct("train", "t1", None).is_ok());
}

#[test]
fn reset_discards_changes_since_the_last_save() {
    let dir = TempDir::new().unwrap();
    let v2 = Arc::new(AtomicBool::new(false));
    let mut store = fresh_store(&v2);
    let t1 = populate(&mut store);
    save_all(&store, document(&dir)).unwrap();

    store.set(&t1, "name", Some(json!("Chief"))).unwrap();
    store.construct("train", "t2", None).unwrap();
    reset(&mut store, document(&dir)).unwrap();

    assert_eq!(store.read(&t1, "name").unwrap(), Some(json!("Zephyr")));
    assert!(!store.contains(&EntityRef::new("train", "t2")));
}

#[test]
fn malformed_document_leaves_the_store_unchanged() {
    let dir = TempDir::new().unwrap();
    let v2 = Arc::new(AtomicBool::new(false));
    let mut store = fresh_store(&v2);
    let t1 = populate(&mut store);
    fs::write(document(&dir), "{\"train\": [1, 2").unwrap();

    let err = reset(&mut store, document(&dir)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MalformedDocument(_)));
    let source = err.context.and_then(|c| c.source).unwrap();
    assert!(source.ends_with("o.json"));
    assert_eq!(store.read(&t1, "name").unwrap(), Some(json!("Zephyr")));
    assert_eq!(store.len(), 3);
}

#[test]
fn records_must_be_objects() {
    for text in ["[]", "{\"train\": []}", "{\"train\": {\"t1\": 5}}"] {
        let err = parse_document(text).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedDocument(_)), "{text}");
    }
}

// =============================================================================
// Restore Order and Bad Data
// =============================================================================

#[test]
fn descendants_listed_before_ancestors_still_restore() {
    let v2 = Arc::new(AtomicBool::new(false));
    let mut store = fresh_store(&v2);
    let document = parse_document(
        r#"{"station": {
            "leaf": {"id": "leaf", "iproto": "mid"},
            "mid": {"id": "mid", "iproto": "root", "name": "Mid"},
            "root": {"id": "root", "mile": 7}
        }}"#,
    )
    .unwrap();

    let report = serialize::restore(&mut store, document).unwrap();
    assert_eq!(report.deepest, 2);
    let ids: Vec<&str> = store.ids("station").map(EntityId::as_str).collect();
    assert_eq!(ids, vec!["leaf", "mid", "root"]);

    let leaf = EntityRef::new("station", "leaf");
    assert_eq!(store.read(&leaf, "name").unwrap(), Some(json!("Mid")));
    assert_eq!(store.read(&leaf, "mile").unwrap(), Some(json!(7)));
}

#[test]
fn resaving_a_loaded_document_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let v2 = Arc::new(AtomicBool::new(false));
    let mut store = fresh_store(&v2);
    store.recode().unwrap();
    store.construct("station", "a", None).unwrap();
    let c = store.construct("station", "c", None).unwrap();
    store.set(&c, "name", Some(json!("Central"))).unwrap();
    // Replaced in place, so `a` stays ahead of its new ancestor.
    store
        .construct("station", "a", Some(&EntityId::new("c")))
        .unwrap();
    save_all(&store, document(&dir)).unwrap();
    let first = fs::read_to_string(document(&dir)).unwrap();

    let mut loaded = fresh_store(&v2);
    load_all(&mut loaded, document(&dir)).unwrap();
    let ids: Vec<&str> = loaded.ids("station").map(EntityId::as_str).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(
        loaded.read(&EntityRef::new("station", "a"), "name").unwrap(),
        Some(json!("Central"))
    );

    save_all(&loaded, document(&dir)).unwrap();
    assert_eq!(fs::read_to_string(document(&dir)).unwrap(), first);
}

#[test]
fn inheritance_cycles_are_rejected() {
    let v2 = Arc::new(AtomicBool::new(false));
    let mut store = fresh_store(&v2);
    let t1 = populate(&mut store);
    let document = parse_document(
        r#"{"station": {"a": {"iproto": "b"}, "b": {"iproto": "a"}}}"#,
    )
    .unwrap();

    let err = serialize::restore(&mut store, document).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InheritanceCycle { .. }));
    assert!(store.contains(&t1));
}

#[test]
fn dangling_ancestors_and_unknown_kinds_are_kept() {
    let v2 = Arc::new(AtomicBool::new(false));
    let mut store = fresh_store(&v2);
    let document = parse_document(
        r#"{
            "station": {"den": {"id": "den", "iproto": "gone"}},
            "depot": {"d1": {"id": "d1", "bays": 4}}
        }"#,
    )
    .unwrap();

    let report = serialize::restore(&mut store, document).unwrap();
    assert_eq!(report.dangling, 1);
    assert_eq!(report.unregistered.len(), 1);
    assert_eq!(report.unregistered[0].as_str(), "depot");

    let den = EntityRef::new("station", "den");
    assert_eq!(store.read(&den, "mile").unwrap(), Some(json!(0)));
    assert_eq!(
        store.read(&EntityRef::new("depot", "d1"), "bays").unwrap(),
        Some(json!(4))
    );
}

#[test]
fn record_keys_win_over_stored_ids() {
    let v2 = Arc::new(AtomicBool::new(false));
    let mut store = fresh_store(&v2);
    let document = parse_document(r#"{"train": {"t9": {"id": "t1", "name": "x"}}}"#).unwrap();
    serialize::restore(&mut store, document).unwrap();

    let t9 = EntityRef::new("train", "t9");
    assert_eq!(store.read(&t9, "id").unwrap(), Some(json!("t9")));
    assert!(!store.contains(&EntityRef::new("train", "t1")));
}

// =============================================================================
// Properties
// =============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_graph_survives_a_round_trip(
            miles in proptest::collection::vec(-5000i64..5000, 1..8),
            stops in proptest::collection::vec(proptest::collection::vec(0usize..10, 0..6), 0..5),
            overrides in proptest::collection::vec(proptest::option::of(1i64..300), 0..5),
        ) {
            let dir = TempDir::new().unwrap();
            let v2 = Arc::new(AtomicBool::new(false));
            let mut store = fresh_store(&v2);
            store.recode().unwrap();

            for (i, mile) in miles.iter().enumerate() {
                let ancestor = (i % 3 == 2).then(|| EntityId::new(format!("s{}", i - 1)));
                let station = store
                    .construct("station", format!("s{i}"), ancestor.as_ref())
                    .unwrap();
                store.set(&station, "mile", Some(json!(mile))).unwrap();
                store.set(&station, "visitors", Some(json!(i))).unwrap();
            }
            for (i, route) in stops.iter().enumerate() {
                let train = store.construct("train", format!("t{i}"), None).unwrap();
                // Indexes past the last station leave dangling ids.
                let ids: Vec<EntityId> = route
                    .iter()
                    .map(|n| EntityId::new(format!("s{n}")))
                    .collect();
                store.set_many(&train, "stops", Some(ids.as_slice())).unwrap();
                if let Some(Some(speed)) = overrides.get(i) {
                    store.set(&train, "speed", Some(json!(speed))).unwrap();
                }
                if let Some(first) = ids.first() {
                    store.set_one(&train, "station", Some(first)).unwrap();
                    let at = EntityRef::new("station", first.clone());
                    if store.contains(&at) {
                        store.add_related(&at, &train).unwrap();
                    }
                }
            }

            save_all(&store, document(&dir)).unwrap();
            let mut loaded = fresh_store(&v2);
            let report = load_all(&mut loaded, document(&dir)).unwrap();

            prop_assert_eq!(report.entities, store.len());
            prop_assert_eq!(to_string(&loaded).unwrap(), to_string(&store).unwrap());
            for (i, route) in stops.iter().enumerate() {
                let train = EntityRef::new("train", format!("t{i}"));
                let before: Vec<Option<Value>> = store
                    .view(&train)
                    .unwrap()
                    .many("stops")
                    .into_iter()
                    .map(|slot| slot.and_then(|s| s.get("mile")))
                    .collect();
                let after: Vec<Option<Value>> = loaded
                    .view(&train)
                    .unwrap()
                    .many("stops")
                    .into_iter()
                    .map(|slot| slot.and_then(|s| s.get("mile")))
                    .collect();
                prop_assert_eq!(before.len(), route.len());
                prop_assert_eq!(before, after);
            }
            for i in 0..miles.len() {
                let station = EntityRef::new("station", format!("s{i}"));
                prop_assert_eq!(loaded.read(&station, "visitors").unwrap(), None);
                prop_assert_eq!(
                    loaded.read(&station, "mile").unwrap(),
                    store.read(&station, "mile").unwrap()
                );
            }
        }
    }
}
