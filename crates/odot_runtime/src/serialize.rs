//! Store persistence as a single JSON document.
//!
//! The document maps kind → id → record. Each record holds the entity's own
//! fields after its prototype's serialization hook has run (ephemeral fields
//! stripped), including `id`, shadow fields, and `iproto` when the entity
//! inherits from another instance. Output is pretty-printed with a one-space
//! indent and keys in insertion order so saved documents diff cleanly.
//!
//! Loading never leaves the store half-populated: the whole document is
//! parsed and rebuilt off to the side, then swapped into the live store in
//! place.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use indexmap::IndexMap;
use odot_foundation::{
    EntityId, Error, ErrorContext, ErrorKind, ID_FIELD, INHERITS_FIELD, Kind, Record, Result,
    value_to_id,
};
use odot_storage::{Entity, Entries, Store};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Persisted records, kind → id → record, in document order.
pub type Document = IndexMap<Kind, IndexMap<EntityId, Record>>;

/// What a load found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Kinds present in the document.
    pub kinds: usize,
    /// Entities restored.
    pub entities: usize,
    /// Kinds restored as plain data because no source is registered.
    pub unregistered: Vec<Kind>,
    /// Entities whose inherits-from id names no stored instance.
    pub dangling: usize,
    /// Longest inherits-from chain seen.
    pub deepest: usize,
    /// True if there was no document to read.
    pub missing_document: bool,
}

/// Flattens the store into a document, applying each kind's serialization
/// hook. Entities of kinds without a prototype are written as-is.
#[must_use]
pub fn to_document(store: &Store) -> Document {
    store
        .iter()
        .map(|(kind, entries)| {
            let prototype = store.prototype(kind.as_str());
            let records = entries
                .iter()
                .map(|(id, entity)| {
                    let record = prototype.map_or_else(
                        || entity.to_record(),
                        |prototype| prototype.serialize(entity),
                    );
                    (id.clone(), record)
                })
                .collect();
            (kind.clone(), records)
        })
        .collect()
}

/// Serializes the store to document text.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_string(store: &Store) -> Result<String> {
    let document = to_document(store);
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
    document.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| Error::new(ErrorKind::Internal(e.to_string())))
}

/// Parses document text without touching any store.
///
/// # Errors
///
/// Returns `MalformedDocument` if the text is not an object of objects of
/// records.
pub fn parse_document(text: &str) -> Result<Document> {
    serde_json::from_str(text).map_err(|e| Error::malformed_document(e.to_string()))
}

/// Writes the whole store to `path`.
///
/// The document goes to a temporary file in the destination directory and
/// is renamed over `path` once fully written and synced, so a crash never
/// leaves a truncated document behind. Blocking; safe to call at shutdown.
///
/// # Errors
///
/// Returns an error if serialization or any file operation fails.
pub fn save_all<P: AsRef<Path>>(store: &Store, path: P) -> Result<()> {
    let path = path.as_ref();
    let started = Instant::now();
    let text = to_string(store)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(|e| io_error("create temporary file in", dir, &e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| io_error("write", path, &e))?;
    file.as_file()
        .sync_all()
        .map_err(|e| io_error("sync", path, &e))?;
    file.persist(path)
        .map_err(|e| io_error("replace", path, &e.error))?;

    info!(
        path = %path.display(),
        kinds = store.kinds().count(),
        entities = store.len(),
        bytes = text.len(),
        elapsed_ms = started.elapsed().as_millis(),
        "saved document"
    );
    Ok(())
}

/// Repopulates the store from `path`.
///
/// A missing file is a first run: the store is left empty (registered kinds
/// keep empty entry maps) and no error is raised. Otherwise the document is
/// parsed and rebuilt before the store is touched, every registered
/// prototype is re-run, and the rebuilt entries replace the live ones in
/// place.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the document is malformed,
/// in which case the store is unchanged. A failing prototype source is
/// reported after the data has been restored; that kind keeps its previous
/// prototype.
pub fn load_all<P: AsRef<Path>>(store: &mut Store, path: P) -> Result<LoadReport> {
    let path = path.as_ref();
    let text = match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(io_error("read", path, &e)),
    };

    let Some(text) = text else {
        info!(path = %path.display(), "no document, starting empty");
        let recoded = store.recode();
        store.replace_entries(IndexMap::new());
        recoded?;
        return Ok(LoadReport {
            missing_document: true,
            ..LoadReport::default()
        });
    };

    let started = Instant::now();
    let document = parse_document(&text).map_err(|e| in_document(e, path))?;
    let report = restore(store, document).map_err(|e| in_document(e, path))?;
    info!(
        path = %path.display(),
        kinds = report.kinds,
        entities = report.entities,
        elapsed_ms = started.elapsed().as_millis(),
        "loaded document"
    );
    Ok(report)
}

/// Clears the live store in place and reloads it from `path`.
///
/// The document is read before anything is cleared, so a malformed document
/// leaves the current graph in place.
///
/// # Errors
///
/// See [`load_all`].
pub fn reset<P: AsRef<Path>>(store: &mut Store, path: P) -> Result<LoadReport> {
    debug!(path = %path.as_ref().display(), "resetting store");
    load_all(store, path)
}

/// Rebuilds a parsed document into the store.
///
/// Records keep their document order. Ancestors are resolved by id at read
/// time, so a descendant may be listed before the instance it inherits
/// from; each kind's inherits-from chains are only walked to reject cycles
/// and count dangling ancestors.
///
/// # Errors
///
/// Returns `InheritanceCycle` if instance inheritance loops (the store is
/// unchanged), or the first prototype definition failure (after the data
/// has been restored).
pub fn restore(store: &mut Store, document: Document) -> Result<LoadReport> {
    let mut report = LoadReport {
        kinds: document.len(),
        ..LoadReport::default()
    };
    let mut rebuilt = IndexMap::with_capacity(document.len());

    for (kind, records) in document {
        if !store.registry().is_registered(kind.as_str()) {
            debug!(%kind, "no prototype source registered, restoring as plain data");
            report.unregistered.push(kind.clone());
        }

        let entries: Entries = records
            .into_iter()
            .map(|(id, record)| {
                let entity = rebuild_entity(&kind, &id, record);
                (id, entity)
            })
            .collect();

        check_inheritance(&kind, &entries, &mut report)?;

        report.entities += entries.len();
        rebuilt.insert(kind, entries);
    }

    let recoded = store.recode();
    store.replace_entries(rebuilt);
    recoded?;
    Ok(report)
}

fn rebuild_entity(kind: &Kind, id: &EntityId, record: Record) -> Entity {
    if let Some(stored) = record.get(ID_FIELD) {
        if value_to_id(stored).as_ref() != Some(id) {
            warn!(%kind, %id, stored = %stored, "record id differs from its key, keeping the key");
        }
    }
    let inherits = record.get(INHERITS_FIELD).and_then(value_to_id);
    record.into_iter().fold(
        Entity::new(kind.clone())
            .with_id(id.clone())
            .inheriting(inherits),
        |entity, (name, value)| entity.with_field(name, value),
    )
}

/// Walks each entity's inherits-from chain within its kind.
fn check_inheritance(kind: &Kind, entries: &Entries, report: &mut LoadReport) -> Result<()> {
    for (id, entity) in entries {
        let mut depth = 0;
        let mut current = entity.inherits();
        while let Some(ancestor) = current {
            let Some(next) = entries.get(ancestor) else {
                if depth == 0 {
                    warn!(%kind, %id, %ancestor, "inherits from a missing instance, delegating to the prototype");
                    report.dangling += 1;
                }
                break;
            };
            depth += 1;
            if depth > entries.len() {
                return Err(Error::new(ErrorKind::InheritanceCycle {
                    kind: kind.to_string(),
                    id: id.to_string(),
                }));
            }
            current = next.inherits();
        }
        report.deepest = report.deepest.max(depth);
    }
    Ok(())
}

fn io_error(action: &str, path: &Path, err: &io::Error) -> Error {
    Error::io(format!("failed to {action} '{}': {err}", path.display()))
}

fn in_document(err: Error, path: &Path) -> Error {
    let context = err
        .context
        .clone()
        .unwrap_or_else(ErrorContext::new)
        .with_source(path.display().to_string());
    err.with_context(context)
}
