//! Compiled behaviors shipped with the `odot` binary.
//!
//! Manifests name these in their `behaviors` list. Hosts embedding odot
//! can start from [`standard`] and add their own.

use odot_foundation::{EntityRef, Error, Result, Value, value_to_id};
use odot_storage::{DefinitionScope, Store};
use serde_json::json;

use crate::manifest::Library;

/// The library the binary runs with: `travel`.
#[must_use]
pub fn standard() -> Library {
    Library::new().with("travel", |scope: &mut DefinitionScope| -> Result<()> {
        scope.method("travel", travel)?;
        Ok(())
    })
}

/// Moves the entity to the station named in `args[0]`.
///
/// Both stations' inverse indexes are kept current. The trip takes the
/// mile distance between the two stations divided by the entity's
/// `speed`; a missing `mile` counts as zero.
///
/// # Errors
///
/// Returns an error if no destination is given, the entity does not exist,
/// or it has no positive `speed`.
pub fn travel(store: &mut Store, this: &EntityRef, args: &[Value]) -> Result<Value> {
    let destination = args
        .first()
        .and_then(value_to_id)
        .ok_or_else(|| Error::invalid_argument("travel needs a destination station"))?;
    let to = EntityRef::new("station", destination.clone());

    let (from, from_mile) = {
        let view = store.view(this).ok_or_else(|| Error::entity_not_found(this))?;
        let station = view.one("station");
        (
            station.and_then(|s| s.reference()),
            station
                .and_then(|s| s.get("mile"))
                .and_then(|mile| mile.as_f64())
                .unwrap_or(0.0),
        )
    };
    let to_mile = store
        .read(&to, "mile")?
        .and_then(|mile| mile.as_f64())
        .unwrap_or(0.0);
    let speed = store
        .read(this, "speed")?
        .and_then(|speed| speed.as_f64())
        .filter(|speed| *speed > 0.0)
        .ok_or_else(|| Error::invalid_argument(format!("{this} has no speed")))?;

    if let Some(from) = &from {
        store.remove_related(from, this)?;
    }
    store.set_one(this, "station", Some(&destination))?;
    store.add_related(&to, this)?;

    let hours = (to_mile - from_mile).abs() / speed;
    Ok(json!(format!(
        "{} now at {destination} after {hours} hours travel",
        this.id
    )))
}
