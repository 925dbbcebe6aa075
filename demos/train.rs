//! Trains moving between stations.
//!
//! Maps `station` and `train` to manifests in a scratch directory, builds a
//! small network through console commands, runs a trip, saves, and reloads
//! the document into a second session.
//!
//! Run with: `cargo run --example train`

use std::fs;

use odot_foundation::Result;
use odot_runtime::{Outcome, Session, SessionConfig, behaviors, execute_line};
use tempfile::TempDir;

const STATION_MANIFEST: &str = r#"{
 "defaults": { "mile": 0 },
 "ephemeral": ["visitors"]
}"#;

const TRAIN_MANIFEST: &str = r#"{
 "defaults": { "speed": 10 },
 "one": ["station"],
 "many": [{ "name": "stops", "kind": "station" }],
 "behaviors": ["travel"]
}"#;

const SCRIPT: &str = "\
new station ord
new station den
set station den mile 1000
set station den name Denver
new train t1
link train t1 station ord
add station ord train t1
call train t1 travel den
show station den";

fn run(session: &mut Session, line: &str) -> Result<()> {
    println!("o> {line}");
    if let Outcome::Continue(Some(output)) = execute_line(session, line)? {
        println!("{output}");
    }
    Ok(())
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let dir = TempDir::new()?;
    fs::write(dir.path().join("station.json"), STATION_MANIFEST)?;
    fs::write(dir.path().join("train.json"), TRAIN_MANIFEST)?;

    let config = SessionConfig::new()
        .with_document(dir.path().join("o.json"))
        .with_base_dir(dir.path());

    let mut session = Session::new(config.clone()).with_library(behaviors::standard());
    session.map("station", "station.json");
    session.map("train", "train.json");
    session.open()?;

    for line in SCRIPT.lines() {
        run(&mut session, line)?;
    }
    session.close()?;

    println!("\nreloading {}", config.document.display());
    let mut reopened = Session::new(config).with_library(behaviors::standard());
    reopened.map("station", "station.json");
    reopened.map("train", "train.json");
    let report = reopened.open()?;
    println!("loaded {} entities of {} kinds", report.entities, report.kinds);
    run(&mut reopened, "call train t1 travel ord")?;
    run(&mut reopened, "kinds")?;
    Ok(())
}
