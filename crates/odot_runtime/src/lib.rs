//! Persistence, prototype manifests, sessions, and the console for odot.
//!
//! This crate provides:
//! - [`serialize`] - The single JSON document: save, load, reset
//! - [`Manifest`] and [`Library`] - File-backed prototype sources
//! - [`behaviors`] - Compiled behaviors the binary ships with
//! - [`Session`] - A live store bound to its document
//! - [`Repl`] - Interactive console over a session
//! - [`CliOptions`] - Command-line parsing for the `odot` binary

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod behaviors;
pub mod command;
pub mod config;
pub mod editor;
pub mod highlight;
pub mod manifest;
pub mod repl;
pub mod serialize;
pub mod session;

pub use command::{Command, Outcome, execute_line};
pub use config::{CliOptions, DEFAULT_DOCUMENT, SessionConfig, Verbosity};
pub use editor::{LineEditor, ReadResult, RustylineEditor};
pub use manifest::{Library, Manifest, ManifestSource};
pub use repl::Repl;
pub use serialize::{Document, LoadReport, load_all, reset, save_all};
pub use session::Session;
