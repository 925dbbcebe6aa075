//! A live store bound to its document.
//!
//! The session owns the single [`Store`] for the lifetime of the program.
//! `reset` and `recode` repopulate that same store in place, so anything
//! holding the session keeps seeing the current graph.

use std::path::Path;
use std::sync::Arc;

use odot_foundation::{Kind, Result};
use odot_storage::{PrototypeSource, Store};
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::manifest::{Library, ManifestSource};
use crate::serialize::{self, LoadReport};

/// A store, its document, and the behaviors manifests can use.
#[derive(Debug)]
pub struct Session {
    store: Store,
    config: SessionConfig,
    library: Arc<Library>,
}

impl Session {
    /// Creates a session with an empty store.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            store: Store::new(),
            config,
            library: Arc::new(Library::new()),
        }
    }

    /// Sets the behavior library used by manifests mapped afterwards.
    #[must_use]
    pub fn with_library(mut self, library: Library) -> Self {
        self.library = Arc::new(library);
        self
    }

    /// Returns the live store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the live store mutably.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the behavior library.
    #[must_use]
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Loads the document into the store.
    ///
    /// Kinds the document holds but no source covers are reported here
    /// unless an entry script is configured, since its `map` lines run
    /// after the load. Hosts check those with
    /// [`unmapped_kinds`](Self::unmapped_kinds) once the script is done.
    ///
    /// # Errors
    ///
    /// See [`serialize::load_all`].
    pub fn open(&mut self) -> Result<LoadReport> {
        let report = serialize::load_all(&mut self.store, &self.config.document)?;
        if self.config.entry_script.is_none() {
            self.warn_unmapped();
        }
        Ok(report)
    }

    /// Stored kinds with no registered prototype source, in store order.
    pub fn unmapped_kinds(&self) -> impl Iterator<Item = &Kind> {
        self.store
            .kinds()
            .filter(|kind| !self.store.registry().is_registered(kind.as_str()))
    }

    /// Logs each stored kind that is still plain data.
    pub fn warn_unmapped(&self) {
        for kind in self.unmapped_kinds() {
            warn!(%kind, count = self.store.count(kind.as_str()), "kind has no prototype source, kept as plain data");
        }
    }

    /// Writes the store to the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn save(&self) -> Result<()> {
        serialize::save_all(&self.store, &self.config.document)
    }

    /// Writes the store to another file without changing the session's
    /// document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        serialize::save_all(&self.store, path)
    }

    /// Discards unsaved changes by reloading the document in place.
    ///
    /// # Errors
    ///
    /// See [`serialize::reset`].
    pub fn reset(&mut self) -> Result<LoadReport> {
        serialize::reset(&mut self.store, &self.config.document)
    }

    /// Re-runs every registered prototype source.
    ///
    /// # Errors
    ///
    /// Returns the first definition failure.
    pub fn recode(&mut self) -> Result<()> {
        self.store.recode()
    }

    /// Records a prototype source for `kind` without running it; it takes
    /// effect on the next [`open`](Self::open), [`reset`](Self::reset), or
    /// [`recode`](Self::recode).
    pub fn register(&mut self, kind: impl Into<Kind>, source: Arc<dyn PrototypeSource>) {
        self.store.register_source(kind, source);
    }

    /// Registers a source and defines the kind immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails.
    pub fn register_and_load(
        &mut self,
        kind: impl Into<Kind>,
        source: Arc<dyn PrototypeSource>,
    ) -> Result<()> {
        let kind = kind.into();
        info!(%kind, source = %source.describe(), "mapping kind");
        self.store.define_prototype(kind, source)
    }

    /// Maps `kind` to a manifest file, resolved against the base directory,
    /// without running it.
    pub fn map(&mut self, kind: impl Into<Kind>, path: impl AsRef<Path>) {
        let source = self.manifest(path);
        self.register(kind, source);
    }

    /// Maps `kind` to a manifest file and defines it immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or applied.
    pub fn map_live(&mut self, kind: impl Into<Kind>, path: impl AsRef<Path>) -> Result<()> {
        let source = self.manifest(path);
        self.register_and_load(kind, source)
    }

    /// Ends the session, saving first when configured to.
    ///
    /// # Errors
    ///
    /// Returns an error if the final save fails.
    pub fn close(self) -> Result<()> {
        if !self.config.save_on_exit {
            return Ok(());
        }
        self.save().inspect_err(|e| {
            warn!(error = %e, "save on exit failed");
        })
    }

    fn manifest(&self, path: impl AsRef<Path>) -> Arc<dyn PrototypeSource> {
        Arc::new(ManifestSource::new(
            self.config.resolve(path),
            Arc::clone(&self.library),
        ))
    }
}
