//! The prototype registry.
//!
//! Sources are registered per kind in declaration order; defining a kind
//! runs its source into a fresh scope and swaps the result in. A failing
//! source leaves the previous prototype installed, so a bad edit during hot
//! reload never strands live instances on a half-built prototype.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use odot_foundation::{Error, ErrorKind, Kind, Result};
use tracing::{debug, info, warn};

use crate::prototype::Prototype;
use crate::scope::{DefinitionScope, PrototypeSource};

/// Holds each kind's source and its currently installed prototype.
#[derive(Default)]
pub struct Registry {
    /// Registered sources in declaration order.
    sources: IndexMap<Kind, Arc<dyn PrototypeSource>>,
    /// Installed prototypes.
    prototypes: HashMap<Kind, Arc<Prototype>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records where a kind's behavior lives without running it.
    ///
    /// Returns the source previously registered for the kind, if any.
    pub fn register_source(
        &mut self,
        kind: Kind,
        source: Arc<dyn PrototypeSource>,
    ) -> Option<Arc<dyn PrototypeSource>> {
        debug!(%kind, source = %source.describe(), "registered prototype source");
        self.sources.insert(kind, source)
    }

    /// Returns the source registered for a kind.
    #[must_use]
    pub fn source(&self, kind: &str) -> Option<&Arc<dyn PrototypeSource>> {
        self.sources.get(kind)
    }

    /// Returns true if a source is registered for the kind.
    #[must_use]
    pub fn is_registered(&self, kind: &str) -> bool {
        self.sources.contains_key(kind)
    }

    /// Iterates registered kinds in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = &Kind> {
        self.sources.keys()
    }

    /// Returns the installed prototype for a kind.
    #[must_use]
    pub fn prototype(&self, kind: &str) -> Option<&Arc<Prototype>> {
        self.prototypes.get(kind)
    }

    /// (Re)defines a kind from its registered source.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKind` if no source is registered, or
    /// `DefinitionFailed` if the source fails. Either way any previously
    /// installed prototype stays in place.
    pub fn define(&mut self, kind: &Kind) -> Result<()> {
        let source = self
            .sources
            .get(kind)
            .cloned()
            .ok_or_else(|| Error::unknown_kind(kind))?;

        let mut scope = DefinitionScope::new(kind.clone());
        if let Err(err) = source.define(&mut scope) {
            warn!(%kind, error = %err, "prototype definition failed, keeping previous definition");
            return Err(Error::new(ErrorKind::DefinitionFailed {
                kind: kind.to_string(),
                source: Box::new(err.in_source(source.describe())),
            }));
        }

        let prototype = scope.finish();
        debug!(
            %kind,
            fields = prototype.fields.len(),
            methods = prototype.methods.len(),
            "defined prototype"
        );
        self.prototypes.insert(kind.clone(), Arc::new(prototype));
        Ok(())
    }

    /// Registers a source for a kind and defines it immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails; the source stays registered so a
    /// later recode can retry it.
    pub fn define_prototype(&mut self, kind: Kind, source: Arc<dyn PrototypeSource>) -> Result<()> {
        self.register_source(kind.clone(), source);
        self.define(&kind)
    }

    /// Re-runs every registered source in declaration order.
    ///
    /// Every kind is attempted even when an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first failure; kinds that failed keep their previous
    /// prototype.
    pub fn recode(&mut self) -> Result<()> {
        let kinds: Vec<Kind> = self.sources.keys().cloned().collect();
        let mut first_failure = None;
        let mut failures = 0usize;

        for kind in &kinds {
            if let Err(err) = self.define(kind) {
                failures += 1;
                first_failure.get_or_insert(err);
            }
        }

        info!(kinds = kinds.len(), failures, "recoded prototypes");
        first_failure.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.sources.keys().collect::<Vec<_>>())
            .field("defined", &self.prototypes.len())
            .finish()
    }
}
