//! Declarative prototype sources.
//!
//! A manifest is a JSON file describing a kind:
//!
//! ```json
//! {
//!  "defaults": { "speed": 10 },
//!  "one": ["station"],
//!  "many": [{ "name": "stops", "kind": "station" }],
//!  "ephemeral": ["scratch"],
//!  "behaviors": ["travel"]
//! }
//! ```
//!
//! `behaviors` name compiled sources in the session's [`Library`]; they run
//! after the declarative parts, in order. The file is read again every time
//! the kind is defined, so editing it and running `recode` hot-reloads it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use odot_foundation::{Error, Kind, Record, Result};
use odot_storage::{DefinitionScope, PrototypeSource};
use serde::Deserialize;
use tracing::debug;

/// Named compiled behaviors that manifests can pull in.
#[derive(Clone, Default)]
pub struct Library {
    behaviors: IndexMap<String, Arc<dyn PrototypeSource>>,
}

impl Library {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a behavior, replacing any with the same name.
    #[must_use]
    pub fn with<S>(mut self, name: impl Into<String>, behavior: S) -> Self
    where
        S: PrototypeSource + 'static,
    {
        self.insert(name, Arc::new(behavior));
        self
    }

    /// Adds a behavior, returning the one it replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        behavior: Arc<dyn PrototypeSource>,
    ) -> Option<Arc<dyn PrototypeSource>> {
        self.behaviors.insert(name.into(), behavior)
    }

    /// Looks a behavior up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn PrototypeSource>> {
        self.behaviors.get(name)
    }

    /// Behavior names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.behaviors.keys().map(String::as_str)
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.behaviors.keys()).finish()
    }
}

/// A relationship entry: either the field name alone (target kind of the
/// same name) or an explicit `{ "name", "kind" }` pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Relation {
    /// Field and target kind share a name.
    Named(String),
    /// Field resolved against an explicit kind.
    Targeted {
        /// Field name.
        name: String,
        /// Target kind.
        kind: Kind,
    },
}

impl Relation {
    fn parts(&self) -> (&str, Kind) {
        match self {
            Self::Named(name) => (name.as_str(), Kind::new(name.as_str())),
            Self::Targeted { name, kind } => (name.as_str(), kind.clone()),
        }
    }
}

/// The parsed contents of a manifest file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Prototype-level default values.
    #[serde(default)]
    pub defaults: Record,
    /// To-one relationships.
    #[serde(default)]
    pub one: Vec<Relation>,
    /// To-many relationships.
    #[serde(default)]
    pub many: Vec<Relation>,
    /// Fields never written to the document.
    #[serde(default)]
    pub ephemeral: Vec<String>,
    /// Library behaviors to apply, in order.
    #[serde(default)]
    pub behaviors: Vec<String>,
}

impl Manifest {
    /// Parses manifest text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a manifest object.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::invalid_declaration(format!("bad manifest: {e}")))
    }

    /// Declares everything in the manifest into `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if a declaration is rejected or a behavior is not in
    /// `library`.
    pub fn apply(&self, scope: &mut DefinitionScope, library: &Library) -> Result<()> {
        for (name, value) in &self.defaults {
            scope.default(name, value.clone())?;
        }
        for relation in &self.one {
            let (name, kind) = relation.parts();
            scope.one_to(name, kind)?;
        }
        for relation in &self.many {
            let (name, kind) = relation.parts();
            scope.many_to(name, kind)?;
        }
        for name in &self.ephemeral {
            scope.ephemeral(name)?;
        }
        for behavior in &self.behaviors {
            let source = library.get(behavior).ok_or_else(|| {
                Error::invalid_declaration(format!("unknown behavior {behavior}"))
            })?;
            source
                .define(scope)
                .map_err(|e| e.in_source(format!("behavior {behavior}")))?;
        }
        Ok(())
    }
}

/// A prototype source backed by a manifest file.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    path: PathBuf,
    library: Arc<Library>,
}

impl ManifestSource {
    /// Creates a source reading `path` and resolving behaviors in `library`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, library: Arc<Library>) -> Self {
        Self {
            path: path.into(),
            library,
        }
    }

    /// The manifest file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PrototypeSource for ManifestSource {
    fn define(&self, scope: &mut DefinitionScope) -> Result<()> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            Error::io(format!("failed to read '{}': {e}", self.path.display()))
        })?;
        let manifest = Manifest::parse(&text)?;
        debug!(
            kind = %scope.kind(),
            path = %self.path.display(),
            behaviors = manifest.behaviors.len(),
            "applying manifest"
        );
        manifest.apply(scope, &self.library)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
