//! Error types for odot.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::entity::{EntityRef, Kind};

/// The main error type for odot operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Names the source (file or kind) the error came from, keeping any
    /// context already attached.
    #[must_use]
    pub fn in_source(mut self, source: impl Into<String>) -> Self {
        let context = self.context.take().unwrap_or_default();
        self.context = Some(context.with_frame(source));
        self
    }

    /// Creates an unknown kind error.
    #[must_use]
    pub fn unknown_kind(kind: &Kind) -> Self {
        Self::new(ErrorKind::UnknownKind(kind.to_string()))
    }

    /// Creates an entity not found error.
    #[must_use]
    pub fn entity_not_found(entity: &EntityRef) -> Self {
        Self::new(ErrorKind::EntityNotFound(entity.to_string()))
    }

    /// Creates a field kind mismatch error.
    #[must_use]
    pub fn field_kind_mismatch(
        field: impl Into<String>,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::new(ErrorKind::FieldKindMismatch {
            field: field.into(),
            expected,
            actual,
        })
    }

    /// Creates an invalid declaration error.
    #[must_use]
    pub fn invalid_declaration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidDeclaration(message.into()))
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument(message.into()))
    }

    /// Creates a malformed document error.
    #[must_use]
    pub fn malformed_document(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedDocument(message.into()))
    }

    /// Creates an I/O error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IoError(message.into()))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// No prototype is registered for the kind and it holds no entities.
    #[error("unknown kind: {0}")]
    UnknownKind(String),

    /// Entity was not found in the store.
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// An operation needed an entity id but the entity has none.
    #[error("entity of kind {0} has no id")]
    MissingId(String),

    /// A field was used as a different kind of field than it was declared.
    #[error("field {field} is {actual}, not {expected}")]
    FieldKindMismatch {
        /// The field name.
        field: String,
        /// The field kind the operation needed.
        expected: &'static str,
        /// The field kind the prototype declares.
        actual: &'static str,
    },

    /// A field was declared twice in one prototype definition.
    #[error("field {field} declared twice on {kind}")]
    DuplicateDeclaration {
        /// The kind being defined.
        kind: String,
        /// The field declared twice.
        field: String,
    },

    /// A declaration is not acceptable (reserved or empty name, bad manifest).
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),

    /// A prototype source failed; the previous definition stays installed.
    #[error("definition of {kind} failed: {source}")]
    DefinitionFailed {
        /// The kind whose definition failed.
        kind: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// The kind's prototype has no such method.
    #[error("no method {method} on {kind}")]
    MethodNotFound {
        /// The kind searched.
        kind: String,
        /// The method name.
        method: String,
    },

    /// An argument passed to an operation or method is unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The persisted document does not have the expected shape.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// Instance-level inheritance loops back on itself.
    #[error("inheritance cycle in {kind} through {id}")]
    InheritanceCycle {
        /// The kind containing the cycle.
        kind: String,
        /// An id on the cycle.
        id: String,
    },

    /// Serialization or parsing failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// File system failure.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Source file or kind name.
    pub source: Option<String>,
    /// Operations that were running, innermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "at {source}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::SerializationError(err.to_string()))
    }
}
