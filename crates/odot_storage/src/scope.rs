//! Prototype sources and the scope they declare into.
//!
//! A [`PrototypeSource`] is the host-supplied code for a kind. Defining a
//! kind runs its source against a fresh [`DefinitionScope`]; the registry
//! installs the result only when the source succeeds.
//!
//! ```
//! use odot_storage::DefinitionScope;
//!
//! fn train(scope: &mut DefinitionScope) -> odot_foundation::Result<()> {
//!     scope.default("speed", 10)?.one("station")?;
//!     Ok(())
//! }
//! # let _ = train;
//! ```

use std::sync::Arc;

use odot_foundation::{
    EntityRef, Error, ErrorKind, INHERITS_FIELD, Kind, Record, Result, Value, is_reserved_field,
    shadow_name,
};

use crate::entity::Entity;
use crate::prototype::{FieldKind, Prototype};
use crate::store::Store;
use crate::view::View;

/// Code that declares a kind's behavior.
///
/// Sources must be repeatable: the registry runs them again on every
/// recode and load.
pub trait PrototypeSource: Send + Sync {
    /// Declares fields, defaults, and methods into `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or declares something
    /// invalid; the kind keeps its previous prototype.
    fn define(&self, scope: &mut DefinitionScope) -> Result<()>;

    /// Human-readable origin of the source, for listings and logs.
    fn describe(&self) -> String {
        "compiled".to_string()
    }
}

impl<F> PrototypeSource for F
where
    F: Fn(&mut DefinitionScope) -> Result<()> + Send + Sync,
{
    fn define(&self, scope: &mut DefinitionScope) -> Result<()> {
        self(scope)
    }
}

/// The declaration scope a prototype source runs in.
pub struct DefinitionScope {
    prototype: Prototype,
}

impl DefinitionScope {
    pub(crate) fn new(kind: Kind) -> Self {
        Self {
            prototype: Prototype::empty(kind),
        }
    }

    pub(crate) fn finish(self) -> Prototype {
        self.prototype
    }

    /// The kind being defined.
    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.prototype.kind
    }

    /// Declares a calculated field: reads return the stored override if
    /// one is set, else run `calculator` against the instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, reserved, or already declared.
    pub fn calculable<F>(&mut self, name: &str, calculator: F) -> Result<&mut Self>
    where
        F: Fn(&View<'_>) -> Value + Send + Sync + 'static,
    {
        self.declare(name, FieldKind::Calculated(Arc::new(calculator)))
    }

    /// Declares a to-one relationship resolved against the kind named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, reserved, or already declared.
    pub fn one(&mut self, name: &str) -> Result<&mut Self> {
        self.declare(name, FieldKind::One(Kind::new(name)))
    }

    /// Declares a to-one relationship resolved against `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, reserved, or already declared.
    pub fn one_to(&mut self, name: &str, target: impl Into<Kind>) -> Result<&mut Self> {
        self.declare(name, FieldKind::One(target.into()))
    }

    /// Declares a to-many relationship resolved against the kind named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, reserved, or already declared.
    pub fn many(&mut self, name: &str) -> Result<&mut Self> {
        self.declare(name, FieldKind::Many(Kind::new(name)))
    }

    /// Declares a to-many relationship resolved against `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, reserved, or already declared.
    pub fn many_to(&mut self, name: &str, target: impl Into<Kind>) -> Result<&mut Self> {
        self.declare(name, FieldKind::Many(target.into()))
    }

    /// Marks an own field as never persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or reserved.
    pub fn ephemeral(&mut self, name: &str) -> Result<&mut Self> {
        check_name(name)?;
        if !self.prototype.is_ephemeral(name) {
            self.prototype.ephemera.push(name.to_owned());
        }
        Ok(self)
    }

    /// Sets a default value every instance reads unless it stores its own.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or reserved.
    pub fn default(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        check_name(name)?;
        self.prototype.defaults.insert(name.to_owned(), value.into());
        Ok(self)
    }

    /// Adds a method.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the method already exists.
    pub fn method<F>(&mut self, name: &str, method: F) -> Result<&mut Self>
    where
        F: Fn(&mut Store, &EntityRef, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(Error::invalid_declaration("empty method name"));
        }
        if self.prototype.methods.contains_key(name) {
            return Err(self.duplicate(name));
        }
        self.prototype
            .methods
            .insert(name.to_owned(), Arc::new(method));
        Ok(self)
    }

    /// Post-processes each instance's record after ephemeral fields have
    /// been stripped.
    pub fn serialize_with<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Entity, Record) -> Record + Send + Sync + 'static,
    {
        self.prototype.serialize_hook = Some(Arc::new(hook));
        self
    }

    fn declare(&mut self, name: &str, field: FieldKind) -> Result<&mut Self> {
        check_name(name)?;
        if shadow_name(name) == INHERITS_FIELD {
            return Err(Error::invalid_declaration(format!(
                "field {name} would shadow {INHERITS_FIELD}"
            )));
        }
        if self.prototype.fields.contains_key(name) {
            return Err(self.duplicate(name));
        }
        self.prototype.fields.insert(name.to_owned(), field);
        Ok(self)
    }

    fn duplicate(&self, name: &str) -> Error {
        Error::new(ErrorKind::DuplicateDeclaration {
            kind: self.prototype.kind.to_string(),
            field: name.to_owned(),
        })
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_declaration("empty field name"));
    }
    if is_reserved_field(name) {
        return Err(Error::invalid_declaration(format!(
            "field {name} is reserved"
        )));
    }
    Ok(())
}
