//! Console commands.
//!
//! One command per line; the same syntax is used interactively and in entry
//! scripts. Lines starting with `#` are comments. JSON values may be written
//! bare when they are single words (`set station den name Denver`).

use std::path::PathBuf;

use odot_foundation::{EntityId, EntityRef, Error, Kind, Record, Result, Value};
use odot_storage::{FieldKind, View};

use crate::session::Session;

/// Usage text for `help`.
pub const HELP: &str = "\
kinds                                list kinds with entity counts and sources
ls KIND                              list ids of a kind
show KIND ID                         show an entity with inherited and computed fields
new KIND ID [from ANCESTOR]          create (or replace) an entity
set KIND ID FIELD VALUE              set a plain or calculated field (VALUE is JSON)
unset KIND ID FIELD                  clear a field, relationship, or override
link KIND ID FIELD TARGET..          point a one/many relationship at ids
unlink KIND ID FIELD                 clear a relationship
add KIND ID OTHER_KIND OTHER_ID      add to the inverse index
remove KIND ID OTHER_KIND OTHER_ID   remove from the inverse index
call KIND ID METHOD [ARG..]          invoke a prototype method (ARGs are JSON)
rm KIND ID                           delete an entity
map KIND PATH                        map a kind to a manifest and define it
save [PATH]                          write the document
reset                                reload the document, discarding changes
recode                               re-run every prototype source
help                                 show this text
quit                                 leave (saves unless --no-save)";

/// Command words, for completion.
pub const COMMAND_WORDS: &[&str] = &[
    "kinds", "ls", "show", "new", "set", "unset", "link", "unlink", "add", "remove", "call", "rm",
    "map", "save", "reset", "recode", "help", "quit",
];

/// A parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// List kinds.
    Kinds,
    /// List a kind's ids.
    List(Kind),
    /// Show one entity.
    Show(EntityRef),
    /// Create an entity.
    New {
        /// The entity to create.
        entity: EntityRef,
        /// Same-kind instance to inherit from.
        ancestor: Option<EntityId>,
    },
    /// Set a plain or calculated field.
    Set {
        /// Target entity.
        entity: EntityRef,
        /// Field name.
        field: String,
        /// New value.
        value: Value,
    },
    /// Clear a field of any kind.
    Unset {
        /// Target entity.
        entity: EntityRef,
        /// Field name.
        field: String,
    },
    /// Point a relationship at ids.
    Link {
        /// Owning entity.
        entity: EntityRef,
        /// Relationship field.
        field: String,
        /// Target ids.
        targets: Vec<EntityId>,
    },
    /// Clear a relationship.
    Unlink {
        /// Owning entity.
        entity: EntityRef,
        /// Relationship field.
        field: String,
    },
    /// Add to an inverse index.
    Add {
        /// Entity holding the index.
        entity: EntityRef,
        /// Entity being indexed.
        related: EntityRef,
    },
    /// Remove from an inverse index.
    Remove {
        /// Entity holding the index.
        entity: EntityRef,
        /// Entity being unindexed.
        related: EntityRef,
    },
    /// Invoke a method.
    Call {
        /// Receiver.
        entity: EntityRef,
        /// Method name.
        method: String,
        /// Arguments.
        args: Vec<Value>,
    },
    /// Delete an entity.
    Delete(EntityRef),
    /// Map a kind to a manifest file.
    Map {
        /// Kind to map.
        kind: Kind,
        /// Manifest path.
        path: PathBuf,
    },
    /// Write the document, or a copy elsewhere.
    Save(Option<PathBuf>),
    /// Reload the document.
    Reset,
    /// Re-run prototype sources.
    Recode,
    /// Show usage.
    Help,
    /// Leave the console.
    Quit,
}

/// What the console should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Keep going, printing the output if any.
    Continue(Option<String>),
    /// Stop reading commands.
    Quit,
}

impl Command {
    /// Parses one line. Blank lines and comments yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown commands or missing arguments.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let mut words = Words::new(line);
        let Some(name) = words.next() else {
            return Ok(None);
        };

        let command = match name {
            "kinds" => Self::Kinds,
            "ls" => Self::List(Kind::new(words.word("KIND")?)),
            "show" => Self::Show(words.entity()?),
            "new" => {
                let entity = words.entity()?;
                let ancestor = match words.next() {
                    None => None,
                    Some("from") => Some(EntityId::new(words.word("ANCESTOR")?)),
                    Some(other) => {
                        return Err(Error::invalid_argument(format!(
                            "expected `from`, got {other}"
                        )));
                    }
                };
                Self::New { entity, ancestor }
            }
            "set" => {
                let entity = words.entity()?;
                let field = words.word("FIELD")?.to_owned();
                let rest = words.rest();
                if rest.is_empty() {
                    return Err(Error::invalid_argument("set needs a VALUE"));
                }
                Self::Set {
                    entity,
                    field,
                    value: parse_value(rest),
                }
            }
            "unset" => Self::Unset {
                entity: words.entity()?,
                field: words.word("FIELD")?.to_owned(),
            },
            "link" => {
                let entity = words.entity()?;
                let field = words.word("FIELD")?.to_owned();
                let targets: Vec<EntityId> = words.by_ref().map(EntityId::new).collect();
                if targets.is_empty() {
                    return Err(Error::invalid_argument("link needs at least one TARGET"));
                }
                Self::Link {
                    entity,
                    field,
                    targets,
                }
            }
            "unlink" => Self::Unlink {
                entity: words.entity()?,
                field: words.word("FIELD")?.to_owned(),
            },
            "add" => Self::Add {
                entity: words.entity()?,
                related: words.entity()?,
            },
            "remove" => Self::Remove {
                entity: words.entity()?,
                related: words.entity()?,
            },
            "call" => {
                let entity = words.entity()?;
                let method = words.word("METHOD")?.to_owned();
                Self::Call {
                    entity,
                    method,
                    args: parse_values(words.rest()),
                }
            }
            "rm" => Self::Delete(words.entity()?),
            "map" => Self::Map {
                kind: Kind::new(words.word("KIND")?),
                path: PathBuf::from(words.word("PATH")?),
            },
            "save" => Self::Save(words.next().map(PathBuf::from)),
            "reset" => Self::Reset,
            "recode" | "rc" => Self::Recode,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => {
                return Err(Error::invalid_argument(format!(
                    "unknown command: {other} (try `help`)"
                )));
            }
        };

        if !matches!(command, Self::Set { .. } | Self::Call { .. } | Self::Link { .. }) {
            if let Some(extra) = words.next() {
                return Err(Error::invalid_argument(format!(
                    "unexpected argument: {extra}"
                )));
            }
        }
        Ok(Some(command))
    }

    /// Runs the command against a session.
    ///
    /// # Errors
    ///
    /// Returns whatever the underlying store or persistence operation
    /// returns; the session stays usable.
    pub fn execute(self, session: &mut Session) -> Result<Outcome> {
        let output = match self {
            Self::Kinds => Some(list_kinds(session)),
            Self::List(kind) => {
                let store = session.store();
                if !store.has_kind(kind.as_str()) {
                    return Err(Error::unknown_kind(&kind));
                }
                let ids: Vec<&str> = store.ids(kind.as_str()).map(EntityId::as_str).collect();
                Some(ids.join(" "))
            }
            Self::Show(entity) => {
                let view = session
                    .store()
                    .view(&entity)
                    .ok_or_else(|| Error::entity_not_found(&entity))?;
                Some(serde_json::to_string_pretty(&resolved_record(&view))?)
            }
            Self::New { entity, ancestor } => {
                let created = session.store_mut().construct(
                    entity.kind,
                    entity.id,
                    ancestor.as_ref(),
                )?;
                Some(format!("created {created}"))
            }
            Self::Set {
                entity,
                field,
                value,
            } => {
                session.store_mut().set(&entity, &field, Some(value))?;
                None
            }
            Self::Unset { entity, field } => {
                let declared = declared_label(session, &entity, &field);
                let store = session.store_mut();
                match declared {
                    Some("one") => store.set_one(&entity, &field, None)?,
                    Some("many") => store.set_many(&entity, &field, None)?,
                    _ => store.set(&entity, &field, None)?,
                }
                None
            }
            Self::Link {
                entity,
                field,
                targets,
            } => {
                let declared = declared_label(session, &entity, &field);
                let store = session.store_mut();
                if declared == Some("many") {
                    store.set_many(&entity, &field, Some(targets.as_slice()))?;
                } else {
                    let [target] = targets.as_slice() else {
                        return Err(Error::invalid_argument(format!(
                            "{field} takes exactly one target"
                        )));
                    };
                    store.set_one(&entity, &field, Some(target))?;
                }
                None
            }
            Self::Unlink { entity, field } => {
                let declared = declared_label(session, &entity, &field);
                let store = session.store_mut();
                if declared == Some("many") {
                    store.set_many(&entity, &field, None)?;
                } else {
                    store.set_one(&entity, &field, None)?;
                }
                None
            }
            Self::Add { entity, related } => {
                session.store_mut().add_related(&entity, &related)?;
                None
            }
            Self::Remove { entity, related } => {
                session.store_mut().remove_related(&entity, &related)?;
                None
            }
            Self::Call {
                entity,
                method,
                args,
            } => match session.store_mut().call(&entity, &method, &args)? {
                Value::Null => None,
                Value::String(text) => Some(text),
                other => Some(other.to_string()),
            },
            Self::Delete(entity) => {
                session
                    .store_mut()
                    .remove(&entity)
                    .ok_or_else(|| Error::entity_not_found(&entity))?;
                None
            }
            Self::Map { kind, path } => {
                session.map_live(kind.clone(), &path)?;
                Some(format!("mapped {kind} to {}", session.config().resolve(&path).display()))
            }
            Self::Save(None) => {
                session.save()?;
                Some(format!("saved {}", session.config().document.display()))
            }
            Self::Save(Some(path)) => {
                session.save_as(&path)?;
                Some(format!("saved {}", path.display()))
            }
            Self::Reset => {
                let report = session.reset()?;
                Some(format!(
                    "loaded {} entities of {} kinds",
                    report.entities, report.kinds
                ))
            }
            Self::Recode => {
                session.recode()?;
                Some(format!(
                    "recoded {} kinds",
                    session.store().registry().kinds().count()
                ))
            }
            Self::Help => Some(HELP.to_string()),
            Self::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Continue(output))
    }
}

/// Parses and runs one line.
///
/// # Errors
///
/// Returns parse or execution errors.
pub fn execute_line(session: &mut Session, line: &str) -> Result<Outcome> {
    match Command::parse(line)? {
        Some(command) => command.execute(session),
        None => Ok(Outcome::Continue(None)),
    }
}

fn list_kinds(session: &Session) -> String {
    let store = session.store();
    store
        .kinds()
        .map(|kind| {
            let source = store
                .registry()
                .source(kind.as_str())
                .map_or_else(|| "plain data".to_string(), |source| source.describe());
            format!("{kind} ({}) {source}", store.count(kind.as_str()))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The declared field kind label (`calculated`, `one`, `many`), if any.
fn declared_label(session: &Session, entity: &EntityRef, field: &str) -> Option<&'static str> {
    session
        .store()
        .prototype(entity.kind.as_str())
        .and_then(|prototype| prototype.field(field))
        .map(FieldKind::label)
}

/// Every field the entity reads as: own, inherited, defaulted, and
/// calculated values.
fn resolved_record(view: &View<'_>) -> Record {
    let mut names: Vec<String> = Vec::new();
    let mut current = Some(*view);
    let mut remaining = view.store().count(view.kind().as_str()) + 1;
    while let Some(link) = current {
        names.extend(link.entity().fields().keys().cloned());
        if remaining == 0 {
            break;
        }
        remaining -= 1;
        current = link.ancestor();
    }
    if let Some(prototype) = view.prototype() {
        names.extend(prototype.defaults().keys().cloned());
        names.extend(
            prototype
                .fields()
                .filter(|(_, kind)| matches!(kind, FieldKind::Calculated(_)))
                .map(|(name, _)| name.to_owned()),
        );
    }

    let mut record = view.entity().to_record();
    for name in names {
        if record.contains_key(&name) {
            continue;
        }
        if let Some(value) = view.get(&name) {
            record.insert(name, value);
        }
    }
    record
}

/// JSON if it parses, otherwise the text as a string.
fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

/// A whitespace-separated run of JSON values; falls back to word-by-word
/// parsing when the run is not valid JSON.
fn parse_values(text: &str) -> Vec<Value> {
    let stream: std::result::Result<Vec<Value>, _> = serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .collect();
    stream.unwrap_or_else(|_| text.split_whitespace().map(parse_value).collect())
}

/// Splits a line into words while keeping access to the unparsed rest.
struct Words<'a> {
    rest: &'a str,
}

impl<'a> Words<'a> {
    const fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    fn word(&mut self, what: &str) -> Result<&'a str> {
        self.next()
            .ok_or_else(|| Error::invalid_argument(format!("missing {what}")))
    }

    fn entity(&mut self) -> Result<EntityRef> {
        let kind = self.word("KIND")?;
        let id = self.word("ID")?;
        Ok(EntityRef::new(kind, id))
    }

    fn rest(&self) -> &'a str {
        self.rest.trim()
    }
}

impl<'a> Iterator for Words<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let trimmed = self.rest.trim_start();
        if trimmed.is_empty() {
            self.rest = trimmed;
            return None;
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let (word, rest) = trimmed.split_at(end);
        self.rest = rest;
        Some(word)
    }
}
