//! The interactive console.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use odot_foundation::{Error, ErrorKind, Result};
use tracing::debug;

use crate::command::{self, Outcome};
use crate::editor::{LineEditor, ReadResult, RustylineEditor, bracket_depth};
use crate::session::Session;

/// Reads commands, runs them against a session, and prints what they return.
pub struct Repl<E: LineEditor = RustylineEditor> {
    editor: E,
    session: Session,
    show_banner: bool,
    prompt: String,
    continuation_prompt: String,
}

impl Repl<RustylineEditor> {
    /// Creates a console over `session` with the rustyline editor.
    ///
    /// # Errors
    ///
    /// Returns an error if the editor fails to initialize.
    pub fn new(session: Session) -> Result<Self> {
        let editor = RustylineEditor::new()?;
        Ok(Self::with_editor(editor, session))
    }
}

impl<E: LineEditor> Repl<E> {
    /// Creates a console with the given editor.
    pub fn with_editor(editor: E, session: Session) -> Self {
        let mut repl = Self {
            editor,
            session,
            show_banner: true,
            prompt: "o> ".to_string(),
            continuation_prompt: ".. ".to_string(),
        };
        repl.refresh_keywords();
        repl
    }

    /// Disables the welcome banner.
    #[must_use]
    pub const fn without_banner(mut self) -> Self {
        self.show_banner = false;
        self
    }

    /// Sets the primary prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Returns the session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session mutably.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Gives the session back, e.g. to close it.
    #[must_use]
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Runs until `quit` or end of input. Command errors are printed and the
    /// loop continues.
    ///
    /// # Errors
    ///
    /// Returns an error only if the terminal fails.
    pub fn run(&mut self) -> Result<()> {
        if self.show_banner {
            self.print_banner();
        }

        loop {
            let Some(input) = self.read_input()? else {
                break;
            };
            if input.trim().is_empty() {
                continue;
            }
            self.editor.add_history(&input);

            match self.eval_line(&input) {
                Ok(Outcome::Continue(Some(output))) => println!("{output}"),
                Ok(Outcome::Continue(None)) => {}
                Ok(Outcome::Quit) => break,
                Err(e) => print_error(&e),
            }
        }

        println!();
        Ok(())
    }

    /// Runs one command line.
    ///
    /// # Errors
    ///
    /// Returns the command's parse or execution error.
    pub fn eval_line(&mut self, line: &str) -> Result<Outcome> {
        let outcome = command::execute_line(&mut self.session, line);
        self.refresh_keywords();
        outcome
    }

    /// Runs a script of commands, stopping at the first failure. Commands may
    /// span lines while JSON brackets are open.
    ///
    /// Returns `true` if the script asked to quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a command fails; the
    /// error names the file and the line the command started on.
    pub fn eval_file(&mut self, path: &Path) -> Result<bool> {
        let source = fs::read_to_string(path).map_err(|e| {
            Error::io(format!("failed to read '{}': {e}", path.display()))
        })?;
        debug!(path = %path.display(), "running script");

        let mut pending = String::new();
        let mut start_line = 0;
        for (index, line) in source.lines().enumerate() {
            if pending.is_empty() {
                start_line = index + 1;
            } else {
                pending.push('\n');
            }
            pending.push_str(line);
            if bracket_depth(&pending) > 0 {
                continue;
            }

            let command = std::mem::take(&mut pending);
            let outcome = self
                .eval_line(&command)
                .map_err(|e| at_line(e, path, start_line))?;
            if outcome == Outcome::Quit {
                return Ok(true);
            }
        }

        if pending.trim().is_empty() {
            Ok(false)
        } else {
            Err(at_line(
                Error::invalid_argument("unterminated JSON at end of script"),
                path,
                start_line,
            ))
        }
    }

    fn refresh_keywords(&mut self) {
        let kinds = self
            .session
            .store()
            .kinds()
            .map(|kind| kind.as_str().to_owned())
            .collect();
        self.editor.set_keywords(kinds);
    }

    /// Reads a command, continuing across lines while brackets are open.
    fn read_input(&mut self) -> Result<Option<String>> {
        let mut input = String::new();
        let mut first_line = true;

        loop {
            let read = if first_line {
                self.editor.read_line(&self.prompt)?
            } else {
                self.editor.read_continuation(&self.continuation_prompt)?
            };

            match read {
                ReadResult::Line(line) => {
                    if !first_line {
                        input.push('\n');
                    }
                    input.push_str(&line);
                    if bracket_depth(&input) <= 0 {
                        return Ok(Some(input));
                    }
                    first_line = false;
                }
                ReadResult::Interrupted => {
                    if !first_line {
                        println!("\nInput cancelled.");
                    }
                    return Ok(Some(String::new()));
                }
                ReadResult::Eof => {
                    if first_line {
                        return Ok(None);
                    }
                    return Err(Error::new(ErrorKind::Internal(
                        "unexpected EOF in multi-line input".to_string(),
                    )));
                }
            }
        }
    }

    #[allow(clippy::unused_self)]
    fn print_banner(&self) {
        println!("\x1b[1;36modot\x1b[0m v{}", env!("CARGO_PKG_VERSION"));
        println!("Type `help` for commands. Use Ctrl+D to exit.\n");
        let _ = io::stdout().flush();
    }
}

impl<E: LineEditor> std::fmt::Debug for Repl<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repl")
            .field("session", &self.session)
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}

fn at_line(mut error: Error, path: &Path, line: usize) -> Error {
    let context = error
        .context
        .take()
        .unwrap_or_default()
        .with_source(format!("{}:{line}", path.display()));
    error.with_context(context)
}

fn print_error(error: &Error) {
    eprintln!("\x1b[31mError: {error}\x1b[0m");
}
