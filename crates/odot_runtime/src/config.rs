//! Session configuration and command-line parsing.

use std::path::{Path, PathBuf};

use odot_foundation::{Error, Result};
use tracing::level_filters::LevelFilter;

/// Default document file name.
pub const DEFAULT_DOCUMENT: &str = "o.json";

/// How much the session logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings and errors.
    #[default]
    Normal,
    /// Adds info (saves, loads, recodes).
    Verbose,
    /// Adds debug detail (definitions, constructions, calls).
    Debug,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// The matching `tracing` level filter.
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::WARN,
            Self::Verbose => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    const fn louder(self) -> Self {
        match self {
            Self::Quiet => Self::Normal,
            Self::Normal => Self::Verbose,
            Self::Verbose => Self::Debug,
            Self::Debug | Self::Trace => Self::Trace,
        }
    }
}

/// Where a session keeps its document and how it behaves around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// The persisted document.
    pub document: PathBuf,
    /// Script of console commands run at startup.
    pub entry_script: Option<PathBuf>,
    /// Directory relative manifest paths resolve against.
    pub base_dir: PathBuf,
    /// Save the document when the session closes.
    pub save_on_exit: bool,
    /// Log level.
    pub verbosity: Verbosity,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            document: PathBuf::from(DEFAULT_DOCUMENT),
            entry_script: None,
            base_dir: PathBuf::from("."),
            save_on_exit: true,
            verbosity: Verbosity::default(),
        }
    }
}

impl SessionConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document path.
    #[must_use]
    pub fn with_document(mut self, path: impl Into<PathBuf>) -> Self {
        self.document = path.into();
        self
    }

    /// Sets the entry script; relative manifests then resolve against the
    /// script's directory.
    #[must_use]
    pub fn with_entry_script(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            self.base_dir = dir.to_path_buf();
        }
        self.entry_script = Some(path);
        self
    }

    /// Sets the directory relative manifest paths resolve against.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Turns the save on close on or off.
    #[must_use]
    pub const fn with_save_on_exit(mut self, save: bool) -> Self {
        self.save_on_exit = save;
        self
    }

    /// Sets the log level.
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Resolves a manifest path against the base directory.
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Everything the command line asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// Session settings.
    pub session: SessionConfig,
    /// Run the entry script and exit without starting the console.
    pub batch: bool,
    /// Print usage and exit.
    pub show_help: bool,
    /// Print the version and exit.
    pub show_version: bool,
}

impl CliOptions {
    /// Parses arguments, skipping the program name in `args[0]`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown options, a missing option value, or more
    /// than one entry script.
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut options = Self::default();
        let mut session = SessionConfig::default();
        let mut script = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-h" | "--help" => options.show_help = true,
                "-V" | "--version" => options.show_version = true,
                "-b" | "--batch" => options.batch = true,
                "--no-save" => session.save_on_exit = false,
                "-q" | "--quiet" => session.verbosity = Verbosity::Quiet,
                "-v" | "--verbose" => session.verbosity = session.verbosity.louder(),
                "-vv" => session.verbosity = session.verbosity.louder().louder(),
                "-d" | "--document" => {
                    i += 1;
                    let Some(path) = args.get(i) else {
                        return Err(Error::invalid_argument("--document requires a path"));
                    };
                    session.document = PathBuf::from(path);
                }
                arg if arg.starts_with('-') => {
                    return Err(Error::invalid_argument(format!("unknown option: {arg}")));
                }
                path => {
                    if script.is_some() {
                        return Err(Error::invalid_argument(format!(
                            "only one entry script is allowed, got another: {path}"
                        )));
                    }
                    script = Some(PathBuf::from(path));
                }
            }
            i += 1;
        }

        if let Some(script) = script {
            session = session.with_entry_script(script);
        }
        options.session = session;
        Ok(options)
    }
}
