//! odot CLI entry point.

use std::env;
use std::process::ExitCode;

use odot_runtime::{CliOptions, Repl, Session, behaviors};
use tracing::info;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let options = CliOptions::parse(args)?;

    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.show_version {
        println!("odot {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(options.session.verbosity.level_filter())
        .with_target(false)
        .init();

    let entry_script = options.session.entry_script.clone();
    let mut session = Session::new(options.session).with_library(behaviors::standard());
    let report = session.open()?;
    info!(
        kinds = report.kinds,
        entities = report.entities,
        document = %session.config().document.display(),
        "opened"
    );

    let mut repl = Repl::new(session)?;
    let mut quit = false;
    if let Some(script) = &entry_script {
        quit = repl.eval_file(script)?;
        repl.session().warn_unmapped();
    }

    if !options.batch && !quit {
        if entry_script.is_some() {
            repl = repl.without_banner();
        }
        repl.run()?;
    }

    repl.into_session().close()?;
    Ok(())
}

fn print_help() {
    let commands = odot_runtime::command::HELP
        .lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    let behaviors = behaviors::standard()
        .names()
        .map(|name| format!("    {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    println!(
        "\x1b[1modot\x1b[0m - Prototype-backed object database in one JSON file

\x1b[1mUSAGE:\x1b[0m
    odot [OPTIONS] [SCRIPT]

\x1b[1mARGUMENTS:\x1b[0m
    [SCRIPT]      Console commands to run after the document loads;
                  relative manifest paths resolve against its directory

\x1b[1mOPTIONS:\x1b[0m
    -h, --help             Print help information
    -V, --version          Print version information
    -b, --batch            Run the script and exit (no console)
    -d, --document PATH    Document to load and save (default: o.json)
        --no-save          Do not save when the session ends
    -q, --quiet            Log errors only
    -v, --verbose          Log more (repeat, or -vv for debug)

\x1b[1mEXAMPLES:\x1b[0m
    odot                           Open o.json and start the console
    odot world/setup.odot          Run setup.odot, then start the console
    odot -b -d rail.json fix.odot  Run fix.odot against rail.json and exit
    odot -vv --no-save             Explore with debug logging, keep nothing

\x1b[1mBEHAVIORS:\x1b[0m
    Compiled behaviors a manifest can list under \"behaviors\"; only
    these are available from the console:
{behaviors}

\x1b[1mCONSOLE COMMANDS:\x1b[0m
{commands}
    Ctrl+D               Exit (saves unless --no-save)
    Ctrl+C               Cancel current input"
    );
}
