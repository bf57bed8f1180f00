//! resp-cli: send commands to a RESP server from the shell
//!
//! Usage:
//! - `resp-cli SET greeting hello` runs one command and prints the reply
//! - `resp-cli --pipeline < commands.txt` sends one command per line as a
//!   single pipeline
//!
//! Connection settings come from flags, `--url`, or a TOML file (`-c`).

mod cli;

use cli::Settings;
use resp_client::{Command, Connection, Pipeline};
use std::io::{self, BufRead};
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = Connection::new(settings.connection);
    conn.connect()?;
    debug!(conn = %conn, "Ready");

    if settings.pipeline {
        let pipeline = read_pipeline(io::stdin().lock())?;
        for reply in pipeline.execute(&mut conn)? {
            println!("{reply}");
        }
        return Ok(());
    }

    if settings.args.is_empty() {
        return Err("no command given".into());
    }

    let command = Command::from_args(settings.args.iter().map(String::as_str));
    conn.send_command(&command)?;
    println!("{}", conn.read_reply()?);
    Ok(())
}

/// One command per non-blank line, split on whitespace.
fn read_pipeline(input: impl BufRead) -> io::Result<Pipeline> {
    let mut pipeline = Pipeline::new();
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        pipeline.cmd(Command::from_args(line.split_whitespace()));
    }
    Ok(pipeline)
}
