//! cli
//!
//! Command-line interface layer.
//!
//! # Responsibilities
//!
//! - Parse arguments and global flags
//! - Set up diagnostic logging
//! - Delegate to the health command
//! - Map outcomes to exit codes
//!
//! # Exit codes
//!
//! - `0`: the report was produced (even if PRs are unhealthy), or
//!   `--help`/`--version` was requested
//! - `1`: invalid arguments or an unusable configuration

pub mod args;
pub mod commands;

pub use args::{Cli, USAGE};

use std::process::ExitCode;

use clap::error::ErrorKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ui::output;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> ExitCode {
    let cli = match Cli::try_parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => return argument_error(e),
    };

    init_tracing(cli.debug);

    let ctx = commands::Context::from_flags(cli.quiet, cli.debug);
    match commands::health(&ctx, &cli.repository, cli.branch_filter()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Report a clap error and pick the exit code.
fn argument_error(e: clap::Error) -> ExitCode {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            // Help goes to stdout; nothing useful to do if that fails.
            let _ = e.print();
            ExitCode::SUCCESS
        }
        _ => {
            let rendered = e.render().to_string();
            eprint!("{}", rendered);
            if !rendered.contains("Usage:") {
                eprintln!("\nUsage: {}", USAGE);
            }
            ExitCode::FAILURE
        }
    }
}

/// Install the stderr diagnostic logger.
///
/// `RUST_LOG` wins when set; otherwise `--debug` selects `debug` for this
/// crate and everything else stays at `warn`.
fn init_tracing(debug: bool) {
    let default = if debug {
        "warn,codeflow_health=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
