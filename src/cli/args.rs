//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Flags
//!
//! - `<owner/repo>`: Repository to analyze (required)
//! - `--branch <name>`: Only report this branch
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Only the status line on stderr
//! - `--help` / `--version`

use clap::Parser;

use crate::core::types::RepoSlug;

/// Usage line shown with every argument error.
pub const USAGE: &str = "flow-health <owner/repo> [--branch <name>]";

/// Report the health of codeflow PRs between a repository and the VMR
#[derive(Parser, Debug)]
#[command(name = "flow-health")]
#[command(author, version, about, long_about = None)]
#[command(override_usage = USAGE)]
#[command(after_help = "\
The JSON report is printed on stdout; progress and the status line go to stderr.

EXAMPLES:
    flow-health dotnet/runtime
    flow-health dotnet/aspnetcore --branch release/9.0 > health.json")]
pub struct Cli {
    /// Repository to analyze, as <owner/repo>
    #[arg(value_name = "owner/repo", value_parser = parse_repository)]
    pub repository: RepoSlug,

    /// Only report this branch
    #[arg(long, value_name = "name")]
    pub branch: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Suppress progress lines
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_repository(value: &str) -> Result<RepoSlug, String> {
    RepoSlug::new(value).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse arguments, returning clap's error instead of exiting.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args)
    }

    /// The branch filter, ignoring an empty value.
    pub fn branch_filter(&self) -> Option<&str> {
        self.branch.as_deref().filter(|b| !b.is_empty())
    }
}
