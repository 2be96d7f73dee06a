//! Health command - analyze one repository and print the report

use anyhow::{Context as _, Result};
use chrono::Utc;

use super::Context;
use crate::core::config::Config;
use crate::core::types::RepoSlug;
use crate::engine::Analyzer;
use crate::forge::gh_cli::GhCliForge;
use crate::ui::output;

/// Run the analysis for `repo` and print the report.
///
/// JSON goes to stdout, the status line to stderr. Unhealthy PRs are not
/// an error.
pub fn health(ctx: &Context, repo: &RepoSlug, branch: Option<&str>) -> Result<()> {
    let loaded = Config::load().context("Failed to load config")?;
    for warning in &loaded.warnings {
        output::progress(
            format!("warning: {} ({})", warning.message, warning.path.display()),
            ctx.verbosity,
        );
    }
    if let Some(path) = loaded.config.loaded_from() {
        output::debug(format!("config loaded from {}", path.display()), ctx.verbosity);
    }

    let settings = loaded.config.settings;
    let forge = GhCliForge::from_config(&settings);
    output::debug(format!("forge CLI: {}", forge.program()), ctx.verbosity);

    let analyzer = Analyzer::new(forge, settings)
        .context("Invalid configuration")?
        .with_verbosity(ctx.verbosity);

    let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let report = rt.block_on(analyzer.analyze(repo, branch, Utc::now()));

    output::status(report.status_line());
    let json = report.to_json().context("Failed to serialize report")?;
    println!("{}", json);

    Ok(())
}
