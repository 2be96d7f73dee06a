//! cli::commands
//!
//! Command handlers.
//!
//! # Async
//!
//! Forge calls are async. Handlers stay synchronous and drive the analysis
//! on their own `tokio` runtime.

mod health;

pub use health::health;

use crate::ui::output::Verbosity;

/// Execution context derived from global flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    pub verbosity: Verbosity,
}

impl Context {
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        Self {
            verbosity: Verbosity::from_flags(quiet, debug),
        }
    }
}
