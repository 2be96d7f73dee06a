//! forge
//!
//! Abstraction over the hosted git forge the analyzer queries.
//!
//! # Architecture
//!
//! The `CodeflowForge` trait defines the five queries the analyzer issues.
//! The engine only ever sees the trait, so tests swap in [`mock::MockForge`]
//! and production uses [`gh_cli::GhCliForge`].
//!
//! Forge failures never abort a run: each failed query makes one lookup
//! absent, and the report degrades that entry instead.
//!
//! # Modules
//!
//! - `traits`: Core `CodeflowForge` trait and request/response types
//! - [`gh_cli`]: Implementation that runs the `gh` executable
//! - [`mock`]: Mock implementation for deterministic testing

pub mod gh_cli;
pub mod mock;
mod traits;

pub use traits::*;
