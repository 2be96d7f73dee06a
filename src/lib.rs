//! codeflow-health - health of codeflow pull requests
//!
//! Codeflow keeps a component repository and the VMR (the combined
//! repository) in sync through bot-authored PRs in both directions. This
//! crate finds those PRs through the `gh` CLI and classifies them:
//!
//! - **Backflow** (VMR into the repository): every branch is either an open
//!   PR with a health status, or reconciled against the VMR branch head as
//!   up to date, missing, or a released preview.
//! - **Forward flow** (repository into the VMR): every open PR gets a health
//!   status.
//!
//! # Architecture
//!
//! - [`cli`] - Argument parsing, logging setup, exit codes
//! - [`engine`] - Discovery, reconciliation, classification, reporting
//! - [`core`] - Domain types and configuration
//! - [`forge`] - Abstraction over the forge CLI, with a mock for tests
//! - [`ui`] - Human-readable stderr output
//!
//! # Invariants
//!
//! 1. Stdout carries exactly one JSON document.
//! 2. A failed forge call degrades one entry to `unknown`; it never aborts
//!    the run.
//! 3. Only argument validation and config loading are fatal.

pub mod cli;
pub mod core;
pub mod engine;
pub mod forge;
pub mod ui;
