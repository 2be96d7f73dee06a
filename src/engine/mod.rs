//! engine
//!
//! Codeflow health analysis.
//!
//! # Architecture
//!
//! The [`analyzer::Analyzer`] drives one run through its phases. Each phase
//! is a plain module with pure decision functions, so the forge-facing code
//! stays in the analyzer and the rules stay testable with fixed inputs:
//!
//! - [`discovery`] - Finding open, merged and forward-flow PRs
//! - [`reconcile`] - Up-to-date vs missing for branches without an open PR
//! - [`classify`] - Conflict, staleness and CI health of open PRs
//! - [`report`] - JSON report, summaries and status line
//! - [`retry`] - Fixed-delay retry for the lagging merged-PR search
//! - [`markers`] - Metadata embedded in codeflow PR bodies
//!
//! # Invariants
//!
//! - A forge failure never aborts a run; it degrades one entry to `unknown`.
//! - Every backflow branch appears at most once in the report.

pub mod analyzer;
pub mod classify;
pub mod discovery;
pub mod markers;
pub mod reconcile;
pub mod report;
pub mod retry;

pub use analyzer::Analyzer;
pub use report::Report;
