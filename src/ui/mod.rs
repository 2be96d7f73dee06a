//! ui
//!
//! User-facing terminal output.
//!
//! # Modules
//!
//! - [`output`] - Progress, status and error lines on stderr

pub mod output;
