//! core::types
//!
//! Strong types for codeflow domain concepts.
//!
//! # Types
//!
//! - [`RepoSlug`] - Validated `owner/name` repository identifier
//! - [`Direction`] - Backflow or forward flow
//! - [`PrState`] - Open or merged
//! - [`CodeflowPr`] - A discovered codeflow pull request
//!
//! # Validation
//!
//! `RepoSlug` enforces validity at construction time, so every forge call
//! downstream receives a well-formed repository argument.
//!
//! # Examples
//!
//! ```
//! use codeflow_health::core::types::{branch_from_title, RepoSlug};
//!
//! let repo: RepoSlug = "dotnet/runtime".parse().unwrap();
//! assert_eq!(repo.owner(), "dotnet");
//! assert_eq!(repo.name(), "runtime");
//!
//! assert!("not-a-repo".parse::<RepoSlug>().is_err());
//! assert_eq!(
//!     branch_from_title("[release/9.0] Source code updates from dotnet/dotnet"),
//!     Some("release/9.0".to_string())
//! );
//! ```

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid repository '{0}': expected <owner/repo>")]
    InvalidRepository(String),
}

fn repo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+$").expect("repository pattern is valid")
    })
}

fn title_branch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\[([^\]]+)\]").expect("title pattern is valid"))
}

/// A validated `owner/name` repository identifier.
///
/// Both halves are limited to ASCII letters, digits, `_`, `.` and `-`.
///
/// # Example
///
/// ```
/// use codeflow_health::core::types::RepoSlug;
///
/// let repo = RepoSlug::new("dotnet/aspnetcore").unwrap();
/// assert_eq!(repo.as_str(), "dotnet/aspnetcore");
///
/// assert!(RepoSlug::new("").is_err());
/// assert!(RepoSlug::new("dotnet").is_err());
/// assert!(RepoSlug::new("dotnet/run time").is_err());
/// assert!(RepoSlug::new("a/b/c").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct RepoSlug(String);

impl RepoSlug {
    /// Create a new validated repository identifier.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRepository` if the value is not `owner/name`.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if !repo_pattern().is_match(&value) {
            return Err(TypeError::InvalidRepository(value));
        }
        Ok(Self(value))
    }

    /// The owner half (before the slash).
    pub fn owner(&self) -> &str {
        self.0.split_once('/').map(|(o, _)| o).unwrap_or(&self.0)
    }

    /// The repository name half (after the slash).
    pub fn name(&self) -> &str {
        self.0.split_once('/').map(|(_, n)| n).unwrap_or(&self.0)
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RepoSlug {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<RepoSlug> for String {
    fn from(repo: RepoSlug) -> Self {
        repo.0
    }
}

impl AsRef<str> for RepoSlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction a codeflow PR moves code in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// VMR back into a component repository.
    Backflow,
    /// Component repository into the VMR.
    ForwardFlow,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Backflow => write!(f, "backflow"),
            Direction::ForwardFlow => write!(f, "forward-flow"),
        }
    }
}

/// PR state as far as discovery is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// A discovered codeflow pull request.
///
/// Identity is `number` within the repository it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeflowPr {
    pub number: u64,
    pub title: String,
    /// Target branch, taken from the `[branch]` title prefix.
    pub branch: String,
    pub direction: Direction,
    pub state: PrState,
    /// ISO-8601 close time, merged PRs only.
    pub closed_at: Option<String>,
}

/// Extract the branch name from a `[branch] ...` title prefix.
pub fn branch_from_title(title: &str) -> Option<String> {
    title_branch_pattern()
        .captures(title)
        .map(|caps| caps[1].to_string())
}

/// Abbreviate a commit SHA for display.
///
/// Shorter inputs are returned unchanged.
pub fn short_sha(sha: &str) -> String {
    sha.chars().take(12).collect()
}
