//! forge::traits
//!
//! Forge trait definition for the codeflow queries the analyzer issues.
//!
//! # Design
//!
//! The `CodeflowForge` trait is async because every query is an external
//! process call. All methods return `Result`, but callers in the engine treat
//! every `ForgeError` variant identically: the lookup is absent and the
//! affected entry degrades, the batch carries on.
//!
//! # Example
//!
//! ```ignore
//! use codeflow_health::forge::{CodeflowForge, PrQuery, SearchState};
//!
//! async fn open_codeflow_prs(forge: &dyn CodeflowForge, repo: &RepoSlug) {
//!     let query = PrQuery::new(repo.clone(), "author:app/dotnet-maestro", SearchState::Open, 100);
//!     match forge.list_prs(&query).await {
//!         Ok(prs) => println!("{} open PRs", prs.len()),
//!         Err(e) => eprintln!("lookup failed: {}", e),
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::core::types::RepoSlug;

/// Errors from forge queries.
///
/// Non-zero exit, empty output and malformed JSON are distinct variants for
/// diagnostics only; no caller branches on them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForgeError {
    /// The forge CLI could not be started.
    #[error("failed to run forge CLI: {0}")]
    Spawn(String),

    /// The call exceeded its timeout and was killed.
    #[error("forge CLI timed out after {secs}s")]
    Timeout {
        /// Timeout that was exceeded
        secs: u64,
    },

    /// The forge CLI exited unsuccessfully.
    #[error("forge CLI exited with {}: {stderr}", .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()))]
    ExitStatus {
        /// Exit code, `None` if killed by a signal
        code: Option<i32>,
        /// Trimmed standard error
        stderr: String,
    },

    /// The forge CLI succeeded but printed nothing.
    #[error("forge CLI returned empty output")]
    EmptyOutput,

    /// The output was not the JSON shape we expected.
    #[error("failed to parse forge output: {0}")]
    Parse(String),
}

/// PR state filter for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchState {
    Open,
    Merged,
}

impl SearchState {
    /// JSON fields requested for this kind of listing.
    pub fn fields(&self) -> &'static str {
        match self {
            SearchState::Open => "number,title",
            SearchState::Merged => "number,title,closedAt",
        }
    }
}

impl std::fmt::Display for SearchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchState::Open => write!(f, "open"),
            SearchState::Merged => write!(f, "merged"),
        }
    }
}

/// A PR search against one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrQuery {
    pub repo: RepoSlug,
    /// Forge search expression, e.g. `author:app/dotnet-maestro`
    pub search: String,
    pub state: SearchState,
    pub limit: u32,
}

impl PrQuery {
    pub fn new(repo: RepoSlug, search: impl Into<String>, state: SearchState, limit: u32) -> Self {
        Self {
            repo,
            search: search.into(),
            state,
            limit,
        }
    }
}

/// One row of a PR listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrListing {
    #[serde(default)]
    pub number: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub closed_at: Option<String>,
}

/// Author of a PR comment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommentAuthor {
    #[serde(default, deserialize_with = "null_as_default")]
    pub login: String,
}

/// A PR comment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub author: Option<CommentAuthor>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
}

impl Comment {
    pub fn new(login: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            author: Some(CommentAuthor {
                login: login.into(),
            }),
            body: body.into(),
        }
    }

    /// Author login, empty when the author is unknown (deleted account).
    pub fn login(&self) -> &str {
        self.author.as_ref().map(|a| a.login.as_str()).unwrap_or("")
    }
}

/// One entry of a CI status rollup.
///
/// Check runs carry `status`/`conclusion`; legacy commit statuses carry
/// `state`. Missing fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CheckContext {
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Health-relevant details of a single PR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrDetail {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub mergeable: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Vec<Comment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status_check_rollup: Vec<CheckContext>,
}

/// Head commit of a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadCommit {
    pub sha: String,
    /// Committer date, ISO-8601
    pub date: Option<String>,
}

/// Result of a three-dot commit comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Comparison {
    pub ahead_by: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The forge operations the analyzer needs.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one instance can be shared by
/// every fan-out task of a phase.
#[async_trait]
pub trait CodeflowForge: Send + Sync {
    /// Get the forge name (e.g., "gh-cli", "mock").
    fn name(&self) -> &'static str;

    /// Search PRs of a repository.
    async fn list_prs(&self, query: &PrQuery) -> Result<Vec<PrListing>, ForgeError>;

    /// Fetch the body text of a PR.
    async fn pr_body(&self, repo: &RepoSlug, number: u64) -> Result<String, ForgeError>;

    /// Fetch mergeability, comments and CI rollup of a PR.
    ///
    /// The body is only requested when `with_body` is set.
    async fn pr_detail(
        &self,
        repo: &RepoSlug,
        number: u64,
        with_body: bool,
    ) -> Result<PrDetail, ForgeError>;

    /// Resolve the head commit of a branch.
    async fn branch_head(&self, repo: &RepoSlug, branch: &str) -> Result<HeadCommit, ForgeError>;

    /// Compare `base...head` and report how far `head` is ahead.
    async fn compare(
        &self,
        repo: &RepoSlug,
        base: &str,
        head: &str,
    ) -> Result<Comparison, ForgeError>;
}
