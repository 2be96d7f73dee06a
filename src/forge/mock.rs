//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge stores canned listings, PR bodies, PR details, branch heads
//! and comparisons in memory, keyed by repository. Anything not configured
//! answers like `gh` does for a missing resource (a non-zero exit). Failures
//! can be injected per key, and every call is recorded for verification.
//!
//! Listings are queued per `(repo, state)`: each call pops the front of the
//! queue and the last entry repeats, so a test can script "empty, empty,
//! then results" for the merged-PR search.
//!
//! # Example
//!
//! ```
//! use codeflow_health::core::types::RepoSlug;
//! use codeflow_health::forge::mock::MockForge;
//! use codeflow_health::forge::{CodeflowForge, PrListing, PrQuery, SearchState};
//!
//! # tokio_test::block_on(async {
//! let repo = RepoSlug::new("dotnet/runtime").unwrap();
//! let forge = MockForge::new().with_listing(
//!     &repo,
//!     SearchState::Open,
//!     vec![PrListing {
//!         number: 7,
//!         title: "[main] Source code updates from dotnet/dotnet".into(),
//!         closed_at: None,
//!     }],
//! );
//!
//! let query = PrQuery::new(repo.clone(), "author:app/dotnet-maestro", SearchState::Open, 100);
//! let rows = forge.list_prs(&query).await.unwrap();
//! assert_eq!(rows[0].number, 7);
//! assert!(forge.pr_body(&repo, 7).await.is_err());
//! # });
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::traits::{
    CodeflowForge, Comparison, ForgeError, HeadCommit, PrDetail, PrListing, PrQuery, SearchState,
};
use crate::core::types::RepoSlug;

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping, so clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockForge {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockForgeInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockForgeInner {
    listings: HashMap<(String, SearchState), VecDeque<Vec<PrListing>>>,
    bodies: HashMap<(String, u64), String>,
    details: HashMap<(String, u64), PrDetail>,
    heads: HashMap<(String, String), HeadCommit>,
    comparisons: HashMap<(String, String, String), Comparison>,
    /// Failure rules, checked before any lookup.
    fail_on: Vec<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Configuration for which call should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail every listing with the given state.
    ListPrs(SearchState, ForgeError),
    /// Fail the body fetch of one PR.
    PrBody(u64, ForgeError),
    /// Fail the detail fetch of one PR.
    PrDetail(u64, ForgeError),
    /// Fail the head lookup of one branch.
    BranchHead(String, ForgeError),
    /// Fail every comparison.
    Compare(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    ListPrs {
        repo: String,
        search: String,
        state: SearchState,
        limit: u32,
    },
    PrBody {
        repo: String,
        number: u64,
    },
    PrDetail {
        repo: String,
        number: u64,
        with_body: bool,
    },
    BranchHead {
        repo: String,
        branch: String,
    },
    Compare {
        repo: String,
        base: String,
        head: String,
    },
}

fn not_found(what: String) -> ForgeError {
    ForgeError::ExitStatus {
        code: Some(1),
        stderr: format!("HTTP 404: Not Found ({})", what),
    }
}

impl MockForge {
    /// Create a new empty mock forge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a listing answer for `(repo, state)`.
    ///
    /// Calls pop answers in order; the last queued answer repeats.
    pub fn with_listing(self, repo: &RepoSlug, state: SearchState, rows: Vec<PrListing>) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner
                .listings
                .entry((repo.to_string(), state))
                .or_default()
                .push_back(rows);
        }
        self
    }

    /// Set the body text of a PR.
    pub fn with_body(self, repo: &RepoSlug, number: u64, body: impl Into<String>) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.bodies.insert((repo.to_string(), number), body.into());
        }
        self
    }

    /// Set the health details of a PR.
    pub fn with_detail(self, repo: &RepoSlug, number: u64, detail: PrDetail) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.details.insert((repo.to_string(), number), detail);
        }
        self
    }

    /// Set the head commit of a branch.
    pub fn with_head(
        self,
        repo: &RepoSlug,
        branch: impl Into<String>,
        sha: impl Into<String>,
        date: Option<&str>,
    ) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.heads.insert(
                (repo.to_string(), branch.into()),
                HeadCommit {
                    sha: sha.into(),
                    date: date.map(str::to_string),
                },
            );
        }
        self
    }

    /// Set the result of comparing `base...head`.
    pub fn with_comparison(
        self,
        repo: &RepoSlug,
        base: impl Into<String>,
        head: impl Into<String>,
        ahead_by: u64,
    ) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.comparisons.insert(
                (repo.to_string(), base.into(), head.into()),
                Comparison { ahead_by },
            );
        }
        self
    }

    /// Add a failure rule.
    ///
    /// # Example
    ///
    /// ```
    /// use codeflow_health::forge::mock::{FailOn, MockForge};
    /// use codeflow_health::forge::ForgeError;
    ///
    /// let forge = MockForge::new().fail_on(FailOn::PrDetail(42, ForgeError::Timeout { secs: 60 }));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on.push(fail_on);
        }
        self
    }

    /// Clear all failure rules.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on.clear();
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Count recorded operations matching a predicate.
    pub fn count_operations(&self, pred: impl Fn(&MockOperation) -> bool) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.operations.iter().filter(|op| pred(op)).count()
    }

    /// Record an operation.
    fn record(&self, op: MockOperation) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
    }

    /// Return the first matching failure rule's error, if any.
    fn check_fail(&self, matches: impl Fn(&FailOn) -> Option<ForgeError>) -> Option<ForgeError> {
        let inner = self.inner.lock().unwrap();
        inner.fail_on.iter().find_map(matches)
    }
}

#[async_trait]
impl CodeflowForge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list_prs(&self, query: &PrQuery) -> Result<Vec<PrListing>, ForgeError> {
        self.record(MockOperation::ListPrs {
            repo: query.repo.to_string(),
            search: query.search.clone(),
            state: query.state,
            limit: query.limit,
        });

        if let Some(e) = self.check_fail(|f| match f {
            FailOn::ListPrs(state, e) if *state == query.state => Some(e.clone()),
            _ => None,
        }) {
            return Err(e);
        }

        let mut inner = self.inner.lock().unwrap();
        let queue = inner
            .listings
            .get_mut(&(query.repo.to_string(), query.state))
            .ok_or_else(|| not_found(format!("{} {} PRs", query.repo, query.state)))?;

        let rows = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(rows
            .into_iter()
            .take(query.limit as usize)
            .collect())
    }

    async fn pr_body(&self, repo: &RepoSlug, number: u64) -> Result<String, ForgeError> {
        self.record(MockOperation::PrBody {
            repo: repo.to_string(),
            number,
        });

        if let Some(e) = self.check_fail(|f| match f {
            FailOn::PrBody(n, e) if *n == number => Some(e.clone()),
            _ => None,
        }) {
            return Err(e);
        }

        let inner = self.inner.lock().unwrap();
        inner
            .bodies
            .get(&(repo.to_string(), number))
            .cloned()
            .ok_or_else(|| not_found(format!("PR #{}", number)))
    }

    async fn pr_detail(
        &self,
        repo: &RepoSlug,
        number: u64,
        with_body: bool,
    ) -> Result<PrDetail, ForgeError> {
        self.record(MockOperation::PrDetail {
            repo: repo.to_string(),
            number,
            with_body,
        });

        if let Some(e) = self.check_fail(|f| match f {
            FailOn::PrDetail(n, e) if *n == number => Some(e.clone()),
            _ => None,
        }) {
            return Err(e);
        }

        let inner = self.inner.lock().unwrap();
        let mut detail = inner
            .details
            .get(&(repo.to_string(), number))
            .cloned()
            .ok_or_else(|| not_found(format!("PR #{}", number)))?;

        if with_body {
            if detail.body.is_none() {
                detail.body = inner.bodies.get(&(repo.to_string(), number)).cloned();
            }
        } else {
            detail.body = None;
        }
        Ok(detail)
    }

    async fn branch_head(&self, repo: &RepoSlug, branch: &str) -> Result<HeadCommit, ForgeError> {
        self.record(MockOperation::BranchHead {
            repo: repo.to_string(),
            branch: branch.to_string(),
        });

        if let Some(e) = self.check_fail(|f| match f {
            FailOn::BranchHead(b, e) if b == branch => Some(e.clone()),
            _ => None,
        }) {
            return Err(e);
        }

        let inner = self.inner.lock().unwrap();
        inner
            .heads
            .get(&(repo.to_string(), branch.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("branch {}", branch)))
    }

    async fn compare(
        &self,
        repo: &RepoSlug,
        base: &str,
        head: &str,
    ) -> Result<Comparison, ForgeError> {
        self.record(MockOperation::Compare {
            repo: repo.to_string(),
            base: base.to_string(),
            head: head.to_string(),
        });

        if let Some(e) = self.check_fail(|f| match f {
            FailOn::Compare(e) => Some(e.clone()),
            _ => None,
        }) {
            return Err(e);
        }

        let inner = self.inner.lock().unwrap();
        inner
            .comparisons
            .get(&(repo.to_string(), base.to_string(), head.to_string()))
            .copied()
            .ok_or_else(|| not_found(format!("compare {}...{}", base, head)))
    }
}
