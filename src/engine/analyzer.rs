//! engine::analyzer
//!
//! Runs one health analysis end to end.
//!
//! # Phases
//!
//! ```text
//! discover -> { merged bodies, open health } -> VMR heads -> compare
//!          -> classify open -> forward flow -> report
//! ```
//!
//! Phases run in order. Inside a phase every forge call is its own task on a
//! `JoinSet`; each task hands back `(key, result)` and the joining loop is
//! the only writer of the phase's map, so no locking is needed. A failed
//! call leaves its key out of the map and the entry degrades downstream.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinSet;

use super::classify::{classify_pr, PrHealth};
use super::discovery::{discover_backflow, discover_forward};
use super::reconcile::{classify_branch, commits_match, BodyMarkers, BranchInputs};
use super::report::{BackflowEntry, ForwardEntry, OpenBranchEntry, ReconciledEntry, Report};
use crate::core::config::{ConfigError, FlowHealthConfig};
use crate::core::types::{Direction, RepoSlug};
use crate::forge::{CodeflowForge, Comparison, ForgeError, HeadCommit, PrDetail};
use crate::ui::output::{self, Verbosity};

type PhaseTasks<K, T> = JoinSet<(K, Result<T, ForgeError>)>;

/// Join every task of a phase into a map, dropping failed lookups.
async fn join_phase<K, T>(mut tasks: PhaseTasks<K, T>, lookup: &'static str) -> BTreeMap<K, T>
where
    K: Ord + Display + Send + 'static,
    T: Send + 'static,
{
    let mut results = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((key, Ok(value))) => {
                results.insert(key, value);
            }
            Ok((key, Err(e))) => {
                tracing::warn!(%key, lookup, error = %e, "lookup failed");
            }
            Err(e) => {
                tracing::error!(lookup, error = %e, "lookup task did not complete");
            }
        }
    }
    results
}

/// Health analyzer over a forge.
pub struct Analyzer<F: CodeflowForge + 'static> {
    forge: Arc<F>,
    config: FlowHealthConfig,
    vmr: RepoSlug,
    preview_threshold: Duration,
    verbosity: Verbosity,
}

impl<F: CodeflowForge + 'static> Analyzer<F> {
    /// Create an analyzer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the VMR repository is malformed
    /// or the preview threshold is out of range.
    pub fn new(forge: F, config: FlowHealthConfig) -> Result<Self, ConfigError> {
        let vmr = config.vmr()?;
        let preview_threshold = config.preview_threshold()?;
        Ok(Self {
            forge: Arc::new(forge),
            config,
            vmr,
            preview_threshold,
            verbosity: Verbosity::Normal,
        })
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn forge(&self) -> &F {
        &self.forge
    }

    /// Analyze `repo`, optionally restricted to one branch.
    ///
    /// `now` is the reference time for merge ages.
    pub async fn analyze(
        &self,
        repo: &RepoSlug,
        branch: Option<&str>,
        now: DateTime<Utc>,
    ) -> Report {
        output::progress(
            format!("🔍 Searching for codeflow PRs in {}...", repo),
            self.verbosity,
        );
        let discovery = discover_backflow(self.forge.as_ref(), repo, &self.config, branch).await;
        output::progress(
            format!(
                "  ✅ Found {} open, {} merged codeflow PRs",
                discovery.open.len(),
                discovery.merged_count
            ),
            self.verbosity,
        );

        output::progress(
            "📦 Fetching PR metadata and VMR branch data...",
            self.verbosity,
        );
        let mut body_tasks: PhaseTasks<String, String> = JoinSet::new();
        for (branch, pr) in discovery.without_open_pr() {
            let forge = Arc::clone(&self.forge);
            let repo = repo.clone();
            let (branch, number) = (branch.clone(), pr.number);
            body_tasks.spawn(async move { (branch, forge.pr_body(&repo, number).await) });
        }

        let mut health_tasks: PhaseTasks<String, PrDetail> = JoinSet::new();
        for (branch, pr) in &discovery.open {
            let forge = Arc::clone(&self.forge);
            let repo = repo.clone();
            let (branch, number) = (branch.clone(), pr.number);
            health_tasks.spawn(async move { (branch, forge.pr_detail(&repo, number, true).await) });
        }

        let markers: BTreeMap<String, BodyMarkers> = join_phase(body_tasks, "merged PR body")
            .await
            .into_iter()
            .map(|(branch, body)| (branch, BodyMarkers::from_body(&body)))
            .collect();

        output::progress("🔗 Comparing VMR branch HEADs...", self.verbosity);
        let heads = self.fetch_heads(&markers).await;
        let comparisons = self.fetch_comparisons(&markers, &heads).await;

        let open_health: BTreeMap<String, PrHealth> = join_phase(health_tasks, "open PR health")
            .await
            .into_iter()
            .map(|(branch, detail)| {
                let health = classify_pr(&detail, &self.config.bot_login_prefix, Direction::Backflow);
                (branch, health)
            })
            .collect();

        output::progress("↔️ Scanning forward flow PRs...", self.verbosity);
        let forward = discover_forward(self.forge.as_ref(), repo, &self.vmr, &self.config, branch).await;
        let forward_health = self.fetch_forward_health(forward.iter().map(|pr| pr.number)).await;

        let no_markers = BodyMarkers::default();

        let mut branches: Vec<BackflowEntry> = discovery
            .open
            .iter()
            .map(|(branch, pr)| BackflowEntry::Open(OpenBranchEntry::new(pr, open_health.get(branch))))
            .collect();

        for (branch, pr) in discovery.without_open_pr() {
            let body_markers = markers.get(branch).unwrap_or(&no_markers);
            let head = heads.get(branch);
            let inputs = BranchInputs {
                closed_at: pr.closed_at.as_deref(),
                vmr_branch: body_markers.vmr_branch.as_deref(),
                vmr_commit: body_markers.vmr_commit.as_deref(),
                head,
                comparison: comparisons.get(branch).copied(),
            };
            let verdict = classify_branch(&inputs, self.preview_threshold, now);
            tracing::debug!(%branch, status = %verdict.status, "branch reconciled");
            branches.push(BackflowEntry::Reconciled(ReconciledEntry::new(
                pr,
                body_markers,
                head,
                &verdict,
            )));
        }

        let prs = forward
            .iter()
            .map(|pr| ForwardEntry::new(pr, forward_health.get(&pr.number)))
            .collect();

        Report::new(repo.clone(), branches, prs)
    }

    /// Resolve VMR heads for branches whose body named both branch and commit.
    async fn fetch_heads(
        &self,
        markers: &BTreeMap<String, BodyMarkers>,
    ) -> BTreeMap<String, HeadCommit> {
        let mut tasks: PhaseTasks<String, HeadCommit> = JoinSet::new();
        for (branch, markers) in markers {
            let Some((vmr_branch, _)) = markers.both() else {
                tracing::debug!(%branch, "merged PR body lacks branch or commit marker");
                continue;
            };
            let forge = Arc::clone(&self.forge);
            let vmr = self.vmr.clone();
            let (branch, vmr_branch) = (branch.clone(), vmr_branch.to_string());
            tasks.spawn(async move { (branch, forge.branch_head(&vmr, &vmr_branch).await) });
        }
        join_phase(tasks, "VMR branch head").await
    }

    /// Compare the flowed commit to the head where they differ.
    async fn fetch_comparisons(
        &self,
        markers: &BTreeMap<String, BodyMarkers>,
        heads: &BTreeMap<String, HeadCommit>,
    ) -> BTreeMap<String, Comparison> {
        let mut tasks: PhaseTasks<String, Comparison> = JoinSet::new();
        for (branch, head) in heads {
            let Some(commit) = markers.get(branch).and_then(|m| m.vmr_commit.as_deref()) else {
                continue;
            };
            if commits_match(&head.sha, commit) {
                continue;
            }
            let forge = Arc::clone(&self.forge);
            let vmr = self.vmr.clone();
            let (branch, base, head) = (branch.clone(), commit.to_string(), head.sha.clone());
            tasks.spawn(async move { (branch, forge.compare(&vmr, &base, &head).await) });
        }
        join_phase(tasks, "VMR comparison").await
    }

    async fn fetch_forward_health(
        &self,
        numbers: impl Iterator<Item = u64>,
    ) -> BTreeMap<u64, PrHealth> {
        let mut tasks: PhaseTasks<u64, PrDetail> = JoinSet::new();
        for number in numbers {
            let forge = Arc::clone(&self.forge);
            let vmr = self.vmr.clone();
            tasks.spawn(async move { (number, forge.pr_detail(&vmr, number, false).await) });
        }
        join_phase(tasks, "forward flow PR health")
            .await
            .into_iter()
            .map(|(number, detail)| {
                let health =
                    classify_pr(&detail, &self.config.bot_login_prefix, Direction::ForwardFlow);
                (number, health)
            })
            .collect()
    }
}
