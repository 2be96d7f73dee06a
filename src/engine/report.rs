//! engine::report
//!
//! The JSON report and the one-line status summary.
//!
//! # Format
//!
//! ```json
//! {
//!   "repository": "dotnet/runtime",
//!   "backflow": {
//!     "branches": [ ... ],
//!     "summary": { "healthy": 1, "upToDate": 2, "blocked": 0, "missing": 1, "unknown": 0 }
//!   },
//!   "forwardFlow": {
//!     "prs": [ ... ],
//!     "summary": { "healthy": 1, "stale": 0, "conflicted": 0, "ciRed": 0, "unknown": 0 }
//!   }
//! }
//! ```
//!
//! Backflow branches are sorted by name, one entry per branch. Forward-flow
//! PRs keep discovery order. Optional fields are omitted, never `null`.

use serde::Serialize;

use super::classify::{CiStatus, HealthStatus, PrHealth};
use super::reconcile::{AheadBy, BodyMarkers, BranchStatus, BranchVerdict};
use crate::core::types::{short_sha, CodeflowPr, PrState, RepoSlug};
use crate::forge::HeadCommit;

/// Status of any report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryStatus {
    Healthy,
    Conflict,
    Stale,
    CiRed,
    UpToDate,
    Missing,
    ReleasedPreview,
    Unknown,
}

impl From<HealthStatus> for EntryStatus {
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Healthy => EntryStatus::Healthy,
            HealthStatus::Conflict => EntryStatus::Conflict,
            HealthStatus::Stale => EntryStatus::Stale,
            HealthStatus::CiRed => EntryStatus::CiRed,
        }
    }
}

impl From<BranchStatus> for EntryStatus {
    fn from(status: BranchStatus) -> Self {
        match status {
            BranchStatus::UpToDate => EntryStatus::UpToDate,
            BranchStatus::Missing => EntryStatus::Missing,
            BranchStatus::ReleasedPreview => EntryStatus::ReleasedPreview,
            BranchStatus::Unknown => EntryStatus::Unknown,
        }
    }
}

/// Health fields shared by open backflow and forward-flow entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthFields {
    pub has_conflict: bool,
    pub has_staleness: bool,
    pub ci_status: CiStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci_failed_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci_total_count: Option<usize>,
}

impl From<&PrHealth> for HealthFields {
    fn from(health: &PrHealth) -> Self {
        let counts = health.ci.red_counts();
        Self {
            has_conflict: health.has_conflict,
            has_staleness: health.has_staleness,
            ci_status: health.ci.status,
            ci_failed_count: counts.map(|(failed, _)| failed),
            ci_total_count: counts.map(|(_, total)| total),
        }
    }
}

/// Backflow branch with an open codeflow PR.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenBranchEntry {
    pub branch: String,
    pub pr_number: u64,
    pub pr_state: PrState,
    pub status: EntryStatus,
    #[serde(flatten)]
    pub health: Option<HealthFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmr_branch: Option<String>,
}

impl OpenBranchEntry {
    /// Build the entry; without health data the status is `unknown`.
    pub fn new(pr: &CodeflowPr, health: Option<&PrHealth>) -> Self {
        Self {
            branch: pr.branch.clone(),
            pr_number: pr.number,
            pr_state: PrState::Open,
            status: health
                .map(|h| h.status.into())
                .unwrap_or(EntryStatus::Unknown),
            health: health.map(HealthFields::from),
            subscription_id: health.and_then(|h| h.subscription_id.clone()),
            vmr_branch: health.and_then(|h| h.vmr_branch.clone()),
        }
    }
}

/// Backflow branch reconciled against the VMR.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledEntry {
    pub branch: String,
    #[serde(rename = "lastMergedPR")]
    pub last_merged_pr: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_merged_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmr_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_vmr_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmr_head_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmr_head_date: Option<String>,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ahead_by: Option<AheadBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours_since_last_merge: Option<f64>,
}

impl ReconciledEntry {
    pub fn new(
        pr: &CodeflowPr,
        markers: &BodyMarkers,
        head: Option<&HeadCommit>,
        verdict: &BranchVerdict,
    ) -> Self {
        Self {
            branch: pr.branch.clone(),
            last_merged_pr: pr.number,
            last_merged_at: pr.closed_at.clone(),
            vmr_branch: markers.vmr_branch.clone(),
            last_vmr_commit: markers.vmr_commit.as_deref().map(short_sha),
            vmr_head_sha: head.map(|h| short_sha(&h.sha)),
            vmr_head_date: head.and_then(|h| h.date.clone()),
            status: verdict.status.into(),
            ahead_by: verdict.ahead_by,
            hours_since_last_merge: verdict.hours_since_last_merge,
        }
    }
}

/// One backflow branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BackflowEntry {
    Open(OpenBranchEntry),
    Reconciled(ReconciledEntry),
}

impl BackflowEntry {
    pub fn branch(&self) -> &str {
        match self {
            BackflowEntry::Open(e) => &e.branch,
            BackflowEntry::Reconciled(e) => &e.branch,
        }
    }

    pub fn status(&self) -> EntryStatus {
        match self {
            BackflowEntry::Open(e) => e.status,
            BackflowEntry::Reconciled(e) => e.status,
        }
    }
}

/// One forward-flow PR.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardEntry {
    pub pr_number: u64,
    pub branch: String,
    pub title: String,
    pub status: EntryStatus,
    #[serde(flatten)]
    pub health: Option<HealthFields>,
}

impl ForwardEntry {
    pub fn new(pr: &CodeflowPr, health: Option<&PrHealth>) -> Self {
        Self {
            pr_number: pr.number,
            branch: pr.branch.clone(),
            title: pr.title.clone(),
            status: health
                .map(|h| h.status.into())
                .unwrap_or(EntryStatus::Unknown),
            health: health.map(HealthFields::from),
        }
    }
}

/// Backflow counts per status bucket.
///
/// `unknown` is an extra bucket beyond the documented report schema. It
/// counts entries that degraded after a failed lookup, so the buckets
/// always sum to the number of branches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackflowSummary {
    pub healthy: usize,
    /// `up-to-date` and `released-preview`
    pub up_to_date: usize,
    /// `conflict`, `stale` and `ci-red`
    pub blocked: usize,
    pub missing: usize,
    pub unknown: usize,
}

impl BackflowSummary {
    pub fn from_statuses(statuses: impl IntoIterator<Item = EntryStatus>) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            match status {
                EntryStatus::Healthy => summary.healthy += 1,
                EntryStatus::UpToDate | EntryStatus::ReleasedPreview => summary.up_to_date += 1,
                EntryStatus::Conflict | EntryStatus::Stale | EntryStatus::CiRed => {
                    summary.blocked += 1
                }
                EntryStatus::Missing => summary.missing += 1,
                EntryStatus::Unknown => summary.unknown += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.healthy + self.up_to_date + self.blocked + self.missing + self.unknown
    }

    /// Branches needing attention.
    pub fn issues(&self) -> usize {
        self.blocked + self.missing
    }
}

/// Forward-flow counts per status bucket.
///
/// As with [`BackflowSummary`], `unknown` is an extra bucket beyond the
/// documented report schema, for PRs whose detail lookup failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardSummary {
    pub healthy: usize,
    pub stale: usize,
    pub conflicted: usize,
    pub ci_red: usize,
    pub unknown: usize,
}

impl ForwardSummary {
    pub fn from_statuses(statuses: impl IntoIterator<Item = EntryStatus>) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            match status {
                EntryStatus::Healthy => summary.healthy += 1,
                EntryStatus::Stale => summary.stale += 1,
                EntryStatus::Conflict => summary.conflicted += 1,
                EntryStatus::CiRed => summary.ci_red += 1,
                // Branch statuses never occur for forward-flow PRs.
                _ => summary.unknown += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.healthy + self.stale + self.conflicted + self.ci_red + self.unknown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackflowSection {
    pub branches: Vec<BackflowEntry>,
    pub summary: BackflowSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardSection {
    pub prs: Vec<ForwardEntry>,
    pub summary: ForwardSummary,
}

/// Full health report of one repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub repository: RepoSlug,
    pub backflow: BackflowSection,
    pub forward_flow: ForwardSection,
}

impl Report {
    /// Assemble a report; backflow entries are sorted by branch.
    pub fn new(
        repository: RepoSlug,
        mut branches: Vec<BackflowEntry>,
        prs: Vec<ForwardEntry>,
    ) -> Self {
        branches.sort_by(|a, b| a.branch().cmp(b.branch()));
        let backflow_summary = BackflowSummary::from_statuses(branches.iter().map(|e| e.status()));
        let forward_summary = ForwardSummary::from_statuses(prs.iter().map(|e| e.status));

        Self {
            repository,
            backflow: BackflowSection {
                branches,
                summary: backflow_summary,
            },
            forward_flow: ForwardSection {
                prs,
                summary: forward_summary,
            },
        }
    }

    /// Whether nothing needs attention.
    pub fn is_all_clear(&self) -> bool {
        let fwd = &self.forward_flow.summary;
        self.backflow.summary.issues() == 0 && fwd.stale == 0 && fwd.conflicted == 0 && fwd.ci_red == 0
    }

    /// One-line human summary.
    pub fn status_line(&self) -> String {
        let back = &self.backflow.summary;
        let fwd = &self.forward_flow.summary;

        if self.is_all_clear() {
            format!(
                "✅ {}: {} branches healthy, {} forward flow PRs",
                self.repository,
                self.backflow.branches.len(),
                self.forward_flow.prs.len()
            )
        } else {
            format!(
                "⚠️ {}: {} backflow issues ({} blocked, {} missing), {} forward flow issues",
                self.repository,
                back.issues(),
                back.blocked,
                back.missing,
                fwd.stale + fwd.conflicted
            )
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
