//! engine::reconcile
//!
//! Reconciliation of backflow branches that have no open codeflow PR.
//!
//! # Design
//!
//! A branch without an open PR is either up to date with the VMR or is
//! missing a backflow. The last merged PR's body names the VMR branch and
//! commit it flowed; comparing that commit to the current head of the VMR
//! branch tells which.
//!
//! Fetching lives in the analyzer. This module holds the pure decision, so
//! the same inputs and the same clock always give the same verdict.
//!
//! # Decision
//!
//! 1. No head commit (or no referenced commit) → `unknown`.
//! 2. Head and referenced commit equal, or either is a prefix of the other
//!    → `up-to-date` with `aheadBy` 0.
//! 3. Referenced branch contains `preview` and the last merge is older than
//!    the threshold → `released-preview`.
//! 4. Otherwise → `missing`, with the hours since the last merge.
//!
//! In cases 3 and 4 `aheadBy` comes from the comparison, or is unresolved
//! when the comparison failed.

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

use super::markers;
use crate::forge::{Comparison, HeadCommit};

/// Substring that marks a VMR branch as a preview branch.
const PREVIEW_MARKER: &str = "preview";

/// Status of a branch without an open codeflow PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchStatus {
    UpToDate,
    Missing,
    ReleasedPreview,
    Unknown,
}

impl std::fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchStatus::UpToDate => write!(f, "up-to-date"),
            BranchStatus::Missing => write!(f, "missing"),
            BranchStatus::ReleasedPreview => write!(f, "released-preview"),
            BranchStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Commits the VMR branch head is ahead of the last flowed commit.
///
/// Serialized as the count, or `-1` when the comparison could not be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AheadBy {
    Known(u64),
    Unresolved,
}

impl AheadBy {
    pub fn as_i64(&self) -> i64 {
        match self {
            AheadBy::Known(n) => i64::try_from(*n).unwrap_or(i64::MAX),
            AheadBy::Unresolved => -1,
        }
    }
}

impl Serialize for AheadBy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

/// VMR metadata pulled from a merged PR body.
///
/// Each field is independent: a body may name a branch without a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyMarkers {
    pub vmr_branch: Option<String>,
    pub vmr_commit: Option<String>,
}

impl BodyMarkers {
    pub fn from_body(body: &str) -> Self {
        Self {
            vmr_branch: markers::vmr_branch(body),
            vmr_commit: markers::vmr_commit(body),
        }
    }

    /// Branch and commit, when both are known.
    ///
    /// The VMR head is only worth looking up when this is `Some`.
    pub fn both(&self) -> Option<(&str, &str)> {
        match (&self.vmr_branch, &self.vmr_commit) {
            (Some(branch), Some(commit)) => Some((branch.as_str(), commit.as_str())),
            _ => None,
        }
    }
}

/// Whether two SHAs name the same commit.
///
/// Short and full SHAs are equivalent: either may be a prefix of the other.
/// Empty strings never match.
pub fn commits_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.starts_with(b) || b.starts_with(a)
}

/// Everything known about one branch at decision time.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchInputs<'a> {
    /// ISO-8601 close time of the last merged PR.
    pub closed_at: Option<&'a str>,
    pub vmr_branch: Option<&'a str>,
    pub vmr_commit: Option<&'a str>,
    pub head: Option<&'a HeadCommit>,
    pub comparison: Option<Comparison>,
}

/// Outcome of reconciling one branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchVerdict {
    pub status: BranchStatus,
    /// Absent when the status is `unknown`.
    pub ahead_by: Option<AheadBy>,
    /// Only for `missing`, and only when the close time parses.
    pub hours_since_last_merge: Option<f64>,
}

impl BranchVerdict {
    fn unknown() -> Self {
        Self {
            status: BranchStatus::Unknown,
            ahead_by: None,
            hours_since_last_merge: None,
        }
    }
}

fn parse_closed_at(closed_at: Option<&str>) -> Option<DateTime<Utc>> {
    closed_at
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Decide the status of a branch.
///
/// Pure: depends only on `inputs`, the threshold and `now`.
pub fn classify_branch(
    inputs: &BranchInputs<'_>,
    preview_threshold: Duration,
    now: DateTime<Utc>,
) -> BranchVerdict {
    let (Some(head), Some(commit)) = (inputs.head, inputs.vmr_commit) else {
        return BranchVerdict::unknown();
    };

    if commits_match(&head.sha, commit) {
        return BranchVerdict {
            status: BranchStatus::UpToDate,
            ahead_by: Some(AheadBy::Known(0)),
            hours_since_last_merge: None,
        };
    }

    let ahead_by = inputs
        .comparison
        .map(|c| AheadBy::Known(c.ahead_by))
        .unwrap_or(AheadBy::Unresolved);

    let since_merge = parse_closed_at(inputs.closed_at).map(|closed| now - closed);
    let is_preview = inputs
        .vmr_branch
        .map(|b| b.contains(PREVIEW_MARKER))
        .unwrap_or(false);

    if is_preview && since_merge.map(|d| d > preview_threshold).unwrap_or(false) {
        return BranchVerdict {
            status: BranchStatus::ReleasedPreview,
            ahead_by: Some(ahead_by),
            hours_since_last_merge: None,
        };
    }

    BranchVerdict {
        status: BranchStatus::Missing,
        ahead_by: Some(ahead_by),
        hours_since_last_merge: since_merge
            .map(|d| round_one_decimal(d.num_milliseconds() as f64 / 3_600_000.0)),
    }
}
