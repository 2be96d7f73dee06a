//! engine::classify
//!
//! Health classification for open codeflow PRs.
//!
//! # Rules
//!
//! Applied identically to backflow and forward-flow PRs:
//!
//! 1. **Conflict**: the forge reports the PR as `CONFLICTING`, or a bot
//!    comment says `Conflict detected`.
//! 2. **Staleness**: a bot comment says the codeflow cannot continue or that
//!    the source repository has received new code changes.
//! 3. **CI**: the status rollup is aggregated into none/green/pending/red.
//!
//! The final status takes the first that holds of conflict, stale, CI red,
//! and falls back to healthy.
//!
//! # Example
//!
//! ```
//! use codeflow_health::core::types::Direction;
//! use codeflow_health::engine::classify::{classify_pr, CiStatus, HealthStatus};
//! use codeflow_health::forge::{CheckContext, Comment, PrDetail};
//!
//! let detail = PrDetail {
//!     comments: vec![Comment::new("dotnet-maestro[bot]", "Conflict detected between ...")],
//!     status_check_rollup: vec![CheckContext {
//!         conclusion: Some("SUCCESS".into()),
//!         ..Default::default()
//!     }],
//!     ..Default::default()
//! };
//!
//! let health = classify_pr(&detail, "dotnet-maestro", Direction::ForwardFlow);
//! assert_eq!(health.status, HealthStatus::Conflict);
//! assert_eq!(health.ci.status, CiStatus::Green);
//! ```

use serde::Serialize;

use super::markers;
use crate::core::types::Direction;
use crate::forge::{CheckContext, PrDetail};

/// Comment phrases that mean the bot has given up on the current flow.
const STALENESS_PHRASES: [&str; 2] = [
    "codeflow cannot continue",
    "the source repository has received code changes",
];

/// Comment phrase the bot posts when it finds a conflict.
const CONFLICT_PHRASE: &str = "Conflict detected";

/// Mergeable value the forge uses for conflicting PRs.
const CONFLICTING: &str = "CONFLICTING";

/// Aggregated CI state of a PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CiStatus {
    /// No checks reported.
    None,
    Green,
    Pending,
    Red,
}

impl std::fmt::Display for CiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CiStatus::None => write!(f, "none"),
            CiStatus::Green => write!(f, "green"),
            CiStatus::Pending => write!(f, "pending"),
            CiStatus::Red => write!(f, "red"),
        }
    }
}

/// CI status plus counts.
///
/// `failed` and `total` are only meaningful (and only reported) when the
/// status is `Red`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CiSummary {
    pub status: CiStatus,
    pub failed: usize,
    pub total: usize,
}

impl CiSummary {
    /// Failed/total counts when CI is red.
    pub fn red_counts(&self) -> Option<(usize, usize)> {
        (self.status == CiStatus::Red).then_some((self.failed, self.total))
    }
}

/// Outcome of a single rollup entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckOutcome {
    Failed,
    Pending,
    Passed,
}

fn is_one_of(value: Option<&str>, options: &[&str]) -> bool {
    value.map(|v| options.contains(&v)).unwrap_or(false)
}

fn check_outcome(ctx: &CheckContext) -> CheckOutcome {
    let conclusion = ctx.conclusion.as_deref();
    let status = ctx.status.as_deref();
    let state = ctx.state.as_deref();

    if is_one_of(conclusion, &["FAILURE", "ERROR"]) || is_one_of(state, &["FAILURE", "ERROR"]) {
        CheckOutcome::Failed
    } else if is_one_of(status, &["IN_PROGRESS", "QUEUED", "PENDING"]) || state == Some("PENDING")
    {
        CheckOutcome::Pending
    } else {
        CheckOutcome::Passed
    }
}

/// Aggregate a CI status rollup.
///
/// Red if any check failed, else pending if any is still running, else
/// green. An empty rollup is `None`.
pub fn summarize_ci(rollup: &[CheckContext]) -> CiSummary {
    let total = rollup.len();
    if total == 0 {
        return CiSummary {
            status: CiStatus::None,
            failed: 0,
            total: 0,
        };
    }

    let mut failed = 0;
    let mut pending = 0;
    for ctx in rollup {
        match check_outcome(ctx) {
            CheckOutcome::Failed => failed += 1,
            CheckOutcome::Pending => pending += 1,
            CheckOutcome::Passed => {}
        }
    }

    let status = if failed > 0 {
        CiStatus::Red
    } else if pending > 0 {
        CiStatus::Pending
    } else {
        CiStatus::Green
    };

    CiSummary {
        status,
        failed,
        total,
    }
}

/// Health of an open codeflow PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    Healthy,
    Conflict,
    Stale,
    CiRed,
}

impl HealthStatus {
    /// Pick the status from the three signals, by precedence.
    pub fn from_signals(has_conflict: bool, has_staleness: bool, ci: CiStatus) -> Self {
        if has_conflict {
            HealthStatus::Conflict
        } else if has_staleness {
            HealthStatus::Stale
        } else if ci == CiStatus::Red {
            HealthStatus::CiRed
        } else {
            HealthStatus::Healthy
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Conflict => write!(f, "conflict"),
            HealthStatus::Stale => write!(f, "stale"),
            HealthStatus::CiRed => write!(f, "ci-red"),
        }
    }
}

/// Health record of one open PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrHealth {
    pub status: HealthStatus,
    pub has_conflict: bool,
    pub has_staleness: bool,
    pub ci: CiSummary,
    /// Backflow only: subscription id from the body.
    pub subscription_id: Option<String>,
    /// Backflow only: source VMR branch from the body.
    pub vmr_branch: Option<String>,
}

/// Classify an open PR from its details.
///
/// Only comments whose author login starts with `bot_login_prefix` count.
/// Backflow PRs also pick up the subscription id and VMR branch from the
/// body, when the body was fetched.
pub fn classify_pr(detail: &PrDetail, bot_login_prefix: &str, direction: Direction) -> PrHealth {
    let mut has_conflict = detail.mergeable.as_deref() == Some(CONFLICTING);
    let mut has_staleness = false;

    for comment in detail
        .comments
        .iter()
        .filter(|c| c.login().starts_with(bot_login_prefix))
    {
        if STALENESS_PHRASES.iter().any(|p| comment.body.contains(p)) {
            has_staleness = true;
        }
        if comment.body.contains(CONFLICT_PHRASE) {
            has_conflict = true;
        }
    }

    let ci = summarize_ci(&detail.status_check_rollup);
    let status = HealthStatus::from_signals(has_conflict, has_staleness, ci.status);

    let (subscription_id, vmr_branch) = match (direction, detail.body.as_deref()) {
        (Direction::Backflow, Some(body)) => {
            (markers::subscription_id(body), markers::vmr_branch(body))
        }
        _ => (None, None),
    };

    PrHealth {
        status,
        has_conflict,
        has_staleness,
        ci,
        subscription_id,
        vmr_branch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::Comment;

    const BOT: &str = "dotnet-maestro";

    fn check(conclusion: Option<&str>, status: Option<&str>, state: Option<&str>) -> CheckContext {
        CheckContext {
            conclusion: conclusion.map(str::to_string),
            status: status.map(str::to_string),
            state: state.map(str::to_string),
        }
    }

    fn success() -> CheckContext {
        check(Some("SUCCESS"), Some("COMPLETED"), None)
    }

    mod ci {
        use super::*;

        #[test]
        fn empty_rollup_is_none() {
            let ci = summarize_ci(&[]);
            assert_eq!(ci.status, CiStatus::None);
            assert_eq!(ci.red_counts(), None);
        }

        #[test]
        fn all_success_is_green() {
            let ci = summarize_ci(&[success(), check(None, None, Some("SUCCESS"))]);
            assert_eq!(ci.status, CiStatus::Green);
        }

        #[test]
        fn failure_and_error_are_red() {
            let ci = summarize_ci(&[
                success(),
                check(Some("FAILURE"), Some("COMPLETED"), None),
                check(None, None, Some("ERROR")),
                check(None, Some("IN_PROGRESS"), None),
            ]);
            assert_eq!(ci.status, CiStatus::Red);
            assert_eq!(ci.red_counts(), Some((2, 4)));
        }

        #[test]
        fn pending_variants() {
            for ctx in [
                check(None, Some("IN_PROGRESS"), None),
                check(None, Some("QUEUED"), None),
                check(None, Some("PENDING"), None),
                check(None, None, Some("PENDING")),
            ] {
                let ci = summarize_ci(&[success(), ctx]);
                assert_eq!(ci.status, CiStatus::Pending);
                assert_eq!(ci.red_counts(), None);
            }
        }

        #[test]
        fn failure_beats_pending() {
            let ci = summarize_ci(&[
                check(None, Some("QUEUED"), None),
                check(Some("ERROR"), None, None),
            ]);
            assert_eq!(ci.status, CiStatus::Red);
        }

        #[test]
        fn neutral_and_skipped_count_as_green() {
            let ci = summarize_ci(&[
                check(Some("NEUTRAL"), Some("COMPLETED"), None),
                check(Some("SKIPPED"), Some("COMPLETED"), None),
                check(Some("CANCELLED"), Some("COMPLETED"), None),
            ]);
            assert_eq!(ci.status, CiStatus::Green);
        }
    }

    mod precedence {
        use super::*;

        #[test]
        fn conflict_beats_everything() {
            assert_eq!(
                HealthStatus::from_signals(true, true, CiStatus::Red),
                HealthStatus::Conflict
            );
        }

        #[test]
        fn stale_beats_ci() {
            assert_eq!(
                HealthStatus::from_signals(false, true, CiStatus::Red),
                HealthStatus::Stale
            );
        }

        #[test]
        fn ci_red_only_when_nothing_else() {
            assert_eq!(
                HealthStatus::from_signals(false, false, CiStatus::Red),
                HealthStatus::CiRed
            );
            for ci in [CiStatus::None, CiStatus::Green, CiStatus::Pending] {
                assert_eq!(
                    HealthStatus::from_signals(false, false, ci),
                    HealthStatus::Healthy
                );
            }
        }
    }

    #[test]
    fn mergeable_conflicting_is_conflict() {
        let detail = PrDetail {
            mergeable: Some("CONFLICTING".into()),
            status_check_rollup: vec![success()],
            ..Default::default()
        };
        let health = classify_pr(&detail, BOT, Direction::Backflow);
        assert!(health.has_conflict);
        assert_eq!(health.status, HealthStatus::Conflict);
    }

    #[test]
    fn conflict_comment_overrides_green_ci() {
        let detail = PrDetail {
            comments: vec![Comment::new(
                "dotnet-maestro[bot]",
                "Conflict detected between src/foo and the VMR",
            )],
            status_check_rollup: vec![success(), success()],
            ..Default::default()
        };
        let health = classify_pr(&detail, BOT, Direction::Backflow);
        assert_eq!(health.status, HealthStatus::Conflict);
        assert_eq!(health.ci.status, CiStatus::Green);
    }

    #[test]
    fn conflict_comment_with_red_ci_is_conflict() {
        let detail = PrDetail {
            comments: vec![Comment::new("dotnet-maestro", "Conflict detected")],
            status_check_rollup: vec![check(Some("FAILURE"), None, None)],
            ..Default::default()
        };
        let health = classify_pr(&detail, BOT, Direction::ForwardFlow);
        assert_eq!(health.status, HealthStatus::Conflict);
        assert_eq!(health.ci.status, CiStatus::Red);
    }

    #[test]
    fn staleness_phrases() {
        for body in [
            "The codeflow cannot continue because ...",
            "Note: the source repository has received code changes since",
        ] {
            let detail = PrDetail {
                comments: vec![Comment::new("dotnet-maestro[bot]", body)],
                ..Default::default()
            };
            let health = classify_pr(&detail, BOT, Direction::Backflow);
            assert!(health.has_staleness, "body: {}", body);
            assert_eq!(health.status, HealthStatus::Stale);
        }
    }

    #[test]
    fn non_bot_comments_are_ignored() {
        let detail = PrDetail {
            comments: vec![
                Comment::new("someone", "Conflict detected"),
                Comment::new("reviewer", "codeflow cannot continue"),
            ],
            ..Default::default()
        };
        let health = classify_pr(&detail, BOT, Direction::Backflow);
        assert!(!health.has_conflict);
        assert!(!health.has_staleness);
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.ci.status, CiStatus::None);
    }

    #[test]
    fn backflow_extracts_body_markers() {
        let detail = PrDetail {
            body: Some(
                "[marker]: <> (Begin:0a1b-2c3d)\n- **Branch**: [release/9.0](https://x)".into(),
            ),
            ..Default::default()
        };
        let health = classify_pr(&detail, BOT, Direction::Backflow);
        assert_eq!(health.subscription_id.as_deref(), Some("0a1b-2c3d"));
        assert_eq!(health.vmr_branch.as_deref(), Some("release/9.0"));

        let forward = classify_pr(&detail, BOT, Direction::ForwardFlow);
        assert_eq!(forward.subscription_id, None);
        assert_eq!(forward.vmr_branch, None);
    }

    #[test]
    fn serialized_names() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::CiRed).unwrap(),
            "\"ci-red\""
        );
        assert_eq!(
            serde_json::to_string(&CiStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(HealthStatus::CiRed.to_string(), "ci-red");
        assert_eq!(CiStatus::None.to_string(), "none");
    }
}
