//! engine::discovery
//!
//! Finding codeflow PRs.
//!
//! # Searches
//!
//! - **Open backflow**: every open PR by the bot, kept when the title
//!   carries the backflow marker and a `[branch]` prefix.
//! - **Merged backflow**: bot PRs with the marker phrase in the merged
//!   state, re-run under the retry policy while the search index catches up.
//!   Only the most recently closed PR per branch is kept.
//! - **Forward flow**: open bot PRs in the VMR whose title ends with
//!   `from {vmr_owner}/{repo_name}`.
//!
//! A failed search is treated as an empty one. The optional branch filter
//! applies to every search.

use std::collections::BTreeMap;

use super::retry::RetryPolicy;
use crate::core::config::FlowHealthConfig;
use crate::core::types::{branch_from_title, CodeflowPr, Direction, PrState, RepoSlug};
use crate::forge::{CodeflowForge, PrListing, PrQuery, SearchState};

/// Branch reported for forward-flow PRs without a `[branch]` prefix.
pub const UNKNOWN_BRANCH: &str = "unknown";

/// Backflow PRs of one repository, keyed by branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// At most one open PR per branch.
    pub open: BTreeMap<String, CodeflowPr>,
    /// Most recently merged PR per branch.
    pub last_merged: BTreeMap<String, CodeflowPr>,
    /// Merged PRs seen before grouping by branch.
    pub merged_count: usize,
}

impl Discovery {
    /// Last merged PRs of branches that have no open PR.
    pub fn without_open_pr(&self) -> impl Iterator<Item = (&String, &CodeflowPr)> {
        self.last_merged
            .iter()
            .filter(|(branch, _)| !self.open.contains_key(*branch))
    }
}

fn branch_allowed(branch: &str, filter: Option<&str>) -> bool {
    filter.map(|f| f == branch).unwrap_or(true)
}

/// Keep open backflow PRs, one per branch.
///
/// When two open PRs target the same branch the higher number wins.
pub fn select_open(
    rows: Vec<PrListing>,
    marker: &str,
    filter: Option<&str>,
) -> BTreeMap<String, CodeflowPr> {
    let mut open: BTreeMap<String, CodeflowPr> = BTreeMap::new();

    for row in rows {
        if row.number == 0 || !row.title.contains(marker) {
            continue;
        }
        let Some(branch) = branch_from_title(&row.title) else {
            continue;
        };
        if !branch_allowed(&branch, filter) {
            continue;
        }
        if open.get(&branch).map(|pr| pr.number > row.number).unwrap_or(false) {
            continue;
        }
        open.insert(
            branch.clone(),
            CodeflowPr {
                number: row.number,
                title: row.title,
                branch,
                direction: Direction::Backflow,
                state: PrState::Open,
                closed_at: None,
            },
        );
    }

    open
}

/// Turn merged search rows into PRs, dropping rows without a branch prefix.
pub fn select_merged(rows: Vec<PrListing>, filter: Option<&str>) -> Vec<CodeflowPr> {
    rows.into_iter()
        .filter(|row| row.number > 0)
        .filter_map(|row| {
            let branch = branch_from_title(&row.title)?;
            branch_allowed(&branch, filter).then(|| CodeflowPr {
                number: row.number,
                title: row.title,
                branch,
                direction: Direction::Backflow,
                state: PrState::Merged,
                closed_at: row.closed_at,
            })
        })
        .collect()
}

/// Most recently closed PR per branch.
///
/// Close times are compared as strings, which orders ISO-8601 UTC stamps
/// correctly. A missing close time sorts before any timestamp; on a tie the
/// first PR seen is kept.
pub fn latest_per_branch(merged: Vec<CodeflowPr>) -> BTreeMap<String, CodeflowPr> {
    let mut latest: BTreeMap<String, CodeflowPr> = BTreeMap::new();

    for pr in merged {
        let newer = match latest.get(&pr.branch) {
            Some(existing) => pr.closed_at.as_deref() > existing.closed_at.as_deref(),
            None => true,
        };
        if newer {
            latest.insert(pr.branch.clone(), pr);
        }
    }

    latest
}

/// Keep forward-flow PRs of `repo` in listing order.
pub fn select_forward(
    rows: Vec<PrListing>,
    suffix: &str,
    filter: Option<&str>,
) -> Vec<CodeflowPr> {
    rows.into_iter()
        .filter(|row| row.number > 0 && row.title.ends_with(suffix))
        .filter_map(|row| {
            let branch =
                branch_from_title(&row.title).unwrap_or_else(|| UNKNOWN_BRANCH.to_string());
            branch_allowed(&branch, filter).then(|| CodeflowPr {
                number: row.number,
                title: row.title,
                branch,
                direction: Direction::ForwardFlow,
                state: PrState::Open,
                closed_at: None,
            })
        })
        .collect()
}

/// Title suffix of forward-flow PRs coming from `repo`.
pub fn forward_suffix(repo: &RepoSlug, vmr: &RepoSlug) -> String {
    format!("from {}/{}", vmr.owner(), repo.name())
}

async fn list_or_empty<F>(forge: &F, query: &PrQuery) -> Vec<PrListing>
where
    F: CodeflowForge + ?Sized,
{
    match forge.list_prs(query).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(
                repo = %query.repo,
                state = %query.state,
                error = %e,
                "PR search failed, treating as empty"
            );
            Vec::new()
        }
    }
}

/// Discover open and merged backflow PRs of `repo`.
pub async fn discover_backflow<F>(
    forge: &F,
    repo: &RepoSlug,
    config: &FlowHealthConfig,
    filter: Option<&str>,
) -> Discovery
where
    F: CodeflowForge + ?Sized,
{
    let marker = config.backflow_marker();
    let author = format!("author:{}", config.bot_author);

    let open_query = PrQuery::new(
        repo.clone(),
        author.clone(),
        SearchState::Open,
        config.limits.open,
    );
    let open = select_open(list_or_empty(forge, &open_query).await, &marker, filter);

    let merged_query = PrQuery::new(
        repo.clone(),
        format!("{} {}", author, marker),
        SearchState::Merged,
        config.limits.merged,
    );
    let policy = RetryPolicy::new(config.merged_retries, config.retry_delay());
    let outcome = policy
        .run(
            |attempt| {
                let query = &merged_query;
                async move {
                    if attempt > 0 {
                        tracing::debug!(attempt, "retrying merged PR search");
                    }
                    select_merged(list_or_empty(forge, query).await, filter)
                }
            },
            |merged: &Vec<CodeflowPr>| !merged.is_empty(),
        )
        .await;

    let merged_count = outcome.value.len();
    Discovery {
        open,
        last_merged: latest_per_branch(outcome.value),
        merged_count,
    }
}

/// Discover open forward-flow PRs in the VMR that come from `repo`.
pub async fn discover_forward<F>(
    forge: &F,
    repo: &RepoSlug,
    vmr: &RepoSlug,
    config: &FlowHealthConfig,
    filter: Option<&str>,
) -> Vec<CodeflowPr>
where
    F: CodeflowForge + ?Sized,
{
    let query = PrQuery::new(
        vmr.clone(),
        format!(
            "author:{} {} {}/{}",
            config.bot_author,
            config.title_marker,
            vmr.owner(),
            repo.name()
        ),
        SearchState::Open,
        config.limits.forward,
    );
    let suffix = forward_suffix(repo, vmr);
    select_forward(list_or_empty(forge, &query).await, &suffix, filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::{FailOn, MockForge, MockOperation};
    use crate::forge::ForgeError;

    const MARKER: &str = "Source code updates from dotnet/dotnet";

    fn row(number: u64, title: &str, closed_at: Option<&str>) -> PrListing {
        PrListing {
            number,
            title: title.to_string(),
            closed_at: closed_at.map(str::to_string),
        }
    }

    fn repo() -> RepoSlug {
        RepoSlug::new("dotnet/runtime").unwrap()
    }

    fn quick_config() -> FlowHealthConfig {
        FlowHealthConfig {
            retry_delay_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn open_requires_marker_and_prefix() {
        let open = select_open(
            vec![
                row(1, "[main] Source code updates from dotnet/dotnet", None),
                row(2, "[main] Update dependencies from dotnet/arcade", None),
                row(3, "Source code updates from dotnet/dotnet", None),
                row(0, "[release/8.0] Source code updates from dotnet/dotnet", None),
            ],
            MARKER,
            None,
        );
        assert_eq!(open.len(), 1);
        assert_eq!(open["main"].number, 1);
        assert_eq!(open["main"].state, PrState::Open);
    }

    #[test]
    fn highest_open_pr_number_wins() {
        let open = select_open(
            vec![
                row(20, "[main] Source code updates from dotnet/dotnet", None),
                row(10, "[main] Source code updates from dotnet/dotnet", None),
                row(30, "[main] Source code updates from dotnet/dotnet", None),
            ],
            MARKER,
            None,
        );
        assert_eq!(open["main"].number, 30);
    }

    #[test]
    fn branch_filter_applies() {
        let rows = vec![
            row(1, "[main] Source code updates from dotnet/dotnet", None),
            row(2, "[release/9.0] Source code updates from dotnet/dotnet", None),
        ];
        let open = select_open(rows.clone(), MARKER, Some("release/9.0"));
        assert_eq!(open.keys().collect::<Vec<_>>(), vec!["release/9.0"]);

        let merged = select_merged(rows, Some("main"));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].branch, "main");
    }

    #[test]
    fn latest_merged_per_branch() {
        let merged = select_merged(
            vec![
                row(1, "[main] x", Some("2026-10-01T00:00:00Z")),
                row(2, "[main] x", Some("2026-10-03T00:00:00Z")),
                row(3, "[main] x", Some("2026-10-02T00:00:00Z")),
                row(4, "[release/9.0] x", None),
                row(5, "[release/9.0] x", Some("2026-09-01T00:00:00Z")),
                row(6, "no prefix", Some("2026-10-05T00:00:00Z")),
            ],
            None,
        );
        assert_eq!(merged.len(), 5);

        let latest = latest_per_branch(merged);
        assert_eq!(latest["main"].number, 2);
        assert_eq!(latest["release/9.0"].number, 5);
    }

    #[test]
    fn forward_suffix_and_unknown_branch() {
        let vmr = RepoSlug::new("dotnet/dotnet").unwrap();
        let suffix = forward_suffix(&repo(), &vmr);
        assert_eq!(suffix, "from dotnet/runtime");

        let prs = select_forward(
            vec![
                row(7, "[main] Source code updates from dotnet/runtime", None),
                row(8, "Source code updates from dotnet/runtime", None),
                row(9, "[main] Source code updates from dotnet/runtime-assets", None),
            ],
            &suffix,
            None,
        );
        assert_eq!(prs.len(), 2);
        assert_eq!(prs[0].branch, "main");
        assert_eq!(prs[1].branch, UNKNOWN_BRANCH);
        assert_eq!(prs[1].direction, Direction::ForwardFlow);
    }

    #[test]
    fn without_open_pr_skips_open_branches() {
        let discovery = Discovery {
            open: select_open(
                vec![row(1, "[main] Source code updates from dotnet/dotnet", None)],
                MARKER,
                None,
            ),
            last_merged: latest_per_branch(select_merged(
                vec![row(2, "[main] x", None), row(3, "[release/9.0] x", None)],
                None,
            )),
            merged_count: 2,
        };
        let branches: Vec<_> = discovery.without_open_pr().map(|(b, _)| b.as_str()).collect();
        assert_eq!(branches, vec!["release/9.0"]);
    }

    #[tokio::test]
    async fn merged_search_retries_until_non_empty() {
        let repo = repo();
        let forge = MockForge::new()
            .with_listing(&repo, SearchState::Merged, vec![])
            .with_listing(&repo, SearchState::Merged, vec![])
            .with_listing(
                &repo,
                SearchState::Merged,
                vec![row(5, "[main] x", Some("2026-10-01T00:00:00Z"))],
            );

        let discovery = discover_backflow(&forge, &repo, &quick_config(), None).await;
        assert_eq!(discovery.last_merged["main"].number, 5);
        assert_eq!(discovery.merged_count, 1);
        assert_eq!(
            forge.count_operations(|op| matches!(
                op,
                MockOperation::ListPrs {
                    state: SearchState::Merged,
                    ..
                }
            )),
            3
        );
    }

    #[tokio::test]
    async fn merged_search_gives_up_after_max_attempts() {
        let repo = repo();
        let forge = MockForge::new().with_listing(&repo, SearchState::Merged, vec![]);

        let discovery = discover_backflow(&forge, &repo, &quick_config(), None).await;
        assert!(discovery.last_merged.is_empty());
        assert_eq!(
            forge.count_operations(|op| matches!(
                op,
                MockOperation::ListPrs {
                    state: SearchState::Merged,
                    ..
                }
            )),
            3
        );
    }

    #[tokio::test]
    async fn failed_search_is_empty() {
        let repo = repo();
        let forge = MockForge::new().fail_on(FailOn::ListPrs(
            SearchState::Open,
            ForgeError::Timeout { secs: 30 },
        ));

        let discovery = discover_backflow(&forge, &repo, &quick_config(), None).await;
        assert!(discovery.open.is_empty());
        assert!(discovery.last_merged.is_empty());
    }

    #[tokio::test]
    async fn searches_use_configured_queries() {
        let repo = repo();
        let vmr = RepoSlug::new("dotnet/dotnet").unwrap();
        let forge = MockForge::new();
        let config = quick_config();

        discover_backflow(&forge, &repo, &config, None).await;
        discover_forward(&forge, &repo, &vmr, &config, None).await;

        let ops = forge.operations();
        assert_eq!(
            ops[0],
            MockOperation::ListPrs {
                repo: "dotnet/runtime".into(),
                search: "author:app/dotnet-maestro".into(),
                state: SearchState::Open,
                limit: 100,
            }
        );
        assert_eq!(
            ops[1],
            MockOperation::ListPrs {
                repo: "dotnet/runtime".into(),
                search: "author:app/dotnet-maestro Source code updates from dotnet/dotnet".into(),
                state: SearchState::Merged,
                limit: 30,
            }
        );
        assert_eq!(
            ops.last(),
            Some(&MockOperation::ListPrs {
                repo: "dotnet/dotnet".into(),
                search: "author:app/dotnet-maestro Source code updates from dotnet/runtime".into(),
                state: SearchState::Open,
                limit: 10,
            })
        );
    }
}
