//! forge::gh_cli
//!
//! Forge implementation that shells out to the GitHub CLI (`gh`).
//!
//! # Design
//!
//! Every query is one `gh` invocation built as an argument vector (never a
//! shell string), run through `tokio::process` and bounded by a per-call
//! timeout. A call that times out is killed and reported as failed; it is not
//! retried here.
//!
//! Three failure shapes are collapsed into `ForgeError` for the caller:
//! - the process exits unsuccessfully
//! - the process prints nothing
//! - the output is not the expected JSON
//!
//! Authentication is whatever `gh` itself is logged in with.
//!
//! # Example
//!
//! ```ignore
//! use codeflow_health::forge::gh_cli::GhCliForge;
//! use codeflow_health::forge::CodeflowForge;
//!
//! let forge = GhCliForge::new("gh", Default::default());
//! let body = forge.pr_body(&"dotnet/runtime".parse()?, 12345).await?;
//! ```

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::process::Command;

use super::traits::{
    CodeflowForge, Comparison, ForgeError, HeadCommit, PrDetail, PrListing, PrQuery,
};
use crate::core::config::{FlowHealthConfig, Timeouts};
use crate::core::types::RepoSlug;

/// Fields requested for PR health, without the body.
const DETAIL_FIELDS: &str = "comments,mergeable,statusCheckRollup";

/// Max stderr characters kept in an `ExitStatus` error.
const STDERR_LIMIT: usize = 500;

/// GitHub forge backed by the `gh` executable.
#[derive(Debug, Clone)]
pub struct GhCliForge {
    /// Executable name or path
    program: String,
    timeouts: Timeouts,
}

impl GhCliForge {
    /// Create a forge that runs `program` with the given timeouts.
    pub fn new(program: impl Into<String>, timeouts: Timeouts) -> Self {
        Self {
            program: program.into(),
            timeouts,
        }
    }

    /// Create a forge from loaded configuration.
    pub fn from_config(config: &FlowHealthConfig) -> Self {
        Self::new(config.gh_path.clone(), config.timeouts.clone())
    }

    /// The executable this forge runs.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for a PR search.
    pub fn list_args(query: &PrQuery) -> Vec<String> {
        vec![
            "pr".into(),
            "list".into(),
            "--repo".into(),
            query.repo.to_string(),
            "--search".into(),
            query.search.clone(),
            "--state".into(),
            query.state.to_string(),
            "--json".into(),
            query.state.fields().into(),
            "--limit".into(),
            query.limit.to_string(),
        ]
    }

    /// Arguments for viewing selected JSON fields of a PR.
    pub fn view_args(repo: &RepoSlug, number: u64, fields: &str) -> Vec<String> {
        vec![
            "pr".into(),
            "view".into(),
            number.to_string(),
            "-R".into(),
            repo.to_string(),
            "--json".into(),
            fields.into(),
        ]
    }

    /// Arguments for resolving a branch head through the REST API.
    pub fn head_args(repo: &RepoSlug, branch: &str) -> Vec<String> {
        vec![
            "api".into(),
            format!("/repos/{}/commits/{}", repo, encode_path_segment(branch)),
        ]
    }

    /// Arguments for a three-dot comparison through the REST API.
    pub fn compare_args(repo: &RepoSlug, base: &str, head: &str) -> Vec<String> {
        vec![
            "api".into(),
            format!(
                "/repos/{}/compare/{}...{}",
                repo,
                encode_path_segment(base),
                encode_path_segment(head)
            ),
        ]
    }

    /// Run `gh` and return its standard output.
    async fn run(&self, args: &[String], timeout: Duration) -> Result<String, ForgeError> {
        tracing::debug!(program = %self.program, ?args, "running forge CLI");

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ForgeError::Spawn(format!(
                    "'{}' not found. Install it: https://cli.github.com/",
                    self.program
                )));
            }
            Ok(Err(e)) => return Err(ForgeError::Spawn(e.to_string())),
            Err(_) => {
                return Err(ForgeError::Timeout {
                    secs: timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ForgeError::ExitStatus {
                code: output.status.code(),
                stderr: stderr.trim().chars().take(STDERR_LIMIT).collect(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(ForgeError::EmptyOutput);
        }
        Ok(stdout)
    }

    /// Run `gh` and parse its standard output as JSON.
    async fn run_json<T: DeserializeOwned>(
        &self,
        args: &[String],
        timeout: Duration,
    ) -> Result<T, ForgeError> {
        let stdout = self.run(args, timeout).await?;
        serde_json::from_str(&stdout).map_err(|e| ForgeError::Parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct BodyOnly {
    #[serde(default)]
    body: Option<String>,
}

/// Subset of the REST commit object.
#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: String,
    #[serde(default)]
    commit: Option<GitHubCommitInner>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitInner {
    #[serde(default)]
    committer: Option<GitHubSignature>,
}

#[derive(Debug, Deserialize)]
struct GitHubSignature {
    #[serde(default)]
    date: Option<String>,
}

impl From<GitHubCommit> for HeadCommit {
    fn from(gh: GitHubCommit) -> Self {
        let date = gh.commit.and_then(|c| c.committer).and_then(|s| s.date);
        HeadCommit { sha: gh.sha, date }
    }
}

#[async_trait]
impl CodeflowForge for GhCliForge {
    fn name(&self) -> &'static str {
        "gh-cli"
    }

    async fn list_prs(&self, query: &PrQuery) -> Result<Vec<PrListing>, ForgeError> {
        self.run_json(&Self::list_args(query), self.timeouts.list())
            .await
    }

    async fn pr_body(&self, repo: &RepoSlug, number: u64) -> Result<String, ForgeError> {
        let parsed: BodyOnly = self
            .run_json(&Self::view_args(repo, number, "body"), self.timeouts.list())
            .await?;
        Ok(parsed.body.unwrap_or_default())
    }

    async fn pr_detail(
        &self,
        repo: &RepoSlug,
        number: u64,
        with_body: bool,
    ) -> Result<PrDetail, ForgeError> {
        let fields = if with_body {
            format!("body,{}", DETAIL_FIELDS)
        } else {
            DETAIL_FIELDS.to_string()
        };
        self.run_json(
            &Self::view_args(repo, number, &fields),
            self.timeouts.detail(),
        )
        .await
    }

    async fn branch_head(&self, repo: &RepoSlug, branch: &str) -> Result<HeadCommit, ForgeError> {
        let commit: GitHubCommit = self
            .run_json(&Self::head_args(repo, branch), self.timeouts.detail())
            .await?;
        if commit.sha.is_empty() {
            return Err(ForgeError::Parse("commit has an empty sha".into()));
        }
        Ok(commit.into())
    }

    async fn compare(
        &self,
        repo: &RepoSlug,
        base: &str,
        head: &str,
    ) -> Result<Comparison, ForgeError> {
        self.run_json(
            &Self::compare_args(repo, base, head),
            self.timeouts.detail(),
        )
        .await
    }
}

/// Percent-encode a value for use as a single URL path segment.
///
/// Everything outside the RFC 3986 unreserved set is escaped, so `/` in a
/// branch name becomes `%2F`.
pub fn encode_path_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::SearchState;

    fn repo(s: &str) -> RepoSlug {
        RepoSlug::new(s).unwrap()
    }

    mod args {
        use super::*;

        #[test]
        fn open_listing() {
            let query = PrQuery::new(
                repo("dotnet/runtime"),
                "author:app/dotnet-maestro",
                SearchState::Open,
                100,
            );
            assert_eq!(
                GhCliForge::list_args(&query),
                vec![
                    "pr",
                    "list",
                    "--repo",
                    "dotnet/runtime",
                    "--search",
                    "author:app/dotnet-maestro",
                    "--state",
                    "open",
                    "--json",
                    "number,title",
                    "--limit",
                    "100"
                ]
            );
        }

        #[test]
        fn merged_listing_requests_closed_at() {
            let query = PrQuery::new(repo("dotnet/runtime"), "x", SearchState::Merged, 30);
            let args = GhCliForge::list_args(&query);
            assert!(args.contains(&"number,title,closedAt".to_string()));
            assert!(args.contains(&"merged".to_string()));
        }

        #[test]
        fn view() {
            assert_eq!(
                GhCliForge::view_args(&repo("dotnet/sdk"), 42, "body"),
                vec!["pr", "view", "42", "-R", "dotnet/sdk", "--json", "body"]
            );
        }

        #[test]
        fn head_encodes_branch() {
            assert_eq!(
                GhCliForge::head_args(&repo("dotnet/dotnet"), "release/9.0"),
                vec!["api", "/repos/dotnet/dotnet/commits/release%2F9.0"]
            );
        }

        #[test]
        fn compare_uses_three_dots() {
            assert_eq!(
                GhCliForge::compare_args(&repo("dotnet/dotnet"), "abc123", "def456"),
                vec!["api", "/repos/dotnet/dotnet/compare/abc123...def456"]
            );
        }
    }

    #[test]
    fn encode_path_segment_escapes_reserved() {
        assert_eq!(encode_path_segment("main"), "main");
        assert_eq!(encode_path_segment("release/10.0.1xx"), "release%2F10.0.1xx");
        assert_eq!(encode_path_segment("a b#c"), "a%20b%23c");
        assert_eq!(encode_path_segment("~_-."), "~_-.");
    }

    #[test]
    fn from_config_uses_gh_path() {
        let config = FlowHealthConfig {
            gh_path: "/opt/gh".into(),
            ..Default::default()
        };
        let forge = GhCliForge::from_config(&config);
        assert_eq!(forge.program(), "/opt/gh");
        assert_eq!(forge.name(), "gh-cli");
    }

    #[test]
    fn commit_maps_to_head() {
        let gh: GitHubCommit = serde_json::from_str(
            r#"{"sha": "abc", "commit": {"committer": {"date": "2026-10-01T00:00:00Z"}}}"#,
        )
        .unwrap();
        let head: HeadCommit = gh.into();
        assert_eq!(head.sha, "abc");
        assert_eq!(head.date.as_deref(), Some("2026-10-01T00:00:00Z"));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Write an executable shell script standing in for `gh`.
        fn fake_gh(dir: &TempDir, script: &str) -> String {
            let path = dir.path().join("gh");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn forge(program: String) -> GhCliForge {
            GhCliForge::new(
                program,
                Timeouts {
                    list_secs: 5,
                    detail_secs: 1,
                },
            )
        }

        #[tokio::test]
        async fn parses_json_output() {
            let dir = TempDir::new().unwrap();
            let gh = fake_gh(&dir, r#"echo '{"body": "hello"}'"#);
            let body = forge(gh).pr_body(&repo("o/r"), 1).await.unwrap();
            assert_eq!(body, "hello");
        }

        #[tokio::test]
        async fn nonzero_exit_is_error() {
            let dir = TempDir::new().unwrap();
            let gh = fake_gh(&dir, "echo 'HTTP 404' >&2\nexit 1");
            let err = forge(gh).pr_body(&repo("o/r"), 1).await.unwrap_err();
            assert_eq!(
                err,
                ForgeError::ExitStatus {
                    code: Some(1),
                    stderr: "HTTP 404".into()
                }
            );
        }

        #[tokio::test]
        async fn empty_output_is_error() {
            let dir = TempDir::new().unwrap();
            let gh = fake_gh(&dir, "exit 0");
            let err = forge(gh).pr_body(&repo("o/r"), 1).await.unwrap_err();
            assert_eq!(err, ForgeError::EmptyOutput);
        }

        #[tokio::test]
        async fn malformed_json_is_error() {
            let dir = TempDir::new().unwrap();
            let gh = fake_gh(&dir, "echo 'not json'");
            let err = forge(gh).pr_body(&repo("o/r"), 1).await.unwrap_err();
            assert!(matches!(err, ForgeError::Parse(_)));
        }

        #[tokio::test]
        async fn timeout_is_error() {
            let dir = TempDir::new().unwrap();
            let gh = fake_gh(&dir, "sleep 10");
            let err = forge(gh)
                .compare(&repo("o/r"), "a", "b")
                .await
                .unwrap_err();
            assert_eq!(err, ForgeError::Timeout { secs: 1 });
        }

        #[tokio::test]
        async fn missing_program_is_spawn_error() {
            let dir = TempDir::new().unwrap();
            let missing = dir.path().join("no-such-gh").to_string_lossy().into_owned();
            let err = forge(missing).pr_body(&repo("o/r"), 1).await.unwrap_err();
            assert!(matches!(err, ForgeError::Spawn(_)));
        }

        #[tokio::test]
        async fn passes_arguments_verbatim() {
            let dir = TempDir::new().unwrap();
            // Echo the search argument back as the title of a single listing.
            let gh = fake_gh(
                &dir,
                r#"printf '[{"number": 1, "title": "%s"}]' "$6""#,
            );
            let query = PrQuery::new(
                repo("o/r"),
                "author:app/bot Source code updates",
                SearchState::Open,
                5,
            );
            let rows = forge(gh).list_prs(&query).await.unwrap();
            assert_eq!(rows[0].title, "author:app/bot Source code updates");
        }
    }
}
