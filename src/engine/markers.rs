//! engine::markers
//!
//! Metadata the codeflow bot embeds in PR bodies.
//!
//! A codeflow PR body carries lines like:
//!
//! ```text
//! [marker]: <> (Begin:8e5c3a1f-0c3d-4b9e-9a55-3f1b4c2d0e77)
//! - **Branch**: [internal/release/9.0](https://github.com/dotnet/dotnet/tree/internal/release/9.0)
//! - **Commit**: [abcdef123456](https://github.com/dotnet/dotnet/commit/abcdef123456)
//! ```

use std::sync::OnceLock;

use regex::Regex;

fn branch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\*\*Branch\*\*:\s*\[([^\]]+)\]").expect("branch marker pattern is valid")
    })
}

fn commit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\*\*Commit\*\*:\s*\[([a-fA-F0-9]+)\]").expect("commit marker pattern is valid")
    })
}

fn subscription_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\(Begin:([a-f0-9\-]+)\)").expect("subscription marker pattern is valid")
    })
}

fn first_capture(pattern: &Regex, body: &str) -> Option<String> {
    pattern.captures(body).map(|caps| caps[1].to_string())
}

/// The VMR branch named by `**Branch**: [name]`.
pub fn vmr_branch(body: &str) -> Option<String> {
    first_capture(branch_pattern(), body)
}

/// The VMR commit named by `**Commit**: [sha]`.
pub fn vmr_commit(body: &str) -> Option<String> {
    first_capture(commit_pattern(), body)
}

/// The subscription id from a `(Begin:<id>)` marker.
pub fn subscription_id(body: &str) -> Option<String> {
    first_capture(subscription_pattern(), body)
}
