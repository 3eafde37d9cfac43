//! Open pull requests via the `gh` CLI

use super::error::{Result, VcsError};
use super::runner::CommandRunner;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Maximum number of pull requests requested from `gh`
const PR_LIMIT: &str = "100";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

/// An open pull request as reported by `gh pr list --json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub head_ref_name: String,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_repository_owner: Option<RepositoryOwner>,
}

/// Arguments for listing open pull requests with `gh`
pub fn pr_list_args() -> Vec<String> {
    [
        "pr",
        "list",
        "--state",
        "open",
        "--json",
        "number,title,headRefName,headRepositoryOwner",
        "--limit",
        PR_LIMIT,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// List open pull requests for the current repository.
///
/// A dry-run runner lists nothing.
pub fn list_open_prs(runner: &dyn CommandRunner) -> Result<Vec<PullRequest>> {
    let output = runner.run("gh", &pr_list_args())?;
    if output.dry_run {
        info!(command = %output.stdout, "skipping pull request lookup");
        return Ok(Vec::new());
    }
    if !output.success() {
        return Err(VcsError::command_failed(
            "gh pr list",
            &output.stderr,
            "gh pr list failed".to_string(),
        ));
    }

    parse_pr_list(&output.stdout)
}

/// Decode `gh pr list --json` output; anything but an array is treated as empty
pub fn parse_pr_list(json: &str) -> Result<Vec<PullRequest>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if !value.is_array() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::runner::CommandOutput;

    struct Gh(CommandOutput);

    impl CommandRunner for Gh {
        fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
            assert_eq!(program, "gh");
            assert_eq!(args[0], "pr");
            Ok(self.0.clone())
        }
    }

    fn gh(status: i32, stdout: &str, stderr: &str) -> Gh {
        Gh(CommandOutput {
            dry_run: false,
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            truncated: false,
        })
    }

    #[test]
    fn test_parses_pr_list() {
        let json = r#"[
            {"number": 12, "title": "Add parser", "headRefName": "feat/parser",
             "headRepositoryOwner": {"login": "octo"}},
            {"number": 13, "title": "Fix", "headRefName": "fix/x"}
        ]"#;
        let prs = list_open_prs(&gh(0, json, "")).unwrap();
        assert_eq!(prs.len(), 2);
        assert_eq!(prs[0].head_ref_name, "feat/parser");
        assert_eq!(
            prs[0].head_repository_owner,
            Some(RepositoryOwner {
                login: "octo".to_string()
            })
        );
        assert_eq!(prs[1].head_repository_owner, None);
    }

    #[test]
    fn test_dry_run_lists_nothing() {
        let mut runner = gh(0, r#"DRY-RUN: gh ["pr", "list"]"#, "");
        runner.0.dry_run = true;
        assert!(list_open_prs(&runner).unwrap().is_empty());
    }

    #[test]
    fn test_non_array_is_empty() {
        assert!(parse_pr_list(r#"{"message": "nope"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = list_open_prs(&gh(0, "not json", "")).unwrap_err();
        assert!(matches!(err, VcsError::PrParse(_)));
    }

    #[test]
    fn test_gh_failure_surfaces_stderr() {
        let err = list_open_prs(&gh(1, "", "gh: not logged in")).unwrap_err();
        assert_eq!(err.to_string(), "gh pr list: gh: not logged in");
    }
}
