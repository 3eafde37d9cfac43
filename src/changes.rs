use colored::Colorize;
use mergetrain::vcs::{self, ChangeRecord, PullRequest, StatusCode};
use mergetrain::{SystemRunner, VcsResult};
use serde::Serialize;

/// JSON output structure for the status command
#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    workdir: String,
    staged: Vec<&'a ChangeRecord>,
    unstaged: Vec<&'a ChangeRecord>,
}

/// Run the status command - lists index and worktree changes
pub fn run_status(runner: &SystemRunner, json: bool) -> VcsResult<()> {
    let records = vcs::status(runner)?;
    let (staged, unstaged): (Vec<&ChangeRecord>, Vec<&ChangeRecord>) =
        records.iter().partition(|r| r.staged);

    if json {
        let output = StatusOutput {
            workdir: runner.workdir().display().to_string(),
            staged,
            unstaged,
        };
        match serde_json::to_string_pretty(&output) {
            Ok(json_str) => println!("{}", json_str),
            Err(e) => eprintln!("Error serializing to JSON: {}", e),
        }
        return Ok(());
    }

    if records.is_empty() {
        println!("{} {}", "✓".bright_green().bold(), "Working tree clean".green());
        return Ok(());
    }

    show_section("Staged changes:", &staged);
    show_section("Unstaged changes:", &unstaged);
    Ok(())
}

fn show_section(title: &str, records: &[&ChangeRecord]) {
    if records.is_empty() {
        return;
    }
    println!("{}", title.bright_cyan().bold());
    for record in records {
        let code = format!("{:>2}", record.status.to_string());
        let code = match record.status {
            StatusCode::Untracked => code.bright_black(),
            StatusCode::Deleted => code.red().bold(),
            StatusCode::Unmerged => code.bright_red().bold(),
            _ if record.staged => code.green().bold(),
            _ => code.yellow().bold(),
        };
        match &record.old_path {
            Some(old) => println!(
                "  {} {} {} {}",
                code,
                old.white(),
                "→".bright_black(),
                record.path.white()
            ),
            None => println!("  {} {}", code, record.path.white()),
        }
    }
    println!();
}

/// Run the diff command - prints the patch for one file
pub fn run_diff(runner: &SystemRunner, path: &str, staged: bool) -> VcsResult<()> {
    let patch = vcs::file_diff(runner, path, staged)?;
    if patch.is_empty() {
        println!("{}", "No changes".bright_black());
        return Ok(());
    }

    for line in patch.lines() {
        if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else if line.starts_with('+') && !line.starts_with("+++") {
            println!("{}", line.green());
        } else if line.starts_with('-') && !line.starts_with("---") {
            println!("{}", line.red());
        } else {
            println!("{}", line);
        }
    }
    Ok(())
}

/// Run the prs command - lists open pull requests and their head refs
pub fn run_prs(runner: &SystemRunner, json: bool) -> VcsResult<()> {
    let prs = vcs::list_open_prs(runner)?;

    if json {
        match serde_json::to_string_pretty(&prs) {
            Ok(json_str) => println!("{}", json_str),
            Err(e) => eprintln!("Error serializing to JSON: {}", e),
        }
        return Ok(());
    }

    if prs.is_empty() {
        println!("No open pull requests");
        return Ok(());
    }

    println!("{}", "Open pull requests:".bright_cyan().bold());
    for pr in &prs {
        println!("  {}", describe_pr(pr));
    }
    Ok(())
}

fn describe_pr(pr: &PullRequest) -> String {
    let owner = pr
        .head_repository_owner
        .as_ref()
        .map(|o| format!(" ({})", o.login))
        .unwrap_or_default();
    format!(
        "{} {} {}{}",
        format!("#{}", pr.number).bright_blue().bold(),
        pr.head_ref_name.bright_magenta(),
        pr.title.white(),
        owner.bright_black()
    )
}
