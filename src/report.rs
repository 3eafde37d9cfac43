use clap::Args;
use colored::{ColoredString, Colorize};
use mergetrain::vcs::{self, CommandRunner, changed_files_args};
use mergetrain::{
    Analysis, AnalyzeOptions, DEFAULT_BASE, DEFAULT_FILE_WORKERS, DEFAULT_HUNK_WORKERS,
    SystemRunner, VcsResult, analyze, matrix_to_csv, merge_ref_sources, order_to_line,
    parse_ref_list,
};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Refs to compare (branches, tags, PR heads)
    pub refs: Vec<String>,

    /// Common base every ref is diffed against
    #[arg(long, env = "MERGETRAIN_BASE", default_value = DEFAULT_BASE)]
    pub base: String,

    /// Extra whitespace-separated refs, appended after the positional ones
    #[arg(long = "ref-list", env = "MERGETRAIN_REFS")]
    pub ref_list: Option<String>,

    /// Also add the head refs of open pull requests (requires gh)
    #[arg(long)]
    pub prs: bool,

    /// Estimate line-level overlap as well (one diff per changed file, slower)
    #[arg(long)]
    pub hunks: bool,

    #[arg(long, conflicts_with = "csv", help = "Output results as JSON")]
    pub json: bool,

    /// Print the overlap matrix as CSV (the hunk matrix when --hunks is set)
    #[arg(long)]
    pub csv: bool,

    /// Concurrent file listings
    #[arg(long, default_value_t = DEFAULT_FILE_WORKERS)]
    pub file_workers: usize,

    /// Concurrent hunk listings
    #[arg(long, default_value_t = DEFAULT_HUNK_WORKERS)]
    pub hunk_workers: usize,

    /// Print the git commands instead of running them
    #[arg(long)]
    pub dry_run: bool,
}

/// JSON output structure for the analyze command
#[derive(Debug, Serialize)]
struct AnalyzeOutput<'a> {
    generated_at: String,
    #[serde(flatten)]
    analysis: &'a Analysis,
}

/// Run the analyze command.
///
/// Returns true if any pair of refs rewrites the same lines (caller should
/// exit with code 2).
pub fn run_analyze(runner: SystemRunner, args: &AnalyzeArgs) -> VcsResult<bool> {
    let runner = runner.with_dry_run(args.dry_run);
    let refs = gather_refs(&runner, args)?;

    if args.dry_run {
        if args.prs {
            println!("{}", runner.run("gh", &vcs::pr_list_args())?.stdout);
        }
        preview_commands(&runner, &args.base, &refs)?;
        return Ok(false);
    }

    warn_unresolved(&runner, &args.base, &refs);

    let options = AnalyzeOptions {
        base: args.base.clone(),
        file_workers: args.file_workers,
        hunk_workers: args.hunk_workers,
        include_hunks: args.hunks,
    };
    let analysis = analyze(&runner, &refs, &options)?;
    let has_hot_pairs = analysis
        .hunks
        .as_ref()
        .is_some_and(|h| !h.hot_pairs.is_empty());

    if args.json {
        let output = AnalyzeOutput {
            generated_at: chrono::Local::now().to_rfc3339(),
            analysis: &analysis,
        };
        match serde_json::to_string_pretty(&output) {
            Ok(json_str) => println!("{}", json_str),
            Err(e) => eprintln!("Error serializing to JSON: {}", e),
        }
    } else if args.csv {
        let matrix = match &analysis.hunks {
            Some(hunks) => &hunks.matrix,
            None => &analysis.files.matrix,
        };
        println!("{}", matrix_to_csv(&analysis.refs, matrix));
    } else {
        AnalysisDisplay::new(&analysis).show();
    }

    Ok(has_hot_pairs)
}

/// Positional refs, then `--ref-list`, then open pull request heads
fn gather_refs(runner: &dyn CommandRunner, args: &AnalyzeArgs) -> VcsResult<Vec<String>> {
    let mut sources = vec![args.refs.clone()];
    if let Some(raw) = &args.ref_list {
        sources.push(parse_ref_list(raw));
    }
    if args.prs {
        let heads = vcs::list_open_prs(runner)?
            .into_iter()
            .map(|pr| pr.head_ref_name)
            .collect();
        sources.push(heads);
    }
    Ok(merge_ref_sources(sources))
}

/// Print the file-listing command each ref would run
fn preview_commands(runner: &dyn CommandRunner, base: &str, refs: &[String]) -> VcsResult<()> {
    for reference in refs {
        let output = runner.run("git", &changed_files_args(base, reference))?;
        println!("{}", output.stdout);
    }
    Ok(())
}

/// Refs that don't resolve still get analyzed (as empty), but say so up front
fn warn_unresolved(runner: &SystemRunner, base: &str, refs: &[String]) {
    for name in std::iter::once(base).chain(refs.iter().map(String::as_str)) {
        if let Err(e) = runner.resolve_ref(name) {
            warn!(reference = name, error = %e, "ref does not resolve locally");
        }
    }
}

/// Handles the display of an analysis as colored tables
pub struct AnalysisDisplay<'a> {
    analysis: &'a Analysis,
}

impl<'a> AnalysisDisplay<'a> {
    pub fn new(analysis: &'a Analysis) -> Self {
        Self { analysis }
    }

    /// Run the full display (refs, matrices, order, hot pairs, summary)
    pub fn show(&self) {
        self.show_refs();
        if self.analysis.refs.len() <= 1 {
            println!(
                "\nNo potential conflicts (only {} ref)",
                self.analysis.refs.len()
            );
            return;
        }

        self.display_matrix(
            " File Overlap ",
            &self.analysis.files.matrix,
            Some(&self.analysis.files.totals),
        );
        if let Some(hunks) = &self.analysis.hunks {
            self.display_matrix(" Hunk Overlap (lines) ", &hunks.matrix, None);
        }
        self.show_order();
        self.show_hot_pairs();
        self.display_summary();
    }

    /// List refs with their changed file counts
    fn show_refs(&self) {
        println!(
            "{} {}",
            "Refs against".bright_cyan().bold(),
            self.analysis.base.bright_white().bold()
        );
        for (reference, total) in self
            .analysis
            .refs
            .iter()
            .zip(self.analysis.files.totals.iter())
        {
            let count = if *total == 0 {
                "no changed files".bright_black()
            } else {
                format!("{} file{}", total, if *total == 1 { "" } else { "s" }).white()
            };
            println!("  {} ({})", reference.bright_magenta(), count);
        }
    }

    /// Display a ref-by-ref matrix as a table, with an optional totals column
    fn display_matrix(&self, title: &str, matrix: &[Vec<u64>], totals: Option<&Vec<u64>>) {
        let refs = &self.analysis.refs;
        let ref_width = refs.iter().map(|r| r.len()).max().unwrap_or(10).max(20);

        // Column width based on abbreviated ref names, plus 2 chars padding
        let col_width = refs
            .iter()
            .map(|r| {
                if r.starts_with("feature/") {
                    2 + r.len() - 8 + 2
                } else {
                    r.len() + 2
                }
            })
            .max()
            .unwrap_or(12)
            .clamp(12, 25);
        let extra_cols = usize::from(totals.is_some());
        let total_width = ref_width + 2 + (col_width + 1) * (refs.len() + extra_cols);

        println!(
            "\n{}",
            format!("╔{:═^width$}╗", title, width = total_width)
                .bright_cyan()
                .bold()
        );

        // Column headers
        print!("{}", "║".bright_cyan());
        print!("{:width$} {}", "", "│".bright_cyan(), width = ref_width);
        for reference in refs {
            let truncated = Self::truncate_ref(reference, col_width);
            print!(
                " {:^width$}",
                truncated.bright_magenta().bold(),
                width = col_width
            );
        }
        if totals.is_some() {
            print!(" {:^width$}", "#files".white().bold(), width = col_width);
        }
        println!("{}", "║".bright_cyan());

        // Separator
        print!(
            "{}",
            format!("╟{:─<width$}─┼", "", width = ref_width).bright_cyan()
        );
        for _ in 0..(refs.len() + extra_cols) {
            print!(
                "{}",
                format!("─{:─<width$}", "", width = col_width).bright_cyan()
            );
        }
        println!("{}", "╢".bright_cyan());

        // Rows
        for (i, reference) in refs.iter().enumerate() {
            print!("{}", "║".bright_cyan());
            let truncated = Self::truncate_ref(reference, ref_width);
            print!(
                "{:width$} {}",
                truncated.bright_magenta().bold(),
                "│".bright_cyan(),
                width = ref_width
            );
            for (j, cell) in matrix[i].iter().enumerate() {
                if i == j {
                    print!(" {:^width$}", "-".bright_black(), width = col_width);
                } else {
                    print!(" {:^width$}", Self::cell(*cell), width = col_width);
                }
            }
            if let Some(totals) = totals {
                print!(
                    " {:^width$}",
                    totals[i].to_string().white(),
                    width = col_width
                );
            }
            println!("{}", "║".bright_cyan());
        }

        // Bottom border
        println!(
            "{}",
            format!("╚{:═<width$}╝", "", width = total_width)
                .bright_cyan()
                .bold()
        );
    }

    fn cell(count: u64) -> ColoredString {
        match count {
            0 => "OK".bright_green().bold(),
            1 => count.to_string().bright_yellow().bold(),
            _ => count.to_string().bright_red().bold(),
        }
    }

    fn show_order(&self) {
        println!(
            "\n{} {}",
            "Suggested order:".bright_cyan().bold(),
            order_to_line(&self.analysis.files.order).bright_white()
        );
    }

    /// Display pairs whose changed lines intersect, worst first
    fn show_hot_pairs(&self) {
        let Some(hunks) = &self.analysis.hunks else {
            return;
        };

        println!("\n{}", "Hot pairs:".bright_cyan().bold());
        if hunks.hot_pairs.is_empty() {
            println!(
                "  {} {}",
                "✓".bright_green().bold(),
                "No overlapping lines".green()
            );
            return;
        }
        for pair in &hunks.hot_pairs {
            let text = format!(
                "⚠ {} line{}",
                pair.score,
                if pair.score == 1 { "" } else { "s" }
            );
            println!(
                "  {} {} {}: {}",
                pair.a.bright_magenta(),
                "vs".white(),
                pair.b.bright_magenta(),
                text.bright_red().bold()
            );
        }
    }

    /// Display summary statistics
    fn display_summary(&self) {
        let n = self.analysis.refs.len();
        let pairs = n * (n - 1) / 2;
        let matrix = &self.analysis.files.matrix;
        let overlapping = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .filter(|&(i, j)| matrix[i][j] > 0)
            .count();
        let empty = self
            .analysis
            .files
            .totals
            .iter()
            .filter(|&&t| t == 0)
            .count();

        print!("\n{}: ", "Summary".bright_cyan().bold());
        print!(
            "Compared {} pair{}, ",
            pairs.to_string().bright_blue().bold(),
            if pairs == 1 { "" } else { "s" }
        );
        if overlapping == 0 {
            println!("{} share files ✅", "none".bright_green().bold());
        } else {
            println!(
                "{} share files",
                overlapping.to_string().bright_red().bold()
            );
        }

        if empty > 0 {
            println!(
                "  {} {} no changed files (or failed to list)",
                empty.to_string().bright_yellow().bold(),
                if empty == 1 { "ref has" } else { "refs have" }
            );
        }
    }

    /// Truncate ref name to fit in column
    fn truncate_ref(reference: &str, max_len: usize) -> String {
        if reference.len() <= max_len {
            return reference.to_string();
        }

        if max_len <= 3 {
            return "...".to_string();
        }

        // Try smart truncation for feature branches
        if let Some(suffix) = reference.strip_prefix("feature/")
            && max_len > 4
        {
            let abbreviated = format!("f/{}", suffix);
            if abbreviated.len() <= max_len {
                return abbreviated;
            }
        }

        // For other refs, show the last path segment
        if max_len > 6
            && let Some(pos) = reference.rfind('/')
        {
            let suffix = &reference[pos + 1..];
            if suffix.len() < max_len - 4 {
                return format!(".../{}", suffix);
            }
        }

        // Default truncation, on a char boundary
        let mut cut = max_len - 3;
        while !reference.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &reference[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mergetrain::CommandOutput;
    use std::sync::Mutex;

    /// Answers every command the way a dry-run runner does, recording programs
    #[derive(Default)]
    struct Echo {
        programs: Mutex<Vec<String>>,
    }

    impl CommandRunner for Echo {
        fn run(&self, program: &str, args: &[String]) -> VcsResult<CommandOutput> {
            self.programs.lock().unwrap().push(program.to_string());
            Ok(CommandOutput {
                dry_run: true,
                status: 0,
                stdout: format!("DRY-RUN: {} {:?}", program, args),
                stderr: String::new(),
                truncated: false,
            })
        }
    }

    fn analyze_args(refs: &[&str], ref_list: Option<&str>, prs: bool) -> AnalyzeArgs {
        AnalyzeArgs {
            refs: refs.iter().map(|s| s.to_string()).collect(),
            base: DEFAULT_BASE.to_string(),
            ref_list: ref_list.map(str::to_string),
            prs,
            hunks: false,
            json: false,
            csv: false,
            file_workers: DEFAULT_FILE_WORKERS,
            hunk_workers: DEFAULT_HUNK_WORKERS,
            dry_run: true,
        }
    }

    #[test]
    fn test_gather_refs_with_prs_under_dry_run() {
        let runner = Echo::default();
        let refs = gather_refs(&runner, &analyze_args(&["b", "a"], Some("a c"), true)).unwrap();

        assert_eq!(refs, vec!["b", "a", "c"]);
        assert_eq!(*runner.programs.lock().unwrap(), vec!["gh"]);
    }

    #[test]
    fn test_truncate_ref() {
        assert_eq!(AnalysisDisplay::truncate_ref("main", 12), "main");
        assert_eq!(
            AnalysisDisplay::truncate_ref("feature/login-form", 14),
            "f/login-form"
        );
        assert_eq!(
            AnalysisDisplay::truncate_ref("team/alice/really-long-branch-name", 14),
            "team/alice/..."
        );
        assert_eq!(AnalysisDisplay::truncate_ref("origin/x/short", 12), ".../short");
        assert_eq!(AnalysisDisplay::truncate_ref("abcdef", 2), "...");
    }
}
