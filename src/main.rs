use clap::{ArgAction, Parser, Subcommand};
use mergetrain::SystemRunner;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod changes;
mod report;

#[derive(Parser)]
#[command(name = "mergetrain")]
#[command(version)]
#[command(about = "Preview file and hunk overlap between branches to plan a low-conflict merge order")]
struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: PathBuf,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show staged and unstaged changes in the working tree (supports --json)
    Status {
        #[arg(long, help = "Output results as JSON")]
        json: bool,
    },
    /// Compare refs against a base and suggest a merge order
    Analyze(report::AnalyzeArgs),
    /// Show the diff of a single working-tree file
    Diff {
        /// File path, relative to the repository root
        path: String,
        #[arg(long, help = "Diff the index instead of the working tree")]
        staged: bool,
    },
    /// List open pull requests (requires the gh CLI)
    Prs {
        #[arg(long, help = "Output results as JSON")]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(command) = cli.command else {
        println!("Mergetrain v{}", env!("CARGO_PKG_VERSION"));
        println!("Try 'mergetrain --help' for more information.");
        return;
    };

    let runner = match SystemRunner::discover(&cli.repo) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match command {
        Commands::Status { json } => {
            if let Err(e) = changes::run_status(&runner, json) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Analyze(args) => match report::run_analyze(runner, &args) {
            // Overlapping hunks found
            Ok(true) => std::process::exit(2),
            Ok(false) => {}
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Diff { path, staged } => {
            if let Err(e) = changes::run_diff(&runner, &path, staged) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Prs { json } => {
            if let Err(e) = changes::run_prs(&runner, json) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
