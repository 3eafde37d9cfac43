//! Command execution seam and the process-backed runner

use super::error::{Result, VcsError};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Programs the system runner is willing to spawn
const ALLOWED_PROGRAMS: &[&str] = &["git", "gh"];

/// Maximum bytes kept from each of stdout and stderr
pub const OUTPUT_CAP: usize = 200_000;

/// Wall-clock limit for a single command
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Exit status reported when the process was killed or had no exit code
const NO_EXIT_CODE: i32 = -1;

/// Captured result of one command invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub dry_run: bool,
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
    /// Set when either stream hit [`OUTPUT_CAP`] and lost its tail
    #[serde(default)]
    pub truncated: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout up to and including the last `terminator`.
    ///
    /// When the output was cut at the cap the final record is partial, so it
    /// is dropped. Complete output is returned as is.
    pub fn complete_stdout(&self, terminator: char) -> &str {
        if !self.truncated {
            return &self.stdout;
        }
        match self.stdout.rfind(terminator) {
            Some(end) => &self.stdout[..end + terminator.len_utf8()],
            None => "",
        }
    }
}

/// Anything that can run a VCS command and hand back its output.
///
/// `Err` means the command could not be run at all. A command that ran and
/// exited non-zero is still `Ok`, with the exit code in
/// [`CommandOutput::status`]; each caller decides whether that is fatal.
pub trait CommandRunner: Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs allowlisted programs as child processes inside a git worktree
#[derive(Debug, Clone)]
pub struct SystemRunner {
    workdir: PathBuf,
    dry_run: bool,
    timeout: Duration,
}

impl SystemRunner {
    /// Discover the repository containing `path` and run commands in its worktree
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        // Canonicalize path for better error messages
        let canonical_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let repo = gix::discover(path).map_err(|_| VcsError::NotARepository {
            path: canonical_path.clone(),
        })?;

        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or(VcsError::BareRepository)?;

        debug!(workdir = %workdir.display(), "discovered repository");

        Ok(Self {
            workdir,
            dry_run: false,
            timeout: COMMAND_TIMEOUT,
        })
    }

    /// Echo commands instead of running them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Worktree root commands are run in
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Resolve a ref (branch, tag, `origin/main`, sha...) to a full object id
    pub fn resolve_ref(&self, name: &str) -> Result<String> {
        let repo = gix::open(&self.workdir).map_err(|_| VcsError::NotARepository {
            path: self.workdir.clone(),
        })?;

        let id = repo
            .rev_parse_single(name)
            .map_err(|e| VcsError::UnknownRef {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(id.to_string())
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        if !ALLOWED_PROGRAMS.contains(&program) {
            return Err(VcsError::CommandNotAllowed {
                program: program.to_string(),
            });
        }

        if self.dry_run {
            return Ok(CommandOutput {
                dry_run: true,
                status: 0,
                stdout: format!("DRY-RUN: {} {:?}", program, args),
                stderr: String::new(),
                truncated: false,
            });
        }

        debug!(program, ?args, "running command");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VcsError::Spawn {
                program: program.to_string(),
                reason: e.to_string(),
            })?;

        // Drain both pipes concurrently
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_reader = std::thread::spawn(move || read_capped(stdout_pipe, OUTPUT_CAP));
        let stderr_reader = std::thread::spawn(move || read_capped(stderr_pipe, OUTPUT_CAP));

        let start = Instant::now();
        let mut timed_out = false;
        let status = loop {
            if start.elapsed() >= self.timeout {
                warn!(program, ?args, "command timed out, killing");
                let _ = child.kill();
                let _ = child.wait();
                timed_out = true;
                break NO_EXIT_CODE;
            }
            match child.try_wait() {
                Ok(Some(exit)) => break exit.code().unwrap_or(NO_EXIT_CODE),
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    warn!(program, error = %e, "failed to poll child process, killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    break NO_EXIT_CODE;
                }
            }
        };

        let (stdout, stdout_cut) = stdout_reader.join().unwrap_or_default();
        let (stderr, stderr_cut) = stderr_reader.join().unwrap_or_default();

        if timed_out && stderr.is_empty() {
            return Err(VcsError::Timeout {
                program: program.to_string(),
            });
        }

        let truncated = stdout_cut || stderr_cut;
        if truncated {
            warn!(program, ?args, cap = OUTPUT_CAP, "command output truncated");
        }

        Ok(CommandOutput {
            dry_run: false,
            status,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            truncated,
        })
    }
}

/// Read a pipe to the end, keeping at most `cap` bytes.
///
/// The flag is true when anything past the cap was discarded.
fn read_capped<R: Read>(pipe: Option<R>, cap: usize) -> (Vec<u8>, bool) {
    let Some(mut pipe) = pipe else {
        return (Vec::new(), false);
    };

    let mut kept = Vec::with_capacity(8192);
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = cap.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
                truncated |= n > room;
            }
        }
    }
    (kept, truncated)
}
