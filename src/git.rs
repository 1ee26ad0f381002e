use crate::constants::{BRANCH_REF_PREFIX, DETACHED_HEAD_LABEL};
use crate::process::{CmdOutput, best_error_line, run_capture};
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

/// Runs git subcommands. Orchestration only talks to git through this seam.
pub(crate) trait GitRunner {
    fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<CmdOutput>;
}

/// The `git` binary. Commands without an explicit directory run in `dir`, or
/// in the process working directory when that is unset.
#[derive(Debug, Clone, Default)]
pub(crate) struct SystemGit {
    dir: Option<PathBuf>,
}

impl SystemGit {
    pub(crate) fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }
}

impl GitRunner for SystemGit {
    fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<CmdOutput> {
        tracing::debug!(?args, "running git");
        run_capture("git", args, cwd.or(self.dir.as_deref()))
    }
}

pub(crate) fn repo_root(git: &impl GitRunner) -> Result<PathBuf> {
    let output = git
        .run(&["rev-parse", "--show-toplevel"], None)
        .context("failed to run git to detect repo root")?;
    if !output.success {
        bail!(
            "not inside a git repository: {}",
            best_error_line(&output.stderr)
        );
    }
    let root = output.stdout.trim();
    if root.is_empty() {
        bail!("git did not return a repository root");
    }
    Ok(PathBuf::from(root))
}

pub(crate) fn remote_url(git: &impl GitRunner) -> Result<String> {
    let output = git
        .run(&["config", "--get", "remote.origin.url"], None)
        .context("failed to run git to read remote.origin.url")?;
    if !output.success {
        bail!("repository has no `origin` remote configured");
    }
    Ok(output.stdout.trim().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListedWorktree {
    pub(crate) path: PathBuf,
    /// `None` for a detached HEAD.
    pub(crate) branch: Option<String>,
}

impl ListedWorktree {
    /// Branch name for display, or the detached-HEAD label.
    pub(crate) fn branch_label(&self) -> &str {
        self.branch.as_deref().unwrap_or(DETACHED_HEAD_LABEL)
    }
}

pub(crate) fn list_worktrees(git: &impl GitRunner) -> Result<Vec<ListedWorktree>> {
    let output = git
        .run(&["worktree", "list", "--porcelain"], None)
        .context("failed to list git worktrees")?;
    if !output.success {
        bail!(
            "failed to list git worktrees: {}",
            best_error_line(&output.stderr)
        );
    }
    Ok(parse_worktree_porcelain(&output.stdout))
}

/// Parses `git worktree list --porcelain`.
///
/// Records are blank-line separated. A record with a `branch refs/heads/<x>`
/// line yields branch `x`; a record with a `HEAD` line but no branch is
/// reported as detached. Records with neither (bare repositories) are skipped.
pub(crate) fn parse_worktree_porcelain(raw: &str) -> Vec<ListedWorktree> {
    #[derive(Default)]
    struct Pending {
        path: Option<PathBuf>,
        branch: Option<String>,
        has_head: bool,
    }

    fn flush(pending: &mut Pending, entries: &mut Vec<ListedWorktree>) {
        let current = std::mem::take(pending);
        let Some(path) = current.path else {
            return;
        };
        if current.branch.is_some() || current.has_head {
            entries.push(ListedWorktree {
                path,
                branch: current.branch,
            });
        }
    }

    let mut entries = Vec::new();
    let mut pending = Pending::default();

    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            flush(&mut pending, &mut entries);
            continue;
        }

        if let Some(value) = line.strip_prefix("worktree ") {
            flush(&mut pending, &mut entries);
            pending.path = Some(PathBuf::from(value));
            continue;
        }

        if let Some(value) = line.strip_prefix("branch ") {
            let short = value.strip_prefix(BRANCH_REF_PREFIX).unwrap_or(value);
            pending.branch = Some(short.to_string());
            continue;
        }

        if line == "HEAD" || line.starts_with("HEAD ") {
            pending.has_head = true;
        }
    }

    flush(&mut pending, &mut entries);
    entries
}
