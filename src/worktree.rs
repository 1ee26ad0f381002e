//! Worktree lifecycle: create, switch, remove, list and cleanup.
//!
//! Registry writes always happen before the matching git command, and a git
//! failure never rolls the registry back. The registry can therefore claim a
//! worktree that does not exist (fixed by `cleanup`) but never loses track of
//! one that does.

use crate::config::Settings;
use crate::git::{GitRunner, ListedWorktree, list_worktrees, remote_url, repo_root};
use crate::process::path_to_str;
use crate::registry::{Registry, RegistryError, WorktreeEntry};
use crate::remote::derive_repo_identifier;
use crate::shell::SessionLauncher;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub(crate) enum WorktreeError {
    #[error("could not parse organization/repository from remote URL `{0}`")]
    InvalidRemote(String),
    #[error("no registered worktree for branch `{branch}` in {repo}")]
    NotRegistered { repo: String, branch: String },
    #[error("worktree for branch `{branch}` not found at {}", .path.display())]
    PathMissing { branch: String, path: PathBuf },
    #[error("`git {command}` failed\n{output}")]
    CommandFailed { command: String, output: String },
    #[error("failed to start session in {}", .path.display())]
    Session {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Git(#[from] anyhow::Error),
}

/// The repository the current invocation runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RepoContext {
    pub(crate) root: PathBuf,
    pub(crate) remote_url: String,
    pub(crate) identifier: String,
}

pub(crate) fn identify_repo(git: &impl GitRunner) -> Result<(String, String), WorktreeError> {
    let url = remote_url(git)?;
    let identifier =
        derive_repo_identifier(&url).ok_or_else(|| WorktreeError::InvalidRemote(url.clone()))?;
    Ok((url, identifier))
}

pub(crate) fn repo_context(git: &impl GitRunner) -> Result<RepoContext, WorktreeError> {
    let root = repo_root(git)?;
    let (remote_url, identifier) = identify_repo(git)?;
    Ok(RepoContext {
        root,
        remote_url,
        identifier,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RemoveOutcome {
    pub(crate) path: PathBuf,
    pub(crate) branch_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ManagedRow {
    pub(crate) entry: WorktreeEntry,
    pub(crate) present: bool,
    pub(crate) active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnmanagedRow {
    pub(crate) path: PathBuf,
    pub(crate) branch: String,
    pub(crate) active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ListReport {
    pub(crate) managed: Vec<ManagedRow>,
    pub(crate) unmanaged: Vec<UnmanagedRow>,
}

impl ListReport {
    pub(crate) fn render(&self) -> String {
        let mut out = String::from("Managed Worktrees:\n");
        for row in &self.managed {
            let status = if row.present { "✓" } else { "✗" };
            let _ = writeln!(
                out,
                "{}{} ({}) [{}] {status}",
                indicator(row.active),
                row.entry.path.display(),
                row.entry.branch_name,
                row.entry.repo
            );
        }

        if !self.unmanaged.is_empty() {
            out.push_str("\nUnmanaged Git Worktrees:\n");
            for row in &self.unmanaged {
                let _ = writeln!(
                    out,
                    "{}{} ({}) [unmanaged]",
                    indicator(row.active),
                    row.path.display(),
                    row.branch
                );
            }
        }
        out
    }
}

fn indicator(active: bool) -> &'static str {
    if active { "* " } else { "  " }
}

pub(crate) struct WorktreeManager<'a, G, S> {
    registry: &'a mut Registry,
    git: &'a G,
    launcher: &'a S,
    settings: &'a Settings,
}

impl<'a, G: GitRunner, S: SessionLauncher> WorktreeManager<'a, G, S> {
    pub(crate) fn new(
        registry: &'a mut Registry,
        git: &'a G,
        launcher: &'a S,
        settings: &'a Settings,
    ) -> Self {
        Self {
            registry,
            git,
            launcher,
            settings,
        }
    }

    /// Registers and creates a worktree for `branch`, then switches into it.
    ///
    /// With `new_branch` git creates the branch (`worktree add -b`); otherwise the
    /// worktree is attached to an existing branch.
    pub(crate) fn create(
        &mut self,
        branch: &str,
        new_branch: bool,
    ) -> Result<PathBuf, WorktreeError> {
        let repo = repo_context(self.git)?;
        let path = self.settings.worktree_path(&repo.identifier, branch);
        info!(
            "Creating worktree for branch '{branch}' at '{}'",
            path.display()
        );

        if let Err(err) = self
            .registry
            .add_entry(&path, &repo.identifier, branch, &repo.remote_url)
        {
            warn!(error = %err, "worktree registered in memory but the state file is stale");
        }

        let path_str = path_to_str(&path)?;
        let args: Vec<&str> = if new_branch {
            vec!["worktree", "add", "-b", branch, path_str]
        } else {
            vec!["worktree", "add", path_str, branch]
        };
        self.run_git(&args, &repo.root)?;

        println!(
            "Successfully created worktree for branch '{branch}' at '{}'",
            path.display()
        );
        self.switch(branch, false)?;
        Ok(path)
    }

    /// Opens a session in the worktree for `branch`.
    ///
    /// Unregistered branches fall back to the conventional path, which covers
    /// worktrees created before they were tracked.
    pub(crate) fn switch(
        &mut self,
        branch: &str,
        silent: bool,
    ) -> Result<PathBuf, WorktreeError> {
        let (_, identifier) = identify_repo(self.git)?;
        let path = match self.registry.get_entry(&identifier, branch) {
            Some(entry) => entry.path,
            None => {
                let path = self.settings.worktree_path(&identifier, branch);
                debug!(path = %path.display(), "branch not registered; trying conventional path");
                path
            }
        };

        if !path.exists() {
            return Err(WorktreeError::PathMissing {
                branch: branch.to_string(),
                path,
            });
        }

        if !silent {
            println!("Switching to worktree at '{}'", path.display());
        }
        self.launcher
            .launch(&path)
            .map_err(|source| WorktreeError::Session {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Unregisters and removes the worktree for `branch`, optionally deleting
    /// the branch too. `force` maps to `worktree remove --force` and `branch -D`.
    pub(crate) fn remove(
        &mut self,
        branch: &str,
        delete_branch: bool,
        force: bool,
    ) -> Result<RemoveOutcome, WorktreeError> {
        let repo = repo_context(self.git)?;
        let entry = self
            .registry
            .find_entry(&repo.identifier, branch)
            .cloned()
            .ok_or_else(|| WorktreeError::NotRegistered {
                repo: repo.identifier.clone(),
                branch: branch.to_string(),
            })?;

        if let Err(err) = self.registry.remove_entry(&repo.identifier, branch) {
            warn!(error = %err, "worktree unregistered in memory but the state file is stale");
        }

        if !entry.path.exists() {
            return Err(WorktreeError::PathMissing {
                branch: branch.to_string(),
                path: entry.path,
            });
        }

        let path_str = path_to_str(&entry.path)?;
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(path_str);
        self.run_git(&args, &repo.root)?;

        if delete_branch {
            let flag = if force { "-D" } else { "-d" };
            self.run_git(&["branch", flag, branch], &repo.root)?;
        }

        Ok(RemoveOutcome {
            path: entry.path,
            branch_deleted: delete_branch,
        })
    }

    /// Reconciles the registry against `git worktree list`.
    ///
    /// With `current_repo_only` the registry side is limited to the repository
    /// of the working directory.
    pub(crate) fn list(&self, current_repo_only: bool) -> Result<ListReport, WorktreeError> {
        let mut entries = if current_repo_only {
            let (_, identifier) = identify_repo(self.git)?;
            self.registry.list_by_repository(&identifier)
        } else {
            self.registry.list_all()
        };
        entries.sort_by(|a, b| {
            a.branch_name
                .cmp(&b.branch_name)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut listed = list_worktrees(self.git)?;
        let cwd = &self.settings.cwd;

        let managed = entries
            .into_iter()
            .map(|entry| {
                let present = take_listed(&mut listed, &entry.path).is_some();
                let active = path_is_within_dir(cwd, &entry.path);
                ManagedRow {
                    entry,
                    present,
                    active,
                }
            })
            .collect();

        listed.sort_by(|a, b| a.path.cmp(&b.path));
        let unmanaged = listed
            .into_iter()
            .map(|worktree| UnmanagedRow {
                active: path_is_within_dir(cwd, &worktree.path),
                branch: worktree.branch_label().to_string(),
                path: worktree.path,
            })
            .collect();

        Ok(ListReport { managed, unmanaged })
    }

    /// Drops registry entries whose directory is gone. Returns how many.
    pub(crate) fn cleanup(&mut self) -> Result<usize, WorktreeError> {
        let before = self.registry.len();
        self.registry.cleanup_stale()?;
        let after = self.registry.len();
        Ok(before - after)
    }

    fn run_git(&self, args: &[&str], cwd: &Path) -> Result<(), WorktreeError> {
        let output = self.git.run(args, Some(cwd))?;
        if output.success {
            return Ok(());
        }
        Err(WorktreeError::CommandFailed {
            command: args.join(" "),
            output: output.combined(),
        })
    }
}

fn take_listed(listed: &mut Vec<ListedWorktree>, path: &Path) -> Option<ListedWorktree> {
    let index = listed
        .iter()
        .position(|worktree| worktree.path == path)
        .or_else(|| {
            listed
                .iter()
                .position(|worktree| paths_equal(&worktree.path, path))
        })?;
    Some(listed.remove(index))
}

pub(crate) fn path_is_within_dir(path: &Path, dir: &Path) -> bool {
    if path.starts_with(dir) {
        return true;
    }
    match (path.canonicalize(), dir.canonicalize()) {
        (Ok(canonical_path), Ok(canonical_dir)) => canonical_path.starts_with(canonical_dir),
        _ => false,
    }
}

pub(crate) fn paths_equal(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}
