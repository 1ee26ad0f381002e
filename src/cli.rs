use crate::constants::WORKTREE_DIR_ENV;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "git-worktree-manager",
    version,
    about = "A CLI tool for managing Git worktrees",
    long_about = "A CLI tool for managing Git worktrees.\n\nWorktrees are placed under a shared base directory as <org>/<repo>/<branch> and remembered in a local registry, so you can switch between them by branch name."
)]
pub(crate) struct Cli {
    /// Print debug diagnostics.
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct WorktreeDirArg {
    /// Base directory for worktrees.
    #[arg(short = 'w', long = "worktree-dir", env = WORKTREE_DIR_ENV)]
    pub(crate) worktree_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Create a worktree for a branch and open a shell in it.
    #[command(alias = "new")]
    Create {
        /// Branch to check out in the new worktree.
        branch: String,
        /// Create the branch as well instead of using an existing one.
        #[arg(short = 'b', long = "new-branch")]
        new_branch: bool,
        #[command(flatten)]
        dir: WorktreeDirArg,
    },
    /// Open a shell in an existing worktree.
    #[command(alias = "s")]
    Switch {
        branch: String,
        /// Suppress the status line.
        #[arg(short = 's', long)]
        silent: bool,
        #[command(flatten)]
        dir: WorktreeDirArg,
    },
    /// Remove a registered worktree.
    #[command(alias = "rm")]
    Remove {
        branch: String,
        /// Also delete the branch.
        #[arg(short = 'b', long = "remove-branch")]
        remove_branch: bool,
        /// Force removal of the worktree and/or branch.
        #[arg(short = 'f', long)]
        force: bool,
        #[command(flatten)]
        dir: WorktreeDirArg,
    },
    /// List managed worktrees alongside the ones git knows about.
    #[command(alias = "ls")]
    List {
        /// Only show registered worktrees of the current repository.
        #[arg(long)]
        repo: bool,
    },
    /// Drop registry entries whose directory no longer exists.
    #[command(alias = "clean")]
    Cleanup,
    /// Show configuration and state file locations.
    Config {
        #[command(flatten)]
        dir: WorktreeDirArg,
    },
}
