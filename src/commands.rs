use crate::cli::Commands;
use crate::config::{Config, Settings};
use crate::git::SystemGit;
use crate::registry::Registry;
use crate::shell::InteractiveShell;
use crate::worktree::{WorktreeError, WorktreeManager};
use anyhow::Result;
use std::error::Error;
use std::path::PathBuf;
use tracing::{error, warn};

/// Dispatches one command. Operation failures are reported here and do not
/// change the exit status; only setup errors are returned.
pub(crate) fn run(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Create {
            branch,
            new_branch,
            dir,
        } => cmd_create(config, dir.worktree_dir, &branch, new_branch),
        Commands::Switch {
            branch,
            silent,
            dir,
        } => cmd_switch(config, dir.worktree_dir, &branch, silent),
        Commands::Remove {
            branch,
            remove_branch,
            force,
            dir,
        } => cmd_remove(config, dir.worktree_dir, &branch, remove_branch, force),
        Commands::List { repo } => cmd_list(config, repo),
        Commands::Cleanup => cmd_cleanup(config),
        Commands::Config { dir } => cmd_config(config, dir.worktree_dir),
    }
}

struct Invocation {
    settings: Settings,
    registry: Registry,
    git: SystemGit,
    launcher: InteractiveShell,
}

impl Invocation {
    /// `None` when the registry could not be opened; the failure is already reported.
    fn open(config: &Config, worktree_dir: Option<PathBuf>) -> Result<Option<Self>> {
        let settings = Settings::resolve(worktree_dir, config)?;
        let registry = match Registry::open() {
            Ok(registry) => registry,
            Err(err) => {
                error!("initializing registry: {}", error_chain(&err));
                return Ok(None);
            }
        };
        Ok(Some(Self {
            git: SystemGit::in_dir(&settings.cwd),
            launcher: InteractiveShell::new(config.shell.as_deref()),
            settings,
            registry,
        }))
    }

    fn manager(&mut self) -> WorktreeManager<'_, SystemGit, InteractiveShell> {
        WorktreeManager::new(&mut self.registry, &self.git, &self.launcher, &self.settings)
    }
}

fn cmd_create(
    config: &Config,
    worktree_dir: Option<PathBuf>,
    branch: &str,
    new_branch: bool,
) -> Result<()> {
    let Some(mut invocation) = Invocation::open(config, worktree_dir)? else {
        return Ok(());
    };
    if let Err(err) = invocation.manager().create(branch, new_branch) {
        report("create", &err);
    }
    Ok(())
}

fn cmd_switch(
    config: &Config,
    worktree_dir: Option<PathBuf>,
    branch: &str,
    silent: bool,
) -> Result<()> {
    let Some(mut invocation) = Invocation::open(config, worktree_dir)? else {
        return Ok(());
    };
    if let Err(err) = invocation.manager().switch(branch, silent) {
        report("switch", &err);
    }
    Ok(())
}

fn cmd_remove(
    config: &Config,
    worktree_dir: Option<PathBuf>,
    branch: &str,
    remove_branch: bool,
    force: bool,
) -> Result<()> {
    let Some(mut invocation) = Invocation::open(config, worktree_dir)? else {
        return Ok(());
    };
    match invocation.manager().remove(branch, remove_branch, force) {
        Ok(outcome) if outcome.branch_deleted => println!(
            "Successfully removed worktree at '{}' and branch '{branch}'",
            outcome.path.display()
        ),
        Ok(outcome) => println!(
            "Successfully removed worktree at '{}'",
            outcome.path.display()
        ),
        Err(err) => report("remove", &err),
    }
    Ok(())
}

fn cmd_list(config: &Config, current_repo_only: bool) -> Result<()> {
    let Some(mut invocation) = Invocation::open(config, None)? else {
        return Ok(());
    };
    match invocation.manager().list(current_repo_only) {
        Ok(listing) => print!("{}", listing.render()),
        Err(err) => report("list", &err),
    }
    Ok(())
}

fn cmd_cleanup(config: &Config) -> Result<()> {
    let Some(mut invocation) = Invocation::open(config, None)? else {
        return Ok(());
    };
    match invocation.manager().cleanup() {
        Ok(0) => println!("No stale entries found"),
        Ok(removed) => println!("Cleaned up {removed} stale worktree entries"),
        Err(err) => report("cleanup", &err),
    }
    Ok(())
}

fn cmd_config(config: &Config, worktree_dir: Option<PathBuf>) -> Result<()> {
    let Some(invocation) = Invocation::open(config, worktree_dir)? else {
        return Ok(());
    };
    let config_file = config
        .source
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "none".to_string());

    println!("Git Worktree Manager Configuration:");
    println!("State file location: {}", invocation.registry.path().display());
    println!("State format version: {}", invocation.registry.version());
    println!("Total managed worktrees: {}", invocation.registry.len());
    println!(
        "Worktree base directory: {}",
        invocation.settings.worktree_dir.display()
    );
    println!("Config file: {config_file}");
    Ok(())
}

fn report(operation: &str, err: &WorktreeError) {
    let message = error_chain(err);
    match err {
        WorktreeError::NotRegistered { .. } | WorktreeError::PathMissing { .. } => {
            warn!("{operation}: {message}");
        }
        _ => error!("{operation}: {message}"),
    }
}

/// Renders an error with its sources, `outer: inner: root`.
pub(crate) fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
