use crate::constants::{DEFAULT_SHELL, DEFAULT_WINDOWS_SHELL};
use anyhow::{Context, Result, bail};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use std::process::{Command, Stdio};

/// Starts an interactive session rooted at a directory and blocks until the
/// user leaves it.
pub(crate) trait SessionLauncher {
    fn launch(&self, dir: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub(crate) struct InteractiveShell {
    shell: String,
}

impl InteractiveShell {
    pub(crate) fn new(configured: Option<&str>) -> Self {
        Self {
            shell: preferred_shell(configured),
        }
    }
}

impl SessionLauncher for InteractiveShell {
    fn launch(&self, dir: &Path) -> Result<()> {
        if !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal() {
            println!(
                "Non-interactive terminal detected; worktree path: {}",
                dir.display()
            );
            return Ok(());
        }

        tracing::debug!(shell = %self.shell, dir = %dir.display(), "starting shell");
        let status = Command::new(&self.shell)
            .current_dir(dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("failed to start shell `{}` in worktree", self.shell))?;
        // The shell reports the status of the last command the user ran.
        if !status.success() && status.code().is_none() {
            bail!("shell `{}` was terminated by a signal", self.shell);
        }
        Ok(())
    }
}

pub(crate) fn preferred_shell(configured: Option<&str>) -> String {
    configured
        .map(str::to_string)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| env::var("SHELL").ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| platform_default_shell().to_string())
}

fn platform_default_shell() -> &'static str {
    if cfg!(windows) {
        DEFAULT_WINDOWS_SHELL
    } else {
        DEFAULT_SHELL
    }
}
