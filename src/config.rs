use crate::constants::{
    APP_DIR_NAME, CONFIG_FILE_NAME, FALLBACK_WORKTREE_DIR, HOME_CONFIG_FILE_NAME,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
struct PartialConfig {
    worktree_dir: Option<String>,
    shell: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Config {
    pub(crate) worktree_dir: Option<PathBuf>,
    pub(crate) shell: Option<String>,
    pub(crate) source: Option<PathBuf>,
}

impl Config {
    pub(crate) fn load() -> Result<Self> {
        for path in config_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    pub(crate) fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let parsed: PartialConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        let mut config = Self {
            source: Some(path.to_path_buf()),
            ..Self::default()
        };
        if let Some(worktree_dir) = parsed.worktree_dir
            && !worktree_dir.trim().is_empty()
        {
            config.worktree_dir = Some(PathBuf::from(worktree_dir));
        }
        if let Some(shell) = parsed.shell
            && !shell.trim().is_empty()
        {
            config.shell = Some(shell);
        }
        Ok(config)
    }
}

fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(HOME_CONFIG_FILE_NAME));
    }
    paths
}

/// Everything an operation needs to know about its environment, resolved once
/// by the command layer.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) worktree_dir: PathBuf,
    pub(crate) cwd: PathBuf,
}

impl Settings {
    /// `flag` already carries the `GIT_WORKTREE_MANAGER_DIR` override when set.
    pub(crate) fn resolve(flag: Option<PathBuf>, config: &Config) -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(Self::resolve_in(flag, config, cwd))
    }

    /// A relative base directory is anchored at `cwd`; git runs from the repo
    /// root while the registry paths are checked from here.
    pub(crate) fn resolve_in(flag: Option<PathBuf>, config: &Config, cwd: PathBuf) -> Self {
        let worktree_dir = flag
            .or_else(|| config.worktree_dir.clone())
            .unwrap_or_else(default_worktree_dir);
        let worktree_dir = if worktree_dir.is_absolute() {
            worktree_dir
        } else {
            cwd.join(worktree_dir)
        };
        Self { worktree_dir, cwd }
    }

    /// Conventional location of a worktree: `<base>/<org>/<repo>/<branch>`.
    pub(crate) fn worktree_path(&self, repo: &str, branch: &str) -> PathBuf {
        self.worktree_dir.join(repo).join(branch)
    }
}

pub(crate) fn default_worktree_dir() -> PathBuf {
    let Some(home) = dirs::home_dir() else {
        return env::temp_dir().join(FALLBACK_WORKTREE_DIR);
    };
    platform_worktree_dir(&home, env::var("LOCALAPPDATA").ok())
}

fn platform_worktree_dir(home: &Path, local_app_data: Option<String>) -> PathBuf {
    if cfg!(windows) {
        return local_app_data
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("AppData").join("Local"))
            .join(APP_DIR_NAME);
    }
    if cfg!(any(target_os = "linux", target_os = "macos")) {
        return home.join(".local").join(APP_DIR_NAME);
    }
    home.join(format!(".{APP_DIR_NAME}"))
}
