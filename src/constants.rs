pub(crate) const APP_DIR_NAME: &str = "git-worktree-manager";
pub(crate) const STATE_FILE_NAME: &str = "state.json";
pub(crate) const STATE_TMP_EXTENSION: &str = "json.tmp";
pub(crate) const STATE_FORMAT_VERSION: &str = "1.0";

pub(crate) const CONFIG_FILE_NAME: &str = "config.toml";
pub(crate) const HOME_CONFIG_FILE_NAME: &str = ".git-worktree-manager.toml";
pub(crate) const WORKTREE_DIR_ENV: &str = "GIT_WORKTREE_MANAGER_DIR";
pub(crate) const FALLBACK_WORKTREE_DIR: &str = "git-worktrees";

pub(crate) const DEFAULT_SHELL: &str = "bash";
pub(crate) const DEFAULT_WINDOWS_SHELL: &str = "cmd.exe";

pub(crate) const DETACHED_HEAD_LABEL: &str = "detached HEAD";
pub(crate) const BRANCH_REF_PREFIX: &str = "refs/heads/";

pub(crate) const DEFAULT_LOG_FILTER: &str = "git_worktree_manager=info";
pub(crate) const VERBOSE_LOG_FILTER: &str = "git_worktree_manager=debug";
