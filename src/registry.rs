//! Persistent registry of managed worktrees.
//!
//! The whole document is loaded once when the registry is opened and written
//! back after every mutation. Writes go to a sibling temp file that is then
//! renamed over `state.json`, so a crash mid-write leaves the previous
//! document intact. There is no locking: two concurrent invocations race and
//! the last writer wins.

use crate::constants::{
    APP_DIR_NAME, STATE_FILE_NAME, STATE_FORMAT_VERSION, STATE_TMP_EXTENSION,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub(crate) enum RegistryError {
    #[error("could not determine the home directory")]
    NoHomeDir,
    #[error("failed to create state directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read state file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse state file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize registry")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write state file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Registry key for a (repository, branch) pair.
pub(crate) fn entry_id(repo: &str, branch: &str) -> String {
    format!("{repo}/{branch}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct WorktreeEntry {
    pub(crate) id: String,
    pub(crate) path: PathBuf,
    #[serde(rename = "git_repo")]
    pub(crate) repo: String,
    pub(crate) branch_name: String,
    pub(crate) remote_url: String,
    pub(crate) created_at: DateTime<Utc>,
    #[serde(rename = "last_accessed")]
    pub(crate) last_accessed_at: DateTime<Utc>,
}

impl WorktreeEntry {
    fn new(path: &Path, repo: &str, branch: &str, remote_url: &str) -> Self {
        let now = Utc::now();
        Self {
            id: entry_id(repo, branch),
            path: path.to_path_buf(),
            repo: repo.to_string(),
            branch_name: branch.to_string(),
            remote_url: remote_url.to_string(),
            created_at: now,
            last_accessed_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RegistryDocument {
    #[serde(default = "default_version")]
    pub(crate) version: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub(crate) worktrees: BTreeMap<String, WorktreeEntry>,
}

impl Default for RegistryDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            worktrees: BTreeMap::new(),
        }
    }
}

fn default_version() -> String {
    STATE_FORMAT_VERSION.to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, WorktreeEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<BTreeMap<String, WorktreeEntry>>::deserialize(deserializer)
        .map(Option::unwrap_or_default)
}

/// Where the state file lives, plus the superseded location it may still be at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StorageLocation {
    pub(crate) path: PathBuf,
    pub(crate) legacy_path: Option<PathBuf>,
}

impl StorageLocation {
    pub(crate) fn new(path: impl Into<PathBuf>, legacy_path: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            legacy_path,
        }
    }

    pub(crate) fn resolve() -> Result<Self, RegistryError> {
        let home = dirs::home_dir().ok_or(RegistryError::NoHomeDir)?;
        let (dir, legacy_dir) = storage_dirs(&home, cfg!(windows), |key| {
            std::env::var(key).ok()
        });
        Ok(Self::new(
            dir.join(STATE_FILE_NAME),
            Some(legacy_dir.join(STATE_FILE_NAME)),
        ))
    }
}

/// Returns `(current, legacy)` state directories for the platform.
pub(crate) fn storage_dirs(
    home: &Path,
    windows: bool,
    var: impl Fn(&str) -> Option<String>,
) -> (PathBuf, PathBuf) {
    let var = |key: &str| var(key).filter(|value| !value.trim().is_empty());

    if windows {
        let local = var("LOCALAPPDATA")
            .map(PathBuf::from)
            .or_else(dirs::cache_dir)
            .unwrap_or_else(|| home.join("AppData").join("Local"));
        let roaming = var("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("AppData").join("Roaming"));
        return (local.join(APP_DIR_NAME), roaming.join(APP_DIR_NAME));
    }

    let data = home.join(".local").join("share");
    let config = var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(".config"));
    (data.join(APP_DIR_NAME), config.join(APP_DIR_NAME))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Migration {
    NotNeeded,
    Migrated,
    Failed,
}

/// Moves a legacy state file into place when only the legacy one exists.
/// Failures are logged and otherwise ignored.
pub(crate) fn migrate_legacy(
    legacy: &Path,
    target: &Path,
    rename: impl FnOnce(&Path, &Path) -> io::Result<()>,
) -> Migration {
    if !legacy.is_file() || target.exists() {
        return Migration::NotNeeded;
    }

    match rename(legacy, target) {
        Ok(()) => {
            info!(
                "State file migrated from {} to {}",
                legacy.display(),
                target.display()
            );
            Migration::Migrated
        }
        Err(err) => {
            error!(
                legacy = %legacy.display(),
                target = %target.display(),
                error = %err,
                "failed to migrate state file"
            );
            Migration::Failed
        }
    }
}

#[derive(Debug)]
pub(crate) struct Registry {
    path: PathBuf,
    document: RegistryDocument,
}

impl Registry {
    pub(crate) fn open() -> Result<Self, RegistryError> {
        let location = StorageLocation::resolve()?;
        Self::open_at(&location)
    }

    pub(crate) fn open_at(location: &StorageLocation) -> Result<Self, RegistryError> {
        Self::open_with(location, |from, to| fs::rename(from, to))
    }

    fn open_with(
        location: &StorageLocation,
        rename: impl FnOnce(&Path, &Path) -> io::Result<()>,
    ) -> Result<Self, RegistryError> {
        if let Some(parent) = location.path.parent() {
            fs::create_dir_all(parent).map_err(|source| RegistryError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        if let Some(legacy) = &location.legacy_path {
            migrate_legacy(legacy, &location.path, rename);
        }

        let document = load_document(&location.path)?;
        debug!(
            path = %location.path.display(),
            entries = document.worktrees.len(),
            "registry loaded"
        );
        Ok(Self {
            path: location.path.clone(),
            document,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn version(&self) -> &str {
        &self.document.version
    }

    pub(crate) fn len(&self) -> usize {
        self.document.worktrees.len()
    }

    /// Inserts or replaces the entry for `(repo, branch)` and persists.
    ///
    /// On a persistence error the in-memory registry keeps the new entry.
    pub(crate) fn add_entry(
        &mut self,
        path: &Path,
        repo: &str,
        branch: &str,
        remote_url: &str,
    ) -> Result<(), RegistryError> {
        let entry = WorktreeEntry::new(path, repo, branch, remote_url);
        if self.document.worktrees.contains_key(&entry.id) {
            debug!(id = %entry.id, "replacing existing registry entry");
        }
        self.document.worktrees.insert(entry.id.clone(), entry);
        self.persist()
    }

    /// Removes the entry if present and persists. Removing a missing entry is not an error.
    pub(crate) fn remove_entry(&mut self, repo: &str, branch: &str) -> Result<(), RegistryError> {
        self.document.worktrees.remove(&entry_id(repo, branch));
        self.persist()
    }

    /// Looks up an entry without touching its access time.
    pub(crate) fn find_entry(&self, repo: &str, branch: &str) -> Option<&WorktreeEntry> {
        self.document.worktrees.get(&entry_id(repo, branch))
    }

    /// Looks up an entry and bumps its access time.
    ///
    /// Failing to persist the new access time is logged, never returned.
    pub(crate) fn get_entry(&mut self, repo: &str, branch: &str) -> Option<WorktreeEntry> {
        let id = entry_id(repo, branch);
        let entry = self.document.worktrees.get_mut(&id)?;
        entry.last_accessed_at = Utc::now();
        let found = entry.clone();

        if let Err(err) = self.persist() {
            warn!(id = %id, error = %err, "failed to record worktree access time");
        }
        Some(found)
    }

    pub(crate) fn list_all(&self) -> Vec<WorktreeEntry> {
        self.document.worktrees.values().cloned().collect()
    }

    pub(crate) fn list_by_repository(&self, repo: &str) -> Vec<WorktreeEntry> {
        self.document
            .worktrees
            .values()
            .filter(|entry| entry.repo == repo)
            .cloned()
            .collect()
    }

    /// Drops every entry whose path is known not to exist and returns how many
    /// went. Paths that cannot be checked are kept.
    /// Writes only when something was removed.
    pub(crate) fn cleanup_stale(&mut self) -> Result<usize, RegistryError> {
        let before = self.document.worktrees.len();
        self.document
            .worktrees
            .retain(|id, entry| match entry.path.try_exists() {
                Ok(true) => true,
                Ok(false) => {
                    debug!(id = %id, path = %entry.path.display(), "dropping stale entry");
                    false
                }
                Err(err) => {
                    warn!(
                        id = %id,
                        path = %entry.path.display(),
                        error = %err,
                        "cannot check worktree path, keeping entry"
                    );
                    true
                }
            });
        let removed = before - self.document.worktrees.len();

        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    fn persist(&self) -> Result<(), RegistryError> {
        let data =
            serde_json::to_vec_pretty(&self.document).map_err(RegistryError::Serialize)?;
        let tmp_path = self.path.with_extension(STATE_TMP_EXTENSION);

        fs::write(&tmp_path, data).map_err(|source| RegistryError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| RegistryError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

fn load_document(path: &Path) -> Result<RegistryDocument, RegistryError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(RegistryDocument::default());
        }
        Err(source) => {
            return Err(RegistryError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_slice(&raw).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn location_in(temp: &TempDir) -> StorageLocation {
        StorageLocation::new(temp.path().join("share").join(STATE_FILE_NAME), None)
    }

    #[test]
    fn test_open_starts_empty_and_creates_dir() {
        let temp = TempDir::new().expect("tempdir");
        let location = location_in(&temp);
        let registry = Registry::open_at(&location).expect("open");

        assert_eq!(registry.len(), 0);
        assert_eq!(registry.version(), STATE_FORMAT_VERSION);
        assert!(temp.path().join("share").is_dir());
        assert!(!location.path.exists());
    }

    #[test]
    fn test_add_then_get_returns_entry() {
        let temp = TempDir::new().expect("tempdir");
        let mut registry = Registry::open_at(&location_in(&temp)).expect("open");
        let path = temp.path().join("wt").join("acme").join("widgets").join("feature-x");

        registry
            .add_entry(&path, "acme/widgets", "feature-x", "git@github.com:acme/widgets.git")
            .expect("add");

        let first = registry.get_entry("acme/widgets", "feature-x").expect("entry");
        assert_eq!(first.id, "acme/widgets/feature-x");
        assert_eq!(first.path, path);
        assert_eq!(first.remote_url, "git@github.com:acme/widgets.git");
        assert!(first.last_accessed_at >= first.created_at);

        let second = registry.get_entry("acme/widgets", "feature-x").expect("entry");
        assert!(second.last_accessed_at >= first.last_accessed_at);
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn test_get_missing_entry_is_none() {
        let temp = TempDir::new().expect("tempdir");
        let mut registry = Registry::open_at(&location_in(&temp)).expect("open");
        assert!(registry.get_entry("acme/widgets", "nope").is_none());
    }

    #[test]
    fn test_re_add_overwrites() {
        let temp = TempDir::new().expect("tempdir");
        let mut registry = Registry::open_at(&location_in(&temp)).expect("open");
        registry
            .add_entry(Path::new("/tmp/one"), "acme/widgets", "main", "u1")
            .expect("add");
        registry
            .add_entry(Path::new("/tmp/two"), "acme/widgets", "main", "u2")
            .expect("add again");

        assert_eq!(registry.len(), 1);
        let entry = registry.get_entry("acme/widgets", "main").expect("entry");
        assert_eq!(entry.path, PathBuf::from("/tmp/two"));
        assert_eq!(entry.remote_url, "u2");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp = TempDir::new().expect("tempdir");
        let mut registry = Registry::open_at(&location_in(&temp)).expect("open");
        registry
            .add_entry(Path::new("/tmp/x"), "acme/widgets", "feature-x", "u")
            .expect("add");

        registry.remove_entry("acme/widgets", "feature-x").expect("remove");
        assert!(registry.get_entry("acme/widgets", "feature-x").is_none());
        registry
            .remove_entry("acme/widgets", "feature-x")
            .expect("second remove");
    }

    #[test]
    fn test_list_all_and_by_repository() {
        let temp = TempDir::new().expect("tempdir");
        let mut registry = Registry::open_at(&location_in(&temp)).expect("open");
        let pairs = [
            ("acme/widgets", "main"),
            ("acme/widgets", "feature-x"),
            ("acme/gadgets", "main"),
            ("other/widgets", "main"),
        ];
        for (repo, branch) in pairs {
            let path = temp.path().join(repo).join(branch);
            registry.add_entry(&path, repo, branch, "u").expect("add");
        }

        let all = registry.list_all();
        assert_eq!(all.len(), pairs.len());
        let ids: HashSet<_> = all.iter().map(|entry| entry.id.clone()).collect();
        assert_eq!(ids.len(), pairs.len());

        let widgets = registry.list_by_repository("acme/widgets");
        assert_eq!(widgets.len(), 2);
        assert!(widgets.iter().all(|entry| entry.repo == "acme/widgets"));
        assert!(registry.list_by_repository("acme").is_empty());
    }

    #[test]
    fn test_cleanup_stale_removes_missing_paths() {
        let temp = TempDir::new().expect("tempdir");
        let location = location_in(&temp);
        let mut registry = Registry::open_at(&location).expect("open");
        let present = temp.path().join("present");
        fs::create_dir_all(&present).expect("mkdir present");
        let missing = temp.path().join("missing");

        registry
            .add_entry(&present, "acme/widgets", "present", "u")
            .expect("add present");
        registry
            .add_entry(&missing, "acme/widgets", "missing", "u")
            .expect("add missing");

        assert_eq!(registry.cleanup_stale().expect("cleanup"), 1);
        let remaining = registry.list_all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].branch_name, "present");

        let reopened = Registry::open_at(&location).expect("reopen");
        assert_eq!(reopened.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_cleanup_keeps_entries_it_cannot_check() {
        let temp = TempDir::new().expect("tempdir");
        let location = location_in(&temp);
        let mut registry = Registry::open_at(&location).expect("open");
        // A component longer than NAME_MAX makes the lookup fail rather than miss.
        let unreadable = temp.path().join("x".repeat(300)).join("wt");
        assert!(unreadable.try_exists().is_err());

        registry
            .add_entry(&unreadable, "acme/widgets", "unreadable", "u")
            .expect("add");
        registry
            .add_entry(&temp.path().join("gone"), "acme/widgets", "gone", "u")
            .expect("add");

        assert_eq!(registry.cleanup_stale().expect("cleanup"), 1);
        assert!(registry.find_entry("acme/widgets", "unreadable").is_some());
        assert!(registry.find_entry("acme/widgets", "gone").is_none());
    }

    #[test]
    fn test_find_entry_leaves_access_time_alone() {
        let temp = TempDir::new().expect("tempdir");
        let location = location_in(&temp);
        let mut registry = Registry::open_at(&location).expect("open");
        registry
            .add_entry(Path::new("/tmp/a"), "acme/widgets", "a", "u")
            .expect("add");
        let on_disk = fs::read_to_string(&location.path).expect("read state");

        let entry = registry.find_entry("acme/widgets", "a").expect("found");
        assert_eq!(entry.last_accessed_at, entry.created_at);
        assert!(registry.find_entry("acme/widgets", "b").is_none());
        assert_eq!(fs::read_to_string(&location.path).expect("reread"), on_disk);
    }

    #[test]
    fn test_cleanup_without_stale_entries_skips_write() {
        let temp = TempDir::new().expect("tempdir");
        let location = location_in(&temp);
        let mut registry = Registry::open_at(&location).expect("open");

        assert_eq!(registry.cleanup_stale().expect("cleanup"), 0);
        assert!(!location.path.exists());
    }

    #[test]
    fn test_reload_yields_same_entries() {
        let temp = TempDir::new().expect("tempdir");
        let location = location_in(&temp);
        let mut registry = Registry::open_at(&location).expect("open");
        registry
            .add_entry(Path::new("/tmp/a"), "acme/widgets", "a", "u")
            .expect("add a");
        registry
            .add_entry(Path::new("/tmp/b"), "acme/widgets", "b", "u")
            .expect("add b");

        let reopened = Registry::open_at(&location).expect("reopen");
        assert_eq!(reopened.list_all(), registry.list_all());
        assert!(!location.path.with_extension(STATE_TMP_EXTENSION).exists());
    }

    #[test]
    fn test_document_uses_wire_field_names() {
        let temp = TempDir::new().expect("tempdir");
        let location = location_in(&temp);
        let mut registry = Registry::open_at(&location).expect("open");
        registry
            .add_entry(Path::new("/tmp/a"), "acme/widgets", "a", "u")
            .expect("add");

        let raw = fs::read_to_string(&location.path).expect("read state");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["version"], "1.0");
        let entry = &value["worktrees"]["acme/widgets/a"];
        assert_eq!(entry["id"], "acme/widgets/a");
        assert_eq!(entry["git_repo"], "acme/widgets");
        assert_eq!(entry["branch_name"], "a");
        assert_eq!(entry["remote_url"], "u");
        assert!(entry["created_at"].is_string());
        assert!(entry["last_accessed"].is_string());
    }

    #[test]
    fn test_loads_legacy_document_and_preserves_version() {
        let temp = TempDir::new().expect("tempdir");
        let location = location_in(&temp);
        fs::create_dir_all(location.path.parent().expect("parent")).expect("mkdir");
        let raw = r#"{
  "version": "0.9",
  "worktrees": {
    "acme/widgets/main": {
      "id": "acme/widgets/main",
      "path": "/srv/wt/acme/widgets/main",
      "git_repo": "acme/widgets",
      "branch_name": "main",
      "remote_url": "https://github.com/acme/widgets.git",
      "created_at": "2024-03-01T10:00:00.123456-05:00",
      "last_accessed": "2024-03-02T10:00:00Z"
    }
  }
}"#;
        fs::write(&location.path, raw).expect("write state");

        let mut registry = Registry::open_at(&location).expect("open");
        assert_eq!(registry.version(), "0.9");
        let entry = registry.get_entry("acme/widgets", "main").expect("entry");
        assert_eq!(entry.path, PathBuf::from("/srv/wt/acme/widgets/main"));

        let reopened = Registry::open_at(&location).expect("reopen");
        assert_eq!(reopened.version(), "0.9");
    }

    #[test]
    fn test_null_worktrees_loads_empty() {
        let temp = TempDir::new().expect("tempdir");
        let location = location_in(&temp);
        fs::create_dir_all(location.path.parent().expect("parent")).expect("mkdir");
        fs::write(&location.path, r#"{"version":"1.0","worktrees":null}"#).expect("write");

        let registry = Registry::open_at(&location).expect("open");
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_corrupt_document_is_parse_error() {
        let temp = TempDir::new().expect("tempdir");
        let location = location_in(&temp);
        fs::create_dir_all(location.path.parent().expect("parent")).expect("mkdir");
        fs::write(&location.path, "{ not json").expect("write");

        let err = Registry::open_at(&location).expect_err("parse error");
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn test_persist_failure_keeps_in_memory_change() {
        let temp = TempDir::new().expect("tempdir");
        let location = location_in(&temp);
        let mut registry = Registry::open_at(&location).expect("open");
        // A directory squatting on the temp file name makes the write fail.
        fs::create_dir_all(location.path.with_extension(STATE_TMP_EXTENSION))
            .expect("mkdir squatter");

        let err = registry
            .add_entry(Path::new("/tmp/a"), "acme/widgets", "a", "u")
            .expect_err("write error");
        assert!(matches!(err, RegistryError::Write { .. }));
        assert_eq!(registry.len(), 1);
        assert!(registry.get_entry("acme/widgets", "a").is_some());
    }

    #[test]
    fn test_migrates_legacy_file() {
        let temp = TempDir::new().expect("tempdir");
        let legacy_dir = temp.path().join("config").join(APP_DIR_NAME);
        fs::create_dir_all(&legacy_dir).expect("mkdir legacy");
        let legacy = legacy_dir.join(STATE_FILE_NAME);
        let content = r#"{"version":"1.0","worktrees":{"acme/widgets/a":{"id":"acme/widgets/a","path":"/tmp/a","git_repo":"acme/widgets","branch_name":"a","remote_url":"u","created_at":"2024-01-01T00:00:00Z","last_accessed":"2024-01-01T00:00:00Z"}}}"#;
        fs::write(&legacy, content).expect("write legacy");

        let target = temp.path().join("share").join(APP_DIR_NAME).join(STATE_FILE_NAME);
        let location = StorageLocation::new(&target, Some(legacy.clone()));
        let mut registry = Registry::open_at(&location).expect("open");

        assert!(!legacy.exists());
        assert_eq!(fs::read_to_string(&target).expect("read target"), content);
        assert_eq!(registry.len(), 1);
        registry
            .add_entry(Path::new("/tmp/b"), "acme/widgets", "b", "u")
            .expect("usable after migration");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_migration_skipped_when_target_exists() {
        let temp = TempDir::new().expect("tempdir");
        let legacy = temp.path().join("legacy.json");
        let target = temp.path().join("state.json");
        fs::write(&legacy, "legacy").expect("write legacy");
        fs::write(&target, "current").expect("write target");

        assert_eq!(
            migrate_legacy(&legacy, &target, |from, to| fs::rename(from, to)),
            Migration::NotNeeded
        );
        assert!(legacy.exists());
        assert_eq!(fs::read_to_string(&target).expect("read"), "current");
    }

    #[test]
    fn test_failed_migration_leaves_legacy_file() {
        let temp = TempDir::new().expect("tempdir");
        let legacy = temp.path().join("legacy.json");
        fs::write(&legacy, "{}").expect("write legacy");
        // Renaming a file onto a path under a regular file fails.
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "").expect("write blocker");
        let target = blocker.join(STATE_FILE_NAME);

        assert_eq!(
            migrate_legacy(&legacy, &target, |from, to| fs::rename(from, to)),
            Migration::Failed
        );
        assert!(legacy.exists());
    }

    #[test]
    fn test_open_continues_empty_after_failed_migration() {
        let temp = TempDir::new().expect("tempdir");
        let legacy = temp.path().join("legacy").join(STATE_FILE_NAME);
        fs::create_dir_all(legacy.parent().expect("legacy parent")).expect("mkdir legacy");
        fs::write(&legacy, r#"{"version":"1.0","worktrees":{}}"#).expect("write legacy");
        let location = StorageLocation::new(
            temp.path().join("state").join(STATE_FILE_NAME),
            Some(legacy.clone()),
        );

        let mut registry = Registry::open_with(&location, |_, _| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        })
        .expect("open despite failed migration");

        assert_eq!(registry.len(), 0);
        assert!(legacy.exists());
        registry
            .add_entry(Path::new("/tmp/a"), "acme/widgets", "a", "u")
            .expect("usable after failed migration");
        assert_eq!(registry.len(), 1);
        assert!(location.path.exists());
    }

    #[test]
    fn test_storage_dirs_unix_defaults() {
        let home = Path::new("/home/dev");
        let (dir, legacy) = storage_dirs(home, false, |_| None);
        assert_eq!(dir, PathBuf::from("/home/dev/.local/share/git-worktree-manager"));
        assert_eq!(legacy, PathBuf::from("/home/dev/.config/git-worktree-manager"));
    }

    #[test]
    fn test_storage_dirs_honours_xdg_config_home_for_legacy() {
        let home = Path::new("/home/dev");
        let (dir, legacy) = storage_dirs(home, false, |key| {
            (key == "XDG_CONFIG_HOME").then(|| "/xdg/config".to_string())
        });
        assert_eq!(dir, PathBuf::from("/home/dev/.local/share/git-worktree-manager"));
        assert_eq!(legacy, PathBuf::from("/xdg/config/git-worktree-manager"));
    }

    #[test]
    fn test_storage_dirs_windows() {
        let home = Path::new("C:/Users/dev");
        let (dir, legacy) = storage_dirs(home, true, |key| match key {
            "LOCALAPPDATA" => Some("C:/Users/dev/AppData/Local".to_string()),
            "APPDATA" => Some("C:/Users/dev/AppData/Roaming".to_string()),
            _ => None,
        });
        assert_eq!(
            dir,
            PathBuf::from("C:/Users/dev/AppData/Local").join(APP_DIR_NAME)
        );
        assert_eq!(
            legacy,
            PathBuf::from("C:/Users/dev/AppData/Roaming").join(APP_DIR_NAME)
        );
    }
}
