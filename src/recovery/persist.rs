//! Persisted relaunch guard.
//!
//! A small JSON file holding the time of the last hard relaunch, so a
//! relaunch loop is still rate-limited across crashes and restarts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persisted process-wide state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaunchGuard {
    /// Epoch ms of the last hard relaunch, 0 if never.
    pub last_hard_restart_at: u64,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to access state file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode or decode state file: {0}")]
    Json(#[from] serde_json::Error),
}

/// File-backed relaunch guard with an in-memory copy.
///
/// The in-memory copy is authoritative for the running process; a failed
/// write only loses the value across restarts.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: Option<PathBuf>,
    guard: Arc<Mutex<RelaunchGuard>>,
}

impl StateStore {
    /// Open the store at `path`, starting empty when the file is missing or
    /// unreadable.
    pub fn open(path: Option<PathBuf>) -> Self {
        let guard = match &path {
            Some(path) => match read_guard(path) {
                Ok(guard) => guard,
                Err(StateError::Io(e)) if e.kind() == io::ErrorKind::NotFound => RelaunchGuard::default(),
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Ignoring unreadable state file");
                    RelaunchGuard::default()
                }
            },
            None => RelaunchGuard::default(),
        };

        Self {
            path,
            guard: Arc::new(Mutex::new(guard)),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(None)
    }

    fn lock(&self) -> MutexGuard<'_, RelaunchGuard> {
        self.guard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn relaunch_guard(&self) -> RelaunchGuard {
        *self.lock()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a hard relaunch at `now` and write it through to disk.
    pub fn set_last_hard_restart_at(&self, now: u64) -> Result<(), StateError> {
        let guard = {
            let mut guard = self.lock();
            guard.last_hard_restart_at = now;
            *guard
        };

        match &self.path {
            Some(path) => write_guard(path, &guard),
            None => Ok(()),
        }
    }
}

pub fn read_guard(path: &Path) -> Result<RelaunchGuard, StateError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write via a temporary sibling and rename, so a crash never leaves a
/// truncated file behind.
pub fn write_guard(path: &Path, guard: &RelaunchGuard) -> Result<(), StateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(guard)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("kiosk-state.json");

        let store = StateStore::open(Some(path.clone()));
        assert_eq!(store.relaunch_guard().last_hard_restart_at, 0);
        store.set_last_hard_restart_at(1_700_000_000_000).unwrap();

        let reopened = StateStore::open(Some(path.clone()));
        assert_eq!(reopened.relaunch_guard().last_hard_restart_at, 1_700_000_000_000);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("lastHardRestartAt"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk-state.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(read_guard(&path), Err(StateError::Json(_))));
        assert_eq!(StateStore::open(Some(path)).relaunch_guard(), RelaunchGuard::default());
    }

    #[test]
    fn test_in_memory_store() {
        let store = StateStore::in_memory();
        store.set_last_hard_restart_at(42).unwrap();
        assert_eq!(store.relaunch_guard().last_hard_restart_at, 42);
        assert!(store.path().is_none());
    }
}
