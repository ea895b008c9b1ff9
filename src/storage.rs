//! Durable local storage for client state.
//!
//! `LocalStore` is the native analog of browser `localStorage`: a small
//! JSON key/value store used to persist the auth token and the anonymous
//! (or fallback) cart across restarts. Values are written one file per key
//! under the configured data directory.
//!
//! Storage failures never propagate to callers: a store that cannot read or
//! write (missing directory, quota, corrupt file) degrades to a pass-through
//! that always misses, with a warning logged.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

/// Fixed keys for the durable client state.
pub mod keys {
    /// Persisted session (auth token + profile email).
    pub const SESSION: &str = "session";
    /// Anonymous / fallback cart contents.
    pub const CART: &str = "cart";
}

pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at `dir`, creating the directory best-effort.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "Failed to create storage directory");
        }
        Self { dir }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Read and parse the value stored under `key`. Missing, unreadable or
    /// corrupt entries all read as `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(key, error = %e, "Failed to read storage entry");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Failed to parse storage entry");
                None
            }
        }
    }

    /// Serialize `value` under `key`, replacing any previous entry.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        let contents = match serde_json::to_string_pretty(value) {
            Ok(c) => c,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize storage entry");
                return;
            }
        };
        if let Err(e) = std::fs::write(self.entry_path(key), contents) {
            warn!(key, error = %e, "Failed to write storage entry");
        }
    }

    /// Delete the entry under `key` if it exists.
    pub fn remove(&self, key: &str) {
        let path = self.entry_path(key);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(key, error = %e, "Failed to remove storage entry");
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
