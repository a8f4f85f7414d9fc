//! Snapshot file layout under the data directory.
//!
//! One file per record family. Loading tolerates a missing or unreadable
//! file by starting that family empty (logged at warn), so a fresh data
//! directory boots cleanly and a single corrupt file does not take the
//! whole system down with it.

use crate::error::Result;
use crate::store::{Collection, Persistable};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const USERS_FILE: &str = "users.dat";
pub const RESOURCES_FILE: &str = "resources.dat";
pub const REQUESTS_FILE: &str = "requests.dat";
pub const RENTALS_FILE: &str = "rentals.dat";
pub const BILLS_FILE: &str = "bills.dat";
pub const RULES_FILE: &str = "rules.dat";
pub const LOGS_FILE: &str = "logs.dat";

#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    /// Load one family, or start it empty when the file is missing or
    /// fails to decode.
    pub fn load_or_default<T: Persistable>(&self, file: &str) -> Collection<T> {
        let path = self.path_of(file);
        if !path.exists() {
            debug!(file = %path.display(), "no snapshot, starting empty");
            return Collection::new();
        }
        match Collection::load_from(&path) {
            Ok(collection) => {
                debug!(file = %path.display(), records = collection.len(), "snapshot loaded");
                collection
            }
            Err(err) => {
                warn!(file = %path.display(), error = %err, "snapshot unreadable, starting empty");
                Collection::new()
            }
        }
    }

    /// Persist one family, creating the data directory on first save.
    pub fn save<T: Persistable>(&self, file: &str, collection: &Collection<T>) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        collection.save_to(&self.path_of(file))
    }
}
