//! Owner lookup interface and an in-process assignment store
//!
//! The engine only needs [`OwnerLookup`]; hosts with their own storage
//! implement that. [`MemoryStore`] is a small reference store with optional
//! JSON persistence, used by the command line tool.

use crate::validators::{ExistingOwner, OwnerRef};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error, info};

/// Storage failure. Never a validation outcome.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read side consumed by the uniqueness check
#[async_trait]
pub trait OwnerLookup: Send + Sync {
    /// All owners currently holding `identity`, in a stable order.
    ///
    /// Returns an empty vector, not an error, when nobody holds it.
    async fn find_owners(&self, identity: &str) -> Result<Vec<ExistingOwner>, StoreError>;
}

/// Full assignment storage: one identity value per owner
#[async_trait]
pub trait AssignmentStore: OwnerLookup {
    async fn identity_of(&self, owner: OwnerRef) -> Result<Option<String>, StoreError>;

    /// Insert or replace the owner's identity value
    async fn assign(&self, owner: OwnerRef, identity: &str, exempt: bool) -> Result<(), StoreError>;

    /// Drop the owner's identity value; `false` when there was none
    async fn remove(&self, owner: OwnerRef) -> Result<bool, StoreError>;
}

/// Stored assignment row
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Assignment {
    owner: OwnerRef,
    identity: String,
    #[serde(default)]
    exempt: bool,
    /// Unix timestamp of the last write
    assigned_at: u64,
}

/// Persistent file layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    assignments: Vec<Assignment>,
}

type Entries = BTreeMap<OwnerRef, Assignment>;

/// Thread-safe assignment store kept in memory, optionally mirrored to a JSON file
///
/// A change becomes visible only after it has been saved. Writers are
/// serialized so the file always holds the latest published state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<Entries>,
    file_path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    /// Create an empty, non-persistent store
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by `path`, loading existing assignments
    ///
    /// A missing or empty file yields an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            file_path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        };
        store.load_from_file()?;
        Ok(store)
    }

    /// Number of stored assignments
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn load_from_file(&self) -> Result<(), StoreError> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        if !path.exists() {
            debug!("Store file {} doesn't exist, starting empty", path.display());
            return Ok(());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            debug!("Store file {} is empty", path.display());
            return Ok(());
        }

        let data: StoreData = serde_json::from_str(&content)?;
        let loaded = data.assignments.len();

        {
            let mut entries = self.entries.write();
            entries.clear();
            for assignment in data.assignments {
                entries.insert(assignment.owner, assignment);
            }
        }

        info!("📁 Loaded {} assignments from {}", loaded, path.display());
        Ok(())
    }

    /// Apply `change` to a copy of the entries, save it, then publish it
    ///
    /// On a failed save the published entries are left untouched.
    fn update<T>(&self, change: impl FnOnce(&mut Entries) -> T) -> Result<T, StoreError> {
        let _writer = self.write_lock.lock();

        let mut next = self.entries.read().clone();
        let result = change(&mut next);
        self.save_to_file(&next)?;
        *self.entries.write() = next;

        Ok(result)
    }

    fn save_to_file(&self, entries: &Entries) -> Result<(), StoreError> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let data = StoreData {
            assignments: entries.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&data)?;

        // Write-then-rename so readers never see a half-written file
        let mut temp_path = path.clone().into_os_string();
        temp_path.push(".tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, path)?;

        debug!("💾 Saved assignments to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl OwnerLookup for MemoryStore {
    async fn find_owners(&self, identity: &str) -> Result<Vec<ExistingOwner>, StoreError> {
        let entries = self.entries.read();
        Ok(entries
            .values()
            .filter(|a| a.identity == identity)
            .map(|a| ExistingOwner::new(a.owner, a.exempt))
            .collect())
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn identity_of(&self, owner: OwnerRef) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(&owner).map(|a| a.identity.clone()))
    }

    async fn assign(&self, owner: OwnerRef, identity: &str, exempt: bool) -> Result<(), StoreError> {
        let assignment = Assignment {
            owner,
            identity: identity.to_string(),
            exempt,
            assigned_at: current_timestamp(),
        };

        self.update(|entries| {
            entries.insert(owner, assignment);
        })
        .map_err(|e| {
            error!("Failed to persist assignment for owner {}: {}", owner, e);
            e
        })
    }

    async fn remove(&self, owner: OwnerRef) -> Result<bool, StoreError> {
        if !self.entries.read().contains_key(&owner) {
            return Ok(false);
        }

        let removed = self
            .update(|entries| entries.remove(&owner).is_some())
            .map_err(|e| {
                error!("Failed to persist removal for owner {}: {}", owner, e);
                e
            })?;

        if removed {
            debug!("Removed identity of owner {}", owner);
        }
        Ok(removed)
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}
