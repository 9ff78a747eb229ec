//! # Table State Stores
//!
//! Durable homes for [`TumblingWindowTable`](crate::window::TumblingWindowTable)
//! snapshots. A store holds opaque bytes per table name; the table decides the
//! encoding (see `snapshot_state` / `restore_state`).
//!
//! - [`InMemoryTableStateStore`] keeps snapshots in the process, for tests.
//! - [`FsTableStateStore`] writes one file per table under a directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

/// Where window table snapshots are saved between runs.
pub trait TableStateStore: Send + Sync {
    /// Persist `state` for `table`, replacing any previous snapshot.
    fn save(&self, table: &str, state: &[u8]) -> Result<()>;

    /// Latest snapshot saved for `table`, or `None` if there is none.
    fn load(&self, table: &str) -> Result<Option<Vec<u8>>>;
}

/// In-memory state store for tests and single-process runs.
#[derive(Default)]
pub struct InMemoryTableStateStore {
    tables: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryTableStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableStateStore for InMemoryTableStateStore {
    fn save(&self, table: &str, state: &[u8]) -> Result<()> {
        self.tables.lock().insert(table.to_string(), state.to_vec());
        Ok(())
    }

    fn load(&self, table: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.tables.lock().get(table).cloned())
    }
}

/// File-system state store: `<base_path>/<table>.state`.
pub struct FsTableStateStore {
    base_path: PathBuf,
}

impl FsTableStateStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).with_context(|| {
            format!(
                "failed to create state store directory {}",
                base_path.display()
            )
        })?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.base_path.join(format!("{table}.state"))
    }
}

impl TableStateStore for FsTableStateStore {
    fn save(&self, table: &str, state: &[u8]) -> Result<()> {
        let path = self.table_path(table);
        // Write then rename so a crash mid-write keeps the previous snapshot.
        let tmp = path.with_extension("state.tmp");
        fs::write(&tmp, state)
            .with_context(|| format!("write table state failed: {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("replace table state failed: {}", path.display()))
    }

    fn load(&self, table: &str) -> Result<Option<Vec<u8>>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .with_context(|| format!("read table state failed: {}", path.display()))?;
        Ok(Some(bytes))
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
