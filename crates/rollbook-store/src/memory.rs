use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::row::MirrorRow;
use crate::traits::LedgerMirror;

/// In-memory mirror for tests and embedding.
///
/// Rows are held in a `BTreeMap` keyed by `block_index`, behind a `RwLock`.
pub struct InMemoryMirror {
    inner: RwLock<MirrorState>,
    read_only: AtomicBool,
}

#[derive(Default)]
struct MirrorState {
    rows: BTreeMap<i64, MirrorRow>,
    by_hash: HashMap<String, i64>,
}

impl InMemoryMirror {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MirrorState::default()),
            read_only: AtomicBool::new(false),
        }
    }

    /// Make subsequent inserts fail with [`StoreError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Overwrite the stored row at `block_index` in place.
    ///
    /// The mirror contract has no update; this exists to simulate tampering
    /// with the underlying table.
    pub fn tamper<F>(&self, block_index: i64, edit: F) -> StoreResult<bool>
    where
        F: FnOnce(&mut MirrorRow),
    {
        let mut state = self.write()?;
        let Some(row) = state.rows.get_mut(&block_index) else {
            return Ok(false);
        };
        let old_hash = row.block_hash.clone();
        edit(row);
        let new_hash = row.block_hash.clone();
        state.by_hash.remove(&old_hash);
        state.by_hash.insert(new_hash, block_index);
        Ok(true)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MirrorState>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("mirror lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MirrorState>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("mirror lock poisoned".into()))
    }
}

impl Default for InMemoryMirror {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerMirror for InMemoryMirror {
    async fn insert(&self, row: &MirrorRow) -> StoreResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::ReadOnly);
        }
        let mut state = self.write()?;
        if state.by_hash.contains_key(&row.block_hash) {
            return Err(StoreError::DuplicateDigest(row.block_hash.clone()));
        }
        if state.rows.contains_key(&row.block_index) {
            return Err(StoreError::DuplicateIndex(row.block_index));
        }
        state.by_hash.insert(row.block_hash.clone(), row.block_index);
        state.rows.insert(row.block_index, row.clone());
        Ok(())
    }

    async fn all(&self) -> StoreResult<Vec<MirrorRow>> {
        Ok(self.read()?.rows.values().cloned().collect())
    }

    async fn by_kind(&self, kind: &str) -> StoreResult<Vec<MirrorRow>> {
        Ok(self
            .read()?
            .rows
            .values()
            .filter(|r| r.data_type == kind)
            .cloned()
            .collect())
    }

    async fn by_digest(&self, block_hash: &str) -> StoreResult<Option<MirrorRow>> {
        let state = self.read()?;
        Ok(state
            .by_hash
            .get(block_hash)
            .and_then(|idx| state.rows.get(idx))
            .cloned())
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.read()?.rows.len() as u64)
    }

    async fn latest(&self, limit: usize) -> StoreResult<Vec<MirrorRow>> {
        Ok(self
            .read()?
            .rows
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

impl std::fmt::Debug for InMemoryMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.read().map(|s| s.rows.len()).unwrap_or(0);
        f.debug_struct("InMemoryMirror")
            .field("row_count", &count)
            .finish()
    }
}
