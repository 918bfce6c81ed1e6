use async_trait::async_trait;

use crate::error::StoreResult;
use crate::row::MirrorRow;

/// Durable mirror of the ledger.
///
/// All implementations must satisfy these invariants:
/// - Rows are append-only. There is no update or delete.
/// - `block_hash` and `block_index` are each unique; a second insert of
///   either is rejected, never silently merged.
/// - Reads never interpret digests; a corrupted row is returned as stored.
/// - All backend errors are propagated, never silently ignored.
#[async_trait]
pub trait LedgerMirror: Send + Sync {
    /// Persist one row.
    async fn insert(&self, row: &MirrorRow) -> StoreResult<()>;

    /// Every row, ordered by `block_index` ascending.
    async fn all(&self) -> StoreResult<Vec<MirrorRow>>;

    /// Rows whose `data_type` equals `kind`, ordered by `block_index`.
    async fn by_kind(&self, kind: &str) -> StoreResult<Vec<MirrorRow>>;

    /// The row with the given `block_hash`, if any.
    async fn by_digest(&self, block_hash: &str) -> StoreResult<Option<MirrorRow>>;

    /// Number of stored rows.
    async fn count(&self) -> StoreResult<u64>;

    /// The `limit` rows with the highest `block_index`, newest first.
    async fn latest(&self, limit: usize) -> StoreResult<Vec<MirrorRow>> {
        let mut rows = self.all().await?;
        rows.reverse();
        rows.truncate(limit);
        Ok(rows)
    }
}
