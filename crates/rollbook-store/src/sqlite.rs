//! SQLite mirror backend.
//!
//! The `blocks` table is the durable source of truth for the ledger. Both
//! `block_index` and `block_hash` carry UNIQUE constraints, so two writers
//! racing on the same tail cannot both land a row.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::{StoreError, StoreResult};
use crate::row::MirrorRow;
use crate::traits::LedgerMirror;

const SELECT_COLUMNS: &str =
    "SELECT block_index, timestamp, data_hash, prev_hash, block_hash, data_type, record_id FROM blocks";

/// SQLite-backed mirror.
#[derive(Clone)]
pub struct SqliteMirror {
    pool: SqlitePool,
}

impl SqliteMirror {
    /// Connect to (creating if missing) the database at `url` and initialize
    /// the schema.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        Self::connect_with_options(url, 5).await
    }

    /// Connect with an explicit pool size.
    pub async fn connect_with_options(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Backend(format!("invalid sqlite url {url}: {e}")))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to open sqlite: {e}")))?;
        let mirror = Self { pool };
        mirror.init_schema().await?;
        tracing::debug!(url, "sqlite mirror ready");
        Ok(mirror)
    }

    /// A private in-memory database. Uses a single long-lived connection,
    /// since every new connection to `:memory:` would see an empty database.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to open sqlite: {e}")))?;
        let mirror = Self { pool };
        mirror.init_schema().await?;
        Ok(mirror)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> StoreResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS blocks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                block_index INTEGER NOT NULL UNIQUE,
                timestamp TEXT NOT NULL,
                data_hash TEXT NOT NULL,
                prev_hash TEXT NOT NULL,
                block_hash TEXT NOT NULL UNIQUE,
                data_type TEXT NOT NULL,
                record_id INTEGER,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            "CREATE INDEX IF NOT EXISTS blocks_data_type ON blocks (data_type)",
        ];
        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerMirror for SqliteMirror {
    async fn insert(&self, row: &MirrorRow) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO blocks
                (block_index, timestamp, data_hash, prev_hash, block_hash, data_type, record_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.block_index)
        .bind(row.timestamp.as_str())
        .bind(row.data_hash.as_str())
        .bind(row.prev_hash.as_str())
        .bind(row.block_hash.as_str())
        .bind(row.data_type.as_str())
        .bind(row.record_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, row))?;
        Ok(())
    }

    async fn all(&self) -> StoreResult<Vec<MirrorRow>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY block_index ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(decode_row).collect()
    }

    async fn by_kind(&self, kind: &str) -> StoreResult<Vec<MirrorRow>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE data_type = ? ORDER BY block_index ASC"
        ))
        .bind(kind)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(decode_row).collect()
    }

    async fn by_digest(&self, block_hash: &str) -> StoreResult<Option<MirrorRow>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE block_hash = ?"))
            .bind(block_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn count(&self) -> StoreResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM blocks")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StoreError::CorruptRow(e.to_string()))?;
        Ok(n.max(0) as u64)
    }

    async fn latest(&self, limit: usize) -> StoreResult<Vec<MirrorRow>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} ORDER BY block_index DESC LIMIT ?"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(decode_row).collect()
    }
}

fn decode_row(row: &SqliteRow) -> StoreResult<MirrorRow> {
    let corrupt = |e: sqlx::Error| StoreError::CorruptRow(e.to_string());
    Ok(MirrorRow {
        block_index: row.try_get("block_index").map_err(corrupt)?,
        timestamp: row.try_get("timestamp").map_err(corrupt)?,
        data_hash: row.try_get("data_hash").map_err(corrupt)?,
        prev_hash: row.try_get("prev_hash").map_err(corrupt)?,
        block_hash: row.try_get("block_hash").map_err(corrupt)?,
        data_type: row.try_get("data_type").map_err(corrupt)?,
        record_id: row.try_get("record_id").map_err(corrupt)?,
    })
}

fn map_insert_error(err: sqlx::Error, row: &MirrorRow) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return if db.message().contains("block_hash") {
                StoreError::DuplicateDigest(row.block_hash.clone())
            } else {
                StoreError::DuplicateIndex(row.block_index)
            };
        }
    }
    backend(err)
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: i64, kind: &str, hash: &str) -> MirrorRow {
        MirrorRow {
            block_index: index,
            timestamp: "2024-05-01T09:30:00.125Z".into(),
            data_hash: if index == 0 { String::new() } else { format!("d{index}") },
            prev_hash: format!("p{index}"),
            block_hash: hash.into(),
            data_type: kind.into(),
            record_id: (index > 0).then_some(index),
        }
    }

    #[tokio::test]
    async fn roundtrips_rows_exactly() {
        let m = SqliteMirror::in_memory().await.unwrap();
        let r0 = row(0, "genesis", "h0");
        let r1 = row(1, "fee_payment", "h1");
        m.insert(&r1).await.unwrap();
        m.insert(&r0).await.unwrap();

        assert_eq!(m.all().await.unwrap(), vec![r0, r1.clone()]);
        assert_eq!(m.by_digest("h1").await.unwrap(), Some(r1));
        assert_eq!(m.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unique_constraints_map_to_store_errors() {
        let m = SqliteMirror::in_memory().await.unwrap();
        m.insert(&row(0, "genesis", "h0")).await.unwrap();

        let dup_hash = m.insert(&row(1, "admission", "h0")).await.unwrap_err();
        assert!(matches!(dup_hash, StoreError::DuplicateDigest(_)));

        let dup_index = m.insert(&row(0, "admission", "other")).await.unwrap_err();
        assert!(matches!(dup_index, StoreError::DuplicateIndex(0)));
    }

    #[tokio::test]
    async fn kind_filter_and_latest() {
        let m = SqliteMirror::in_memory().await.unwrap();
        m.insert(&row(0, "genesis", "h0")).await.unwrap();
        m.insert(&row(1, "hostel_allocation", "h1")).await.unwrap();
        m.insert(&row(2, "hostel_deallocation", "h2")).await.unwrap();
        m.insert(&row(3, "hostel_allocation", "h3")).await.unwrap();

        let allocs = m.by_kind("hostel_allocation").await.unwrap();
        assert_eq!(
            allocs.iter().map(|r| r.block_index).collect::<Vec<_>>(),
            vec![1, 3]
        );

        let latest = m.latest(2).await.unwrap();
        assert_eq!(
            latest.iter().map(|r| r.block_index).collect::<Vec<_>>(),
            vec![3, 2]
        );
    }

    #[tokio::test]
    async fn file_database_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());

        {
            let m = SqliteMirror::connect(&url).await.unwrap();
            m.insert(&row(0, "genesis", "h0")).await.unwrap();
            m.pool().close().await;
        }

        let reopened = SqliteMirror::connect(&url).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
