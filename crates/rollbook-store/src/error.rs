/// Errors from mirror operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A row with this `block_hash` already exists.
    #[error("duplicate block hash: {0}")]
    DuplicateDigest(String),

    /// A row with this `block_index` already exists.
    #[error("duplicate block index: {0}")]
    DuplicateIndex(i64),

    /// The stored data could not be decoded.
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    /// Error from the underlying storage backend.
    #[error("backend error: {0}")]
    Backend(String),

    /// Storage backend is read-only or otherwise unavailable.
    #[error("store is read-only")]
    ReadOnly,
}

/// Result alias for mirror operations.
pub type StoreResult<T> = Result<T, StoreError>;
