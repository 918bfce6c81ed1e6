use rollbook_crypto::HasherError;
use rollbook_store::StoreError;

/// Errors produced by ledger operations.
///
/// Chain corruption is deliberately absent: verification reports it as data
/// (see [`crate::Verification`] and [`crate::AuditReport`]).
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("mirror write failed; entry not committed: {0}")]
    Persistence(#[from] StoreError),

    #[error("genesis entries cannot be appended")]
    GenesisReserved,

    #[error("mirror failed integrity audit with {} issue(s)", issues.len())]
    CorruptMirror { issues: Vec<String> },

    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

impl From<HasherError> for LedgerError {
    fn from(err: HasherError) -> Self {
        match err {
            HasherError::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
