use serde::{Deserialize, Serialize};

/// One persisted ledger entry, exactly as the `blocks` table holds it.
///
/// Fields are kept in their stored representation (strings for digests and
/// timestamps) so that a corrupted row can still be loaded and reported on
/// rather than failing to decode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRow {
    /// Matches the entry's index.
    pub block_index: i64,
    /// RFC 3339 text, byte-identical to what the entry digest committed to.
    pub timestamp: String,
    /// Content digest carried in the payload; empty for genesis.
    pub data_hash: String,
    /// Predecessor's digest; 64 zeros for genesis.
    pub prev_hash: String,
    /// The entry's own digest. Unique across the table.
    pub block_hash: String,
    /// Event kind tag, e.g. `fee_payment`.
    pub data_type: String,
    /// Business record identifier, absent for genesis.
    pub record_id: Option<i64>,
}
