use chrono::{DateTime, Utc};
use rollbook_crypto::{to_canonical_json, ChainLink, ContentHasher, HasherError};
use rollbook_store::MirrorRow;
use rollbook_types::{canonical_timestamp, parse_timestamp, Digest, EventKind};
use serde::{Deserialize, Serialize};

/// What a ledger entry commits to.
///
/// Holds a digest of the business record, never the record itself, so the
/// mirror row carries everything needed to recompute the entry digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_digest: Option<Digest>,
}

impl Payload {
    /// The fixed genesis payload, `{"kind":"genesis"}`.
    pub fn genesis() -> Self {
        Self {
            kind: EventKind::Genesis,
            record_id: None,
            content_digest: None,
        }
    }

    /// Payload for one business event.
    pub fn event(kind: EventKind, record_id: i64, content_digest: Digest) -> Self {
        Self {
            kind,
            record_id: Some(record_id),
            content_digest: Some(content_digest),
        }
    }
}

/// Compute an entry digest over `(index, previous, timestamp, payload)`.
pub fn entry_digest(
    index: u64,
    previous_digest: &Digest,
    timestamp: &DateTime<Utc>,
    payload: &Payload,
) -> Result<Digest, HasherError> {
    let payload_json = to_canonical_json(payload)?;
    Ok(ContentHasher::ENTRY.commit([
        index.to_string(),
        previous_digest.to_hex(),
        canonical_timestamp(timestamp),
        payload_json,
    ]))
}

/// One link of the ledger.
///
/// Fields are readable but not writable outside this crate: once an entry
/// has been handed out it is a receipt, not a draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub(crate) index: u64,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) payload: Payload,
    pub(crate) previous_digest: Digest,
    pub(crate) digest: Digest,
}

impl LedgerEntry {
    /// Seal a new entry, computing its digest.
    pub(crate) fn seal(
        index: u64,
        previous_digest: Digest,
        timestamp: DateTime<Utc>,
        payload: Payload,
    ) -> Result<Self, HasherError> {
        let digest = entry_digest(index, &previous_digest, &timestamp, &payload)?;
        Ok(Self {
            index,
            timestamp,
            payload,
            previous_digest,
            digest,
        })
    }

    /// The genesis entry: index 0, zero predecessor, genesis payload.
    pub(crate) fn genesis(timestamp: DateTime<Utc>) -> Result<Self, HasherError> {
        Self::seal(0, Digest::zero(), timestamp, Payload::genesis())
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind
    }

    pub fn previous_digest(&self) -> Digest {
        self.previous_digest
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.payload.kind == EventKind::Genesis
    }

    /// The row this entry is persisted as.
    pub fn to_mirror_row(&self) -> MirrorRow {
        MirrorRow {
            block_index: self.index as i64,
            timestamp: canonical_timestamp(&self.timestamp),
            data_hash: self
                .payload
                .content_digest
                .map(|d| d.to_hex())
                .unwrap_or_default(),
            prev_hash: self.previous_digest.to_hex(),
            block_hash: self.digest.to_hex(),
            data_type: self.payload.kind.as_str().to_string(),
            record_id: self.payload.record_id,
        }
    }

    /// Rebuild an entry from its stored row.
    ///
    /// The stored `block_hash` is taken as the entry's digest without being
    /// checked; comparing it with [`ChainLink::recompute_digest`] is how
    /// tampering is detected. Columns must be in the exact text form
    /// [`LedgerEntry::to_mirror_row`] writes, since the digest is computed
    /// over re-encoded values and would not see a respelled column.
    pub fn from_mirror_row(row: &MirrorRow) -> Result<Self, RowDefect> {
        let index = u64::try_from(row.block_index)
            .map_err(|_| RowDefect::NegativeIndex(row.block_index))?;
        let timestamp = parse_timestamp(&row.timestamp)
            .map_err(|_| RowDefect::Timestamp(row.timestamp.clone()))?;
        if row.timestamp != canonical_timestamp(&timestamp) {
            return Err(RowDefect::NonCanonical { column: "timestamp" });
        }
        let kind: EventKind = row
            .data_type
            .parse()
            .map_err(|_| RowDefect::UnknownKind(row.data_type.clone()))?;
        let content_digest = if row.data_hash.is_empty() {
            None
        } else {
            Some(stored_digest(&row.data_hash, "data_hash")?)
        };
        let previous_digest = stored_digest(&row.prev_hash, "prev_hash")?;
        let digest = stored_digest(&row.block_hash, "block_hash")?;

        Ok(Self {
            index,
            timestamp,
            payload: Payload {
                kind,
                record_id: row.record_id,
                content_digest,
            },
            previous_digest,
            digest,
        })
    }
}

/// Decode a digest column, accepting only lowercase hex.
fn stored_digest(text: &str, column: &'static str) -> Result<Digest, RowDefect> {
    let digest = Digest::from_hex(text).map_err(|_| RowDefect::MalformedDigest { column })?;
    if digest.to_hex() != text {
        return Err(RowDefect::NonCanonical { column });
    }
    Ok(digest)
}

impl ChainLink for LedgerEntry {
    fn index(&self) -> u64 {
        self.index
    }

    fn digest(&self) -> Digest {
        self.digest
    }

    fn previous_digest(&self) -> Digest {
        self.previous_digest
    }

    fn recompute_digest(&self) -> Result<Digest, HasherError> {
        entry_digest(
            self.index,
            &self.previous_digest,
            &self.timestamp,
            &self.payload,
        )
    }
}

/// Why a stored row cannot be turned back into an entry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RowDefect {
    #[error("negative block index {0}")]
    NegativeIndex(i64),

    #[error("unparseable timestamp {0:?}")]
    Timestamp(String),

    #[error("unknown data_type {0:?}")]
    UnknownKind(String),

    #[error("malformed digest in {column}")]
    MalformedDigest { column: &'static str },

    #[error("{column} is not in canonical form")]
    NonCanonical { column: &'static str },
}
