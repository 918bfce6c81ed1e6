use std::sync::Arc;

use chrono::{DateTime, Utc};
use rollbook_crypto::ChainLink;
use rollbook_store::{LedgerMirror, MirrorRow};
use rollbook_types::{Digest, EventKind};
use serde::Serialize;

use crate::audit::{AuditReport, MirrorAudit};
use crate::entry::LedgerEntry;
use crate::error::LedgerResult;
use crate::ledger::Ledger;
use crate::records::BusinessEvent;

/// Tamper-evident reference handed back to the caller of a business write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReceipt {
    pub index: u64,
    #[serde(rename = "blockchainHash")]
    pub digest: Digest,
    #[serde(rename = "previousHash")]
    pub previous_digest: Digest,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub record_id: i64,
    pub content_digest: Digest,
}

impl EventReceipt {
    fn from_entry(entry: &LedgerEntry, record_id: i64, content_digest: Digest) -> Self {
        Self {
            index: entry.index(),
            digest: entry.digest(),
            previous_digest: entry.previous_digest(),
            timestamp: entry.timestamp(),
            kind: entry.kind(),
            record_id,
            content_digest,
        }
    }
}

/// Whether a business record still matches what the ledger committed to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordVerification {
    pub matches: bool,
    /// The content digest stored in the mirror row.
    pub expected_digest: String,
    /// The content digest of the record as it is now.
    pub actual_digest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Bridges business writes and the ledger.
///
/// Every recorded event is appended durably: the mirror row is written under
/// the ledger's write lock before the in-memory chain moves, so a receipt is
/// only ever returned for an event that is both chained and persisted.
#[derive(Clone)]
pub struct EventRecorder {
    ledger: Arc<Ledger>,
    mirror: Arc<dyn LedgerMirror>,
}

impl EventRecorder {
    pub fn new(ledger: Arc<Ledger>, mirror: Arc<dyn LedgerMirror>) -> Self {
        Self { ledger, mirror }
    }

    /// Rebuild the ledger from `mirror` and wrap both.
    pub async fn open(mirror: Arc<dyn LedgerMirror>) -> LedgerResult<Self> {
        let ledger = Ledger::open(mirror.as_ref()).await?;
        Ok(Self::new(Arc::new(ledger), mirror))
    }

    /// Commit one business event.
    ///
    /// On error nothing was recorded, and the caller must roll back the
    /// business write that triggered it.
    pub async fn record(&self, event: &BusinessEvent) -> LedgerResult<EventReceipt> {
        let payload = event.payload()?;
        let record_id = event.record_id();
        let content_digest = event.content_digest()?;
        let entry = self
            .ledger
            .append_durable(payload, self.mirror.as_ref())
            .await?;
        Ok(EventReceipt::from_entry(&entry, record_id, content_digest))
    }

    /// Audit every persisted row.
    pub async fn audit(&self) -> LedgerResult<AuditReport> {
        let rows = self.mirror.all().await?;
        Ok(MirrorAudit::audit(&rows))
    }

    /// Check `event`, freshly read from business storage, against the mirror
    /// row that claims to commit to it.
    pub fn verify_record(
        event: &BusinessEvent,
        row: &MirrorRow,
    ) -> LedgerResult<RecordVerification> {
        let actual = event.content_digest()?.to_hex();
        let reason = if row.data_type != event.kind().as_str() {
            Some(format!(
                "block {} records a {} event, not {}",
                row.block_index,
                row.data_type,
                event.kind()
            ))
        } else if row.record_id != Some(event.record_id()) {
            Some(format!(
                "block {} belongs to a different record",
                row.block_index
            ))
        } else if row.data_hash != actual {
            Some("record content differs from what was committed".to_string())
        } else if !row_is_sealed(row) {
            Some(format!(
                "block {} no longer matches its own digest",
                row.block_index
            ))
        } else {
            None
        };

        Ok(RecordVerification {
            matches: reason.is_none(),
            expected_digest: row.data_hash.clone(),
            actual_digest: actual,
            reason,
        })
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn mirror(&self) -> &Arc<dyn LedgerMirror> {
        &self.mirror
    }
}

fn row_is_sealed(row: &MirrorRow) -> bool {
    LedgerEntry::from_mirror_row(row)
        .ok()
        .and_then(|entry| {
            let computed = entry.recompute_digest().ok()?;
            Some(computed == entry.digest())
        })
        .unwrap_or(false)
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder")
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}
