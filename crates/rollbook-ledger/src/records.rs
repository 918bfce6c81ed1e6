//! Business record snapshots.
//!
//! Each event kind commits to a fixed set of fields. Columns that the ledger
//! itself writes back into a business row (`blockchain_hash`) and storage
//! bookkeeping (`created_at`, `updated_at`) are not part of any snapshot, so
//! decoding a freshly fetched row simply drops them.

use rollbook_crypto::ContentHasher;
use rollbook_types::{Digest, EventKind};
use serde::{Deserialize, Serialize};

use crate::entry::Payload;
use crate::error::{LedgerError, LedgerResult};

/// A student row, committed on admission and on every update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub course: String,
    pub dob: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeePaymentRecord {
    pub id: i64,
    pub student_id: i64,
    pub amount: f64,
    pub payment_date: String,
    pub status: String,
    pub transaction_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostelAllocationRecord {
    pub id: i64,
    pub student_id: i64,
    pub room_no: String,
    pub allocated_at: String,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostelDeallocationRecord {
    pub id: i64,
    pub student_id: i64,
    pub room_no: String,
    pub deallocated_at: String,
    pub status: String,
}

/// One business event together with the snapshot it commits to.
///
/// On the wire this is `{"kind": "<event kind>", "record": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum BusinessEvent {
    Admission(AdmissionRecord),
    AdmissionUpdate(AdmissionRecord),
    FeePayment(FeePaymentRecord),
    HostelAllocation(HostelAllocationRecord),
    HostelDeallocation(HostelDeallocationRecord),
}

impl BusinessEvent {
    /// Decode a snapshot of the given kind from a loosely typed row.
    pub fn from_parts(kind: EventKind, record: serde_json::Value) -> LedgerResult<Self> {
        let decoded = match kind {
            EventKind::Genesis => return Err(LedgerError::GenesisReserved),
            EventKind::Admission => serde_json::from_value(record).map(Self::Admission),
            EventKind::AdmissionUpdate => {
                serde_json::from_value(record).map(Self::AdmissionUpdate)
            }
            EventKind::FeePayment => serde_json::from_value(record).map(Self::FeePayment),
            EventKind::HostelAllocation => {
                serde_json::from_value(record).map(Self::HostelAllocation)
            }
            EventKind::HostelDeallocation => {
                serde_json::from_value(record).map(Self::HostelDeallocation)
            }
        };
        decoded.map_err(|e| LedgerError::InvalidEvent(format!("{kind} record: {e}")))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Admission(_) => EventKind::Admission,
            Self::AdmissionUpdate(_) => EventKind::AdmissionUpdate,
            Self::FeePayment(_) => EventKind::FeePayment,
            Self::HostelAllocation(_) => EventKind::HostelAllocation,
            Self::HostelDeallocation(_) => EventKind::HostelDeallocation,
        }
    }

    pub fn record_id(&self) -> i64 {
        match self {
            Self::Admission(r) | Self::AdmissionUpdate(r) => r.id,
            Self::FeePayment(r) => r.id,
            Self::HostelAllocation(r) => r.id,
            Self::HostelDeallocation(r) => r.id,
        }
    }

    /// Digest of the canonical JSON form of the snapshot alone.
    pub fn content_digest(&self) -> LedgerResult<Digest> {
        let digest = match self {
            Self::Admission(r) | Self::AdmissionUpdate(r) => ContentHasher::RECORD.hash_json(r),
            Self::FeePayment(r) => ContentHasher::RECORD.hash_json(r),
            Self::HostelAllocation(r) => ContentHasher::RECORD.hash_json(r),
            Self::HostelDeallocation(r) => ContentHasher::RECORD.hash_json(r),
        }?;
        Ok(digest)
    }

    /// The ledger payload committing to this event.
    pub fn payload(&self) -> LedgerResult<Payload> {
        Ok(Payload::event(
            self.kind(),
            self.record_id(),
            self.content_digest()?,
        ))
    }
}
