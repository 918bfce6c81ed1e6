//! Hash-chained integrity ledger for student records.
//!
//! Every business event (an admission, a fee payment, a hostel allocation)
//! is committed as a [`LedgerEntry`] whose digest covers its index, its
//! predecessor's digest, its timestamp and a [`Payload`] naming the event
//! kind, the business record id and a digest of the record's snapshot.
//! Editing any persisted entry, or reordering entries, breaks the chain at
//! that point.
//!
//! # Layers
//!
//! - [`Ledger`] -- the in-process chain. One write lock serializes appends.
//! - [`MirrorAudit`] -- diagnostic, collect-everything audit of mirror rows.
//! - [`EventRecorder`] -- what business handlers call; appends durably and
//!   hands back an [`EventReceipt`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rollbook_ledger::{BusinessEvent, EventRecorder};
//! use rollbook_store::InMemoryMirror;
//!
//! # async fn demo(event: BusinessEvent) -> rollbook_ledger::LedgerResult<()> {
//! let recorder = EventRecorder::open(Arc::new(InMemoryMirror::new())).await?;
//! let receipt = recorder.record(&event).await?;
//! println!("recorded as {}", receipt.digest);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod recorder;
pub mod records;

pub use audit::{AuditReport, AuditStatistics, MirrorAudit};
pub use entry::{entry_digest, LedgerEntry, Payload, RowDefect};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{Ledger, Verification};
pub use recorder::{EventReceipt, EventRecorder, RecordVerification};
pub use records::{
    AdmissionRecord, BusinessEvent, FeePaymentRecord, HostelAllocationRecord,
    HostelDeallocationRecord,
};

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;
    use rollbook_types::{Digest, EventKind};

    use super::*;

    fn business_kind() -> impl Strategy<Value = EventKind> {
        prop::sample::select(
            EventKind::ALL
                .into_iter()
                .filter(EventKind::is_business)
                .collect::<Vec<_>>(),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_append_sequence_verifies(
            events in prop::collection::vec((business_kind(), 1i64..10_000, any::<[u8; 8]>()), 0..40)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let ledger = Ledger::new().unwrap();
                for (kind, id, body) in &events {
                    ledger
                        .append(Payload::event(*kind, *id, Digest::of_bytes(body)))
                        .await
                        .unwrap();
                }
                let snap = ledger.snapshot().await;
                prop_assert_eq!(snap.len(), events.len() + 1);
                prop_assert!(snap[0].previous_digest().is_zero());
                for (i, entry) in snap.iter().enumerate() {
                    prop_assert_eq!(entry.index(), i as u64);
                }
                prop_assert!(ledger.verify().await.valid);

                let rows: Vec<_> = snap.iter().map(LedgerEntry::to_mirror_row).collect();
                let report = MirrorAudit::audit(&rows);
                prop_assert!(report.valid);
                prop_assert_eq!(report.statistics.total_entries, events.len() as u64 + 1);
                Ok(())
            })?;
        }
    }
}
