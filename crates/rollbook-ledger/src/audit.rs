//! Diagnostic audit of persisted mirror rows.
//!
//! Unlike [`crate::Ledger::verify`], which stops at the first break, the
//! audit keeps going and collects every issue it finds, so an operator gets
//! the whole picture of a damaged table in one pass.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Display;

use chrono::{DateTime, Utc};
use rollbook_crypto::ChainLink;
use rollbook_store::MirrorRow;
use rollbook_types::{parse_timestamp, Digest, EventKind};
use serde::Serialize;

use crate::entry::LedgerEntry;

/// Summary numbers over the audited rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStatistics {
    pub total_entries: u64,
    pub counts_by_kind: BTreeMap<String, u64>,
    pub first_digest: Option<String>,
    pub last_digest: Option<String>,
}

/// Result of auditing a sequence of mirror rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub valid: bool,
    /// One human-readable line per problem, each prefixed `block <index>:`.
    pub issues: Vec<String>,
    /// Distinct stored indices that have at least one issue.
    pub broken_indices: Vec<i64>,
    /// Anomalies that do not break integrity, such as timestamp regressions.
    pub warnings: Vec<String>,
    pub statistics: AuditStatistics,
}

struct PrevRow {
    index: i64,
    block_hash: String,
    timestamp: Option<DateTime<Utc>>,
}

/// Row-at-a-time auditor.
///
/// Feed rows in `block_index` order with [`MirrorAudit::push`], then call
/// [`MirrorAudit::finish`]. The auditor owns all its state, so a caller may
/// stop feeding rows at any point and simply drop it.
#[derive(Default)]
pub struct MirrorAudit {
    prev: Option<PrevRow>,
    issues: Vec<String>,
    broken: BTreeSet<i64>,
    warnings: Vec<String>,
    stats: AuditStatistics,
    seen_hashes: HashSet<String>,
    seen_prev: HashSet<String>,
}

impl MirrorAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Audit a complete row sequence.
    pub fn audit(rows: &[MirrorRow]) -> AuditReport {
        let mut audit = Self::new();
        for row in rows {
            audit.push(row);
        }
        audit.finish()
    }

    /// Rows pushed so far.
    pub fn rows_checked(&self) -> u64 {
        self.stats.total_entries
    }

    pub fn push(&mut self, row: &MirrorRow) {
        let index = row.block_index;
        self.stats.total_entries += 1;
        *self
            .stats
            .counts_by_kind
            .entry(row.data_type.clone())
            .or_default() += 1;
        if self.stats.first_digest.is_none() {
            self.stats.first_digest = Some(row.block_hash.clone());
        }
        self.stats.last_digest = Some(row.block_hash.clone());

        let timestamp = self.check_own_digest(row);

        match self.prev.take() {
            None => self.check_genesis(row),
            Some(prev) => {
                self.check_sequence(row, &prev);
                if let (Some(before), Some(now)) = (prev.timestamp, timestamp) {
                    if now < before {
                        self.warnings.push(format!(
                            "block {index}: timestamp {} is earlier than block {}",
                            row.timestamp, prev.index
                        ));
                    }
                }
            }
        }

        if !self.seen_hashes.insert(row.block_hash.clone()) {
            self.issue(index, "block_hash already used by an earlier block");
        }

        self.prev = Some(PrevRow {
            index,
            block_hash: row.block_hash.clone(),
            timestamp,
        });
    }

    pub fn finish(self) -> AuditReport {
        let valid = self.issues.is_empty();
        if valid {
            tracing::debug!(rows = self.stats.total_entries, "mirror audit clean");
        } else {
            tracing::warn!(
                rows = self.stats.total_entries,
                issues = self.issues.len(),
                "mirror audit found issues"
            );
        }
        AuditReport {
            valid,
            issues: self.issues,
            broken_indices: self.broken.into_iter().collect(),
            warnings: self.warnings,
            statistics: self.stats,
        }
    }

    /// Recompute the row's digest from its own fields. Returns the parsed
    /// timestamp when there is one.
    fn check_own_digest(&mut self, row: &MirrorRow) -> Option<DateTime<Utc>> {
        let index = row.block_index;
        match LedgerEntry::from_mirror_row(row) {
            Ok(entry) => {
                match entry.recompute_digest() {
                    Ok(computed) if computed == entry.digest() => {}
                    Ok(computed) => self.issue(
                        index,
                        format!(
                            "digest mismatch: stored {}, computed {}",
                            entry.digest().short_hex(),
                            computed.short_hex()
                        ),
                    ),
                    Err(err) => self.issue(index, format!("cannot recompute digest: {err}")),
                }
                Some(entry.timestamp())
            }
            Err(defect) => {
                self.issue(index, defect);
                parse_timestamp(&row.timestamp).ok()
            }
        }
    }

    fn check_genesis(&mut self, row: &MirrorRow) {
        let index = row.block_index;
        if index != 0 {
            self.issue(index, "first row is not at index 0");
        }
        if row.data_type != EventKind::Genesis.as_str() {
            self.issue(index, "first row is not a genesis entry");
        }
        if row.prev_hash != Digest::zero().to_hex() {
            self.issue(index, "genesis predecessor is not the zero sentinel");
        }
        self.seen_prev.insert(row.prev_hash.clone());
    }

    fn check_sequence(&mut self, row: &MirrorRow, prev: &PrevRow) {
        let index = row.block_index;
        let expected = prev.index.saturating_add(1);
        if index == prev.index {
            self.issue(index, "duplicate index (concurrent append)");
        } else if index != expected {
            self.issue(index, format!("index gap: expected {expected}"));
        }
        if row.prev_hash != prev.block_hash {
            self.issue(
                index,
                format!(
                    "broken link: prev_hash does not match block_hash of block {}",
                    prev.index
                ),
            );
        }
        if row.data_type == EventKind::Genesis.as_str() {
            self.issue(index, "second genesis entry");
        }
        if !self.seen_prev.insert(row.prev_hash.clone()) {
            self.issue(
                index,
                "prev_hash already used by an earlier block (concurrent append)",
            );
        }
    }

    fn issue(&mut self, index: i64, message: impl Display) {
        self.issues.push(format!("block {index}: {message}"));
        self.broken.insert(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Payload;
    use crate::ledger::Ledger;

    async fn rows(events: i64) -> Vec<MirrorRow> {
        let ledger = Ledger::new().unwrap();
        for id in 1..=events {
            let kind = if id % 2 == 0 {
                EventKind::FeePayment
            } else {
                EventKind::Admission
            };
            ledger
                .append(Payload::event(
                    kind,
                    id,
                    Digest::of_bytes(format!("record-{id}").as_bytes()),
                ))
                .await
                .unwrap();
        }
        ledger
            .snapshot()
            .await
            .iter()
            .map(LedgerEntry::to_mirror_row)
            .collect()
    }

    fn flip_hex_char(s: &str) -> String {
        let mut chars: Vec<char> = s.chars().collect();
        chars[5] = if chars[5] == 'a' { 'b' } else { 'a' };
        chars.into_iter().collect()
    }

    fn names_block(report: &AuditReport, index: i64) -> bool {
        report
            .issues
            .iter()
            .any(|i| i.starts_with(&format!("block {index}:")))
    }

    #[test]
    fn empty_mirror_is_valid() {
        let report = MirrorAudit::audit(&[]);
        assert!(report.valid);
        assert!(report.issues.is_empty());
        assert_eq!(report.statistics.total_entries, 0);
        assert_eq!(report.statistics.first_digest, None);
    }

    #[tokio::test]
    async fn intact_mirror_is_valid_with_statistics() {
        let rows = rows(4).await;
        let report = MirrorAudit::audit(&rows);
        assert!(report.valid, "{:?}", report.issues);
        assert_eq!(report.statistics.total_entries, 5);
        assert_eq!(report.statistics.counts_by_kind["genesis"], 1);
        assert_eq!(report.statistics.counts_by_kind["admission"], 2);
        assert_eq!(report.statistics.counts_by_kind["fee_payment"], 2);
        assert_eq!(
            report.statistics.first_digest.as_deref(),
            Some(rows[0].block_hash.as_str())
        );
        assert_eq!(
            report.statistics.last_digest.as_deref(),
            Some(rows[4].block_hash.as_str())
        );
    }

    #[tokio::test]
    async fn three_rows_with_foreign_prev_hash() {
        let mut rows = rows(2).await;
        rows[2].prev_hash = Digest::of_bytes(b"elsewhere").to_hex();
        let report = MirrorAudit::audit(&rows);
        assert!(!report.valid);
        assert!(names_block(&report, 2));
        assert_eq!(report.statistics.total_entries, 3);
        assert!(report
            .issues
            .iter()
            .any(|i| i.contains("broken link")));
    }

    #[tokio::test]
    async fn any_single_field_mutation_is_caught_at_that_index() {
        let original = rows(4).await;
        let mutations: Vec<(&str, Box<dyn Fn(&mut MirrorRow)>)> = vec![
            ("data_hash", Box::new(|r: &mut MirrorRow| r.data_hash = flip_hex_char(&r.data_hash))),
            ("prev_hash", Box::new(|r: &mut MirrorRow| r.prev_hash = flip_hex_char(&r.prev_hash))),
            ("block_hash", Box::new(|r: &mut MirrorRow| r.block_hash = flip_hex_char(&r.block_hash))),
            ("timestamp", Box::new(|r: &mut MirrorRow| r.timestamp = "2001-01-01T00:00:00.000Z".into())),
            ("data_type", Box::new(|r: &mut MirrorRow| r.data_type = "hostel_allocation".into())),
            ("record_id", Box::new(|r: &mut MirrorRow| r.record_id = r.record_id.map(|id| id + 1))),
            ("data_hash case", Box::new(|r: &mut MirrorRow| r.data_hash = r.data_hash.to_uppercase())),
            ("block_hash case", Box::new(|r: &mut MirrorRow| r.block_hash = r.block_hash.to_uppercase())),
            ("timestamp offset", Box::new(|r: &mut MirrorRow| r.timestamp = r.timestamp.replace('Z', "+00:00"))),
            ("timestamp precision", Box::new(|r: &mut MirrorRow| r.timestamp = r.timestamp.replace('Z', "9Z"))),
        ];

        for target in 1..original.len() {
            for (field, mutate) in &mutations {
                let mut rows = original.clone();
                mutate(&mut rows[target]);
                let report = MirrorAudit::audit(&rows);
                assert!(!report.valid, "{field} on row {target} went unnoticed");
                assert!(
                    names_block(&report, target as i64),
                    "{field} on row {target}: {:?}",
                    report.issues
                );
            }
        }
    }

    #[tokio::test]
    async fn non_hex_data_hash_is_reported_not_fatal() {
        let mut rows = rows(3).await;
        rows[2].data_hash = "not-a-digest".into();
        let report = MirrorAudit::audit(&rows);
        assert!(!report.valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.starts_with("block 2:") && i.contains("malformed digest in data_hash")));
        assert_eq!(report.statistics.total_entries, 4);
    }

    #[tokio::test]
    async fn swapped_rows_break_linkage_at_boundary() {
        let mut rows = rows(3).await;
        rows.swap(1, 2);
        let report = MirrorAudit::audit(&rows);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.starts_with("block 2:")
            && i.contains("broken link")
            && i.contains("block 0")));
    }

    #[tokio::test]
    async fn all_issues_collected_not_just_first() {
        let mut rows = rows(5).await;
        rows[1].record_id = Some(900);
        rows[4].data_hash = flip_hex_char(&rows[4].data_hash);
        let report = MirrorAudit::audit(&rows);
        assert_eq!(report.broken_indices, vec![1, 4]);
    }

    #[tokio::test]
    async fn missing_row_is_an_index_gap() {
        let mut rows = rows(4).await;
        rows.remove(2);
        let report = MirrorAudit::audit(&rows);
        assert!(report
            .issues
            .iter()
            .any(|i| i.starts_with("block 3:") && i.contains("index gap: expected 2")));
    }

    #[tokio::test]
    async fn duplicated_tail_flags_concurrent_append() {
        let mut rows = rows(2).await;
        let mut forked = rows[2].clone();
        forked.record_id = Some(77);
        forked.block_hash = Digest::of_bytes(b"fork").to_hex();
        rows.push(forked);
        let report = MirrorAudit::audit(&rows);
        assert!(report
            .issues
            .iter()
            .any(|i| i.contains("concurrent append")));
    }

    #[tokio::test]
    async fn missing_genesis_is_reported() {
        let rows = rows(3).await;
        let report = MirrorAudit::audit(&rows[1..]);
        assert!(!report.valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.contains("first row is not at index 0")));
    }

    #[tokio::test]
    async fn timestamp_regression_is_a_warning_only() {
        let rows = rows(2).await;
        // Rebuild the chain by hand with a regressing, correctly sealed timestamp.
        let genesis = LedgerEntry::from_mirror_row(&rows[0]).unwrap();
        let earlier = genesis.timestamp() - chrono::Duration::seconds(60);
        let e1 = LedgerEntry::seal(
            1,
            genesis.digest(),
            earlier,
            Payload::event(EventKind::Admission, 1, Digest::of_bytes(b"x")),
        )
        .unwrap();
        let report = MirrorAudit::audit(&[rows[0].clone(), e1.to_mirror_row()]);
        assert!(report.valid, "{:?}", report.issues);
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn stopping_early_still_yields_a_report() {
        let rows = rows(5).await;
        let mut audit = MirrorAudit::new();
        for row in rows.iter().take(2) {
            audit.push(row);
        }
        assert_eq!(audit.rows_checked(), 2);
        let report = audit.finish();
        assert!(report.valid);
        assert_eq!(report.statistics.total_entries, 2);
    }
}
