use std::iter;

use rollbook_crypto::{ChainError, ChainVerifier};
use rollbook_store::LedgerMirror;
use rollbook_types::{now_millis, Digest, EventKind};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::audit::MirrorAudit;
use crate::entry::{LedgerEntry, Payload};
use crate::error::{LedgerError, LedgerResult};

/// Outcome of an in-memory structural check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub valid: bool,
    pub broken_at: Option<u64>,
    pub reason: Option<String>,
}

impl Verification {
    fn from_result(result: Result<(), ChainError>) -> Self {
        match result {
            Ok(()) => Self {
                valid: true,
                broken_at: None,
                reason: None,
            },
            Err(err) => Self {
                valid: false,
                broken_at: Some(err.index()),
                reason: Some(err.to_string()),
            },
        }
    }
}

/// Genesis plus everything appended after it. Never empty.
struct Chain {
    genesis: LedgerEntry,
    rest: Vec<LedgerEntry>,
}

impl Chain {
    fn tail(&self) -> &LedgerEntry {
        self.rest.last().unwrap_or(&self.genesis)
    }

    fn len(&self) -> usize {
        self.rest.len() + 1
    }

    fn iter(&self) -> impl DoubleEndedIterator<Item = &LedgerEntry> {
        iter::once(&self.genesis).chain(self.rest.iter())
    }

    fn get(&self, index: u64) -> Option<&LedgerEntry> {
        match index {
            0 => Some(&self.genesis),
            i => self.rest.get(usize::try_from(i - 1).ok()?),
        }
    }

    /// Compute the entry that would follow the current tail.
    fn next_entry(&self, payload: Payload) -> LedgerResult<LedgerEntry> {
        if payload.kind == EventKind::Genesis {
            return Err(LedgerError::GenesisReserved);
        }
        let tail = self.tail();
        // Clock steps backwards must not make timestamps regress.
        let timestamp = now_millis().max(tail.timestamp);
        Ok(LedgerEntry::seal(
            tail.index + 1,
            tail.digest,
            timestamp,
            payload,
        )?)
    }
}

/// The in-process hash-chained ledger.
///
/// All appends go through one write lock, so reading the tail, sealing the
/// next entry and pushing it happen as one step. Verification and queries
/// take the read lock and therefore see either the state before an append or
/// the state after it.
pub struct Ledger {
    chain: RwLock<Chain>,
}

impl Ledger {
    /// A fresh ledger holding only a genesis entry stamped now.
    pub fn new() -> LedgerResult<Self> {
        let genesis = LedgerEntry::genesis(now_millis())?;
        Ok(Self::from_chain(genesis, Vec::new()))
    }

    fn from_chain(genesis: LedgerEntry, rest: Vec<LedgerEntry>) -> Self {
        Self {
            chain: RwLock::new(Chain { genesis, rest }),
        }
    }

    /// Rebuild the ledger from its durable mirror.
    ///
    /// An empty mirror gets a new genesis entry, written before this returns.
    /// A non-empty mirror must pass a full audit; its genesis is reused, never
    /// recreated.
    pub async fn open(mirror: &dyn LedgerMirror) -> LedgerResult<Self> {
        let rows = mirror.all().await?;
        if rows.is_empty() {
            let ledger = Self::new()?;
            let genesis = ledger.genesis().await;
            mirror.insert(&genesis.to_mirror_row()).await?;
            tracing::info!(digest = %genesis.digest().short_hex(), "created genesis entry");
            return Ok(ledger);
        }

        let report = MirrorAudit::audit(&rows);
        if !report.valid {
            tracing::warn!(
                issues = report.issues.len(),
                "refusing to open ledger over corrupt mirror"
            );
            return Err(LedgerError::CorruptMirror {
                issues: report.issues,
            });
        }

        let mut entries = rows
            .iter()
            .map(LedgerEntry::from_mirror_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| LedgerError::CorruptMirror {
                issues: vec![e.to_string()],
            })?
            .into_iter();
        let genesis = entries.next().ok_or_else(|| LedgerError::CorruptMirror {
            issues: vec!["mirror has no genesis row".into()],
        })?;
        let rest: Vec<LedgerEntry> = entries.collect();
        tracing::info!(entries = rest.len() + 1, "rebuilt ledger from mirror");
        Ok(Self::from_chain(genesis, rest))
    }

    /// Append a payload to the in-memory chain.
    ///
    /// Persisting the returned entry is the caller's job; prefer
    /// [`Ledger::append_durable`] when a mirror is available.
    pub async fn append(&self, payload: Payload) -> LedgerResult<LedgerEntry> {
        let mut chain = self.chain.write().await;
        let entry = chain.next_entry(payload)?;
        chain.rest.push(entry.clone());
        tracing::debug!(index = entry.index, kind = %entry.kind(), "appended entry");
        Ok(entry)
    }

    /// Append a payload, writing its mirror row before the in-memory chain
    /// advances.
    ///
    /// If the mirror write fails the in-memory ledger is left untouched and
    /// the error is returned; the event was not recorded.
    pub async fn append_durable(
        &self,
        payload: Payload,
        mirror: &dyn LedgerMirror,
    ) -> LedgerResult<LedgerEntry> {
        let mut chain = self.chain.write().await;
        let entry = chain.next_entry(payload)?;
        if let Err(err) = mirror.insert(&entry.to_mirror_row()).await {
            tracing::error!(index = entry.index, error = %err, "mirror write failed");
            return Err(err.into());
        }
        chain.rest.push(entry.clone());
        tracing::info!(
            index = entry.index,
            kind = %entry.kind(),
            digest = %entry.digest.short_hex(),
            "recorded entry"
        );
        Ok(entry)
    }

    /// Check every link of the chain, stopping at the first break.
    pub async fn verify(&self) -> Verification {
        let chain = self.chain.read().await;
        let links: Vec<&LedgerEntry> = chain.iter().collect();
        Verification::from_result(ChainVerifier::verify_chain(&links))
    }

    /// Check only the links after `checkpoint`, an index already known good.
    pub async fn verify_from(&self, checkpoint: u64) -> Verification {
        let chain = self.chain.read().await;
        let links: Vec<&LedgerEntry> = chain.iter().collect();
        let start = usize::try_from(checkpoint).unwrap_or(usize::MAX);
        Verification::from_result(ChainVerifier::verify_from(&links, start))
    }

    pub async fn genesis(&self) -> LedgerEntry {
        self.chain.read().await.genesis.clone()
    }

    pub async fn tail(&self) -> LedgerEntry {
        self.chain.read().await.tail().clone()
    }

    /// Number of entries, genesis included.
    pub async fn len(&self) -> usize {
        self.chain.read().await.len()
    }

    pub async fn get(&self, index: u64) -> Option<LedgerEntry> {
        self.chain.read().await.get(index).cloned()
    }

    pub async fn find_by_digest(&self, digest: &Digest) -> Option<LedgerEntry> {
        self.chain
            .read()
            .await
            .iter()
            .find(|e| e.digest == *digest)
            .cloned()
    }

    pub async fn by_kind(&self, kind: EventKind) -> Vec<LedgerEntry> {
        self.chain
            .read()
            .await
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    /// The newest `n` entries, oldest first.
    pub async fn last_n(&self, n: usize) -> Vec<LedgerEntry> {
        let chain = self.chain.read().await;
        let mut tail: Vec<LedgerEntry> = chain.iter().rev().take(n).cloned().collect();
        tail.reverse();
        tail
    }

    /// A copy of the whole chain.
    pub async fn snapshot(&self) -> Vec<LedgerEntry> {
        self.chain.read().await.iter().cloned().collect()
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.chain.try_read().map(|c| c.len()).ok();
        f.debug_struct("Ledger").field("entries", &len).finish()
    }
}
