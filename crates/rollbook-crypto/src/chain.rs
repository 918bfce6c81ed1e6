use rollbook_types::Digest;

use crate::hasher::HasherError;

/// Trait for records that participate in a hash chain.
pub trait ChainLink {
    /// Position in the chain; genesis is 0.
    fn index(&self) -> u64;
    /// The record's stored digest.
    fn digest(&self) -> Digest;
    /// The stored digest of the predecessor (zero for genesis).
    fn previous_digest(&self) -> Digest;
    /// Recompute the digest from the record's committed fields.
    fn recompute_digest(&self) -> Result<Digest, HasherError>;
}

impl<L: ChainLink + ?Sized> ChainLink for &L {
    fn index(&self) -> u64 {
        (**self).index()
    }
    fn digest(&self) -> Digest {
        (**self).digest()
    }
    fn previous_digest(&self) -> Digest {
        (**self).previous_digest()
    }
    fn recompute_digest(&self) -> Result<Digest, HasherError> {
        (**self).recompute_digest()
    }
}

/// Hash chain integrity verifier.
///
/// Checks each adjacent pair for, in reporting order:
/// 1. the stored digest matches the recomputed one
/// 2. the index is exactly one past the predecessor's
/// 3. the predecessor digest matches the predecessor's stored digest
///
/// Stops at the first failure.
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify a whole chain. The first link must be anchored (index 0, zero
    /// predecessor) and carry its own recomputed digest.
    pub fn verify_chain<L: ChainLink>(links: &[L]) -> Result<(), ChainError> {
        let Some(first) = links.first() else {
            return Ok(());
        };
        if first.index() != 0 || !first.previous_digest().is_zero() {
            return Err(ChainError::UnanchoredGenesis);
        }
        Self::check_own_digest(first)?;
        Self::verify_from(links, 0)
    }

    /// Verify every link after position `start`, treating `links[start]` as
    /// known good.
    pub fn verify_from<L: ChainLink>(links: &[L], start: usize) -> Result<(), ChainError> {
        for i in start.saturating_add(1)..links.len() {
            Self::check_pair(&links[i - 1], &links[i])?;
        }
        Ok(())
    }

    fn check_own_digest<L: ChainLink>(link: &L) -> Result<(), ChainError> {
        let index = link.index();
        let computed = link
            .recompute_digest()
            .map_err(|e| ChainError::Unhashable {
                index,
                reason: e.to_string(),
            })?;
        if computed != link.digest() {
            return Err(ChainError::HashMismatch { index });
        }
        Ok(())
    }

    fn check_pair<L: ChainLink>(prev: &L, current: &L) -> Result<(), ChainError> {
        Self::check_own_digest(current)?;
        let index = current.index();
        let expected = prev.index() + 1;
        if index != expected {
            return Err(ChainError::IndexGap { index, expected });
        }
        if current.previous_digest() != prev.digest() {
            return Err(ChainError::BrokenLink { index });
        }
        Ok(())
    }
}

/// Errors from chain verification.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("first entry is not a genesis entry (index 0, zero predecessor)")]
    UnanchoredGenesis,

    #[error("hash mismatch at index {index}: computed digest differs from stored")]
    HashMismatch { index: u64 },

    #[error("index gap at {index}: expected {expected}")]
    IndexGap { index: u64, expected: u64 },

    #[error("broken link at index {index}: previous digest does not match predecessor")]
    BrokenLink { index: u64 },

    #[error("entry at index {index} cannot be hashed: {reason}")]
    Unhashable { index: u64, reason: String },
}

impl ChainError {
    /// Index the error was detected at. Genesis problems report 0.
    pub fn index(&self) -> u64 {
        match self {
            Self::UnanchoredGenesis => 0,
            Self::HashMismatch { index }
            | Self::IndexGap { index, .. }
            | Self::BrokenLink { index }
            | Self::Unhashable { index, .. } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::ContentHasher;

    #[derive(Clone)]
    struct TestLink {
        index: u64,
        prev: Digest,
        body: String,
        digest: Digest,
    }

    impl TestLink {
        fn compute(index: u64, prev: &Digest, body: &str) -> Digest {
            ContentHasher::ENTRY.commit([index.to_string(), prev.to_hex(), body.to_string()])
        }
    }

    impl ChainLink for TestLink {
        fn index(&self) -> u64 {
            self.index
        }
        fn digest(&self) -> Digest {
            self.digest
        }
        fn previous_digest(&self) -> Digest {
            self.prev
        }
        fn recompute_digest(&self) -> Result<Digest, HasherError> {
            Ok(Self::compute(self.index, &self.prev, &self.body))
        }
    }

    fn build_chain(count: u64) -> Vec<TestLink> {
        let mut chain = Vec::new();
        let mut prev = Digest::zero();
        for i in 0..count {
            let body = format!("event-{i}");
            let digest = TestLink::compute(i, &prev, &body);
            chain.push(TestLink {
                index: i,
                prev,
                body,
                digest,
            });
            prev = digest;
        }
        chain
    }

    #[test]
    fn empty_chain_is_valid() {
        let chain: Vec<TestLink> = vec![];
        assert!(ChainVerifier::verify_chain(&chain).is_ok());
    }

    #[test]
    fn genesis_only_is_valid() {
        assert!(ChainVerifier::verify_chain(&build_chain(1)).is_ok());
    }

    #[test]
    fn long_chain_is_valid() {
        assert!(ChainVerifier::verify_chain(&build_chain(20)).is_ok());
    }

    #[test]
    fn genesis_with_predecessor_fails() {
        let mut chain = build_chain(2);
        chain[0].prev = Digest::of_bytes(b"elsewhere");
        assert_eq!(
            ChainVerifier::verify_chain(&chain),
            Err(ChainError::UnanchoredGenesis)
        );
    }

    #[test]
    fn tampered_genesis_body_is_hash_mismatch() {
        let mut chain = build_chain(3);
        chain[0].body = "rewritten".into();
        assert_eq!(
            ChainVerifier::verify_chain(&chain),
            Err(ChainError::HashMismatch { index: 0 })
        );
    }

    #[test]
    fn tampered_body_is_hash_mismatch() {
        let mut chain = build_chain(4);
        chain[2].body = "tampered".into();
        assert_eq!(
            ChainVerifier::verify_chain(&chain),
            Err(ChainError::HashMismatch { index: 2 })
        );
    }

    #[test]
    fn wrong_predecessor_is_broken_link() {
        let mut chain = build_chain(4);
        // Re-seal entry 3 over a foreign predecessor so only the link is wrong.
        let bad_prev = Digest::of_bytes(b"foreign");
        chain[3].prev = bad_prev;
        chain[3].digest = TestLink::compute(3, &bad_prev, &chain[3].body);
        assert_eq!(
            ChainVerifier::verify_chain(&chain),
            Err(ChainError::BrokenLink { index: 3 })
        );
    }

    #[test]
    fn skipped_index_is_gap() {
        let mut chain = build_chain(3);
        chain[2].index = 5;
        chain[2].digest = TestLink::compute(5, &chain[2].prev, &chain[2].body);
        assert_eq!(
            ChainVerifier::verify_chain(&chain),
            Err(ChainError::IndexGap {
                index: 5,
                expected: 2
            })
        );
    }

    #[test]
    fn digest_mismatch_reported_before_link() {
        let mut chain = build_chain(3);
        chain[1].prev = Digest::of_bytes(b"foreign");
        assert_eq!(
            ChainVerifier::verify_chain(&chain),
            Err(ChainError::HashMismatch { index: 1 })
        );
    }

    #[test]
    fn verify_from_skips_known_good_prefix() {
        let mut chain = build_chain(6);
        chain[1].body = "tampered".into();
        assert!(ChainVerifier::verify_chain(&chain).is_err());
        assert!(ChainVerifier::verify_from(&chain, 2).is_ok());
    }

    #[test]
    fn error_index_accessor() {
        assert_eq!(ChainError::BrokenLink { index: 9 }.index(), 9);
        assert_eq!(ChainError::UnanchoredGenesis.index(), 0);
    }
}
