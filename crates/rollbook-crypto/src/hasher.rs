use rollbook_types::Digest;
use serde::Serialize;
use sha2::{Digest as _, Sha256};

use crate::canonical::to_canonical_json;

/// Separator between the parts of a multi-part commitment.
///
/// ASCII unit separator; cannot appear in decimal indices, hex digests,
/// RFC 3339 timestamps, or compact JSON (control characters are escaped).
const PART_SEPARATOR: u8 = 0x1f;

/// Domain-separated SHA-256 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a business record and a ledger entry with identical bytes
/// never share a digest.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for ledger entry digests.
    pub const ENTRY: Self = Self {
        domain: "rollbook-entry-v1",
    };
    /// Hasher for business record content digests.
    pub const RECORD: Self = Self {
        domain: "rollbook-record-v1",
    };

    fn start(&self) -> Sha256 {
        let mut hasher = Sha256::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut hasher = self.start();
        hasher.update(data);
        Digest::from_hash(hasher.finalize().into())
    }

    /// Commit to an ordered list of string parts.
    pub fn commit<I, S>(&self, parts: I) -> Digest
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = self.start();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                hasher.update([PART_SEPARATOR]);
            }
            hasher.update(part.as_ref().as_bytes());
        }
        Digest::from_hash(hasher.finalize().into())
    }

    /// Hash a serializable value in canonical JSON form.
    pub fn hash_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<Digest, HasherError> {
        let json = to_canonical_json(value)?;
        Ok(self.hash(json.as_bytes()))
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
