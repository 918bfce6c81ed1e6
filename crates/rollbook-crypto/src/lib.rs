//! Hash commitments for the rollbook ledger.
//!
//! Provides domain-separated SHA-256 hashing, canonical (key-sorted) JSON,
//! and hash chain verification.
//!
//! All crypto operations wrap established libraries; nothing here is a
//! custom primitive.

pub mod canonical;
pub mod chain;
pub mod hasher;

pub use canonical::{to_canonical_json, to_canonical_value};
pub use chain::{ChainError, ChainLink, ChainVerifier};
pub use hasher::{ContentHasher, HasherError};
