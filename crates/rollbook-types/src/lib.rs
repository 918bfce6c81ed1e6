//! Foundation types for the rollbook integrity ledger.
//!
//! Every other rollbook crate depends on `rollbook-types`.
//!
//! # Key Types
//!
//! - [`Digest`] -- SHA-256 commitment, rendered as 64 hex characters
//! - [`EventKind`] -- the business event a ledger entry records
//! - [`temporal`] -- millisecond-precision UTC timestamps and their canonical string form

pub mod digest;
pub mod error;
pub mod kind;
pub mod temporal;

pub use digest::Digest;
pub use error::TypeError;
pub use kind::EventKind;
pub use temporal::{canonical_timestamp, now_millis, parse_timestamp};
