//! Durable mirror for the rollbook ledger.
//!
//! Every ledger entry is persisted as one row of the `blocks` table. The
//! mirror is the sole durable source of truth: a process rebuilds its
//! in-memory ledger from it at startup, and the integrity endpoint audits
//! it row by row.
//!
//! # Backends
//!
//! All backends implement the [`LedgerMirror`] trait:
//!
//! - [`InMemoryMirror`] -- `BTreeMap`-based mirror for tests and embedding
//! - [`SqliteMirror`] -- sqlx/SQLite table (feature `sqlite`, on by default)
//!
//! # Design Rules
//!
//! 1. Rows are append-only; the trait has no update or delete.
//! 2. `block_index` and `block_hash` are unique.
//! 3. Rows are returned exactly as stored, corrupted or not.
//! 4. All backend errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod row;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryMirror;
pub use row::MirrorRow;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteMirror;
pub use traits::LedgerMirror;
