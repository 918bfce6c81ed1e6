//! HTTP boundary for the rollbook ledger.
//!
//! Business handlers post events to `/v1/events` and get back a receipt
//! whose `blockchainHash` they store alongside the business row. The
//! `/v1/ledger/*` routes expose the chain, the mirror and both kinds of
//! verification.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::RollbookServer;
pub use state::AppState;
