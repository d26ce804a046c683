//! Parimutuel fixture betting ledger.
//!
//! Participants stake on one of three outcomes of a scheduled fixture; once
//! the fixture resolves, winners split the pool (minus a fee) pro rata to
//! their stake. The ledger is backed by an LMDB environment and every
//! mutating operation runs inside a single write transaction, so a failed
//! call leaves no partial state behind.

pub mod math;
pub mod state;
pub mod types;

pub use state::{AccessGate, ConfigGate, State, TransferError, ValueTransfer};
