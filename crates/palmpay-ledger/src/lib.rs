//! PalmPay Ledger - Atomic balance movements
//!
//! The ledger is:
//! - Account-keyed by AccountId, one balance per account
//! - Journaled (every movement appends an immutable transaction row)
//! - Serialized (all mutations go through one store lock)
//!
//! # Invariants
//!
//! 1. No negative balances at any committed state
//! 2. Transactions are append-only; a reversal is a new row
//! 3. Every failure path leaves the account store exactly as it was
//! 4. Journal rows persist before balances change, so a storage failure
//!    rolls the whole operation back

pub mod ledger;
pub mod store;

pub use ledger::Ledger;
pub use store::{InMemoryLedgerStore, LedgerStore};
