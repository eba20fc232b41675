//! PalmPay Types - Canonical domain types for palm-authenticated payments
//!
//! This crate contains all foundational types for PalmPay with zero dependencies
//! on other palmpay crates. It defines the complete type system for:
//!
//! - Identity types (UserId, AccountId, TransactionId, etc.)
//! - Fixed-point amount type for ledger balances
//! - Binary descriptor and enrollment template types
//! - Authentication attempt audit types
//! - Ledger transaction types
//!
//! # Architectural Invariants
//!
//! These types support the core PalmPay invariants:
//!
//! 1. No negative balances at any committed state
//! 2. Ledger transactions are append-only, never edited
//! 3. Every authentication attempt is logged, including failures
//! 4. Descriptor sets are immutable once produced

pub mod account;
pub mod amount;
pub mod biometric;
pub mod error;
pub mod identity;
pub mod transaction;

pub use account::*;
pub use amount::*;
pub use biometric::*;
pub use error::*;
pub use identity::*;
pub use transaction::*;

/// Version of the PalmPay types schema
pub const TYPES_VERSION: &str = "0.1.0";
