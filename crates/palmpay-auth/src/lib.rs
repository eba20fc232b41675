//! PalmPay Auth - Authentication decision engine
//!
//! Scans all enrolled templates for the global best match and applies a
//! single acceptance threshold. Every attempt is recorded in an append-only
//! audit log, including capture failures.
//!
//! # Invariants
//!
//! 1. The *global best* match decides, never the first match above threshold
//! 2. Exact score ties resolve to the earliest enrollment (deterministic)
//! 3. One threshold constant; the near-miss band shapes messages only
//! 4. No attempt goes unlogged

pub mod engine;
pub mod store;

pub use engine::{AuthenticationResult, DecisionConfig, DecisionEngine};
pub use store::{AttemptLog, InMemoryAttemptLog, InMemoryTemplateStore, TemplateStore};
