//! Amount type for ledger balances
//!
//! PalmPay uses fixed-point arithmetic with i64 minor units (cents) so that
//! balance updates are exact and overflow-checked. Floats never enter ledger
//! state; they exist only at the human-readable boundary.

use crate::{PalmPayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minor units per major unit (cents per dollar)
pub const MINOR_PER_MAJOR: i64 = 100;

/// Fixed-point monetary amount in minor units
///
/// A single implicit currency is assumed; multi-currency support is out of
/// scope for this core.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Amount {
    /// Raw value in minor units (cents)
    pub cents: i64,
}

impl Amount {
    /// Create an amount from raw minor units
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Create an amount from a human-readable value (e.g., 100.50)
    ///
    /// Rounds to the nearest cent.
    pub fn from_human(value: f64) -> Self {
        Self {
            cents: (value * MINOR_PER_MAJOR as f64).round() as i64,
        }
    }

    /// Create a zero amount
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Get the human-readable value
    pub fn to_human(&self) -> f64 {
        self.cents as f64 / MINOR_PER_MAJOR as f64
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Check if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        let cents = self
            .cents
            .checked_add(other.cents)
            .ok_or(PalmPayError::AmountOverflow)?;
        Ok(Self { cents })
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        let cents = self
            .cents
            .checked_sub(other.cents)
            .ok_or(PalmPayError::AmountOverflow)?;
        Ok(Self { cents })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(
            f,
            "{}${}.{:02}",
            sign,
            abs / MINOR_PER_MAJOR as u64,
            abs % MINOR_PER_MAJOR as u64
        )
    }
}
