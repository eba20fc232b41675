//! Account state
//!
//! Accounts are mutated only by the ledger transfer engine under its
//! serialization discipline. Invariant: `balance >= 0` at every committed
//! state.

use crate::{AccountId, Amount, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ledger account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account ID
    pub id: AccountId,
    /// Owning identity
    pub owner: UserId,
    /// Current committed balance; never negative
    pub balance: Amount,
    /// When the account was opened
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open a new account with a zero balance
    pub fn new(owner: UserId) -> Self {
        Self {
            id: AccountId::new(),
            owner,
            balance: Amount::zero(),
            created_at: Utc::now(),
        }
    }

    /// Check whether the balance covers the requested amount
    pub fn covers(&self, amount: &Amount) -> bool {
        self.balance >= *amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_is_empty() {
        let account = Account::new(UserId::new());
        assert!(account.balance.is_zero());
    }

    #[test]
    fn test_covers() {
        let mut account = Account::new(UserId::new());
        account.balance = Amount::from_human(100.0);
        assert!(account.covers(&Amount::from_human(100.0)));
        assert!(!account.covers(&Amount::from_human(100.01)));
    }
}
