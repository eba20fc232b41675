//! Ledger transaction types
//!
//! Transactions are immutable records of committed balance movements. A
//! reversal is a new `Refund` row referencing the original; the original's
//! economic fields are never altered. Only the status marker flips to
//! `Reversed` so a second refund of the same row fails.

use crate::{AccountId, Amount, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of balance movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// External credit into an account
    Deposit,
    /// Debit out of an account (sender = receiver = account)
    Withdrawal,
    /// Transfer between two distinct accounts
    Payment,
    /// Reversal of a completed payment, referencing the original row
    Refund { original: TransactionId },
}

impl TransactionKind {
    /// Check whether rows of this kind may be refunded
    pub fn is_refundable(&self) -> bool {
        matches!(self, Self::Payment)
    }

    /// Short label for journal queries
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Payment => "payment",
            Self::Refund { .. } => "refund",
        }
    }
}

/// Status of a committed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Committed and economically effective
    Completed,
    /// A refund row referencing this transaction exists
    Reversed,
}

impl TransactionStatus {
    /// Check if the transaction is still in its committed, unreversed state
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Immutable record of one committed balance movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Unique transaction ID
    pub id: TransactionId,
    /// Debited account; `None` for deposits
    pub sender: Option<AccountId>,
    /// Credited account
    pub receiver: AccountId,
    /// Amount moved; always strictly positive
    pub amount: Amount,
    /// Kind of movement
    pub kind: TransactionKind,
    /// Status marker
    pub status: TransactionStatus,
    /// Human-readable description
    pub memo: Option<String>,
    /// When the transaction committed
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Check whether this row debits or credits the given account
    pub fn touches(&self, account: &AccountId) -> bool {
        self.sender.as_ref() == Some(account) || &self.receiver == account
    }

    /// Signed effect of this row on the given account's balance, in cents
    ///
    /// The sum of signed effects over all committed rows touching an account
    /// reconciles with its balance (conservation law). Withdrawals carry
    /// sender = receiver and count as pure debits.
    pub fn signed_effect_on(&self, account: &AccountId) -> i64 {
        if matches!(self.kind, TransactionKind::Withdrawal) {
            return if &self.receiver == account {
                -self.amount.cents
            } else {
                0
            };
        }
        let mut effect = 0i64;
        if self.sender.as_ref() == Some(account) {
            effect -= self.amount.cents;
        }
        if &self.receiver == account {
            effect += self.amount.cents;
        }
        effect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(sender: AccountId, receiver: AccountId, amount: Amount) -> LedgerTransaction {
        LedgerTransaction {
            id: TransactionId::new(),
            sender: Some(sender),
            receiver,
            amount,
            kind: TransactionKind::Payment,
            status: TransactionStatus::Completed,
            memo: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_signed_effect() {
        let a = AccountId::new();
        let b = AccountId::new();
        let tx = payment(a.clone(), b.clone(), Amount::from_human(40.0));

        assert_eq!(tx.signed_effect_on(&a), -4000);
        assert_eq!(tx.signed_effect_on(&b), 4000);
        assert_eq!(tx.signed_effect_on(&AccountId::new()), 0);
    }

    #[test]
    fn test_withdrawal_is_self_row() {
        let a = AccountId::new();
        let tx = LedgerTransaction {
            id: TransactionId::new(),
            sender: Some(a.clone()),
            receiver: a.clone(),
            amount: Amount::from_human(10.0),
            kind: TransactionKind::Withdrawal,
            status: TransactionStatus::Completed,
            memo: None,
            created_at: Utc::now(),
        };

        assert!(tx.touches(&a));
        assert_eq!(tx.signed_effect_on(&a), -1000);
    }

    #[test]
    fn test_refundable_kinds() {
        assert!(TransactionKind::Payment.is_refundable());
        assert!(!TransactionKind::Deposit.is_refundable());
        assert!(!TransactionKind::Refund {
            original: TransactionId::new()
        }
        .is_refundable());
    }
}
