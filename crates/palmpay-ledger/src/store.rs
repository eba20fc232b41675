//! Append-only transaction journal.
//!
//! The trait is the persistence seam; the in-memory default backs tests and
//! single-process deployments. `append_reversal` exists so the refund row
//! and the original's status flip commit together — implementations must
//! apply both or neither.

use async_trait::async_trait;
use palmpay_types::{
    AccountId, LedgerTransaction, PalmPayError, Result, TransactionId, TransactionStatus,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistence for journal rows
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append a committed transaction row
    async fn append(&self, transaction: &LedgerTransaction) -> Result<()>;

    /// Atomically append a refund row and mark the original row reversed
    async fn append_reversal(
        &self,
        original: &TransactionId,
        refund: &LedgerTransaction,
    ) -> Result<()>;

    /// Fetch a row by ID
    async fn get(&self, id: &TransactionId) -> Result<Option<LedgerTransaction>>;

    /// Rows touching an account, newest first
    async fn history(&self, account: &AccountId, limit: usize)
        -> Result<Vec<LedgerTransaction>>;

    /// Total number of rows
    async fn len(&self) -> Result<usize>;
}

/// In-memory journal
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    rows: Arc<RwLock<Vec<LedgerTransaction>>>,
}

impl InMemoryLedgerStore {
    /// Create an empty journal
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, transaction: &LedgerTransaction) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.push(transaction.clone());
        Ok(())
    }

    async fn append_reversal(
        &self,
        original: &TransactionId,
        refund: &LedgerTransaction,
    ) -> Result<()> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|r| &r.id == original)
            .ok_or_else(|| PalmPayError::TransactionNotFound {
                transaction: original.to_string(),
            })?;
        row.status = TransactionStatus::Reversed;
        rows.push(refund.clone());
        Ok(())
    }

    async fn get(&self, id: &TransactionId) -> Result<Option<LedgerTransaction>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|r| &r.id == id).cloned())
    }

    async fn history(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<LedgerTransaction>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .rev()
            .filter(|r| r.touches(account))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.rows.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use palmpay_types::{Amount, TransactionKind};

    fn deposit_row(receiver: AccountId) -> LedgerTransaction {
        LedgerTransaction {
            id: TransactionId::new(),
            sender: None,
            receiver,
            amount: Amount::from_human(10.0),
            kind: TransactionKind::Deposit,
            status: TransactionStatus::Completed,
            memo: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_get() {
        let store = InMemoryLedgerStore::new();
        let row = deposit_row(AccountId::new());
        store.append(&row).await.unwrap();

        let fetched = store.get(&row.id).await.unwrap().unwrap();
        assert_eq!(fetched.amount, row.amount);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_history_newest_first_scoped_to_account() {
        let store = InMemoryLedgerStore::new();
        let account = AccountId::new();
        let other = AccountId::new();

        let first = deposit_row(account.clone());
        let second = deposit_row(account.clone());
        store.append(&first).await.unwrap();
        store.append(&deposit_row(other)).await.unwrap();
        store.append(&second).await.unwrap();

        let history = store.history(&account, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
    }

    #[tokio::test]
    async fn test_reversal_of_missing_row_fails() {
        let store = InMemoryLedgerStore::new();
        let refund = deposit_row(AccountId::new());
        let err = store
            .append_reversal(&TransactionId::new(), &refund)
            .await
            .unwrap_err();
        assert!(matches!(err, PalmPayError::TransactionNotFound { .. }));
        assert_eq!(store.len().await.unwrap(), 0);
    }
}
