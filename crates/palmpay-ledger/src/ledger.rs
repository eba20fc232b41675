//! The transfer engine.
//!
//! Every mutation runs as one unit under the account-store write lock:
//! validate, persist the journal row, then apply balances. A persistence
//! failure returns before any balance changes, so the store is left exactly
//! as it was. The single store lock is the serialization point for all
//! transfers; two concurrent movements over the same accounts apply in some
//! serial order and can never double-spend.

use crate::store::LedgerStore;
use chrono::Utc;
use palmpay_types::{
    Account, AccountId, Amount, LedgerTransaction, PalmPayError, Result, TransactionId,
    TransactionKind, TransactionStatus, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// The PalmPay ledger
///
/// Thread-safe; cheap to clone and share across tasks.
#[derive(Clone)]
pub struct Ledger {
    accounts: Arc<RwLock<HashMap<AccountId, Account>>>,
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    /// Create a ledger over the given journal store
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            store,
        }
    }

    /// Create a ledger with an in-memory journal
    pub fn in_memory() -> Self {
        Self::new(Arc::new(crate::store::InMemoryLedgerStore::new()))
    }

    /// Open a new account with a zero balance
    pub async fn open_account(&self, owner: UserId) -> Account {
        let account = Account::new(owner);
        let mut accounts = self.accounts.write().await;
        accounts.insert(account.id.clone(), account.clone());
        info!(account = %account.id, owner = %account.owner, "account opened");
        account
    }

    /// Look up an account
    pub async fn account(&self, id: &AccountId) -> Result<Account> {
        let accounts = self.accounts.read().await;
        accounts
            .get(id)
            .cloned()
            .ok_or_else(|| PalmPayError::AccountNotFound {
                account: id.to_string(),
            })
    }

    /// Find the account owned by an identity
    pub async fn find_by_owner(&self, owner: &UserId) -> Option<Account> {
        let accounts = self.accounts.read().await;
        accounts.values().find(|a| &a.owner == owner).cloned()
    }

    /// Current committed balance of an account
    pub async fn balance(&self, id: &AccountId) -> Result<Amount> {
        Ok(self.account(id).await?.balance)
    }

    /// Pre-check a transfer without mutating anything
    ///
    /// Returns validity plus the specific reason, so the decision-gated
    /// payment flow can report problems before attempting the mutation.
    pub async fn validate(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
        amount: Amount,
    ) -> (bool, String) {
        if !amount.is_positive() {
            return (false, "Invalid amount".to_string());
        }
        if sender == receiver {
            return (false, "Cannot send payment to yourself".to_string());
        }

        let accounts = self.accounts.read().await;
        let Some(sender_account) = accounts.get(sender) else {
            return (false, "Sender account not found".to_string());
        };
        if accounts.get(receiver).is_none() {
            return (false, "Recipient not found".to_string());
        }
        if !sender_account.covers(&amount) {
            return (false, "Insufficient funds".to_string());
        }

        (true, "Valid transaction".to_string())
    }

    /// Credit an account from outside the ledger
    pub async fn deposit(&self, account: &AccountId, amount: Amount) -> Result<LedgerTransaction> {
        require_positive(amount)?;

        let mut accounts = self.accounts.write().await;
        let current = lookup(&accounts, account)?.balance;
        let new_balance = current.checked_add(amount)?;

        let row = LedgerTransaction {
            id: TransactionId::new(),
            sender: None,
            receiver: account.clone(),
            amount,
            kind: TransactionKind::Deposit,
            status: TransactionStatus::Completed,
            memo: Some("Wallet deposit".to_string()),
            created_at: Utc::now(),
        };
        self.store.append(&row).await?;

        set_balance(&mut accounts, account, new_balance);
        info!(account = %account, amount = %amount, "deposit committed");
        Ok(row)
    }

    /// Debit an account to outside the ledger
    ///
    /// Journaled as sender = receiver = account.
    pub async fn withdraw(&self, account: &AccountId, amount: Amount) -> Result<LedgerTransaction> {
        require_positive(amount)?;

        let mut accounts = self.accounts.write().await;
        let current = lookup(&accounts, account)?.balance;
        if current < amount {
            warn!(account = %account, requested = %amount, available = %current,
                  "withdrawal rejected: insufficient funds");
            return Err(PalmPayError::InsufficientFunds {
                account: account.to_string(),
                requested: amount,
                available: current,
            });
        }
        let new_balance = current.checked_sub(amount)?;

        let row = LedgerTransaction {
            id: TransactionId::new(),
            sender: Some(account.clone()),
            receiver: account.clone(),
            amount,
            kind: TransactionKind::Withdrawal,
            status: TransactionStatus::Completed,
            memo: Some("Wallet withdrawal".to_string()),
            created_at: Utc::now(),
        };
        self.store.append(&row).await?;

        set_balance(&mut accounts, account, new_balance);
        info!(account = %account, amount = %amount, "withdrawal committed");
        Ok(row)
    }

    /// Move funds between two distinct accounts
    ///
    /// Atomic: the journal row and both balance updates commit together or
    /// not at all.
    pub async fn transfer(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
        amount: Amount,
        memo: Option<String>,
    ) -> Result<LedgerTransaction> {
        require_positive(amount)?;
        if sender == receiver {
            return Err(PalmPayError::SelfTransfer {
                account: sender.to_string(),
            });
        }

        let mut accounts = self.accounts.write().await;
        let sender_balance = lookup(&accounts, sender)?.balance;
        let receiver_balance = lookup(&accounts, receiver)?.balance;

        if sender_balance < amount {
            warn!(sender = %sender, requested = %amount, available = %sender_balance,
                  "transfer rejected: insufficient funds");
            return Err(PalmPayError::InsufficientFunds {
                account: sender.to_string(),
                requested: amount,
                available: sender_balance,
            });
        }
        let new_sender_balance = sender_balance.checked_sub(amount)?;
        let new_receiver_balance = receiver_balance.checked_add(amount)?;

        let row = LedgerTransaction {
            id: TransactionId::new(),
            sender: Some(sender.clone()),
            receiver: receiver.clone(),
            amount,
            kind: TransactionKind::Payment,
            status: TransactionStatus::Completed,
            memo,
            created_at: Utc::now(),
        };
        self.store.append(&row).await?;

        set_balance(&mut accounts, sender, new_sender_balance);
        set_balance(&mut accounts, receiver, new_receiver_balance);
        info!(transaction = %row.id, sender = %sender, receiver = %receiver,
              amount = %amount, "payment committed");
        Ok(row)
    }

    /// Reverse a completed payment
    ///
    /// Appends a new refund row referencing the original; the original's
    /// economic fields are never altered. A second refund of the same row
    /// fails because the status marker is no longer `Completed`.
    pub async fn refund(
        &self,
        transaction: &TransactionId,
        reason: &str,
    ) -> Result<LedgerTransaction> {
        let mut accounts = self.accounts.write().await;

        let original = self.store.get(transaction).await?.ok_or_else(|| {
            PalmPayError::TransactionNotFound {
                transaction: transaction.to_string(),
            }
        })?;

        if !original.kind.is_refundable() {
            return Err(PalmPayError::NotRefundable {
                transaction: transaction.to_string(),
                reason: format!("kind is {}, only payments are refundable", original.kind.label()),
            });
        }
        if !original.status.is_completed() {
            return Err(PalmPayError::NotRefundable {
                transaction: transaction.to_string(),
                reason: "already refunded".to_string(),
            });
        }
        let Some(original_sender) = original.sender.clone() else {
            return Err(PalmPayError::NotRefundable {
                transaction: transaction.to_string(),
                reason: "payment has no sender".to_string(),
            });
        };

        // The refund debits the original receiver
        let payer_balance = lookup(&accounts, &original.receiver)?.balance;
        if payer_balance < original.amount {
            return Err(PalmPayError::InsufficientFunds {
                account: original.receiver.to_string(),
                requested: original.amount,
                available: payer_balance,
            });
        }
        let new_payer_balance = payer_balance.checked_sub(original.amount)?;
        let new_payee_balance = lookup(&accounts, &original_sender)?
            .balance
            .checked_add(original.amount)?;

        let row = LedgerTransaction {
            id: TransactionId::new(),
            sender: Some(original.receiver.clone()),
            receiver: original_sender.clone(),
            amount: original.amount,
            kind: TransactionKind::Refund {
                original: original.id.clone(),
            },
            status: TransactionStatus::Completed,
            memo: Some(format!("Refund for transaction {}: {}", original.id, reason)),
            created_at: Utc::now(),
        };
        self.store.append_reversal(&original.id, &row).await?;

        set_balance(&mut accounts, &original.receiver, new_payer_balance);
        set_balance(&mut accounts, &original_sender, new_payee_balance);
        info!(transaction = %row.id, original = %original.id, "refund committed");
        Ok(row)
    }

    /// Journal rows touching an account, newest first
    pub async fn history(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<LedgerTransaction>> {
        self.store.history(account, limit).await
    }
}

fn require_positive(amount: Amount) -> Result<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(PalmPayError::InvalidAmount { amount })
    }
}

fn lookup<'a>(
    accounts: &'a HashMap<AccountId, Account>,
    id: &AccountId,
) -> Result<&'a Account> {
    accounts.get(id).ok_or_else(|| PalmPayError::AccountNotFound {
        account: id.to_string(),
    })
}

fn set_balance(accounts: &mut HashMap<AccountId, Account>, id: &AccountId, balance: Amount) {
    if let Some(account) = accounts.get_mut(id) {
        account.balance = balance;
    }
}
