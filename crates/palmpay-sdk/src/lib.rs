//! PalmPay SDK - Palm-authenticated payments
//!
//! The facade the surrounding application layer consumes. It wires the
//! matching pipeline, the decision engine, and the transfer engine together
//! behind a handful of calls:
//!
//! ```ignore
//! use palmpay_sdk::PalmPay;
//! use palmpay_types::{Amount, UserId};
//!
//! #[tokio::main]
//! async fn main() -> palmpay_types::Result<()> {
//!     let bank = PalmPay::in_memory();
//!
//!     // Enroll a palm and open an account
//!     let alice = UserId::new();
//!     bank.enroll(&alice, &capture_bytes).await?;
//!     let account = bank.open_account(alice.clone()).await;
//!     bank.deposit(&account.id, Amount::from_human(100.0)).await?;
//!
//!     // Pay by palm: authenticate, then move funds atomically
//!     let receipt = bank
//!         .pay_by_palm(&scan_bytes, None, &merchant_account, Amount::from_human(40.0), None)
//!         .await?;
//!     println!("paid: {}", receipt.id);
//!     Ok(())
//! }
//! ```
//!
//! Authentication rejection never touches the ledger; every attempt lands
//! in the audit log, including captures that fail to decode.

use std::sync::Arc;

use palmpay_auth::{
    AttemptLog, AuthenticationResult, DecisionConfig, DecisionEngine, InMemoryAttemptLog,
    InMemoryTemplateStore, TemplateStore,
};
use palmpay_ledger::{InMemoryLedgerStore, Ledger, LedgerStore};
use palmpay_types::{
    Account, AccountId, Amount, AuthenticationAttempt, CaptureValidity, DescriptorSet,
    EnrollmentTemplate, LedgerTransaction, PalmPayError, Result, TransactionId, UserId,
};
use palmpay_vision::ExtractorConfig;
use tracing::info;

pub use palmpay_types::*;

/// The PalmPay core, ready to wire into a surrounding application
#[derive(Clone)]
pub struct PalmPay {
    extractor: ExtractorConfig,
    templates: Arc<dyn TemplateStore>,
    attempts: Arc<dyn AttemptLog>,
    engine: DecisionEngine,
    ledger: Ledger,
}

impl PalmPay {
    /// Create a core with in-memory stores and default thresholds
    pub fn in_memory() -> Self {
        Self::with_stores(
            Arc::new(InMemoryTemplateStore::new()),
            Arc::new(InMemoryAttemptLog::new()),
            Arc::new(InMemoryLedgerStore::new()),
            DecisionConfig::default(),
            ExtractorConfig::default(),
        )
    }

    /// Create a core over caller-supplied stores
    pub fn with_stores(
        templates: Arc<dyn TemplateStore>,
        attempts: Arc<dyn AttemptLog>,
        journal: Arc<dyn LedgerStore>,
        decision: DecisionConfig,
        extractor: ExtractorConfig,
    ) -> Self {
        let engine = DecisionEngine::new(decision, templates.clone(), attempts.clone());
        Self {
            extractor,
            templates,
            attempts,
            engine,
            ledger: Ledger::new(journal),
        }
    }

    /// The underlying transfer engine
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    // ========================================================================
    // Biometric surface
    // ========================================================================

    /// Extract the descriptor set from raw capture bytes
    pub fn extract_features(&self, image_bytes: &[u8]) -> Result<DescriptorSet> {
        let canonical = palmpay_vision::preprocess_bytes(image_bytes)?;
        palmpay_vision::extract(&canonical, &self.extractor)
    }

    /// Check whether a capture is usable before enrolling or matching
    pub fn validate_capture(&self, image_bytes: &[u8]) -> CaptureValidity {
        palmpay_vision::validate_capture(image_bytes, &self.extractor)
    }

    /// Enroll (or re-enroll) a user's palm
    ///
    /// Re-enrollment overwrites the stored template wholesale.
    pub async fn enroll(
        &self,
        user: &UserId,
        image_bytes: &[u8],
    ) -> Result<EnrollmentTemplate> {
        let validity = self.validate_capture(image_bytes);
        if !validity.valid {
            return Err(PalmPayError::low_quality(
                validity.reason.unwrap_or_else(|| "unusable capture".to_string()),
            ));
        }

        let descriptors = self.extract_features(image_bytes)?;
        self.templates.upsert(user, descriptors).await
    }

    /// Authenticate a fresh capture against all enrolled templates
    ///
    /// Capture failures (decode, quality, no features) are converted into a
    /// `Failed` outcome and logged, keeping the audit trail continuous; only
    /// storage errors propagate.
    pub async fn authenticate(
        &self,
        image_bytes: &[u8],
        origin: Option<String>,
    ) -> Result<AuthenticationResult> {
        match self.extract_features(image_bytes) {
            Ok(probe) => self.engine.decide(&probe, origin).await,
            Err(
                err @ (PalmPayError::Decode { .. }
                | PalmPayError::LowQuality { .. }
                | PalmPayError::NoFeatures),
            ) => self.engine.record_failure(&err.to_string(), origin).await,
            Err(err) => Err(err),
        }
    }

    /// Recent authentication attempts, newest first
    pub async fn recent_attempts(&self, limit: usize) -> Result<Vec<AuthenticationAttempt>> {
        self.attempts.recent(limit).await
    }

    // ========================================================================
    // Payment surface
    // ========================================================================

    /// Authenticate a capture and, on acceptance, pay the recipient from the
    /// authenticated user's account
    ///
    /// The authentication decision gates the transfer: rejection returns
    /// `AuthenticationRejected` and the ledger is untouched.
    pub async fn pay_by_palm(
        &self,
        image_bytes: &[u8],
        origin: Option<String>,
        recipient: &AccountId,
        amount: Amount,
        memo: Option<String>,
    ) -> Result<LedgerTransaction> {
        let auth = self.authenticate(image_bytes, origin).await?;
        let Some(user) = auth.identity else {
            return Err(PalmPayError::AuthenticationRejected { score: auth.score });
        };

        let payer = self
            .ledger
            .find_by_owner(&user)
            .await
            .ok_or_else(|| PalmPayError::AccountNotFound {
                account: user.to_string(),
            })?;

        info!(user = %user, score = auth.score, "palm-authenticated payment authorized");
        self.ledger.transfer(&payer.id, recipient, amount, memo).await
    }

    /// Open a ledger account for a user
    pub async fn open_account(&self, owner: UserId) -> Account {
        self.ledger.open_account(owner).await
    }

    /// Credit an account
    pub async fn deposit(&self, account: &AccountId, amount: Amount) -> Result<LedgerTransaction> {
        self.ledger.deposit(account, amount).await
    }

    /// Debit an account
    pub async fn withdraw(&self, account: &AccountId, amount: Amount) -> Result<LedgerTransaction> {
        self.ledger.withdraw(account, amount).await
    }

    /// Move funds between two accounts
    pub async fn transfer(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
        amount: Amount,
        memo: Option<String>,
    ) -> Result<LedgerTransaction> {
        self.ledger.transfer(sender, receiver, amount, memo).await
    }

    /// Reverse a completed payment
    pub async fn refund(
        &self,
        transaction: &TransactionId,
        reason: &str,
    ) -> Result<LedgerTransaction> {
        self.ledger.refund(transaction, reason).await
    }

    /// Current balance of an account
    pub async fn balance(&self, account: &AccountId) -> Result<Amount> {
        self.ledger.balance(account).await
    }

    /// Journal rows touching an account, newest first
    pub async fn history(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<LedgerTransaction>> {
        self.ledger.history(account, limit).await
    }
}

impl Default for PalmPay {
    fn default() -> Self {
        Self::in_memory()
    }
}
