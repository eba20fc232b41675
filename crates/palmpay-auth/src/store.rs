//! Enrollment template store and attempt audit log.
//!
//! Both are trait seams with in-memory defaults; the surrounding layer may
//! substitute persistent implementations. Templates are overwritten wholesale
//! on re-enrollment; the attempt log is strictly append-only.

use async_trait::async_trait;
use chrono::Utc;
use palmpay_types::{
    AttemptId, AuthenticationAttempt, DescriptorSet, EnrollmentTemplate, Result, TemplateId,
    UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Storage for enrollment templates, one per identity
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Create or replace the template for a user
    ///
    /// Replacement keeps the original enrollment sequence so tie-breaking
    /// stays stable across re-enrollments.
    async fn upsert(&self, user: &UserId, descriptors: DescriptorSet)
        -> Result<EnrollmentTemplate>;

    /// Get the template for a user
    async fn get(&self, user: &UserId) -> Result<Option<EnrollmentTemplate>>;

    /// All templates, ascending by enrollment sequence
    async fn all(&self) -> Result<Vec<EnrollmentTemplate>>;

    /// Number of enrolled identities
    async fn count(&self) -> Result<usize>;
}

/// Append-only audit log of authentication attempts
#[async_trait]
pub trait AttemptLog: Send + Sync {
    /// Append an attempt record
    async fn append(&self, attempt: AuthenticationAttempt) -> Result<AttemptId>;

    /// Most recent attempts, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<AuthenticationAttempt>>;

    /// Attempts that matched a specific identity, newest first
    async fn for_user(&self, user: &UserId) -> Result<Vec<AuthenticationAttempt>>;
}

#[derive(Default)]
struct TemplateMap {
    templates: HashMap<UserId, EnrollmentTemplate>,
    next_seq: u64,
}

/// In-memory template store
#[derive(Clone, Default)]
pub struct InMemoryTemplateStore {
    inner: Arc<RwLock<TemplateMap>>,
}

impl InMemoryTemplateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn upsert(
        &self,
        user: &UserId,
        descriptors: DescriptorSet,
    ) -> Result<EnrollmentTemplate> {
        let mut inner = self.inner.write().await;

        let seq = match inner.templates.get(user) {
            Some(existing) => existing.enrollment_seq,
            None => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                seq
            }
        };

        let template = EnrollmentTemplate {
            id: TemplateId::new(),
            user: user.clone(),
            descriptors,
            enrollment_seq: seq,
            enrolled_at: Utc::now(),
        };
        inner.templates.insert(user.clone(), template.clone());

        info!(user = %user, seq, descriptors = template.descriptors.len(), "template enrolled");
        Ok(template)
    }

    async fn get(&self, user: &UserId) -> Result<Option<EnrollmentTemplate>> {
        let inner = self.inner.read().await;
        Ok(inner.templates.get(user).cloned())
    }

    async fn all(&self) -> Result<Vec<EnrollmentTemplate>> {
        let inner = self.inner.read().await;
        let mut templates: Vec<EnrollmentTemplate> = inner.templates.values().cloned().collect();
        templates.sort_by_key(|t| t.enrollment_seq);
        Ok(templates)
    }

    async fn count(&self) -> Result<usize> {
        let inner = self.inner.read().await;
        Ok(inner.templates.len())
    }
}

/// In-memory attempt log
#[derive(Clone, Default)]
pub struct InMemoryAttemptLog {
    entries: Arc<RwLock<Vec<AuthenticationAttempt>>>,
}

impl InMemoryAttemptLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptLog for InMemoryAttemptLog {
    async fn append(&self, attempt: AuthenticationAttempt) -> Result<AttemptId> {
        let id = attempt.id.clone();
        let mut entries = self.entries.write().await;
        entries.push(attempt);
        Ok(id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuthenticationAttempt>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    async fn for_user(&self, user: &UserId) -> Result<Vec<AuthenticationAttempt>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .rev()
            .filter(|a| a.identity.as_ref() == Some(user))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palmpay_types::{AttemptOutcome, Descriptor};

    fn set_of(byte: u8) -> DescriptorSet {
        DescriptorSet::new(vec![Descriptor([byte; 32])])
    }

    #[tokio::test]
    async fn test_upsert_overwrites_keeping_sequence() {
        let store = InMemoryTemplateStore::new();
        let user = UserId::new();

        let first = store.upsert(&user, set_of(1)).await.unwrap();
        let second = store.upsert(&user, set_of(2)).await.unwrap();

        assert_eq!(first.enrollment_seq, second.enrollment_seq);
        assert_eq!(store.count().await.unwrap(), 1);

        let stored = store.get(&user).await.unwrap().unwrap();
        assert_eq!(stored.descriptors, set_of(2));
    }

    #[tokio::test]
    async fn test_all_is_ordered_by_enrollment() {
        let store = InMemoryTemplateStore::new();
        let first = UserId::new();
        let second = UserId::new();

        store.upsert(&first, set_of(1)).await.unwrap();
        store.upsert(&second, set_of(2)).await.unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].user, first);
        assert_eq!(all[1].user, second);
        assert!(all[0].enrollment_seq < all[1].enrollment_seq);
    }

    #[tokio::test]
    async fn test_attempt_log_is_append_only_newest_first() {
        let log = InMemoryAttemptLog::new();
        let user = UserId::new();

        for score in [0.1, 0.5] {
            log.append(AuthenticationAttempt {
                id: AttemptId::new(),
                identity: Some(user.clone()),
                score,
                outcome: AttemptOutcome::Rejected,
                timestamp: Utc::now(),
                origin: None,
            })
            .await
            .unwrap();
        }

        let recent = log.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].score, 0.5);

        let for_user = log.for_user(&user).await.unwrap();
        assert_eq!(for_user.len(), 2);
    }
}
