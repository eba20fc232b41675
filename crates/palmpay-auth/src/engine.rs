//! Best-match selection and the acceptance decision.
//!
//! Every decision scans the full template collection: the design requires
//! the global best match, not merely a match, so ambiguous multi-candidate
//! accepts cannot occur. Scoring fans out across templates; the reduction
//! uses a total order on (score, enrollment sequence) so the winner is
//! deterministic under any scheduling.

use crate::store::{AttemptLog, TemplateStore};
use chrono::Utc;
use palmpay_types::{
    AttemptId, AttemptOutcome, AuthenticationAttempt, DescriptorSet, EnrollmentTemplate, Result,
    UserId,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::info;

/// Decision thresholds
///
/// One acceptance threshold for the whole system; callers never supply
/// their own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Scores strictly above this authenticate
    pub threshold: f64,
    /// Scores in (near_miss_floor, threshold] get retry-oriented feedback
    pub near_miss_floor: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            near_miss_floor: 0.1,
        }
    }
}

/// Outcome of one matching request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationResult {
    /// The authenticated identity; `None` unless accepted
    pub identity: Option<UserId>,
    /// Best similarity score across all templates
    pub score: f64,
    /// Decision outcome
    pub outcome: AttemptOutcome,
}

/// The authentication decision engine
#[derive(Clone)]
pub struct DecisionEngine {
    config: DecisionConfig,
    templates: Arc<dyn TemplateStore>,
    attempts: Arc<dyn AttemptLog>,
}

impl DecisionEngine {
    /// Create an engine over the given stores
    pub fn new(
        config: DecisionConfig,
        templates: Arc<dyn TemplateStore>,
        attempts: Arc<dyn AttemptLog>,
    ) -> Self {
        Self {
            config,
            templates,
            attempts,
        }
    }

    /// The active decision thresholds
    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Score a probe against every enrolled template and decide
    ///
    /// The attempt is logged whatever the outcome. An empty template
    /// collection always rejects with no identity selected.
    pub async fn decide(
        &self,
        probe: &DescriptorSet,
        origin: Option<String>,
    ) -> Result<AuthenticationResult> {
        let templates = self.templates.all().await?;
        let best = best_match(probe, &templates);

        let (best_user, best_score) = match best {
            Some((template, score)) => (Some(template.user.clone()), score),
            None => (None, 0.0),
        };

        let outcome = if best_score > self.config.threshold {
            AttemptOutcome::Accepted
        } else if best_score > self.config.near_miss_floor {
            AttemptOutcome::NearMiss
        } else {
            AttemptOutcome::Rejected
        };

        info!(
            score = best_score,
            outcome = outcome.label(),
            candidates = templates.len(),
            "authentication decision"
        );

        self.attempts
            .append(AuthenticationAttempt {
                id: AttemptId::new(),
                identity: best_user.clone(),
                score: best_score,
                outcome: outcome.clone(),
                timestamp: Utc::now(),
                origin,
            })
            .await?;

        let identity = if outcome.is_authenticated() {
            best_user
        } else {
            None
        };
        Ok(AuthenticationResult {
            identity,
            score: best_score,
            outcome,
        })
    }

    /// Log a capture that never reached scoring (decode or extraction
    /// failure) so the audit trail stays continuous
    pub async fn record_failure(
        &self,
        reason: &str,
        origin: Option<String>,
    ) -> Result<AuthenticationResult> {
        let outcome = AttemptOutcome::Failed {
            reason: reason.to_string(),
        };
        self.attempts
            .append(AuthenticationAttempt {
                id: AttemptId::new(),
                identity: None,
                score: 0.0,
                outcome: outcome.clone(),
                timestamp: Utc::now(),
                origin,
            })
            .await?;

        Ok(AuthenticationResult {
            identity: None,
            score: 0.0,
            outcome,
        })
    }
}

/// Global best match under a total order on (score, enrollment sequence)
///
/// Earlier enrollments win exact score ties, so concurrent scoring cannot
/// produce first-writer-wins nondeterminism.
fn best_match<'a>(
    probe: &DescriptorSet,
    templates: &'a [EnrollmentTemplate],
) -> Option<(&'a EnrollmentTemplate, f64)> {
    templates
        .par_iter()
        .map(|template| (template, palmpay_vision::score(probe, &template.descriptors)))
        .max_by(|(a, score_a), (b, score_b)| {
            score_a
                .partial_cmp(score_b)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.enrollment_seq.cmp(&a.enrollment_seq))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryAttemptLog, InMemoryTemplateStore};
    use palmpay_types::Descriptor;

    fn engine() -> (DecisionEngine, Arc<InMemoryTemplateStore>, Arc<InMemoryAttemptLog>) {
        let templates = Arc::new(InMemoryTemplateStore::new());
        let attempts = Arc::new(InMemoryAttemptLog::new());
        let engine = DecisionEngine::new(
            DecisionConfig::default(),
            templates.clone(),
            attempts.clone(),
        );
        (engine, templates, attempts)
    }

    /// Descriptors with every byte set to the index value
    fn base_set(count: usize) -> DescriptorSet {
        DescriptorSet::new((0..count).map(|i| Descriptor([i as u8; 32])).collect())
    }

    /// `base_set` with the first `bits` bits of each descriptor flipped
    fn offset_set(count: usize, bits: u32) -> DescriptorSet {
        DescriptorSet::new(
            (0..count)
                .map(|i| {
                    let mut bytes = [i as u8; 32];
                    let mut remaining = bits;
                    for byte in bytes.iter_mut() {
                        if remaining == 0 {
                            break;
                        }
                        let flip = remaining.min(8);
                        *byte ^= ((1u16 << flip) - 1) as u8;
                        remaining -= flip;
                    }
                    Descriptor(bytes)
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_empty_collection_rejects() {
        let (engine, _, attempts) = engine();
        let result = engine.decide(&base_set(20), None).await.unwrap();

        assert_eq!(result.outcome, AttemptOutcome::Rejected);
        assert!(result.identity.is_none());
        assert_eq!(result.score, 0.0);
        assert_eq!(attempts.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_global_best_wins_over_weaker_candidate() {
        let (engine, templates, attempts) = engine();
        let weak = UserId::new();
        let strong = UserId::new();

        // Weak template sits below threshold, strong well above
        templates.upsert(&weak, offset_set(20, 70)).await.unwrap();
        templates.upsert(&strong, offset_set(20, 10)).await.unwrap();

        let result = engine.decide(&base_set(20), None).await.unwrap();

        assert_eq!(result.outcome, AttemptOutcome::Accepted);
        assert_eq!(result.identity, Some(strong));
        assert!(result.score > 0.2);

        let logged = &attempts.recent(1).await.unwrap()[0];
        assert_eq!(logged.score, result.score);
    }

    #[tokio::test]
    async fn test_exact_tie_resolves_to_first_enrolled() {
        let (engine, templates, _) = engine();
        let first = UserId::new();
        let second = UserId::new();

        templates.upsert(&first, offset_set(20, 10)).await.unwrap();
        templates.upsert(&second, offset_set(20, 10)).await.unwrap();

        let result = engine.decide(&base_set(20), None).await.unwrap();
        assert_eq!(result.identity, Some(first));
    }

    #[tokio::test]
    async fn test_near_miss_band() {
        let (engine, templates, _) = engine();
        let user = UserId::new();

        // 70 flipped bits lands the score between the floor and threshold
        templates.upsert(&user, offset_set(20, 70)).await.unwrap();

        let result = engine.decide(&base_set(20), None).await.unwrap();
        assert_eq!(result.outcome, AttemptOutcome::NearMiss);
        assert!(result.identity.is_none());
    }

    #[tokio::test]
    async fn test_failure_is_logged_with_zero_score() {
        let (engine, _, attempts) = engine();
        let result = engine
            .record_failure("image decode failed", Some("203.0.113.9".into()))
            .await
            .unwrap();

        assert!(matches!(result.outcome, AttemptOutcome::Failed { .. }));

        let logged = &attempts.recent(1).await.unwrap()[0];
        assert_eq!(logged.score, 0.0);
        assert!(logged.identity.is_none());
        assert_eq!(logged.origin.as_deref(), Some("203.0.113.9"));
    }
}
