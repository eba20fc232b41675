//! Biometric domain types
//!
//! Descriptor sets are immutable once produced and owned by the entity that
//! produced them (an enrollment template or a transient scan). Authentication
//! attempts are write-once audit rows.

use crate::{AttemptId, PalmPayError, Result, TemplateId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptor length in bytes (256 bits)
pub const DESCRIPTOR_BYTES: usize = 32;

/// Descriptor length in bits
pub const DESCRIPTOR_BITS: u32 = (DESCRIPTOR_BYTES * 8) as u32;

/// Fixed-length binary vector summarizing local image structure around a keypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor(pub [u8; DESCRIPTOR_BYTES]);

impl Descriptor {
    /// Bit-mismatch count against another descriptor
    pub fn hamming_distance(&self, other: &Descriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// Unordered collection of descriptors extracted from one image
///
/// Immutable after construction; templates serialize it to an opaque blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSet {
    descriptors: Vec<Descriptor>,
}

impl DescriptorSet {
    /// Create a descriptor set from extracted descriptors
    pub fn new(descriptors: Vec<Descriptor>) -> Self {
        Self { descriptors }
    }

    /// Create an empty descriptor set
    pub fn empty() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    /// Number of descriptors in the set
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if the set contains no descriptors
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Borrow the descriptors
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Serialize to an opaque blob for template persistence
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| PalmPayError::persistence(e.to_string()))
    }

    /// Deserialize from a persisted blob
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        serde_json::from_slice(blob).map_err(|e| PalmPayError::persistence(e.to_string()))
    }
}

/// Reference descriptor set registered for one identity
///
/// Created on successful enrollment; re-enrollment replaces the descriptor
/// set wholesale, keeping the original sequence position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentTemplate {
    /// Template ID
    pub id: TemplateId,
    /// The enrolled identity
    pub user: UserId,
    /// Reference descriptors
    pub descriptors: DescriptorSet,
    /// Monotone sequence assigned at first enrollment; drives deterministic
    /// tie-breaking during matching
    pub enrollment_seq: u64,
    /// When the template was (re-)enrolled
    pub enrolled_at: DateTime<Utc>,
}

/// Outcome of one authentication attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    /// Best score exceeded the acceptance threshold
    Accepted,
    /// Best score fell in the near-miss feedback band; still rejected
    NearMiss,
    /// Best score at or below the near-miss band, or no templates enrolled
    Rejected,
    /// Capture could not be decoded or yielded no features
    Failed { reason: String },
}

impl AttemptOutcome {
    /// Check if the attempt authenticated an identity
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Short label for audit queries
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "success",
            Self::NearMiss => "near_miss",
            Self::Rejected => "no_match",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Write-once record of one matching request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationAttempt {
    /// Attempt ID
    pub id: AttemptId,
    /// Best-matched identity, if any template scored above zero
    pub identity: Option<UserId>,
    /// Best similarity score in [0,1]
    pub score: f64,
    /// Decision outcome
    pub outcome: AttemptOutcome,
    /// When the attempt was made
    pub timestamp: DateTime<Utc>,
    /// Requester network origin, if available
    pub origin: Option<String>,
}

/// Result of pre-extraction capture validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureValidity {
    /// Whether the capture is usable
    pub valid: bool,
    /// Specific rejection reason when invalid
    pub reason: Option<String>,
}

impl CaptureValidity {
    /// A usable capture
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    /// An unusable capture with a specific reason
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_with_first_byte(b: u8) -> Descriptor {
        let mut bytes = [0u8; DESCRIPTOR_BYTES];
        bytes[0] = b;
        Descriptor(bytes)
    }

    #[test]
    fn test_hamming_distance() {
        let a = descriptor_with_first_byte(0b1111_0000);
        let b = descriptor_with_first_byte(0b0000_1111);
        assert_eq!(a.hamming_distance(&b), 8);
        assert_eq!(a.hamming_distance(&a), 0);
    }

    #[test]
    fn test_descriptor_set_blob_round_trip() {
        let set = DescriptorSet::new(vec![
            descriptor_with_first_byte(1),
            descriptor_with_first_byte(2),
        ]);
        let blob = set.to_blob().unwrap();
        let restored = DescriptorSet::from_blob(&blob).unwrap();
        assert_eq!(set, restored);
    }

    #[test]
    fn test_attempt_outcome_labels() {
        assert!(AttemptOutcome::Accepted.is_authenticated());
        assert!(!AttemptOutcome::NearMiss.is_authenticated());
        assert_eq!(AttemptOutcome::Rejected.label(), "no_match");
    }
}
