//! Descriptor set similarity scoring.
//!
//! Correspondences are one-directional nearest neighbours by Hamming
//! distance: for each descriptor in the probe, its closest descriptor in the
//! reference. Three signals are blended into the final score because a raw
//! match-count ratio alone is unstable across lighting and pose variation:
//! coverage rewards many adequate matches, quality rewards tight distances
//! among the best correspondences, and excellence rewards a core of
//! near-exact matches.

use palmpay_types::DescriptorSet;
use rayon::prelude::*;

/// Hamming distance under which a correspondence counts toward coverage
pub const GOOD_MATCH_DISTANCE: u32 = 50;

/// Hamming distance under which a correspondence counts as excellent
pub const EXCELLENT_MATCH_DISTANCE: u32 = 25;

/// Distance at which match quality is considered zero
pub const MAX_MATCH_DISTANCE: f64 = 100.0;

/// Size of the top-ranked pool used for the excellence signal
const EXCELLENCE_POOL: usize = 20;

/// Fraction of top-ranked correspondences feeding the quality signal
const QUALITY_TOP_FRACTION: f64 = 0.2;

/// Floor on the quality pool size
const QUALITY_MIN_COUNT: usize = 10;

/// Signal weights: coverage, quality, excellence
const WEIGHTS: (f64, f64, f64) = (0.4, 0.4, 0.2);

/// The three independent similarity signals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchSignals {
    /// Share of possible correspondences with an adequate distance
    pub coverage: f64,
    /// Normalized inverse mean distance of the top-ranked correspondences
    pub quality: f64,
    /// Share of near-exact matches in the top-ranked pool
    pub excellence: f64,
}

impl MatchSignals {
    /// Weighted blend, clamped to 1.0
    pub fn blend(&self) -> f64 {
        let (wc, wq, we) = WEIGHTS;
        (wc * self.coverage + wq * self.quality + we * self.excellence).min(1.0)
    }
}

/// Score similarity between two descriptor sets in [0,1]
///
/// Returns 0.0 when either set is empty; never errors.
pub fn score(probe: &DescriptorSet, reference: &DescriptorSet) -> f64 {
    if probe.is_empty() || reference.is_empty() {
        return 0.0;
    }

    let distances = correspondence_distances(probe, reference);
    let smaller = probe.len().min(reference.len());
    signals(&distances, smaller).blend()
}

/// Compute the three signals for inspection or calibration
pub fn signals(sorted_distances: &[u32], smaller_len: usize) -> MatchSignals {
    MatchSignals {
        coverage: coverage_score(sorted_distances, smaller_len),
        quality: quality_score(sorted_distances),
        excellence: excellence_ratio(sorted_distances, smaller_len),
    }
}

/// Nearest-neighbour distances from each probe descriptor into the
/// reference set, sorted ascending
pub fn correspondence_distances(probe: &DescriptorSet, reference: &DescriptorSet) -> Vec<u32> {
    let mut distances: Vec<u32> = probe
        .descriptors()
        .par_iter()
        .map(|d| {
            reference
                .descriptors()
                .iter()
                .map(|r| d.hamming_distance(r))
                .min()
                .unwrap_or(u32::MAX)
        })
        .collect();
    distances.sort_unstable();
    distances
}

/// Coverage: adequate correspondences over the smaller set size
fn coverage_score(sorted_distances: &[u32], smaller_len: usize) -> f64 {
    if smaller_len == 0 {
        return 0.0;
    }
    let good = sorted_distances
        .iter()
        .filter(|&&d| d < GOOD_MATCH_DISTANCE)
        .count();
    (good as f64 / smaller_len as f64).min(1.0)
}

/// Quality: inverse mean distance across the top-ranked fraction
fn quality_score(sorted_distances: &[u32]) -> f64 {
    if sorted_distances.is_empty() {
        return 0.0;
    }
    let pool = ((sorted_distances.len() as f64 * QUALITY_TOP_FRACTION) as usize)
        .max(QUALITY_MIN_COUNT)
        .min(sorted_distances.len());
    let mean =
        sorted_distances[..pool].iter().map(|&d| d as f64).sum::<f64>() / pool as f64;
    (1.0 - mean / MAX_MATCH_DISTANCE).clamp(0.0, 1.0)
}

/// Excellence: near-exact matches within the top-ranked pool
fn excellence_ratio(sorted_distances: &[u32], smaller_len: usize) -> f64 {
    if smaller_len == 0 || sorted_distances.is_empty() {
        return 0.0;
    }
    let pool = EXCELLENCE_POOL.min(sorted_distances.len());
    let excellent = sorted_distances[..pool]
        .iter()
        .filter(|&&d| d < EXCELLENT_MATCH_DISTANCE)
        .count();
    let denominator = EXCELLENCE_POOL.min(smaller_len);
    (excellent as f64 / denominator as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use palmpay_types::Descriptor;

    /// Descriptors with every byte set to the index value; pairwise Hamming
    /// distance between distinct entries is at least 32.
    fn uniform_set(count: usize) -> DescriptorSet {
        DescriptorSet::new(
            (0..count)
                .map(|i| Descriptor([i as u8; 32]))
                .collect(),
        )
    }

    /// Same as `uniform_set` but with the first `bits` bits of each
    /// descriptor flipped, putting each entry at exactly that distance from
    /// its counterpart.
    fn flipped_set(count: usize, bits: u32) -> DescriptorSet {
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

    #[test]
    fn test_self_similarity_is_maximal() {
        let set = uniform_set(100);
        assert_eq!(score(&set, &set), 1.0);
    }

    #[test]
    fn test_empty_set_scores_zero() {
        let set = uniform_set(50);
        let empty = DescriptorSet::empty();
        assert_eq!(score(&set, &empty), 0.0);
        assert_eq!(score(&empty, &set), 0.0);
        assert_eq!(score(&empty, &empty), 0.0);
    }

    #[test]
    fn test_close_sets_score_high() {
        let probe = uniform_set(20);
        let reference = flipped_set(20, 10);
        let s = score(&probe, &reference);
        assert!(s > 0.9, "score was {s}");
    }

    #[test]
    fn test_distant_sets_land_in_near_miss_band() {
        // Exactly 70 bits apart: no coverage, no excellence, quality 0.3
        let probe = uniform_set(20);
        let reference = flipped_set(20, 70);
        let s = score(&probe, &reference);
        assert!((s - 0.12).abs() < 1e-9, "score was {s}");
    }

    #[test]
    fn test_far_sets_score_zero() {
        // 128 bits apart exceeds the quality cutoff entirely
        let probe = uniform_set(20);
        let reference = flipped_set(20, 128);
        assert_eq!(score(&probe, &reference), 0.0);
    }

    #[test]
    fn test_signals_are_bounded() {
        let probe = uniform_set(40);
        let reference = flipped_set(40, 30);
        let distances = correspondence_distances(&probe, &reference);
        let s = signals(&distances, 40);
        for value in [s.coverage, s.quality, s.excellence] {
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn test_correspondences_sorted_ascending() {
        let probe = uniform_set(30);
        let reference = flipped_set(30, 40);
        let distances = correspondence_distances(&probe, &reference);
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }
}
