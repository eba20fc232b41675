//! Keypoint detection and binary descriptor extraction.
//!
//! FAST-9 corners with a cardinal-point pre-check and grid non-maximum
//! suppression, followed by an intensity-centroid orientation estimate and a
//! 256-bit rotated binary descriptor per keypoint. The keypoint budget is
//! bounded; the strongest responses win.

use image::GrayImage;
use palmpay_types::{CaptureValidity, Descriptor, DescriptorSet, PalmPayError, Result};
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

use crate::preprocess::{self, MIN_DIMENSION};

/// Detector and validation parameters
///
/// A plain configuration value passed into pure functions; no shared mutable
/// detector state exists across calls.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// FAST intensity threshold
    pub fast_threshold: u8,
    /// Upper bound on keypoints kept per image
    pub max_keypoints: usize,
    /// Minimum descriptors for a capture to validate
    pub min_descriptors: usize,
    /// Minimum intensity standard deviation for a capture to validate
    pub min_contrast_stddev: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            max_keypoints: 500,
            min_descriptors: 10,
            min_contrast_stddev: 20.0,
        }
    }
}

/// A detected corner with its response strength and orientation
#[derive(Debug, Clone, Copy)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
    pub response: f32,
    pub angle: f32,
}

/// Pixel radius for grid non-maximum suppression
const NMS_RADIUS: f32 = 5.0;

/// Patch radius for the intensity-centroid orientation estimate
const ORIENTATION_RADIUS: i32 = 15;

/// Contiguous circle pixels required for a FAST-9 corner
const FAST_ARC_LENGTH: usize = 9;

/// The 16-pixel Bresenham circle of radius 3 used by FAST
#[rustfmt::skip]
const FAST_CIRCLE: [(i32, i32); 16] = [
    (0, -3), (1, -3), (2, -2), (3, -1), (3, 0), (3, 1),
    (2, 2), (1, 3), (0, 3), (-1, 3), (-2, 2), (-3, 1),
    (-3, 0), (-3, -1), (-2, -2), (-1, -3),
];

// Fixed test-point pairs for the 256-bit binary descriptor, one (x1,y1,x2,y2)
// per bit, learned offline for decorrelated comparisons.
#[rustfmt::skip]
const DESCRIPTOR_PATTERN: [(i8, i8, i8, i8); 256] = [
    (8, -3, 9, 5), (-11, 9, -8, 2), (3, -12, -13, 2), (-3, -7, -4, 5),
    (1, -11, 12, -2), (1, -1, 11, -1), (4, -2, -5, -8), (2, -13, -8, 9),
    (-11, 1, 6, 2), (11, 11, 12, -1), (6, -12, -9, -8), (12, 5, 3, -6),
    (1, 1, -4, -1), (7, -4, -6, 7), (-3, 2, 9, -8), (-4, -8, 3, 3),
    (-5, 3, 0, -4), (2, -11, -13, 0), (10, 5, 5, 2), (0, 9, 10, -3),
    (5, -8, -10, 1), (8, 3, -8, -5), (2, -6, -9, -4), (-12, 2, 0, -10),
    (5, -10, -7, -2), (-7, 9, -1, 0), (0, -1, -3, 3), (-12, 5, -2, -1),
    (-1, 1, -5, -11), (-1, 2, -3, 0), (-5, -6, 7, -1), (4, 7, 0, -8),
    (-9, 9, 3, -13), (7, -3, 13, -7), (10, -4, -5, 3), (6, 1, -13, -13),
    (-12, -11, 7, 0), (0, -1, -8, -6), (-10, -5, -6, 7), (10, 2, -6, -12),
    (-11, 8, 4, -2), (9, 0, -11, -4), (0, 11, 6, -11), (4, 1, -10, -3),
    (-6, 12, 1, 12), (-4, -8, 8, -7), (-3, 0, 8, 3), (3, 3, -3, -1),
    (-6, -11, -2, 12), (0, -3, -6, -3), (-6, 3, -12, -8), (6, 3, -2, -10),
    (-3, -10, -1, 0), (11, 2, 11, 3), (1, -8, -10, 8), (2, -2, -7, 8),
    (0, -13, 13, 0), (6, -9, -1, -1), (7, 5, 6, 3), (-13, 7, -7, -7),
    (-5, -13, 5, -11), (6, 7, -2, 12), (-6, -11, 8, 6), (-2, -2, -5, 9),
    (5, 4, 7, -6), (0, 11, -4, -5), (10, 1, 2, -8), (-3, -10, -10, -10),
    (1, 9, 6, -5), (-7, -11, 11, 3), (11, -2, -4, 3), (7, -1, 5, 12),
    (-5, 5, -2, -5), (8, -11, -1, -13), (-13, 2, -11, -8), (-2, 9, 5, 0),
    (2, -5, 2, 0), (3, -13, -12, 9), (6, -3, 5, 4), (10, 10, 1, -9),
    (-13, -8, -4, 10), (2, -2, -3, 8), (-13, -11, -8, -3), (2, -4, -7, -3),
    (12, 0, -2, 13), (-11, 7, -10, -1), (-5, -10, 0, -11), (6, 7, 12, -3),
    (-1, -1, 8, -6), (-6, 3, -1, -3), (-2, -11, -11, -3), (12, -2, 3, -10),
    (-11, -1, -2, -8), (3, -1, 7, 3), (2, -2, -12, 12), (6, -4, 12, -2),
    (-3, 11, 2, -12), (-1, 3, 2, 3), (1, 3, -11, -3), (2, -8, -7, -5),
    (0, -5, -11, -6), (-12, 8, -2, 9), (3, -7, 9, -8), (-10, -6, -1, -11),
    (11, -6, -3, -13), (3, 0, 0, -8), (-5, -2, -1, -13), (-8, -5, -10, -13),
    (7, -13, 0, -3), (1, -4, -1, -13), (6, -5, -7, 8), (8, 7, -5, -13),
    (2, 0, -8, -6), (-8, -3, -13, -6), (-6, 5, 0, 6), (-8, 8, -9, 1),
    (10, 1, -9, 4), (-4, -8, -5, 7), (7, 7, 10, -8), (-7, -3, -1, 1),
    (10, -1, 3, 1), (5, 6, -10, -8), (-6, -13, 5, -8), (4, -3, -4, -13),
    (-3, 4, -2, -13), (10, -11, 9, 11), (-9, 0, 12, 2), (-4, -2, 13, -6),
    (2, -10, -6, 1), (11, -13, 4, -13), (1, -1, 1, 9), (1, -5, -13, -5),
    (7, 4, 12, -7), (0, -2, -8, 3), (7, 2, 2, -8), (-2, 7, -12, -4),
    (1, 11, 6, -2), (-1, -1, -4, 10), (0, 8, 0, -13), (3, 12, 5, -13),
    (-9, -1, 9, -13), (12, 4, -6, -4), (-13, 13, 1, -4), (0, -2, -7, -9),
    (10, -8, -13, 3), (2, -13, 6, 8), (10, -6, -7, 0), (-11, 7, -1, -7),
    (12, 0, 5, -4), (-7, -8, 4, -12), (-13, 5, -5, -2), (0, 5, 4, 4),
    (-2, -11, -1, 8), (9, 3, -1, -12), (0, 6, -10, 12), (1, -8, -7, -10),
    (-6, 4, -6, 3), (5, 1, -3, -9), (-6, 6, -6, 3), (7, -8, 1, -7),
    (3, 8, -9, -5), (2, -4, 5, 7), (11, 4, 6, -3), (-8, -1, 11, -1),
    (-3, -6, -10, -8), (2, 7, 3, -12), (-4, -10, 12, -3), (1, -2, -4, 6),
    (3, 11, -11, 0), (-6, 2, 3, -8), (6, 12, 0, -13), (3, 2, -2, -5),
    (-4, 1, -6, 5), (-12, 0, -13, 9), (-6, 2, 7, -8), (-2, -4, -6, 5),
    (0, 0, 0, -13), (9, -13, -2, 0), (3, -13, 5, -12), (10, 11, -13, -13),
    (-2, 3, -12, 3), (11, 7, -7, 0), (12, 2, 1, -13), (12, -11, 12, -8),
    (-7, -2, -4, -7), (7, 5, -1, -13), (-5, -8, -9, 10), (6, 0, -3, -13),
    (12, 4, -13, 1), (-7, 8, 8, -3), (10, -4, 0, -13), (2, 1, -7, 0),
    (-5, 4, 2, -8), (12, 8, 4, -13), (8, 7, -10, 0), (-3, 6, -2, 4),
    (-5, -1, -8, -12), (4, -1, -2, -10), (6, -4, -13, 9), (-7, 8, -6, -12),
    (-10, 2, -13, 10), (-1, -7, 0, 2), (-5, 6, -5, -12), (6, -13, 7, -3),
    (-13, 2, -1, 8), (2, 8, -13, 0), (-6, -9, 1, -4), (-9, 13, 0, -13),
    (-2, -3, 8, 0), (4, 0, -11, 12), (0, 3, -10, 10), (-6, -9, -3, -2),
    (9, -4, -6, 2), (5, 0, -13, -10), (-3, -8, -13, 3), (-12, -1, -4, -2),
    (7, -9, -4, 3), (-8, -4, 1, 11), (11, 6, 2, -12), (6, 6, -8, 12),
    (-3, -8, 2, -10), (2, 5, -8, 8), (-9, 8, -6, -8), (-4, 0, -11, -7),
    (7, 6, -3, 8), (-5, 7, -12, 5), (2, -8, -5, 1), (0, 4, -5, -3),
    (9, -9, -6, -12), (0, -13, 0, -13), (-7, -11, -3, -13), (6, -12, -7, 10),
    (6, -8, -13, 7), (8, 7, -11, -1), (-11, -5, -6, 9), (6, 4, 2, -13),
    (-1, -6, 3, -9), (1, -4, 4, -3), (-6, 8, -12, 0), (-11, 3, -6, 2),
    (7, -10, 11, -6), (5, 0, 12, -13), (4, -8, 1, -1), (-13, 12, -6, 3),
    (1, 4, -9, -2), (-8, -12, -8, 7), (-9, 5, 0, -5), (9, 7, 5, 3),
    (-12, -2, 8, -8), (3, 7, 12, -8), (-13, 3, -1, -1), (-10, -4, -10, 12),
    (5, -2, 0, 13), (-7, 1, -12, 8), (2, 9, -5, -11), (11, -13, 0, 2),
];

/// Extract the binary descriptor set from a canonical grayscale grid
///
/// Returns `NoFeatures` when zero descriptors are produced (featureless or
/// saturated capture) — a recoverable condition, not fatal to the process.
pub fn extract(image: &GrayImage, config: &ExtractorConfig) -> Result<DescriptorSet> {
    let keypoints = detect_keypoints(image, config);
    if keypoints.is_empty() {
        return Err(PalmPayError::NoFeatures);
    }

    let descriptors: Vec<Descriptor> = keypoints
        .par_iter()
        .map(|kp| compute_descriptor(image, kp))
        .collect();

    debug!(count = descriptors.len(), "extracted descriptors");
    Ok(DescriptorSet::new(descriptors))
}

/// Reject unusable captures before extraction
///
/// Checks, in order: decodability, minimum dimensions, intensity variance,
/// and the minimum descriptor count after a full extraction pass.
pub fn validate_capture(bytes: &[u8], config: &ExtractorConfig) -> CaptureValidity {
    let decoded = match preprocess::decode(bytes) {
        Ok(image) => image,
        Err(_) => return CaptureValidity::rejected("unreadable or corrupt image"),
    };

    let gray = decoded.to_luma8();
    if gray.width() < MIN_DIMENSION || gray.height() < MIN_DIMENSION {
        return CaptureValidity::rejected("image too small for palm recognition");
    }

    if preprocess::intensity_stddev(&gray) < config.min_contrast_stddev {
        return CaptureValidity::rejected("insufficient contrast");
    }

    let canonical = match preprocess::preprocess(&decoded) {
        Ok(canonical) => canonical,
        Err(_) => return CaptureValidity::rejected("image too small for palm recognition"),
    };
    match extract(&canonical, config) {
        Ok(set) if set.len() >= config.min_descriptors => CaptureValidity::ok(),
        _ => CaptureValidity::rejected("too few distinctive features detected"),
    }
}

/// Detect FAST corners, orient them, and keep the strongest under the budget
pub fn detect_keypoints(image: &GrayImage, config: &ExtractorConfig) -> Vec<Keypoint> {
    let (width, height) = image.dimensions();
    if width < 7 || height < 7 {
        return Vec::new();
    }

    let candidates: Vec<Keypoint> = (3..height - 3)
        .into_par_iter()
        .flat_map_iter(|y| {
            let mut row = Vec::new();
            for x in 3..width - 3 {
                let center = image.get_pixel(x, y)[0];
                if !fast_pre_check(image, x, y, center, config.fast_threshold) {
                    continue;
                }
                if is_fast_corner(image, x, y, center, config.fast_threshold) {
                    row.push(Keypoint {
                        x,
                        y,
                        response: corner_response(image, x, y),
                        angle: 0.0,
                    });
                }
            }
            row
        })
        .collect();

    let mut keypoints = suppress_non_maxima(candidates, config.max_keypoints);
    keypoints
        .par_iter_mut()
        .for_each(|kp| kp.angle = keypoint_orientation(image, kp.x, kp.y));
    keypoints
}

/// Quick rejection using the four cardinal circle pixels
fn fast_pre_check(image: &GrayImage, x: u32, y: u32, center: u8, threshold: u8) -> bool {
    let bright = center.saturating_add(threshold);
    let dark = center.saturating_sub(threshold);

    let cardinal = [
        image.get_pixel(x, y - 3)[0],
        image.get_pixel(x + 3, y)[0],
        image.get_pixel(x, y + 3)[0],
        image.get_pixel(x - 3, y)[0],
    ];

    let brighter = cardinal.iter().filter(|&&p| p > bright).count();
    let darker = cardinal.iter().filter(|&&p| p < dark).count();
    brighter >= 3 || darker >= 3
}

/// Full FAST-9 test: a contiguous arc of 9 circle pixels all brighter or all
/// darker than the center by the threshold
fn is_fast_corner(image: &GrayImage, x: u32, y: u32, center: u8, threshold: u8) -> bool {
    let bright = center.saturating_add(threshold);
    let dark = center.saturating_sub(threshold);

    let mut longest_bright = 0;
    let mut longest_dark = 0;
    let mut run_bright = 0;
    let mut run_dark = 0;

    // Walk the circle twice to handle arcs that wrap around
    for i in 0..FAST_CIRCLE.len() * 2 {
        let (dx, dy) = FAST_CIRCLE[i % FAST_CIRCLE.len()];
        let pixel = image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0];

        if pixel > bright {
            run_bright += 1;
            run_dark = 0;
            longest_bright = longest_bright.max(run_bright);
        } else if pixel < dark {
            run_dark += 1;
            run_bright = 0;
            longest_dark = longest_dark.max(run_dark);
        } else {
            run_bright = 0;
            run_dark = 0;
        }
    }

    longest_bright >= FAST_ARC_LENGTH || longest_dark >= FAST_ARC_LENGTH
}

/// Local intensity variance as the corner response strength
fn corner_response(image: &GrayImage, x: u32, y: u32) -> f32 {
    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    let mut count = 0u32;

    for dy in -2i32..=2 {
        for dx in -2i32..=2 {
            let px = x as i32 + dx;
            let py = y as i32 + dy;
            if px >= 0 && py >= 0 && (px as u32) < image.width() && (py as u32) < image.height() {
                let v = image.get_pixel(px as u32, py as u32)[0] as f32;
                sum += v;
                sum_sq += v * v;
                count += 1;
            }
        }
    }

    let mean = sum / count as f32;
    (sum_sq / count as f32 - mean * mean).max(0.0).sqrt()
}

/// Grid-based non-maximum suppression bounded by the keypoint budget
fn suppress_non_maxima(mut candidates: Vec<Keypoint>, budget: usize) -> Vec<Keypoint> {
    if candidates.is_empty() {
        return candidates;
    }

    candidates
        .par_sort_by(|a, b| b.response.partial_cmp(&a.response).unwrap_or(Ordering::Equal));

    let mut occupied = std::collections::HashSet::new();
    let mut selected = Vec::new();

    for kp in candidates {
        let gx = (kp.x as f32 / NMS_RADIUS) as i32;
        let gy = (kp.y as f32 / NMS_RADIUS) as i32;

        let mut is_maximum = true;
        'grid: for dy in -1..=1 {
            for dx in -1..=1 {
                if occupied.contains(&(gx + dx, gy + dy)) {
                    is_maximum = false;
                    break 'grid;
                }
            }
        }

        if is_maximum {
            occupied.insert((gx, gy));
            selected.push(kp);
            if selected.len() >= budget {
                break;
            }
        }
    }

    selected
}

/// Intensity-centroid orientation of the patch around a keypoint
fn keypoint_orientation(image: &GrayImage, x: u32, y: u32) -> f32 {
    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;

    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            let px = x as i32 + dx;
            let py = y as i32 + dy;
            if px < 0 || py < 0 || px as u32 >= image.width() || py as u32 >= image.height() {
                continue;
            }
            if dx * dx + dy * dy > ORIENTATION_RADIUS * ORIENTATION_RADIUS {
                continue;
            }
            let v = image.get_pixel(px as u32, py as u32)[0] as f32;
            m01 += v * dy as f32;
            m10 += v * dx as f32;
        }
    }

    m01.atan2(m10)
}

/// 256-bit binary descriptor from rotated intensity comparisons
fn compute_descriptor(image: &GrayImage, kp: &Keypoint) -> Descriptor {
    let mut bytes = [0u8; 32];
    let (cos_a, sin_a) = (kp.angle.cos(), kp.angle.sin());
    let (width, height) = (image.width() as i32, image.height() as i32);

    let sample = |dx: i8, dy: i8| -> u8 {
        // Rotate the test point into the keypoint's orientation frame
        let rx = (dx as f32 * cos_a - dy as f32 * sin_a).round() as i32;
        let ry = (dx as f32 * sin_a + dy as f32 * cos_a).round() as i32;
        let px = (kp.x as i32 + rx).clamp(0, width - 1) as u32;
        let py = (kp.y as i32 + ry).clamp(0, height - 1) as u32;
        image.get_pixel(px, py)[0]
    };

    for (byte_idx, tests) in DESCRIPTOR_PATTERN.chunks(8).enumerate() {
        let mut byte = 0u8;
        for (bit_idx, &(x1, y1, x2, y2)) in tests.iter().enumerate() {
            if sample(x1, y1) < sample(x2, y2) {
                byte |= 1 << bit_idx;
            }
        }
        bytes[byte_idx] = byte;
    }

    Descriptor(bytes)
}
