//! PalmPay Vision - Palm image matching pipeline
//!
//! Turns a raw capture into a comparable binary fingerprint and produces a
//! calibrated similarity score:
//!
//! - **Preprocessing**: grayscale, edge-preserving denoise, local contrast
//!   equalization, canonical resize, sharpening
//! - **Extraction**: FAST keypoints with oriented 256-bit binary descriptors,
//!   bounded keypoint budget
//! - **Scoring**: one-directional Hamming nearest-neighbour matching blended
//!   from coverage, quality, and excellence signals into a single score in
//!   [0,1]
//!
//! Everything here is a pure, CPU-bound transform over owned data; detector
//! parameters travel as plain config values, never as shared mutable state.

pub mod features;
pub mod matcher;
pub mod preprocess;

pub use features::{extract, validate_capture, ExtractorConfig, Keypoint};
pub use matcher::{score, MatchSignals};
pub use preprocess::{decode, intensity_stddev, preprocess, preprocess_bytes};
