//! Image preprocessing: canonical grayscale normalization.
//!
//! Every capture passes through the same fixed pipeline before feature
//! detection: grayscale conversion, 3x3 median denoise, tile-based adaptive
//! contrast equalization, resize to the canonical resolution, and a
//! sharpening pass blended with the unsharpened result.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use palmpay_types::{PalmPayError, Result};

/// Minimum usable capture dimension, both axes
pub const MIN_DIMENSION: u32 = 100;

/// Canonical resolution all captures are normalized to
pub const CANONICAL_WIDTH: u32 = 400;
pub const CANONICAL_HEIGHT: u32 = 300;

/// Contrast equalization tile grid (8x8 tiles)
const EQ_TILE_GRID: u32 = 8;

/// Histogram clip limit, as a multiple of the uniform bin height
const EQ_CLIP_LIMIT: f32 = 2.0;

/// Share of the sharpened image in the final blend
const SHARPEN_MIX: f32 = 0.3;

/// Decode raw capture bytes into an image
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| PalmPayError::decode(e.to_string()))
}

/// Normalize a decoded capture into the canonical grayscale grid
///
/// Pure transform; fails only on inputs below the minimum resolution.
pub fn preprocess(image: &DynamicImage) -> Result<GrayImage> {
    let gray = image.to_luma8();
    if gray.width() < MIN_DIMENSION || gray.height() < MIN_DIMENSION {
        return Err(PalmPayError::low_quality(format!(
            "capture is {}x{}, minimum is {}x{}",
            gray.width(),
            gray.height(),
            MIN_DIMENSION,
            MIN_DIMENSION
        )));
    }

    let denoised = median_filter(&gray);
    let equalized = equalize_adaptive(&denoised);
    let resized = imageops::resize(
        &equalized,
        CANONICAL_WIDTH,
        CANONICAL_HEIGHT,
        FilterType::Triangle,
    );
    Ok(sharpen_blend(&resized))
}

/// Decode and normalize in one step
pub fn preprocess_bytes(bytes: &[u8]) -> Result<GrayImage> {
    preprocess(&decode(bytes)?)
}

/// Standard deviation of pixel intensities
///
/// Low values indicate a flat or blank capture unusable for matching.
pub fn intensity_stddev(image: &GrayImage) -> f64 {
    let n = (image.width() * image.height()) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for pixel in image.pixels() {
        let v = pixel[0] as f64;
        sum += v;
        sum_sq += v * v;
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0).sqrt()
}

/// 3x3 median filter; removes speckle noise without smearing edges
fn median_filter(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut window = [0u8; 9];
        let mut i = 0;
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                let px = (x as i32 + dx).clamp(0, width as i32 - 1) as u32;
                let py = (y as i32 + dy).clamp(0, height as i32 - 1) as u32;
                window[i] = image.get_pixel(px, py)[0];
                i += 1;
            }
        }
        window.sort_unstable();
        image::Luma([window[4]])
    })
}

/// Tile-based adaptive histogram equalization with clipped histograms
///
/// Each tile gets a clipped, redistributed histogram mapping; pixels are
/// remapped by bilinear interpolation between the four nearest tile
/// mappings to avoid visible tile seams.
fn equalize_adaptive(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let grid = EQ_TILE_GRID;
    let tile_w = width.div_ceil(grid).max(1);
    let tile_h = height.div_ceil(grid).max(1);

    // Per-tile remap tables
    let mut luts = vec![[0u8; 256]; (grid * grid) as usize];
    for ty in 0..grid {
        for tx in 0..grid {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            if x0 >= width || y0 >= height {
                continue;
            }

            let mut hist = [0u32; 256];
            let mut count = 0u32;
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[image.get_pixel(x, y)[0] as usize] += 1;
                    count += 1;
                }
            }

            // Clip bins and spread the excess uniformly
            let clip = ((EQ_CLIP_LIMIT * count as f32 / 256.0).ceil() as u32).max(1);
            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > clip {
                    excess += *bin - clip;
                    *bin = clip;
                }
            }
            let spread = excess / 256;
            for bin in hist.iter_mut() {
                *bin += spread;
            }

            let lut = &mut luts[(ty * grid + tx) as usize];
            let mut cdf = 0u64;
            for (value, bin) in hist.iter().enumerate() {
                cdf += *bin as u64;
                lut[value] = ((cdf * 255) / count.max(1) as u64).min(255) as u8;
            }
        }
    }

    let tile_index = |tx: i64, ty: i64| -> usize {
        let tx = tx.clamp(0, grid as i64 - 1) as u32;
        let ty = ty.clamp(0, grid as i64 - 1) as u32;
        (ty * grid + tx) as usize
    };

    GrayImage::from_fn(width, height, |x, y| {
        let value = image.get_pixel(x, y)[0] as usize;

        // Position relative to tile centers
        let fx = (x as f32 - tile_w as f32 / 2.0) / tile_w as f32;
        let fy = (y as f32 - tile_h as f32 / 2.0) / tile_h as f32;
        let tx0 = fx.floor() as i64;
        let ty0 = fy.floor() as i64;
        let wx = fx - tx0 as f32;
        let wy = fy - ty0 as f32;

        let v00 = luts[tile_index(tx0, ty0)][value] as f32;
        let v10 = luts[tile_index(tx0 + 1, ty0)][value] as f32;
        let v01 = luts[tile_index(tx0, ty0 + 1)][value] as f32;
        let v11 = luts[tile_index(tx0 + 1, ty0 + 1)][value] as f32;

        let top = v00 * (1.0 - wx) + v10 * wx;
        let bottom = v01 * (1.0 - wx) + v11 * wx;
        image::Luma([(top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8])
    })
}

/// Laplacian sharpening blended with the unsharpened input
fn sharpen_blend(image: &GrayImage) -> GrayImage {
    #[rustfmt::skip]
    let kernel: [f32; 9] = [
         0.0, -1.0,  0.0,
        -1.0,  5.0, -1.0,
         0.0, -1.0,  0.0,
    ];
    let sharpened: GrayImage = imageops::filter3x3(image, &kernel);

    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let original = image.get_pixel(x, y)[0] as f32;
        let sharp = sharpened.get_pixel(x, y)[0] as f32;
        let mixed = SHARPEN_MIX * sharp + (1.0 - SHARPEN_MIX) * original;
        image::Luma([mixed.round().clamp(0.0, 255.0) as u8])
    })
}
