// ============================================================================
// CANVAS — the ImagePair flowing between pipeline stages
// ============================================================================

use std::hash::Hasher;

use image::{Rgba, RgbaImage};

/// The two working buffers threaded through the operation pipeline.
///
/// `left` is the generator scratch buffer (noise generators and scatter write
/// here); `right` is the composite target (compositors read `left` and write
/// `right`, and `right` is what gets exported). Both buffers always exist and
/// share the configured square resolution. Fresh buffers are zeroed
/// (transparent black), matching an untouched render target.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePair {
    pub left: RgbaImage,
    pub right: RgbaImage,
}

impl ImagePair {
    /// A freshly initialized pair at the given square resolution.
    pub fn new(res: u32) -> Self {
        Self {
            left: RgbaImage::new(res, res),
            right: RgbaImage::new(res, res),
        }
    }

    pub fn resolution(&self) -> u32 {
        self.left.width()
    }

    /// Content fingerprint over both buffers.
    ///
    /// Used as an implicit memoization key: when a layer's upstream input
    /// changes (for example after a layer removal), the fingerprint changes
    /// and forces recomputation even if the layer's own parameters did not.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        hasher.write_u32(self.left.width());
        hasher.write_u32(self.left.height());
        hasher.write(self.left.as_raw());
        hasher.write(self.right.as_raw());
        hasher.finish()
    }
}

/// Opaque grayscale pixel.
#[inline]
pub fn gray(v: u8) -> Rgba<u8> {
    Rgba([v, v, v, 255])
}

/// Mean of the three color channels, in `[0, 255]`.
#[inline]
pub fn rgb_mean(px: &Rgba<u8>) -> f64 {
    (px[0] as f64 + px[1] as f64 + px[2] as f64) / 3.0
}
