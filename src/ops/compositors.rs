// ============================================================================
// COMPOSITORS — Copy, Mix, Blur, Level
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::canvas::ImagePair;
use crate::ops::{OpKind, Operation};
use crate::params::Parameters;

const RATIO: &str = "Ratio";
const RADIUS: &str = "Radius";
const THRESHOLD: &str = "Threshold";

/// Deep-clones the `left` buffer into `right`.
pub struct Copy;

impl Copy {
    pub fn new() -> Self {
        Copy
    }
}

impl Default for Copy {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for Copy {
    fn kind(&self) -> OpKind {
        OpKind::Copy
    }

    fn defaults(&self) -> Parameters {
        Parameters::new()
    }

    fn describe(&self, _params: &Parameters) -> String {
        "Copy: left buffer into right".into()
    }

    fn run(&self, mut input: ImagePair, _params: &Parameters) -> ImagePair {
        input.right = input.left.clone();
        input
    }
}

/// Per-pixel linear interpolation of `right` (A) towards `left` (B).
/// `Ratio = 0` keeps A exactly; `Ratio = 1` reproduces B exactly.
pub struct Mix;

impl Mix {
    pub fn new() -> Self {
        Mix
    }
}

impl Default for Mix {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for Mix {
    fn kind(&self) -> OpKind {
        OpKind::Mix
    }

    fn defaults(&self) -> Parameters {
        let mut p = Parameters::new();
        p.set(RATIO, 0.5);
        p
    }

    fn describe(&self, params: &Parameters) -> String {
        format!("Mix: ratio={}", params.get(RATIO, 0.5))
    }

    fn run(&self, mut input: ImagePair, params: &Parameters) -> ImagePair {
        let ratio = params.get(RATIO, 0.5).clamp(0.0, 1.0);
        input.right = mix_images(&input.right, &input.left, ratio);
        input
    }
}

/// Channel-independent blend: `out = a*(1-ratio) + b*ratio`, truncated.
pub fn mix_images(a: &RgbaImage, b: &RgbaImage, ratio: f64) -> RgbaImage {
    let w = a.width().min(b.width()) as usize;
    let h = a.height().min(b.height()) as usize;
    let a_raw = a.as_raw();
    let b_raw = b.as_raw();
    let a_stride = a.width() as usize * 4;
    let b_stride = b.width() as usize * 4;

    let mut raw = vec![0u8; w * h * 4];
    raw.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let ai = y * a_stride + x * 4;
            let bi = y * b_stride + x * 4;
            for c in 0..4 {
                let va = a_raw[ai + c] as f64;
                let vb = b_raw[bi + c] as f64;
                row[x * 4 + c] = (va * (1.0 - ratio) + vb * ratio).clamp(0.0, 255.0) as u8;
            }
        }
    });
    RgbaImage::from_raw(w as u32, h as u32, raw).unwrap()
}

/// Two-pass separable Gaussian blur on `right` with edge-clamped sampling.
pub struct Blur;

impl Blur {
    pub fn new() -> Self {
        Blur
    }
}

impl Default for Blur {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for Blur {
    fn kind(&self) -> OpKind {
        OpKind::Blur
    }

    fn defaults(&self) -> Parameters {
        let mut p = Parameters::new();
        p.set(RADIUS, 4.0);
        p
    }

    fn describe(&self, params: &Parameters) -> String {
        format!("Blur: radius={}", params.get(RADIUS, 4.0) as i64)
    }

    fn run(&self, mut input: ImagePair, params: &Parameters) -> ImagePair {
        let radius = params.get(RADIUS, 4.0) as i64;
        input.right = gaussian_blur(&input.right, radius);
        input
    }
}

/// 1-D Gaussian kernel of length `2*radius + 1`, sigma = radius/3, normalized.
fn build_kernel(radius: i64) -> Vec<f64> {
    let sigma = radius as f64 / 3.0;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / s2).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Separable Gaussian blur: horizontal then vertical pass, both row-parallel,
/// out-of-range taps clamped to the nearest valid column/row. A radius below
/// 1 is the identity.
pub fn gaussian_blur(src: &RgbaImage, radius: i64) -> RgbaImage {
    if radius < 1 {
        return src.clone();
    }
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }

    let kernel = build_kernel(radius);
    let r = radius as isize;
    let src_raw = src.as_raw();

    // Horizontal pass into an f64 intermediate.
    let mut mid = vec![0.0f64; w * h * 4];
    mid.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        let in_row = y * w * 4;
        for x in 0..w {
            let mut acc = [0.0f64; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - r).clamp(0, w as isize - 1) as usize;
                let idx = in_row + sx * 4;
                for c in 0..4 {
                    acc[c] += src_raw[idx + c] as f64 * kv;
                }
            }
            for c in 0..4 {
                row[x * 4 + c] = acc[c];
            }
        }
    });

    // Vertical pass back to u8, rounded.
    let mut raw = vec![0u8; w * h * 4];
    raw.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let mut acc = [0.0f64; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - r).clamp(0, h as isize - 1) as usize;
                let idx = sy * w * 4 + x * 4;
                for c in 0..4 {
                    acc[c] += mid[idx + c] * kv;
                }
            }
            for c in 0..4 {
                row[x * 4 + c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    RgbaImage::from_raw(w as u32, h as u32, raw).unwrap()
}

/// Threshold on the mean of R,G,B: below → opaque black, at/above → opaque
/// white. Alpha is forced opaque regardless of input.
pub struct Level;

impl Level {
    pub fn new() -> Self {
        Level
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for Level {
    fn kind(&self) -> OpKind {
        OpKind::Level
    }

    fn defaults(&self) -> Parameters {
        let mut p = Parameters::new();
        p.set(THRESHOLD, 128.0);
        p
    }

    fn describe(&self, params: &Parameters) -> String {
        format!("Level: threshold={}", params.get(THRESHOLD, 128.0) as i64)
    }

    fn run(&self, mut input: ImagePair, params: &Parameters) -> ImagePair {
        let threshold = params.get(THRESHOLD, 128.0).clamp(0.0, 255.0) as u8;
        input.right = level_threshold(&input.right, threshold);
        input
    }
}

pub fn level_threshold(src: &RgbaImage, threshold: u8) -> RgbaImage {
    let w = src.width() as usize;
    let src_raw = src.as_raw();
    let mut raw = vec![0u8; src_raw.len()];
    raw.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        let in_row = y * w * 4;
        for x in 0..w {
            let i = in_row + x * 4;
            let mean = (src_raw[i] as u32 + src_raw[i + 1] as u32 + src_raw[i + 2] as u32) / 3;
            let v = if mean < threshold as u32 { 0 } else { 255 };
            row[x * 4] = v;
            row[x * 4 + 1] = v;
            row[x * 4 + 2] = v;
            row[x * 4 + 3] = 255;
        }
    });
    RgbaImage::from_raw(src.width(), src.height(), raw).unwrap()
}
