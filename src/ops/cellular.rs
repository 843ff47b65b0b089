// ============================================================================
// CELLULAR — Voronoi / cell-noise distance fields on the toroidal domain
// ============================================================================

use image::RgbaImage;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::canvas::ImagePair;
use crate::ops::{OpContext, OpKind, Operation};
use crate::params::Parameters;

const POINTS: &str = "Points";
const CELLS: &str = "Cells";
const GAUSSIAN: &str = "Gaussian";
const SEED: &str = "Seed";

/// Minimum-distance field to N random seed points, normalized by the
/// maximum observed distance. Distances wrap at the image edges so the
/// field tiles seamlessly.
pub struct Voronoi {
    res: u32,
    seed: u64,
}

impl Voronoi {
    pub fn new(ctx: OpContext) -> Self {
        Self {
            res: ctx.resolution,
            seed: ctx.seed,
        }
    }
}

impl Operation for Voronoi {
    fn kind(&self) -> OpKind {
        OpKind::Voronoi
    }

    fn defaults(&self) -> Parameters {
        let mut p = Parameters::new();
        p.set(POINTS, 20.0);
        p.set(SEED, self.seed as f64);
        p
    }

    fn describe(&self, params: &Parameters) -> String {
        format!(
            "Voronoi: points={}, seed={}",
            params.get(POINTS, 20.0) as u32,
            params.get(SEED, self.seed as f64) as u64,
        )
    }

    fn run(&self, mut input: ImagePair, params: &Parameters) -> ImagePair {
        let points = params.get(POINTS, 20.0) as u32;
        let seed = params.get(SEED, self.seed as f64) as u64;
        input.left = generate(self.res, points, 0.0, seed);
        input
    }
}

/// Voronoi distance field blended with a Gaussian-weighted falloff by the
/// `Gaussian` percentage.
pub struct CellNoise {
    res: u32,
    seed: u64,
}

impl CellNoise {
    pub fn new(ctx: OpContext) -> Self {
        Self {
            res: ctx.resolution,
            seed: ctx.seed,
        }
    }
}

impl Operation for CellNoise {
    fn kind(&self) -> OpKind {
        OpKind::CellNoise
    }

    fn defaults(&self) -> Parameters {
        let mut p = Parameters::new();
        p.set(CELLS, 10.0);
        p.set(GAUSSIAN, 40.0);
        p.set(SEED, self.seed as f64);
        p
    }

    fn describe(&self, params: &Parameters) -> String {
        format!(
            "CellNoise: cells={}, gaussian={}%, seed={}",
            params.get(CELLS, 10.0) as u32,
            params.get(GAUSSIAN, 40.0) as u32,
            params.get(SEED, self.seed as f64) as u64,
        )
    }

    fn run(&self, mut input: ImagePair, params: &Parameters) -> ImagePair {
        let cells = params.get(CELLS, 10.0) as u32;
        let mix = (params.get(GAUSSIAN, 40.0) / 100.0).clamp(0.0, 1.0);
        let seed = params.get(SEED, self.seed as f64) as u64;
        input.left = generate(self.res, cells, mix, seed);
        input
    }
}

/// Shortest wrapped distance between two coordinates on a torus of size `res`.
#[inline]
fn toroidal_delta(a: f64, b: f64, res: f64) -> f64 {
    let d = (a - b).abs();
    d.min(res - d)
}

/// Render the normalized minimum-distance field. `gaussian_mix` = 0 gives
/// the pure linear field; 1 gives the pure Gaussian falloff.
pub(crate) fn generate(res: u32, point_count: u32, gaussian_mix: f64, seed: u64) -> RgbaImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let resf = res as f64;
    let points: Vec<(f64, f64)> = (0..point_count)
        .map(|_| (rng.random::<f64>() * resf, rng.random::<f64>() * resf))
        .collect();

    let w = res as usize;
    if points.is_empty() {
        // No seed points: the field is defined as all-black.
        let mut img = RgbaImage::new(res, res);
        img.pixels_mut().for_each(|px| px.0 = [0, 0, 0, 255]);
        return img;
    }

    // Pass 1: per-pixel minimum toroidal distance, row-parallel.
    let mut field = vec![0.0f64; w * w];
    field.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, cell) in row.iter_mut().enumerate() {
            let mut min_d2 = f64::INFINITY;
            for &(px, py) in &points {
                let dx = toroidal_delta(x as f64, px, resf);
                let dy = toroidal_delta(y as f64, py, resf);
                let d2 = dx * dx + dy * dy;
                if d2 < min_d2 {
                    min_d2 = d2;
                }
            }
            *cell = min_d2.sqrt();
        }
    });

    let max_d = field.iter().cloned().fold(0.0f64, f64::max);

    // Pass 2: normalize and blend with the Gaussian falloff.
    let sigma = max_d / 3.0;
    let mut raw = vec![0u8; w * w * 4];
    raw.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let d = field[y * w + x];
            let linear = if max_d > 0.0 { d / max_d } else { 0.0 };
            let value = if gaussian_mix > 0.0 && sigma > 0.0 {
                let gauss = 1.0 - (-(d * d) / (2.0 * sigma * sigma)).exp();
                linear * (1.0 - gaussian_mix) + gauss * gaussian_mix
            } else {
                linear
            };
            let v = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
            let off = x * 4;
            row[off] = v;
            row[off + 1] = v;
            row[off + 2] = v;
            row[off + 3] = 255;
        }
    });

    RgbaImage::from_raw(res, res, raw).unwrap()
}
