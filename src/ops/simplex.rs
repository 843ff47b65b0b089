// ============================================================================
// SIMPLEX — coherent noise delegated to the OpenSimplex primitive
// ============================================================================

use image::RgbaImage;
use noise::{NoiseFn, OpenSimplex};
use rayon::prelude::*;

use crate::canvas::ImagePair;
use crate::ops::{OpContext, OpKind, Operation};
use crate::params::Parameters;

const SCALE: &str = "Scale";
const SEED: &str = "Seed";

/// Single-octave OpenSimplex field. Larger `Scale` means larger features
/// (pixel coordinates are divided by it before the lookup).
pub struct Simplex {
    res: u32,
    seed: u64,
}

impl Simplex {
    pub fn new(ctx: OpContext) -> Self {
        Self {
            res: ctx.resolution,
            seed: ctx.seed,
        }
    }
}

impl Operation for Simplex {
    fn kind(&self) -> OpKind {
        OpKind::Simplex
    }

    fn defaults(&self) -> Parameters {
        let mut p = Parameters::new();
        p.set(SCALE, 200.0);
        p.set(SEED, self.seed as f64);
        p
    }

    fn describe(&self, params: &Parameters) -> String {
        format!(
            "Simplex: scale={}, seed={}",
            params.get(SCALE, 200.0),
            params.get(SEED, self.seed as f64) as u64,
        )
    }

    fn run(&self, mut input: ImagePair, params: &Parameters) -> ImagePair {
        let scale = params.get(SCALE, 200.0).max(f64::MIN_POSITIVE);
        let seed = params.get(SEED, self.seed as f64) as u64;

        input.left = generate(self.res, scale, seed);
        input
    }
}

fn generate(res: u32, scale: f64, seed: u64) -> RgbaImage {
    let noise = OpenSimplex::new(crate::ops::fold_seed(seed));
    let w = res as usize;
    let mut raw = vec![0u8; w * w * 4];

    raw.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let n = noise.get([x as f64 / scale, y as f64 / scale]);
            let v = (((n + 1.0) / 2.0).clamp(0.0, 1.0) * 255.0).round() as u8;
            let off = x * 4;
            row[off] = v;
            row[off + 1] = v;
            row[off + 2] = v;
            row[off + 3] = 255;
        }
    });

    RgbaImage::from_raw(res, res, raw).unwrap()
}
