// ============================================================================
// PERLIN — classic gradient noise with seeded permutation table
// ============================================================================

use image::RgbaImage;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::canvas::ImagePair;
use crate::ops::{OpContext, OpKind, Operation};
use crate::params::Parameters;

const FREQUENCY: &str = "Frequency";
const ITERATIONS: &str = "Iterations";
const SEED: &str = "Seed";

/// Multi-octave gradient noise written to the `left` buffer as grayscale.
pub struct Perlin {
    res: u32,
    seed: u64,
}

impl Perlin {
    pub fn new(ctx: OpContext) -> Self {
        Self {
            res: ctx.resolution,
            seed: ctx.seed,
        }
    }
}

impl Operation for Perlin {
    fn kind(&self) -> OpKind {
        OpKind::Perlin
    }

    fn defaults(&self) -> Parameters {
        let mut p = Parameters::new();
        p.set(FREQUENCY, 4.0);
        p.set(ITERATIONS, 4.0);
        p.set(SEED, self.seed as f64);
        p
    }

    fn describe(&self, params: &Parameters) -> String {
        format!(
            "Perlin: freq={}, iter={}, seed={}",
            params.get(FREQUENCY, 4.0),
            params.get(ITERATIONS, 4.0) as u32,
            params.get(SEED, self.seed as f64) as u64,
        )
    }

    fn run(&self, mut input: ImagePair, params: &Parameters) -> ImagePair {
        let base_freq = params.get(FREQUENCY, 4.0);
        let iterations = (params.get(ITERATIONS, 4.0) as u32).max(1);
        let seed = params.get(SEED, self.seed as f64) as u64;

        input.left = generate(self.res, base_freq, iterations, seed);
        input
    }
}

/// Render the octave sum for every pixel, row-parallel.
fn generate(res: u32, base_freq: f64, iterations: u32, seed: u64) -> RgbaImage {
    let table = permutation_table(seed);
    let w = res as usize;
    let mut raw = vec![0u8; w * w * 4];

    raw.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let mut amplitude = 1.0;
            let mut frequency = base_freq;
            let mut sum = 0.0;
            let mut amplitude_total = 0.0;
            for _ in 0..iterations {
                let n = noise2(
                    &table,
                    x as f64 * frequency / res as f64,
                    y as f64 * frequency / res as f64,
                );
                sum += n * amplitude;
                amplitude_total += amplitude;
                amplitude *= 0.5; // persistence
                frequency *= 2.0; // lacunarity
            }
            let normalized = ((sum / amplitude_total + 1.0) / 2.0).clamp(0.0, 1.0);
            let v = (normalized * 255.0).round() as u8;
            let off = x * 4;
            row[off] = v;
            row[off + 1] = v;
            row[off + 2] = v;
            row[off + 3] = 255;
        }
    });

    RgbaImage::from_raw(res, res, raw).unwrap()
}

/// 256-entry seeded Fisher-Yates permutation, duplicated to 512 entries so
/// `p[p[x] + y]` never needs a wraparound branch.
fn permutation_table(seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut perm: Vec<usize> = (0..256).collect();
    for i in (1..256usize).rev() {
        let j = rng.random_range(0..=i);
        perm.swap(i, j);
    }
    let mut p = vec![0usize; 512];
    for i in 0..512 {
        p[i] = perm[i & 255];
    }
    p
}

fn noise2(p: &[usize], mut x: f64, mut y: f64) -> f64 {
    let xi = (x.floor() as i64 & 255) as usize;
    let yi = (y.floor() as i64 & 255) as usize;
    x -= x.floor();
    y -= y.floor();
    let u = fade(x);
    let v = fade(y);

    let aa = p[p[xi] + yi];
    let ab = p[p[xi] + yi + 1];
    let ba = p[p[xi + 1] + yi];
    let bb = p[p[xi + 1] + yi + 1];

    let x1 = lerp(u, grad(aa, x, y), grad(ba, x - 1.0, y));
    let x2 = lerp(u, grad(ab, x, y - 1.0), grad(bb, x - 1.0, y - 1.0));
    lerp(v, x1, x2)
}

/// Smootherstep fade: 6t^5 - 15t^4 + 10t^3.
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// 8-direction gradient keyed on the low 3 bits of a permutation lookup.
fn grad(hash: usize, x: f64, y: f64) -> f64 {
    let h = hash & 7;
    let u = if h < 4 { x } else { y };
    let v = if h < 4 { y } else { x };
    let su = if h & 1 == 0 { u } else { -u };
    let sv = if h & 2 == 0 { v } else { -v };
    su + sv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_is_a_seeded_shuffle() {
        let p = permutation_table(5);
        let mut sorted: Vec<usize> = p[..256].to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..256).collect::<Vec<_>>());
        assert_eq!(&p[..256], &p[256..]);
        assert_eq!(permutation_table(5), p);
        assert_ne!(permutation_table(6), p);
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let a = generate(16, 4.0, 4, 42);
        let b = generate(16, 4.0, 4, 42);
        assert_eq!(a.as_raw(), b.as_raw());
        let c = generate(16, 4.0, 4, 43);
        assert_ne!(a.as_raw(), c.as_raw());
    }

    #[test]
    fn output_is_opaque_grayscale() {
        let img = generate(8, 4.0, 2, 1);
        for px in img.pixels() {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert_eq!(px[3], 255);
        }
    }
}
