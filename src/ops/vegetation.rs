// ============================================================================
// VEGETATION — stochastic cellular automaton on a fertility field
// ============================================================================

use image::RgbaImage;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::canvas::{ImagePair, rgb_mean};
use crate::ops::{OpContext, OpKind, Operation};
use crate::params::Parameters;

const SEEDS: &str = "Seeds";
const GROWTH: &str = "Growth";
const DEATH: &str = "Death";
const ITERATIONS: &str = "Iterations";
const SEED: &str = "Seed";

/// Growth simulation: live cells survive against a fertility-weighted death
/// rate, dead cells sprout next to live neighbors. The fertility field is the
/// mean RGB intensity of the upstream `left` buffer.
///
/// The whole simulation runs on a single sequential PRNG stream with a
/// row-major scan per generation; the draw order (including the skipped draw
/// for isolated dead cells) is part of the deterministic contract, so this
/// operation is never parallelized.
pub struct Vegetation {
    res: u32,
    seed: u64,
}

impl Vegetation {
    pub fn new(ctx: OpContext) -> Self {
        Self {
            res: ctx.resolution,
            seed: ctx.seed,
        }
    }
}

impl Operation for Vegetation {
    fn kind(&self) -> OpKind {
        OpKind::Vegetation
    }

    fn defaults(&self) -> Parameters {
        let mut p = Parameters::new();
        p.set(SEEDS, 100.0);
        p.set(GROWTH, 0.5);
        p.set(DEATH, 0.2);
        p.set(ITERATIONS, 50.0);
        p.set(SEED, self.seed as f64);
        p
    }

    fn describe(&self, params: &Parameters) -> String {
        format!(
            "Vegetation: seeds={}, growth={}, death={}, iter={}",
            params.get(SEEDS, 100.0) as u32,
            params.get(GROWTH, 0.5),
            params.get(DEATH, 0.2),
            params.get(ITERATIONS, 50.0) as u32,
        )
    }

    fn run(&self, mut input: ImagePair, params: &Parameters) -> ImagePair {
        let seeds = params.get(SEEDS, 100.0) as u32;
        let growth = params.get(GROWTH, 0.5);
        let death = params.get(DEATH, 0.2);
        let iterations = params.get(ITERATIONS, 50.0) as u32;
        let seed = params.get(SEED, self.seed as f64) as u64;

        input.left = grow(&input.left, self.res, seeds, growth, death, iterations, seed);
        input
    }
}

fn grow(
    fertility_src: &RgbaImage,
    res: u32,
    seed_count: u32,
    growth: f64,
    death: f64,
    iterations: u32,
    seed: u64,
) -> RgbaImage {
    let w = res as usize;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    // Fertility in [0,1] per cell, sampled once.
    let fertility: Vec<f64> = (0..w * w)
        .map(|i| {
            let px = fertility_src.get_pixel((i % w) as u32, (i / w) as u32);
            rgb_mean(px) / 255.0
        })
        .collect();

    let mut current = vec![false; w * w];
    let mut next = vec![false; w * w];

    for _ in 0..seed_count {
        let x = rng.random_range(0..w);
        let y = rng.random_range(0..w);
        current[y * w + x] = true;
    }

    // Synchronous generations: read `current`, write `next`, then swap.
    for _ in 0..iterations {
        for y in 0..w {
            for x in 0..w {
                let i = y * w + x;
                let fert = fertility[i];
                next[i] = if current[i] {
                    let survival = 1.0 - death * (1.0 - fert);
                    rng.random::<f64>() < survival
                } else {
                    // No live neighbor: never sprouts, and no PRNG draw.
                    live_neighbors(&current, x, y, w) > 0 && rng.random::<f64>() < fert * growth
                };
            }
        }
        std::mem::swap(&mut current, &mut next);
    }

    let mut raw = vec![0u8; w * w * 4];
    for (i, &alive) in current.iter().enumerate() {
        let v = if alive { 255 } else { 0 };
        raw[i * 4] = v;
        raw[i * 4 + 1] = v;
        raw[i * 4 + 2] = v;
        raw[i * 4 + 3] = 255;
    }
    RgbaImage::from_raw(res, res, raw).unwrap()
}

/// Live cells among the 8 wrapped neighbors of (x, y).
fn live_neighbors(grid: &[bool], x: usize, y: usize, w: usize) -> u32 {
    let mut count = 0;
    for dy in [w - 1, 0, 1] {
        for dx in [w - 1, 0, 1] {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = (x + dx) % w;
            let ny = (y + dy) % w;
            if grid[ny * w + nx] {
                count += 1;
            }
        }
    }
    count
}
