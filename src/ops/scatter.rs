// ============================================================================
// SCATTER — weighted sprite placement with toroidal wrap and AO shadows
// ============================================================================

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use noise::{NoiseFn, OpenSimplex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::canvas::ImagePair;
use crate::ops::compositors::gaussian_blur;
use crate::ops::{OpContext, OpKind, Operation};
use crate::params::Parameters;
use crate::sprites::SpriteRepository;

const QUANTITY: &str = "Quantity";
const SIZE: &str = "Size";
const STD_DEV: &str = "StdDev";
const SEED: &str = "Seed";
const AO: &str = "AO";
const RADIUS: &str = "Radius";
const DEPTH: &str = "Depth";
const SCALE: &str = "Scale";
const THRESHOLD: &str = "Threshold";

/// Stamps weighted-random sprite instances onto a fresh toroidal canvas.
///
/// Each instance consumes the shared PRNG stream in a fixed order (sprite
/// pick, size, angle, position), so the instance loop stays sequential.
/// With AO enabled, every instance first darkens the canvas under a blurred,
/// noise-modulated alpha shadow and then stamps the sprite itself as solid
/// foreground, so a sprite is never shaded by its own shadow.
pub struct Scatter {
    res: u32,
    seed: u64,
    sprites: Arc<SpriteRepository>,
}

impl Scatter {
    pub fn new(ctx: OpContext, sprites: Arc<SpriteRepository>) -> Self {
        Self {
            res: ctx.resolution,
            seed: ctx.seed,
            sprites,
        }
    }
}

impl Operation for Scatter {
    fn kind(&self) -> OpKind {
        OpKind::Scatter
    }

    fn defaults(&self) -> Parameters {
        let mut p = Parameters::new();
        p.set(QUANTITY, 10.0);
        p.set(SIZE, 64.0);
        p.set(STD_DEV, 10.0);
        p.set(SEED, self.seed as f64);
        p.set(AO, 0.0);
        p.set(RADIUS, 8.0);
        p.set(DEPTH, 0.01);
        p.set(SCALE, 0.5);
        p.set(THRESHOLD, 0.5);
        p
    }

    fn describe(&self, params: &Parameters) -> String {
        format!(
            "Scatter: quantity={}, size={}±{}, ao={}",
            params.get(QUANTITY, 10.0) as u32,
            params.get(SIZE, 64.0) as u32,
            params.get(STD_DEV, 10.0),
            params.get(AO, 0.0) > 0.5,
        )
    }

    fn run(&self, mut input: ImagePair, params: &Parameters) -> ImagePair {
        // Empty repository: documented no-op.
        if self.sprites.is_empty() || self.sprites.total_weight() == 0 {
            return input;
        }

        let quantity = params.get(QUANTITY, 10.0) as u32;
        let mean_size = params.get(SIZE, 64.0);
        let std_dev = params.get(STD_DEV, 10.0);
        let seed = params.get(SEED, self.seed as f64) as u64;
        let ao = params.get(AO, 0.0) > 0.5;
        let radius = (params.get(RADIUS, 8.0) as i64).max(0);
        let depth = params.get(DEPTH, 0.01);
        let noise_scale = params.get(SCALE, 0.5).max(f64::MIN_POSITIVE);
        let threshold = params.get(THRESHOLD, 0.5).clamp(0.0, 1.0);

        let res = self.res;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let noise = OpenSimplex::new(crate::ops::fold_seed(seed));

        let mut canvas = if ao {
            RgbaImage::from_pixel(res, res, Rgba([255, 255, 255, 255]))
        } else {
            RgbaImage::new(res, res)
        };

        for _ in 0..quantity {
            let index = match self.sprites.pick_index(&mut rng) {
                Some(i) => i,
                None => break,
            };
            let sprite = self.sprites.sprite(index);

            let z: f64 = rng.sample(StandardNormal);
            let size = ((z * std_dev + mean_size).round() as i64).max(1) as u32;
            let angle = rng.random::<f64>() * std::f64::consts::TAU;
            let stamped = transform_sprite(sprite, size, angle);

            let x0 = rng.random_range(0..res) as i64;
            let y0 = rng.random_range(0..res) as i64;

            if ao {
                shadow_pass(
                    &mut canvas,
                    &stamped,
                    x0,
                    y0,
                    radius,
                    depth,
                    threshold,
                    noise_scale,
                    &noise,
                );
                // Foreground pass: solid white, after the shadow.
                stamp_solid(&mut canvas, &stamped, x0, y0);
            } else {
                blit_wrapped(&mut canvas, &stamped, x0, y0);
            }
        }

        input.left = canvas;
        input
    }
}

/// Resample `sprite` into a `size`×`size` buffer through the inverse of the
/// similarity transform (scale to `size`, rotate by `angle` around the
/// center), with bilinear interpolation and transparent outside.
pub(crate) fn transform_sprite(sprite: &RgbaImage, size: u32, angle: f64) -> RgbaImage {
    let (sw, sh) = (sprite.width() as f64, sprite.height() as f64);
    let scale_x = size as f64 / sw;
    let scale_y = size as f64 / sh;
    let center = size as f64 / 2.0;
    let (sin, cos) = angle.sin_cos();

    RgbaImage::from_fn(size, size, |x, y| {
        let dx = x as f64 - center;
        let dy = y as f64 - center;
        // Rotate by -angle, then undo the scale, then re-center on the source.
        let rx = dx * cos + dy * sin;
        let ry = -dx * sin + dy * cos;
        let sx = rx / scale_x + sw / 2.0;
        let sy = ry / scale_y + sh / 2.0;
        bilinear(sprite, sx, sy)
    })
}

/// Bilinear sample with transparent-black outside the source bounds.
fn bilinear(img: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let tap = |ix: f64, iy: f64| -> [f64; 4] {
        if ix < 0.0 || iy < 0.0 || ix >= img.width() as f64 || iy >= img.height() as f64 {
            [0.0; 4]
        } else {
            let p = img.get_pixel(ix as u32, iy as u32);
            [p[0] as f64, p[1] as f64, p[2] as f64, p[3] as f64]
        }
    };

    let p00 = tap(x0, y0);
    let p10 = tap(x0 + 1.0, y0);
    let p01 = tap(x0, y0 + 1.0);
    let p11 = tap(x0 + 1.0, y0 + 1.0);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Copy every non-transparent sprite pixel onto the canvas with toroidal
/// wrap: destination coordinates are taken modulo the resolution and kept
/// non-negative, so a sprite straddling an edge paints on both sides.
pub fn blit_wrapped(canvas: &mut RgbaImage, sprite: &RgbaImage, x0: i64, y0: i64) {
    let res = canvas.width() as i64;
    for y in 0..sprite.height() {
        for x in 0..sprite.width() {
            let px = sprite.get_pixel(x, y);
            if px[3] == 0 {
                continue;
            }
            let dx = (x0 + x as i64).rem_euclid(res) as u32;
            let dy = (y0 + y as i64).rem_euclid(res) as u32;
            canvas.put_pixel(dx, dy, *px);
        }
    }
}

/// Stamp every non-transparent sprite pixel as opaque white.
fn stamp_solid(canvas: &mut RgbaImage, sprite: &RgbaImage, x0: i64, y0: i64) {
    let res = canvas.width() as i64;
    for y in 0..sprite.height() {
        for x in 0..sprite.width() {
            if sprite.get_pixel(x, y)[3] == 0 {
                continue;
            }
            let dx = (x0 + x as i64).rem_euclid(res) as u32;
            let dy = (y0 + y as i64).rem_euclid(res) as u32;
            canvas.put_pixel(dx, dy, Rgba([255, 255, 255, 255]));
        }
    }
}

/// Darken the canvas under the blurred alpha silhouette of one sprite
/// instance, modulated by thresholded coherent noise and the AO depth.
#[allow(clippy::too_many_arguments)]
fn shadow_pass(
    canvas: &mut RgbaImage,
    stamped: &RgbaImage,
    x0: i64,
    y0: i64,
    radius: i64,
    depth: f64,
    threshold: f64,
    noise_scale: f64,
    noise: &OpenSimplex,
) {
    let res = canvas.width() as i64;
    let size = stamped.width() as i64;
    let ext = (size + radius * 2) as u32;

    // Extended alpha mask: the sprite silhouette with room for the blur to
    // bleed outward by `radius` on every side.
    let mut mask = RgbaImage::new(ext, ext);
    blit_offset(&mut mask, stamped, radius, radius);
    let blurred = gaussian_blur(&mask, radius);

    for y in 0..ext {
        for x in 0..ext {
            let alpha = blurred.get_pixel(x, y)[3];
            if alpha == 0 {
                continue;
            }
            let dx = (x0 + x as i64 - radius).rem_euclid(res) as u32;
            let dy = (y0 + y as i64 - radius).rem_euclid(res) as u32;

            let n = (noise.get([dx as f64 / noise_scale, dy as f64 / noise_scale]) + 1.0) / 2.0;
            let gate = if threshold < 1.0 {
                ((n - threshold) / (1.0 - threshold)).max(0.0)
            } else {
                0.0
            };
            let strength = (alpha as f64 / 255.0) * gate * depth;

            let current = canvas.get_pixel(dx, dy)[0] as f64;
            let shaded = (current - strength * 255.0).max(0.0) as u8;
            canvas.put_pixel(dx, dy, Rgba([shaded, shaded, shaded, 255]));
        }
    }
}

/// Unwrapped copy used to build the extended mask.
fn blit_offset(dst: &mut RgbaImage, src: &RgbaImage, x0: i64, y0: i64) {
    for y in 0..src.height() {
        for x in 0..src.width() {
            let dx = x0 + x as i64;
            let dy = y0 + y as i64;
            if dx >= 0 && dy >= 0 && (dx as u32) < dst.width() && (dy as u32) < dst.height() {
                dst.put_pixel(dx as u32, dy as u32, *src.get_pixel(x, y));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_sprite(side: u32) -> RgbaImage {
        RgbaImage::from_pixel(side, side, Rgba([255, 255, 255, 255]))
    }

    fn ctx(res: u32) -> OpContext {
        OpContext {
            resolution: res,
            seed: 0,
        }
    }

    #[test]
    fn empty_repository_is_a_no_op() {
        let repo = Arc::new(SpriteRepository::new());
        let op = Scatter::new(ctx(16), repo);
        let mut pair = ImagePair::new(16);
        pair.left.put_pixel(3, 3, Rgba([9, 9, 9, 9]));
        let before = pair.clone();
        let out = op.run(pair, &op.defaults());
        assert_eq!(out, before);
    }

    #[test]
    fn wrapped_blit_paints_both_edges() {
        // A 4-wide sprite placed at x = res-2 must paint columns res-2,
        // res-1, 0 and 1.
        let mut canvas = RgbaImage::new(16, 16);
        blit_wrapped(&mut canvas, &white_sprite(4), 14, 0);
        for x in [14u32, 15, 0, 1] {
            assert_eq!(canvas.get_pixel(x, 0)[0], 255, "column {}", x);
        }
        assert_eq!(canvas.get_pixel(2, 0)[3], 0);
    }

    #[test]
    fn wrapped_blit_skips_transparent_pixels() {
        let mut canvas = RgbaImage::new(8, 8);
        let mut sprite = white_sprite(2);
        sprite.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        blit_wrapped(&mut canvas, &sprite, 0, 0);
        assert_eq!(canvas.get_pixel(0, 0)[3], 0);
        assert_eq!(canvas.get_pixel(1, 0)[3], 255);
    }

    #[test]
    fn transform_preserves_size_and_center() {
        let sprite = white_sprite(8);
        let out = transform_sprite(&sprite, 12, 0.7);
        assert_eq!(out.dimensions(), (12, 12));
        // The center of a solid sprite survives any rotation.
        assert_eq!(out.get_pixel(6, 6)[3], 255);
    }

    #[test]
    fn scatter_is_deterministic_per_seed() {
        let mut repo = SpriteRepository::new();
        repo.add(white_sprite(4), 1);
        let repo = Arc::new(repo);
        let op = Scatter::new(ctx(32), Arc::clone(&repo));

        let mut params = op.defaults();
        params.set("Quantity", 6.0).set("Size", 5.0).set("Seed", 42.0);
        let a = op.run(ImagePair::new(32), &params);
        let b = op.run(ImagePair::new(32), &params);
        assert_eq!(a, b);

        params.set("Seed", 43.0);
        let c = op.run(ImagePair::new(32), &params);
        assert_ne!(a, c);
    }

    #[test]
    fn ao_mode_darkens_around_sprites() {
        let mut repo = SpriteRepository::new();
        repo.add(white_sprite(4), 1);
        let op = Scatter::new(ctx(24), Arc::new(repo));

        let mut params = op.defaults();
        params
            .set("Quantity", 3.0)
            .set("Size", 4.0)
            .set("StdDev", 0.0)
            .set("Seed", 7.0)
            .set("AO", 1.0)
            .set("Radius", 3.0)
            .set("Depth", 1.0)
            .set("Threshold", 0.0)
            .set("Scale", 1.0);
        let out = op.run(ImagePair::new(24), &params);

        // Canvas starts white; the shadow pass must have pulled some pixel
        // below full brightness while sprites stay solid white.
        let min = out.left.pixels().map(|p| p[0]).min().unwrap();
        let max = out.left.pixels().map(|p| p[0]).max().unwrap();
        assert!(min < 255, "no pixel was darkened");
        assert_eq!(max, 255);
        assert!(out.left.pixels().all(|p| p[3] == 255));
    }
}
