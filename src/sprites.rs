// ============================================================================
// SPRITE REPOSITORY — weighted sprite images consumed by the scatter pass
// ============================================================================

use std::path::Path;

use image::RgbaImage;
use rand::Rng;

use crate::error::{Error, Result};
use crate::log_warn;

/// One sprite with its integer selection weight.
#[derive(Debug, Clone)]
pub struct Sprite {
    pub image: RgbaImage,
    pub weight: u32,
}

/// Ordered collection of sprites with weighted-random selection.
///
/// The repository is loaded once (from a directory or programmatically) and
/// shared immutably with scatter operations; an empty repository is valid and
/// makes scattering a documented no-op.
#[derive(Debug, Clone, Default)]
pub struct SpriteRepository {
    sprites: Vec<Sprite>,
}

impl SpriteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every decodable image file in `dir`, in file-name order.
    ///
    /// An integer weight may be attached with an `@N` suffix on the file
    /// stem (`rock@3.png` → weight 3); the default weight is 1. Files that
    /// fail to decode are skipped with a warning.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| Error::io(dir, e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        let mut repo = Self::new();
        for path in entries {
            match image::open(&path) {
                Ok(img) => {
                    let weight = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(|s| s.rsplit_once('@'))
                        .and_then(|(_, w)| w.parse::<u32>().ok())
                        .unwrap_or(1);
                    repo.add(img.into_rgba8(), weight);
                }
                Err(e) => {
                    log_warn!("skipping sprite {}: {}", path.display(), e);
                }
            }
        }
        Ok(repo)
    }

    pub fn add(&mut self, image: RgbaImage, weight: u32) {
        self.sprites.push(Sprite { image, weight });
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn total_weight(&self) -> u64 {
        self.sprites.iter().map(|s| s.weight as u64).sum()
    }

    /// Weighted-random sprite index: a cumulative-weight walk over the
    /// ordered sprite list. Zero-weight sprites are never selected.
    pub fn pick_index<R: Rng>(&self, rng: &mut R) -> Option<usize> {
        let total = self.total_weight();
        if total == 0 {
            return None;
        }
        let mut ticket = rng.random_range(0..total);
        for (i, sprite) in self.sprites.iter().enumerate() {
            let w = sprite.weight as u64;
            if ticket < w {
                return Some(i);
            }
            ticket -= w;
        }
        None
    }

    pub fn sprite(&self, index: usize) -> &RgbaImage {
        &self.sprites[index].image
    }
}
