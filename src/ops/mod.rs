// ============================================================================
// OPERATIONS — uniform contract, kind registry, memoized execution
// ============================================================================

mod cellular;
mod compositors;
mod perlin;
mod scatter;
mod simplex;
mod vegetation;

pub use cellular::{CellNoise, Voronoi};
pub use compositors::{Blur, Copy, Level, Mix, gaussian_blur, level_threshold, mix_images};
pub use perlin::Perlin;
pub use scatter::{Scatter, blit_wrapped};
pub use simplex::Simplex;
pub use vegetation::Vegetation;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::canvas::ImagePair;
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::sprites::SpriteRepository;

/// Configuration handed to every operation at construction: the canvas
/// resolution and the session seed. Operations never reach back into any
/// host to query these.
#[derive(Debug, Clone, Copy)]
pub struct OpContext {
    pub resolution: u32,
    pub seed: u64,
}

/// Closed set of operation kind identifiers.
///
/// The persisted pipeline format stores these names; loading validates
/// against this enum and fails on anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Perlin,
    Simplex,
    Voronoi,
    CellNoise,
    Vegetation,
    Copy,
    Mix,
    Blur,
    Level,
    Scatter,
}

impl OpKind {
    pub const ALL: [OpKind; 10] = [
        OpKind::Perlin,
        OpKind::Simplex,
        OpKind::Voronoi,
        OpKind::CellNoise,
        OpKind::Vegetation,
        OpKind::Copy,
        OpKind::Mix,
        OpKind::Blur,
        OpKind::Level,
        OpKind::Scatter,
    ];

    /// Stable identifier used in the persisted pipeline document.
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Perlin => "perlin",
            OpKind::Simplex => "simplex",
            OpKind::Voronoi => "voronoi",
            OpKind::CellNoise => "cellnoise",
            OpKind::Vegetation => "vegetation",
            OpKind::Copy => "copy",
            OpKind::Mix => "mix",
            OpKind::Blur => "blur",
            OpKind::Level => "level",
            OpKind::Scatter => "scatter",
        }
    }

    /// Human-readable title for listings and layer tiles.
    pub fn title(self) -> &'static str {
        match self {
            OpKind::Perlin => "Perlin Noise",
            OpKind::Simplex => "Simplex",
            OpKind::Voronoi => "Voronoi",
            OpKind::CellNoise => "Cell Noise",
            OpKind::Vegetation => "Vegetation",
            OpKind::Copy => "Copy",
            OpKind::Mix => "Mix",
            OpKind::Blur => "Blur",
            OpKind::Level => "Level",
            OpKind::Scatter => "Scatter",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        OpKind::ALL
            .into_iter()
            .find(|k| k.name() == name)
            .ok_or_else(|| Error::UnknownKind(name.to_string()))
    }
}

/// Fold a 64-bit seed into the 32 bits the coherent-noise primitive
/// accepts, keeping the upper half significant.
#[inline]
pub(crate) fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

/// Construct an operation instance for `kind`.
///
/// This is the whole reconstruction surface for persisted pipelines: a tagged
/// variant mapped to a constructor, nothing dynamic.
pub fn instantiate(
    kind: OpKind,
    ctx: OpContext,
    sprites: &Arc<SpriteRepository>,
) -> Box<dyn Operation> {
    match kind {
        OpKind::Perlin => Box::new(Perlin::new(ctx)),
        OpKind::Simplex => Box::new(Simplex::new(ctx)),
        OpKind::Voronoi => Box::new(Voronoi::new(ctx)),
        OpKind::CellNoise => Box::new(CellNoise::new(ctx)),
        OpKind::Vegetation => Box::new(Vegetation::new(ctx)),
        OpKind::Copy => Box::new(Copy::new()),
        OpKind::Mix => Box::new(Mix::new()),
        OpKind::Blur => Box::new(Blur::new()),
        OpKind::Level => Box::new(Level::new()),
        OpKind::Scatter => Box::new(Scatter::new(ctx, Arc::clone(sprites))),
    }
}

/// Uniform operation contract.
///
/// Implementations are pure with respect to `(input, params)`: the same pair
/// always yields the same output, which is what makes memoization sound.
/// Kernels receive already-validated doubles; parameter validation lives at
/// the CLI boundary.
pub trait Operation: Send + Sync {
    fn kind(&self) -> OpKind;

    /// Full parameter schema with default values; also the fallback source
    /// for keys missing from a persisted parameter set.
    fn defaults(&self) -> Parameters;

    /// One-line description of the operation under the given parameters.
    fn describe(&self, params: &Parameters) -> String;

    /// Execute against a private clone of the caller's pair.
    fn run(&self, input: ImagePair, params: &Parameters) -> ImagePair;
}

// ----------------------------------------------------------------------------
//  Memoized execution wrapper
// ----------------------------------------------------------------------------

/// Decorator adding last-result caching to one [`Operation`] instance.
///
/// The cache key is the parameter snapshot plus the input fingerprint.
/// Parameter comparison is key-by-key over the union of the previous and
/// current key sets, with the operation's defaults standing in for missing
/// keys and exact float inequality deciding dirtiness.
pub struct Memoized {
    op: Box<dyn Operation>,
    cached_params: Option<Parameters>,
    cached_input: Option<u64>,
    cached_output: Option<ImagePair>,
    runs: u64,
}

impl Memoized {
    pub fn new(op: Box<dyn Operation>) -> Self {
        Self {
            op,
            cached_params: None,
            cached_input: None,
            cached_output: None,
            runs: 0,
        }
    }

    pub fn op(&self) -> &dyn Operation {
        self.op.as_ref()
    }

    /// Number of times the underlying kernel has actually run.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Execute with caching: recompute only when parameters or the input
    /// image changed since the previous call, otherwise return the cached
    /// result untouched.
    pub fn execute(&mut self, input: &ImagePair, params: &Parameters) -> ImagePair {
        let fingerprint = input.fingerprint();
        if let (Some(prev), Some(cached)) = (&self.cached_params, &self.cached_output)
            && self.cached_input == Some(fingerprint)
            && !params_differ(&self.op.defaults(), prev, params)
        {
            return cached.clone();
        }

        let output = self.op.run(input.clone(), params);
        self.runs += 1;
        self.cached_params = Some(params.clone());
        self.cached_input = Some(fingerprint);
        self.cached_output = Some(output.clone());
        output
    }
}

/// Key-by-key comparison under default-on-missing semantics: an absent key
/// counts as unchanged only if its default matches the other side's value.
fn params_differ(defaults: &Parameters, prev: &Parameters, cur: &Parameters) -> bool {
    let keys: BTreeSet<&str> = prev.keys().chain(cur.keys()).collect();
    keys.into_iter().any(|key| {
        let fallback = defaults.get(key, 0.0);
        prev.get(key, fallback) != cur.get(key, fallback)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::gray;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Probe kernel: counts invocations, writes its `Value` parameter into
    /// one pixel so outputs are distinguishable.
    struct Probe {
        calls: Arc<AtomicU64>,
    }

    impl Operation for Probe {
        fn kind(&self) -> OpKind {
            OpKind::Copy
        }
        fn defaults(&self) -> Parameters {
            let mut p = Parameters::new();
            p.set("Value", 7.0);
            p
        }
        fn describe(&self, _params: &Parameters) -> String {
            "probe".into()
        }
        fn run(&self, mut input: ImagePair, params: &Parameters) -> ImagePair {
            self.calls.fetch_add(1, Ordering::SeqCst);
            input.left.put_pixel(0, 0, gray(params.get("Value", 7.0) as u8));
            input
        }
    }

    fn probe() -> (Memoized, Arc<AtomicU64>) {
        let calls = Arc::new(AtomicU64::new(0));
        let memo = Memoized::new(Box::new(Probe {
            calls: Arc::clone(&calls),
        }));
        (memo, calls)
    }

    #[test]
    fn unchanged_params_do_not_reinvoke_kernel() {
        let (mut memo, calls) = probe();
        let input = ImagePair::new(4);
        let mut params = Parameters::new();
        params.set("Value", 9.0);

        let a = memo.execute(&input, &params);
        let b = memo.execute(&input, &params);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.runs(), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn changing_one_parameter_recomputes_exactly_once() {
        let (mut memo, calls) = probe();
        let input = ImagePair::new(4);
        let mut params = Parameters::new();
        params.set("Value", 9.0);
        memo.execute(&input, &params);

        params.set("Value", 10.0);
        memo.execute(&input, &params);
        memo.execute(&input, &params);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_a_key_at_its_default_is_not_a_change() {
        let (mut memo, calls) = probe();
        let input = ImagePair::new(4);
        let mut params = Parameters::new();
        params.set("Value", 7.0); // equal to the default
        memo.execute(&input, &params);

        // Same value now expressed by omission.
        memo.execute(&input, &Parameters::new());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn changed_input_image_forces_recompute() {
        let (mut memo, calls) = probe();
        let params = Parameters::new();
        let input = ImagePair::new(4);
        memo.execute(&input, &params);

        let mut other = ImagePair::new(4);
        other.right.put_pixel(2, 2, gray(1));
        memo.execute(&other, &params);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn seed_fold_keeps_high_bits_significant() {
        assert_ne!(fold_seed(7), fold_seed(7 | (1 << 40)));
        assert_eq!(fold_seed(7), 7);
    }

    #[test]
    fn kind_names_round_trip_through_registry() {
        for kind in OpKind::ALL {
            assert_eq!(OpKind::from_name(kind.name()).unwrap(), kind);
        }
        assert!(OpKind::from_name("sharpen").is_err());
    }
}
