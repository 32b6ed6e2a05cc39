//! Deterministic simulation-level and per-node RNG wrappers.
//!
//! # Determinism strategy
//!
//! Each node gets its own independent generator seeded by:
//!
//!   seed = global_seed XOR (node_id * MIXING_CONSTANT)
//!
//! The mixing constant is the 64-bit fractional part of the golden ratio,
//! which spreads consecutive node IDs uniformly across the seed space.
//! This means:
//!
//! - Nodes never share RNG state, so one node's mobility draws cannot shift
//!   another node's sequence.
//! - Adding nodes at the end of the population does not disturb the seeds of
//!   existing nodes.
//! - Two runs with the same seed and the same call sequence draw identical
//!   values.
//!
//! The underlying algorithm is the [`Generator`] alias: `SmallRng` by default,
//! `ChaCha8Rng` with the `chacha` feature.  Callers never name the concrete
//! type, so swapping it is a one-line change.

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal, Pareto};

use crate::NodeId;

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

#[cfg(not(feature = "chacha"))]
pub type Generator = rand::rngs::SmallRng;

#[cfg(feature = "chacha")]
pub type Generator = rand_chacha::ChaCha8Rng;

// ── Draws ─────────────────────────────────────────────────────────────────────

/// Distribution helpers shared by [`SimRng`] and [`NodeRng`].
///
/// Implementors only provide [`generator`](Self::generator); every draw goes
/// through it, so the call sequence alone determines the values.
pub trait Draws {
    /// The wrapped generator, for use with `rand` distribution types.
    fn generator(&mut self) -> &mut Generator;

    /// Sample a uniformly distributed value of any `Standard`-distributed type.
    #[inline]
    fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
        Self: Sized,
    {
        self.generator().r#gen()
    }

    /// Uniform `f64` in `[0, 1)`.
    #[inline]
    fn uniform01(&mut self) -> f64 {
        self.generator().r#gen::<f64>()
    }

    /// Generate a value uniformly in `range`.
    #[inline]
    fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
        Self: Sized,
    {
        self.generator().gen_range(range)
    }

    /// Uniform `f64` in `[lo, hi]`; returns `lo` when the range is empty.
    #[inline]
    fn uniform_between(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        self.generator().gen_range(lo..=hi)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    fn gen_bool(&mut self, p: f64) -> bool {
        self.generator().gen_bool(p.clamp(0.0, 1.0))
    }

    /// Exponential draw with the given `rate` (mean `1 / rate`).
    /// A non-positive or non-finite rate yields `f64::INFINITY`.
    fn exponential(&mut self, rate: f64) -> f64 {
        match Exp::new(rate) {
            Ok(d) if rate > 0.0 => d.sample(self.generator()),
            _ => f64::INFINITY,
        }
    }

    /// Normal draw.  A negative or non-finite `std_dev` collapses to `mean`.
    fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        if !(std_dev >= 0.0 && std_dev.is_finite()) {
            return mean;
        }
        match Normal::new(mean, std_dev) {
            Ok(d) => d.sample(self.generator()),
            Err(_) => mean,
        }
    }

    /// Pareto draw with scale 1 and slope `alpha` (values in `[1, ∞)`).
    /// A non-positive slope yields 1.
    fn pareto(&mut self, alpha: f64) -> f64 {
        match Pareto::new(1.0, alpha) {
            Ok(d) => d.sample(self.generator()),
            Err(_) => 1.0,
        }
    }

    /// Shuffle a mutable slice in-place (Fisher-Yates).
    #[inline]
    fn shuffle<T>(&mut self, slice: &mut [T])
    where
        Self: Sized,
    {
        use rand::seq::SliceRandom;
        slice.shuffle(self.generator());
    }

    /// Choose a random element from a slice.  Returns `None` if it is empty.
    #[inline]
    fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T>
    where
        Self: Sized,
    {
        use rand::seq::SliceRandom;
        slice.choose(self.generator())
    }
}

// ── NodeRng ───────────────────────────────────────────────────────────────────

/// Per-node deterministic RNG, used by mobility models.
///
/// Create one per node at model construction; store it next to the node's
/// path.  The type is `!Sync` so one node's stream is never shared.
pub struct NodeRng(Generator);

impl NodeRng {
    /// Seed deterministically from the run's global seed and a node ID.
    pub fn new(global_seed: u64, node: NodeId) -> Self {
        let seed = global_seed ^ (node.0 as u64).wrapping_mul(MIXING_CONSTANT);
        NodeRng(Generator::seed_from_u64(seed))
    }
}

impl Draws for NodeRng {
    #[inline]
    fn generator(&mut self) -> &mut Generator {
        &mut self.0
    }
}

// ── SimRng ────────────────────────────────────────────────────────────────────

/// Simulation-level RNG for global draws (message generation, etc.).
///
/// Owned by exactly one run.  Derive independent streams for sub-models with
/// [`child`](Self::child).
pub struct SimRng(Generator);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(Generator::seed_from_u64(seed))
    }

    /// Derive a child `SimRng` with a different seed offset.
    pub fn child(&mut self, offset: u64) -> SimRng {
        let child_seed: u64 = self.0.r#gen::<u64>() ^ offset.wrapping_mul(MIXING_CONSTANT);
        SimRng(Generator::seed_from_u64(child_seed))
    }
}

impl Draws for SimRng {
    #[inline]
    fn generator(&mut self) -> &mut Generator {
        &mut self.0
    }
}
