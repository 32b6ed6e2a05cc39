//! Parameter sweeps: many independent runs, optionally in parallel.
//!
//! Each run builds its own [`Sim`](crate::Sim) from a [`ScenarioConfig`] and
//! shares nothing with the others.  With the `parallel` feature runs execute
//! on Rayon's pool; results are always returned in input order.

use std::path::Path;

use tracing::info;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{RunStats, ScenarioConfig, SimResult};

/// Outcome of one sweep run.
#[derive(Clone, Debug)]
pub struct SweepResult {
    pub name:  String,
    pub seed:  u64,
    pub stats: RunStats,
}

/// Build and run one scenario to completion, collecting [`RunStats`].
pub fn run_one(cfg: &ScenarioConfig, base_dir: Option<&Path>) -> SimResult<SweepResult> {
    let mut sim = cfg.build(base_dir)?;
    let mut stats = RunStats::default();
    sim.run(&mut stats)?;
    Ok(SweepResult { name: cfg.name.clone(), seed: cfg.seed, stats })
}

/// Run every scenario.  A failing run does not stop the others.
pub fn run_sweep(configs: &[ScenarioConfig], base_dir: Option<&Path>) -> Vec<SimResult<SweepResult>> {
    info!(runs = configs.len(), parallel = cfg!(feature = "parallel"), "sweep started");

    #[cfg(feature = "parallel")]
    let results: Vec<_> = configs.par_iter().map(|c| run_one(c, base_dir)).collect();
    #[cfg(not(feature = "parallel"))]
    let results: Vec<_> = configs.iter().map(|c| run_one(c, base_dir)).collect();

    let failed = results.iter().filter(|r| r.is_err()).count();
    info!(runs = results.len(), failed, "sweep finished");
    results
}

/// `base` once per seed.
pub fn seed_sweep(base: &ScenarioConfig, seeds: impl IntoIterator<Item = u64>) -> Vec<ScenarioConfig> {
    seeds
        .into_iter()
        .map(|seed| {
            let mut cfg = base.with_seed(seed);
            cfg.name = format!("{}-seed{seed}", base.name);
            cfg
        })
        .collect()
}
