//! TOML scenario files.
//!
//! A scenario describes one complete run: clock, area, node groups, one
//! mobility model for all nodes, the routing policy, and the workload.
//! Times are in (fractional) seconds.
//!
//! ```toml
//! name            = "campus"
//! seed            = 7
//! end_time        = 43200.0
//! update_interval = 1.0
//!
//! [area]
//! width  = 4500.0
//! height = 3400.0
//!
//! [[groups]]
//! count        = 40
//! range        = 10.0
//! buffer_bytes = 5_000_000
//! eviction     = "drop_oldest"
//!
//! [mobility]
//! kind  = "random_waypoint"
//! speed = [0.5, 1.5]
//!
//! [routing]
//! policy = "spray_and_wait"
//! copies = 8
//!
//! [generator]
//! interval = [25.0, 35.0]
//! size     = [500, 1000]
//! ```
//!
//! `policy` is one of `epidemic`, `direct_delivery`, `spray_and_wait`,
//! `spray_and_focus`, `prophet`, `bubble_rap` or `fuzzy`; see
//! [`RoutingConfig`] for each one's keys.
//!
//! Relative file paths (map, trace, fuzzy rule base) resolve against the
//! directory of the scenario file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use dtn_contact::DetectionStrategy;
use dtn_core::{Area, Coord, Draws, SimConfig, SimDuration, SimRng, SimTime};
use dtn_mobility::{
    load_segments_csv, LevyWalk, LevyWalkParams, MapBasedMovement, MapMovementParams, MobilityModel,
    RandomWaypoint, RandomWaypointParams, StaticMobility, TracePlayback,
};
use dtn_routing::RoutingConfig;
use dtn_store::{Capacity, EvictionPolicy};

use crate::bridge::LoopbackAdapter;
use crate::generator::{GeneratorConfig, MessageConfig, MessageSpec};
use crate::node::{EnergySpec, NodeSpec};
use crate::{Sim, SimBuilder, SimError, SimResult};

/// RNG stream offset for randomly placed static nodes.
const PLACEMENT_STREAM: u64 = 0x706c_6163;

// ── Sections ──────────────────────────────────────────────────────────────────

/// Nodes sharing radio, buffer, and energy parameters.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeGroupConfig {
    pub count:           usize,
    /// Radio range, metres.
    pub range:           f64,
    pub buffer_bytes:    Option<u64>,
    pub buffer_messages: Option<usize>,
    pub eviction:        EvictionPolicy,
    /// Bytes per second.
    pub tx_speed:        f64,
    pub energy:          Option<EnergySpec>,
    /// Convergence-layer address shared by every node in the group.
    pub bridge:          Option<String>,
}

impl Default for NodeGroupConfig {
    fn default() -> Self {
        let spec = NodeSpec::default();
        Self {
            count:           1,
            range:           spec.range,
            buffer_bytes:    None,
            buffer_messages: None,
            eviction:        spec.eviction,
            tx_speed:        spec.tx_speed,
            energy:          None,
            bridge:          None,
        }
    }
}

impl NodeGroupConfig {
    pub fn spec(&self) -> NodeSpec {
        NodeSpec {
            range:    self.range,
            capacity: Capacity { bytes: self.buffer_bytes, messages: self.buffer_messages },
            eviction: self.eviction,
            tx_speed: self.tx_speed,
            energy:   self.energy,
            bridge:   self.bridge.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MobilityConfig {
    /// Fixed positions, one `[x, y]` per node; uniform random placement in
    /// the area when omitted.
    Static {
        #[serde(default)]
        positions: Option<Vec<[f64; 2]>>,
    },
    RandomWaypoint(RandomWaypointParams),
    LevyWalk(LevyWalkParams),
    /// Shortest-path trips over a road map given as a segment CSV.
    MapBased {
        map:   PathBuf,
        #[serde(default)]
        speed: Option<[f64; 2]>,
        #[serde(default)]
        pause: Option<[f64; 2]>,
    },
    /// Recorded positions from a `node,time,x,y` CSV.
    Trace { file: PathBuf },
}

impl MobilityConfig {
    pub fn name(&self) -> &'static str {
        match self {
            MobilityConfig::Static { .. } => "static",
            MobilityConfig::RandomWaypoint(_) => "random_waypoint",
            MobilityConfig::LevyWalk(_) => "levy_walk",
            MobilityConfig::MapBased { .. } => "map_based",
            MobilityConfig::Trace { .. } => "trace",
        }
    }

    pub fn build(
        &self,
        area:       Area,
        node_count: usize,
        seed:       u64,
        base_dir:   Option<&Path>,
    ) -> SimResult<Box<dyn MobilityModel>> {
        Ok(match self {
            MobilityConfig::Static { positions: Some(p) } => {
                if p.len() != node_count {
                    return Err(SimError::NodeCountMismatch {
                        expected: node_count,
                        got:      p.len(),
                        what:     "static position",
                    });
                }
                Box::new(StaticMobility::new(p.iter().map(|&[x, y]| Coord::new(x, y)).collect()))
            }
            MobilityConfig::Static { positions: None } => {
                let mut rng = SimRng::new(seed).child(PLACEMENT_STREAM);
                let positions = (0..node_count)
                    .map(|_| {
                        let x = rng.uniform_between(0.0, area.width);
                        let y = rng.uniform_between(0.0, area.height);
                        Coord::new(x, y)
                    })
                    .collect();
                Box::new(StaticMobility::new(positions))
            }
            MobilityConfig::RandomWaypoint(p) => {
                Box::new(RandomWaypoint::new(area, *p)?.into_model(node_count, seed))
            }
            MobilityConfig::LevyWalk(p) => Box::new(LevyWalk::new(area, *p)?.into_model(node_count, seed)),
            MobilityConfig::MapBased { map, speed, pause } => {
                let path = resolve(base_dir, map);
                let graph = load_segments_csv(&path)?;
                info!(path = %path.display(), vertices = graph.vertex_count(), "loaded map");
                let defaults = MapMovementParams::default();
                let params = MapMovementParams {
                    speed: speed.unwrap_or(defaults.speed),
                    pause: pause.unwrap_or(defaults.pause),
                };
                Box::new(MapBasedMovement::new(Arc::new(graph), params)?.into_model(node_count, seed))
            }
            MobilityConfig::Trace { file } => {
                let path = resolve(base_dir, file);
                Box::new(TracePlayback::from_csv(&path, node_count)?)
            }
        })
    }
}

/// In-memory convergence layer for nodes with a `bridge` address.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopbackConfig {
    /// Seconds.
    pub latency:   f64,
    /// Bytes per second.
    pub bandwidth: f64,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self { latency: 0.05, bandwidth: 1_000_000.0 }
    }
}

// ── ScenarioConfig ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default = "default_name")]
    pub name:              String,
    #[serde(default)]
    pub seed:              u64,
    /// Seconds.
    #[serde(default = "default_end_time")]
    pub end_time:          f64,
    /// Seconds between world updates.
    #[serde(default = "default_update_interval")]
    pub update_interval:   f64,
    #[serde(default = "default_true")]
    pub purge_on_delivery: bool,
    #[serde(default)]
    pub contact_strategy:  DetectionStrategy,
    #[serde(default)]
    pub contact_history:   bool,
    pub area:              Area,
    pub groups:            Vec<NodeGroupConfig>,
    pub mobility:          MobilityConfig,
    #[serde(default)]
    pub routing:           RoutingConfig,
    #[serde(default)]
    pub generator:         Option<GeneratorConfig>,
    #[serde(default)]
    pub messages:          Vec<MessageConfig>,
    #[serde(default)]
    pub bridge:            Option<LoopbackConfig>,
}

fn default_name() -> String {
    "scenario".to_string()
}

fn default_end_time() -> f64 {
    43_200.0
}

fn default_update_interval() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl ScenarioConfig {
    /// Parse and validate a scenario.
    pub fn from_toml_str(src: &str) -> SimResult<Self> {
        let cfg: ScenarioConfig = toml::from_str(src)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read a scenario file.  Returns the config and the directory relative
    /// paths in it resolve against.
    pub fn load(path: &Path) -> SimResult<(Self, PathBuf)> {
        let src = std::fs::read_to_string(path)?;
        let cfg = Self::from_toml_str(&src)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok((cfg, dir))
    }

    pub fn validate(&self) -> SimResult<()> {
        let positive = |v: f64| v > 0.0 && v.is_finite();
        if !positive(self.end_time) {
            return Err(SimError::Config(format!("end_time {} must be positive", self.end_time)));
        }
        if !positive(self.update_interval) {
            return Err(SimError::Config(format!("update_interval {} must be positive", self.update_interval)));
        }
        if !positive(self.area.width) || !positive(self.area.height) {
            return Err(SimError::Config("area dimensions must be positive".into()));
        }
        if self.node_count() == 0 {
            return Err(SimError::Config("scenario has no nodes".into()));
        }
        if self.bridge.is_none() && self.groups.iter().any(|g| g.bridge.is_some()) {
            return Err(SimError::Config("groups name a bridge address but no [bridge] section is given".into()));
        }
        if let Some(b) = self.bridge {
            if !positive(b.bandwidth) || !(b.latency >= 0.0 && b.latency.is_finite()) {
                return Err(SimError::Config("bridge latency must be >= 0 and bandwidth positive".into()));
            }
        }
        for g in &self.groups {
            g.spec().validate()?;
        }
        for m in &self.messages {
            MessageSpec::from(*m).validate(self.node_count())?;
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    /// The same scenario with another seed.
    pub fn with_seed(&self, seed: u64) -> Self {
        Self { seed, ..self.clone() }
    }

    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            seed:            self.seed,
            end_time:        SimTime::from_secs_f64(self.end_time),
            update_interval: SimDuration::from_secs_f64(self.update_interval),
        }
    }

    /// One spec per node, groups in order.
    pub fn node_specs(&self) -> Vec<NodeSpec> {
        self.groups
            .iter()
            .flat_map(|g| std::iter::repeat_n(g.spec(), g.count))
            .collect()
    }

    /// Build a ready-to-run simulation.
    pub fn build(&self, base_dir: Option<&Path>) -> SimResult<Sim> {
        self.validate()?;
        let n = self.node_count();
        let mobility = self.mobility.build(self.area, n, self.seed, base_dir)?;
        let policy = self.routing.build(base_dir)?;
        let specs = self.node_specs();

        let mut builder = SimBuilder::new(self.sim_config(), self.area, mobility, policy)
            .strategy(self.contact_strategy)
            .purge_on_delivery(self.purge_on_delivery)
            .contact_history(self.contact_history)
            .messages(self.messages.iter().map(|&m| MessageSpec::from(m)));
        if let Some(g) = self.generator {
            builder = builder.generator(g);
        }
        if let Some(b) = self.bridge {
            let mut peers: Vec<String> = specs.iter().filter_map(|s| s.bridge.clone()).collect();
            peers.dedup();
            let adapter = LoopbackAdapter::new(SimDuration::from_secs_f64(b.latency), b.bandwidth).with_peers(peers);
            builder = builder.bridge(Box::new(adapter));
        }
        info!(
            name     = %self.name,
            nodes    = n,
            mobility = self.mobility.name(),
            routing  = self.routing.name(),
            "scenario built"
        );
        builder.nodes(specs).build()
    }
}

fn resolve(base_dir: Option<&Path>, path: &Path) -> PathBuf {
    match base_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}
