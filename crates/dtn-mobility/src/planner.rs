//! Generic driver for models that generate movement leg by leg.
//!
//! A [`PathPlanner`] decides *where to go next*; [`PathModel`] owns one
//! [`Path`] and one [`NodeRng`] per node and keeps calling the planner until
//! every path covers the requested time.  Random waypoint, Lévy walk, and
//! map-based movement are all planners.

use dtn_core::{Coord, NodeId, NodeRng, SimTime};

use crate::{Leg, MobilityModel, Path};

/// Strategy producing the next stretch of a node's movement.
///
/// Planners are shared by every node, so all per-node randomness must come
/// from the `rng` argument.
pub trait PathPlanner: Send {
    fn name(&self) -> &'static str;

    /// Where `node` starts at time zero.
    fn initial_position(&self, node: NodeId, rng: &mut NodeRng) -> Coord;

    /// Append one or more contiguous legs departing `from` at `depart`.
    ///
    /// A planner that appends nothing (or only zero-length legs) leaves the
    /// node parked at `from` for the rest of the run.
    fn plan(&self, node: NodeId, from: Coord, depart: SimTime, rng: &mut NodeRng, out: &mut Vec<Leg>);
}

struct PathNode {
    path:   Path,
    rng:    NodeRng,
}

/// A [`MobilityModel`] driven by a [`PathPlanner`].
pub struct PathModel<P: PathPlanner> {
    planner: P,
    nodes:   Vec<PathNode>,
    horizon: SimTime,
    scratch: Vec<Leg>,
}

impl<P: PathPlanner> PathModel<P> {
    /// Place `node_count` nodes, each seeded from `seed` and its id.
    pub fn new(planner: P, node_count: usize, seed: u64) -> Self {
        let nodes = (0..node_count)
            .map(|i| {
                let id      = NodeId(i as u32);
                let mut rng = NodeRng::new(seed, id);
                let origin  = planner.initial_position(id, &mut rng);
                PathNode { path: Path::new(origin, SimTime::ZERO), rng }
            })
            .collect();
        Self { planner, nodes, horizon: SimTime::ZERO, scratch: Vec::new() }
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    /// The movement history of `node` generated so far.
    pub fn path(&self, node: NodeId) -> &Path {
        &self.nodes[node.index()].path
    }

    pub fn horizon(&self) -> SimTime {
        self.horizon
    }
}

impl<P: PathPlanner> MobilityModel for PathModel<P> {
    fn name(&self) -> &'static str {
        self.planner.name()
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn advance_to(&mut self, time: SimTime) {
        if time <= self.horizon {
            return;
        }
        for (i, node) in self.nodes.iter_mut().enumerate() {
            let id = NodeId(i as u32);
            while node.path.horizon() < time {
                let before = node.path.horizon();
                let from   = node.path.end_position();
                self.scratch.clear();
                self.planner.plan(id, from, before, &mut node.rng, &mut self.scratch);
                for leg in self.scratch.drain(..) {
                    node.path.push(leg);
                }
                if node.path.horizon() <= before {
                    // No progress: park the node for good.
                    let at = node.path.end_position();
                    node.path.push(Leg::pause(at, before, SimTime::MAX));
                }
            }
        }
        self.horizon = time;
    }

    #[inline]
    fn position(&self, node: NodeId, time: SimTime) -> Coord {
        self.nodes[node.index()].path.position(time)
    }
}
