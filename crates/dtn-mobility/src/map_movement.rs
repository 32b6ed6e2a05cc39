//! Map-based movement: shortest-path trips between random map vertices.

use std::sync::Arc;

use serde::Deserialize;

use dtn_core::{Coord, Draws, NodeId, NodeRng, SimTime, VertexId};

use crate::random_waypoint::{push_move, push_pause, validate_pause, validate_speed};
use crate::{Leg, MapGraph, MobilityError, MobilityResult, PathModel, PathPlanner};

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapMovementParams {
    /// `[min, max]` speed in metres per second, drawn once per trip.
    pub speed: [f64; 2],
    /// `[min, max]` pause at each destination, seconds.
    pub pause: [f64; 2],
}

impl Default for MapMovementParams {
    fn default() -> Self {
        Self { speed: [0.5, 1.5], pause: [0.0, 120.0] }
    }
}

/// Wait used when the chosen destination is unreachable, before retrying.
const UNREACHABLE_WAIT_SECS: f64 = 1.0;

/// Trip planner over a shared [`MapGraph`].
pub struct MapBasedMovement {
    map:    Arc<MapGraph>,
    params: MapMovementParams,
}

impl MapBasedMovement {
    pub fn new(map: Arc<MapGraph>, params: MapMovementParams) -> MobilityResult<Self> {
        if map.is_empty() {
            return Err(MobilityError::EmptyMap);
        }
        validate_speed(params.speed)?;
        validate_pause(params.pause)?;
        Ok(Self { map, params })
    }

    pub fn into_model(self, node_count: usize, seed: u64) -> PathModel<Self> {
        PathModel::new(self, node_count, seed)
    }

    pub fn map(&self) -> &MapGraph {
        &self.map
    }

    fn random_vertex(&self, rng: &mut NodeRng) -> VertexId {
        VertexId(rng.gen_range(0..self.map.vertex_count() as u32))
    }
}

impl PathPlanner for MapBasedMovement {
    fn name(&self) -> &'static str {
        "map_based"
    }

    fn initial_position(&self, _node: NodeId, rng: &mut NodeRng) -> Coord {
        let v = self.random_vertex(rng);
        self.map.position(v)
    }

    fn plan(&self, _node: NodeId, from: Coord, depart: SimTime, rng: &mut NodeRng, out: &mut Vec<Leg>) {
        // Trips always end on a vertex, so snapping recovers it exactly.
        let Some(start) = self.map.snap(from) else {
            return;
        };
        let dest = self.random_vertex(rng);
        let route = match self.map.shortest_path(start, dest) {
            Ok(route) => route,
            Err(_) => {
                push_pause(out, from, depart, UNREACHABLE_WAIT_SECS);
                return;
            }
        };

        let speed   = rng.uniform_between(self.params.speed[0], self.params.speed[1]);
        let mut at  = from;
        let mut now = depart;
        for &v in route.vertices.iter().skip(1) {
            let next = self.map.position(v);
            now = push_move(out, at, next, now, speed);
            at  = next;
        }
        let pause = rng.uniform_between(self.params.pause[0], self.params.pause[1]);
        if push_pause(out, at, now, pause) == depart {
            // Same-vertex trip with no pause: wait so the node keeps going.
            push_pause(out, at, depart, UNREACHABLE_WAIT_SECS);
        }
    }
}
