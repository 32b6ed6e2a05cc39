//! Lévy walk: heavy-tailed flight lengths and pause times.
//!
//! Flight length `l = flight_scale * X` and pause `p = pause_scale * Y`
//! where `X ~ Pareto(1, alpha)` and `Y ~ Pareto(1, beta)`.  Directions are
//! uniform.  A target outside the area is redrawn up to `max_retries` times,
//! after which the last draw is clamped to the area boundary.

use std::f64::consts::TAU;

use serde::Deserialize;

use dtn_core::{Area, Coord, Draws, NodeId, NodeRng, SimTime};

use crate::random_waypoint::{push_move, push_pause, validate_speed};
use crate::{Leg, MobilityError, MobilityResult, PathModel, PathPlanner};

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LevyWalkParams {
    /// Pareto slope of flight lengths.
    pub alpha:        f64,
    /// Pareto slope of pause times.
    pub beta:         f64,
    /// Minimum flight length in metres.
    pub flight_scale: f64,
    /// Minimum pause in seconds.
    pub pause_scale:  f64,
    /// Upper bound on a single pause, seconds.
    pub max_pause:    f64,
    /// `[min, max]` speed in metres per second.
    pub speed:        [f64; 2],
    pub max_retries:  u32,
}

impl Default for LevyWalkParams {
    fn default() -> Self {
        Self {
            alpha:        3.0,
            beta:         1.0,
            flight_scale: 10.0,
            pause_scale:  1.0,
            max_pause:    3_600.0,
            speed:        [0.5, 1.5],
            max_retries:  100,
        }
    }
}

impl LevyWalkParams {
    pub fn validate(&self) -> MobilityResult<()> {
        if !(self.alpha > 0.0 && self.beta > 0.0) {
            return Err(MobilityError::InvalidParameter(format!(
                "Lévy slopes must be positive (alpha = {}, beta = {})",
                self.alpha, self.beta
            )));
        }
        if !(self.flight_scale > 0.0 && self.pause_scale >= 0.0 && self.max_pause >= 0.0) {
            return Err(MobilityError::InvalidParameter(
                "Lévy scales must be non-negative and flight_scale positive".into(),
            ));
        }
        validate_speed(self.speed)
    }
}

#[derive(Clone, Debug)]
pub struct LevyWalk {
    area:   Area,
    params: LevyWalkParams,
}

impl LevyWalk {
    pub fn new(area: Area, params: LevyWalkParams) -> MobilityResult<Self> {
        if !area.is_valid() {
            return Err(MobilityError::InvalidArea { width: area.width, height: area.height });
        }
        params.validate()?;
        Ok(Self { area, params })
    }

    pub fn into_model(self, node_count: usize, seed: u64) -> PathModel<Self> {
        PathModel::new(self, node_count, seed)
    }

    /// Draw a flight target from `from`, redrawing out-of-area targets.
    fn next_target(&self, from: Coord, rng: &mut NodeRng) -> Coord {
        let mut target = from;
        for _ in 0..=self.params.max_retries {
            let step  = self.params.flight_scale * rng.pareto(self.params.alpha);
            let theta = rng.uniform_between(0.0, TAU);
            target = Coord::new(from.x + step * theta.cos(), from.y + step * theta.sin());
            if self.area.contains(target) {
                return target;
            }
        }
        self.area.clamp(target)
    }
}

impl PathPlanner for LevyWalk {
    fn name(&self) -> &'static str {
        "levy_walk"
    }

    fn initial_position(&self, _node: NodeId, rng: &mut NodeRng) -> Coord {
        Coord::new(
            rng.uniform_between(0.0, self.area.width),
            rng.uniform_between(0.0, self.area.height),
        )
    }

    fn plan(&self, _node: NodeId, from: Coord, depart: SimTime, rng: &mut NodeRng, out: &mut Vec<Leg>) {
        let target = self.next_target(from, rng);
        let speed  = rng.uniform_between(self.params.speed[0], self.params.speed[1]);
        let arrive = push_move(out, from, target, depart, speed);
        let pause  = (self.params.pause_scale * rng.pareto(self.params.beta)).min(self.params.max_pause);
        push_pause(out, target, arrive, pause);
    }
}
