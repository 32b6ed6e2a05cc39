//! Random waypoint: pick a uniform destination, walk there, pause, repeat.

use serde::Deserialize;

use dtn_core::{Area, Coord, Draws, NodeId, NodeRng, SimDuration, SimTime};

use crate::{Leg, MobilityError, MobilityResult, PathModel, PathPlanner};

/// Speed and pause ranges, drawn uniformly per waypoint.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct RandomWaypointParams {
    /// `[min, max]` speed in metres per second.
    #[serde(default = "default_speed")]
    pub speed: [f64; 2],
    /// `[min, max]` pause in seconds.
    #[serde(default = "default_pause")]
    pub pause: [f64; 2],
}

fn default_speed() -> [f64; 2] {
    [0.5, 1.5]
}

fn default_pause() -> [f64; 2] {
    [0.0, 120.0]
}

impl Default for RandomWaypointParams {
    fn default() -> Self {
        Self { speed: default_speed(), pause: default_pause() }
    }
}

impl RandomWaypointParams {
    pub fn validate(&self) -> MobilityResult<()> {
        validate_speed(self.speed)?;
        validate_pause(self.pause)
    }
}

pub(crate) fn validate_speed(speed: [f64; 2]) -> MobilityResult<()> {
    let [lo, hi] = speed;
    if !(lo > 0.0 && hi >= lo && hi.is_finite()) {
        return Err(MobilityError::InvalidParameter(format!(
            "speed range [{lo}, {hi}] must satisfy 0 < min <= max"
        )));
    }
    Ok(())
}

pub(crate) fn validate_pause(pause: [f64; 2]) -> MobilityResult<()> {
    let [lo, hi] = pause;
    if !(lo >= 0.0 && hi >= lo && hi.is_finite()) {
        return Err(MobilityError::InvalidParameter(format!(
            "pause range [{lo}, {hi}] must satisfy 0 <= min <= max"
        )));
    }
    Ok(())
}

/// Appends a straight move from `from` to `to` at `speed` m/s and returns
/// its arrival time.
pub(crate) fn push_move(out: &mut Vec<Leg>, from: Coord, to: Coord, depart: SimTime, speed: f64) -> SimTime {
    let arrive = depart + SimDuration::from_secs_f64(from.distance(to) / speed);
    out.push(Leg { depart, arrive, from, to });
    arrive
}

/// Appends a pause of `secs` at `at` (nothing for zero) and returns its end.
pub(crate) fn push_pause(out: &mut Vec<Leg>, at: Coord, depart: SimTime, secs: f64) -> SimTime {
    let arrive = depart + SimDuration::from_secs_f64(secs);
    if arrive > depart {
        out.push(Leg::pause(at, depart, arrive));
    }
    arrive
}

/// Random waypoint planner over a rectangular area.
#[derive(Clone, Debug)]
pub struct RandomWaypoint {
    area:   Area,
    params: RandomWaypointParams,
}

impl RandomWaypoint {
    pub fn new(area: Area, params: RandomWaypointParams) -> MobilityResult<Self> {
        if !area.is_valid() {
            return Err(MobilityError::InvalidArea { width: area.width, height: area.height });
        }
        params.validate()?;
        Ok(Self { area, params })
    }

    /// Convenience: wrap in a [`PathModel`] for `node_count` nodes.
    pub fn into_model(self, node_count: usize, seed: u64) -> PathModel<Self> {
        PathModel::new(self, node_count, seed)
    }

    fn random_coord(&self, rng: &mut NodeRng) -> Coord {
        Coord::new(
            rng.uniform_between(0.0, self.area.width),
            rng.uniform_between(0.0, self.area.height),
        )
    }
}

impl PathPlanner for RandomWaypoint {
    fn name(&self) -> &'static str {
        "random_waypoint"
    }

    fn initial_position(&self, _node: NodeId, rng: &mut NodeRng) -> Coord {
        self.random_coord(rng)
    }

    fn plan(&self, _node: NodeId, from: Coord, depart: SimTime, rng: &mut NodeRng, out: &mut Vec<Leg>) {
        let dest   = self.random_coord(rng);
        let speed  = rng.uniform_between(self.params.speed[0], self.params.speed[1]);
        let arrive = push_move(out, from, dest, depart, speed);
        let pause  = rng.uniform_between(self.params.pause[0], self.params.pause[1]);
        push_pause(out, dest, arrive, pause);
    }
}
