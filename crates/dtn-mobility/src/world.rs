//! `World` — the simulation area plus the active mobility model.

use dtn_core::{Area, Coord, NodeId, SimTime};

use crate::{MobilityError, MobilityModel, MobilityResult};

pub struct World {
    area:  Area,
    model: Box<dyn MobilityModel>,
}

impl World {
    pub fn new(area: Area, model: Box<dyn MobilityModel>) -> MobilityResult<Self> {
        if !area.is_valid() {
            return Err(MobilityError::InvalidArea { width: area.width, height: area.height });
        }
        Ok(Self { area, model })
    }

    pub fn area(&self) -> Area {
        self.area
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    pub fn node_count(&self) -> usize {
        self.model.node_count()
    }

    pub fn advance_to(&mut self, time: SimTime) {
        self.model.advance_to(time);
    }

    #[inline]
    pub fn position(&self, node: NodeId, time: SimTime) -> Coord {
        self.model.position(node, time)
    }

    #[inline]
    pub fn distance(&self, a: NodeId, b: NodeId, time: SimTime) -> f64 {
        self.position(a, time).distance(self.position(b, time))
    }

    /// Positions of all nodes at `time`, indexed by `NodeId`.
    pub fn positions(&self, time: SimTime) -> Vec<Coord> {
        (0..self.node_count())
            .map(|i| self.position(NodeId(i as u32), time))
            .collect()
    }
}
