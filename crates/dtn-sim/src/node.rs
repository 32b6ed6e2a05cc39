//! Static node parameters and per-run node state.

use serde::Deserialize;

use dtn_store::{Capacity, EvictionPolicy, MessageBuffer};

use crate::{SimError, SimResult};

/// Battery model.  A node whose remaining energy reaches zero goes dormant
/// at the next world update and forms no further contacts.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnergySpec {
    /// Starting budget, joules.
    pub initial:       f64,
    /// Cost of one neighbour scan (charged every world update).
    pub scan_cost:     f64,
    /// Cost per byte sent.
    pub transmit_cost: f64,
}

impl Default for EnergySpec {
    fn default() -> Self {
        Self { initial: 5_000.0, scan_cost: 0.1, transmit_cost: 1e-5 }
    }
}

/// Everything fixed about a node for the duration of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSpec {
    /// Radio range, metres.
    pub range:    f64,
    pub capacity: Capacity,
    pub eviction: EvictionPolicy,
    /// Transmit speed, bytes per second.
    pub tx_speed: f64,
    pub energy:   Option<EnergySpec>,
    /// Peer address for nodes bridged to a convergence layer.
    pub bridge:   Option<String>,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            range:    10.0,
            capacity: Capacity::UNLIMITED,
            eviction: EvictionPolicy::default(),
            tx_speed: 250_000.0,
            energy:   None,
            bridge:   None,
        }
    }
}

impl NodeSpec {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.range >= 0.0 && self.range.is_finite()) {
            return Err(SimError::Config(format!("radio range {} must be finite and >= 0", self.range)));
        }
        if !(self.tx_speed > 0.0 && self.tx_speed.is_finite()) {
            return Err(SimError::Config(format!("transmit speed {} must be positive", self.tx_speed)));
        }
        if let Some(e) = self.energy {
            let ok = [e.initial, e.scan_cost, e.transmit_cost].iter().all(|v| *v >= 0.0 && v.is_finite());
            if !ok {
                return Err(SimError::Config("energy parameters must be finite and >= 0".into()));
            }
        }
        Ok(())
    }
}

/// Mutable per-node state owned by the running simulation.
#[derive(Debug)]
pub(crate) struct NodeState {
    pub buffer: MessageBuffer,
    pub active: bool,
    /// Remaining energy; `None` for mains-powered nodes.
    pub energy: Option<f64>,
}

impl NodeState {
    pub fn new(spec: &NodeSpec) -> Self {
        Self {
            buffer: MessageBuffer::new(spec.capacity, spec.eviction),
            active: true,
            energy: spec.energy.map(|e| e.initial),
        }
    }

    /// Charge `cost`; returns `true` if this depleted the battery.
    pub fn spend(&mut self, cost: f64) -> bool {
        match self.energy.as_mut() {
            Some(left) if *left > 0.0 => {
                *left = (*left - cost).max(0.0);
                *left == 0.0
            }
            _ => false,
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.energy.is_some_and(|e| e <= 0.0)
    }
}
