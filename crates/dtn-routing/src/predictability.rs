//! PRoPHET delivery predictabilities.
//!
//! For every node `a` and every other node `b` it has learnt about,
//! `P(a, b)` in `[0, 1]` estimates how likely `a` is to deliver to `b`.
//!
//! ```text
//! encounter:   P(a,b) = P(a,b)_old + (1 - P(a,b)_old) * P_init
//! transitive:  P(a,c) = P(a,c)_old + (1 - P(a,c)_old) * P(a,b) * P(b,c) * beta
//! aging:       P(a,b) = P(a,b)_old * gamma^k,  k = elapsed / time_unit
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use dtn_core::{NodeId, SimDuration, SimTime};

use crate::{RoutingError, RoutingResult};

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProphetParams {
    pub p_init: f64,
    pub beta:   f64,
    pub gamma:  f64,
    /// Length of one aging time unit, seconds.
    pub seconds_in_time_unit: f64,
}

impl Default for ProphetParams {
    fn default() -> Self {
        Self { p_init: 0.75, beta: 0.25, gamma: 0.98, seconds_in_time_unit: 30.0 }
    }
}

impl ProphetParams {
    pub fn validate(&self) -> RoutingResult<()> {
        let unit = |v: f64| (0.0..=1.0).contains(&v);
        if !(unit(self.p_init) && unit(self.beta) && unit(self.gamma)) {
            return Err(RoutingError::Config(
                "PRoPHET p_init, beta and gamma must lie in [0, 1]".into(),
            ));
        }
        if !(self.seconds_in_time_unit > 0.0 && self.seconds_in_time_unit.is_finite()) {
            return Err(RoutingError::Config("PRoPHET time unit must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
struct NodePreds {
    preds:     BTreeMap<NodeId, f64>,
    last_aged: SimTime,
}

/// Delivery predictability tables for all nodes.
#[derive(Clone, Debug)]
pub struct DeliveryPredictability {
    params: ProphetParams,
    nodes:  BTreeMap<NodeId, NodePreds>,
}

impl DeliveryPredictability {
    pub fn new(params: ProphetParams) -> Self {
        Self { params, nodes: BTreeMap::new() }
    }

    pub fn params(&self) -> &ProphetParams {
        &self.params
    }

    /// `P(from, to)`; zero if `from` never learnt about `to`.
    pub fn get(&self, from: NodeId, to: NodeId) -> f64 {
        self.nodes
            .get(&from)
            .and_then(|n| n.preds.get(&to))
            .copied()
            .unwrap_or(0.0)
    }

    /// Decay all of `node`'s predictabilities to `now`.
    pub fn age(&mut self, node: NodeId, now: SimTime) {
        let unit = self.params.seconds_in_time_unit;
        let gamma = self.params.gamma;
        let entry = self.nodes.entry(node).or_default();
        let elapsed: SimDuration = now.since(entry.last_aged);
        if elapsed.is_zero() {
            return;
        }
        let mult = gamma.powf(elapsed.as_secs_f64() / unit);
        for p in entry.preds.values_mut() {
            *p *= mult;
        }
        entry.last_aged = now;
    }

    /// Apply an encounter between `a` and `b` at `now`: aging, direct
    /// update on both sides, then transitive updates from each side's
    /// pre-transitive table.
    pub fn encounter(&mut self, a: NodeId, b: NodeId, now: SimTime) {
        self.age(a, now);
        self.age(b, now);
        self.bump(a, b);
        self.bump(b, a);

        let snap_a = self.table(a);
        let snap_b = self.table(b);
        self.transitive(a, b, &snap_b);
        self.transitive(b, a, &snap_a);
    }

    fn bump(&mut self, a: NodeId, b: NodeId) {
        let p_init = self.params.p_init;
        let p = self.nodes.entry(a).or_default().preds.entry(b).or_insert(0.0);
        *p += (1.0 - *p) * p_init;
    }

    fn table(&self, node: NodeId) -> BTreeMap<NodeId, f64> {
        self.nodes.get(&node).map(|n| n.preds.clone()).unwrap_or_default()
    }

    fn transitive(&mut self, a: NodeId, b: NodeId, b_preds: &BTreeMap<NodeId, f64>) {
        let beta = self.params.beta;
        let p_ab = self.get(a, b);
        let entry = self.nodes.entry(a).or_default();
        for (&c, &p_bc) in b_preds {
            if c == a {
                continue;
            }
            let p = entry.preds.entry(c).or_insert(0.0);
            *p += (1.0 - *p) * p_ab * p_bc * beta;
        }
    }
}
