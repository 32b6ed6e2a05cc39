//! Spray and Focus: Spray and Wait whose last copy keeps moving.
//!
//! The spray phase is identical to [`SprayAndWait`].  A holder down to one
//! token enters the focus phase and forwards its copy to a peer that has
//! met the destination more recently than it has.
//!
//! Every node remembers when it last met each other node.  On an encounter
//! both sides also learn from each other's table (timer transitivity):
//!
//! ```text
//! last(a, j) = max(last(a, j), last(b, j) - transitivity_delay)
//! ```
//!
//! `transitivity_delay` stands for the time it would take `a` to cover the
//! distance to `b`, so a second-hand sighting is always a little older than
//! a first-hand one.

use std::collections::BTreeMap;

use serde::Deserialize;

use dtn_core::{NodeId, SimDuration, SimTime};
use dtn_store::{BufferedCopy, Message};

use crate::{
    CopySplit, DecisionContext, RoutingDecision, RoutingError, RoutingPolicy, RoutingResult, SprayAndWait,
    SprayAndWaitParams,
};

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SprayAndFocusParams {
    pub copies: u32,
    pub binary: bool,
    /// Seconds subtracted from a sighting learnt second-hand.
    pub transitivity_delay: f64,
}

impl Default for SprayAndFocusParams {
    fn default() -> Self {
        Self { copies: 6, binary: true, transitivity_delay: 10.0 }
    }
}

#[derive(Clone, Debug)]
pub struct SprayAndFocus {
    spray:     SprayAndWait,
    delay:     SimDuration,
    /// `last_seen[a][j]`: when `a` last met `j`, first-hand or inferred.
    last_seen: BTreeMap<NodeId, BTreeMap<NodeId, SimTime>>,
}

impl SprayAndFocus {
    pub fn new(params: SprayAndFocusParams) -> RoutingResult<Self> {
        if !(params.transitivity_delay >= 0.0 && params.transitivity_delay.is_finite()) {
            return Err(RoutingError::Config("spray-and-focus transitivity_delay must be >= 0".into()));
        }
        let spray = SprayAndWait::new(SprayAndWaitParams { copies: params.copies, binary: params.binary })?;
        Ok(Self {
            spray,
            delay: SimDuration::from_secs_f64(params.transitivity_delay),
            last_seen: BTreeMap::new(),
        })
    }

    /// When `node` last met `other`, if ever.
    pub fn last_encounter(&self, node: NodeId, other: NodeId) -> Option<SimTime> {
        self.last_seen.get(&node).and_then(|t| t.get(&other)).copied()
    }

    fn learn_from(&mut self, a: NodeId, b: NodeId, b_table: &BTreeMap<NodeId, SimTime>) {
        let delay = self.delay.as_millis();
        let table = self.last_seen.entry(a).or_default();
        for (&j, &seen) in b_table {
            if j == a {
                continue;
            }
            let inferred = SimTime::from_millis(seen.as_millis().saturating_sub(delay));
            let mine = table.entry(j).or_insert(inferred);
            if inferred > *mine {
                *mine = inferred;
            }
        }
    }
}

impl RoutingPolicy for SprayAndFocus {
    fn name(&self) -> &'static str {
        "spray_and_focus"
    }

    fn on_message_created(&mut self, msg: &Message) -> u32 {
        self.spray.on_message_created(msg)
    }

    fn on_contact_up(&mut self, a: NodeId, b: NodeId, now: SimTime) {
        let snap_a = self.last_seen.get(&a).cloned().unwrap_or_default();
        let snap_b = self.last_seen.get(&b).cloned().unwrap_or_default();
        self.learn_from(a, b, &snap_b);
        self.learn_from(b, a, &snap_a);
        self.last_seen.entry(a).or_default().insert(b, now);
        self.last_seen.entry(b).or_default().insert(a, now);
    }

    fn decide(&self, msg: &Message, copy: &BufferedCopy, ctx: &DecisionContext) -> RoutingDecision {
        if ctx.peer == msg.destination || copy.tokens > 1 {
            return self.spray.decide(msg, copy, ctx);
        }
        // Focus: hand the last copy to whoever saw the destination last.
        let Some(theirs) = self.last_encounter(ctx.peer, msg.destination) else {
            return RoutingDecision::Hold;
        };
        match self.last_encounter(ctx.local, msg.destination) {
            Some(ours) if ours >= theirs => RoutingDecision::Hold,
            _ => RoutingDecision::Forward(ctx.peer),
        }
    }

    fn split_copies(&self, tokens: u32) -> CopySplit {
        self.spray.split_copies(tokens)
    }
}
