//! BubbleRap: community-aware forwarding driven by node centrality.
//!
//! Each node keeps two pieces of learnt state:
//!
//! - **Local community.**  Itself plus every peer whose cumulative contact
//!   time with it has reached `familiar_threshold`.  Membership is mutual
//!   and never revoked.
//! - **Encounter windows.**  Simulated time is cut into windows of
//!   `window` seconds; a node records the distinct peers it met in each.
//!   Global centrality is the mean number of distinct peers per completed
//!   window.  Local centrality counts only peers in the node's community.
//!   Before the first window completes the current one stands in.
//!
//! A holder of message `m` meeting `peer`:
//!
//! | Destination in community of | Action                                          |
//! |-----------------------------|-------------------------------------------------|
//! | peer only                   | forward (the bubble reached the community)      |
//! | holder only                 | hold                                            |
//! | both                        | replicate if peer has higher local centrality   |
//! | neither                     | replicate if peer has higher global centrality  |

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use dtn_core::{NodeId, SimDuration, SimTime};
use dtn_store::{BufferedCopy, Message};

use crate::{DecisionContext, RoutingDecision, RoutingError, RoutingPolicy, RoutingResult};

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BubbleRapParams {
    /// Cumulative contact seconds after which two nodes share a community.
    pub familiar_threshold: f64,
    /// Centrality window length, seconds.
    pub window: f64,
}

impl Default for BubbleRapParams {
    fn default() -> Self {
        Self { familiar_threshold: 700.0, window: 21_600.0 }
    }
}

impl BubbleRapParams {
    pub fn validate(&self) -> RoutingResult<()> {
        if !(self.familiar_threshold >= 0.0 && self.familiar_threshold.is_finite()) {
            return Err(RoutingError::Config("bubble-rap familiar_threshold must be >= 0".into()));
        }
        if !(self.window >= 0.001 && self.window.is_finite()) {
            return Err(RoutingError::Config("bubble-rap window must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
struct NodeState {
    contact_time: BTreeMap<NodeId, SimDuration>,
    community:    BTreeSet<NodeId>,
    /// Distinct peers met, indexed by window number.
    windows:      Vec<BTreeSet<NodeId>>,
}

#[derive(Clone, Debug)]
pub struct BubbleRap {
    familiar:  SimDuration,
    window_ms: u64,
    nodes:     BTreeMap<NodeId, NodeState>,
}

impl BubbleRap {
    pub fn new(params: BubbleRapParams) -> RoutingResult<Self> {
        params.validate()?;
        Ok(Self {
            familiar:  SimDuration::from_secs_f64(params.familiar_threshold),
            window_ms: SimDuration::from_secs_f64(params.window).as_millis().max(1),
            nodes:     BTreeMap::new(),
        })
    }

    /// Whether `member` is in `node`'s local community.  A node is always
    /// in its own.
    pub fn in_community(&self, node: NodeId, member: NodeId) -> bool {
        node == member || self.nodes.get(&node).is_some_and(|s| s.community.contains(&member))
    }

    /// `node`'s local community, itself included.
    pub fn community(&self, node: NodeId) -> BTreeSet<NodeId> {
        let mut c = self.nodes.get(&node).map(|s| s.community.clone()).unwrap_or_default();
        c.insert(node);
        c
    }

    /// Distinct peers `node` met in each window so far, oldest first.  The
    /// last entry is the window containing the latest encounter.
    pub fn encounter_counts(&self, node: NodeId) -> Vec<usize> {
        self.nodes.get(&node).map_or_else(Vec::new, |s| s.windows.iter().map(BTreeSet::len).collect())
    }

    pub fn global_centrality(&self, node: NodeId, now: SimTime) -> f64 {
        self.centrality(node, now, |_| true)
    }

    pub fn local_centrality(&self, node: NodeId, now: SimTime) -> f64 {
        self.centrality(node, now, |peer| self.in_community(node, peer))
    }

    fn window_of(&self, t: SimTime) -> usize {
        (t.as_millis() / self.window_ms) as usize
    }

    fn centrality(&self, node: NodeId, now: SimTime, counts: impl Fn(NodeId) -> bool) -> f64 {
        let Some(state) = self.nodes.get(&node) else {
            return 0.0;
        };
        let current = self.window_of(now);
        let tally = |w: &BTreeSet<NodeId>| w.iter().filter(|&&p| counts(p)).count() as f64;
        if current == 0 {
            return state.windows.first().map_or(0.0, tally);
        }
        let total: f64 = state.windows.iter().take(current).map(tally).sum();
        total / current as f64
    }

    fn record_encounter(&mut self, node: NodeId, peer: NodeId, w: usize) {
        let windows = &mut self.nodes.entry(node).or_default().windows;
        if windows.len() <= w {
            windows.resize_with(w + 1, BTreeSet::new);
        }
        windows[w].insert(peer);
    }

    fn add_contact_time(&mut self, node: NodeId, peer: NodeId, d: SimDuration) -> bool {
        let familiar = self.familiar;
        let state = self.nodes.entry(node).or_default();
        let total = state.contact_time.entry(peer).or_insert(SimDuration::ZERO);
        *total = *total + d;
        *total >= familiar
    }
}

impl RoutingPolicy for BubbleRap {
    fn name(&self) -> &'static str {
        "bubble_rap"
    }

    fn on_contact_up(&mut self, a: NodeId, b: NodeId, now: SimTime) {
        let w = self.window_of(now);
        self.record_encounter(a, b, w);
        self.record_encounter(b, a, w);
    }

    fn on_contact_down(&mut self, a: NodeId, b: NodeId, start: SimTime, now: SimTime) {
        if self.in_community(a, b) {
            return;
        }
        let d = now.since(start);
        if d.is_zero() {
            return;
        }
        let familiar = self.add_contact_time(a, b, d);
        self.add_contact_time(b, a, d);
        if familiar {
            self.nodes.entry(a).or_default().community.insert(b);
            self.nodes.entry(b).or_default().community.insert(a);
        }
    }

    fn decide(&self, msg: &Message, _copy: &BufferedCopy, ctx: &DecisionContext) -> RoutingDecision {
        let dest = msg.destination;
        if ctx.peer == dest {
            return RoutingDecision::Forward(ctx.peer);
        }
        let peer_in = self.in_community(ctx.peer, dest);
        let local_in = self.in_community(ctx.local, dest);
        let better = match (peer_in, local_in) {
            (true, false) => return RoutingDecision::Forward(ctx.peer),
            (false, true) => false,
            (true, true) => self.local_centrality(ctx.peer, ctx.now) > self.local_centrality(ctx.local, ctx.now),
            (false, false) => self.global_centrality(ctx.peer, ctx.now) > self.global_centrality(ctx.local, ctx.now),
        };
        if better {
            RoutingDecision::Replicate(vec![ctx.peer])
        } else {
            RoutingDecision::Hold
        }
    }
}
