//! Range-based contact detection.
//!
//! # Strategies
//!
//! | Strategy   | Cost per update        | Notes                                |
//! |------------|------------------------|--------------------------------------|
//! | `Pairwise` | O(n²)                  | reference implementation             |
//! | `RTree`    | O(n log n + k)         | bulk-loaded `rstar` tree, radius query |
//!
//! Both strategies feed the same exact range test, so they report identical
//! transitions for identical input.

use std::collections::{BTreeMap, BTreeSet};

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use dtn_core::{Coord, NodeId, SimTime};

use crate::{Contact, ContactError, ContactLog, ContactResult};

// ── Public types ──────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DetectionStrategy {
    #[default]
    Pairwise,
    #[cfg_attr(feature = "serde", serde(rename = "rtree"))]
    RTree,
}

/// A contact transition for the unordered pair `a < b`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContactChange {
    Up   { a: NodeId, b: NodeId },
    Down { a: NodeId, b: NodeId },
}

impl ContactChange {
    pub fn pair(&self) -> (NodeId, NodeId) {
        match *self {
            ContactChange::Up { a, b } | ContactChange::Down { a, b } => (a, b),
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, ContactChange::Up { .. })
    }
}

// ── R-tree entry ──────────────────────────────────────────────────────────────

#[derive(Clone)]
struct NodeEntry {
    point: [f64; 2],
    id:    NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── ContactDetector ───────────────────────────────────────────────────────────

/// Tracks the set of active contacts across world updates.
pub struct ContactDetector {
    strategy: DetectionStrategy,
    /// Radio range per node, metres.
    ranges:   Vec<f64>,
    /// Active contacts, keyed by ordered pair, valued by start time.
    active:   BTreeMap<(NodeId, NodeId), SimTime>,
    log:      ContactLog,
}

impl ContactDetector {
    pub fn new(strategy: DetectionStrategy, ranges: Vec<f64>) -> ContactResult<Self> {
        if let Some(&bad) = ranges.iter().find(|r| !(r.is_finite() && **r >= 0.0)) {
            return Err(ContactError::InvalidRange(bad));
        }
        Ok(Self { strategy, ranges, active: BTreeMap::new(), log: ContactLog::new() })
    }

    /// Replace the history log (e.g. with [`ContactLog::with_history`]).
    pub fn with_log(mut self, log: ContactLog) -> Self {
        self.log = log;
        self
    }

    pub fn strategy(&self) -> DetectionStrategy {
        self.strategy
    }

    pub fn node_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn log(&self) -> &ContactLog {
        &self.log
    }

    pub fn is_active(&self, a: NodeId, b: NodeId) -> bool {
        self.active.contains_key(&NodeId::pair(a, b))
    }

    /// Start time of the active contact between `a` and `b`.
    pub fn contact_start(&self, a: NodeId, b: NodeId) -> Option<SimTime> {
        self.active.get(&NodeId::pair(a, b)).copied()
    }

    /// Number of currently active contacts.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Active contacts in ascending pair order.
    pub fn active_contacts(&self) -> impl Iterator<Item = Contact> + '_ {
        self.active.iter().map(|(&(a, b), &start)| Contact { a, b, start, end: None })
    }

    /// Peers currently in contact with `node`, ascending.
    pub fn peers_of(&self, node: NodeId) -> Vec<NodeId> {
        self.active
            .keys()
            .filter_map(|&(a, b)| {
                if a == node {
                    Some(b)
                } else if b == node {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Recompute contacts from `positions` and report transitions.
    ///
    /// `enabled[i] == false` marks node `i` dormant; dormant nodes form no
    /// contacts, and any contact they had goes down.
    pub fn update(&mut self, now: SimTime, positions: &[Coord], enabled: &[bool]) -> ContactResult<Vec<ContactChange>> {
        let n = self.ranges.len();
        if positions.len() != n {
            return Err(ContactError::NodeCountMismatch { expected: n, got: positions.len() });
        }
        if enabled.len() != n {
            return Err(ContactError::NodeCountMismatch { expected: n, got: enabled.len() });
        }

        let in_range = match self.strategy {
            DetectionStrategy::Pairwise => self.pairs_pairwise(positions, enabled),
            DetectionStrategy::RTree    => self.pairs_rtree(positions, enabled),
        };

        let downs: Vec<(NodeId, NodeId)> = self
            .active
            .keys()
            .filter(|p| !in_range.contains(p))
            .copied()
            .collect();
        let ups: Vec<(NodeId, NodeId)> = in_range
            .iter()
            .filter(|p| !self.active.contains_key(p))
            .copied()
            .collect();

        let mut changes = Vec::with_capacity(downs.len() + ups.len());
        for (a, b) in downs {
            self.end_contact(a, b, now);
            changes.push(ContactChange::Down { a, b });
        }
        for (a, b) in ups {
            self.active.insert((a, b), now);
            changes.push(ContactChange::Up { a, b });
        }
        Ok(changes)
    }

    /// End every active contact at `now` (end of run).  Downs are returned in
    /// ascending pair order.
    pub fn close_all(&mut self, now: SimTime) -> Vec<ContactChange> {
        let pairs: Vec<(NodeId, NodeId)> = self.active.keys().copied().collect();
        pairs
            .into_iter()
            .map(|(a, b)| {
                self.end_contact(a, b, now);
                ContactChange::Down { a, b }
            })
            .collect()
    }

    fn end_contact(&mut self, a: NodeId, b: NodeId, now: SimTime) {
        if let Some(start) = self.active.remove(&(a, b)) {
            self.log.record(Contact { a, b, start, end: None }, now);
        }
    }

    // ── Strategies ────────────────────────────────────────────────────────

    #[inline]
    fn within(&self, positions: &[Coord], i: usize, j: usize) -> bool {
        let r = self.ranges[i].min(self.ranges[j]);
        positions[i].distance_sq(positions[j]) <= r * r
    }

    fn pairs_pairwise(&self, positions: &[Coord], enabled: &[bool]) -> BTreeSet<(NodeId, NodeId)> {
        let n = positions.len();
        let mut out = BTreeSet::new();
        for i in 0..n {
            if !enabled[i] {
                continue;
            }
            for j in (i + 1)..n {
                if enabled[j] && self.within(positions, i, j) {
                    out.insert((NodeId(i as u32), NodeId(j as u32)));
                }
            }
        }
        out
    }

    fn pairs_rtree(&self, positions: &[Coord], enabled: &[bool]) -> BTreeSet<(NodeId, NodeId)> {
        let entries: Vec<NodeEntry> = positions
            .iter()
            .enumerate()
            .filter(|(i, _)| enabled[*i])
            .map(|(i, p)| NodeEntry { point: [p.x, p.y], id: NodeId(i as u32) })
            .collect();
        let tree = RTree::bulk_load(entries);

        let mut out = BTreeSet::new();
        for (i, p) in positions.iter().enumerate() {
            if !enabled[i] {
                continue;
            }
            // Slightly widened query; the exact test below decides.
            let r = self.ranges[i] * (1.0 + 1e-9) + 1e-9;
            for e in tree.locate_within_distance([p.x, p.y], r * r) {
                let j = e.id.index();
                if j > i && self.within(positions, i, j) {
                    out.insert((NodeId(i as u32), e.id));
                }
            }
        }
        out
    }
}
