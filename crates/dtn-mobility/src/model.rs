//! The `MobilityModel` trait and the trivial static model.

use dtn_core::{Coord, NodeId, SimTime};

/// A source of node positions over simulated time.
///
/// # Contract
///
/// - `advance_to(t)` extends the model so positions up to `t` are known.
///   It is idempotent and a no-op for `t` not after the current horizon.
/// - `position(node, s)` for `s <= horizon` is pure: repeated queries return
///   the same coordinate regardless of later `advance_to` calls.
/// - `Send` so whole simulations can move between sweep worker threads.
pub trait MobilityModel: Send {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    fn node_count(&self) -> usize;

    fn advance_to(&mut self, time: SimTime);

    /// Position of `node` at `time`.
    ///
    /// # Panics
    ///
    /// May panic if `node.index() >= node_count()`.
    fn position(&self, node: NodeId, time: SimTime) -> Coord;
}

impl<M: MobilityModel + ?Sized> MobilityModel for Box<M> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn node_count(&self) -> usize {
        (**self).node_count()
    }

    fn advance_to(&mut self, time: SimTime) {
        (**self).advance_to(time)
    }

    fn position(&self, node: NodeId, time: SimTime) -> Coord {
        (**self).position(node, time)
    }
}

// ── StaticMobility ────────────────────────────────────────────────────────────

/// Nodes that never move.
#[derive(Clone, Debug)]
pub struct StaticMobility {
    positions: Vec<Coord>,
}

impl StaticMobility {
    pub fn new(positions: Vec<Coord>) -> Self {
        Self { positions }
    }
}

impl MobilityModel for StaticMobility {
    fn name(&self) -> &'static str {
        "static"
    }

    fn node_count(&self) -> usize {
        self.positions.len()
    }

    fn advance_to(&mut self, _time: SimTime) {}

    #[inline]
    fn position(&self, node: NodeId, _time: SimTime) -> Coord {
        self.positions[node.index()]
    }
}
