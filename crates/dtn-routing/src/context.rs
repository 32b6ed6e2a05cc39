//! Read-only state passed to every routing decision.

use dtn_core::{NodeId, SimDuration, SimTime};

/// A snapshot of everything a policy may consult when deciding about one
/// message on one contact.
///
/// Built by the engine per decision; policies never see the engine's
/// mutable state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DecisionContext {
    pub now:   SimTime,
    /// The node holding the copy.
    pub local: NodeId,
    /// The node on the other end of the contact.
    pub peer:  NodeId,

    pub contact_start: SimTime,

    /// Mean length of past contacts between `local` and `peer`, if any.
    pub estimated_contact_duration: Option<SimDuration>,

    /// Buffer fill levels in `[0, 1]`.
    pub local_occupancy: f64,
    pub peer_occupancy:  f64,

    /// Remaining TTL of the message as a fraction of its TTL, in `[0, 1]`.
    pub remaining_ttl_fraction: f64,
}

impl DecisionContext {
    /// Time the current contact has lasted so far.
    pub fn contact_elapsed(&self) -> SimDuration {
        self.now.since(self.contact_start)
    }
}
