//! The message record.

use std::collections::BTreeSet;

use dtn_core::{MessageId, NodeId, SimDuration, SimTime};

/// One relay step of a message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hop {
    pub from: NodeId,
    pub to:   NodeId,
    pub time: SimTime,
}

/// An application message and its network-wide state.
///
/// `size` and the addressing fields never change after creation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    pub id:           MessageId,
    pub source:       NodeId,
    pub destination:  NodeId,
    pub created:      SimTime,
    pub ttl:          SimDuration,
    /// Payload size in bytes.
    pub size:         u64,
    /// Higher is more important.
    pub priority:     i32,
    /// Nodes currently buffering a copy.
    pub holders:      BTreeSet<NodeId>,
    pub hops:         Vec<Hop>,
    /// First arrival at the destination.
    pub delivered_at: Option<SimTime>,
}

impl Message {
    pub fn new(
        id:          MessageId,
        source:      NodeId,
        destination: NodeId,
        created:     SimTime,
        ttl:         SimDuration,
        size:        u64,
    ) -> Self {
        Self {
            id,
            source,
            destination,
            created,
            ttl,
            size,
            priority: 0,
            holders: BTreeSet::new(),
            hops: Vec::new(),
            delivered_at: None,
        }
    }

    /// Absolute expiry deadline.
    #[inline]
    pub fn expires_at(&self) -> SimTime {
        self.created + self.ttl
    }

    /// `true` once `now >= created + ttl`.
    #[inline]
    pub fn is_expired(&self, now: SimTime) -> bool {
        now >= self.expires_at()
    }

    #[inline]
    pub fn remaining_ttl(&self, now: SimTime) -> SimDuration {
        self.expires_at().since(now)
    }

    /// Remaining lifetime as a fraction of the TTL, in `[0, 1]`.
    pub fn remaining_fraction(&self, now: SimTime) -> f64 {
        if self.ttl.is_zero() {
            return 0.0;
        }
        (self.remaining_ttl(now).as_millis() as f64 / self.ttl.as_millis() as f64).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn is_delivered(&self) -> bool {
        self.delivered_at.is_some()
    }

    /// Delivery latency, if delivered.
    pub fn latency(&self) -> Option<SimDuration> {
        self.delivered_at.map(|t| t.since(self.created))
    }
}
