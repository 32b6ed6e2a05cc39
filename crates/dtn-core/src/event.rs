//! The public simulation event union.
//!
//! Every observable lifecycle change of a run is one [`SimEvent`], stamped
//! with the simulated time at which it happened ([`TimedEvent`]).  Observers,
//! report writers, and console sinks consume these; they never see the
//! scheduler's internal actions.

use std::fmt;

use crate::{MessageId, NodeId, SimTime};

// ── DropReason ────────────────────────────────────────────────────────────────

/// Why a message copy (or an in-flight transfer) was discarded.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DropReason {
    /// The message's TTL deadline passed.
    TtlExpired,
    /// The contact ended before the transfer completed.
    LinkLost,
    /// Removed by the buffer's eviction policy to make room.
    Evicted,
    /// The buffer could not make room for the incoming message.
    CapacityExceeded,
    /// The routing policy decided to drop the copy.
    Policy,
}

impl DropReason {
    /// Stable label used by log lines and report columns.
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::TtlExpired       => "ttl_expired",
            DropReason::LinkLost         => "link_lost",
            DropReason::Evicted          => "evicted",
            DropReason::CapacityExceeded => "capacity_exceeded",
            DropReason::Policy           => "policy",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── SimEvent ──────────────────────────────────────────────────────────────────

/// A discrete lifecycle event of a simulation run.
///
/// Contact pairs are always reported as `a < b`.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SimEvent {
    ContactUp   { a: NodeId, b: NodeId },
    ContactDown { a: NodeId, b: NodeId },
    /// A new message was created at its source `node`.
    MessageCreated { msg: MessageId, node: NodeId },
    /// A transfer of `msg` from `from` to `to` began on an active contact.
    TransferStarted { msg: MessageId, from: NodeId, to: NodeId },
    /// All bytes of `msg` arrived at `to`.
    TransferComplete { msg: MessageId, from: NodeId, to: NodeId },
    /// `to` accepted the message (as relay or destination).
    MessageRelayed { msg: MessageId, from: NodeId, to: NodeId },
    /// First arrival of `msg` at its destination `to`.
    MessageDelivered { msg: MessageId, from: NodeId, to: NodeId },
    /// A copy held by (or in flight to) `node` was discarded.
    MessageDropped { msg: MessageId, node: NodeId, reason: DropReason },
}

impl SimEvent {
    /// Payload-free discriminant, used for listener filtering.
    pub fn kind(&self) -> EventKind {
        match self {
            SimEvent::ContactUp { .. }        => EventKind::ContactUp,
            SimEvent::ContactDown { .. }      => EventKind::ContactDown,
            SimEvent::MessageCreated { .. }   => EventKind::MessageCreated,
            SimEvent::TransferStarted { .. }  => EventKind::TransferStarted,
            SimEvent::TransferComplete { .. } => EventKind::TransferComplete,
            SimEvent::MessageRelayed { .. }   => EventKind::MessageRelayed,
            SimEvent::MessageDelivered { .. } => EventKind::MessageDelivered,
            SimEvent::MessageDropped { .. }   => EventKind::MessageDropped,
        }
    }

    /// The message this event concerns, if any.
    pub fn message(&self) -> Option<MessageId> {
        match *self {
            SimEvent::ContactUp { .. } | SimEvent::ContactDown { .. } => None,
            SimEvent::MessageCreated { msg, .. }
            | SimEvent::TransferStarted { msg, .. }
            | SimEvent::TransferComplete { msg, .. }
            | SimEvent::MessageRelayed { msg, .. }
            | SimEvent::MessageDelivered { msg, .. }
            | SimEvent::MessageDropped { msg, .. } => Some(msg),
        }
    }
}

// ── EventKind ─────────────────────────────────────────────────────────────────

/// The variant tag of a [`SimEvent`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    ContactUp,
    ContactDown,
    MessageCreated,
    TransferStarted,
    TransferComplete,
    MessageRelayed,
    MessageDelivered,
    MessageDropped,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::ContactUp,
        EventKind::ContactDown,
        EventKind::MessageCreated,
        EventKind::TransferStarted,
        EventKind::TransferComplete,
        EventKind::MessageRelayed,
        EventKind::MessageDelivered,
        EventKind::MessageDropped,
    ];

    /// Upper-case label used by the line-oriented console format.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ContactUp        => "CONTACT_UP",
            EventKind::ContactDown      => "CONTACT_DOWN",
            EventKind::MessageCreated   => "CREATED",
            EventKind::TransferStarted  => "STARTED",
            EventKind::TransferComplete => "COMPLETE",
            EventKind::MessageRelayed   => "RELAYED",
            EventKind::MessageDelivered => "DELIVERED",
            EventKind::MessageDropped   => "DROPPED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── TimedEvent ────────────────────────────────────────────────────────────────

/// A [`SimEvent`] stamped with the time it happened.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedEvent {
    pub time:  SimTime,
    pub event: SimEvent,
}

impl TimedEvent {
    #[inline]
    pub fn new(time: SimTime, event: SimEvent) -> Self {
        Self { time, event }
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

/// Line format: `<secs> <KIND> <fields…>`, ids printed as bare integers.
impl fmt::Display for TimedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} {}", self.time.as_secs_f64(), self.kind())?;
        match self.event {
            SimEvent::ContactUp { a, b } | SimEvent::ContactDown { a, b } => {
                write!(f, " {} {}", a.0, b.0)
            }
            SimEvent::MessageCreated { msg, node } => write!(f, " M{} {}", msg.0, node.0),
            SimEvent::TransferStarted { msg, from, to }
            | SimEvent::TransferComplete { msg, from, to }
            | SimEvent::MessageRelayed { msg, from, to }
            | SimEvent::MessageDelivered { msg, from, to } => {
                write!(f, " M{} {} {}", msg.0, from.0, to.0)
            }
            SimEvent::MessageDropped { msg, node, reason } => {
                write!(f, " M{} {} {}", msg.0, node.0, reason)
            }
        }
    }
}
