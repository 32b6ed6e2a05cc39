//! Routing decisions and copy-token splits.

use dtn_core::{DropReason, NodeId};

/// What to do with one message copy on one active contact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Hand the message to the node; the sender's copy is removed once the
    /// transfer completes.
    Forward(NodeId),
    /// Copy the message to every listed node; the sender keeps its copy.
    Replicate(Vec<NodeId>),
    /// Do nothing on this contact.
    Hold,
    /// Discard the local copy.
    Drop(DropReason),
}

impl RoutingDecision {
    /// `true` for decisions that start a transfer to `peer`.
    pub fn sends_to(&self, peer: NodeId) -> bool {
        match self {
            RoutingDecision::Forward(n)     => *n == peer,
            RoutingDecision::Replicate(ns)  => ns.contains(&peer),
            RoutingDecision::Hold | RoutingDecision::Drop(_) => false,
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, RoutingDecision::Forward(_))
    }
}

/// How replication tokens are divided between sender and receiver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CopySplit {
    /// Tokens the sender keeps.
    pub keep: u32,
    /// Tokens handed to the receiver.
    pub give: u32,
}
