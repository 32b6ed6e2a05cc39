//! The `RoutingPolicy` trait — the engine's extension point for routing.

use dtn_core::{NodeId, SimTime};
use dtn_store::{BufferedCopy, Message};

use crate::{CopySplit, DecisionContext, RoutingDecision};

/// Pluggable routing behaviour.
///
/// The engine owns all buffers and transfers; a policy only answers
/// questions and keeps its own bookkeeping (encounter history, delivery
/// predictabilities).
///
/// # Required methods
///
/// Only [`name`](Self::name) and [`decide`](Self::decide) are required.  The
/// hooks default to no-ops and single-token copies.
///
/// # Thread safety
///
/// Policies are `Send` so a whole simulation can move to a sweep worker.
pub trait RoutingPolicy: Send {
    fn name(&self) -> &'static str;

    /// Called once when `msg` is created.  Returns the number of replication
    /// tokens the source copy starts with.
    fn on_message_created(&mut self, _msg: &Message) -> u32 {
        1
    }

    /// Called when `a` and `b` come into contact, before any message is
    /// offered on the contact.
    fn on_contact_up(&mut self, _a: NodeId, _b: NodeId, _now: SimTime) {}

    /// Called when the contact between `a` and `b` that began at `start` ends.
    fn on_contact_down(&mut self, _a: NodeId, _b: NodeId, _start: SimTime, _now: SimTime) {}

    /// Decide what to do with `copy` of `msg` on the contact in `ctx`.
    fn decide(&self, msg: &Message, copy: &BufferedCopy, ctx: &DecisionContext) -> RoutingDecision;

    /// Token split when a copy holding `tokens` is replicated.  The default
    /// gives both sides the full count (tokens are unused).
    fn split_copies(&self, tokens: u32) -> CopySplit {
        CopySplit { keep: tokens, give: tokens }
    }
}

impl<P: RoutingPolicy + ?Sized> RoutingPolicy for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn on_message_created(&mut self, msg: &Message) -> u32 {
        (**self).on_message_created(msg)
    }

    fn on_contact_up(&mut self, a: NodeId, b: NodeId, now: SimTime) {
        (**self).on_contact_up(a, b, now)
    }

    fn on_contact_down(&mut self, a: NodeId, b: NodeId, start: SimTime, now: SimTime) {
        (**self).on_contact_down(a, b, start, now)
    }

    fn decide(&self, msg: &Message, copy: &BufferedCopy, ctx: &DecisionContext) -> RoutingDecision {
        (**self).decide(msg, copy, ctx)
    }

    fn split_copies(&self, tokens: u32) -> CopySplit {
        (**self).split_copies(tokens)
    }
}
