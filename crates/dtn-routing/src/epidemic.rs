//! Epidemic flooding and direct delivery.

use dtn_store::{BufferedCopy, Message};

use crate::{DecisionContext, RoutingDecision, RoutingPolicy};

/// Replicate every message to every peer that lacks it; hand it straight to
/// its destination.
#[derive(Copy, Clone, Debug, Default)]
pub struct Epidemic;

impl RoutingPolicy for Epidemic {
    fn name(&self) -> &'static str {
        "epidemic"
    }

    fn decide(&self, msg: &Message, _copy: &BufferedCopy, ctx: &DecisionContext) -> RoutingDecision {
        if ctx.peer == msg.destination {
            RoutingDecision::Forward(ctx.peer)
        } else {
            RoutingDecision::Replicate(vec![ctx.peer])
        }
    }
}

/// Only ever transfer to the destination itself.
#[derive(Copy, Clone, Debug, Default)]
pub struct DirectDelivery;

impl RoutingPolicy for DirectDelivery {
    fn name(&self) -> &'static str {
        "direct_delivery"
    }

    fn decide(&self, msg: &Message, _copy: &BufferedCopy, ctx: &DecisionContext) -> RoutingDecision {
        if ctx.peer == msg.destination {
            RoutingDecision::Forward(ctx.peer)
        } else {
            RoutingDecision::Hold
        }
    }
}
