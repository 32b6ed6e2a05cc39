//! PRoPHET routing: replicate towards nodes more likely to meet the
//! destination.

use dtn_core::{NodeId, SimTime};
use dtn_store::{BufferedCopy, Message};

use crate::{
    DecisionContext, DeliveryPredictability, ProphetParams, RoutingDecision, RoutingPolicy,
    RoutingResult,
};

#[derive(Clone, Debug)]
pub struct Prophet {
    preds: DeliveryPredictability,
}

impl Prophet {
    pub fn new(params: ProphetParams) -> RoutingResult<Self> {
        params.validate()?;
        Ok(Self { preds: DeliveryPredictability::new(params) })
    }

    pub fn predictability(&self) -> &DeliveryPredictability {
        &self.preds
    }
}

impl RoutingPolicy for Prophet {
    fn name(&self) -> &'static str {
        "prophet"
    }

    fn on_contact_up(&mut self, a: NodeId, b: NodeId, now: SimTime) {
        self.preds.encounter(a, b, now);
    }

    fn decide(&self, msg: &Message, _copy: &BufferedCopy, ctx: &DecisionContext) -> RoutingDecision {
        if ctx.peer == msg.destination {
            return RoutingDecision::Forward(ctx.peer);
        }
        let theirs = self.preds.get(ctx.peer, msg.destination);
        let ours   = self.preds.get(ctx.local, msg.destination);
        if theirs > ours {
            RoutingDecision::Replicate(vec![ctx.peer])
        } else {
            RoutingDecision::Hold
        }
    }
}
