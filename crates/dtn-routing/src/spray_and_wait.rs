//! Spray and Wait: a fixed budget of copies per message.
//!
//! The source starts with `copies` tokens.  A holder with more than one
//! token replicates to any peer, handing over part of its budget:
//!
//! | Mode            | Sender keeps   | Receiver gets  |
//! |-----------------|----------------|----------------|
//! | binary          | `floor(n / 2)` | `ceil(n / 2)`  |
//! | source spraying | `n - 1`        | `1`            |
//!
//! With a single token left the holder waits for the destination.

use serde::Deserialize;

use dtn_store::{BufferedCopy, Message};

use crate::{CopySplit, DecisionContext, RoutingDecision, RoutingError, RoutingPolicy, RoutingResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SprayAndWaitParams {
    pub copies: u32,
    pub binary: bool,
}

impl Default for SprayAndWaitParams {
    fn default() -> Self {
        Self { copies: 6, binary: true }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SprayAndWait {
    params: SprayAndWaitParams,
}

impl SprayAndWait {
    pub fn new(params: SprayAndWaitParams) -> RoutingResult<Self> {
        if params.copies == 0 {
            return Err(RoutingError::Config("spray-and-wait needs at least one copy".into()));
        }
        Ok(Self { params })
    }
}

impl RoutingPolicy for SprayAndWait {
    fn name(&self) -> &'static str {
        "spray_and_wait"
    }

    fn on_message_created(&mut self, _msg: &Message) -> u32 {
        self.params.copies
    }

    fn decide(&self, msg: &Message, copy: &BufferedCopy, ctx: &DecisionContext) -> RoutingDecision {
        if ctx.peer == msg.destination {
            RoutingDecision::Forward(ctx.peer)
        } else if copy.tokens > 1 {
            RoutingDecision::Replicate(vec![ctx.peer])
        } else {
            RoutingDecision::Hold
        }
    }

    fn split_copies(&self, tokens: u32) -> CopySplit {
        if self.params.binary {
            CopySplit { keep: tokens / 2, give: tokens.div_ceil(2) }
        } else {
            CopySplit { keep: tokens.saturating_sub(1), give: 1 }
        }
    }
}
