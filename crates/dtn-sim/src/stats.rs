//! Aggregate counters built from the event stream.

use std::collections::BTreeMap;

use dtn_core::{DropReason, MessageId, NodeId, SimEvent, SimTime, TimedEvent};

use crate::SimObserver;

/// Whole-run counters.  Derived purely from events, so a [`RunStats`] fed
/// the same event sequence always ends identical.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunStats {
    pub contacts:    u64,
    pub created:     u64,
    pub started:     u64,
    pub relayed:     u64,
    pub delivered:   u64,
    pub dropped:     BTreeMap<DropReason, u64>,
    /// Sum of delivery latencies, milliseconds.
    pub latency_sum_ms: u64,
    /// Sum of hop counts over delivered messages.
    pub hop_sum:     u64,
    pub end_time:    SimTime,

    created_at: BTreeMap<MessageId, SimTime>,
    /// Hops travelled by the copy of a message at a node.
    copy_hops:  BTreeMap<(MessageId, NodeId), u64>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, ev: &TimedEvent) {
        match ev.event {
            SimEvent::ContactUp { .. } => self.contacts += 1,
            SimEvent::ContactDown { .. } => {}
            SimEvent::MessageCreated { msg, node } => {
                self.created += 1;
                self.created_at.insert(msg, ev.time);
                self.copy_hops.insert((msg, node), 0);
            }
            SimEvent::TransferStarted { .. } => self.started += 1,
            SimEvent::TransferComplete { .. } => {}
            SimEvent::MessageRelayed { msg, from, to } => {
                self.relayed += 1;
                let hops = self.copy_hops.get(&(msg, from)).copied().unwrap_or(0) + 1;
                self.copy_hops.insert((msg, to), hops);
            }
            SimEvent::MessageDelivered { msg, to, .. } => {
                self.delivered += 1;
                if let Some(&t) = self.created_at.get(&msg) {
                    self.latency_sum_ms += ev.time.since(t).as_millis();
                }
                self.hop_sum += self.hops_at(msg, to);
            }
            SimEvent::MessageDropped { reason, .. } => {
                *self.dropped.entry(reason).or_default() += 1;
            }
        }
    }

    /// Hops the copy of `msg` held by (or delivered to) `node` travelled.
    pub fn hops_at(&self, msg: MessageId, node: NodeId) -> u64 {
        self.copy_hops.get(&(msg, node)).copied().unwrap_or(0)
    }

    pub fn created_at(&self, msg: MessageId) -> Option<SimTime> {
        self.created_at.get(&msg).copied()
    }

    /// Mean hop count of delivered messages.
    pub fn mean_hops(&self) -> Option<f64> {
        (self.delivered > 0).then(|| self.hop_sum as f64 / self.delivered as f64)
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped.values().sum()
    }

    pub fn dropped(&self, reason: DropReason) -> u64 {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    /// Delivered / created; zero before anything is created.
    pub fn delivery_ratio(&self) -> f64 {
        if self.created == 0 { 0.0 } else { self.delivered as f64 / self.created as f64 }
    }

    /// `(relayed - delivered) / delivered`; `None` with no deliveries.
    pub fn overhead_ratio(&self) -> Option<f64> {
        (self.delivered > 0)
            .then(|| (self.relayed as f64 - self.delivered as f64) / self.delivered as f64)
    }

    /// Mean delivery latency in seconds; `None` with no deliveries.
    pub fn mean_latency_secs(&self) -> Option<f64> {
        (self.delivered > 0).then(|| self.latency_sum_ms as f64 / 1_000.0 / self.delivered as f64)
    }
}

impl SimObserver for RunStats {
    fn on_event(&mut self, event: &TimedEvent) {
        self.record(event);
    }

    fn on_sim_end(&mut self, time: SimTime) {
        self.end_time = time;
    }
}
