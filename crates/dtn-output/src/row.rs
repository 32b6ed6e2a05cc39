//! Plain data row types written by report backends.  Times are seconds.

use dtn_core::DropReason;
use dtn_sim::RunStats;

/// Final outcome of one message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageRow {
    pub msg:            u32,
    pub source:         u32,
    pub created_secs:   f64,
    pub delivered:      bool,
    /// Receiving node; `u32::MAX` if undelivered.
    pub destination:    u32,
    /// `NaN` if undelivered.
    pub latency_secs:   f64,
    /// Hops of the delivered copy; zero if undelivered.
    pub hops:           u64,
    /// Times any node accepted a copy.
    pub copies:         u64,
    /// Copies or transfers discarded, for any reason.
    pub drops:          u64,
}

/// Running totals, written every N contacts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsRow {
    pub time_secs:         f64,
    pub contacts:          u64,
    pub created:           u64,
    pub delivered:         u64,
    pub delivery_ratio:    f64,
    /// `(relayed - delivered) / delivered`; `NaN` before the first delivery.
    pub overhead_ratio:    f64,
    /// `NaN` before the first delivery.
    pub mean_latency_secs: f64,
    /// Total accepted copies (relays and deliveries).
    pub forwards:          u64,
}

impl StatsRow {
    pub fn from_stats(time_secs: f64, s: &RunStats) -> Self {
        Self {
            time_secs,
            contacts:          s.contacts,
            created:           s.created,
            delivered:         s.delivered,
            delivery_ratio:    s.delivery_ratio(),
            overhead_ratio:    s.overhead_ratio().unwrap_or(f64::NAN),
            mean_latency_secs: s.mean_latency_secs().unwrap_or(f64::NAN),
            forwards:          s.relayed,
        }
    }
}

/// Whole-run aggregate, one row per run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub end_secs:          f64,
    pub contacts:          u64,
    pub created:           u64,
    pub started:           u64,
    pub relayed:           u64,
    pub delivered:         u64,
    pub delivery_ratio:    f64,
    pub overhead_ratio:    f64,
    pub mean_latency_secs: f64,
    pub mean_hops:         f64,
    pub dropped_ttl:       u64,
    pub dropped_link_lost: u64,
    pub dropped_evicted:   u64,
    pub dropped_capacity:  u64,
    pub dropped_policy:    u64,
}

impl RunSummary {
    pub fn from_stats(s: &RunStats) -> Self {
        Self {
            end_secs:          s.end_time.as_secs_f64(),
            contacts:          s.contacts,
            created:           s.created,
            started:           s.started,
            relayed:           s.relayed,
            delivered:         s.delivered,
            delivery_ratio:    s.delivery_ratio(),
            overhead_ratio:    s.overhead_ratio().unwrap_or(f64::NAN),
            mean_latency_secs: s.mean_latency_secs().unwrap_or(f64::NAN),
            mean_hops:         s.mean_hops().unwrap_or(f64::NAN),
            dropped_ttl:       s.dropped(DropReason::TtlExpired),
            dropped_link_lost: s.dropped(DropReason::LinkLost),
            dropped_evicted:   s.dropped(DropReason::Evicted),
            dropped_capacity:  s.dropped(DropReason::CapacityExceeded),
            dropped_policy:    s.dropped(DropReason::Policy),
        }
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_ttl + self.dropped_link_lost + self.dropped_evicted + self.dropped_capacity + self.dropped_policy
    }
}
