//! `ReportObserver<W>` — bridges `SimObserver` to a `ReportWriter`.

use std::collections::BTreeMap;

use dtn_core::{MessageId, NodeId, SimEvent, SimTime, TimedEvent};
use dtn_sim::{RunStats, SimObserver};
use tracing::{debug, warn};

use crate::row::{MessageRow, RunSummary, StatsRow};
use crate::writer::ReportWriter;
use crate::{OutputError, OutputResult};

/// What happened to one message so far.
#[derive(Debug, Clone, Copy)]
struct Outcome {
    source:    NodeId,
    created:   SimTime,
    delivered: Option<(NodeId, SimTime, u64)>,
    copies:    u64,
    drops:     u64,
}

/// A [`SimObserver`] that turns the event stream into reports and writes
/// them to any [`ReportWriter`] backend (CSV, SQLite, Parquet).
///
/// A stats row is written every `stats_interval` contacts (zero disables
/// periodic rows) and once more at the end of the run.  Per-message rows and
/// the [`RunSummary`] are written when the run ends.
///
/// Errors from the writer are stored internally because `SimObserver` methods
/// have no return value.  After `sim.run()` returns, check for errors with
/// [`take_error`][Self::take_error].
pub struct ReportObserver<W: ReportWriter> {
    writer:         W,
    stats:          RunStats,
    outcomes:       BTreeMap<MessageId, Outcome>,
    stats_interval: u64,
    summary:        Option<RunSummary>,
    last_error:     Option<OutputError>,
}

impl<W: ReportWriter> ReportObserver<W> {
    pub fn new(writer: W, stats_interval: u64) -> Self {
        Self {
            writer,
            stats:          RunStats::new(),
            outcomes:       BTreeMap::new(),
            stats_interval,
            summary:        None,
            last_error:     None,
        }
    }

    /// Running counters, updated on every event.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// The aggregate written at the end of the run; `None` until then.
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Take the stored write error (if any) after `sim.run()` returns.
    ///
    /// Returns `None` if all writes succeeded.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Unwrap the inner writer (e.g. to inspect files after the sim).
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Per-message rows in message id order.
    pub fn message_rows(&self) -> Vec<MessageRow> {
        self.outcomes
            .iter()
            .map(|(&msg, o)| {
                let (destination, latency_secs, hops) = match o.delivered {
                    Some((to, at, hops)) => (to.0, at.since(o.created).as_secs_f64(), hops),
                    None => (NodeId::INVALID.0, f64::NAN, 0),
                };
                MessageRow {
                    msg:          msg.0,
                    source:       o.source.0,
                    created_secs: o.created.as_secs_f64(),
                    delivered:    o.delivered.is_some(),
                    destination,
                    latency_secs,
                    hops,
                    copies:       o.copies,
                    drops:        o.drops,
                }
            })
            .collect()
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                warn!(error = %e, "report write failed");
                self.last_error = Some(e);
            }
        }
    }

    fn write_stats_row(&mut self, time: SimTime) {
        let row = StatsRow::from_stats(time.as_secs_f64(), &self.stats);
        let result = self.writer.write_stats(&row);
        self.store_err(result);
    }
}

impl<W: ReportWriter> SimObserver for ReportObserver<W> {
    fn on_event(&mut self, ev: &TimedEvent) {
        self.stats.record(ev);

        match ev.event {
            SimEvent::ContactUp { .. } => {
                if self.stats_interval > 0 && self.stats.contacts % self.stats_interval == 0 {
                    self.write_stats_row(ev.time);
                }
            }
            SimEvent::MessageCreated { msg, node } => {
                self.outcomes.insert(msg, Outcome {
                    source:    node,
                    created:   ev.time,
                    delivered: None,
                    copies:    0,
                    drops:     0,
                });
            }
            SimEvent::MessageRelayed { msg, .. } => {
                if let Some(o) = self.outcomes.get_mut(&msg) {
                    o.copies += 1;
                }
            }
            SimEvent::MessageDelivered { msg, to, .. } => {
                let hops = self.stats.hops_at(msg, to);
                if let Some(o) = self.outcomes.get_mut(&msg) {
                    if o.delivered.is_none() {
                        o.delivered = Some((to, ev.time, hops));
                    }
                }
            }
            SimEvent::MessageDropped { msg, .. } => {
                if let Some(o) = self.outcomes.get_mut(&msg) {
                    o.drops += 1;
                }
            }
            _ => {}
        }
    }

    fn on_sim_end(&mut self, time: SimTime) {
        if self.summary.is_some() {
            return;
        }
        self.stats.end_time = time;
        if self.stats_interval > 0 {
            self.write_stats_row(time);
        }

        let rows = self.message_rows();
        let result = self.writer.write_messages(&rows);
        self.store_err(result);

        let summary = RunSummary::from_stats(&self.stats);
        let result = self.writer.write_summary(&summary);
        self.store_err(result);
        self.summary = Some(summary);

        let result = self.writer.finish();
        self.store_err(result);
        debug!(messages = rows.len(), ok = self.last_error.is_none(), "reports written");
    }
}
