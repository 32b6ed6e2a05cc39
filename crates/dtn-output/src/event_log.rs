//! Line-oriented event log.

use std::io::Write;

use dtn_core::{EventKind, TimedEvent};
use dtn_sim::SimObserver;

use crate::{OutputError, OutputResult};

/// Writes one line per event, `<secs> <KIND> <fields>`, to any
/// [`Write`] sink (a file, stdout, a `Vec<u8>`).
///
/// ```text
/// 1.000 CONTACT_UP 0 1
/// 1.000 STARTED M0 0 1
/// 1.004 DELIVERED M0 0 1
/// ```
pub struct EventLogSink<W: Write> {
    out:        W,
    kinds:      Option<Vec<EventKind>>,
    last_error: Option<OutputError>,
}

impl<W: Write> EventLogSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, kinds: None, last_error: None }
    }

    /// Only log events of the given kinds.
    pub fn only(mut self, kinds: &[EventKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: Write> SimObserver for EventLogSink<W> {
    fn handles(&self, kind: EventKind) -> bool {
        self.kinds.as_ref().is_none_or(|k| k.contains(&kind))
    }

    fn on_event(&mut self, event: &TimedEvent) {
        // Stop writing after the first failure; the sink is likely gone.
        if self.last_error.is_some() {
            return;
        }
        let result = writeln!(self.out, "{event}").map_err(OutputError::from);
        self.store_err(result);
    }

    fn on_sim_end(&mut self, _time: dtn_core::SimTime) {
        let result = self.out.flush().map_err(OutputError::from);
        self.store_err(result);
    }
}
