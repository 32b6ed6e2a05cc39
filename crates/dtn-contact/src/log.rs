//! Contact history.

use rustc_hash::FxHashMap;

use dtn_core::{NodeId, SimDuration, SimTime};

/// One contact between an unordered pair (`a < b`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Contact {
    pub a:     NodeId,
    pub b:     NodeId,
    pub start: SimTime,
    /// `None` while the contact is active.
    pub end:   Option<SimTime>,
}

impl Contact {
    pub fn is_active(&self) -> bool {
        self.end.is_none()
    }

    /// Length of the contact, measured up to `now` while still active.
    pub fn duration(&self, now: SimTime) -> SimDuration {
        self.end.unwrap_or(now).since(self.start)
    }
}

#[derive(Copy, Clone, Default, Debug)]
struct PairStats {
    count:    u64,
    total_ms: u64,
}

/// Completed contacts plus running per-pair duration statistics.
#[derive(Default, Debug)]
pub struct ContactLog {
    completed:    Vec<Contact>,
    per_pair:     FxHashMap<(NodeId, NodeId), PairStats>,
    keep_history: bool,
}

impl ContactLog {
    /// A log that keeps only per-pair statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that also retains every completed contact.
    pub fn with_history() -> Self {
        Self { keep_history: true, ..Self::default() }
    }

    pub fn record(&mut self, contact: Contact, end: SimTime) {
        let contact = Contact { end: Some(end), ..contact };
        let stats = self.per_pair.entry(NodeId::pair(contact.a, contact.b)).or_default();
        stats.count    += 1;
        stats.total_ms += end.since(contact.start).as_millis();
        if self.keep_history {
            self.completed.push(contact);
        }
    }

    /// Completed contacts in completion order (empty unless built with
    /// [`with_history`](Self::with_history)).
    pub fn completed(&self) -> &[Contact] {
        &self.completed
    }

    /// Number of completed contacts between `a` and `b`.
    pub fn count(&self, a: NodeId, b: NodeId) -> u64 {
        self.per_pair.get(&NodeId::pair(a, b)).map_or(0, |s| s.count)
    }

    /// Total number of completed contacts.
    pub fn total(&self) -> u64 {
        self.per_pair.values().map(|s| s.count).sum()
    }

    /// Mean duration of completed contacts between `a` and `b`.
    pub fn mean_duration(&self, a: NodeId, b: NodeId) -> Option<SimDuration> {
        let s = self.per_pair.get(&NodeId::pair(a, b))?;
        (s.count > 0).then(|| SimDuration::from_millis(s.total_ms / s.count))
    }
}
