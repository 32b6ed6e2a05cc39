//! `EventQueue` — the time-ordered priority queue that drives a run.
//!
//! # Layout
//!
//! Events are bucketed by timestamp in a `BTreeMap<SimTime, VecDeque<…>>`.
//! Inside a bucket events keep insertion order, so popping the front of the
//! first bucket always yields the earliest, oldest event.  Every insertion
//! also receives a monotonically increasing [`EventSeq`] which is carried
//! along for tracing and tests.
//!
//! # Performance note
//!
//! Insert and pop are O(log B) where B = number of distinct pending
//! timestamps.  Discrete-event DTN runs have few distinct instants pending at
//! once (the next world update, a handful of transfer completions, TTL
//! expiries), so the constant is small.

use std::collections::{BTreeMap, VecDeque};

use dtn_core::SimTime;

use crate::{ScheduleError, ScheduleResult};

/// Insertion sequence number of an event; unique within one queue.
pub type EventSeq = u64;

/// An event together with its firing time and insertion sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled<E> {
    pub time:  SimTime,
    pub seq:   EventSeq,
    pub event: E,
}

/// A priority queue keyed by `(time, insertion order)` that owns the run's
/// notion of "now".
#[derive(Debug)]
pub struct EventQueue<E> {
    inner:    BTreeMap<SimTime, VecDeque<(EventSeq, E)>>,
    now:      SimTime,
    next_seq: EventSeq,
    /// Cached total event count for O(1) `len()`.
    total:    usize,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self {
            inner:    BTreeMap::new(),
            now:      SimTime::ZERO,
            next_seq: 0,
            total:    0,
        }
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current simulated time: the timestamp of the last popped event,
    /// or the last time passed to [`advance_to`](Self::advance_to).
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule `event` at absolute `time`.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidTime`] if `time < now`.
    pub fn schedule(&mut self, time: SimTime, event: E) -> ScheduleResult<EventSeq> {
        if time < self.now {
            return Err(ScheduleError::InvalidTime { requested: time, now: self.now });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.inner.entry(time).or_default().push_back((seq, event));
        self.total += 1;
        Ok(seq)
    }

    /// Remove and return the earliest event, advancing `now` to its time.
    pub fn pop(&mut self) -> Option<Scheduled<E>> {
        let mut bucket = self.inner.first_entry()?;
        let time = *bucket.key();
        let (seq, event) = bucket.get_mut().pop_front()?;
        if bucket.get().is_empty() {
            bucket.remove();
        }
        self.total -= 1;
        self.now = time;
        Some(Scheduled { time, seq, event })
    }

    /// The time of the earliest pending event, or `None` if empty.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.inner.keys().next().copied()
    }

    /// Move `now` forward to `time` without popping anything.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidTime`] if `time` is earlier than `now` or later
    /// than a pending event (that would skip it).
    pub fn advance_to(&mut self, time: SimTime) -> ScheduleResult<()> {
        if time < self.now {
            return Err(ScheduleError::InvalidTime { requested: time, now: self.now });
        }
        if let Some(next) = self.peek_time() {
            if next < time {
                return Err(ScheduleError::InvalidTime { requested: time, now: next });
            }
        }
        self.now = time;
        Ok(())
    }

    /// Total number of pending events.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
