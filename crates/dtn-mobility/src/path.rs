//! Per-node movement history as a list of timed legs.

use dtn_core::{Coord, SimTime};

/// One straight-line segment of a node's movement.
///
/// The node is at `from` at `depart`, at `to` at `arrive`, and moves at
/// constant speed in between.  A pause is a leg with `from == to`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Leg {
    pub depart: SimTime,
    pub arrive: SimTime,
    pub from:   Coord,
    pub to:     Coord,
}

impl Leg {
    /// Construct a pause at `at` covering `[depart, arrive]`.
    #[inline]
    pub fn pause(at: Coord, depart: SimTime, arrive: SimTime) -> Self {
        Self { depart, arrive, from: at, to: at }
    }

    #[inline]
    pub fn is_pause(&self) -> bool {
        self.from == self.to
    }

    /// Fraction of the leg completed at `now`, in `[0.0, 1.0]`.
    ///
    /// Returns `1.0` for zero-length legs or when `now >= arrive`.
    pub fn progress(&self, now: SimTime) -> f64 {
        if self.arrive <= self.depart {
            return 1.0;
        }
        let elapsed = now.0.saturating_sub(self.depart.0) as f64;
        let total   = (self.arrive.0 - self.depart.0) as f64;
        (elapsed / total).min(1.0)
    }

    /// Interpolated position at `now`.
    #[inline]
    pub fn position_at(&self, now: SimTime) -> Coord {
        if self.is_pause() {
            return self.from;
        }
        self.from.lerp(self.to, self.progress(now))
    }
}

/// An append-only sequence of contiguous legs starting at `origin`.
///
/// Leg `i + 1` departs where and when leg `i` arrives.  The node sits at
/// `origin` until the first leg departs and at the last leg's `to` after the
/// horizon.
#[derive(Clone, Debug)]
pub struct Path {
    origin: Coord,
    start:  SimTime,
    legs:   Vec<Leg>,
}

impl Path {
    pub fn new(origin: Coord, start: SimTime) -> Self {
        Self { origin, start, legs: Vec::new() }
    }

    /// Time up to which positions are determined.
    #[inline]
    pub fn horizon(&self) -> SimTime {
        self.legs.last().map_or(self.start, |l| l.arrive)
    }

    /// Position at the horizon; the next leg departs from here.
    #[inline]
    pub fn end_position(&self) -> Coord {
        self.legs.last().map_or(self.origin, |l| l.to)
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Append a leg.  It must depart at the current horizon from the current
    /// end position.
    pub fn push(&mut self, leg: Leg) {
        debug_assert_eq!(leg.depart, self.horizon(), "legs must be contiguous in time");
        debug_assert!(leg.arrive >= leg.depart);
        self.legs.push(leg);
    }

    /// Position at `now`.  Times past the horizon report the end position.
    pub fn position(&self, now: SimTime) -> Coord {
        match self.legs.first() {
            None => return self.origin,
            Some(first) if now < first.depart => return self.origin,
            Some(_) => {}
        }
        // First leg still in progress at `now`.
        let idx = self.legs.partition_point(|l| l.arrive <= now);
        match self.legs.get(idx) {
            Some(leg) => leg.position_at(now),
            None      => self.end_position(),
        }
    }
}
