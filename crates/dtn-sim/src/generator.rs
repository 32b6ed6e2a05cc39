//! Message workload: explicit one-off messages and a random generator.

use serde::Deserialize;

use dtn_core::{Draws, NodeId, SimDuration, SimRng, SimTime};

use crate::{SimError, SimResult};

/// One message to create at `time`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MessageSpec {
    pub time:        SimTime,
    pub source:      NodeId,
    pub destination: NodeId,
    pub ttl:         SimDuration,
    pub size:        u64,
    pub priority:    i32,
}

impl MessageSpec {
    pub fn new(time: SimTime, source: NodeId, destination: NodeId, ttl: SimDuration, size: u64) -> Self {
        Self { time, source, destination, ttl, size, priority: 0 }
    }

    pub fn validate(&self, node_count: usize) -> SimResult<()> {
        for n in [self.source, self.destination] {
            if n.index() >= node_count {
                return Err(SimError::Config(format!("message endpoint {n} out of range (node count {node_count})")));
            }
        }
        if self.source == self.destination {
            return Err(SimError::Config(format!("message source and destination are both {}", self.source)));
        }
        Ok(())
    }
}

/// Scenario-file form of [`MessageSpec`]; times in seconds.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct MessageConfig {
    pub time:        f64,
    pub source:      u32,
    pub destination: u32,
    pub ttl:         f64,
    pub size:        u64,
    #[serde(default)]
    pub priority:    i32,
}

impl From<MessageConfig> for MessageSpec {
    fn from(c: MessageConfig) -> Self {
        MessageSpec {
            time:        SimTime::from_secs_f64(c.time),
            source:      NodeId(c.source),
            destination: NodeId(c.destination),
            ttl:         SimDuration::from_secs_f64(c.ttl),
            size:        c.size,
            priority:    c.priority,
        }
    }
}

/// Random message generation parameters.
///
/// Creation times are spaced by a uniform draw from `interval`; size is
/// uniform in `size`; source and destination are drawn uniformly from the
/// half-open node ranges `hosts` and `to_hosts` (all nodes when unset) and
/// always differ.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// `[min, max]` seconds between messages.
    pub interval: [f64; 2],
    /// `[min, max]` payload bytes.
    pub size:     [u64; 2],
    /// Seconds.
    pub ttl:      f64,
    pub hosts:    Option<[u32; 2]>,
    pub to_hosts: Option<[u32; 2]>,
    /// First creation time, seconds.
    pub start:    f64,
    /// No messages at or after this time, seconds.
    pub end:      Option<f64>,
    pub priority: i32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval: [25.0, 35.0],
            size:     [500, 1_000],
            ttl:      3_600.0,
            hosts:    None,
            to_hosts: None,
            start:    0.0,
            end:      None,
            priority: 0,
        }
    }
}

pub struct MessageGenerator {
    cfg:   GeneratorConfig,
    rng:   SimRng,
    from:  (u32, u32),
    to:    (u32, u32),
    end:   SimTime,
}

impl MessageGenerator {
    pub fn new(cfg: GeneratorConfig, node_count: usize, rng: SimRng) -> SimResult<Self> {
        let n = node_count as u32;
        let range = |r: Option<[u32; 2]>, what: &str| -> SimResult<(u32, u32)> {
            let (lo, hi) = r.map_or((0, n), |[lo, hi]| (lo, hi));
            if lo >= hi || hi > n {
                return Err(SimError::Config(format!("generator {what} range {lo}..{hi} invalid for {n} nodes")));
            }
            Ok((lo, hi))
        };
        let from = range(cfg.hosts, "hosts")?;
        let to   = range(cfg.to_hosts, "to_hosts")?;
        if from.1 - from.0 == 1 && to.1 - to.0 == 1 && from.0 == to.0 {
            return Err(SimError::Config("generator source and destination ranges are the same single node".into()));
        }
        let [lo, hi] = cfg.interval;
        if !(lo >= 0.0 && hi >= lo && hi > 0.0 && hi.is_finite()) {
            return Err(SimError::Config(format!("generator interval [{lo}, {hi}] invalid")));
        }
        if cfg.size[0] > cfg.size[1] {
            return Err(SimError::Config("generator size range is inverted".into()));
        }
        if !(cfg.ttl >= 0.0 && cfg.ttl.is_finite()) {
            return Err(SimError::Config("generator ttl must be finite and >= 0".into()));
        }
        let end = cfg.end.map_or(SimTime::MAX, SimTime::from_secs_f64);
        Ok(Self { cfg, rng, from, to, end })
    }

    /// Time of the first message, if it falls before the generator's end.
    pub fn first_time(&self) -> Option<SimTime> {
        let t = SimTime::from_secs_f64(self.cfg.start);
        (t < self.end).then_some(t)
    }

    /// Draw the message created at `now` and the time of the following one.
    pub fn next(&mut self, now: SimTime) -> (MessageSpec, Option<SimTime>) {
        let (source, destination) = loop {
            let s = self.rng.gen_range(self.from.0..self.from.1);
            let d = self.rng.gen_range(self.to.0..self.to.1);
            if s != d {
                break (s, d);
            }
        };
        let size = self.rng.gen_range(self.cfg.size[0]..=self.cfg.size[1]);
        let spec = MessageSpec {
            time: now,
            source: NodeId(source),
            destination: NodeId(destination),
            ttl: SimDuration::from_secs_f64(self.cfg.ttl),
            size,
            priority: self.cfg.priority,
        };
        let gap = self.rng.uniform_between(self.cfg.interval[0], self.cfg.interval[1]);
        // A zero gap would repeat `now` forever; step at least one millisecond.
        let gap = SimDuration::from_secs_f64(gap).max(SimDuration::from_millis(1));
        let next = now + gap;
        (spec, (next < self.end).then_some(next))
    }
}
