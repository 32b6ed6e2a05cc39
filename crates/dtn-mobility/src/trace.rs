//! Trace playback: positions from externally recorded samples.
//!
//! # CSV format
//!
//! ```csv
//! time,node,x,y
//! 0,0,10.0,10.0
//! 60,0,70.0,10.0
//! 0,1,500.0,500.0
//! ```
//!
//! `time` is in seconds.  Rows may appear in any order; each node's samples
//! are sorted by time at load.  Between samples the position is linearly
//! interpolated; before the first and after the last it is clamped.  Nodes
//! without samples sit at the origin.

use std::io::Read;

use serde::Deserialize;

use dtn_core::{Coord, NodeId, SimTime};

use crate::{MobilityError, MobilityModel, MobilityResult};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TraceSample {
    pub time: SimTime,
    pub pos:  Coord,
}

#[derive(Deserialize)]
struct TraceRecord {
    time: f64,
    node: u32,
    x:    f64,
    y:    f64,
}

#[derive(Clone, Debug)]
pub struct TracePlayback {
    samples: Vec<Vec<TraceSample>>,
}

impl TracePlayback {
    /// Build from per-node sample lists (indexed by `NodeId`).  Samples are
    /// sorted by time; a stable sort keeps the later row for duplicates last.
    pub fn new(mut samples: Vec<Vec<TraceSample>>) -> Self {
        for s in &mut samples {
            s.sort_by_key(|x| x.time);
        }
        Self { samples }
    }

    /// Load from CSV.  `node_count` may exceed the highest node in the file;
    /// a node id at or beyond it is an error.
    pub fn from_reader<R: Read>(reader: R, node_count: usize) -> MobilityResult<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut samples: Vec<Vec<TraceSample>> = vec![Vec::new(); node_count];
        for (i, row) in csv_reader.deserialize::<TraceRecord>().enumerate() {
            let row  = row?;
            let line = i as u64 + 2;
            if row.node as usize >= node_count {
                return Err(MobilityError::Trace {
                    line,
                    msg: format!("node {} out of range (node count {node_count})", row.node),
                });
            }
            if !(row.time >= 0.0 && row.x.is_finite() && row.y.is_finite()) {
                return Err(MobilityError::Trace { line, msg: "non-finite or negative value".into() });
            }
            samples[row.node as usize].push(TraceSample {
                time: SimTime::from_secs_f64(row.time),
                pos:  Coord::new(row.x, row.y),
            });
        }
        Ok(Self::new(samples))
    }

    pub fn from_csv(path: &std::path::Path, node_count: usize) -> MobilityResult<Self> {
        Self::from_reader(std::fs::File::open(path)?, node_count)
    }
}

impl MobilityModel for TracePlayback {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn node_count(&self) -> usize {
        self.samples.len()
    }

    fn advance_to(&mut self, _time: SimTime) {}

    fn position(&self, node: NodeId, time: SimTime) -> Coord {
        let s = &self.samples[node.index()];
        let (Some(first), Some(last)) = (s.first(), s.last()) else {
            return Coord::default();
        };
        if time <= first.time {
            return first.pos;
        }
        if time >= last.time {
            return last.pos;
        }
        // s[idx - 1].time <= time < s[idx].time
        let idx = s.partition_point(|x| x.time <= time);
        let (a, b) = (s[idx - 1], s[idx]);
        let t = (time.0 - a.time.0) as f64 / (b.time.0 - a.time.0) as f64;
        a.pos.lerp(b.pos, t)
    }
}
