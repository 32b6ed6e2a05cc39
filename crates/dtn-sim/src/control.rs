//! Run control: console commands and an external stop flag.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// A command accepted between events by
/// [`Sim::run_controlled`](crate::Sim::run_controlled).
///
/// Text form, one per line, case-insensitive: `pause`, `resume`,
/// `step [n]` (default 1), `terminate` (or `quit` / `stop`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    /// Dispatch `n` more events, then pause.
    Step(u64),
    Terminate,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognised control command {0:?}")]
pub struct ParseCommandError(pub String);

impl FromStr for ControlCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let bad = || ParseCommandError(line.trim().to_string());
        let verb = words.next().ok_or_else(bad)?.to_ascii_lowercase();
        let cmd = match verb.as_str() {
            "pause" => ControlCommand::Pause,
            "resume" | "continue" => ControlCommand::Resume,
            "step" => match words.next() {
                None => ControlCommand::Step(1),
                Some(n) => ControlCommand::Step(n.parse().map_err(|_| bad())?),
            },
            "terminate" | "quit" | "stop" => ControlCommand::Terminate,
            _ => return Err(bad()),
        };
        if words.next().is_some() {
            return Err(bad());
        }
        Ok(cmd)
    }
}

/// Shared flag asking a run to stop at the next event boundary.
///
/// Cloning shares the flag; any clone may call [`stop`](Self::stop).
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How a run loop returned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Reached the requested end time.
    Completed,
    /// Stopped early by a [`StopHandle`] or `Terminate`.
    Stopped,
}
