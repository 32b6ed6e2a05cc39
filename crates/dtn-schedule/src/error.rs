use dtn_core::SimTime;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// An event was scheduled before the current simulated time.  Always a
    /// programming or configuration error; runs abort on it.
    #[error("cannot schedule event at {requested}: current time is {now}")]
    InvalidTime { requested: SimTime, now: SimTime },
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
