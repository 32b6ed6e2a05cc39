use dtn_contact::ContactError;
use dtn_core::SimTime;
use dtn_mobility::MobilityError;
use dtn_routing::{FclError, RoutingError};
use dtn_schedule::ScheduleError;
use thiserror::Error;

use crate::BridgeError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    /// An action was scheduled before the current time.  Always a bug or a
    /// broken configuration; aborts the run.
    #[error("cannot schedule at {requested} (now {now})")]
    InvalidTime { requested: SimTime, now: SimTime },

    #[error("{what} count {got} does not match node count {expected}")]
    NodeCountMismatch {
        expected: usize,
        got:      usize,
        what:     &'static str,
    },

    #[error("mobility error: {0}")]
    Mobility(#[from] MobilityError),

    #[error("contact detection error: {0}")]
    Contact(#[from] ContactError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("scenario parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("convergence layer error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ScheduleError> for SimError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::InvalidTime { requested, now } => SimError::InvalidTime { requested, now },
        }
    }
}

impl From<FclError> for SimError {
    fn from(e: FclError) -> Self {
        SimError::Routing(RoutingError::Fcl(e))
    }
}

pub type SimResult<T> = Result<T, SimError>;
