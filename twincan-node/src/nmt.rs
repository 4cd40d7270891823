//! NMT state machine and heartbeat schedule
use snafu::Snafu;
use twincan_common::messages::NmtState;

/// Error returned when an NMT state change is not allowed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum NmtError {
    /// The requested transition is not legal from the current state
    #[snafu(display("Illegal NMT transition from {from:?} to {to:?}"))]
    IllegalTransition {
        /// The current state
        from: NmtState,
        /// The requested state
        to: NmtState,
    },
}

/// The NMT state of a node
///
/// Initializing -> PreOperational at the end of construction, PreOperational or Stopped ->
/// Operational on enable, Operational -> Stopped on disable. Nothing else.
#[derive(Debug)]
pub(crate) struct NmtStateMachine {
    state: NmtState,
}

impl NmtStateMachine {
    pub const fn new() -> Self {
        Self {
            state: NmtState::Initializing,
        }
    }

    pub fn state(&self) -> NmtState {
        self.state
    }

    /// Move to `to`
    ///
    /// Returns true if the state changed. Requesting the current state is a no-op.
    pub fn transition(&mut self, to: NmtState) -> Result<bool, NmtError> {
        use NmtState::*;
        let from = self.state;
        if from == to {
            return Ok(false);
        }
        match (from, to) {
            (Initializing, PreOperational)
            | (PreOperational, Operational)
            | (Stopped, Operational)
            | (Operational, Stopped) => {
                self.state = to;
                Ok(true)
            }
            _ => IllegalTransitionSnafu { from, to }.fail(),
        }
    }
}

/// Heartbeat producer timing
#[derive(Debug)]
pub(crate) struct HeartbeatSchedule {
    period: u32,
    last_sent_at: u64,
}

impl HeartbeatSchedule {
    pub fn new(period: u32, now: u64) -> Self {
        Self {
            period,
            last_sent_at: now,
        }
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn set_period(&mut self, period: u32) {
        self.period = period;
    }

    /// Returns true, and restarts the period, if a heartbeat is due at `now`
    pub fn poll(&mut self, now: u64) -> bool {
        if self.period == 0 {
            return false;
        }
        if now.saturating_sub(self.last_sent_at) >= self.period as u64 {
            self.last_sent_at = now;
            true
        } else {
            false
        }
    }
}
