// SPDX-License-Identifier: MIT

//! Power state and power action types.
//!
//! The state machine itself (transition rules, the power lock) lives in
//! `wings-engine`; this crate only carries the shared vocabulary so that
//! `wings-store`, `wings-panel`, and `wings-ssh` can all reference it
//! without depending on the engine.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The four states a server's power FSM can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Offline,
    Starting,
    Running,
    Stopping,
}

impl Default for PowerState {
    fn default() -> Self {
        Self::Offline
    }
}

crate::simple_display! {
    PowerState {
        Offline => "offline",
        Starting => "starting",
        Running => "running",
        Stopping => "stopping",
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized power state: {0}")]
pub struct ParsePowerStateError(String);

impl FromStr for PowerState {
    type Err = ParsePowerStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline" => Ok(Self::Offline),
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "stopping" => Ok(Self::Stopping),
            other => Err(ParsePowerStateError(other.to_string())),
        }
    }
}

/// An externally triggered request to change a server's running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    Start,
    Stop,
    Restart,
    Kill,
}

crate::simple_display! {
    PowerAction {
        Start => "start",
        Stop => "stop",
        Restart => "restart",
        Kill => "kill",
    }
}

/// How a server's container should be asked to stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopStrategy {
    /// Write a line to the container's stdin (console command).
    Command { value: String },
    /// Send a POSIX signal by name (e.g. `SIGTERM`).
    Signal { value: String },
    /// Ask the container runtime for its native graceful stop.
    Native,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_display_and_parse() {
        for state in [PowerState::Offline, PowerState::Starting, PowerState::Running, PowerState::Stopping]
        {
            let parsed: PowerState = state.to_string().parse().unwrap();
            assert_eq!(state, parsed);
        }
    }

    #[test]
    fn unknown_state_string_is_rejected() {
        assert!("paused".parse::<PowerState>().is_err());
    }
}
