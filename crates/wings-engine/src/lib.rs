// SPDX-License-Identifier: MIT

//! wings-engine: the `Server` entity, its power FSM, per-server log sink
//! pool, and the `ServerManager` registry that owns boot reconciliation and
//! the state-persistence ticker (spec.md §4.5-§4.6, C5 + C6).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod error;
mod log_sink;
mod manager;
mod server;

pub use error::EngineError;
pub use log_sink::SinkName;
pub use manager::{RemoveOptions, ServerManager};
pub use server::Server;
