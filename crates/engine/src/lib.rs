// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! swarm-engine: agent lifecycle, monitor loop, recovery, and the session
//! controller facade.

pub mod config;
pub mod controller;
#[cfg(test)]
pub(crate) mod test_helpers;
pub mod error;
pub mod monitor;
pub mod recovery;
pub mod spawner;

pub use config::SwarmConfig;
pub use controller::{ActiveSession, SessionController};
pub use error::EngineError;
pub use monitor::TickOutcome;
pub use recovery::{
    plan_for, retry_with_policy, RecoveryAction, RecoveryContext, RecoveryOutcome,
    RecoveryTracker, RetryPolicy, Strategy, StrategyPlan,
};
pub use spawner::{spawn_command, AgentSpawner};
