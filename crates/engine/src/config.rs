// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration, tunable through `SWARM_*` environment variables.
//!
//! Invalid values fall back to the default with a warning rather than
//! failing startup.

use std::time::Duration;

/// All engine knobs in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmConfig {
    /// Monitor loop period
    pub monitor_interval: Duration,
    /// Watchdog on agent `lastActivityAt`
    pub agent_timeout: Duration,
    /// Whole-workflow ceiling
    pub workflow_timeout: Duration,
    /// Per-agent-operation ceiling (readiness detection etc.)
    pub agent_op_timeout: Duration,
    /// Pause after `cd` before starting the assistant
    pub shell_settle: Duration,
    /// Poll period for readiness detection
    pub ready_poll_interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub checkpoint_enabled: bool,
    pub checkpoint_interval: Duration,
    /// Continue with a partial roster after unrecovered agent failures
    pub allow_partial: bool,
    pub no_color: bool,
    /// Spawn the monitor loop from start_workflow (tests drive ticks by hand)
    pub monitor_autostart: bool,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_secs(5),
            agent_timeout: Duration::from_secs(300),
            workflow_timeout: Duration::from_secs(1800),
            agent_op_timeout: Duration::from_secs(30),
            shell_settle: Duration::from_millis(500),
            ready_poll_interval: Duration::from_millis(500),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            checkpoint_enabled: true,
            checkpoint_interval: Duration::from_secs(60),
            allow_partial: false,
            no_color: false,
            monitor_autostart: true,
        }
    }
}

impl SwarmConfig {
    /// Read overrides from the `SWARM_*` environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_u64("SWARM_MAX_RETRIES") {
            config.max_retries = n as u32;
        }
        if let Some(ms) = env_u64("SWARM_RETRY_DELAY") {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(flag) = env_bool("SWARM_CHECKPOINT_ENABLED") {
            config.checkpoint_enabled = flag;
        }
        if let Some(secs) = env_u64("SWARM_CHECKPOINT_INTERVAL") {
            config.checkpoint_interval = Duration::from_secs(secs);
        }
        if let Some(flag) = env_bool("SWARM_ALLOW_PARTIAL") {
            config.allow_partial = flag;
        }
        if let Some(flag) = env_bool("SWARM_NO_COLOR") {
            config.no_color = flag;
        }
        if let Some(secs) = env_u64("SWARM_DEFAULT_TIMEOUT") {
            config.workflow_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("SWARM_MONITOR_INTERVAL") {
            config.monitor_interval = Duration::from_secs(secs);
        }
        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(var = name, value = other, "ignoring unparseable env override");
            None
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
