// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal multiplexer adapters.
//!
//! Session names propagate to external command lines, so they are validated
//! against the safe-name alphabet before any subprocess sees them. Panes
//! are always addressed by their stable `%N` id; indices renumber on
//! layout changes.

mod tmux;

pub use tmux::TmuxMux;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMux, MuxCall};

use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use swarm_core::PaneId;
use thiserror::Error;

/// Errors from multiplexer operations
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("session already exists: {0}")]
    SessionExists(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("pane not found: {0}")]
    PaneNotFound(String),
    #[error("tmux server not running")]
    TmuxNotRunning,
    #[error("command failed: {details}")]
    CommandFailed { details: String },
}

impl MuxError {
    /// Stable code string matching the failure taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            MuxError::SessionExists(_) => "SESSION_EXISTS",
            MuxError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            MuxError::PaneNotFound(_) => "PANE_NOT_FOUND",
            MuxError::TmuxNotRunning => "TMUX_NOT_RUNNING",
            MuxError::CommandFailed { .. } => "COMMAND_FAILED",
        }
    }
}

/// One row of `list-panes` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    pub id: PaneId,
    /// Positional index, informational only, never a target
    pub index: u32,
    pub active: bool,
}

/// One row of `list-sessions` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    pub windows: u32,
    pub created: String,
    pub attached: bool,
}

/// Reject names that would need quoting on a command line.
pub fn validate_session_name(name: &str) -> Result<(), MuxError> {
    if swarm_core::is_safe_name(name) {
        Ok(())
    } else {
        Err(MuxError::CommandFailed {
            details: format!("unsafe session name: {name:?}"),
        })
    }
}

/// Adapter for the terminal multiplexer.
#[async_trait]
pub trait MuxAdapter: Clone + Send + Sync + 'static {
    /// Create a detached session with one initial pane.
    /// Fails with `SessionExists` when one of that name is live.
    async fn create_session(&self, name: &str) -> Result<PaneId, MuxError>;

    /// Kill a session. Idempotent: "no such session" and "no server
    /// running" both resolve to success.
    async fn kill_session(&self, name: &str) -> Result<(), MuxError>;

    /// Whether a session of that name is live.
    async fn has_session(&self, name: &str) -> Result<bool, MuxError>;

    /// All live sessions. Empty when the server is not running.
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, MuxError>;

    /// Split the active pane, optionally vertical and sized, returning the
    /// new pane's stable id.
    async fn create_pane(
        &self,
        session: &str,
        vertical: bool,
        percent: Option<u8>,
    ) -> Result<PaneId, MuxError>;

    /// Build `count` panes by alternating split direction (vertical on odd
    /// steps, horizontal on even), then balance with the tiled layout.
    async fn create_pane_grid(&self, session: &str, count: usize) -> Result<Vec<PaneId>, MuxError> {
        let mut panes = Vec::with_capacity(count);
        for step in 1..=count {
            let vertical = step % 2 == 1;
            panes.push(self.create_pane(session, vertical, None).await?);
        }
        self.apply_tiled_layout(session).await?;
        Ok(panes)
    }

    /// Apply the multiplexer's balancing layout.
    async fn apply_tiled_layout(&self, session: &str) -> Result<(), MuxError>;

    async fn list_panes(&self, session: &str) -> Result<Vec<PaneInfo>, MuxError>;

    async fn kill_pane(&self, session: &str, pane: &PaneId) -> Result<(), MuxError>;

    /// Send interpreted keys (`Enter`, `C-c`, arrows work), with a trailing
    /// Enter appended.
    async fn send_keys(&self, session: &str, pane: &PaneId, keys: &str) -> Result<(), MuxError>;

    /// Send text verbatim (`-l`), no trailing Enter.
    async fn send_literal(&self, session: &str, pane: &PaneId, text: &str)
        -> Result<(), MuxError>;

    /// Send the Enter key by itself.
    async fn send_enter(&self, session: &str, pane: &PaneId) -> Result<(), MuxError>;

    /// Send the interrupt key (C-c) without a trailing Enter.
    async fn send_interrupt(&self, session: &str, pane: &PaneId) -> Result<(), MuxError>;

    /// Capture the last `lines` lines of the pane buffer. ANSI escapes are
    /// stripped unless `keep_ansi`.
    async fn capture_pane(
        &self,
        session: &str,
        pane: &PaneId,
        lines: u32,
        keep_ansi: bool,
    ) -> Result<String, MuxError>;

    /// Poll `capture_pane` until the pattern matches. Returns the captured
    /// output on first match; `CommandFailed` on timeout.
    async fn wait_for_pattern(
        &self,
        session: &str,
        pane: &PaneId,
        pattern: &Regex,
        interval: Duration,
        timeout: Duration,
    ) -> Result<String, MuxError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let output = self.capture_pane(session, pane, 50, false).await?;
            if pattern.is_match(&output) {
                return Ok(output);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(MuxError::CommandFailed {
                    details: format!("timed out waiting for /{pattern}/ in {session}:{pane}"),
                });
            }
            tokio::time::sleep(interval).await;
        }
    }
}
