// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live agent handles and pane identity.
//!
//! A pane is referenced by the multiplexer's stable `%N` form. Positional
//! indices renumber when the layout changes, so they are never stored.

use crate::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Stable pane identifier (`%0`, `%1`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaneId(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid pane id: {0:?} (expected %N)")]
pub struct InvalidPaneId(pub String);

impl PaneId {
    pub fn parse(s: &str) -> Result<PaneId, InvalidPaneId> {
        let digits = s.strip_prefix('%').unwrap_or("");
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidPaneId(s.to_string()));
        }
        Ok(PaneId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Agent lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Spawning,
    Starting,
    Ready,
    Working,
    Complete,
    Blocked,
    Error,
    Terminated,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Spawning => "spawning",
            AgentStatus::Starting => "starting",
            AgentStatus::Ready => "ready",
            AgentStatus::Working => "working",
            AgentStatus::Complete => "complete",
            AgentStatus::Blocked => "blocked",
            AgentStatus::Error => "error",
            AgentStatus::Terminated => "terminated",
        }
    }

    /// Whether the agent is expected to have a live pane.
    ///
    /// Invariant: an agent whose pane is absent from the multiplexer must
    /// be `Error` or `Terminated`.
    pub fn is_live(&self) -> bool {
        !matches!(self, AgentStatus::Error | AgentStatus::Terminated)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a running agent, owned by its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHandle {
    pub role: Role,
    pub pane: PaneId,
    pub worktree: PathBuf,
    pub status: AgentStatus,
    pub spawned_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub messages_handled: u64,
    pub error_count: u32,
}

impl AgentHandle {
    pub fn new(role: Role, pane: PaneId, worktree: PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            role,
            pane,
            worktree,
            status: AgentStatus::Spawning,
            spawned_at: now,
            last_activity_at: now,
            messages_handled: 0,
            error_count: 0,
        }
    }

    /// Record activity: bumps the watchdog timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    pub fn record_message(&mut self, now: DateTime<Utc>) {
        self.messages_handled += 1;
        self.touch(now);
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
