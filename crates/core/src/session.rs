// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identity and top-level session state.
//!
//! The session id is minted once by the session controller and is the sole
//! source of naming for every owned resource: the multiplexer session
//! (`swarm_{id}`), worktree branches (`swarm/{role}-{id}`), and audit rows.
//! Subsystems validate the id but never mint one.

use crate::agent::AgentHandle;
use crate::error::ErrorRecord;
use crate::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Validated session identifier.
///
/// The characters admitted are exactly those that pass safely as target
/// arguments to the multiplexer and VCS binaries; this is a security
/// boundary, not a style choice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid session id: {0:?} (expected [A-Za-z0-9_-]+)")]
pub struct InvalidSessionId(pub String);

/// True for the safe-name alphabet shared by session ids and mux names.
pub fn is_safe_name(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

impl SessionId {
    pub fn parse(s: &str) -> Result<SessionId, InvalidSessionId> {
        if !is_safe_name(s) {
            return Err(InvalidSessionId(s.to_string()));
        }
        Ok(SessionId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the multiplexer session owned by this session.
    pub fn mux_session_name(&self) -> String {
        format!("swarm_{}", self.0)
    }

    /// Branch name for a role's worktree.
    pub fn branch_name(&self, role: Role) -> String {
        format!("swarm/{}-{}", role, self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initializing,
    Running,
    Synthesizing,
    Complete,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Initializing => "initializing",
            SessionStatus::Running => "running",
            SessionStatus::Synthesizing => "synthesizing",
            SessionStatus::Complete => "complete",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Complete | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of the workflow survives after failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    #[default]
    Full,
    Reduced,
    Minimal,
    Failed,
}

/// Degradation state attached to a session after unrecovered failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DegradationState {
    pub level: DegradationLevel,
    pub unavailable_agents: BTreeSet<Role>,
    pub skipped_stages: BTreeSet<String>,
    pub warnings: Vec<String>,
}

impl DegradationState {
    pub fn is_degraded(&self) -> bool {
        self.level != DegradationLevel::Full
    }
}

/// Top-level container for one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub workflow: String,
    pub goal: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Live agents by role. Destroyed on cleanup.
    pub agents: BTreeMap<Role, AgentHandle>,
    /// Per-outbox high-water mark: last emit timestamp already routed.
    pub outbox_watermarks: BTreeMap<Role, DateTime<Utc>>,
    pub errors: Vec<ErrorRecord>,
    pub degradation: DegradationState,
}

impl Session {
    pub fn new(
        id: SessionId,
        workflow: impl Into<String>,
        goal: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            workflow: workflow.into(),
            goal: goal.into(),
            status: SessionStatus::Initializing,
            started_at: now,
            ended_at: None,
            agents: BTreeMap::new(),
            outbox_watermarks: BTreeMap::new(),
            errors: Vec::new(),
            degradation: DegradationState::default(),
        }
    }

    pub fn agent(&self, role: Role) -> Option<&AgentHandle> {
        self.agents.get(&role)
    }

    pub fn agent_mut(&mut self, role: Role) -> Option<&mut AgentHandle> {
        self.agents.get_mut(&role)
    }

    pub fn record_error(&mut self, error: ErrorRecord) {
        self.errors.push(error);
    }

    pub fn has_fatal_error(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.severity == crate::error::Severity::Fatal)
    }

    /// Watermark for a role's outbox; epoch when nothing was routed yet.
    pub fn watermark(&self, role: Role) -> DateTime<Utc> {
        self.outbox_watermarks
            .get(&role)
            .copied()
            .unwrap_or_default()
    }

    pub fn advance_watermark(&mut self, role: Role, to: DateTime<Utc>) {
        let mark = self.outbox_watermarks.entry(role).or_default();
        if to > *mark {
            *mark = to;
        }
    }

    pub fn end(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        self.status = status;
        self.ended_at = Some(now);
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
