// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events emitted by the session controller and monitor loop.
//!
//! Serializes with `{"type": "domain:verb", ...fields}` format. Delivery is
//! best-effort and synchronous; subscribers must not block.

use crate::agent::PaneId;
use crate::error::ErrorCode;
use crate::role::Role;
use crate::session::{SessionId, SessionStatus};
use serde::{Deserialize, Serialize};

/// Tagged events consumed by the CLI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SwarmEvent {
    #[serde(rename = "session:started")]
    SessionStarted {
        session_id: SessionId,
        workflow: String,
        goal: String,
    },

    #[serde(rename = "agent:spawned")]
    AgentSpawned {
        session_id: SessionId,
        role: Role,
        pane: PaneId,
    },

    #[serde(rename = "agent:ready")]
    AgentReady { session_id: SessionId, role: Role },

    #[serde(rename = "agent:working")]
    AgentWorking { session_id: SessionId, role: Role },

    #[serde(rename = "agent:complete")]
    AgentComplete { session_id: SessionId, role: Role },

    #[serde(rename = "agent:error")]
    AgentError {
        session_id: SessionId,
        role: Role,
        code: ErrorCode,
    },

    #[serde(rename = "message:routed")]
    MessageRouted {
        session_id: SessionId,
        message_id: String,
        from: Role,
        to: Role,
    },

    #[serde(rename = "stage:transition")]
    StageTransition {
        session_id: SessionId,
        from: String,
        to: String,
    },

    #[serde(rename = "workflow:complete")]
    WorkflowComplete { session_id: SessionId },

    #[serde(rename = "session:ended")]
    SessionEnded {
        session_id: SessionId,
        status: SessionStatus,
    },
}

impl SwarmEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SwarmEvent::SessionStarted { .. } => "session:started",
            SwarmEvent::AgentSpawned { .. } => "agent:spawned",
            SwarmEvent::AgentReady { .. } => "agent:ready",
            SwarmEvent::AgentWorking { .. } => "agent:working",
            SwarmEvent::AgentComplete { .. } => "agent:complete",
            SwarmEvent::AgentError { .. } => "agent:error",
            SwarmEvent::MessageRouted { .. } => "message:routed",
            SwarmEvent::StageTransition { .. } => "stage:transition",
            SwarmEvent::WorkflowComplete { .. } => "workflow:complete",
            SwarmEvent::SessionEnded { .. } => "session:ended",
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            SwarmEvent::SessionStarted { session_id, .. }
            | SwarmEvent::AgentSpawned { session_id, .. }
            | SwarmEvent::AgentReady { session_id, .. }
            | SwarmEvent::AgentWorking { session_id, .. }
            | SwarmEvent::AgentComplete { session_id, .. }
            | SwarmEvent::AgentError { session_id, .. }
            | SwarmEvent::MessageRouted { session_id, .. }
            | SwarmEvent::StageTransition { session_id, .. }
            | SwarmEvent::WorkflowComplete { session_id }
            | SwarmEvent::SessionEnded { session_id, .. } => session_id,
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            SwarmEvent::SessionStarted { session_id, workflow, .. } => {
                format!("{t} id={session_id} workflow={workflow}")
            }
            SwarmEvent::AgentSpawned { role, pane, .. } => {
                format!("{t} role={role} pane={pane}")
            }
            SwarmEvent::AgentReady { role, .. }
            | SwarmEvent::AgentWorking { role, .. }
            | SwarmEvent::AgentComplete { role, .. } => format!("{t} role={role}"),
            SwarmEvent::AgentError { role, code, .. } => {
                format!("{t} role={role} code={code}")
            }
            SwarmEvent::MessageRouted {
                message_id, from, to, ..
            } => format!("{t} id={message_id} {from}→{to}"),
            SwarmEvent::StageTransition { from, to, .. } => format!("{t} {from}→{to}"),
            SwarmEvent::WorkflowComplete { session_id } => format!("{t} id={session_id}"),
            SwarmEvent::SessionEnded { session_id, status } => {
                format!("{t} id={session_id} status={status}")
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
