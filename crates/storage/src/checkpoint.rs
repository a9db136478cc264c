// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint snapshots.
//!
//! A checkpoint carries enough to resume in a fresh process: the workflow
//! instance, per-agent summaries (no live pane handles), queue metadata
//! (counts and watermarks, not message bodies), and the stage lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use swarm_core::{AgentHandle, AgentStatus, ErrorRecord, Role, Session, SessionId};
use swarm_workflow::{StageStatus, WorkflowInstance, WorkflowTemplate};

/// What triggered a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    SessionStart,
    StageBoundary,
    Periodic,
    PreRecovery,
    Manual,
}

impl CheckpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointKind::SessionStart => "session_start",
            CheckpointKind::StageBoundary => "stage_boundary",
            CheckpointKind::Periodic => "periodic",
            CheckpointKind::PreRecovery => "pre_recovery",
            CheckpointKind::Manual => "manual",
        }
    }
}

/// Per-agent state summary, with no live pane reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub role: Role,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_task_id: Option<String>,
    pub messages_handled: u64,
    pub last_activity_at: DateTime<Utc>,
}

impl AgentSummary {
    pub fn from_handle(handle: &AgentHandle) -> Self {
        Self {
            role: handle.role,
            status: handle.status,
            last_task_id: None,
            messages_handled: handle.messages_handled,
            last_activity_at: handle.last_activity_at,
        }
    }
}

/// Queue metadata for one role: counts and the routing watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QueueSnapshot {
    pub inbox_count: usize,
    pub outbox_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed: Option<DateTime<Utc>>,
}

/// A coherent snapshot of a live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub session_id: SessionId,
    pub kind: CheckpointKind,
    pub created_at: DateTime<Utc>,
    /// Component that requested the snapshot
    pub created_by: String,
    pub workflow: WorkflowInstance,
    pub agents: Vec<AgentSummary>,
    pub queues: BTreeMap<Role, QueueSnapshot>,
    pub completed_stages: Vec<String>,
    pub pending_stages: Vec<String>,
    pub errors: Vec<ErrorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Checkpoint {
    /// Assemble a snapshot from live state.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        id: impl Into<String>,
        kind: CheckpointKind,
        created_by: impl Into<String>,
        session: &Session,
        instance: &WorkflowInstance,
        template: &WorkflowTemplate,
        queues: BTreeMap<Role, QueueSnapshot>,
        now: DateTime<Utc>,
    ) -> Self {
        let completed: Vec<String> = template
            .stages
            .keys()
            .filter(|stage| {
                instance
                    .history
                    .iter()
                    .any(|r| &r.stage == *stage && r.status == StageStatus::Complete)
            })
            .cloned()
            .collect();
        let pending: Vec<String> = template
            .stages
            .keys()
            .filter(|stage| !completed.contains(stage))
            .cloned()
            .collect();

        Self {
            id: id.into(),
            session_id: session.id.clone(),
            kind,
            created_at: now,
            created_by: created_by.into(),
            workflow: instance.clone(),
            agents: session.agents.values().map(AgentSummary::from_handle).collect(),
            queues,
            completed_stages: completed,
            pending_stages: pending,
            errors: session.errors.clone(),
            notes: None,
        }
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
