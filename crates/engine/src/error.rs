// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine.
//!
//! Adapter errors are wrapped here at the controller boundary and funneled
//! to the recovery engine as structured `ErrorRecord`s.

use swarm_adapters::{MuxError, WorktreeError};
use swarm_bus::BusError;
use swarm_core::{ErrorCode, ErrorRecord};
use swarm_storage::StorageError;
use swarm_workflow::WorkflowError;
use thiserror::Error;

/// Errors surfaced by the session controller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no active session")]
    NoSession,
    #[error("session already active: {0}")]
    SessionActive(String),
    #[error("goal must not be empty")]
    EmptyGoal,
    #[error("session failed: {0}")]
    SessionFailed(String),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Mux(#[from] MuxError),
    #[error(transparent)]
    Worktree(#[from] WorktreeError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EngineError {
    /// Taxonomy code for this error, used by recovery and the CLI.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::NoSession => ErrorCode::SessionNotFound,
            EngineError::SessionActive(_) => ErrorCode::SessionExists,
            EngineError::EmptyGoal => ErrorCode::InvalidArgument,
            EngineError::SessionFailed(_) => ErrorCode::StageFailed,
            EngineError::Bus(_) => ErrorCode::FilesystemError,
            EngineError::Mux(MuxError::SessionExists(_)) => ErrorCode::SessionExists,
            EngineError::Mux(MuxError::SessionNotFound(_)) => ErrorCode::SessionNotFound,
            EngineError::Mux(_) => ErrorCode::TmuxSessionFailed,
            EngineError::Worktree(_) => ErrorCode::GitWorktreeFailed,
            EngineError::Workflow(WorkflowError::TemplateNotFound(_)) => {
                ErrorCode::WorkflowNotFound
            }
            EngineError::Workflow(WorkflowError::MaxIterationsExceeded { .. }) => {
                ErrorCode::MaxIterations
            }
            EngineError::Workflow(WorkflowError::Unroutable(_)) => ErrorCode::RoutingFailed,
            EngineError::Workflow(_) => ErrorCode::StageFailed,
            EngineError::Storage(_) => ErrorCode::DatabaseError,
        }
    }

    /// Wrap into a structured record for the recovery engine and audit log.
    pub fn to_record(&self, component: &str) -> ErrorRecord {
        ErrorRecord::new(self.code(), component, self.to_string())
    }
}
