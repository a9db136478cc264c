// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! swarm-storage: append-only audit log and checkpoint persistence.
//!
//! One SQLite database per project (`.swarm/memory.db`), written by the
//! single orchestrator process. The on-disk queues remain the live message
//! path; rows here are history.

pub mod audit;
pub mod checkpoint;

use thiserror::Error;

pub use audit::{ActivityKind, AuditStore, SessionRow};
pub use checkpoint::{AgentSummary, Checkpoint, CheckpointKind, QueueSnapshot};

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}
