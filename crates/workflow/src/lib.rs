// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! swarm-workflow: declarative workflow templates and their execution state.
//!
//! Templates are a closed built-in catalogue of stage graphs with guarded
//! transitions. An instance tracks the current stage, per-stage iteration
//! counters, and history; routing turns inbound messages into decisions the
//! monitor loop applies.

pub mod catalog;
pub mod instance;
pub mod routing;
pub mod synthesis;
pub mod template;

use thiserror::Error;

pub use catalog::{canonical_name, template, template_names};
pub use instance::{
    InstanceStatus, StageExecution, StageOutput, StageStatus, WorkflowInstance,
};
pub use routing::{apply_advance, route_message, RoutingDecision, StageAdvance};
pub use synthesis::{synthesize, WorkflowResult};
pub use template::{Guard, StageDef, StageKind, Transition, Verdict, WorkflowTemplate};

/// Errors from workflow operations.
#[derive(Debug, Error, PartialEq)]
pub enum WorkflowError {
    #[error("workflow template not found: {0}")]
    TemplateNotFound(String),
    #[error("unknown stage: {0}")]
    UnknownStage(String),
    #[error("no running execution for stage {0}")]
    NoRunningStage(String),
    #[error("stage {0} is not optional")]
    NotOptional(String),
    #[error("stage {stage} exceeded max iterations ({max})")]
    MaxIterationsExceeded { stage: String, max: u32 },
    #[error("workflow instance is not complete")]
    NotComplete,
    #[error("message {0} cannot be routed from the current stage")]
    Unroutable(String),
    #[error("invalid template {name}: {reason}")]
    InvalidTemplate { name: String, reason: String },
}
