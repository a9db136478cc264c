// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured error records.
//!
//! Codes are string enums and must stay verbatim: the recovery engine's
//! strategy tables and the audit log's indexes key on them. Components
//! return these as values; nothing in the steady-state path panics.

use crate::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Error severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fatal,
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

/// Where the fault lies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Agent,
    Workflow,
    System,
    External,
    User,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Agent => "agent",
            ErrorCategory::Workflow => "workflow",
            ErrorCategory::System => "system",
            ErrorCategory::External => "external",
            ErrorCategory::User => "user",
        };
        f.write_str(s)
    }
}

/// The closed code set. Strategy tables key on these, verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AgentSpawnFailed,
    AgentTimeout,
    AgentCrashed,
    AgentInvalidOutput,
    AgentBlocked,
    WorkflowNotFound,
    WorkflowTimeout,
    MaxIterations,
    StageFailed,
    RoutingFailed,
    TmuxNotFound,
    TmuxSessionFailed,
    GitWorktreeFailed,
    DatabaseError,
    FilesystemError,
    PermissionDenied,
    RateLimited,
    NetworkError,
    InvalidArgument,
    SessionExists,
    SessionNotFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AgentSpawnFailed => "AGENT_SPAWN_FAILED",
            ErrorCode::AgentTimeout => "AGENT_TIMEOUT",
            ErrorCode::AgentCrashed => "AGENT_CRASHED",
            ErrorCode::AgentInvalidOutput => "AGENT_INVALID_OUTPUT",
            ErrorCode::AgentBlocked => "AGENT_BLOCKED",
            ErrorCode::WorkflowNotFound => "WORKFLOW_NOT_FOUND",
            ErrorCode::WorkflowTimeout => "WORKFLOW_TIMEOUT",
            ErrorCode::MaxIterations => "MAX_ITERATIONS",
            ErrorCode::StageFailed => "STAGE_FAILED",
            ErrorCode::RoutingFailed => "ROUTING_FAILED",
            ErrorCode::TmuxNotFound => "TMUX_NOT_FOUND",
            ErrorCode::TmuxSessionFailed => "TMUX_SESSION_FAILED",
            ErrorCode::GitWorktreeFailed => "GIT_WORKTREE_FAILED",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::FilesystemError => "FILESYSTEM_ERROR",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::SessionExists => "SESSION_EXISTS",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::AgentSpawnFailed
            | ErrorCode::AgentTimeout
            | ErrorCode::AgentCrashed
            | ErrorCode::AgentInvalidOutput
            | ErrorCode::AgentBlocked => ErrorCategory::Agent,
            ErrorCode::WorkflowNotFound
            | ErrorCode::WorkflowTimeout
            | ErrorCode::MaxIterations
            | ErrorCode::StageFailed
            | ErrorCode::RoutingFailed => ErrorCategory::Workflow,
            ErrorCode::DatabaseError
            | ErrorCode::FilesystemError
            | ErrorCode::PermissionDenied
            | ErrorCode::SessionExists
            | ErrorCode::SessionNotFound => ErrorCategory::System,
            ErrorCode::TmuxNotFound
            | ErrorCode::TmuxSessionFailed
            | ErrorCode::GitWorktreeFailed
            | ErrorCode::RateLimited
            | ErrorCode::NetworkError => ErrorCategory::External,
            ErrorCode::InvalidArgument => ErrorCategory::User,
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorCode::WorkflowNotFound
            | ErrorCode::TmuxNotFound
            | ErrorCode::PermissionDenied
            | ErrorCode::InvalidArgument => Severity::Fatal,
            ErrorCode::AgentInvalidOutput | ErrorCode::MaxIterations => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Whether re-invoking the same operation can plausibly succeed.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::AgentSpawnFailed
                | ErrorCode::AgentTimeout
                | ErrorCode::TmuxSessionFailed
                | ErrorCode::DatabaseError
                | ErrorCode::RateLimited
                | ErrorCode::NetworkError
        )
    }

    /// Whether a recovery strategy other than abort exists for this code.
    pub fn recoverable(&self) -> bool {
        !matches!(
            self,
            ErrorCode::WorkflowNotFound
                | ErrorCode::TmuxNotFound
                | ErrorCode::PermissionDenied
                | ErrorCode::InvalidArgument
        )
    }

    /// Actionable remediation text for the CLI's error rendering.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            ErrorCode::TmuxNotFound => {
                Some("install tmux via your package manager (e.g. apt install tmux)")
            }
            ErrorCode::GitWorktreeFailed => {
                Some("run from inside a git repository with at least one commit")
            }
            ErrorCode::PermissionDenied => {
                Some("check write permissions on the .swarm directory")
            }
            ErrorCode::RateLimited => Some("wait for the provider limit to reset, then resume"),
            ErrorCode::SessionExists => Some("stop the running session first (swarm stop)"),
            ErrorCode::WorkflowNotFound => {
                Some("choose one of: research, development, architecture, review")
            }
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded error with recovery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    pub code: ErrorCode,
    pub severity: Severity,
    pub category: ErrorCategory,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
    pub recoverable: bool,
    pub retryable: bool,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_strategy: Option<String>,
    /// True exactly when a recovery outcome for this error succeeded.
    pub recovered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorRecord>>,
}

impl ErrorRecord {
    /// Factory: derives category, severity, and the recovery booleans from
    /// the code's defaults.
    pub fn new(code: ErrorCode, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code,
            severity: code.default_severity(),
            category: code.category(),
            component: component.into(),
            role: None,
            timestamp: Utc::now(),
            message: message.into(),
            context: BTreeMap::new(),
            recoverable: code.recoverable(),
            retryable: code.retryable(),
            retry_count: 0,
            recovery_strategy: None,
            recovered: false,
            cause: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn caused_by(mut self, cause: ErrorRecord) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Record the outcome of a recovery attempt against this error.
    pub fn note_recovery(&mut self, strategy: &str, succeeded: bool) {
        self.recovery_strategy = Some(strategy.to_string());
        self.recovered = succeeded;
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    pub fn log_summary(&self) -> String {
        match self.role {
            Some(role) => format!("{} [{}] {}: {}", self.code, self.component, role, self.message),
            None => format!("{} [{}]: {}", self.code, self.component, self.message),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
