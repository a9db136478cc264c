// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    spawn = { ErrorCode::AgentSpawnFailed, "AGENT_SPAWN_FAILED" },
    timeout = { ErrorCode::AgentTimeout, "AGENT_TIMEOUT" },
    crashed = { ErrorCode::AgentCrashed, "AGENT_CRASHED" },
    wf_timeout = { ErrorCode::WorkflowTimeout, "WORKFLOW_TIMEOUT" },
    max_iter = { ErrorCode::MaxIterations, "MAX_ITERATIONS" },
    tmux = { ErrorCode::TmuxNotFound, "TMUX_NOT_FOUND" },
    worktree = { ErrorCode::GitWorktreeFailed, "GIT_WORKTREE_FAILED" },
    rate = { ErrorCode::RateLimited, "RATE_LIMITED" },
    exists = { ErrorCode::SessionExists, "SESSION_EXISTS" },
)]
fn codes_serialize_verbatim(code: ErrorCode, wire: &str) {
    assert_eq!(code.as_str(), wire);
    assert_eq!(serde_json::to_string(&code).unwrap(), format!("{wire:?}"));
}

#[test]
fn categories_cover_the_taxonomy() {
    assert_eq!(ErrorCode::AgentCrashed.category(), ErrorCategory::Agent);
    assert_eq!(ErrorCode::StageFailed.category(), ErrorCategory::Workflow);
    assert_eq!(ErrorCode::DatabaseError.category(), ErrorCategory::System);
    assert_eq!(ErrorCode::RateLimited.category(), ErrorCategory::External);
    assert_eq!(ErrorCode::InvalidArgument.category(), ErrorCategory::User);
}

#[test]
fn factory_applies_code_defaults() {
    let record = ErrorRecord::new(ErrorCode::RateLimited, "spawner", "429 from provider");
    assert_eq!(record.severity, Severity::Error);
    assert_eq!(record.category, ErrorCategory::External);
    assert!(record.retryable);
    assert!(record.recoverable);
    assert!(!record.recovered);
    assert_eq!(record.retry_count, 0);
    assert!(!record.id.is_empty());
}

#[test]
fn unrecoverable_codes_are_fatal_by_default() {
    for code in [
        ErrorCode::WorkflowNotFound,
        ErrorCode::TmuxNotFound,
        ErrorCode::PermissionDenied,
        ErrorCode::InvalidArgument,
    ] {
        assert!(!code.recoverable());
        assert_eq!(code.default_severity(), Severity::Fatal);
    }
}

#[test]
fn note_recovery_sets_flag_only_on_success() {
    let mut record = ErrorRecord::new(ErrorCode::AgentTimeout, "monitor", "watchdog fired");
    record.note_recovery("retry", false);
    assert!(!record.recovered);
    assert_eq!(record.recovery_strategy.as_deref(), Some("retry"));

    record.note_recovery("restart", true);
    assert!(record.recovered);
    assert_eq!(record.recovery_strategy.as_deref(), Some("restart"));
}

#[test]
fn cause_chain_round_trips() {
    let cause = ErrorRecord::new(ErrorCode::TmuxSessionFailed, "mux", "split-window failed");
    let record = ErrorRecord::new(ErrorCode::AgentSpawnFailed, "spawner", "no pane")
        .with_role(Role::Reviewer)
        .with_context("attempt", serde_json::json!(2))
        .caused_by(cause);

    let json = serde_json::to_string(&record).unwrap();
    let back: ErrorRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
    assert_eq!(back.cause.as_ref().map(|c| c.code), Some(ErrorCode::TmuxSessionFailed));
}

#[test]
fn remediation_catalogue_has_install_hint_for_missing_tmux() {
    let hint = ErrorCode::TmuxNotFound.remediation().unwrap();
    assert!(hint.contains("install"));
    assert!(ErrorCode::AgentTimeout.remediation().is_none());
}
