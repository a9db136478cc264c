// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::{ErrorCode, ErrorRecord};
use yare::parameterized;

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

#[parameterized(
    millis = { "1718000000000" },
    alnum = { "run_42-a" },
    single = { "x" },
)]
fn session_id_accepts_safe_names(s: &str) {
    assert_eq!(SessionId::parse(s).unwrap().as_str(), s);
}

#[parameterized(
    empty = { "" },
    space = { "a b" },
    dot = { "a.b" },
    semicolon = { "a;rm" },
    dollar = { "$(id)" },
)]
fn session_id_rejects_unsafe_names(s: &str) {
    assert!(SessionId::parse(s).is_err());
}

#[test]
fn resource_names_embed_the_id_verbatim() {
    let id = SessionId::parse("1718000000000").unwrap();
    assert_eq!(id.mux_session_name(), "swarm_1718000000000");
    assert_eq!(
        id.branch_name(Role::Reviewer),
        "swarm/reviewer-1718000000000"
    );
    assert!(id.mux_session_name().contains(id.as_str()));
    assert!(id.branch_name(Role::Architect).contains(id.as_str()));
}

#[test]
fn fresh_session_is_initializing_and_undegraded() {
    let session = Session::new(SessionId::parse("1").unwrap(), "research", "goal", now());
    assert_eq!(session.status, SessionStatus::Initializing);
    assert!(!session.degradation.is_degraded());
    assert!(session.agents.is_empty());
}

#[test]
fn watermark_defaults_to_epoch_and_only_moves_forward() {
    let mut session = Session::new(SessionId::parse("1").unwrap(), "research", "goal", now());
    assert_eq!(session.watermark(Role::Researcher), DateTime::<Utc>::default());

    session.advance_watermark(Role::Researcher, now());
    assert_eq!(session.watermark(Role::Researcher), now());

    // A stale advance must not move the mark backwards
    session.advance_watermark(Role::Researcher, now() - chrono::Duration::seconds(10));
    assert_eq!(session.watermark(Role::Researcher), now());
}

#[test]
fn fatal_error_detection() {
    let mut session = Session::new(SessionId::parse("1").unwrap(), "research", "goal", now());
    session.record_error(ErrorRecord::new(
        ErrorCode::AgentTimeout,
        "monitor",
        "researcher idle too long",
    ));
    assert!(!session.has_fatal_error());

    session.record_error(
        ErrorRecord::new(ErrorCode::WorkflowNotFound, "controller", "no such template")
            .with_severity(crate::error::Severity::Fatal),
    );
    assert!(session.has_fatal_error());
}

#[test]
fn terminal_statuses() {
    assert!(SessionStatus::Complete.is_terminal());
    assert!(SessionStatus::Failed.is_terminal());
    assert!(SessionStatus::Cancelled.is_terminal());
    assert!(!SessionStatus::Running.is_terminal());
    assert!(!SessionStatus::Synthesizing.is_terminal());
}
