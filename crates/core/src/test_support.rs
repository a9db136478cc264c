// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders shared by other crates' tests (behind the `test-support` feature).

use crate::agent::{AgentHandle, PaneId};
use crate::clock::{Clock, ManualClock};
use crate::message::{Message, MessageType, Recipient};
use crate::role::Role;
use crate::session::{Session, SessionId};
use chrono::{DateTime, Utc};

/// Fixed base instant used by `ManualClock::default()`.
pub fn base_time() -> DateTime<Utc> {
    ManualClock::default().now()
}

#[allow(clippy::unwrap_used)]
pub fn test_session_id() -> SessionId {
    SessionId::parse("1718000000000").unwrap()
}

pub fn test_session(workflow: &str) -> Session {
    Session::new(test_session_id(), workflow, "test goal", base_time())
}

#[allow(clippy::unwrap_used)]
pub fn test_pane(n: u32) -> PaneId {
    PaneId::parse(&format!("%{n}")).unwrap()
}

pub fn test_agent(role: Role, pane: u32) -> AgentHandle {
    AgentHandle::new(
        role,
        test_pane(pane),
        format!(".worktrees/{role}").into(),
        base_time(),
    )
}

/// A minimal valid message; id and offsets keep emit order predictable.
pub fn test_message(
    id: &str,
    offset_secs: i64,
    from: Role,
    to: impl Into<Recipient>,
    message_type: MessageType,
) -> Message {
    Message::new(
        id,
        base_time() + chrono::Duration::seconds(offset_secs),
        from,
        to,
        message_type,
        format!("subject-{id}"),
        format!("body-{id}"),
    )
}
