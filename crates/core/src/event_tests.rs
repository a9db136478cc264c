// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sid() -> SessionId {
    SessionId::parse("1718000000000").unwrap()
}

#[test]
fn events_tag_with_domain_verb() {
    let event = SwarmEvent::AgentReady {
        session_id: sid(),
        role: Role::Researcher,
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "agent:ready");
    assert_eq!(value["role"], "researcher");

    let back: SwarmEvent = serde_json::from_value(value).unwrap();
    assert_eq!(back, event);
}

#[test]
fn name_matches_serde_tag() {
    let event = SwarmEvent::StageTransition {
        session_id: sid(),
        from: "initial_research".into(),
        to: "verification".into(),
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], event.name());
}

#[test]
fn log_summary_is_compact() {
    let event = SwarmEvent::MessageRouted {
        session_id: sid(),
        message_id: "m-1".into(),
        from: Role::Researcher,
        to: Role::Reviewer,
    };
    assert_eq!(event.log_summary(), "message:routed id=m-1 researcher→reviewer");
}

#[test]
fn every_event_exposes_its_session() {
    let event = SwarmEvent::SessionEnded {
        session_id: sid(),
        status: SessionStatus::Complete,
    };
    assert_eq!(event.session_id(), &sid());
}
