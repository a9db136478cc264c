//! S1 — happy-path research workflow.

use crate::prelude::*;
use swarm_core::Clock;
use swarm_bus::QueueKind;
use swarm_core::{AgentStatus, MessageType, Role, SessionStatus};

#[tokio::test]
async fn research_runs_to_a_complete_result() {
    let s = spec();
    let id = start_research(&s).await;

    // Exactly two agents spawn: researcher and reviewer
    let session = s.controller.get_session().unwrap();
    assert_eq!(session.agents.len(), 2);
    assert!(session.agents.contains_key(&Role::Researcher));
    assert!(session.agents.contains_key(&Role::Reviewer));
    assert!(session.agents.values().all(|a| a.status == AgentStatus::Ready));

    // The researcher's first outbox message is a finding…
    let finding = agent_emits(
        &s,
        "m-finding",
        10,
        Role::Researcher,
        Role::Orchestrator,
        MessageType::Finding,
    );
    assert_eq!(finding.message_type, MessageType::Finding);
    s.controller.tick().await.unwrap();

    // …and it appears in the reviewer's inbox
    let reviewer_inbox = s.bus.read(QueueKind::Inbox, Role::Reviewer).unwrap();
    assert_eq!(reviewer_inbox.len(), 1);
    assert_eq!(reviewer_inbox[0].id, "m-finding");

    // The reviewer approves; the workflow transitions to synthesis
    reviewer_verdict(&s, "m-review", 20, "APPROVED");
    s.controller.tick().await.unwrap();
    assert_eq!(
        s.controller.get_instance().unwrap().current_stage,
        "synthesis"
    );

    // The researcher writes up the result
    let result_message = swarm_core::Message::new(
        "m-result",
        s.clock.now() + chrono::Duration::seconds(30),
        Role::Researcher,
        Role::Orchestrator,
        MessageType::Result,
        "codec X report",
        "final write-up",
    )
    .with_attachment("outputs/report.md");
    s.bus
        .append(QueueKind::Outbox, Role::Researcher, &result_message)
        .unwrap();

    let outcome = s.controller.tick().await.unwrap();
    assert!(outcome.completed);

    // The session ends complete with artifacts and findings
    let result = s.controller.synthesize_result().await.unwrap();
    assert!(result.success);
    assert!(!result.artifacts.is_empty());
    assert!(result.findings.len() >= 1);

    let session = s.controller.get_session().unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
    assert_eq!(s.audit.get_session(&id).unwrap().unwrap().status, "complete");
}
