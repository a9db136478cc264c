//! S6 — broadcast fan-out.

use crate::prelude::*;
use swarm_core::Clock;
use swarm_bus::QueueKind;
use swarm_core::{Message, MessageType, Priority, Recipient, Role};

#[tokio::test]
async fn broadcast_copies_reach_every_role_except_the_sender() {
    let s = spec();
    start_research(&s).await;

    let notice = Message::new(
        "m-broadcast",
        s.clock.now() + chrono::Duration::seconds(5),
        Role::Orchestrator,
        Recipient::Broadcast,
        MessageType::Question,
        "checkpoint imminent",
        "wrap up your current step",
    )
    .with_priority(Priority::Critical);
    s.bus
        .append(QueueKind::Outbox, Role::Orchestrator, &notice)
        .unwrap();

    s.controller.tick().await.unwrap();

    // Every template role receives one copy with identical id and timestamp
    for role in [Role::Researcher, Role::Reviewer] {
        let inbox = s.bus.read(QueueKind::Inbox, role).unwrap();
        let copies: Vec<_> = inbox.iter().filter(|m| m.id == notice.id).collect();
        assert_eq!(copies.len(), 1, "{role} should hold exactly one copy");
        assert_eq!(copies[0].timestamp, notice.timestamp);
        assert_eq!(copies[0].priority, Priority::Critical);
    }

    // The sender gets nothing
    let orchestrator_inbox = s.bus.read(QueueKind::Inbox, Role::Orchestrator).unwrap();
    assert!(orchestrator_inbox.iter().all(|m| m.id != notice.id));

    // Replay protection: a second tick duplicates nothing
    s.controller.tick().await.unwrap();
    let inbox = s.bus.read(QueueKind::Inbox, Role::Reviewer).unwrap();
    assert_eq!(inbox.iter().filter(|m| m.id == notice.id).count(), 1);
}
