//! S5 — checkpoint round-trip and resume in a fresh process.

use crate::prelude::*;
use swarm_bus::QueueKind;
use swarm_core::{MessageType, Role};

#[tokio::test]
async fn resume_continues_past_the_checkpoint_without_reprocessing() {
    let s = spec();
    let id = start_research(&s).await;

    // Complete the entry stage
    agent_emits(&s, "m-1", 10, Role::Researcher, Role::Orchestrator, MessageType::Finding);
    s.controller.tick().await.unwrap();
    let before = s.controller.get_instance().unwrap();
    assert_eq!(before.current_stage, "verification");

    // The orchestrator process dies
    s.controller.kill().await.unwrap();

    // A fresh orchestrator loads the latest checkpoint and resumes
    let fresh = fresh_process(&s);
    fresh.resume(&id).await.unwrap();

    let restored = fresh.get_instance().unwrap();
    assert_eq!(restored.current_stage, before.current_stage);
    assert_eq!(restored.history, before.history);
    assert_eq!(restored.iterations, before.iterations);
    assert!(restored.is_processed("m-1"));

    // No duplicate processing of already-routed messages
    fresh.tick().await.unwrap();
    let reviewer_inbox = s.bus.read(QueueKind::Inbox, Role::Reviewer).unwrap();
    assert_eq!(reviewer_inbox.iter().filter(|m| m.id == "m-1").count(), 1);

    // The workflow continues from the stage after the checkpoint
    reviewer_verdict(&s, "m-2", 20, "APPROVED");
    fresh.tick().await.unwrap();
    assert_eq!(fresh.get_instance().unwrap().current_stage, "synthesis");
}
