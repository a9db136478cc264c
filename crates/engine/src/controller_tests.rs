// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{agent_emits, harness, harness_with, test_config};
use swarm_adapters::WorktreeCall;
use swarm_core::{AgentStatus as CoreAgentStatus, MessageType, SessionStatus};

#[tokio::test]
async fn start_rejects_unknown_template_and_empty_goal() {
    let h = harness();
    assert!(matches!(
        h.controller.start_workflow("autonomous", "goal").await,
        Err(EngineError::Workflow(WorkflowError::TemplateNotFound(_)))
    ));
    assert!(matches!(
        h.controller.start_workflow("research", "   ").await,
        Err(EngineError::EmptyGoal)
    ));
    assert!(!h.controller.is_running());
}

#[tokio::test]
async fn start_builds_every_resource_from_the_single_id() {
    let h = harness();
    let mut events = h.controller.events();
    let id = h
        .controller
        .start_workflow("research", "study codec X")
        .await
        .unwrap();

    // Mux session and worktrees are named from the one minted id
    assert!(h.mux.session_exists(&id.mux_session_name()));
    assert_eq!(h.worktrees.existing_roles(), vec![Role::Researcher, Role::Reviewer]);
    for call in h.worktrees.calls() {
        if let WorktreeCall::Create { session_id, .. } = call {
            assert_eq!(session_id, id.to_string());
        }
    }

    // Both agents spawned and ready
    let session = h.controller.get_session().unwrap();
    assert_eq!(session.status, SessionStatus::Running);
    assert_eq!(session.agents.len(), 2);
    assert!(session
        .agents
        .values()
        .all(|a| a.status == CoreAgentStatus::Ready));

    // The goal landed in the entry role's inbox as a high-priority task
    let inbox = h.bus.read(QueueKind::Inbox, Role::Researcher).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].message_type, MessageType::Task);
    assert_eq!(inbox[0].from, Role::Orchestrator);

    // Audit row exists and a session-start checkpoint was taken
    assert_eq!(h.audit.get_session(&id).unwrap().unwrap().status, "running");
    assert!(h.audit.checkpoint_count(&id).unwrap() >= 1);

    // The event stream carries the spawn sequence and the start marker
    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(event.name());
    }
    assert!(names.contains(&"agent:spawned"));
    assert!(names.contains(&"agent:ready"));
    assert_eq!(names.last(), Some(&"session:started"));
}

#[tokio::test]
async fn second_start_while_running_is_session_exists() {
    let h = harness();
    h.controller.start_workflow("research", "goal").await.unwrap();
    assert!(matches!(
        h.controller.start_workflow("research", "another").await,
        Err(EngineError::SessionActive(_))
    ));
}

#[tokio::test]
async fn transient_mux_failure_is_retried_through_recovery() {
    let h = harness();
    h.mux.fail_next_session_creates(1);

    let id = h.controller.start_workflow("research", "goal").await.unwrap();

    assert!(h.mux.session_exists(&id.mux_session_name()));
    assert!(h.controller.is_running());
    let errors = h.audit.errors_for_session(&id).unwrap();
    let tmux = errors.iter().find(|e| e.0 == "TMUX_SESSION_FAILED").unwrap();
    assert!(tmux.3, "the retried create should mark the failure recovered");
}

#[tokio::test]
async fn persistent_mux_failure_exhausts_retries_and_fails_the_session() {
    let h = harness();
    h.mux.fail_next_session_creates(10);

    let error = h.controller.start_workflow("research", "goal").await.unwrap_err();
    assert!(matches!(error, EngineError::SessionFailed(_)));

    // Primary retry(2), then the abort fallback: three create attempts
    let creates = h
        .mux
        .calls()
        .iter()
        .filter(|c| matches!(c, swarm_adapters::mux::MuxCall::CreateSession { .. }))
        .count();
    assert_eq!(creates, 3);

    let id = swarm_core::SessionId::parse(&h.clock.now().timestamp_millis().to_string()).unwrap();
    assert_eq!(h.audit.get_session(&id).unwrap().unwrap().status, "failed");
    let errors = h.audit.errors_for_session(&id).unwrap();
    assert_eq!(
        errors.iter().filter(|e| e.0 == "TMUX_SESSION_FAILED").count(),
        3
    );
}

#[tokio::test]
async fn spawn_failures_abort_after_the_recovery_cap() {
    let h = harness();
    // The researcher spawns first; fail every reviewer pane split.
    // Splits: researcher ok, then reviewer attempts all fail.
    h.mux.set_split_plan([false, true, true, true, true, true]);

    let error = h
        .controller
        .start_workflow("research", "study codec X")
        .await
        .unwrap_err();
    assert!(matches!(error, EngineError::SessionFailed(_)));

    // Four spawn attempts hit the mux: initial + three recovery retries
    let splits = h
        .mux
        .calls()
        .iter()
        .filter(|c| matches!(c, swarm_adapters::mux::MuxCall::CreatePane { .. }))
        .count();
    assert_eq!(splits, 5); // researcher + 4 reviewer attempts

    // Session failed, resources torn down
    let id = swarm_core::SessionId::parse(&h.clock.now().timestamp_millis().to_string()).unwrap();
    assert_eq!(h.audit.get_session(&id).unwrap().unwrap().status, "failed");
    assert!(!h.mux.session_exists(&id.mux_session_name()));
    assert!(h.worktrees.existing_roles().is_empty());

    // The errors were recorded with the spawn code
    let errors = h.audit.errors_for_session(&id).unwrap();
    assert!(errors.iter().filter(|e| e.0 == "AGENT_SPAWN_FAILED").count() >= 4);
}

#[tokio::test]
async fn worktree_failure_aborts_start_before_any_agent() {
    let mut config = test_config();
    config.allow_partial = true;
    let h = harness_with(config);

    h.worktrees.fail_creates_for(Role::Reviewer, 10);
    let result = h.controller.start_workflow("research", "goal").await;

    // Multi-create is all-or-nothing: nothing survives, no agent spawned
    assert!(matches!(result, Err(EngineError::Worktree(_))));
    assert!(h.worktrees.existing_roles().is_empty());
    assert!(!h
        .mux
        .calls()
        .iter()
        .any(|c| matches!(c, swarm_adapters::mux::MuxCall::CreatePane { .. })));
}

#[tokio::test]
async fn stop_terminates_agents_and_cleans_resources() {
    let h = harness();
    let id = h.controller.start_workflow("research", "goal").await.unwrap();

    h.controller.stop().await.unwrap();

    assert!(!h.mux.session_exists(&id.mux_session_name()));
    assert!(h.worktrees.existing_roles().is_empty());
    let session = h.controller.get_session().unwrap();
    assert_eq!(session.status, SessionStatus::Cancelled);
    assert!(session
        .agents
        .values()
        .all(|a| a.status == CoreAgentStatus::Terminated));
    assert_eq!(h.audit.get_session(&id).unwrap().unwrap().status, "cancelled");

    // Interrupts went out before the panes died
    assert!(h
        .mux
        .calls()
        .iter()
        .any(|c| matches!(c, swarm_adapters::mux::MuxCall::SendInterrupt { .. })));
}

#[tokio::test]
async fn kill_skips_the_graceful_wait() {
    let h = harness();
    let id = h.controller.start_workflow("research", "goal").await.unwrap();

    h.controller.kill().await.unwrap();

    assert!(!h.mux.session_exists(&id.mux_session_name()));
    // No interrupts on the fast path
    assert!(!h
        .mux
        .calls()
        .iter()
        .any(|c| matches!(c, swarm_adapters::mux::MuxCall::SendInterrupt { .. })));
}

#[tokio::test]
async fn cleanup_is_idempotent() {
    let h = harness();
    h.controller.start_workflow("research", "goal").await.unwrap();
    h.controller.cleanup().await.unwrap();
    h.controller.cleanup().await.unwrap();
    assert!(h.worktrees.existing_roles().is_empty());
}

#[tokio::test]
async fn stop_twice_produces_no_error() {
    let h = harness();
    h.controller.start_workflow("research", "goal").await.unwrap();
    h.controller.stop().await.unwrap();
    h.controller.stop().await.unwrap();
}

async fn drive_to_completion(h: &crate::test_helpers::Harness) {
    agent_emits(h, "m-1", 1, Role::Researcher, Role::Orchestrator, MessageType::Finding);
    h.controller.tick().await.unwrap();
    let review = Message::new(
        "m-2",
        h.clock.now() + chrono::Duration::seconds(2),
        Role::Reviewer,
        Role::Orchestrator,
        MessageType::Review,
        "verified",
        "all findings check out",
    )
    .with_metadata("verdict", serde_json::json!("APPROVED"));
    h.bus.append(QueueKind::Outbox, Role::Reviewer, &review).unwrap();
    h.controller.tick().await.unwrap();
    let result = Message::new(
        "m-3",
        h.clock.now() + chrono::Duration::seconds(3),
        Role::Researcher,
        Role::Orchestrator,
        MessageType::Result,
        "codec X report",
        "final write-up",
    )
    .with_attachment("outputs/report.md");
    h.bus.append(QueueKind::Outbox, Role::Researcher, &result).unwrap();
    h.controller.tick().await.unwrap();
}

#[tokio::test]
async fn synthesize_produces_result_and_completes_the_session() {
    let h = harness();
    let id = h
        .controller
        .start_workflow("research", "study codec X")
        .await
        .unwrap();
    drive_to_completion(&h).await;

    let result = h.controller.synthesize_result().await.unwrap();
    assert!(result.success);
    assert!(result.findings.len() >= 1);
    assert_eq!(result.artifacts, vec![std::path::PathBuf::from("outputs/report.md")]);
    assert!(result.summary.contains("research workflow"));

    assert_eq!(
        h.controller.get_session().unwrap().status,
        SessionStatus::Complete
    );
    assert_eq!(h.audit.get_session(&id).unwrap().unwrap().status, "complete");

    // The result file landed under outputs/{sessionId}/
    let path = h
        ._dir
        .path()
        .join("outputs")
        .join(id.as_str())
        .join("result.json");
    assert!(path.is_file());
}

#[tokio::test]
async fn synthesize_before_completion_is_an_error() {
    let h = harness();
    h.controller.start_workflow("research", "goal").await.unwrap();
    assert!(matches!(
        h.controller.synthesize_result().await,
        Err(EngineError::Workflow(WorkflowError::NotComplete))
    ));
}

#[tokio::test]
async fn resume_restores_stage_history_and_skips_processed_messages() {
    let h = harness();
    let id = h
        .controller
        .start_workflow("research", "study codec X")
        .await
        .unwrap();

    // Advance past the entry stage, then checkpoint and "crash"
    agent_emits(&h, "m-1", 1, Role::Researcher, Role::Orchestrator, MessageType::Finding);
    h.controller.tick().await.unwrap();
    let before = h.controller.get_instance().unwrap();
    assert_eq!(before.current_stage, "verification");
    h.controller
        .checkpoint_now(swarm_storage::CheckpointKind::Manual)
        .unwrap();
    h.controller.kill().await.unwrap();

    // A fresh orchestrator process pointed at the same stores
    let fresh = SessionController::new(
        test_config(),
        h._dir.path(),
        h.mux.clone(),
        h.worktrees.clone(),
        h.bus.clone(),
        h.audit.clone(),
        h.clock.clone(),
        swarm_core::SequentialIdGen::new("m2"),
        h.notifier.clone(),
    );
    fresh.resume(&id).await.unwrap();

    let restored = fresh.get_instance().unwrap();
    assert_eq!(restored.current_stage, before.current_stage);
    assert_eq!(restored.history, before.history);
    assert_eq!(restored.iterations, before.iterations);
    assert!(restored.is_processed("m-1"));

    // The already-routed finding is not processed again
    fresh.tick().await.unwrap();
    let reviewer_inbox = h.bus.read(QueueKind::Inbox, Role::Reviewer).unwrap();
    assert_eq!(
        reviewer_inbox.iter().filter(|m| m.id == "m-1").count(),
        1,
        "no duplicate delivery after resume"
    );
}

#[tokio::test]
async fn resume_reuses_a_surviving_mux_session() {
    let h = harness();
    let id = h
        .controller
        .start_workflow("research", "study codec X")
        .await
        .unwrap();
    h.controller.kill().await.unwrap();

    // The tmux session outlived the orchestrator process
    h.mux.create_session(&id.mux_session_name()).await.unwrap();

    let fresh = SessionController::new(
        test_config(),
        h._dir.path(),
        h.mux.clone(),
        h.worktrees.clone(),
        h.bus.clone(),
        h.audit.clone(),
        h.clock.clone(),
        swarm_core::SequentialIdGen::new("m3"),
        h.notifier.clone(),
    );
    fresh.resume(&id).await.unwrap();
    assert!(fresh.is_running());
}

#[tokio::test]
async fn resume_without_history_is_no_session() {
    let h = harness();
    let id = swarm_core::SessionId::parse("12345").unwrap();
    assert!(matches!(
        h.controller.resume(&id).await,
        Err(EngineError::NoSession)
    ));
}
