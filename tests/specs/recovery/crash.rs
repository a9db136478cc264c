//! S3 — agent crash detection, restart, and task redelivery.

use crate::prelude::*;
use swarm_adapters::WorktreeAdapter;
use swarm_bus::QueueKind;
use swarm_core::{AgentStatus, MessageType, Role};

#[tokio::test]
async fn crashed_agent_is_restarted_with_its_task_redelivered() {
    let s = spec();
    let id = start_research(&s).await;

    let old_pane = s
        .controller
        .get_session()
        .unwrap()
        .agent(Role::Researcher)
        .unwrap()
        .pane
        .clone();

    // The agent consumed its task and then its pane died underneath it
    s.bus.clear(QueueKind::Inbox, Role::Researcher).unwrap();
    s.mux.crash_pane(&id.mux_session_name(), &old_pane);

    // Within one monitor interval the crash is detected and recovered
    s.controller.tick().await.unwrap();

    let session = s.controller.get_session().unwrap();
    let handle = session.agent(Role::Researcher).unwrap();
    assert_eq!(handle.status, AgentStatus::Ready);
    assert_ne!(handle.pane, old_pane, "a new pane was spawned");
    assert_eq!(handle.worktree, s.worktrees.path_for(Role::Researcher));

    // The last task message was redelivered
    let inbox = s.bus.read(QueueKind::Inbox, Role::Researcher).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].message_type, MessageType::Task);

    // The error record carries recovered = true
    let errors = s.audit.errors_for_session(&id).unwrap();
    let crash = errors.iter().find(|e| e.0 == "AGENT_CRASHED").unwrap();
    assert!(crash.3, "AGENT_CRASHED should be marked recovered");

    // The restarted roster keeps working: the session is still running
    assert!(s.controller.is_running());
}
