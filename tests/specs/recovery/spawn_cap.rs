//! S4 — repeated spawn failures hit the recovery cap and fail the session.

use crate::prelude::*;
use swarm_core::Clock;
use swarm_adapters::mux::MuxCall;
use swarm_core::SessionId;

#[tokio::test]
async fn four_spawn_failures_abort_the_session_after_three_recoveries() {
    let s = spec();
    // The researcher's pane split succeeds; every reviewer split fails
    s.mux.set_split_plan([false, true, true, true, true, true]);

    let error = s
        .controller
        .start_workflow("research", "study codec X")
        .await
        .unwrap_err();
    assert!(matches!(error, swarm_engine::EngineError::SessionFailed(_)));

    // Initial attempt + three recovery retries = four reviewer splits
    let reviewer_splits = s
        .mux
        .calls()
        .iter()
        .filter(|c| matches!(c, MuxCall::CreatePane { .. }))
        .count()
        - 1; // minus the researcher's
    assert_eq!(reviewer_splits, 4);

    // Session is failed in the audit log with the spawn errors on record
    let id = SessionId::parse(&s.clock.now().timestamp_millis().to_string()).unwrap();
    let row = s.audit.get_session(&id).unwrap().unwrap();
    assert_eq!(row.status, "failed");
    let errors = s.audit.errors_for_session(&id).unwrap();
    assert!(errors.iter().filter(|e| e.0 == "AGENT_SPAWN_FAILED").count() >= 4);

    // Multiplexer session killed, worktrees removed
    assert!(!s.mux.session_exists(&id.mux_session_name()));
    assert!(s.worktrees.existing_roles().is_empty());
    assert!(!s.controller.is_running());
}
