//! S2 — revision loop with the max-iterations override.

use crate::prelude::*;
use swarm_core::{MessageType, Role};

#[tokio::test]
async fn needs_revision_loops_then_overrides_to_synthesis() {
    let s = spec();
    start_research(&s).await;

    // Initial findings reach verification
    agent_emits(&s, "m-1", 10, Role::Researcher, Role::Orchestrator, MessageType::Finding);
    s.controller.tick().await.unwrap();
    assert_eq!(
        s.controller.get_instance().unwrap().current_stage,
        "verification"
    );

    // First NEEDS_REVISION: back to deep_dive, iteration 1
    reviewer_verdict(&s, "m-2", 20, "NEEDS_REVISION");
    s.controller.tick().await.unwrap();
    let instance = s.controller.get_instance().unwrap();
    assert_eq!(instance.current_stage, "deep_dive");
    assert_eq!(instance.iteration_count("deep_dive"), 1);

    // Revised findings, second NEEDS_REVISION: deep_dive again, iteration 2
    agent_emits(&s, "m-3", 30, Role::Researcher, Role::Orchestrator, MessageType::Finding);
    s.controller.tick().await.unwrap();
    assert_eq!(
        s.controller.get_instance().unwrap().current_stage,
        "re_verification"
    );
    reviewer_verdict(&s, "m-4", 40, "NEEDS_REVISION");
    s.controller.tick().await.unwrap();
    let instance = s.controller.get_instance().unwrap();
    assert_eq!(instance.current_stage, "deep_dive");
    assert_eq!(instance.iteration_count("deep_dive"), 2);

    // Third NEEDS_REVISION: deep_dive is at its cap, the engine routes to
    // synthesis instead of another round
    agent_emits(&s, "m-5", 50, Role::Researcher, Role::Orchestrator, MessageType::Finding);
    s.controller.tick().await.unwrap();
    reviewer_verdict(&s, "m-6", 60, "NEEDS_REVISION");
    s.controller.tick().await.unwrap();

    let instance = s.controller.get_instance().unwrap();
    assert_eq!(instance.current_stage, "synthesis");
    assert_eq!(instance.iteration_count("deep_dive"), 2);
    // Invariant: never beyond max + 1
    assert!(instance.iteration_count("deep_dive") <= 3);
}
