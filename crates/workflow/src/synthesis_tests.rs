// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::catalog;
use crate::instance::StageOutput;
use swarm_core::test_support::{base_time, test_message, test_session_id};
use swarm_core::{ErrorCode, Severity};

fn completed_instance() -> (WorkflowTemplate, WorkflowInstance) {
    let template = catalog::template("research").unwrap();
    let mut instance = WorkflowInstance::new(&template, test_session_id(), "study codec X");
    for (stage, output_type) in [
        ("initial_research", MessageType::Finding),
        ("verification", MessageType::Review),
        ("synthesis", MessageType::Result),
    ] {
        instance.start_stage(&template, stage, base_time()).unwrap();
        instance
            .complete_stage(stage, StageOutput::new(output_type), base_time())
            .unwrap();
    }
    (template, instance)
}

fn history() -> Vec<Message> {
    vec![
        test_message("m-1", 1, Role::Researcher, Role::Reviewer, MessageType::Finding),
        test_message("m-2", 2, Role::Reviewer, Role::Researcher, MessageType::Review),
        test_message("m-3", 3, Role::Researcher, Role::Orchestrator, MessageType::Result)
            .with_attachment("outputs/report.md"),
    ]
}

#[test]
fn synthesize_requires_completion() {
    let template = catalog::template("research").unwrap();
    let instance = WorkflowInstance::new(&template, test_session_id(), "goal");
    assert_eq!(
        synthesize(&template, &instance, &[]),
        Err(crate::WorkflowError::NotComplete)
    );
}

#[test]
fn result_counts_stages_messages_and_roles() {
    let (template, instance) = completed_instance();
    let result = synthesize(&template, &instance, &history()).unwrap();

    assert!(result.success);
    assert!(result.summary.contains("research workflow"));
    assert!(result.summary.contains("3/5 stages complete"));
    assert!(result.summary.contains("3 messages"));
    assert!(result.summary.contains("researcher: 2"));
    assert!(result.summary.contains("reviewer: 1"));
}

#[test]
fn artifacts_and_findings_are_collected() {
    let (template, instance) = completed_instance();
    let result = synthesize(&template, &instance, &history()).unwrap();

    assert_eq!(result.artifacts, vec![std::path::PathBuf::from("outputs/report.md")]);
    assert_eq!(result.findings, vec!["subject-m-1".to_string()]);
}

#[test]
fn fatal_errors_flip_success_off() {
    let (template, mut instance) = completed_instance();
    instance.record_error(
        swarm_core::ErrorRecord::new(ErrorCode::AgentCrashed, "monitor", "pane gone")
            .with_severity(Severity::Fatal),
    );
    let result = synthesize(&template, &instance, &history()).unwrap();
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
}

#[test]
fn result_round_trips_through_json() {
    let (template, instance) = completed_instance();
    let result = synthesize(&template, &instance, &history()).unwrap();
    let json = serde_json::to_string(&result).unwrap();
    let back: WorkflowResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
}
