// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in template catalogue.
//!
//! Templates are defined in code; there is no user-authored format and no
//! hot reload. `implement` and `full` are aliases of the development
//! template (`full` adds the researcher for an up-front research stage).

use crate::template::{Guard, StageDef, StageKind, Transition, Verdict, WorkflowTemplate};
use indexmap::IndexMap;
use std::time::Duration;
use swarm_core::{MessageType, Role};

const STAGE_TIMEOUT: Duration = Duration::from_secs(600);
const WORKFLOW_MAX: Duration = Duration::from_secs(1800);

/// Canonical template names, aliases excluded.
pub fn template_names() -> &'static [&'static str] {
    &["research", "development", "architecture", "review"]
}

/// Resolve aliases to a canonical catalogue name.
pub fn canonical_name(name: &str) -> Option<&'static str> {
    match name {
        "research" => Some("research"),
        "development" | "implement" => Some("development"),
        "architecture" => Some("architecture"),
        "review" => Some("review"),
        "full" => Some("full"),
        _ => None,
    }
}

/// Build a fresh template by name (aliases accepted). `None` for unknown
/// names; callers surface that as `WORKFLOW_NOT_FOUND`.
pub fn template(name: &str) -> Option<WorkflowTemplate> {
    match canonical_name(name)? {
        "research" => Some(research()),
        "development" => Some(development(false)),
        "full" => Some(development(true)),
        "architecture" => Some(architecture()),
        "review" => Some(review()),
        _ => None,
    }
}

fn stage(
    id: &str,
    role: Role,
    kind: StageKind,
    inputs: &[MessageType],
    output: MessageType,
    description: &str,
) -> StageDef {
    StageDef {
        id: id.to_string(),
        role,
        kind,
        inputs: inputs.to_vec(),
        output,
        optional: false,
        max_iterations: 3,
        timeout: STAGE_TIMEOUT,
        description: description.to_string(),
    }
}

fn stages(defs: Vec<StageDef>) -> IndexMap<String, StageDef> {
    defs.into_iter().map(|s| (s.id.clone(), s)).collect()
}

fn research() -> WorkflowTemplate {
    use MessageType::*;
    use Role::*;

    let mut deep_dive = stage(
        "deep_dive",
        Researcher,
        StageKind::Work,
        &[Review, Feedback],
        Finding,
        "Revisit findings the reviewer flagged",
    );
    deep_dive.optional = true;
    deep_dive.max_iterations = 2; // max 2 revision rounds

    WorkflowTemplate {
        name: "research".to_string(),
        version: "1.0.0".to_string(),
        roles: vec![Researcher, Reviewer],
        stages: stages(vec![
            stage(
                "initial_research",
                Researcher,
                StageKind::Work,
                &[Task],
                Finding,
                "Survey the topic and produce findings",
            ),
            stage(
                "verification",
                Reviewer,
                StageKind::Review,
                &[Finding],
                Review,
                "Check findings for accuracy and coverage",
            ),
            deep_dive,
            stage(
                "re_verification",
                Reviewer,
                StageKind::Review,
                &[Finding],
                Review,
                "Re-check revised findings",
            ),
            stage(
                "synthesis",
                Researcher,
                StageKind::Synthesis,
                &[Review],
                Result,
                "Write up the final report",
            ),
        ]),
        transitions: vec![
            Transition::new("initial_research", "verification", Guard::OnComplete),
            Transition::new("verification", "synthesis", Guard::OnVerdict(Verdict::Approved)),
            Transition::new(
                "verification",
                "deep_dive",
                Guard::OnVerdict(Verdict::NeedsRevision),
            ),
            Transition::new("verification", "synthesis", Guard::OnVerdict(Verdict::Rejected)),
            Transition::new("deep_dive", "re_verification", Guard::OnComplete),
            Transition::new(
                "re_verification",
                "synthesis",
                Guard::OnVerdict(Verdict::Approved),
            ),
            Transition::new(
                "re_verification",
                "deep_dive",
                Guard::OnVerdict(Verdict::NeedsRevision),
            ),
            Transition::new(
                "re_verification",
                "synthesis",
                Guard::OnVerdict(Verdict::Rejected),
            ),
        ],
        entry: "initial_research".to_string(),
        completion: "synthesis".to_string(),
        max_duration: WORKFLOW_MAX,
        max_revisions: 2,
    }
}

fn development(with_research: bool) -> WorkflowTemplate {
    use MessageType::*;
    use Role::*;

    let mut roles = vec![Architect, Developer, Reviewer];
    let mut defs = Vec::new();
    let mut transitions = Vec::new();

    if with_research {
        roles.insert(0, Researcher);
        defs.push(stage(
            "research",
            Researcher,
            StageKind::Work,
            &[Task],
            Finding,
            "Research prior art before designing",
        ));
        transitions.push(Transition::new("research", "design", Guard::OnComplete));
    }

    let mut design_revision = stage(
        "design_revision",
        Architect,
        StageKind::Work,
        &[Review],
        Design,
        "Revise the design per review feedback",
    );
    design_revision.optional = true;
    design_revision.max_iterations = 2;

    let mut code_revision = stage(
        "code_revision",
        Developer,
        StageKind::Work,
        &[Review],
        Artifact,
        "Address code review findings",
    );
    code_revision.optional = true;
    code_revision.max_iterations = 2;

    defs.extend(vec![
        stage(
            "design",
            Architect,
            StageKind::Work,
            &[Task, Finding],
            Design,
            "Produce the technical design",
        ),
        stage(
            "design_review",
            Reviewer,
            StageKind::Review,
            &[Design],
            Review,
            "Review the design",
        ),
        design_revision,
        stage(
            "implementation",
            Developer,
            StageKind::Work,
            &[Design, Review],
            Artifact,
            "Implement the approved design",
        ),
        stage(
            "code_review",
            Reviewer,
            StageKind::Review,
            &[Artifact],
            Review,
            "Review the implementation",
        ),
        code_revision,
        stage(
            "documentation",
            Developer,
            StageKind::Synthesis,
            &[Review],
            Result,
            "Document what was built",
        ),
    ]);

    transitions.extend(vec![
        Transition::new("design", "design_review", Guard::OnComplete),
        Transition::new(
            "design_review",
            "implementation",
            Guard::OnVerdict(Verdict::Approved),
        ),
        Transition::new(
            "design_review",
            "design_revision",
            Guard::OnVerdict(Verdict::NeedsRevision),
        ),
        Transition::new(
            "design_review",
            "design_revision",
            Guard::OnVerdict(Verdict::Rejected),
        ),
        Transition::new("design_revision", "design_review", Guard::OnComplete),
        Transition::new("implementation", "code_review", Guard::OnComplete),
        Transition::new(
            "code_review",
            "documentation",
            Guard::OnVerdict(Verdict::Approved),
        ),
        Transition::new(
            "code_review",
            "code_revision",
            Guard::OnVerdict(Verdict::NeedsRevision),
        ),
        Transition::new(
            "code_review",
            "code_revision",
            Guard::OnVerdict(Verdict::Rejected),
        ),
        Transition::new("code_revision", "code_review", Guard::OnComplete),
    ]);

    WorkflowTemplate {
        name: if with_research { "full" } else { "development" }.to_string(),
        version: "1.0.0".to_string(),
        roles,
        stages: stages(defs),
        transitions,
        entry: if with_research { "research" } else { "design" }.to_string(),
        completion: "documentation".to_string(),
        max_duration: WORKFLOW_MAX,
        max_revisions: 2,
    }
}

fn architecture() -> WorkflowTemplate {
    use MessageType::*;
    use Role::*;

    WorkflowTemplate {
        name: "architecture".to_string(),
        version: "1.0.0".to_string(),
        roles: vec![Architect, Researcher, Reviewer],
        stages: stages(vec![
            stage(
                "requirements",
                Architect,
                StageKind::Work,
                &[Task],
                Design,
                "Capture requirements and constraints",
            ),
            stage(
                "prior_art",
                Researcher,
                StageKind::Work,
                &[Design],
                Finding,
                "Survey existing approaches",
            ),
            stage(
                "design_options",
                Architect,
                StageKind::Work,
                &[Finding],
                Design,
                "Lay out candidate designs",
            ),
            stage(
                "evaluation",
                Reviewer,
                StageKind::Review,
                &[Design],
                Review,
                "Score the options against requirements",
            ),
            stage(
                "decision",
                Architect,
                StageKind::Decision,
                &[Review],
                Design,
                "Pick a direction and record the rationale",
            ),
            stage(
                "implementation_plan",
                Architect,
                StageKind::Synthesis,
                &[Design],
                Result,
                "Break the decision into an actionable plan",
            ),
        ]),
        transitions: vec![
            Transition::new("requirements", "prior_art", Guard::OnComplete),
            Transition::new("prior_art", "design_options", Guard::OnComplete),
            Transition::new("design_options", "evaluation", Guard::OnComplete),
            Transition::new("evaluation", "decision", Guard::OnComplete),
            Transition::new("decision", "implementation_plan", Guard::OnComplete),
        ],
        entry: "requirements".to_string(),
        completion: "implementation_plan".to_string(),
        max_duration: WORKFLOW_MAX,
        max_revisions: 2,
    }
}

fn review() -> WorkflowTemplate {
    use MessageType::*;
    use Role::*;

    WorkflowTemplate {
        name: "review".to_string(),
        version: "1.0.0".to_string(),
        roles: vec![Reviewer],
        stages: stages(vec![
            stage(
                "review",
                Reviewer,
                StageKind::Review,
                &[Task],
                Review,
                "Review the target named by the goal",
            ),
            stage(
                "summary",
                Reviewer,
                StageKind::Synthesis,
                &[Review],
                Result,
                "Summarize the findings",
            ),
        ]),
        transitions: vec![Transition::new("review", "summary", Guard::OnComplete)],
        entry: "review".to_string(),
        completion: "summary".to_string(),
        max_duration: WORKFLOW_MAX,
        max_revisions: 2,
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
