// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static workflow definitions: stages and guarded transitions.
//!
//! Stage order and transition order are both semantic (the first matching
//! transition, in declaration order, wins), so stages live in an `IndexMap`
//! and transitions in a `Vec`.

use crate::WorkflowError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use swarm_core::{MessageType, Role};

/// Outcome of a review stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "APPROVED")]
    Approved,
    #[serde(rename = "NEEDS_REVISION")]
    NeedsRevision,
    #[serde(rename = "REJECTED")]
    Rejected,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "APPROVED",
            Verdict::NeedsRevision => "NEEDS_REVISION",
            Verdict::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Verdict> {
        match s {
            "APPROVED" => Some(Verdict::Approved),
            "NEEDS_REVISION" => Some(Verdict::NeedsRevision),
            "REJECTED" => Some(Verdict::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of work a stage performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Work,
    Review,
    Decision,
    Synthesis,
}

/// One node of the workflow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDef {
    /// Unique within the template
    pub id: String,
    /// Executing role
    pub role: Role,
    pub kind: StageKind,
    /// Accepted input message categories
    pub inputs: Vec<MessageType>,
    /// Produced output category
    pub output: MessageType,
    pub optional: bool,
    pub max_iterations: u32,
    pub timeout: Duration,
    pub description: String,
}

/// Transition guard. Evaluated against the completing stage's output.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    Always,
    OnComplete,
    OnVerdict(Verdict),
    /// Matches when a numeric output-metadata field reaches a threshold.
    OnCount { field: String, threshold: u64 },
    /// Matches when the *target* stage's iteration counter is exhausted.
    OnMaxIterations,
}

/// Directed, guarded edge between stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub guard: Guard,
}

impl Transition {
    pub fn new(from: impl Into<String>, to: impl Into<String>, guard: Guard) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            guard,
        }
    }
}

/// A complete named workflow definition.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowTemplate {
    pub name: String,
    /// Semver of the definition, not the crate
    pub version: String,
    pub roles: Vec<Role>,
    pub stages: IndexMap<String, StageDef>,
    /// Declaration order is the match order
    pub transitions: Vec<Transition>,
    pub entry: String,
    pub completion: String,
    pub max_duration: Duration,
    pub max_revisions: u32,
}

impl WorkflowTemplate {
    pub fn stage(&self, id: &str) -> Option<&StageDef> {
        self.stages.get(id)
    }

    pub fn transitions_from<'a>(&'a self, from: &'a str) -> impl Iterator<Item = &'a Transition> {
        self.transitions.iter().filter(move |t| t.from == from)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Structural validation: endpoints exist, roles are covered, no
    /// orchestrator-executed stages.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let invalid = |reason: String| WorkflowError::InvalidTemplate {
            name: self.name.clone(),
            reason,
        };

        if !self.stages.contains_key(&self.entry) {
            return Err(invalid(format!("entry stage {} not declared", self.entry)));
        }
        if !self.stages.contains_key(&self.completion) {
            return Err(invalid(format!(
                "completion stage {} not declared",
                self.completion
            )));
        }
        for t in &self.transitions {
            if !self.stages.contains_key(&t.from) || !self.stages.contains_key(&t.to) {
                return Err(invalid(format!("transition {}→{} names unknown stage", t.from, t.to)));
            }
        }
        for stage in self.stages.values() {
            if !stage.role.is_agent() {
                return Err(invalid(format!("stage {} executed by pseudo-role", stage.id)));
            }
            if !self.roles.contains(&stage.role) {
                return Err(invalid(format!(
                    "stage {} needs role {} not in the template's role set",
                    stage.id, stage.role
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
