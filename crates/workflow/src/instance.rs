// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow execution state.
//!
//! The instance is the serializable half of the engine: it references its
//! template by name only, so a checkpoint can restore it in a fresh process
//! and resume against the same catalogue entry.

use crate::template::{Guard, Verdict, WorkflowTemplate};
use crate::WorkflowError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use swarm_core::{ErrorRecord, MessageType, SessionId};

/// Instance lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Running,
    Complete,
    Failed,
}

/// Status of one stage execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Running,
    Complete,
    Skipped,
    Failed,
}

/// Output attached to a completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    #[serde(rename = "type")]
    pub output_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl StageOutput {
    pub fn new(output_type: MessageType) -> Self {
        Self {
            output_type,
            verdict: None,
            summary: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// One row of the execution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageExecution {
    pub stage: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: StageStatus,
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<StageOutput>,
}

/// Live state of one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub template: String,
    pub session_id: SessionId,
    pub goal: String,
    pub status: InstanceStatus,
    pub current_stage: String,
    pub history: Vec<StageExecution>,
    /// Stage id → number of starts. Incremented on every start.
    pub iterations: BTreeMap<String, u32>,
    /// Message ids already routed; replay is idempotent.
    pub processed_message_ids: BTreeSet<String>,
    pub errors: Vec<ErrorRecord>,
}

impl WorkflowInstance {
    /// Fresh instance positioned at the template's entry stage (not yet
    /// started; the controller starts it when it delivers the goal).
    pub fn new(template: &WorkflowTemplate, session_id: SessionId, goal: impl Into<String>) -> Self {
        Self {
            template: template.name.clone(),
            session_id,
            goal: goal.into(),
            status: InstanceStatus::Running,
            current_stage: template.entry.clone(),
            history: Vec::new(),
            iterations: BTreeMap::new(),
            processed_message_ids: BTreeSet::new(),
            errors: Vec::new(),
        }
    }

    pub fn iteration_count(&self, stage: &str) -> u32 {
        self.iterations.get(stage).copied().unwrap_or(0)
    }

    /// Begin executing a stage. Returns the iteration number (1-based).
    ///
    /// The count is allowed to reach `max_iterations + 1` (the over-limit
    /// detection step) and errors beyond that.
    pub fn start_stage(
        &mut self,
        template: &WorkflowTemplate,
        stage_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, WorkflowError> {
        let stage = template
            .stage(stage_id)
            .ok_or_else(|| WorkflowError::UnknownStage(stage_id.to_string()))?;

        let count = self.iteration_count(stage_id);
        if count > stage.max_iterations {
            return Err(WorkflowError::MaxIterationsExceeded {
                stage: stage_id.to_string(),
                max: stage.max_iterations,
            });
        }

        let iteration = count + 1;
        self.iterations.insert(stage_id.to_string(), iteration);
        self.history.push(StageExecution {
            stage: stage_id.to_string(),
            started_at: now,
            ended_at: None,
            status: StageStatus::Running,
            iteration,
            output: None,
        });
        self.current_stage = stage_id.to_string();
        tracing::debug!(stage = stage_id, iteration, "stage started");
        Ok(iteration)
    }

    /// Attach output to the newest running execution of a stage and mark it
    /// complete.
    pub fn complete_stage(
        &mut self,
        stage_id: &str,
        output: StageOutput,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let record = self
            .history
            .iter_mut()
            .rev()
            .find(|r| r.stage == stage_id && r.status == StageStatus::Running)
            .ok_or_else(|| WorkflowError::NoRunningStage(stage_id.to_string()))?;
        record.status = StageStatus::Complete;
        record.ended_at = Some(now);
        record.output = Some(output);
        Ok(())
    }

    /// Record an optional stage as skipped. Does not count as an iteration.
    pub fn skip_stage(
        &mut self,
        template: &WorkflowTemplate,
        stage_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let stage = template
            .stage(stage_id)
            .ok_or_else(|| WorkflowError::UnknownStage(stage_id.to_string()))?;
        if !stage.optional {
            return Err(WorkflowError::NotOptional(stage_id.to_string()));
        }
        self.history.push(StageExecution {
            stage: stage_id.to_string(),
            started_at: now,
            ended_at: Some(now),
            status: StageStatus::Skipped,
            iteration: self.iteration_count(stage_id),
            output: None,
        });
        Ok(())
    }

    /// Mark the newest running execution of a stage as failed.
    pub fn fail_stage(&mut self, stage_id: &str, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        let record = self
            .history
            .iter_mut()
            .rev()
            .find(|r| r.stage == stage_id && r.status == StageStatus::Running)
            .ok_or_else(|| WorkflowError::NoRunningStage(stage_id.to_string()))?;
        record.status = StageStatus::Failed;
        record.ended_at = Some(now);
        Ok(())
    }

    /// Newest output recorded for a stage, if any.
    pub fn latest_output(&self, stage_id: &str) -> Option<&StageOutput> {
        self.history
            .iter()
            .rev()
            .filter(|r| r.stage == stage_id)
            .find_map(|r| r.output.as_ref())
    }

    /// Walk transitions declared from the current stage, in order, and
    /// return the first whose guard matches the given output.
    ///
    /// Two refinements per the transition semantics:
    /// - `on_max_iterations` consults the *target* stage's counter;
    /// - if the selected target is itself already at its iteration cap, the
    ///   completion stage is substituted.
    pub fn next_stage(
        &self,
        template: &WorkflowTemplate,
        output: &StageOutput,
    ) -> Option<String> {
        for transition in template.transitions_from(&self.current_stage) {
            if !self.guard_matches(template, &transition.guard, &transition.to, output) {
                continue;
            }
            let target = template.stage(&transition.to)?;
            if transition.to != template.completion
                && self.iteration_count(&transition.to) >= target.max_iterations
            {
                tracing::debug!(
                    from = %self.current_stage,
                    blocked = %transition.to,
                    "iteration cap reached, short-circuiting to completion stage"
                );
                return Some(template.completion.clone());
            }
            return Some(transition.to.clone());
        }
        None
    }

    fn guard_matches(
        &self,
        template: &WorkflowTemplate,
        guard: &Guard,
        target: &str,
        output: &StageOutput,
    ) -> bool {
        match guard {
            Guard::Always | Guard::OnComplete => true,
            Guard::OnVerdict(v) => output.verdict == Some(*v),
            Guard::OnCount { field, threshold } => output
                .metadata
                .get(field)
                .and_then(|v| v.as_u64())
                .is_some_and(|n| n >= *threshold),
            Guard::OnMaxIterations => template
                .stage(target)
                .is_some_and(|s| self.iteration_count(target) >= s.max_iterations),
        }
    }

    /// Complete iff marked complete or the completion stage has a complete
    /// history entry.
    pub fn is_complete(&self, template: &WorkflowTemplate) -> bool {
        self.status == InstanceStatus::Complete
            || self.history.iter().any(|r| {
                r.stage == template.completion && r.status == StageStatus::Complete
            })
    }

    /// Ratio of distinct completed stages to total stages, in [0, 100].
    pub fn progress(&self, template: &WorkflowTemplate) -> u8 {
        let total = template.stage_count();
        if total == 0 {
            return 0;
        }
        let done: BTreeSet<&str> = self
            .history
            .iter()
            .filter(|r| r.status == StageStatus::Complete)
            .map(|r| r.stage.as_str())
            .collect();
        let pct = (done.len() * 100) / total;
        pct.min(100) as u8
    }

    /// Record a message id as routed. Returns false when already seen.
    pub fn mark_processed(&mut self, message_id: &str) -> bool {
        self.processed_message_ids.insert(message_id.to_string())
    }

    pub fn is_processed(&self, message_id: &str) -> bool {
        self.processed_message_ids.contains(message_id)
    }

    pub fn record_error(&mut self, error: ErrorRecord) {
        self.errors.push(error);
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
