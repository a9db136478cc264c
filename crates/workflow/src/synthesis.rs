// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Final result synthesis over a completed instance.

use crate::instance::WorkflowInstance;
use crate::template::WorkflowTemplate;
use crate::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use swarm_core::{ErrorRecord, Message, MessageType, Role};

/// Synthesised outcome of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// True iff the terminal stage completed without fatal errors
    pub success: bool,
    pub summary: String,
    /// Paths attached to artifact/result messages
    pub artifacts: Vec<PathBuf>,
    /// Subjects of finding messages, in emit order
    pub findings: Vec<String>,
    pub errors: Vec<ErrorRecord>,
}

/// Build the result record. Fails with `NotComplete` for a live instance.
///
/// `messages` is the session's message history (audit-store order).
pub fn synthesize(
    template: &WorkflowTemplate,
    instance: &WorkflowInstance,
    messages: &[Message],
) -> Result<WorkflowResult, WorkflowError> {
    if !instance.is_complete(template) {
        return Err(WorkflowError::NotComplete);
    }

    let fatal = instance.errors.iter().any(|e| e.is_fatal());

    let mut per_role: BTreeMap<Role, usize> = BTreeMap::new();
    for message in messages {
        *per_role.entry(message.from).or_default() += 1;
    }

    let done: std::collections::BTreeSet<&str> = instance
        .history
        .iter()
        .filter(|r| r.status == crate::instance::StageStatus::Complete)
        .map(|r| r.stage.as_str())
        .collect();

    let role_counts = per_role
        .iter()
        .map(|(role, n)| format!("{role}: {n}"))
        .collect::<Vec<_>>()
        .join(", ");

    let summary = format!(
        "{} workflow: {}/{} stages complete, {} messages ({})",
        template.name,
        done.len(),
        template.stage_count(),
        messages.len(),
        role_counts,
    );

    let artifacts: Vec<PathBuf> = messages
        .iter()
        .filter(|m| {
            matches!(
                m.message_type,
                MessageType::Artifact | MessageType::Result
            )
        })
        .flat_map(|m| m.content.attachments.iter().cloned())
        .collect();

    let findings: Vec<String> = messages
        .iter()
        .filter(|m| m.message_type == MessageType::Finding)
        .map(|m| m.content.subject.clone())
        .collect();

    Ok(WorkflowResult {
        success: !fatal,
        summary,
        artifacts,
        findings,
        errors: instance.errors.clone(),
    })
}

#[cfg(test)]
#[path = "synthesis_tests.rs"]
mod tests;
