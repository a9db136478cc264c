// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message routing: inbound message → declarative decisions.
//!
//! `route_message` is a pure function over the instance; the monitor loop
//! applies every decision for one message atomically (inbox writes, the
//! stage advance, agent patches) before looking at the next message.

use crate::instance::{StageOutput, WorkflowInstance};
use crate::template::{Verdict, WorkflowTemplate};
use crate::WorkflowError;
use chrono::{DateTime, Utc};
use swarm_core::{AgentStatus, Message, MessageType, Recipient, Role};

/// Complete the `from` stage with `output`, then move to `to`.
/// `to: None` means the instance is terminal after this advance.
#[derive(Debug, Clone, PartialEq)]
pub struct StageAdvance {
    pub from: String,
    pub output: StageOutput,
    pub to: Option<String>,
}

/// One side effect the monitor must apply.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    /// Enqueue a message into a role's inbox
    Deliver { target: Role, message: Message },
    /// Complete the current stage and move the instance
    Advance(StageAdvance),
    /// Patch an agent's lifecycle status
    SetAgentStatus { role: Role, status: AgentStatus },
}

/// Decide what to do with one outbox message.
///
/// Returns zero decisions for replays (already-processed ids) and for pure
/// status pings; `Unroutable` when the message fits nothing the current
/// stage expects.
pub fn route_message(
    template: &WorkflowTemplate,
    instance: &WorkflowInstance,
    message: &Message,
) -> Result<Vec<RoutingDecision>, WorkflowError> {
    if instance.is_processed(&message.id) {
        tracing::debug!(message_id = %message.id, "replayed message, ignoring");
        return Ok(Vec::new());
    }

    // Broadcast: one copy per template role except the sender, id and
    // timestamp untouched.
    if message.to == Recipient::Broadcast {
        let decisions = template
            .roles
            .iter()
            .copied()
            .filter(|role| *role != message.from)
            .map(|role| RoutingDecision::Deliver {
                target: role,
                message: readdress(message, role),
            })
            .collect();
        return Ok(decisions);
    }

    // Status pings only feed the activity watchdog.
    if message.message_type == MessageType::Status {
        return Ok(vec![RoutingDecision::SetAgentStatus {
            role: message.from,
            status: AgentStatus::Working,
        }]);
    }

    let stage = template
        .stage(&instance.current_stage)
        .ok_or_else(|| WorkflowError::UnknownStage(instance.current_stage.clone()))?;

    // The current stage's role emitting the stage's output category is a
    // stage completion.
    if message.from == stage.role && message.message_type == stage.output {
        let output = stage_output_from(message);
        let next = instance.next_stage(template, &output);

        let mut decisions = Vec::new();
        if let Some(next_id) = &next {
            let next_stage = template
                .stage(next_id)
                .ok_or_else(|| WorkflowError::UnknownStage(next_id.clone()))?;
            decisions.push(RoutingDecision::Deliver {
                target: next_stage.role,
                message: readdress(message, next_stage.role),
            });
            // Loop-backs keep the sender working; otherwise it is done with
            // its stage.
            let sender_status = if next_stage.role == message.from {
                AgentStatus::Working
            } else {
                AgentStatus::Complete
            };
            decisions.push(RoutingDecision::SetAgentStatus {
                role: message.from,
                status: sender_status,
            });
            decisions.push(RoutingDecision::SetAgentStatus {
                role: next_stage.role,
                status: AgentStatus::Working,
            });
        } else {
            decisions.push(RoutingDecision::SetAgentStatus {
                role: message.from,
                status: AgentStatus::Complete,
            });
        }
        decisions.push(RoutingDecision::Advance(StageAdvance {
            from: instance.current_stage.clone(),
            output,
            to: next,
        }));
        return Ok(decisions);
    }

    // Direct role-to-role traffic (questions, feedback) passes through.
    if let Recipient::Role(target) = message.to {
        if target.is_agent() {
            return Ok(vec![RoutingDecision::Deliver {
                target,
                message: message.clone(),
            }]);
        }
    }

    Err(WorkflowError::Unroutable(message.id.clone()))
}

/// Apply a stage advance to the instance: complete `from`, then start `to`
/// or mark the instance complete.
pub fn apply_advance(
    instance: &mut WorkflowInstance,
    template: &WorkflowTemplate,
    advance: &StageAdvance,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    instance.complete_stage(&advance.from, advance.output.clone(), now)?;
    match &advance.to {
        Some(next) => {
            instance.start_stage(template, next, now)?;
        }
        None => {
            instance.status = crate::instance::InstanceStatus::Complete;
        }
    }
    Ok(())
}

/// Same record, new destination. Id and timestamp stay identical so that
/// delivery is traceable back to the original emit.
fn readdress(message: &Message, target: Role) -> Message {
    let mut copy = message.clone();
    copy.to = Recipient::Role(target);
    copy
}

/// Derive a stage output record from the completing message.
fn stage_output_from(message: &Message) -> StageOutput {
    StageOutput {
        output_type: message.message_type,
        verdict: message.verdict().and_then(Verdict::parse),
        summary: Some(message.content.subject.clone()),
        metadata: message.content.metadata.clone(),
    }
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;
