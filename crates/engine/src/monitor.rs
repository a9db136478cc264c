// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The monitor loop: the periodic driver of a running session.
//!
//! Single-threaded cooperative scheduling: one logical loop, and nothing
//! else mutates session state while it runs. Each iteration drains the
//! outboxes in role order, applies routing decisions atomically per
//! message, runs health and timeout checks, and stops on completion.

use crate::controller::SessionController;
use crate::error::EngineError;
use crate::recovery::RecoveryContext;
use std::sync::atomic::Ordering;
use swarm_adapters::{MuxAdapter, MuxError, Notifier, WorktreeAdapter};
use swarm_bus::QueueKind;
use swarm_core::{
    AgentStatus, Clock, ErrorCode, ErrorRecord, IdGen, Message, PaneId, Role, SessionStatus,
    Severity, SwarmEvent,
};
use swarm_storage::CheckpointKind;
use swarm_workflow::{apply_advance, route_message, RoutingDecision, WorkflowError};

/// What one iteration concluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The workflow finished; the session moved to synthesizing
    pub completed: bool,
    /// The whole-workflow ceiling fired
    pub timed_out: bool,
    /// Recovery aborted the session
    pub aborted: bool,
}

impl TickOutcome {
    pub fn finished(&self) -> bool {
        self.completed || self.timed_out || self.aborted
    }
}

/// The background loop driven by `monitor_interval`.
pub(crate) async fn run<M, W, C, G, N>(controller: SessionController<M, W, C, G, N>)
where
    M: MuxAdapter,
    W: WorktreeAdapter,
    C: Clock,
    G: IdGen + 'static,
    N: Notifier,
{
    let interval = controller.inner().config.monitor_interval;
    loop {
        if controller.inner().stopping.load(Ordering::SeqCst) {
            break;
        }
        match tick(&controller).await {
            Ok(outcome) if outcome.completed => {
                if let Err(e) = controller.synthesize_result().await {
                    tracing::error!(error = %e, "synthesis failed");
                }
                break;
            }
            Ok(outcome) if outcome.finished() => break,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "monitor iteration failed");
            }
        }
        tokio::time::sleep(interval).await;
    }
    tracing::debug!("monitor loop ended");
}

/// One monitor iteration.
pub(crate) async fn tick<M, W, C, G, N>(
    controller: &SessionController<M, W, C, G, N>,
) -> Result<TickOutcome, EngineError>
where
    M: MuxAdapter,
    W: WorktreeAdapter,
    C: Clock,
    G: IdGen + 'static,
    N: Notifier,
{
    let mut outcome = TickOutcome::default();
    if controller.session_id().is_none() {
        return Ok(outcome);
    }

    // 1. Outbox drain, role-ordered
    let (events, stage_advanced) = drain_outboxes(controller)?;
    for event in events {
        controller.emit(event);
    }
    if stage_advanced && controller.inner().config.checkpoint_enabled {
        controller.checkpoint_now(CheckpointKind::StageBoundary).ok();
    }

    if controller.inner().stopping.load(Ordering::SeqCst) {
        return Ok(outcome);
    }

    // 2. Health checks
    for (error, ctx) in health_checks(controller).await? {
        controller.handle_error(error, ctx).await?;
        if controller.inner().stopping.load(Ordering::SeqCst) {
            outcome.aborted = true;
            return Ok(outcome);
        }
    }

    // 3. Completion check
    let (complete, timed_out) = {
        let inner = controller.inner();
        let mut guard = inner.state.lock();
        let Some(active) = guard.as_mut() else {
            return Ok(outcome);
        };
        let complete = active.instance.is_complete(&active.template);
        let now = inner.clock.now();
        let elapsed = now.signed_duration_since(active.session.started_at);
        let timed_out = !complete
            && elapsed.to_std().unwrap_or_default() > inner.config.workflow_timeout;
        if complete {
            active.session.status = SessionStatus::Synthesizing;
        }
        (complete, timed_out)
    };

    if complete {
        let session_id = controller.session_id().ok_or(EngineError::NoSession)?;
        controller
            .inner()
            .audit
            .update_session_status(&session_id, SessionStatus::Synthesizing, controller.inner().clock.now())?;
        controller.emit(SwarmEvent::WorkflowComplete {
            session_id: session_id.clone(),
        });
        outcome.completed = true;
        return Ok(outcome);
    }

    // 4. Whole-workflow timeout
    if timed_out {
        let error = ErrorRecord::new(
            ErrorCode::WorkflowTimeout,
            "monitor",
            "workflow exceeded its maximum duration",
        );
        controller
            .handle_error(error, RecoveryContext {
                role: None,
                operation: "workflow".to_string(),
                stage: None,
            })
            .await?;
        outcome.timed_out = true;
        return Ok(outcome);
    }

    // 5. Periodic checkpoint
    maybe_periodic_checkpoint(controller)?;

    Ok(outcome)
}

/// Route every fresh outbox message. Returns events to emit and whether
/// any stage advanced (for boundary checkpoints).
fn drain_outboxes<M, W, C, G, N>(
    controller: &SessionController<M, W, C, G, N>,
) -> Result<(Vec<SwarmEvent>, bool), EngineError>
where
    M: MuxAdapter,
    W: WorktreeAdapter,
    C: Clock,
    G: IdGen + 'static,
    N: Notifier,
{
    let inner = controller.inner();
    let mut events = Vec::new();
    let mut stage_advanced = false;

    let mut guard = inner.state.lock();
    let Some(active) = guard.as_mut() else {
        return Ok((events, stage_advanced));
    };
    let session_id = active.session.id.clone();
    // Role-ordered, plus the orchestrator's own outbox (broadcasts)
    let mut roles = active.template.roles.clone();
    if !roles.contains(&Role::Orchestrator) {
        roles.push(Role::Orchestrator);
    }

    for role in roles {
        let watermark = active.session.watermark(role);
        let mut fresh: Vec<Message> = inner
            .bus
            .read(QueueKind::Outbox, role)?
            .into_iter()
            .filter(|m| m.timestamp > watermark)
            .collect();
        // Emit order: timestamp, then id for equal timestamps
        fresh.sort_by(|a, b| a.emit_key().cmp(&b.emit_key()));

        for message in fresh {
            let now = inner.clock.now();
            inner.audit.record_message(&session_id, &message)?;

            match route_message(&active.template, &active.instance, &message) {
                Ok(decisions) => {
                    for decision in decisions {
                        match decision {
                            RoutingDecision::Deliver { target, message: delivery } => {
                                inner.bus.append(QueueKind::Inbox, target, &delivery)?;
                                events.push(SwarmEvent::MessageRouted {
                                    session_id: session_id.clone(),
                                    message_id: delivery.id.clone(),
                                    from: delivery.from,
                                    to: target,
                                });
                            }
                            RoutingDecision::Advance(advance) => {
                                if let Some(next) = &advance.to {
                                    events.push(SwarmEvent::StageTransition {
                                        session_id: session_id.clone(),
                                        from: advance.from.clone(),
                                        to: next.clone(),
                                    });
                                }
                                apply_advance(
                                    &mut active.instance,
                                    &active.template,
                                    &advance,
                                    now,
                                )?;
                                stage_advanced = true;
                            }
                            RoutingDecision::SetAgentStatus { role, status } => {
                                if let Some(handle) = active.session.agent_mut(role) {
                                    handle.status = status;
                                    handle.touch(now);
                                    let event = match status {
                                        AgentStatus::Working => Some(SwarmEvent::AgentWorking {
                                            session_id: session_id.clone(),
                                            role,
                                        }),
                                        AgentStatus::Complete => Some(SwarmEvent::AgentComplete {
                                            session_id: session_id.clone(),
                                            role,
                                        }),
                                        _ => None,
                                    };
                                    events.extend(event);
                                }
                            }
                        }
                    }
                    active.instance.mark_processed(&message.id);
                    if let Some(handle) = active.session.agent_mut(message.from) {
                        handle.record_message(now);
                    }
                }
                Err(WorkflowError::Unroutable(id)) => {
                    tracing::warn!(message_id = %id, "unroutable message dropped");
                    let error = ErrorRecord::new(
                        ErrorCode::RoutingFailed,
                        "monitor",
                        format!("message {id} fits no transition from {}", active.instance.current_stage),
                    )
                    .with_role(message.from)
                    .with_severity(Severity::Warning);
                    inner.audit.record_error(Some(&session_id), &error)?;
                    active.session.record_error(error);
                    active.instance.mark_processed(&message.id);
                }
                Err(e) => return Err(e.into()),
            }
            active.session.advance_watermark(role, message.timestamp);
        }
    }
    Ok((events, stage_advanced))
}

/// Watchdog and pane-presence checks. Pure detection; errors go to the
/// recovery engine.
async fn health_checks<M, W, C, G, N>(
    controller: &SessionController<M, W, C, G, N>,
) -> Result<Vec<(ErrorRecord, RecoveryContext)>, EngineError>
where
    M: MuxAdapter,
    W: WorktreeAdapter,
    C: Clock,
    G: IdGen + 'static,
    N: Notifier,
{
    let inner = controller.inner();
    let snapshot: Vec<(Role, PaneId, chrono::DateTime<chrono::Utc>, AgentStatus)> = {
        let guard = inner.state.lock();
        let Some(active) = guard.as_ref() else {
            return Ok(Vec::new());
        };
        active
            .session
            .agents
            .values()
            .map(|h| (h.role, h.pane.clone(), h.last_activity_at, h.status))
            .collect()
    };
    if snapshot.is_empty() {
        return Ok(Vec::new());
    }

    let session_id = controller.session_id().ok_or(EngineError::NoSession)?;
    let live_panes = match inner.mux.list_panes(&session_id.mux_session_name()).await {
        Ok(panes) => panes.into_iter().map(|p| p.id).collect::<Vec<_>>(),
        Err(MuxError::SessionNotFound(_)) | Err(MuxError::TmuxNotRunning) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let now = inner.clock.now();
    let mut failures = Vec::new();
    for (role, pane, last_activity, status) in snapshot {
        if !status.is_live() {
            continue;
        }
        if !live_panes.contains(&pane) {
            failures.push((
                ErrorRecord::new(
                    ErrorCode::AgentCrashed,
                    "monitor",
                    format!("pane {pane} is gone from the multiplexer"),
                )
                .with_role(role),
                RecoveryContext {
                    role: Some(role),
                    operation: "agent".to_string(),
                    stage: None,
                },
            ));
            // Invariant: a pane-less agent may not look alive
            let mut guard = inner.state.lock();
            if let Some(active) = guard.as_mut() {
                if let Some(handle) = active.session.agent_mut(role) {
                    handle.status = AgentStatus::Error;
                }
            }
            continue;
        }

        let idle = now.signed_duration_since(last_activity).to_std().unwrap_or_default();
        if status == AgentStatus::Working && idle > inner.config.agent_timeout {
            failures.push((
                ErrorRecord::new(
                    ErrorCode::AgentTimeout,
                    "monitor",
                    format!("no activity from {role} for {}s", idle.as_secs()),
                )
                .with_role(role),
                RecoveryContext {
                    role: Some(role),
                    operation: "agent_response".to_string(),
                    stage: None,
                },
            ));
        }
    }
    Ok(failures)
}

fn maybe_periodic_checkpoint<M, W, C, G, N>(
    controller: &SessionController<M, W, C, G, N>,
) -> Result<(), EngineError>
where
    M: MuxAdapter,
    W: WorktreeAdapter,
    C: Clock,
    G: IdGen + 'static,
    N: Notifier,
{
    let inner = controller.inner();
    if !inner.config.checkpoint_enabled {
        return Ok(());
    }
    let due = {
        let tracker = inner.tracker.lock();
        match tracker.last_checkpoint_at {
            Some(last) => {
                let since = inner.clock.now().signed_duration_since(last);
                since.to_std().unwrap_or_default() >= inner.config.checkpoint_interval
            }
            None => true,
        }
    };
    if due {
        controller.checkpoint_now(CheckpointKind::Periodic)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
