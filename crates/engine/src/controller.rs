// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session controller: the facade over every subsystem.
//!
//! Mints the single session id, sequences worktrees → mux → agents on
//! start, owns the shared session state, applies recovery outcomes
//! verbatim, and emits the event stream the CLI renders.

use crate::config::SwarmConfig;
use crate::error::EngineError;
use crate::monitor;
use crate::recovery::{
    self, RecoveryAction, RecoveryContext, RecoveryOutcome, RecoveryTracker, RetryPolicy,
};
use crate::spawner::AgentSpawner;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use swarm_adapters::{MuxAdapter, MuxError, Notifier, WorktreeAdapter};
use swarm_bus::{MessageStore, QueueKind};
use swarm_core::{
    AgentStatus, Clock, ErrorCode, ErrorRecord, IdGen, Message, MessageType, Priority, Role,
    Session, SessionId, SessionStatus, SwarmEvent,
};
use swarm_storage::{AuditStore, Checkpoint, CheckpointKind, QueueSnapshot};
use swarm_workflow::{
    synthesize, WorkflowError, WorkflowInstance, WorkflowResult, WorkflowTemplate,
};
use tokio::sync::broadcast;

/// Everything that varies per live session.
pub struct ActiveSession {
    pub session: Session,
    pub template: WorkflowTemplate,
    pub instance: WorkflowInstance,
}

/// Shared state behind the controller and the monitor task.
pub(crate) struct Inner<M, W, C, G, N> {
    pub(crate) config: SwarmConfig,
    pub(crate) clock: C,
    pub(crate) idgen: G,
    pub(crate) notifier: N,
    pub(crate) mux: M,
    pub(crate) worktrees: W,
    pub(crate) bus: MessageStore,
    pub(crate) audit: AuditStore,
    pub(crate) spawner: AgentSpawner<M, W, C>,
    pub(crate) events: broadcast::Sender<SwarmEvent>,
    pub(crate) state: Mutex<Option<ActiveSession>>,
    pub(crate) tracker: Mutex<RecoveryTracker>,
    pub(crate) stopping: AtomicBool,
    monitor_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    session_root: PathBuf,
}

/// The public facade. Cheap to clone.
pub struct SessionController<M, W, C, G, N> {
    inner: Arc<Inner<M, W, C, G, N>>,
}

impl<M, W, C, G, N> Clone for SessionController<M, W, C, G, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M, W, C, G, N> SessionController<M, W, C, G, N>
where
    M: MuxAdapter,
    W: WorktreeAdapter,
    C: Clock,
    G: IdGen + 'static,
    N: Notifier,
{
    pub fn new(
        config: SwarmConfig,
        session_root: impl AsRef<Path>,
        mux: M,
        worktrees: W,
        bus: MessageStore,
        audit: AuditStore,
        clock: C,
        idgen: G,
        notifier: N,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let spawner = AgentSpawner::new(
            mux.clone(),
            worktrees.clone(),
            clock.clone(),
            bus.clone(),
            audit.clone(),
            config.clone(),
        );
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                idgen,
                notifier,
                mux,
                worktrees,
                bus,
                audit,
                spawner,
                events,
                state: Mutex::new(None),
                tracker: Mutex::new(RecoveryTracker::new()),
                stopping: AtomicBool::new(false),
                monitor_task: Mutex::new(None),
                session_root: session_root.as_ref().to_path_buf(),
            }),
        }
    }

    /// Subscribe to the event stream. Best-effort delivery; lagging
    /// receivers drop events rather than blocking the monitor.
    pub fn events(&self) -> broadcast::Receiver<SwarmEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .state
            .lock()
            .as_ref()
            .is_some_and(|active| !active.session.status.is_terminal())
    }

    pub fn get_session(&self) -> Option<Session> {
        self.inner.state.lock().as_ref().map(|a| a.session.clone())
    }

    pub fn get_instance(&self) -> Option<WorkflowInstance> {
        self.inner.state.lock().as_ref().map(|a| a.instance.clone())
    }

    /// Start a workflow. Performs the full sequence: id mint, template
    /// load, audit row, queue dirs, mux session, worktrees, agent spawns,
    /// initial task delivery, monitor start.
    pub async fn start_workflow(&self, kind: &str, goal: &str) -> Result<SessionId, EngineError> {
        let inner = &self.inner;

        // 1. One active session per process
        if self.is_running() {
            let id = self
                .get_session()
                .map(|s| s.id.to_string())
                .unwrap_or_default();
            return Err(EngineError::SessionActive(id));
        }
        if goal.trim().is_empty() {
            return Err(EngineError::EmptyGoal);
        }
        let template = swarm_workflow::template(kind)
            .ok_or_else(|| WorkflowError::TemplateNotFound(kind.to_string()))?;
        template.validate()?;

        // 2. The single id mint: decimal milliseconds
        let now = inner.clock.now();
        let id = SessionId::parse(&now.timestamp_millis().to_string())
            .map_err(|e| EngineError::SessionFailed(e.to_string()))?;

        // 3. Audit row, queue files, workflow instance
        inner
            .audit
            .insert_session(&id, &template.name, goal, SessionStatus::Initializing, now)?;
        inner.bus.ensure_dirs()?;
        let mut instance = WorkflowInstance::new(&template, id.clone(), goal);
        let mut session = Session::new(id.clone(), template.name.clone(), goal, now);

        // 4. Multiplexer session, recovery-mediated
        if let Err(e) = self.create_mux_session_with_recovery(&id).await {
            inner
                .audit
                .update_session_status(&id, SessionStatus::Failed, inner.clock.now())?;
            return Err(e);
        }

        // 5. Worktrees for every agent role, all-or-nothing
        let agent_roles: Vec<Role> = template.roles.iter().copied().filter(|r| r.is_agent()).collect();
        if let Err(e) = inner.worktrees.create_all(&agent_roles, &id).await {
            let _ = inner.mux.kill_session(&id.mux_session_name()).await;
            inner
                .audit
                .update_session_status(&id, SessionStatus::Failed, inner.clock.now())?;
            return Err(e.into());
        }

        // 6. Spawn agents in template order, recovery-mediated
        for role in &agent_roles {
            match self.spawn_with_recovery(&id, *role).await {
                Ok(handle) => {
                    self.emit(SwarmEvent::AgentSpawned {
                        session_id: id.clone(),
                        role: *role,
                        pane: handle.pane.clone(),
                    });
                    self.emit(SwarmEvent::AgentReady {
                        session_id: id.clone(),
                        role: *role,
                    });
                    session.agents.insert(*role, handle);
                }
                Err(error) => {
                    session.record_error(error.clone());
                    let degraded_ok = inner.config.allow_partial
                        && recovery::apply_degradation(
                            &mut session,
                            &template,
                            &instance,
                            *role,
                            error.code,
                        );
                    if !degraded_ok {
                        self.teardown_resources(&id, &agent_roles).await;
                        inner.audit.update_session_status(
                            &id,
                            SessionStatus::Failed,
                            inner.clock.now(),
                        )?;
                        return Err(EngineError::SessionFailed(error.log_summary()));
                    }
                }
            }
        }

        // 7. Kick off the entry stage and deliver the goal
        let entry = template.entry.clone();
        instance.start_stage(&template, &entry, inner.clock.now())?;
        let entry_role = template
            .stage(&entry)
            .map(|s| s.role)
            .unwrap_or(Role::Researcher);
        let task = Message::new(
            inner.idgen.next(),
            inner.clock.now(),
            Role::Orchestrator,
            entry_role,
            MessageType::Task,
            goal,
            format!("Workflow goal: {goal}"),
        )
        .with_priority(Priority::High);
        self.inner
            .spawner
            .send_to_agent(&id, entry_role, &task)
            .await
            .map_err(|e| EngineError::SessionFailed(e.log_summary()))?;

        // 8. Go live
        session.status = SessionStatus::Running;
        inner
            .audit
            .update_session_status(&id, SessionStatus::Running, inner.clock.now())?;
        *inner.state.lock() = Some(ActiveSession {
            session,
            template,
            instance,
        });
        self.checkpoint_now(CheckpointKind::SessionStart)?;

        inner.stopping.store(false, Ordering::SeqCst);
        if inner.config.monitor_autostart {
            self.start_monitor();
        }
        self.emit(SwarmEvent::SessionStarted {
            session_id: id.clone(),
            workflow: kind.to_string(),
            goal: goal.to_string(),
        });
        tracing::info!(session_id = %id, workflow = kind, "session started");
        Ok(id)
    }

    /// Resume a previous session from its latest checkpoint.
    ///
    /// Messages recorded in `processedMessageIds` are not routed again;
    /// the monitor picks up from the persisted watermarks.
    pub async fn resume(&self, session_id: &SessionId) -> Result<(), EngineError> {
        let inner = &self.inner;
        if self.is_running() {
            return Err(EngineError::SessionActive(session_id.to_string()));
        }
        let row = inner
            .audit
            .get_session(session_id)?
            .ok_or(EngineError::NoSession)?;
        let checkpoint = inner
            .audit
            .latest_checkpoint(session_id)?
            .ok_or(EngineError::NoSession)?;

        let template = swarm_workflow::template(&row.workflow_type)
            .ok_or_else(|| WorkflowError::TemplateNotFound(row.workflow_type.clone()))?;
        let instance = checkpoint.workflow.clone();

        let now = inner.clock.now();
        let mut session = Session::new(session_id.clone(), template.name.clone(), row.goal.clone(), now);
        session.status = SessionStatus::Running;
        for (role, queue) in &checkpoint.queues {
            if let Some(mark) = queue.last_processed {
                session.advance_watermark(*role, mark);
            }
        }

        inner.bus.ensure_dirs()?;
        // The mux session may have survived the previous process; anything
        // else goes through recovery like a fresh create
        match self.create_mux_session_with_recovery(session_id).await {
            Ok(()) | Err(EngineError::Mux(MuxError::SessionExists(_))) => {}
            Err(e) => return Err(e),
        }
        let agent_roles: Vec<Role> =
            template.roles.iter().copied().filter(|r| r.is_agent()).collect();
        for role in &agent_roles {
            if inner.worktrees.get(*role, session_id).await.is_err() {
                inner.worktrees.create(*role, session_id).await?;
            }
            match self.spawn_with_recovery(session_id, *role).await {
                Ok(handle) => {
                    session.agents.insert(*role, handle);
                }
                Err(error) => {
                    session.record_error(error.clone());
                    if !recovery::apply_degradation(
                        &mut session,
                        &template,
                        &instance,
                        *role,
                        error.code,
                    ) {
                        self.teardown_resources(session_id, &agent_roles).await;
                        return Err(EngineError::SessionFailed(error.log_summary()));
                    }
                }
            }
        }

        inner
            .audit
            .update_session_status(session_id, SessionStatus::Running, now)?;
        *inner.state.lock() = Some(ActiveSession {
            session,
            template,
            instance,
        });
        inner.stopping.store(false, Ordering::SeqCst);
        if inner.config.monitor_autostart {
            self.start_monitor();
        }
        self.emit(SwarmEvent::SessionStarted {
            session_id: session_id.clone(),
            workflow: row.workflow_type,
            goal: row.goal,
        });
        tracing::info!(session_id = %session_id, "session resumed from checkpoint");
        Ok(())
    }

    /// Create the multiplexer session, retried per the recovery engine's
    /// decisions (`TMUX_SESSION_FAILED` retries before giving up).
    ///
    /// `SESSION_EXISTS` is not a transient fault; it comes back unchanged
    /// for the caller to interpret.
    async fn create_mux_session_with_recovery(
        &self,
        session_id: &SessionId,
    ) -> Result<(), EngineError> {
        let inner = &self.inner;
        let ctx = RecoveryContext {
            role: None,
            operation: "create_mux_session".to_string(),
            stage: None,
        };
        let mut attempt: u32 = 0;
        let mut prior_failure: Option<String> = None;
        loop {
            match inner.mux.create_session(&session_id.mux_session_name()).await {
                Ok(_) => {
                    if let Some(error_id) = prior_failure {
                        inner
                            .audit
                            .mark_error_recovered(&error_id, "retry", true)
                            .ok();
                    }
                    return Ok(());
                }
                Err(MuxError::SessionExists(name)) => {
                    return Err(MuxError::SessionExists(name).into());
                }
                Err(e) => {
                    let mut error = EngineError::Mux(e).to_record("controller");
                    error.retry_count = attempt;
                    inner.audit.record_error(Some(session_id), &error).ok();
                    let (outcome, strategy) = inner.tracker.lock().decide(&error, &ctx);
                    self.run_actions(error.code, attempt + 1).await;
                    match outcome {
                        RecoveryOutcome::RetryOperation { .. } => {
                            prior_failure = Some(error.id.clone());
                            attempt += 1;
                            continue;
                        }
                        _ => {
                            error.note_recovery(strategy.name(), false);
                            return Err(EngineError::SessionFailed(error.log_summary()));
                        }
                    }
                }
            }
        }
    }

    /// One spawn, retried per the recovery engine's decisions.
    async fn spawn_with_recovery(
        &self,
        session_id: &SessionId,
        role: Role,
    ) -> Result<swarm_core::AgentHandle, ErrorRecord> {
        let inner = &self.inner;
        let ctx = RecoveryContext {
            role: Some(role),
            operation: "spawn_agent".to_string(),
            stage: None,
        };
        let mut attempt: u32 = 0;
        let mut prior_failure: Option<String> = None;
        loop {
            match inner.spawner.spawn(session_id, role, true, "").await {
                Ok(handle) => {
                    // A retried spawn that finally worked recovered the
                    // previous attempt's error
                    if let Some(error_id) = prior_failure {
                        inner
                            .audit
                            .mark_error_recovered(&error_id, "retry", true)
                            .ok();
                    }
                    return Ok(handle);
                }
                Err(mut error) => {
                    error.retry_count = attempt;
                    inner.audit.record_error(Some(session_id), &error).ok();
                    let (outcome, strategy) = inner.tracker.lock().decide(&error, &ctx);
                    self.run_actions(error.code, attempt + 1).await;
                    match outcome {
                        RecoveryOutcome::RetryOperation { .. }
                        | RecoveryOutcome::RestartAgent { .. } => {
                            prior_failure = Some(error.id.clone());
                            attempt += 1;
                            continue;
                        }
                        _ => {
                            error.note_recovery(strategy.name(), false);
                            return Err(error);
                        }
                    }
                }
            }
        }
    }

    /// Execute a plan's side actions (log, notify, wait).
    pub(crate) async fn run_actions(&self, code: ErrorCode, attempt: u32) {
        let plan = recovery::plan_for(code);
        // Operator-tuned base delay; the rate-limit preset keeps its own
        let policy = if code == ErrorCode::RateLimited {
            plan.policy.clone()
        } else {
            RetryPolicy {
                initial_delay: self.inner.config.retry_delay,
                ..plan.policy.clone()
            }
        };
        for action in &plan.actions {
            match action {
                RecoveryAction::Log => {
                    tracing::warn!(code = %code, attempt, "recovery action");
                }
                RecoveryAction::Notify => {
                    self.inner
                        .notifier
                        .notify("swarm recovery", &format!("{code} (attempt {attempt})"))
                        .await;
                }
                RecoveryAction::Wait(_) => {
                    tokio::time::sleep(policy.delay(attempt)).await;
                }
                RecoveryAction::Execute | RecoveryAction::Cleanup => {
                    // Applied by the outcome itself
                }
            }
        }
    }

    /// Centralised error funnel: checkpoint, decide, act, apply.
    pub(crate) async fn handle_error(
        &self,
        mut error: ErrorRecord,
        ctx: RecoveryContext,
    ) -> Result<(), EngineError> {
        let inner = &self.inner;
        tracing::warn!(code = %error.code, "{}", error.log_summary());

        if inner.config.checkpoint_enabled {
            self.checkpoint_now(CheckpointKind::PreRecovery).ok();
        }
        inner.audit.record_error(self.session_id().as_ref(), &error)?;
        if let (Some(session_id), Some(role)) = (self.session_id(), error.role) {
            self.emit(SwarmEvent::AgentError {
                session_id,
                role,
                code: error.code,
            });
        }
        {
            let mut guard = inner.state.lock();
            if let Some(active) = guard.as_mut() {
                if let Some(role) = error.role {
                    if let Some(handle) = active.session.agent_mut(role) {
                        handle.record_error();
                    }
                }
                active.session.record_error(error.clone());
                active.instance.record_error(error.clone());
            }
        }

        // Recurring failures (watchdog, crash checks) arrive as fresh
        // records; the per-agent attempt count is the real retry history
        if let Some(role) = ctx.role {
            error.retry_count = error.retry_count.max(inner.tracker.lock().attempts_for(role));
        }
        let (outcome, strategy) = inner.tracker.lock().decide(&error, &ctx);
        self.run_actions(error.code, error.retry_count + 1).await;
        let succeeded = self.apply_outcome(&outcome, &ctx).await?;

        error.note_recovery(strategy.name(), succeeded);
        inner
            .audit
            .mark_error_recovered(&error.id, strategy.name(), succeeded)?;
        {
            let mut guard = inner.state.lock();
            if let Some(active) = guard.as_mut() {
                if let Some(recorded) = active
                    .session
                    .errors
                    .iter_mut()
                    .rev()
                    .find(|e| e.id == error.id)
                {
                    recorded.note_recovery(strategy.name(), succeeded);
                }
                if let Some(in_instance) = active
                    .instance
                    .errors
                    .iter_mut()
                    .rev()
                    .find(|e| e.id == error.id)
                {
                    in_instance.note_recovery(strategy.name(), succeeded);
                }
            }
        }
        Ok(())
    }

    /// Apply a recovery outcome verbatim. Returns whether it succeeded.
    async fn apply_outcome(
        &self,
        outcome: &RecoveryOutcome,
        ctx: &RecoveryContext,
    ) -> Result<bool, EngineError> {
        let inner = &self.inner;
        match outcome {
            RecoveryOutcome::RetryOperation { operation } => {
                // For watchdog-driven errors the retried operation is the
                // wait itself: re-arm the activity clock
                if let Some(role) = ctx.role {
                    let mut guard = inner.state.lock();
                    if let Some(active) = guard.as_mut() {
                        if let Some(handle) = active.session.agent_mut(role) {
                            handle.touch(inner.clock.now());
                        }
                    }
                }
                tracing::info!(operation = %operation, "operation re-armed for retry");
                Ok(true)
            }

            RecoveryOutcome::RestartAgent { role } => self.restart_agent(*role).await,

            RecoveryOutcome::SkipStage { stage } => {
                let (stage_id, optional) = {
                    let mut guard = inner.state.lock();
                    let Some(active) = guard.as_mut() else {
                        return Ok(false);
                    };
                    let stage_id = stage.clone().unwrap_or(active.instance.current_stage.clone());
                    let optional = match active.template.stage(&stage_id) {
                        Some(def) => def.optional,
                        None => return Ok(false),
                    };
                    (stage_id, optional)
                };
                if !optional {
                    self.abort_session("required stage cannot be skipped").await?;
                    return Ok(false);
                }
                let mut guard = inner.state.lock();
                let Some(active) = guard.as_mut() else {
                    return Ok(false);
                };
                let now = inner.clock.now();
                active.instance.skip_stage(&active.template, &stage_id, now)?;
                active.session.degradation.skipped_stages.insert(stage_id.clone());
                // Move on to the unconditional successor, completion if none
                let next = active
                    .template
                    .transitions_from(&stage_id)
                    .find(|t| {
                        matches!(
                            t.guard,
                            swarm_workflow::Guard::Always | swarm_workflow::Guard::OnComplete
                        )
                    })
                    .map(|t| t.to.clone())
                    .unwrap_or(active.template.completion.clone());
                if active.instance.current_stage == stage_id {
                    active.instance.start_stage(&active.template, &next, now)?;
                }
                tracing::info!(stage = %stage_id, next = %next, "stage skipped");
                Ok(true)
            }

            RecoveryOutcome::Escalate { message } => {
                inner.notifier.notify("swarm needs attention", message).await;
                if let Some(role) = ctx.role {
                    let mut guard = inner.state.lock();
                    if let Some(active) = guard.as_mut() {
                        if let Some(handle) = active.session.agent_mut(role) {
                            handle.status = AgentStatus::Blocked;
                        }
                    }
                }
                // The error stands until a human intervenes
                Ok(false)
            }

            RecoveryOutcome::Abort { reason } => {
                self.abort_session(reason).await?;
                Ok(false)
            }
        }
    }

    /// Terminate and re-spawn one agent on its existing worktree, then
    /// make sure its last task is still deliverable.
    async fn restart_agent(&self, role: Role) -> Result<bool, EngineError> {
        let inner = &self.inner;
        let Some(session_id) = self.session_id() else {
            return Ok(false);
        };

        let old = {
            let mut guard = inner.state.lock();
            guard
                .as_mut()
                .and_then(|active| active.session.agents.remove(&role))
        };
        if let Some(old) = &old {
            inner.spawner.terminate(&session_id, old).await;
        }

        match inner.spawner.spawn(&session_id, role, true, "").await {
            Ok(handle) => {
                // Redeliver the last task if the inbox came up empty
                let inbox = inner.bus.read(QueueKind::Inbox, role)?;
                if inbox.is_empty() {
                    let history = inner.audit.messages_for_session(&session_id, None)?;
                    if let Some(last) = history
                        .iter()
                        .rev()
                        .find(|m| m.to == swarm_core::Recipient::Role(role))
                    {
                        inner.bus.append(QueueKind::Inbox, role, last)?;
                        tracing::info!(role = %role, message_id = %last.id, "task redelivered");
                    }
                }
                self.emit(SwarmEvent::AgentSpawned {
                    session_id: session_id.clone(),
                    role,
                    pane: handle.pane.clone(),
                });
                self.emit(SwarmEvent::AgentReady {
                    session_id: session_id.clone(),
                    role,
                });
                let mut guard = inner.state.lock();
                if let Some(active) = guard.as_mut() {
                    active.session.agents.insert(role, handle);
                }
                Ok(true)
            }
            Err(error) => {
                tracing::error!(role = %role, "restart failed: {}", error.log_summary());
                inner.audit.record_error(Some(&session_id), &error).ok();
                let can_continue = {
                    let mut guard = inner.state.lock();
                    match guard.as_mut() {
                        Some(active) => {
                            let ActiveSession {
                                session,
                                template,
                                instance,
                            } = active;
                            session.record_error(error.clone());
                            recovery::apply_degradation(
                                session, template, instance, role, error.code,
                            )
                        }
                        None => false,
                    }
                };
                if !can_continue {
                    self.abort_session("agent restart failed for a required role").await?;
                }
                Ok(false)
            }
        }
    }

    /// Fail the session: partial result, resource teardown, terminal state.
    pub(crate) async fn abort_session(&self, reason: &str) -> Result<(), EngineError> {
        let inner = &self.inner;
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };
        tracing::error!(session_id = %session_id, reason, "aborting session");
        inner.stopping.store(true, Ordering::SeqCst);

        let roles: Vec<Role> = {
            let mut guard = inner.state.lock();
            match guard.as_mut() {
                Some(active) => {
                    active.session.end(SessionStatus::Failed, inner.clock.now());
                    active.session.agents.keys().copied().collect()
                }
                None => Vec::new(),
            }
        };
        self.write_partial_result(reason).ok();
        self.teardown_resources(&session_id, &roles).await;
        inner
            .audit
            .update_session_status(&session_id, SessionStatus::Failed, inner.clock.now())?;
        self.emit(SwarmEvent::SessionEnded {
            session_id,
            status: SessionStatus::Failed,
        });
        Ok(())
    }

    /// Kill mux session and remove worktrees. Safe on partial state.
    async fn teardown_resources(&self, session_id: &SessionId, roles: &[Role]) {
        let inner = &self.inner;
        if let Err(e) = inner.mux.kill_session(&session_id.mux_session_name()).await {
            tracing::warn!(error = %e, "mux teardown failed");
        }
        inner.worktrees.remove_all(roles, session_id).await;
    }

    /// Graceful stop: monitor halt, interrupts, bounded wait, teardown.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.shutdown(true).await
    }

    /// Immediate stop: no interrupts, no waiting.
    pub async fn kill(&self) -> Result<(), EngineError> {
        self.shutdown(false).await
    }

    async fn shutdown(&self, graceful: bool) -> Result<(), EngineError> {
        let inner = &self.inner;
        inner.stopping.store(true, Ordering::SeqCst);
        let task = inner.monitor_task.lock().take();
        if let Some(task) = task {
            if graceful {
                // The loop notices the flag between substeps; never abort a
                // write in flight
                let grace = inner.config.monitor_interval * 2;
                if tokio::time::timeout(grace, task).await.is_err() {
                    tracing::warn!("monitor did not stop within the grace window");
                }
            } else {
                task.abort();
            }
        }

        let Some(session_id) = self.session_id() else {
            return Ok(());
        };
        let (roles, handles, already_terminal) = {
            let guard = inner.state.lock();
            match guard.as_ref() {
                Some(active) => (
                    active.session.agents.keys().copied().collect::<Vec<_>>(),
                    active.session.agents.values().cloned().collect::<Vec<_>>(),
                    active.session.status.is_terminal(),
                ),
                None => return Ok(()),
            }
        };

        if graceful {
            for handle in &handles {
                inner.spawner.terminate(&session_id, handle).await;
            }
        }
        self.teardown_resources(&session_id, &roles).await;

        let final_status = {
            let mut guard = inner.state.lock();
            match guard.as_mut() {
                Some(active) => {
                    if !already_terminal {
                        active
                            .session
                            .end(SessionStatus::Cancelled, inner.clock.now());
                    }
                    for handle in active.session.agents.values_mut() {
                        handle.status = AgentStatus::Terminated;
                    }
                    active.session.status
                }
                None => SessionStatus::Cancelled,
            }
        };
        if !already_terminal {
            inner
                .audit
                .update_session_status(&session_id, final_status, inner.clock.now())?;
        }
        self.emit(SwarmEvent::SessionEnded {
            session_id,
            status: final_status,
        });
        Ok(())
    }

    /// Idempotent resource cleanup, tolerant of partial prior cleanups.
    pub async fn cleanup(&self) -> Result<(), EngineError> {
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };
        let roles: Vec<Role> = Role::AGENTS.to_vec();
        self.teardown_resources(&session_id, &roles).await;
        Ok(())
    }

    /// Synthesize the final result for a completed instance, write it to
    /// `outputs/{sessionId}/result.json`, and close the session.
    pub async fn synthesize_result(&self) -> Result<WorkflowResult, EngineError> {
        let inner = &self.inner;
        let session_id = self.session_id().ok_or(EngineError::NoSession)?;
        let messages = inner.audit.messages_for_session(&session_id, None)?;

        let result = {
            let guard = inner.state.lock();
            let active = guard.as_ref().ok_or(EngineError::NoSession)?;
            synthesize(&active.template, &active.instance, &messages)?
        };

        let out_dir = inner.session_root.join("outputs").join(session_id.as_str());
        if let Err(e) = std::fs::create_dir_all(&out_dir)
            .and_then(|_| {
                std::fs::write(
                    out_dir.join("result.json"),
                    serde_json::to_string_pretty(&result).unwrap_or_default(),
                )
            })
        {
            tracing::warn!(error = %e, "could not write result file");
        }

        {
            let mut guard = inner.state.lock();
            if let Some(active) = guard.as_mut() {
                active.session.end(SessionStatus::Complete, inner.clock.now());
            }
        }
        inner
            .audit
            .update_session_status(&session_id, SessionStatus::Complete, inner.clock.now())?;
        self.emit(SwarmEvent::SessionEnded {
            session_id,
            status: SessionStatus::Complete,
        });
        Ok(result)
    }

    /// Best-effort partial result on abort.
    fn write_partial_result(&self, reason: &str) -> Result<(), EngineError> {
        let inner = &self.inner;
        let guard = inner.state.lock();
        let Some(active) = guard.as_ref() else {
            return Ok(());
        };
        let messages = inner
            .audit
            .messages_for_session(&active.session.id, None)
            .unwrap_or_default();
        let result = WorkflowResult {
            success: false,
            summary: format!(
                "{} workflow aborted at stage {}: {reason}",
                active.template.name, active.instance.current_stage
            ),
            artifacts: Vec::new(),
            findings: messages
                .iter()
                .filter(|m| m.message_type == MessageType::Finding)
                .map(|m| m.content.subject.clone())
                .collect(),
            errors: active.session.errors.clone(),
        };
        let out_dir = inner
            .session_root
            .join("outputs")
            .join(active.session.id.as_str());
        std::fs::create_dir_all(&out_dir)
            .and_then(|_| {
                std::fs::write(
                    out_dir.join("result.json"),
                    serde_json::to_string_pretty(&result).unwrap_or_default(),
                )
            })
            .map_err(|e| {
                EngineError::Bus(swarm_bus::BusError::Io {
                    path: out_dir,
                    source: e,
                })
            })?;
        Ok(())
    }

    /// Take a checkpoint of the live session right now.
    pub fn checkpoint_now(&self, kind: CheckpointKind) -> Result<(), EngineError> {
        let inner = &self.inner;
        let guard = inner.state.lock();
        let Some(active) = guard.as_ref() else {
            return Err(EngineError::NoSession);
        };

        let mut queues = BTreeMap::new();
        for role in &active.template.roles {
            let inbox = inner.bus.stats(QueueKind::Inbox, *role)?;
            let outbox = inner.bus.stats(QueueKind::Outbox, *role)?;
            let mark = active.session.outbox_watermarks.get(role).copied();
            queues.insert(
                *role,
                QueueSnapshot {
                    inbox_count: inbox.count,
                    outbox_count: outbox.count,
                    last_processed: mark,
                },
            );
        }

        let checkpoint = Checkpoint::build(
            inner.idgen.next(),
            kind,
            "recovery",
            &active.session,
            &active.instance,
            &active.template,
            queues,
            inner.clock.now(),
        );
        inner.audit.insert_checkpoint(&checkpoint)?;
        inner.audit.prune_checkpoints(&active.session.id, 10)?;
        inner.tracker.lock().last_checkpoint_at = Some(inner.clock.now());
        tracing::debug!(kind = kind.as_str(), "checkpoint written");
        Ok(())
    }

    /// One monitor iteration, exposed for deterministic tests and the loop.
    pub async fn tick(&self) -> Result<monitor::TickOutcome, EngineError> {
        monitor::tick(self).await
    }

    fn start_monitor(&self) {
        let controller = self.clone();
        let task = tokio::spawn(async move {
            monitor::run(controller).await;
        });
        *self.inner.monitor_task.lock() = Some(task);
    }

    pub(crate) fn session_id(&self) -> Option<SessionId> {
        self.inner
            .state
            .lock()
            .as_ref()
            .map(|active| active.session.id.clone())
    }

    pub(crate) fn emit(&self, event: SwarmEvent) {
        let _ = self.inner.events.send(event);
    }

    pub(crate) fn inner(&self) -> &Inner<M, W, C, G, N> {
        &self.inner
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
