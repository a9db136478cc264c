// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle: turn a bare role name into a running, responsive agent.
//!
//! Spawn = pane + worktree + assistant start + readiness detection. The
//! pane is never used for message passing; agents poll their inbox files
//! on their own, so `send_to_agent` writes to the queue and the audit log.

use crate::config::SwarmConfig;
use std::sync::LazyLock;
use swarm_adapters::{MuxAdapter, WorktreeAdapter};
use swarm_bus::{MessageStore, QueueKind};
use swarm_core::{
    AgentHandle, AgentStatus, Clock, ErrorCode, ErrorRecord, Message, Role, SessionId,
};
use swarm_storage::{ActivityKind, AuditStore};

/// Heuristic for "the assistant is up": its banner or prompt glyphs.
#[allow(clippy::unwrap_used)] // the pattern is a literal
static READY_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)(welcome to claude|claude code|│\s*>|❯|✻)").unwrap()
});

/// Shell-prompt heuristic used during teardown.
fn looks_like_shell_prompt(tail: &str) -> bool {
    tail.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| {
            let trimmed = line.trim_end();
            trimmed.ends_with('$') || trimmed.ends_with('%') || trimmed.ends_with('#')
        })
        .unwrap_or(false)
}

/// Quote a prompt for `claude -p "..."`.
fn shell_quote(prompt: &str) -> String {
    let mut quoted = String::with_capacity(prompt.len() + 2);
    quoted.push('"');
    for c in prompt.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// The assistant invocation. Resume is the default so the assistant picks
/// up the worktree's prompt file as persistent context.
pub fn spawn_command(resume: bool, prompt: &str) -> String {
    if resume {
        "claude --resume".to_string()
    } else {
        format!("claude -p {}", shell_quote(prompt))
    }
}

/// Spawns and terminates agents for one session.
#[derive(Clone)]
pub struct AgentSpawner<M, W, C> {
    mux: M,
    worktrees: W,
    clock: C,
    bus: MessageStore,
    audit: AuditStore,
    config: SwarmConfig,
}

impl<M: MuxAdapter, W: WorktreeAdapter, C: Clock> AgentSpawner<M, W, C> {
    pub fn new(
        mux: M,
        worktrees: W,
        clock: C,
        bus: MessageStore,
        audit: AuditStore,
        config: SwarmConfig,
    ) -> Self {
        Self {
            mux,
            worktrees,
            clock,
            bus,
            audit,
            config,
        }
    }

    /// Spawn an agent for `role`. On failure the half-made pane is killed
    /// and an `AGENT_SPAWN_FAILED` record comes back.
    pub async fn spawn(
        &self,
        session_id: &SessionId,
        role: Role,
        resume: bool,
        prompt: &str,
    ) -> Result<AgentHandle, ErrorRecord> {
        let mux_session = session_id.mux_session_name();
        let fail = |message: String| {
            ErrorRecord::new(ErrorCode::AgentSpawnFailed, "spawner", message).with_role(role)
        };

        // 1. The worktree and its prompt file must already exist
        let worktree = self
            .worktrees
            .get(role, session_id)
            .await
            .map_err(|e| fail(format!("worktree missing: {e}")))?;

        // 2. A fresh pane in the session
        let pane = self
            .mux
            .create_pane(&mux_session, true, None)
            .await
            .map_err(|e| fail(format!("pane creation failed: {e}")))?;

        let mut handle = AgentHandle::new(role, pane.clone(), worktree.path.clone(), self.clock.now());
        self.audit
            .record_activity(
                session_id,
                role,
                ActivityKind::Spawned,
                &serde_json::json!({ "pane": pane.as_str() }),
                self.clock.now(),
            )
            .map_err(|e| fail(format!("audit write failed: {e}")))?;

        // 3. cd into the worktree, give the shell a beat
        let result = self.start_assistant(&mux_session, &handle, resume, prompt).await;
        if let Err(message) = result {
            let _ = self.mux.kill_pane(&mux_session, &handle.pane).await;
            handle.status = AgentStatus::Error;
            return Err(fail(message));
        }

        handle.status = AgentStatus::Ready;
        handle.touch(self.clock.now());
        self.audit
            .record_activity(
                session_id,
                role,
                ActivityKind::Ready,
                &serde_json::json!({}),
                self.clock.now(),
            )
            .map_err(|e| fail(format!("audit write failed: {e}")))?;

        tracing::info!(role = %role, pane = %handle.pane, "agent ready");
        Ok(handle)
    }

    async fn start_assistant(
        &self,
        mux_session: &str,
        handle: &AgentHandle,
        resume: bool,
        prompt: &str,
    ) -> Result<(), String> {
        let cd = format!("cd {}", handle.worktree.display());
        self.mux
            .send_literal(mux_session, &handle.pane, &cd)
            .await
            .map_err(|e| format!("cd failed: {e}"))?;
        self.mux
            .send_enter(mux_session, &handle.pane)
            .await
            .map_err(|e| format!("cd failed: {e}"))?;
        tokio::time::sleep(self.config.shell_settle).await;

        // 4. Start the assistant
        let command = spawn_command(resume, prompt);
        self.mux
            .send_literal(mux_session, &handle.pane, &command)
            .await
            .map_err(|e| format!("assistant start failed: {e}"))?;
        self.mux
            .send_enter(mux_session, &handle.pane)
            .await
            .map_err(|e| format!("assistant start failed: {e}"))?;

        // 5. Readiness: poll for the prompt indicators
        self.mux
            .wait_for_pattern(
                mux_session,
                &handle.pane,
                &READY_PATTERN,
                self.config.ready_poll_interval,
                self.config.agent_op_timeout,
            )
            .await
            .map_err(|e| format!("agent never became ready: {e}"))?;
        Ok(())
    }

    /// Graceful termination: interrupt, wait, interrupt again if the shell
    /// has not surfaced, then kill the pane. Teardown failures are
    /// swallowed; the pane may already be gone.
    pub async fn terminate(&self, session_id: &SessionId, handle: &AgentHandle) {
        let mux_session = session_id.mux_session_name();
        let _ = self.mux.send_interrupt(&mux_session, &handle.pane).await;
        tokio::time::sleep(self.config.shell_settle).await;

        if let Ok(tail) = self.mux.capture_pane(&mux_session, &handle.pane, 5, false).await {
            if !looks_like_shell_prompt(&tail) {
                let _ = self.mux.send_interrupt(&mux_session, &handle.pane).await;
            }
        }
        let _ = self.mux.kill_pane(&mux_session, &handle.pane).await;
        tracing::debug!(role = %handle.role, pane = %handle.pane, "agent terminated");
    }

    /// Deliver a message to an agent: inbox file plus audit history.
    pub async fn send_to_agent(
        &self,
        session_id: &SessionId,
        role: Role,
        message: &Message,
    ) -> Result<(), ErrorRecord> {
        self.bus
            .append(QueueKind::Inbox, role, message)
            .map_err(|e| {
                ErrorRecord::new(ErrorCode::FilesystemError, "spawner", e.to_string())
                    .with_role(role)
            })?;
        self.audit
            .record_message(session_id, message)
            .map_err(|e| {
                ErrorRecord::new(ErrorCode::DatabaseError, "spawner", e.to_string()).with_role(role)
            })?;
        self.audit
            .record_activity(
                session_id,
                role,
                ActivityKind::Message,
                &serde_json::json!({ "message_id": message.id }),
                self.clock.now(),
            )
            .map_err(|e| {
                ErrorRecord::new(ErrorCode::DatabaseError, "spawner", e.to_string()).with_role(role)
            })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
