// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery engine: retry policies, strategy selection, degradation.
//!
//! Other components detect errors; this module decides what to do. The
//! controller applies the returned outcome verbatim, never improvising.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use swarm_core::{
    DegradationLevel, ErrorCode, ErrorRecord, Role, Session,
};
use swarm_workflow::{StageStatus, WorkflowInstance, WorkflowTemplate};

/// Hard caps preventing infinite recovery loops.
pub const MAX_RECOVERIES_PER_AGENT: u32 = 3;
pub const MAX_RECOVERIES_PER_SESSION: u32 = 10;

/// Exponential backoff policy with jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Uniform jitter added on top, as a percentage of the capped delay
    pub jitter_percent: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter_percent: 20,
        }
    }
}

impl RetryPolicy {
    /// Preset for agent spawn attempts.
    pub fn agent_spawn() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(2000),
            ..Self::default()
        }
    }

    /// Preset for message sends (fast, small).
    pub fn message_send() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2000),
            ..Self::default()
        }
    }

    /// Preset for audit-store writes.
    pub fn database_write() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
            ..Self::default()
        }
    }

    /// Preset for provider rate limits: patient, many attempts.
    pub fn rate_limit() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(5000),
            max_delay: Duration::from_millis(60_000),
            ..Self::default()
        }
    }

    /// Delay before attempt `n` (1-based):
    /// `min(initial × multiplier^(n-1), max) + U(0, capped × jitter%)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(exponent as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);
        let jitter_cap = capped * (self.jitter_percent as f64 / 100.0);
        let jitter = if jitter_cap > 0.0 {
            rand::rng().random_range(0.0..jitter_cap)
        } else {
            0.0
        };
        Duration::from_millis((capped + jitter) as u64)
    }

    /// Upper bound of `delay(attempt)`, for tests and scheduling.
    pub fn max_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(exponent as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);
        Duration::from_millis((capped * (1.0 + self.jitter_percent as f64 / 100.0)) as u64)
    }
}

/// Run an operation under a retry policy.
///
/// The closure receives the 1-based attempt number. A non-retryable error
/// code short-circuits immediately; the last error is returned with its
/// `retry_count` filled in.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, ErrorRecord>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ErrorRecord>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(mut error) => {
                error.retry_count = attempt - 1;
                if !error.retryable || attempt > policy.max_retries {
                    return Err(error);
                }
                let delay = policy.delay(attempt);
                tracing::debug!(
                    code = %error.code,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Recovery strategies, in the order they tend to escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Retry { attempts: u32 },
    Restart { attempts: u32 },
    Skip,
    Substitute,
    Rollback,
    Escalate,
    Abort,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Retry { .. } => "retry",
            Strategy::Restart { .. } => "restart",
            Strategy::Skip => "skip",
            Strategy::Substitute => "substitute",
            Strategy::Rollback => "rollback",
            Strategy::Escalate => "escalate",
            Strategy::Abort => "abort",
        }
    }

    /// Attempts this strategy is willing to make before its fallback.
    pub fn attempts(&self) -> u32 {
        match self {
            Strategy::Retry { attempts } | Strategy::Restart { attempts } => *attempts,
            _ => 1,
        }
    }
}

/// Side actions executed while applying a strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    Wait(Duration),
    Execute,
    Notify,
    Log,
    Cleanup,
}

/// A per-code plan: primary strategy, optional fallback, ordered actions.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyPlan {
    pub primary: Strategy,
    pub fallback: Option<Strategy>,
    pub actions: Vec<RecoveryAction>,
    /// Retry policy used for `Wait` spacing
    pub policy: RetryPolicy,
}

/// The strategy table. Codes are matched verbatim.
pub fn plan_for(code: ErrorCode) -> StrategyPlan {
    let plan = |primary, fallback, actions: &[RecoveryAction], policy| StrategyPlan {
        primary,
        fallback,
        actions: actions.to_vec(),
        policy,
    };

    match code {
        ErrorCode::AgentTimeout => plan(
            Strategy::Retry { attempts: 2 },
            Some(Strategy::Restart { attempts: 1 }),
            &[RecoveryAction::Log, RecoveryAction::Wait(Duration::ZERO)],
            RetryPolicy::default(),
        ),
        ErrorCode::AgentCrashed => plan(
            Strategy::Restart { attempts: 2 },
            Some(Strategy::Skip),
            &[RecoveryAction::Log, RecoveryAction::Notify],
            RetryPolicy::agent_spawn(),
        ),
        ErrorCode::AgentSpawnFailed => plan(
            Strategy::Retry { attempts: 3 },
            Some(Strategy::Abort),
            &[RecoveryAction::Log, RecoveryAction::Wait(Duration::ZERO)],
            RetryPolicy::agent_spawn(),
        ),
        ErrorCode::AgentBlocked => plan(
            Strategy::Escalate,
            None,
            &[RecoveryAction::Notify, RecoveryAction::Log],
            RetryPolicy::default(),
        ),
        ErrorCode::AgentInvalidOutput => plan(
            Strategy::Skip,
            None,
            &[RecoveryAction::Log],
            RetryPolicy::default(),
        ),
        ErrorCode::RateLimited => plan(
            Strategy::Retry { attempts: 5 },
            Some(Strategy::Escalate),
            &[RecoveryAction::Log, RecoveryAction::Wait(Duration::ZERO)],
            RetryPolicy::rate_limit(),
        ),
        ErrorCode::WorkflowTimeout => plan(
            Strategy::Abort,
            None,
            &[RecoveryAction::Log, RecoveryAction::Notify, RecoveryAction::Cleanup],
            RetryPolicy::default(),
        ),
        ErrorCode::MaxIterations => plan(
            Strategy::Skip,
            None,
            &[RecoveryAction::Log],
            RetryPolicy::default(),
        ),
        ErrorCode::StageFailed => plan(
            Strategy::Skip,
            Some(Strategy::Abort),
            &[RecoveryAction::Log],
            RetryPolicy::default(),
        ),
        ErrorCode::RoutingFailed => plan(
            Strategy::Retry { attempts: 2 },
            Some(Strategy::Skip),
            &[RecoveryAction::Log],
            RetryPolicy::message_send(),
        ),
        ErrorCode::TmuxSessionFailed => plan(
            Strategy::Retry { attempts: 2 },
            Some(Strategy::Abort),
            &[RecoveryAction::Log],
            RetryPolicy::default(),
        ),
        ErrorCode::GitWorktreeFailed => plan(
            Strategy::Rollback,
            Some(Strategy::Abort),
            &[RecoveryAction::Log, RecoveryAction::Cleanup],
            RetryPolicy::default(),
        ),
        ErrorCode::DatabaseError => plan(
            Strategy::Retry { attempts: 3 },
            Some(Strategy::Escalate),
            &[RecoveryAction::Log, RecoveryAction::Wait(Duration::ZERO)],
            RetryPolicy::database_write(),
        ),
        ErrorCode::FilesystemError => plan(
            Strategy::Retry { attempts: 2 },
            Some(Strategy::Abort),
            &[RecoveryAction::Log],
            RetryPolicy::default(),
        ),
        ErrorCode::NetworkError => plan(
            Strategy::Retry { attempts: 3 },
            Some(Strategy::Escalate),
            &[RecoveryAction::Log, RecoveryAction::Wait(Duration::ZERO)],
            RetryPolicy::default(),
        ),
        // Fatal configuration/environment problems have nowhere to go
        ErrorCode::WorkflowNotFound
        | ErrorCode::TmuxNotFound
        | ErrorCode::PermissionDenied
        | ErrorCode::InvalidArgument
        | ErrorCode::SessionExists
        | ErrorCode::SessionNotFound => plan(
            Strategy::Abort,
            None,
            &[RecoveryAction::Log, RecoveryAction::Notify],
            RetryPolicy::default(),
        ),
    }
}

/// What the controller must do. Applied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Re-invoke the named operation (with backoff already waited)
    RetryOperation { operation: String },
    /// Terminate and re-spawn the named agent on its existing worktree
    RestartAgent { role: Role },
    /// Record the stage as skipped and move on
    SkipStage { stage: Option<String> },
    /// Surface to the human and keep the session alive
    Escalate { message: String },
    /// Fail the session and synthesise partial results
    Abort { reason: String },
}

/// Context the caller knows about the failed operation.
#[derive(Debug, Clone, Default)]
pub struct RecoveryContext {
    pub role: Option<Role>,
    pub operation: String,
    pub stage: Option<String>,
}

/// Per-session recovery bookkeeping.
#[derive(Debug, Default)]
pub struct RecoveryTracker {
    attempts_per_agent: BTreeMap<Role, u32>,
    total_attempts: u32,
    pub last_checkpoint_at: Option<DateTime<Utc>>,
}

impl RecoveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts_for(&self, role: Role) -> u32 {
        self.attempts_per_agent.get(&role).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    /// Decide the outcome for an error. Increments attempt counters unless
    /// the caps force an abort.
    pub fn decide(&mut self, error: &ErrorRecord, ctx: &RecoveryContext) -> (RecoveryOutcome, Strategy) {
        // Cap check comes first: a capped agent gets no further attempts
        if let Some(role) = ctx.role {
            if self.attempts_for(role) >= MAX_RECOVERIES_PER_AGENT {
                return (
                    RecoveryOutcome::Abort {
                        reason: format!("recovery cap reached for {role} ({MAX_RECOVERIES_PER_AGENT} attempts)"),
                    },
                    Strategy::Abort,
                );
            }
        }
        if self.total_attempts >= MAX_RECOVERIES_PER_SESSION {
            return (
                RecoveryOutcome::Abort {
                    reason: format!("session recovery cap reached ({MAX_RECOVERIES_PER_SESSION} attempts)"),
                },
                Strategy::Abort,
            );
        }

        let plan = plan_for(error.code);
        let strategy = if error.retry_count >= plan.primary.attempts() {
            plan.fallback.unwrap_or(Strategy::Abort)
        } else {
            plan.primary
        };

        if !matches!(strategy, Strategy::Abort) {
            self.total_attempts += 1;
            if let Some(role) = ctx.role {
                *self.attempts_per_agent.entry(role).or_default() += 1;
            }
        }

        let outcome = match strategy {
            Strategy::Retry { .. } => RecoveryOutcome::RetryOperation {
                operation: ctx.operation.clone(),
            },
            Strategy::Restart { .. } => match ctx.role {
                Some(role) => RecoveryOutcome::RestartAgent { role },
                None => RecoveryOutcome::Abort {
                    reason: "restart strategy without an agent role".to_string(),
                },
            },
            Strategy::Skip => RecoveryOutcome::SkipStage {
                stage: ctx.stage.clone(),
            },
            Strategy::Substitute => match ctx.role {
                // No pool of spare agents exists; a substitute is a fresh
                // spawn of the same role
                Some(role) => RecoveryOutcome::RestartAgent { role },
                None => RecoveryOutcome::Escalate {
                    message: error.log_summary(),
                },
            },
            Strategy::Rollback | Strategy::Abort => RecoveryOutcome::Abort {
                reason: error.log_summary(),
            },
            Strategy::Escalate => RecoveryOutcome::Escalate {
                message: error.log_summary(),
            },
        };
        (outcome, strategy)
    }
}

/// Degradation rule lookup: what is lost and how to go on.
pub struct DegradationRule {
    pub impact: String,
    pub user_message: String,
    /// Whether the workflow is dead without this role
    pub critical: bool,
}

/// A role is critical when a pending, non-optional stage still needs it.
///
/// The single source of truth for "can we lose this agent": both the
/// degradation rules and `can_continue_workflow` consult it.
pub fn role_is_critical(
    template: &WorkflowTemplate,
    instance: &WorkflowInstance,
    role: Role,
) -> bool {
    template.stages.values().any(|stage| {
        stage.role == role
            && !stage.optional
            && !instance
                .history
                .iter()
                .any(|r| r.stage == stage.id && r.status == StageStatus::Complete)
    })
}

pub fn degradation_rule(
    template: &WorkflowTemplate,
    instance: &WorkflowInstance,
    role: Role,
    code: ErrorCode,
) -> DegradationRule {
    let critical = role_is_critical(template, instance, role);
    DegradationRule {
        impact: format!("{role} unavailable ({code})"),
        user_message: if critical {
            format!("{role} is required for remaining stages; workflow cannot continue")
        } else {
            format!("{role} lost; continuing with partial results")
        },
        critical,
    }
}

/// Fold an unrecovered agent failure into the session's degradation state.
/// Returns whether the workflow can continue.
pub fn apply_degradation(
    session: &mut Session,
    template: &WorkflowTemplate,
    instance: &WorkflowInstance,
    role: Role,
    code: ErrorCode,
) -> bool {
    let rule = degradation_rule(template, instance, role, code);
    session.degradation.unavailable_agents.insert(role);
    session.degradation.warnings.push(rule.user_message.clone());

    session.degradation.level = if rule.critical {
        DegradationLevel::Failed
    } else if session.degradation.unavailable_agents.len() > 1 {
        DegradationLevel::Minimal
    } else {
        DegradationLevel::Reduced
    };

    tracing::warn!(
        role = %role,
        code = %code,
        level = ?session.degradation.level,
        "{}",
        rule.user_message
    );
    !rule.critical
}

/// Whether the session can still make progress given its degradation.
pub fn can_continue_workflow(
    session: &Session,
    template: &WorkflowTemplate,
    instance: &WorkflowInstance,
) -> bool {
    if session.degradation.level == DegradationLevel::Failed {
        return false;
    }
    !session
        .degradation
        .unavailable_agents
        .iter()
        .any(|role| role_is_critical(template, instance, *role))
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
