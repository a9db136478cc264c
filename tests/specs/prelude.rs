//! Shared harness for the behavioral specs.

use std::time::Duration;
use swarm_adapters::{FakeMux, FakeWorktrees, RecordingNotifier};
use swarm_bus::{MessageStore, QueueKind};
use swarm_core::{Clock, ManualClock, Message, MessageType, Recipient, Role, SequentialIdGen, SessionId};
use swarm_engine::{SessionController, SwarmConfig};
use swarm_storage::AuditStore;

pub const BANNER: &str = "✻ Welcome to Claude Code";

pub type SpecController =
    SessionController<FakeMux, FakeWorktrees, ManualClock, SequentialIdGen, RecordingNotifier>;

pub struct Spec {
    pub dir: tempfile::TempDir,
    pub controller: SpecController,
    pub mux: FakeMux,
    pub worktrees: FakeWorktrees,
    pub bus: MessageStore,
    pub audit: AuditStore,
    pub clock: ManualClock,
    pub notifier: RecordingNotifier,
}

pub fn spec_config() -> SwarmConfig {
    SwarmConfig {
        monitor_interval: Duration::from_millis(10),
        agent_op_timeout: Duration::from_millis(50),
        shell_settle: Duration::from_millis(1),
        ready_poll_interval: Duration::from_millis(2),
        retry_delay: Duration::from_millis(1),
        monitor_autostart: false,
        ..SwarmConfig::default()
    }
}

pub fn spec() -> Spec {
    let dir = tempfile::tempdir().unwrap();
    let mux = FakeMux::new();
    mux.set_auto_output(BANNER);
    let worktrees = FakeWorktrees::new();
    let bus = MessageStore::new(dir.path());
    let audit = AuditStore::open_in_memory().unwrap();
    let clock = ManualClock::default();
    let notifier = RecordingNotifier::new();

    let controller = SessionController::new(
        spec_config(),
        dir.path(),
        mux.clone(),
        worktrees.clone(),
        bus.clone(),
        audit.clone(),
        clock.clone(),
        SequentialIdGen::new("msg"),
        notifier.clone(),
    );
    Spec {
        dir,
        controller,
        mux,
        worktrees,
        bus,
        audit,
        clock,
        notifier,
    }
}

/// A second controller over the same stores, as a fresh orchestrator
/// process would see them.
pub fn fresh_process(s: &Spec) -> SpecController {
    SessionController::new(
        spec_config(),
        s.dir.path(),
        s.mux.clone(),
        s.worktrees.clone(),
        s.bus.clone(),
        s.audit.clone(),
        s.clock.clone(),
        SequentialIdGen::new("msg2"),
        s.notifier.clone(),
    )
}

pub async fn start_research(s: &Spec) -> SessionId {
    s.controller
        .start_workflow("research", "study codec X")
        .await
        .unwrap()
}

/// Simulate an agent appending to its outbox file.
pub fn agent_emits(
    s: &Spec,
    id: &str,
    offset_secs: i64,
    from: Role,
    to: impl Into<Recipient>,
    message_type: MessageType,
) -> Message {
    let message = Message::new(
        id,
        s.clock.now() + chrono::Duration::seconds(offset_secs),
        from,
        to,
        message_type,
        format!("subject-{id}"),
        format!("body-{id}"),
    );
    s.bus.append(QueueKind::Outbox, from, &message).unwrap();
    message
}

/// A review with a verdict, the way the reviewer assistant writes one.
pub fn reviewer_verdict(s: &Spec, id: &str, offset_secs: i64, verdict: &str) -> Message {
    let message = Message::new(
        id,
        s.clock.now() + chrono::Duration::seconds(offset_secs),
        Role::Reviewer,
        Role::Orchestrator,
        MessageType::Review,
        format!("review-{id}"),
        "detailed review notes",
    )
    .with_metadata("verdict", serde_json::json!(verdict));
    s.bus.append(QueueKind::Outbox, Role::Reviewer, &message).unwrap();
    message
}
