// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for engine tests: fake adapters, manual clock, and a
//! controller wired for hand-driven monitor ticks.

use crate::config::SwarmConfig;
use crate::controller::SessionController;
use std::time::Duration;
use swarm_adapters::{FakeMux, FakeWorktrees, RecordingNotifier};
use swarm_bus::{MessageStore, QueueKind};
use swarm_core::{Clock, ManualClock, Message, MessageType, Recipient, Role, SequentialIdGen};
use swarm_storage::AuditStore;

pub(crate) const BANNER: &str = "✻ Welcome to Claude Code";

pub(crate) type TestController =
    SessionController<FakeMux, FakeWorktrees, ManualClock, SequentialIdGen, RecordingNotifier>;

pub(crate) struct Harness {
    pub _dir: tempfile::TempDir,
    pub controller: TestController,
    pub mux: FakeMux,
    pub worktrees: FakeWorktrees,
    pub bus: MessageStore,
    pub audit: AuditStore,
    pub clock: ManualClock,
    pub notifier: RecordingNotifier,
}

pub(crate) fn test_config() -> SwarmConfig {
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

pub(crate) fn harness() -> Harness {
    harness_with(test_config())
}

pub(crate) fn harness_with(config: SwarmConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mux = FakeMux::new();
    mux.set_auto_output(BANNER);
    let worktrees = FakeWorktrees::new();
    let bus = MessageStore::new(dir.path());
    let audit = AuditStore::open_in_memory().unwrap();
    let clock = ManualClock::default();
    let notifier = RecordingNotifier::new();

    let controller = SessionController::new(
        config,
        dir.path(),
        mux.clone(),
        worktrees.clone(),
        bus.clone(),
        audit.clone(),
        clock.clone(),
        SequentialIdGen::new("m"),
        notifier.clone(),
    );
    Harness {
        _dir: dir,
        controller,
        mux,
        worktrees,
        bus,
        audit,
        clock,
        notifier,
    }
}

/// Simulate an agent appending to its outbox.
pub(crate) fn agent_emits(
    h: &Harness,
    id: &str,
    offset_secs: i64,
    from: Role,
    to: impl Into<Recipient>,
    message_type: MessageType,
) -> Message {
    let message = Message::new(
        id,
        h.clock.now() + chrono::Duration::seconds(offset_secs),
        from,
        to,
        message_type,
        format!("subject-{id}"),
        format!("body-{id}"),
    );
    h.bus.append(QueueKind::Outbox, from, &message).unwrap();
    message
}
