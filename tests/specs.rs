//! Behavioral specifications for the swarm orchestrator.
//!
//! These tests drive the session controller end-to-end against the fake
//! multiplexer and worktree adapters, with a manual clock and hand-driven
//! monitor ticks. Agent behavior is simulated by appending to outbox
//! files, exactly the way a real assistant process would.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// workflow/
#[path = "specs/workflow/research.rs"]
mod workflow_research;
#[path = "specs/workflow/revision.rs"]
mod workflow_revision;

// recovery/
#[path = "specs/recovery/crash.rs"]
mod recovery_crash;
#[path = "specs/recovery/spawn_cap.rs"]
mod recovery_spawn_cap;

// session/
#[path = "specs/session/broadcast.rs"]
mod session_broadcast;
#[path = "specs/session/checkpoint.rs"]
mod session_checkpoint;
