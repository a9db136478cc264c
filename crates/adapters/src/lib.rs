// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! swarm-adapters: typed wrappers around the external binaries.
//!
//! The multiplexer and version-control system are collaborators invoked as
//! subprocesses; these adapters give them async, result-or-error interfaces
//! and keep the command lines behind validated names.

pub mod mux;
pub mod notify;
pub mod worktree;

pub use mux::{MuxAdapter, MuxError, PaneInfo, SessionInfo, TmuxMux};
pub use notify::{DesktopNotifier, Notifier, NullNotifier};
pub use worktree::{GitWorktrees, WorktreeAdapter, WorktreeError, WorktreeHandle, WorktreeInfo};

#[cfg(any(test, feature = "test-support"))]
pub use mux::FakeMux;
#[cfg(any(test, feature = "test-support"))]
pub use notify::RecordingNotifier;
#[cfg(any(test, feature = "test-support"))]
pub use worktree::{FakeWorktrees, WorktreeCall};
