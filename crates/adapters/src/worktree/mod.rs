// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version-control worktree adapters.
//!
//! Every agent gets an isolated workspace at `.worktrees/{role}` on a
//! dedicated branch `swarm/{role}-{sessionId}`, seeded with the role's
//! prompt file. Multi-create is all-or-nothing.

mod git;

pub use git::GitWorktrees;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeWorktrees, WorktreeCall};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::LazyLock;
use swarm_core::{Role, SessionId};
use thiserror::Error;

/// Errors from worktree operations
#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("not inside a git repository (or no commits yet)")]
    NotARepo,
    #[error("worktree already exists: {0}")]
    WorktreeExists(PathBuf),
    #[error("worktree not found: {0}")]
    WorktreeNotFound(PathBuf),
    #[error("branch already exists: {0}")]
    BranchExists(String),
    #[error("git failed: {details}")]
    GitFailed { details: String },
    #[error("no prompt file for role {0}")]
    RoleNotFound(Role),
    #[error("cleanup failed: {0}")]
    CleanupFailed(String),
}

/// A created worktree: path plus its dedicated branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeHandle {
    pub role: Role,
    pub path: PathBuf,
    pub branch: String,
}

/// One record of `worktree list --porcelain` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub branch: Option<String>,
    pub head: String,
    pub locked: bool,
}

/// A worktree recognized as swarm-owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmWorktree {
    pub role: Role,
    pub session_id: SessionId,
    pub info: WorktreeInfo,
}

#[allow(clippy::unwrap_used)] // the pattern is a literal
static SWARM_BRANCH: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^swarm/(\w+)-(\S+)$").unwrap());

/// Extract `(role, session_id)` from a `swarm/{role}-{id}` branch name.
/// Unknown roles and unsafe ids are rejected.
pub fn parse_swarm_branch(branch: &str) -> Option<(Role, SessionId)> {
    let captures = SWARM_BRANCH.captures(branch)?;
    let role = Role::parse(captures.get(1)?.as_str()).ok()?;
    let session_id = SessionId::parse(captures.get(2)?.as_str()).ok()?;
    Some((role, session_id))
}

/// Adapter for per-role isolated workspaces.
#[async_trait]
pub trait WorktreeAdapter: Clone + Send + Sync + 'static {
    /// Where a role's worktree lives (whether or not it exists).
    fn path_for(&self, role: Role) -> PathBuf;

    /// Create a worktree on a fresh branch and seed the role prompt.
    /// Rolls itself back on any failure after the branch is made.
    async fn create(
        &self,
        role: Role,
        session_id: &SessionId,
    ) -> Result<WorktreeHandle, WorktreeError>;

    /// Handle for an existing worktree, verifying the prompt file is in
    /// place. `WorktreeNotFound` / `RoleNotFound` otherwise.
    async fn get(
        &self,
        role: Role,
        session_id: &SessionId,
    ) -> Result<WorktreeHandle, WorktreeError>;

    /// Remove a worktree and (best effort) its branch. Idempotent: an
    /// absent worktree resolves to success.
    async fn remove(&self, role: Role, session_id: &SessionId) -> Result<(), WorktreeError>;

    /// Atomic multi-create: either every role's worktree exists afterwards
    /// or none does.
    async fn create_all(
        &self,
        roles: &[Role],
        session_id: &SessionId,
    ) -> Result<Vec<WorktreeHandle>, WorktreeError> {
        let mut created = Vec::with_capacity(roles.len());
        for role in roles {
            match self.create(*role, session_id).await {
                Ok(handle) => created.push(handle),
                Err(e) => {
                    tracing::warn!(role = %role, error = %e, "multi-create failed, rolling back");
                    for handle in created.iter().rev() {
                        if let Err(cleanup) = self.remove(handle.role, session_id).await {
                            tracing::warn!(
                                role = %handle.role,
                                error = %cleanup,
                                "rollback removal failed"
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(created)
    }

    /// Remove every role's worktree, swallowing individual failures.
    async fn remove_all(&self, roles: &[Role], session_id: &SessionId) {
        for role in roles {
            if let Err(e) = self.remove(*role, session_id).await {
                tracing::warn!(role = %role, error = %e, "worktree removal failed during cleanup");
            }
        }
    }

    /// All worktrees the VCS knows about.
    async fn list(&self) -> Result<Vec<WorktreeInfo>, WorktreeError>;

    /// The swarm-owned view: entries under `.worktrees/` whose branch
    /// parses as `swarm/{role}-{id}`.
    async fn list_swarm(&self) -> Result<Vec<SwarmWorktree>, WorktreeError> {
        let all = self.list().await?;
        Ok(all
            .into_iter()
            .filter(|info| {
                info.path
                    .components()
                    .any(|c| c.as_os_str() == ".worktrees")
            })
            .filter_map(|info| {
                let branch = info.branch.as_deref()?;
                let (role, session_id) = parse_swarm_branch(branch)?;
                Some(SwarmWorktree {
                    role,
                    session_id,
                    info,
                })
            })
            .collect())
    }

    async fn lock(&self, role: Role, reason: Option<&str>) -> Result<(), WorktreeError>;

    async fn unlock(&self, role: Role) -> Result<(), WorktreeError>;

    /// Drop stale worktree metadata.
    async fn prune(&self) -> Result<(), WorktreeError>;
}
