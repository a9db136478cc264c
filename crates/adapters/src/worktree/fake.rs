// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake worktree adapter for testing

use super::{WorktreeAdapter, WorktreeError, WorktreeHandle, WorktreeInfo};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use swarm_core::{Role, SessionId};

/// Recorded worktree call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorktreeCall {
    Create { role: Role, session_id: String },
    Remove { role: Role, session_id: String },
    Lock { role: Role },
    Unlock { role: Role },
    Prune,
}

#[derive(Default)]
struct FakeWorktreeState {
    existing: BTreeMap<Role, WorktreeHandle>,
    locked: BTreeMap<Role, bool>,
    calls: Vec<WorktreeCall>,
    /// Roles whose next creates fail (count per role)
    fail_roles: BTreeMap<Role, u32>,
}

/// Fake worktree adapter for testing. Purely in-memory.
#[derive(Clone, Default)]
pub struct FakeWorktrees {
    inner: Arc<Mutex<FakeWorktreeState>>,
}

impl FakeWorktrees {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<WorktreeCall> {
        self.inner.lock().calls.clone()
    }

    /// Make the next `count` creates for `role` fail with `GitFailed`.
    pub fn fail_creates_for(&self, role: Role, count: u32) {
        self.inner.lock().fail_roles.insert(role, count);
    }

    pub fn existing_roles(&self) -> Vec<Role> {
        self.inner.lock().existing.keys().copied().collect()
    }
}

#[async_trait]
impl WorktreeAdapter for FakeWorktrees {
    fn path_for(&self, role: Role) -> PathBuf {
        PathBuf::from(".worktrees").join(role.as_str())
    }

    async fn create(
        &self,
        role: Role,
        session_id: &SessionId,
    ) -> Result<WorktreeHandle, WorktreeError> {
        let mut state = self.inner.lock();
        state.calls.push(WorktreeCall::Create {
            role,
            session_id: session_id.to_string(),
        });
        if let Some(remaining) = state.fail_roles.get_mut(&role) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(WorktreeError::GitFailed {
                    details: format!("induced create failure for {role}"),
                });
            }
        }
        if state.existing.contains_key(&role) {
            return Err(WorktreeError::WorktreeExists(self.path_for(role)));
        }
        let handle = WorktreeHandle {
            role,
            path: self.path_for(role),
            branch: session_id.branch_name(role),
        };
        state.existing.insert(role, handle.clone());
        Ok(handle)
    }

    async fn get(
        &self,
        role: Role,
        _session_id: &SessionId,
    ) -> Result<WorktreeHandle, WorktreeError> {
        self.inner
            .lock()
            .existing
            .get(&role)
            .cloned()
            .ok_or_else(|| WorktreeError::WorktreeNotFound(self.path_for(role)))
    }

    async fn remove(&self, role: Role, session_id: &SessionId) -> Result<(), WorktreeError> {
        let mut state = self.inner.lock();
        state.calls.push(WorktreeCall::Remove {
            role,
            session_id: session_id.to_string(),
        });
        state.existing.remove(&role);
        state.locked.remove(&role);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorktreeInfo>, WorktreeError> {
        let state = self.inner.lock();
        Ok(state
            .existing
            .values()
            .map(|handle| WorktreeInfo {
                path: handle.path.clone(),
                branch: Some(handle.branch.clone()),
                head: "0000000".to_string(),
                locked: state.locked.get(&handle.role).copied().unwrap_or(false),
            })
            .collect())
    }

    async fn lock(&self, role: Role, _reason: Option<&str>) -> Result<(), WorktreeError> {
        let mut state = self.inner.lock();
        state.calls.push(WorktreeCall::Lock { role });
        if !state.existing.contains_key(&role) {
            return Err(WorktreeError::WorktreeNotFound(self.path_for(role)));
        }
        state.locked.insert(role, true);
        Ok(())
    }

    async fn unlock(&self, role: Role) -> Result<(), WorktreeError> {
        let mut state = self.inner.lock();
        state.calls.push(WorktreeCall::Unlock { role });
        state.locked.insert(role, false);
        Ok(())
    }

    async fn prune(&self) -> Result<(), WorktreeError> {
        self.inner.lock().calls.push(WorktreeCall::Prune);
        Ok(())
    }
}
