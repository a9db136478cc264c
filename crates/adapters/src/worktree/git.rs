// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree adapter

use super::{WorktreeAdapter, WorktreeError, WorktreeHandle, WorktreeInfo};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use swarm_core::{Role, SessionId};
use tokio::process::Command;

/// Name of the per-role prompt file copied into each worktree root.
const PROMPT_FILE: &str = "CLAUDE.md";

/// Git-based worktree adapter rooted at a repository.
#[derive(Clone)]
pub struct GitWorktrees {
    repo_root: PathBuf,
    /// Directory holding `{role}/CLAUDE.md` prompt sources
    roles_dir: PathBuf,
}

impl GitWorktrees {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let roles_dir = repo_root.join("roles");
        Self {
            repo_root,
            roles_dir,
        }
    }

    pub fn with_roles_dir(mut self, roles_dir: impl Into<PathBuf>) -> Self {
        self.roles_dir = roles_dir.into();
        self
    }

    async fn git(&self, args: &[&str]) -> Result<std::process::Output, WorktreeError> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .await
            .map_err(|e| WorktreeError::GitFailed {
                details: format!("git: {e}"),
            })
    }

    /// A repo with at least one commit is required before any worktree op.
    async fn ensure_repo(&self) -> Result<(), WorktreeError> {
        let inside = self.git(&["rev-parse", "--is-inside-work-tree"]).await?;
        if !inside.status.success()
            || String::from_utf8_lossy(&inside.stdout).trim() != "true"
        {
            return Err(WorktreeError::NotARepo);
        }
        let head = self.git(&["rev-parse", "HEAD"]).await?;
        if !head.status.success() {
            return Err(WorktreeError::NotARepo);
        }
        Ok(())
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, WorktreeError> {
        let reference = format!("refs/heads/{branch}");
        let output = self.git(&["rev-parse", "--verify", &reference]).await?;
        Ok(output.status.success())
    }

    fn prompt_source(&self, role: Role) -> PathBuf {
        self.roles_dir.join(role.as_str()).join(PROMPT_FILE)
    }

    /// Undo a half-made worktree: remove it and delete the branch.
    async fn rollback(&self, path: &Path, branch: &str) {
        let path_str = path.display().to_string();
        let _ = self
            .git(&["worktree", "remove", &path_str, "--force"])
            .await;
        let _ = self.git(&["branch", "-D", branch]).await;
    }
}

#[async_trait]
impl WorktreeAdapter for GitWorktrees {
    fn path_for(&self, role: Role) -> PathBuf {
        self.repo_root.join(".worktrees").join(role.as_str())
    }

    async fn create(
        &self,
        role: Role,
        session_id: &SessionId,
    ) -> Result<WorktreeHandle, WorktreeError> {
        self.ensure_repo().await?;

        let path = self.path_for(role);
        if path.exists() {
            return Err(WorktreeError::WorktreeExists(path));
        }

        let branch = session_id.branch_name(role);
        if self.branch_exists(&branch).await? {
            return Err(WorktreeError::BranchExists(branch));
        }

        let path_str = path.display().to_string();
        let output = self
            .git(&["worktree", "add", &path_str, "-b", &branch, "HEAD"])
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(role = %role, stderr = %stderr, "git worktree add failed");
            return Err(WorktreeError::GitFailed {
                details: stderr.trim().to_string(),
            });
        }

        // Seed the role prompt. Any failure past this point rolls back.
        let source = self.prompt_source(role);
        let copy = tokio::fs::read(&source).await;
        let seeded = match copy {
            Ok(bytes) => tokio::fs::write(path.join(PROMPT_FILE), bytes).await.is_ok(),
            Err(_) => false,
        };
        if !seeded {
            self.rollback(&path, &branch).await;
            return Err(WorktreeError::RoleNotFound(role));
        }

        tracing::info!(role = %role, path = %path.display(), branch = %branch, "worktree created");
        Ok(WorktreeHandle { role, path, branch })
    }

    async fn get(
        &self,
        role: Role,
        session_id: &SessionId,
    ) -> Result<WorktreeHandle, WorktreeError> {
        let path = self.path_for(role);
        if !path.is_dir() {
            return Err(WorktreeError::WorktreeNotFound(path));
        }
        if !path.join(PROMPT_FILE).is_file() {
            return Err(WorktreeError::RoleNotFound(role));
        }
        Ok(WorktreeHandle {
            role,
            path,
            branch: session_id.branch_name(role),
        })
    }

    async fn remove(&self, role: Role, session_id: &SessionId) -> Result<(), WorktreeError> {
        let path = self.path_for(role);
        let path_str = path.display().to_string();

        let output = self
            .git(&["worktree", "remove", &path_str, "--force"])
            .await?;
        if !output.status.success() && path.exists() {
            // Metadata is gone but the directory remains: force-remove it
            tokio::fs::remove_dir_all(&path)
                .await
                .map_err(|e| WorktreeError::CleanupFailed(e.to_string()))?;
            let _ = self.git(&["worktree", "prune"]).await;
        }

        // Branch may already be gone; failures are swallowed
        let branch = session_id.branch_name(role);
        let _ = self.git(&["branch", "-D", &branch]).await;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorktreeInfo>, WorktreeError> {
        let output = self.git(&["worktree", "list", "--porcelain"]).await?;
        if !output.status.success() {
            return Err(WorktreeError::GitFailed {
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(parse_porcelain(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn lock(&self, role: Role, reason: Option<&str>) -> Result<(), WorktreeError> {
        let path_str = self.path_for(role).display().to_string();
        let reason_arg;
        let mut args = vec!["worktree", "lock", path_str.as_str()];
        if let Some(reason) = reason {
            reason_arg = format!("--reason={reason}");
            args.push(&reason_arg);
        }
        let output = self.git(&args).await?;
        if !output.status.success() {
            return Err(WorktreeError::GitFailed {
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn unlock(&self, role: Role) -> Result<(), WorktreeError> {
        let path_str = self.path_for(role).display().to_string();
        let output = self.git(&["worktree", "unlock", &path_str]).await?;
        if !output.status.success() {
            return Err(WorktreeError::GitFailed {
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn prune(&self) -> Result<(), WorktreeError> {
        let output = self.git(&["worktree", "prune"]).await?;
        if !output.status.success() {
            return Err(WorktreeError::GitFailed {
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Parse `worktree list --porcelain`: blank-line-separated records of
/// `worktree PATH`, `HEAD SHA`, `branch refs/heads/NAME`, optional `locked`.
fn parse_porcelain(output: &str) -> Vec<WorktreeInfo> {
    let mut infos = Vec::new();
    let mut current: Option<WorktreeInfo> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(done) = current.take() {
                infos.push(done);
            }
            current = Some(WorktreeInfo {
                path: PathBuf::from(path),
                branch: None,
                head: String::new(),
                locked: false,
            });
        } else if let Some(entry) = current.as_mut() {
            if let Some(sha) = line.strip_prefix("HEAD ") {
                entry.head = sha.to_string();
            } else if let Some(name) = line.strip_prefix("branch refs/heads/") {
                entry.branch = Some(name.to_string());
            } else if line == "locked" || line.starts_with("locked ") {
                entry.locked = true;
            }
        }
    }
    if let Some(done) = current {
        infos.push(done);
    }
    infos
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
