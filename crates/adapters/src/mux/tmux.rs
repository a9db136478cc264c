// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux multiplexer adapter

use super::{validate_session_name, MuxAdapter, MuxError, PaneInfo, SessionInfo};
use async_trait::async_trait;
use swarm_core::PaneId;
use tokio::process::Command;

/// Tmux-based multiplexer adapter
#[derive(Clone, Default)]
pub struct TmuxMux;

impl TmuxMux {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, MuxError> {
        Command::new("tmux")
            .args(args)
            .output()
            .await
            .map_err(|e| MuxError::CommandFailed {
                details: format!("tmux: {e}"),
            })
    }

    /// Target argument form `SESSION:%PANE`.
    fn target(session: &str, pane: &PaneId) -> String {
        format!("{session}:{pane}")
    }
}

/// Map tmux stderr to the failure taxonomy.
fn classify(stderr: &str, subject: &str) -> MuxError {
    let line = stderr.trim();
    if line.contains("no server running") || line.contains("error connecting to") {
        MuxError::TmuxNotRunning
    } else if line.contains("can't find session") || line.contains("session not found") {
        MuxError::SessionNotFound(subject.to_string())
    } else if line.contains("can't find pane") || line.contains("can't find window") {
        MuxError::PaneNotFound(subject.to_string())
    } else {
        MuxError::CommandFailed {
            details: line.to_string(),
        }
    }
}

#[async_trait]
impl MuxAdapter for TmuxMux {
    async fn create_session(&self, name: &str) -> Result<PaneId, MuxError> {
        validate_session_name(name)?;

        if self.has_session(name).await? {
            return Err(MuxError::SessionExists(name.to_string()));
        }

        let output = self.run(&["new-session", "-d", "-s", name]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(session = name, stderr = %stderr, "tmux new-session failed");
            return Err(classify(&stderr, name));
        }

        // Resolve the initial pane's stable id
        let output = self
            .run(&["display-message", "-t", name, "-p", "#{pane_id}"])
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify(&stderr, name));
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        PaneId::parse(&id).map_err(|e| MuxError::CommandFailed {
            details: e.to_string(),
        })
    }

    async fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        validate_session_name(name)?;
        let output = self.run(&["kill-session", "-t", name]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            match classify(&stderr, name) {
                // Already gone either way: idempotent success
                MuxError::TmuxNotRunning | MuxError::SessionNotFound(_) => {}
                other => return Err(other),
            }
        }
        Ok(())
    }

    async fn has_session(&self, name: &str) -> Result<bool, MuxError> {
        validate_session_name(name)?;
        let output = self.run(&["has-session", "-t", name]).await?;
        Ok(output.status.success())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, MuxError> {
        let format = "#{session_name}|#{session_windows}|#{session_created}|#{session_attached}";
        let output = self.run(&["list-sessions", "-F", format]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return match classify(&stderr, "") {
                MuxError::TmuxNotRunning => Ok(Vec::new()),
                other => Err(other),
            };
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_session_line).collect())
    }

    async fn create_pane(
        &self,
        session: &str,
        vertical: bool,
        percent: Option<u8>,
    ) -> Result<PaneId, MuxError> {
        validate_session_name(session)?;

        let direction = if vertical { "-v" } else { "-h" };
        let mut args = vec!["split-window", direction];
        let percent_str;
        if let Some(p) = percent {
            percent_str = p.to_string();
            args.push("-p");
            args.push(&percent_str);
        }
        args.extend(["-t", session, "-P", "-F", "#{pane_id}"]);

        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify(&stderr, session));
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        PaneId::parse(&id).map_err(|e| MuxError::CommandFailed {
            details: e.to_string(),
        })
    }

    async fn apply_tiled_layout(&self, session: &str) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let output = self.run(&["select-layout", "-t", session, "tiled"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify(&stderr, session));
        }
        Ok(())
    }

    async fn list_panes(&self, session: &str) -> Result<Vec<PaneInfo>, MuxError> {
        validate_session_name(session)?;
        let format = "#{pane_id}|#{pane_index}|#{pane_active}";
        let output = self.run(&["list-panes", "-t", session, "-F", format]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify(&stderr, session));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_pane_line).collect())
    }

    async fn kill_pane(&self, session: &str, pane: &PaneId) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let target = Self::target(session, pane);
        let output = self.run(&["kill-pane", "-t", &target]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            match classify(&stderr, &target) {
                // Pane already gone: fine
                MuxError::PaneNotFound(_) | MuxError::SessionNotFound(_) | MuxError::TmuxNotRunning => {}
                other => return Err(other),
            }
        }
        Ok(())
    }

    async fn send_keys(&self, session: &str, pane: &PaneId, keys: &str) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let target = Self::target(session, pane);
        let output = self
            .run(&["send-keys", "-t", &target, keys, "Enter"])
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify(&stderr, &target));
        }
        Ok(())
    }

    async fn send_literal(
        &self,
        session: &str,
        pane: &PaneId,
        text: &str,
    ) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let target = Self::target(session, pane);
        // -l = literal mode (no key name interpretation)
        // -- = end of options (handles text starting with -)
        let output = self
            .run(&["send-keys", "-t", &target, "-l", "--", text])
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify(&stderr, &target));
        }
        Ok(())
    }

    async fn send_enter(&self, session: &str, pane: &PaneId) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let target = Self::target(session, pane);
        let output = self.run(&["send-keys", "-t", &target, "Enter"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify(&stderr, &target));
        }
        Ok(())
    }

    async fn send_interrupt(&self, session: &str, pane: &PaneId) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let target = Self::target(session, pane);
        let output = self.run(&["send-keys", "-t", &target, "C-c"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify(&stderr, &target));
        }
        Ok(())
    }

    async fn capture_pane(
        &self,
        session: &str,
        pane: &PaneId,
        lines: u32,
        keep_ansi: bool,
    ) -> Result<String, MuxError> {
        validate_session_name(session)?;
        let target = Self::target(session, pane);
        let start = format!("-{lines}");
        let mut args = vec!["capture-pane", "-t", target.as_str(), "-p"];
        if keep_ansi {
            args.push("-e");
        }
        args.extend(["-S", start.as_str()]);

        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify(&stderr, &target));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Parse one `|`-separated line of list-sessions output.
fn parse_session_line(line: &str) -> Option<SessionInfo> {
    let mut fields = line.split('|');
    let name = fields.next()?.to_string();
    let windows = fields.next()?.parse().ok()?;
    let created = fields.next()?.to_string();
    let attached = fields.next()? != "0";
    Some(SessionInfo {
        name,
        windows,
        created,
        attached,
    })
}

/// Parse one `|`-separated line of list-panes output.
fn parse_pane_line(line: &str) -> Option<PaneInfo> {
    let mut fields = line.split('|');
    let id = PaneId::parse(fields.next()?).ok()?;
    let index = fields.next()?.parse().ok()?;
    let active = fields.next()? == "1";
    Some(PaneInfo { id, index, active })
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
