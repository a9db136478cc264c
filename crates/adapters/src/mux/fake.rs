// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake multiplexer adapter for testing

use super::{validate_session_name, MuxAdapter, MuxError, PaneInfo, SessionInfo};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use swarm_core::PaneId;

/// Recorded multiplexer call
#[derive(Debug, Clone, PartialEq)]
pub enum MuxCall {
    CreateSession { name: String },
    KillSession { name: String },
    CreatePane { session: String, vertical: bool },
    KillPane { session: String, pane: String },
    SendKeys { session: String, pane: String, keys: String },
    SendLiteral { session: String, pane: String, text: String },
    SendEnter { session: String, pane: String },
    SendInterrupt { session: String, pane: String },
    Capture { session: String, pane: String },
    TiledLayout { session: String },
}

#[derive(Debug, Clone, Default)]
struct FakePane {
    output: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct FakeSessionState {
    panes: BTreeMap<String, FakePane>,
}

#[derive(Default)]
struct FakeMuxState {
    sessions: BTreeMap<String, FakeSessionState>,
    calls: Vec<MuxCall>,
    next_pane: u64,
    /// Remaining induced split failures
    split_failures: u32,
    /// Remaining induced session-create failures
    session_create_failures: u32,
    /// Scripted outcomes for successive splits (true = fail); consumed
    /// before `split_failures`
    split_plan: std::collections::VecDeque<bool>,
    /// Text preloaded into every new pane (e.g. a readiness banner)
    auto_output: Option<String>,
}

/// Fake multiplexer adapter for testing
#[derive(Clone, Default)]
pub struct FakeMux {
    inner: Arc<Mutex<FakeMuxState>>,
}

impl FakeMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<MuxCall> {
        self.inner.lock().calls.clone()
    }

    /// Make the next `count` pane splits fail.
    pub fn fail_next_splits(&self, count: u32) {
        self.inner.lock().split_failures = count;
    }

    /// Make the next `count` session creates fail.
    pub fn fail_next_session_creates(&self, count: u32) {
        self.inner.lock().session_create_failures = count;
    }

    /// Script the outcome of successive splits (true = fail). Lets a test
    /// spawn one agent cleanly and fail the next one's pane.
    pub fn set_split_plan(&self, plan: impl IntoIterator<Item = bool>) {
        self.inner.lock().split_plan = plan.into_iter().collect();
    }

    /// Preload every new pane with the given output text.
    pub fn set_auto_output(&self, text: impl Into<String>) {
        self.inner.lock().auto_output = Some(text.into());
    }

    /// Append a line to a pane's buffer.
    pub fn push_output(&self, session: &str, pane: &PaneId, line: impl Into<String>) {
        let mut state = self.inner.lock();
        if let Some(s) = state.sessions.get_mut(session) {
            if let Some(p) = s.panes.get_mut(pane.as_str()) {
                p.output.push(line.into());
            }
        }
    }

    /// Drop a pane out from under the orchestrator (crash simulation).
    pub fn crash_pane(&self, session: &str, pane: &PaneId) {
        let mut state = self.inner.lock();
        if let Some(s) = state.sessions.get_mut(session) {
            s.panes.remove(pane.as_str());
        }
    }

    pub fn session_exists(&self, name: &str) -> bool {
        self.inner.lock().sessions.contains_key(name)
    }

    pub fn pane_count(&self, session: &str) -> usize {
        self.inner
            .lock()
            .sessions
            .get(session)
            .map(|s| s.panes.len())
            .unwrap_or(0)
    }

    /// Keys sent to one pane, in order.
    pub fn sent_keys(&self, session: &str, pane: &PaneId) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MuxCall::SendKeys { session: s, pane: p, keys }
                    if s == session && p == pane.as_str() =>
                {
                    Some(keys.clone())
                }
                MuxCall::SendLiteral { session: s, pane: p, text }
                    if s == session && p == pane.as_str() =>
                {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[allow(clippy::unwrap_used)]
    fn mint_pane(state: &mut FakeMuxState) -> PaneId {
        let n = state.next_pane;
        state.next_pane += 1;
        PaneId::parse(&format!("%{n}")).unwrap()
    }
}

#[async_trait]
impl MuxAdapter for FakeMux {
    async fn create_session(&self, name: &str) -> Result<PaneId, MuxError> {
        validate_session_name(name)?;
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::CreateSession { name: name.to_string() });
        if state.sessions.contains_key(name) {
            return Err(MuxError::SessionExists(name.to_string()));
        }
        if state.session_create_failures > 0 {
            state.session_create_failures -= 1;
            return Err(MuxError::CommandFailed {
                details: "induced session create failure".to_string(),
            });
        }
        let pane = Self::mint_pane(&mut state);
        let mut session = FakeSessionState::default();
        let mut initial = FakePane::default();
        if let Some(text) = &state.auto_output {
            initial.output.push(text.clone());
        }
        session.panes.insert(pane.as_str().to_string(), initial);
        state.sessions.insert(name.to_string(), session);
        Ok(pane)
    }

    async fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        validate_session_name(name)?;
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::KillSession { name: name.to_string() });
        state.sessions.remove(name);
        Ok(())
    }

    async fn has_session(&self, name: &str) -> Result<bool, MuxError> {
        validate_session_name(name)?;
        Ok(self.inner.lock().sessions.contains_key(name))
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, MuxError> {
        let state = self.inner.lock();
        Ok(state
            .sessions
            .keys()
            .map(|name| SessionInfo {
                name: name.clone(),
                windows: 1,
                created: "0".to_string(),
                attached: false,
            })
            .collect())
    }

    async fn create_pane(
        &self,
        session: &str,
        vertical: bool,
        _percent: Option<u8>,
    ) -> Result<PaneId, MuxError> {
        validate_session_name(session)?;
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::CreatePane {
            session: session.to_string(),
            vertical,
        });
        if let Some(fail) = state.split_plan.pop_front() {
            if fail {
                return Err(MuxError::CommandFailed {
                    details: "scripted split failure".to_string(),
                });
            }
        } else if state.split_failures > 0 {
            state.split_failures -= 1;
            return Err(MuxError::CommandFailed {
                details: "induced split failure".to_string(),
            });
        }
        if !state.sessions.contains_key(session) {
            return Err(MuxError::SessionNotFound(session.to_string()));
        }
        let pane = Self::mint_pane(&mut state);
        let mut new_pane = FakePane::default();
        if let Some(text) = &state.auto_output {
            new_pane.output.push(text.clone());
        }
        if let Some(s) = state.sessions.get_mut(session) {
            s.panes.insert(pane.as_str().to_string(), new_pane);
        }
        Ok(pane)
    }

    async fn apply_tiled_layout(&self, session: &str) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::TiledLayout { session: session.to_string() });
        if !state.sessions.contains_key(session) {
            return Err(MuxError::SessionNotFound(session.to_string()));
        }
        Ok(())
    }

    async fn list_panes(&self, session: &str) -> Result<Vec<PaneInfo>, MuxError> {
        validate_session_name(session)?;
        let state = self.inner.lock();
        let s = state
            .sessions
            .get(session)
            .ok_or_else(|| MuxError::SessionNotFound(session.to_string()))?;
        Ok(s.panes
            .keys()
            .enumerate()
            .filter_map(|(index, id)| {
                Some(PaneInfo {
                    id: PaneId::parse(id).ok()?,
                    index: index as u32,
                    active: index == 0,
                })
            })
            .collect())
    }

    async fn kill_pane(&self, session: &str, pane: &PaneId) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::KillPane {
            session: session.to_string(),
            pane: pane.to_string(),
        });
        if let Some(s) = state.sessions.get_mut(session) {
            s.panes.remove(pane.as_str());
        }
        Ok(())
    }

    async fn send_keys(&self, session: &str, pane: &PaneId, keys: &str) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::SendKeys {
            session: session.to_string(),
            pane: pane.to_string(),
            keys: keys.to_string(),
        });
        pane_exists(&state, session, pane)
    }

    async fn send_literal(
        &self,
        session: &str,
        pane: &PaneId,
        text: &str,
    ) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::SendLiteral {
            session: session.to_string(),
            pane: pane.to_string(),
            text: text.to_string(),
        });
        pane_exists(&state, session, pane)
    }

    async fn send_enter(&self, session: &str, pane: &PaneId) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::SendEnter {
            session: session.to_string(),
            pane: pane.to_string(),
        });
        pane_exists(&state, session, pane)
    }

    async fn send_interrupt(&self, session: &str, pane: &PaneId) -> Result<(), MuxError> {
        validate_session_name(session)?;
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::SendInterrupt {
            session: session.to_string(),
            pane: pane.to_string(),
        });
        // Interrupting a dead pane is tolerated like the real teardown path
        Ok(())
    }

    async fn capture_pane(
        &self,
        session: &str,
        pane: &PaneId,
        lines: u32,
        _keep_ansi: bool,
    ) -> Result<String, MuxError> {
        validate_session_name(session)?;
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::Capture {
            session: session.to_string(),
            pane: pane.to_string(),
        });
        let s = state
            .sessions
            .get(session)
            .ok_or_else(|| MuxError::SessionNotFound(session.to_string()))?;
        let p = s
            .panes
            .get(pane.as_str())
            .ok_or_else(|| MuxError::PaneNotFound(pane.to_string()))?;
        let tail: Vec<&str> = p
            .output
            .iter()
            .rev()
            .take(lines as usize)
            .rev()
            .map(|s| s.as_str())
            .collect();
        Ok(tail.join("\n"))
    }
}

fn pane_exists(state: &FakeMuxState, session: &str, pane: &PaneId) -> Result<(), MuxError> {
    let s = state
        .sessions
        .get(session)
        .ok_or_else(|| MuxError::SessionNotFound(session.to_string()))?;
    if s.panes.contains_key(pane.as_str()) {
        Ok(())
    } else {
        Err(MuxError::PaneNotFound(pane.to_string()))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
