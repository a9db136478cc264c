// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification adapters.
//!
//! Used by the recovery engine's `notify` action. Delivery is best-effort;
//! a failed desktop notification is logged, never propagated.

use async_trait::async_trait;

/// Adapter for user-facing notifications
#[async_trait]
pub trait Notifier: Clone + Send + Sync + 'static {
    async fn notify(&self, title: &str, message: &str);
}

/// Desktop notifications via the platform notification service
#[derive(Clone, Default)]
pub struct DesktopNotifier;

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, title: &str, message: &str) {
        let result = notify_rust::Notification::new()
            .summary(title)
            .body(message)
            .show();
        if let Err(e) = result {
            tracing::warn!(title, error = %e, "desktop notification failed");
        }
    }
}

/// Notifier that drops everything (headless / CI runs)
#[derive(Clone, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _title: &str, _message: &str) {}
}

/// Recording notifier for tests
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: std::sync::Arc<parking_lot::Mutex<Vec<(String, String)>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, message: &str) {
        self.sent.lock().push((title.to_string(), message.to_string()));
    }
}
