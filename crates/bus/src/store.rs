// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic JSON-array queue files.
//!
//! Each queue is one file holding a JSON array of messages. Writes go
//! write-to-temp-then-rename: a concurrent reader sees the pre-image or the
//! post-image, never a torn write. Reads are lenient: a single malformed
//! entry must not block delivery of the good ones.

use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use swarm_core::{Message, MessageType, Priority, Role};
use thiserror::Error;

/// Errors from queue operations.
///
/// Corrupt queue content is deliberately NOT an error: the queue degrades
/// to "no messages" until the producer overwrites it.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which side of the bus a queue file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Inbox,
    Outbox,
}

impl QueueKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            QueueKind::Inbox => "inbox",
            QueueKind::Outbox => "outbox",
        }
    }
}

/// Queue metadata for checkpoints: counts, not bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub count: usize,
    pub newest: Option<DateTime<Utc>>,
}

/// Per-role inbox/outbox queues rooted at `{session_root}/.swarm/messages`.
#[derive(Clone)]
pub struct MessageStore {
    root: PathBuf,
    tmp_counter: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

impl MessageStore {
    pub fn new(session_root: impl AsRef<Path>) -> Self {
        Self {
            root: session_root.as_ref().join(".swarm").join("messages"),
            tmp_counter: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Directory holding the queue files (visible for inspection tooling).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create both queue directories and an empty array file per role.
    /// Idempotent; existing queue files are left untouched.
    pub fn ensure_dirs(&self) -> Result<(), BusError> {
        for kind in [QueueKind::Inbox, QueueKind::Outbox] {
            let dir = self.root.join(kind.dir_name());
            fs::create_dir_all(&dir).map_err(|source| BusError::Io {
                path: dir.clone(),
                source,
            })?;
            for role in Role::ALL {
                let path = self.queue_path(kind, role);
                if !path.exists() {
                    self.write_atomic(&path, &[])?;
                }
            }
        }
        Ok(())
    }

    pub fn queue_path(&self, kind: QueueKind, role: Role) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(format!("{}.json", role))
    }

    /// Read a queue, dropping entries that fail validation.
    ///
    /// File absence, empty content, non-array JSON, and parse errors all
    /// resolve to the empty queue with a warning.
    pub fn read(&self, kind: QueueKind, role: Role) -> Result<Vec<Message>, BusError> {
        let path = self.queue_path(kind, role);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(BusError::Io { path, source }),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt queue file, treating as empty");
                return Ok(Vec::new());
            }
        };

        let Some(entries) = value.as_array() else {
            tracing::warn!(path = %path.display(), "queue file is not a JSON array, treating as empty");
            return Ok(Vec::new());
        };

        let mut messages = Vec::with_capacity(entries.len());
        for entry in entries {
            match Message::from_value(entry) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(path = %path.display(), error = %e, "dropping invalid queue entry");
                }
            }
        }
        Ok(messages)
    }

    /// Append one message: read, push, rewrite the whole array.
    pub fn append(&self, kind: QueueKind, role: Role, message: &Message) -> Result<(), BusError> {
        let mut messages = self.read(kind, role)?;
        messages.push(message.clone());
        self.write_atomic(&self.queue_path(kind, role), &messages)
    }

    /// Remove a message by id. Absence of the id is not an error.
    pub fn remove(&self, kind: QueueKind, role: Role, id: &str) -> Result<(), BusError> {
        let messages = self.read(kind, role)?;
        let filtered: Vec<Message> = messages.into_iter().filter(|m| m.id != id).collect();
        self.write_atomic(&self.queue_path(kind, role), &filtered)
    }

    /// Overwrite a queue with the empty array.
    pub fn clear(&self, kind: QueueKind, role: Role) -> Result<(), BusError> {
        self.write_atomic(&self.queue_path(kind, role), &[])
    }

    /// Pure projection: entries of one category.
    pub fn filter_by_type(
        &self,
        kind: QueueKind,
        role: Role,
        message_type: MessageType,
    ) -> Result<Vec<Message>, BusError> {
        Ok(self
            .read(kind, role)?
            .into_iter()
            .filter(|m| m.message_type == message_type)
            .collect())
    }

    /// Pure projection: entries at or above a priority floor, most urgent
    /// first (stable within a priority level).
    pub fn filter_min_priority(
        &self,
        kind: QueueKind,
        role: Role,
        floor: Priority,
    ) -> Result<Vec<Message>, BusError> {
        let mut messages: Vec<Message> = self
            .read(kind, role)?
            .into_iter()
            .filter(|m| m.priority >= floor)
            .collect();
        messages.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(messages)
    }

    /// Queue metadata for checkpoints.
    pub fn stats(&self, kind: QueueKind, role: Role) -> Result<QueueStats, BusError> {
        let messages = self.read(kind, role)?;
        Ok(QueueStats {
            count: messages.len(),
            newest: messages.iter().map(|m| m.timestamp).max(),
        })
    }

    /// Poll an inbox until a message is present.
    ///
    /// A zero timeout is a single non-blocking check. Returns the oldest
    /// entry without removing it; `None` when nothing arrives in time.
    pub fn poll_inbox(
        &self,
        role: Role,
        timeout: std::time::Duration,
        interval: std::time::Duration,
    ) -> Result<Option<Message>, BusError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let mut messages = self.read(QueueKind::Inbox, role)?;
            if !messages.is_empty() {
                return Ok(Some(messages.remove(0)));
            }
            if std::time::Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(interval);
        }
    }

    /// Entries dropped by validation since this store was opened.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Write the full array through a unique temp sibling, then rename.
    fn write_atomic(&self, path: &Path, messages: &[Message]) -> Result<(), BusError> {
        let n = self.tmp_counter.fetch_add(1, Ordering::SeqCst);
        let tmp = path.with_extension(format!("json.tmp.{n}"));

        let mut body = serde_json::to_string_pretty(messages)?;
        body.push('\n');

        if let Err(source) = fs::write(&tmp, body) {
            return Err(BusError::Io { path: tmp, source });
        }
        if let Err(source) = fs::rename(&tmp, path) {
            // Best-effort unlink of the orphaned temp file
            let _ = fs::remove_file(&tmp);
            return Err(BusError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
