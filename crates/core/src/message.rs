// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The immutable message record exchanged through inbox/outbox queues.
//!
//! Messages are written once and never mutated. Validation happens on read
//! (the queues are shared with external agent processes we don't control),
//! never on write-by-ourselves.

use crate::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Message categories. Stage definitions accept and produce these.
///
/// `Task` doubles as the delegator/assignment category; it is routable
/// everywhere even though not every template consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Task,
    Finding,
    Artifact,
    Review,
    Design,
    Status,
    Question,
    Result,
    Feedback,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Task => "task",
            MessageType::Finding => "finding",
            MessageType::Artifact => "artifact",
            MessageType::Review => "review",
            MessageType::Design => "design",
            MessageType::Status => "status",
            MessageType::Question => "question",
            MessageType::Result => "result",
            MessageType::Feedback => "feedback",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority, ordered `critical > high > normal > low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message destination: a single role or every role but the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    Role(Role),
    Broadcast,
}

impl Recipient {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recipient::Role(role) => role.as_str(),
            Recipient::Broadcast => "broadcast",
        }
    }
}

impl From<Role> for Recipient {
    fn from(role: Role) -> Self {
        Recipient::Role(role)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Wire form is a bare string: a role name or the literal "broadcast".
impl Serialize for Recipient {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Recipient {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "broadcast" {
            return Ok(Recipient::Broadcast);
        }
        Role::parse(&s)
            .map(Recipient::Role)
            .map_err(serde::de::Error::custom)
    }
}

/// Subject, body, and the optional attachment/metadata payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// An immutable message record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub from: Role,
    pub to: Recipient,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub priority: Priority,
    pub content: MessageContent,
    #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(rename = "requiresResponse")]
    pub requires_response: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

/// Why a queue entry was rejected on read.
#[derive(Debug, Error)]
pub enum InvalidMessage {
    #[error("not an object")]
    NotAnObject,
    #[error("empty id")]
    EmptyId,
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Message {
    /// Create a message with normal priority and no optional fields.
    ///
    /// Callers supply the id and timestamp so that minting stays in one
    /// place (the session controller's `IdGen` and `Clock`).
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        from: Role,
        to: impl Into<Recipient>,
        message_type: MessageType,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            from,
            to: to.into(),
            message_type,
            priority: Priority::Normal,
            content: MessageContent {
                subject: subject.into(),
                body: body.into(),
                attachments: Vec::new(),
                metadata: BTreeMap::new(),
            },
            thread_id: None,
            requires_response: false,
            deadline: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.content.metadata.insert(key.into(), value);
        self
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.content.attachments.push(path.into());
        self
    }

    pub fn require_response(mut self) -> Self {
        self.requires_response = true;
        self
    }

    /// Parse and validate a raw queue entry.
    ///
    /// Accepts iff the entry has non-empty `id`, parseable `timestamp`,
    /// known `from`/`to`/`type`/`priority`, `content` with string subject
    /// and body, and a boolean `requiresResponse`. Optional fields are not
    /// validated beyond shape.
    pub fn from_value(value: &serde_json::Value) -> Result<Message, InvalidMessage> {
        if !value.is_object() {
            return Err(InvalidMessage::NotAnObject);
        }
        let message: Message = serde_json::from_value(value.clone())?;
        if message.id.trim().is_empty() {
            return Err(InvalidMessage::EmptyId);
        }
        Ok(message)
    }

    /// Well-known metadata lookup: review verdict (`APPROVED`, ...).
    pub fn verdict(&self) -> Option<&str> {
        self.content.metadata.get("verdict").and_then(|v| v.as_str())
    }

    /// Well-known metadata lookup: freeform status tag.
    pub fn status(&self) -> Option<&str> {
        self.content.metadata.get("status").and_then(|v| v.as_str())
    }

    /// Sort key for outbox draining: emit time, then id for a stable
    /// tie-break between equal timestamps.
    pub fn emit_key(&self) -> (DateTime<Utc>, &str) {
        (self.timestamp, &self.id)
    }

    pub fn log_summary(&self) -> String {
        format!(
            "{} {}→{} [{}] {}",
            crate::id::ShortId::short(self.id.as_str(), 8),
            self.from,
            self.to,
            self.message_type,
            self.content.subject,
        )
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
