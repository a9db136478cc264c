// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite audit store.
//!
//! Append-only history: sessions, messages, agent activity, errors, and
//! checkpoints. Single writer (the orchestrator), WAL journal, foreign
//! keys enforced. JSON payloads are TEXT columns.

use crate::checkpoint::Checkpoint;
use crate::StorageError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use swarm_core::{ErrorRecord, Message, Role, SessionId, SessionStatus};

/// Agent activity event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Spawned,
    Ready,
    Message,
    Complete,
    Error,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Spawned => "spawned",
            ActivityKind::Ready => "ready",
            ActivityKind::Message => "message",
            ActivityKind::Complete => "complete",
            ActivityKind::Error => "error",
        }
    }
}

/// One row of the sessions table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub id: String,
    pub workflow_type: String,
    pub goal: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

/// Handle to the audit database. Cheap to clone; one writer inside.
#[derive(Clone)]
pub struct AuditStore {
    conn: Arc<Mutex<Connection>>,
}

impl AuditStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "could not create db directory");
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self::from_conn(conn)?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_conn(Connection::open_in_memory()?)
    }

    fn from_conn(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn insert_session(
        &self,
        id: &SessionId,
        workflow_type: &str,
        goal: &str,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (id, workflow_type, goal, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                id.as_str(),
                workflow_type,
                goal,
                status.as_str(),
                now.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn update_session_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let completed_at = status.is_terminal().then(|| now.to_rfc3339());
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET status = ?2, updated_at = ?3, completed_at = COALESCE(?4, completed_at)
             WHERE id = ?1",
            params![id.as_str(), status.as_str(), now.to_rfc3339(), completed_at],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Option<SessionRow>, StorageError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, workflow_type, goal, status, created_at, updated_at, completed_at
                 FROM sessions WHERE id = ?1",
                [id.as_str()],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        workflow_type: row.get(1)?,
                        goal: row.get(2)?,
                        status: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                        completed_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRow>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, workflow_type, goal, status, created_at, updated_at, completed_at
             FROM sessions ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SessionRow {
                    id: row.get(0)?,
                    workflow_type: row.get(1)?,
                    goal: row.get(2)?,
                    status: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                    completed_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Record a message in history (the on-disk queue stays the live copy).
    pub fn record_message(
        &self,
        session_id: &SessionId,
        message: &Message,
    ) -> Result<(), StorageError> {
        let content_json = serde_json::to_string(&message.content)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO messages
             (id, session_id, thread_id, from_agent, to_agent, message_type, priority, content_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                message.id,
                session_id.as_str(),
                message.thread_id,
                message.from.as_str(),
                message.to.as_str(),
                message.message_type.as_str(),
                message.priority.as_str(),
                content_json,
                message.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn messages_for_session(
        &self,
        session_id: &SessionId,
        role: Option<Role>,
    ) -> Result<Vec<Message>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, from_agent, to_agent, message_type, priority, content_json, created_at
             FROM messages WHERE session_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map([session_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut messages = Vec::with_capacity(rows.len());
        for (id, thread_id, from, to, message_type, priority, content_json, created_at) in rows {
            let value = serde_json::json!({
                "id": id,
                "timestamp": created_at,
                "from": from,
                "to": to,
                "type": message_type,
                "priority": priority,
                "content": serde_json::from_str::<serde_json::Value>(&content_json)?,
                "threadId": thread_id,
                "requiresResponse": false,
            });
            let message = Message::from_value(&value)
                .map_err(|e| StorageError::Corrupt(format!("message {id}: {e}")))?;
            if role.is_none_or(|r| message.from == r) {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    pub fn record_activity(
        &self,
        session_id: &SessionId,
        role: Role,
        kind: ActivityKind,
        details: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO agent_activity (session_id, agent_role, event_type, details_json, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id.as_str(),
                role.as_str(),
                kind.as_str(),
                details.to_string(),
                now.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn activity_count(
        &self,
        session_id: &SessionId,
        role: Option<Role>,
    ) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let count: i64 = match role {
            Some(role) => conn.query_row(
                "SELECT COUNT(*) FROM agent_activity WHERE session_id = ?1 AND agent_role = ?2",
                params![session_id.as_str(), role.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM agent_activity WHERE session_id = ?1",
                [session_id.as_str()],
                |row| row.get(0),
            )?,
        };
        Ok(count as usize)
    }

    pub fn record_error(
        &self,
        session_id: Option<&SessionId>,
        error: &ErrorRecord,
    ) -> Result<(), StorageError> {
        let context_json = if error.context.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&error.context)?)
        };
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO error_log
             (id, session_id, code, category, severity, message, details, component, agent_role,
              recoverable, recovered, recovery_strategy, context_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                error.id,
                session_id.map(|s| s.as_str()),
                error.code.as_str(),
                error.category.to_string(),
                error.severity.to_string(),
                error.message,
                error.cause.as_ref().map(|c| c.log_summary()),
                error.component,
                error.role.map(|r| r.as_str()),
                error.recoverable as i64,
                error.recovered as i64,
                error.recovery_strategy,
                context_json,
                error.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Flip the recovered flag once a recovery outcome is known.
    pub fn mark_error_recovered(
        &self,
        error_id: &str,
        strategy: &str,
        recovered: bool,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE error_log SET recovered = ?2, recovery_strategy = ?3 WHERE id = ?1",
            params![error_id, recovered as i64, strategy],
        )?;
        Ok(())
    }

    /// (code, severity, message, recovered) rows for a session, oldest first.
    pub fn errors_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<(String, String, String, bool)>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT code, severity, message, recovered FROM error_log
             WHERE session_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map([session_id.as_str()], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get::<_, i64>(3)? != 0,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO checkpoints
             (id, session_id, type, created_at, created_by, workflow_state_json, agent_states_json,
              message_queue_json, completed_stages_json, pending_stages_json, errors_json, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                checkpoint.id,
                checkpoint.session_id.as_str(),
                checkpoint.kind.as_str(),
                checkpoint.created_at.to_rfc3339(),
                checkpoint.created_by,
                serde_json::to_string(&checkpoint.workflow)?,
                serde_json::to_string(&checkpoint.agents)?,
                serde_json::to_string(&checkpoint.queues)?,
                serde_json::to_string(&checkpoint.completed_stages)?,
                serde_json::to_string(&checkpoint.pending_stages)?,
                serde_json::to_string(&checkpoint.errors)?,
                checkpoint.notes,
            ],
        )?;
        Ok(())
    }

    /// Keep only the newest `keep` checkpoints for a session.
    pub fn prune_checkpoints(
        &self,
        session_id: &SessionId,
        keep: usize,
    ) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM checkpoints WHERE session_id = ?1 AND id NOT IN (
                 SELECT id FROM checkpoints WHERE session_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2
             )",
            params![session_id.as_str(), keep as i64],
        )?;
        Ok(removed)
    }

    pub fn checkpoint_count(&self, session_id: &SessionId) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM checkpoints WHERE session_id = ?1",
            [session_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn latest_checkpoint(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Checkpoint>, StorageError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, type, created_at, created_by, workflow_state_json, agent_states_json,
                        message_queue_json, completed_stages_json, pending_stages_json, errors_json, notes
                 FROM checkpoints WHERE session_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                [session_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, String>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, Option<String>>(10)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            id,
            kind,
            created_at,
            created_by,
            workflow_json,
            agents_json,
            queues_json,
            completed_json,
            pending_json,
            errors_json,
            notes,
        )) = row
        else {
            return Ok(None);
        };

        let kind = serde_json::from_value(serde_json::Value::String(kind.clone()))
            .map_err(|_| StorageError::Corrupt(format!("checkpoint kind {kind:?}")))?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| StorageError::Corrupt(format!("checkpoint timestamp: {e}")))?
            .with_timezone(&Utc);

        Ok(Some(Checkpoint {
            id,
            session_id: session_id.clone(),
            kind,
            created_at,
            created_by,
            workflow: serde_json::from_str(&workflow_json)?,
            agents: serde_json::from_str(&agents_json)?,
            queues: serde_json::from_str(&queues_json)?,
            completed_stages: serde_json::from_str(&completed_json)?,
            pending_stages: serde_json::from_str(&pending_json)?,
            errors: serde_json::from_str(&errors_json)?,
            notes,
        }))
    }
}

fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            workflow_type TEXT NOT NULL,
            goal TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            completed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            thread_id TEXT,
            from_agent TEXT NOT NULL,
            to_agent TEXT NOT NULL,
            message_type TEXT NOT NULL,
            priority TEXT NOT NULL,
            content_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        );

        CREATE TABLE IF NOT EXISTS agent_activity (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            agent_role TEXT NOT NULL,
            event_type TEXT NOT NULL,
            details_json TEXT,
            timestamp TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        );

        CREATE TABLE IF NOT EXISTS error_log (
            id TEXT PRIMARY KEY,
            session_id TEXT,
            code TEXT NOT NULL,
            category TEXT NOT NULL,
            severity TEXT NOT NULL,
            message TEXT NOT NULL,
            details TEXT,
            component TEXT NOT NULL,
            agent_role TEXT,
            recoverable INTEGER NOT NULL DEFAULT 0,
            recovered INTEGER NOT NULL DEFAULT 0,
            recovery_strategy TEXT,
            stack TEXT,
            context_json TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        );

        CREATE TABLE IF NOT EXISTS checkpoints (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            type TEXT NOT NULL,
            created_at TEXT NOT NULL,
            created_by TEXT NOT NULL,
            workflow_state_json TEXT NOT NULL,
            agent_states_json TEXT NOT NULL,
            message_queue_json TEXT NOT NULL,
            completed_stages_json TEXT NOT NULL,
            pending_stages_json TEXT NOT NULL,
            errors_json TEXT,
            notes TEXT,
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);
        CREATE INDEX IF NOT EXISTS idx_activity_session ON agent_activity(session_id);
        CREATE INDEX IF NOT EXISTS idx_errors_session ON error_log(session_id);
        CREATE INDEX IF NOT EXISTS idx_errors_code ON error_log(code);
        CREATE INDEX IF NOT EXISTS idx_errors_severity ON error_log(severity);
        CREATE INDEX IF NOT EXISTS idx_checkpoints_session ON checkpoints(session_id);
        "#,
    )
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
