// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human and machine output rendering.

use crate::color::Paint;
use swarm_core::{ErrorCode, Message};
use swarm_storage::SessionRow;

/// Output mode selected on the command line.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub paint: Paint,
}

impl Output {
    pub fn new(json: bool, no_color: bool) -> Self {
        Self {
            json,
            paint: Paint::detect(no_color),
        }
    }

    pub fn session_row(&self, row: &SessionRow) {
        if self.json {
            println!(
                "{}",
                serde_json::json!({
                    "id": row.id,
                    "workflow": row.workflow_type,
                    "goal": row.goal,
                    "status": row.status,
                    "created_at": row.created_at,
                    "completed_at": row.completed_at,
                })
            );
        } else {
            println!(
                "{}  {}  {}  {}",
                self.paint.bold(&row.id),
                row.workflow_type,
                self.paint.status(&row.status),
                self.paint.dim(&row.goal),
            );
        }
    }

    pub fn message(&self, message: &Message) {
        if self.json {
            println!(
                "{}",
                serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string())
            );
        } else {
            println!(
                "{}  {}  {}",
                self.paint.dim(&message.timestamp.to_rfc3339()),
                message.log_summary(),
                self.paint.dim(message.priority.as_str()),
            );
        }
    }

    pub fn info(&self, text: &str) {
        if !self.json {
            println!("{text}");
        }
    }

    /// One-line error with the per-code remediation hint and log pointer.
    pub fn error(&self, code: ErrorCode, detail: &str, log_path: Option<&std::path::Path>) {
        if self.json {
            eprintln!(
                "{}",
                serde_json::json!({
                    "error": code.as_str(),
                    "detail": detail,
                    "remediation": code.remediation(),
                })
            );
            return;
        }
        eprintln!("{} {}", self.paint.red(code.as_str()), detail);
        if let Some(hint) = code.remediation() {
            eprintln!("  {} {hint}", self.paint.yellow("hint:"));
        }
        if let Some(path) = log_path {
            eprintln!("  {} {}", self.paint.dim("log:"), path.display());
        }
    }
}
