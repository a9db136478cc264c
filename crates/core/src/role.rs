// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed set of agent roles.
//!
//! Role names double as queue file names (`inbox/{role}.json`) and as the
//! role segment of worktree branches, so the set is closed and lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A named responsibility within a workflow.
///
/// `Orchestrator` is a pseudo-role: it participates in message routing but
/// never gets a pane or a worktree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Researcher,
    Developer,
    Reviewer,
    Architect,
    Orchestrator,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    /// Every role, including the orchestrator pseudo-role.
    pub const ALL: [Role; 5] = [
        Role::Researcher,
        Role::Developer,
        Role::Reviewer,
        Role::Architect,
        Role::Orchestrator,
    ];

    /// Roles that run as live agents (pane + worktree).
    pub const AGENTS: [Role; 4] = [
        Role::Researcher,
        Role::Developer,
        Role::Reviewer,
        Role::Architect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Researcher => "researcher",
            Role::Developer => "developer",
            Role::Reviewer => "reviewer",
            Role::Architect => "architect",
            Role::Orchestrator => "orchestrator",
        }
    }

    /// Whether this role is backed by a live agent process.
    pub fn is_agent(&self) -> bool {
        !matches!(self, Role::Orchestrator)
    }

    pub fn parse(s: &str) -> Result<Role, UnknownRole> {
        match s {
            "researcher" => Ok(Role::Researcher),
            "developer" => Ok(Role::Developer),
            "reviewer" => Ok(Role::Reviewer),
            "architect" => Ok(Role::Architect),
            "orchestrator" => Ok(Role::Orchestrator),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s)
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
