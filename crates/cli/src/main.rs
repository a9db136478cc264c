// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! swarm: orchestrate a cohort of AI assistant agents in tmux panes and
//! git worktrees toward a single goal.

mod color;
mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use output::Output;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use swarm_adapters::{DesktopNotifier, GitWorktrees, MuxAdapter, TmuxMux, WorktreeAdapter};
use swarm_bus::{MessageStore, QueueKind};
use swarm_core::{Role, SessionId, SessionStatus, SwarmEvent, SystemClock, UuidIdGen};
use swarm_engine::{EngineError, SessionController, SwarmConfig};
use swarm_storage::AuditStore;

const EXIT_OK: u8 = 0;
const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_BUSY: u8 = 3;
const EXIT_INTERRUPT: u8 = 130;

#[derive(Parser)]
#[command(name = "swarm", version, about = "Multi-agent workflow orchestrator")]
struct Cli {
    /// Machine-readable JSON output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a workflow toward a goal
    Start {
        /// Template name: research, development, architecture, review
        workflow: String,
        /// The goal, as free text
        goal: Vec<String>,
        /// Whole-workflow timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Continue with a partial roster after unrecovered agent failures
        #[arg(long)]
        allow_partial: bool,
    },
    /// Attach the terminal to the live multiplexer session
    Attach,
    /// Show the latest session's state
    Status,
    /// Point at the session log (optionally for one role's queue traffic)
    Logs { role: Option<String> },
    /// Show queue contents for one role or all
    Messages { role: Option<String> },
    /// Stop the running session gracefully
    Stop,
    /// Stop the running session immediately
    Kill,
    /// Remove leftover worktrees, branches, and multiplexer sessions
    Clean,
    /// List past sessions
    History,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    let code = runtime.block_on(run(cli));
    ExitCode::from(code)
}

async fn run(cli: Cli) -> u8 {
    let config = SwarmConfig::from_env();
    let out = Output::new(cli.json, config.no_color);
    let root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("cannot determine working directory: {e}");
            return EXIT_FAILURE;
        }
    };

    let result = match cli.command {
        Command::Start {
            workflow,
            goal,
            timeout,
            allow_partial,
        } => return run_start(&root, config, out, &workflow, &goal.join(" "), timeout, allow_partial).await,
        Command::Attach => attach(&root, &out).await,
        Command::Status => status(&root, &out),
        Command::Logs { role } => logs(&root, &out, role.as_deref()),
        Command::Messages { role } => messages(&root, &out, role.as_deref()),
        Command::Stop | Command::Kill => teardown(&root, &out).await,
        Command::Clean => clean(&root, &out).await,
        Command::History => history(&root, &out),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:#}");
            EXIT_FAILURE
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_start(
    root: &Path,
    mut config: SwarmConfig,
    out: Output,
    workflow: &str,
    goal: &str,
    timeout: Option<u64>,
    allow_partial: bool,
) -> u8 {
    if let Some(secs) = timeout {
        config.workflow_timeout = Duration::from_secs(secs);
    }
    config.allow_partial = config.allow_partial || allow_partial;

    let (_log_guard, log_path) = match init_logging(root) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("logging setup failed: {e:#}");
            return EXIT_FAILURE;
        }
    };

    let audit = match AuditStore::open(&root.join(".swarm").join("memory.db")) {
        Ok(store) => store,
        Err(e) => {
            out.error(swarm_core::ErrorCode::DatabaseError, &e.to_string(), Some(&log_path));
            return EXIT_FAILURE;
        }
    };
    let controller = SessionController::new(
        config,
        root,
        TmuxMux::new(),
        GitWorktrees::new(root),
        MessageStore::new(root),
        audit,
        SystemClock,
        UuidIdGen,
        DesktopNotifier,
    );

    let mut events = controller.events();
    let session_id = match controller.start_workflow(workflow, goal).await {
        Ok(id) => id,
        Err(e) => {
            out.error(e.code(), &e.to_string(), Some(&log_path));
            return exit_code_for(&e);
        }
    };
    out.info(&format!(
        "session {session_id} started ({workflow}); attach with: tmux attach -t {}",
        session_id.mux_session_name()
    ));

    // Follow events until the session ends; Ctrl-C requests a graceful
    // stop, a second Ctrl-C forces it.
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if signal.is_err() {
                    return EXIT_FAILURE;
                }
                out.info("interrupt: stopping gracefully (Ctrl-C again to force)");
                tokio::select! {
                    _ = controller.stop() => {}
                    _ = tokio::signal::ctrl_c() => {
                        let _ = controller.kill().await;
                    }
                }
                return EXIT_INTERRUPT;
            }
            event = events.recv() => match event {
                Ok(SwarmEvent::SessionEnded { status, .. }) => {
                    return if status == SessionStatus::Complete {
                        out.info("workflow complete");
                        EXIT_OK
                    } else {
                        out.info(&format!("session ended: {status}"));
                        EXIT_FAILURE
                    };
                }
                Ok(event) => out.info(&event.log_summary()),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return EXIT_FAILURE,
            }
        }
    }
}

fn exit_code_for(error: &EngineError) -> u8 {
    use swarm_workflow::WorkflowError;
    match error {
        EngineError::SessionActive(_) => EXIT_BUSY,
        EngineError::EmptyGoal => EXIT_USAGE,
        EngineError::Workflow(WorkflowError::TemplateNotFound(_)) => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

fn open_store(root: &Path) -> anyhow::Result<AuditStore> {
    AuditStore::open(&root.join(".swarm").join("memory.db")).context("opening audit store")
}

fn latest_session(store: &AuditStore) -> anyhow::Result<Option<swarm_storage::SessionRow>> {
    Ok(store.list_sessions()?.into_iter().next())
}

fn status(root: &Path, out: &Output) -> anyhow::Result<u8> {
    let store = open_store(root)?;
    match latest_session(&store)? {
        Some(row) => {
            out.session_row(&row);
            Ok(EXIT_OK)
        }
        None => {
            out.info("no sessions yet");
            Ok(EXIT_OK)
        }
    }
}

fn history(root: &Path, out: &Output) -> anyhow::Result<u8> {
    let store = open_store(root)?;
    for row in store.list_sessions()? {
        out.session_row(&row);
    }
    Ok(EXIT_OK)
}

fn messages(root: &Path, out: &Output, role: Option<&str>) -> anyhow::Result<u8> {
    let bus = MessageStore::new(root);
    let roles: Vec<Role> = match role {
        Some(name) => vec![name.parse().map_err(|e| anyhow::anyhow!("{e}"))?],
        None => Role::ALL.to_vec(),
    };
    for role in roles {
        for kind in [QueueKind::Inbox, QueueKind::Outbox] {
            for message in bus.read(kind, role)? {
                out.message(&message);
            }
        }
    }
    Ok(EXIT_OK)
}

fn logs(root: &Path, out: &Output, _role: Option<&str>) -> anyhow::Result<u8> {
    let dir = root.join("logs");
    let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
        .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    entries.sort();
    match entries.last() {
        Some(path) => {
            out.info(&format!("log file: {}", path.display()));
            let content = std::fs::read_to_string(path).unwrap_or_default();
            for line in content.lines().rev().take(50).collect::<Vec<_>>().into_iter().rev() {
                out.info(line);
            }
            Ok(EXIT_OK)
        }
        None => {
            out.info("no logs yet");
            Ok(EXIT_OK)
        }
    }
}

async fn attach(root: &Path, out: &Output) -> anyhow::Result<u8> {
    let store = open_store(root)?;
    let Some(row) = latest_session(&store)? else {
        out.info("no session to attach to");
        return Ok(EXIT_FAILURE);
    };
    let session_id = SessionId::parse(&row.id).map_err(|e| anyhow::anyhow!("{e}"))?;
    let target = session_id.mux_session_name();
    let status = std::process::Command::new("tmux")
        .args(["attach-session", "-t", &target])
        .status()
        .context("running tmux attach")?;
    Ok(if status.success() { EXIT_OK } else { EXIT_FAILURE })
}

/// Stop/kill from a fresh process: tear down the latest session's
/// resources and mark it cancelled.
async fn teardown(root: &Path, out: &Output) -> anyhow::Result<u8> {
    let store = open_store(root)?;
    let Some(row) = latest_session(&store)? else {
        out.info("nothing to stop");
        return Ok(EXIT_OK);
    };
    let session_id = SessionId::parse(&row.id).map_err(|e| anyhow::anyhow!("{e}"))?;

    let mux = TmuxMux::new();
    mux.kill_session(&session_id.mux_session_name()).await.ok();
    let worktrees = GitWorktrees::new(root);
    worktrees.remove_all(&Role::AGENTS, &session_id).await;

    let terminal = matches!(row.status.as_str(), "complete" | "failed" | "cancelled");
    if !terminal {
        store.update_session_status(&session_id, SessionStatus::Cancelled, chrono::Utc::now())?;
    }
    out.info(&format!("session {session_id} stopped"));
    Ok(EXIT_OK)
}

/// Remove every swarm-owned resource this repository still carries.
async fn clean(root: &Path, out: &Output) -> anyhow::Result<u8> {
    let mux = TmuxMux::new();
    for info in mux.list_sessions().await.unwrap_or_default() {
        if info.name.starts_with("swarm_") {
            mux.kill_session(&info.name).await.ok();
            out.info(&format!("killed {}", info.name));
        }
    }

    let worktrees = GitWorktrees::new(root);
    for entry in worktrees.list_swarm().await.unwrap_or_default() {
        worktrees.remove(entry.role, &entry.session_id).await.ok();
        out.info(&format!(
            "removed worktree {} ({})",
            entry.info.path.display(),
            entry.role
        ));
    }
    worktrees.prune().await.ok();
    Ok(EXIT_OK)
}

fn init_logging(root: &Path) -> anyhow::Result<(tracing_appender::non_blocking::WorkerGuard, PathBuf)> {
    use tracing_subscriber::EnvFilter;

    let dir = root.join("logs");
    std::fs::create_dir_all(&dir).context("creating logs directory")?;
    let file_name = format!("{}.log", chrono::Utc::now().timestamp_millis());
    let appender = tracing_appender::rolling::never(&dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok((guard, dir.join(file_name)))
}
