// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

mod commands;
mod config;
mod format;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use format::OutputFormat;
use hub_core::{ConsistencyMode, Priority, RowId, RuntimeMode, TaskStatus};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Exit code for runtime/tool errors.
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "hub", version, about = "Agent coordination hub CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the persisted state snapshot.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Path to a TOML config file overlaid on environment defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormatArg::JsonPretty)]
    format: OutputFormatArg,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    Json,
    JsonPretty,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(v: OutputFormatArg) -> Self {
        match v {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::JsonPretty => OutputFormat::JsonPretty,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum PriorityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<PriorityArg> for Priority {
    fn from(v: PriorityArg) -> Self {
        match v {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
            PriorityArg::Critical => Priority::Critical,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum RuntimeModeArg {
    Repo,
    Isolated,
    Any,
}

impl From<RuntimeModeArg> for RuntimeMode {
    fn from(v: RuntimeModeArg) -> Self {
        match v {
            RuntimeModeArg::Repo => RuntimeMode::Repo,
            RuntimeModeArg::Isolated => RuntimeMode::Isolated,
            RuntimeModeArg::Any => RuntimeMode::Any,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum ConsistencyModeArg {
    Relaxed,
    Strict,
}

impl From<ConsistencyModeArg> for ConsistencyMode {
    fn from(v: ConsistencyModeArg) -> Self {
        match v {
            ConsistencyModeArg::Relaxed => ConsistencyMode::Relaxed,
            ConsistencyModeArg::Strict => ConsistencyMode::Strict,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum TaskStatusArg {
    Pending,
    InProgress,
    Blocked,
    Done,
    Cancelled,
}

impl From<TaskStatusArg> for TaskStatus {
    fn from(v: TaskStatusArg) -> Self {
        match v {
            TaskStatusArg::Pending => TaskStatus::Pending,
            TaskStatusArg::InProgress => TaskStatus::InProgress,
            TaskStatusArg::Blocked => TaskStatus::Blocked,
            TaskStatusArg::Done => TaskStatus::Done,
            TaskStatusArg::Cancelled => TaskStatus::Cancelled,
        }
    }
}

#[allow(clippy::large_enum_variant)]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a plain-text message.
    SendMessage {
        #[arg(long)]
        from: String,
        /// Omit for a broadcast.
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        content: String,
        #[arg(long)]
        metadata: Option<String>,
        #[arg(long)]
        trace_id: Option<String>,
        #[arg(long)]
        span_id: Option<String>,
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Store a payload as a content-addressed blob and send its reference.
    SendBlobMessage {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        payload: String,
        /// One of none, whitespace, json, auto, lossless_auto.
        #[arg(long, default_value = "auto")]
        compression_mode: String,
        #[arg(long)]
        metadata: Option<String>,
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Read messages visible to an agent.
    ReadMessages {
        #[arg(long)]
        agent_id: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        unread_only: bool,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        since_ts: Option<i64>,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        polling: bool,
        /// One of full, compact, tiny, nano.
        #[arg(long, default_value = "compact")]
        response_mode: String,
        #[arg(long)]
        resolve_blob_refs: bool,
    },

    /// Create a task.
    CreateTask {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        created_by: String,
        #[arg(long)]
        assigned_to: Option<String>,
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
        #[arg(long)]
        namespace: Option<String>,
        /// Comma-separated task ids this task depends on.
        #[arg(long, value_delimiter = ',')]
        depends_on: Vec<RowId>,
        #[arg(long, value_enum, default_value_t = RuntimeModeArg::Any)]
        execution_mode: RuntimeModeArg,
        #[arg(long, value_enum)]
        consistency_mode_override: Option<ConsistencyModeArg>,
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Transition or amend a task.
    UpdateTask {
        #[arg(long)]
        task_id: RowId,
        #[arg(long)]
        updating_agent: String,
        #[arg(long, value_enum)]
        status: TaskStatusArg,
        #[arg(long)]
        confidence: Option<f64>,
        #[arg(long)]
        verification_passed: Option<bool>,
        #[arg(long)]
        verified_by: Option<String>,
        /// Comma-separated evidence references.
        #[arg(long, value_delimiter = ',')]
        evidence_refs: Vec<String>,
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// List tasks matching filters, newest first.
    ListTasks {
        #[arg(long, value_enum)]
        status: Option<TaskStatusArg>,
        #[arg(long)]
        assigned_to: Option<String>,
        #[arg(long)]
        namespace: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value = "compact")]
        response_mode: String,
    },

    /// Poll for the best claimable task and claim it in one step.
    PollAndClaim {
        #[arg(long)]
        agent_id: String,
        #[arg(long, default_value_t = 60)]
        lease_seconds: u64,
    },

    /// Claim a specific task by id.
    ClaimTask {
        #[arg(long)]
        task_id: RowId,
        #[arg(long)]
        agent_id: String,
        #[arg(long, default_value_t = 60)]
        lease_seconds: u64,
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Extend a held claim's lease.
    RenewTaskClaim {
        #[arg(long)]
        task_id: RowId,
        #[arg(long)]
        agent_id: String,
        #[arg(long, default_value_t = 60)]
        lease_seconds: u64,
    },

    /// Transition a task and drop its claim in one step.
    ReleaseTaskClaim {
        #[arg(long)]
        task_id: RowId,
        #[arg(long)]
        agent_id: String,
        #[arg(long, value_enum)]
        next_status: TaskStatusArg,
        #[arg(long)]
        confidence: Option<f64>,
        #[arg(long)]
        verification_passed: Option<bool>,
        #[arg(long)]
        verified_by: Option<String>,
        #[arg(long, value_delimiter = ',')]
        evidence_refs: Vec<String>,
    },

    /// List all claim rows, live or expired.
    ListTaskClaims,

    /// Attach an artifact to a task.
    AttachTaskArtifact {
        #[arg(long)]
        task_id: RowId,
        #[arg(long)]
        artifact_id: String,
        #[arg(long)]
        attached_by: String,
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// List artifacts attached to a task.
    ListTaskArtifacts {
        #[arg(long)]
        task_id: RowId,
        #[arg(long)]
        requesting_agent: String,
    },

    /// Assemble the handoff packet for a task.
    GetTaskHandoff {
        #[arg(long)]
        task_id: RowId,
        #[arg(long)]
        requesting_agent: String,
        #[arg(long, default_value = "compact")]
        response_mode: String,
        #[arg(long)]
        include_downloads: bool,
        #[arg(long, default_value_t = 3600)]
        download_ttl_sec: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_RUNTIME_ERROR
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let state_path = config::resolve_state_path(cli.state);
    let hub_config = config::load_config(cli.config.as_deref())?;

    let log_format = hub_telemetry::LogFormat::parse(&hub_config.log_format);
    let log_level = if cli.debug { "debug" } else { hub_config.log_level.as_str() };
    hub_telemetry::init_tracing(log_format, log_level);

    let hub = commands::load_state(hub_config, &state_path)?;
    let mutates = command_mutates(&cli.command);

    let (value, code) = match cli.command {
        Commands::SendMessage { from, to, content, metadata, trace_id, span_id, idempotency_key } => {
            commands::render(hub_daemon::send_message(
                &hub,
                hub_daemon::SendMessageRequest {
                    from_agent: from,
                    to_agent: to,
                    content,
                    metadata,
                    trace_id,
                    span_id,
                    runtime_profile: None,
                    idempotency_key,
                },
            ))
        }
        Commands::SendBlobMessage { from, to, payload, compression_mode, metadata, idempotency_key } => {
            commands::render(hub_daemon::send_blob_message(
                &hub,
                hub_daemon::SendBlobMessageRequest {
                    from_agent: from,
                    to_agent: to,
                    payload,
                    compression_mode,
                    metadata,
                    trace_id: None,
                    span_id: None,
                    runtime_profile: None,
                    idempotency_key,
                },
            ))
        }
        Commands::ReadMessages {
            agent_id,
            from,
            unread_only,
            limit,
            offset,
            since_ts,
            cursor,
            polling,
            response_mode,
            resolve_blob_refs,
        } => commands::render(hub_daemon::read_messages(
            &hub,
            hub_daemon::ReadMessagesRequest {
                agent_id,
                from,
                unread_only,
                limit,
                offset,
                since_ts,
                cursor,
                polling,
                response_mode,
                resolve_blob_refs,
            },
        )),
        Commands::CreateTask {
            title,
            description,
            created_by,
            assigned_to,
            priority,
            namespace,
            depends_on,
            execution_mode,
            consistency_mode_override,
            idempotency_key,
        } => commands::render(hub_daemon::create_task(
            &hub,
            hub_daemon::CreateTaskRequest {
                title,
                description,
                created_by,
                assigned_to,
                priority: priority.into(),
                namespace,
                depends_on: depends_on.into_iter().collect::<BTreeSet<RowId>>(),
                execution_mode: execution_mode.into(),
                consistency_mode_override: consistency_mode_override.map(Into::into),
                runtime_profile: None,
                idempotency_key,
            },
        )),
        Commands::UpdateTask {
            task_id,
            updating_agent,
            status,
            confidence,
            verification_passed,
            verified_by,
            evidence_refs,
            idempotency_key,
        } => commands::render(hub_daemon::update_task(
            &hub,
            hub_daemon::UpdateTaskRequest {
                task_id,
                updating_agent,
                status: status.into(),
                confidence,
                verification_passed,
                verified_by,
                evidence_refs: none_if_empty(evidence_refs),
                runtime_profile: None,
                idempotency_key,
            },
        )),
        Commands::ListTasks { status, assigned_to, namespace, limit, offset, response_mode } => {
            commands::render(hub_daemon::list_tasks(
                &hub,
                hub_daemon::ListTasksRequest {
                    status: status.map(Into::into),
                    assigned_to,
                    namespace,
                    limit,
                    offset,
                    response_mode,
                },
            ))
        }
        Commands::PollAndClaim { agent_id, lease_seconds } => commands::render(hub_daemon::poll_and_claim(
            &hub,
            hub_daemon::PollAndClaimRequest { agent_id, lease_seconds, runtime_profile: None },
        )),
        Commands::ClaimTask { task_id, agent_id, lease_seconds, idempotency_key } => {
            commands::render(hub_daemon::claim_task(
                &hub,
                hub_daemon::ClaimTaskRequest {
                    task_id,
                    agent_id,
                    lease_seconds,
                    runtime_profile: None,
                    idempotency_key,
                },
            ))
        }
        Commands::RenewTaskClaim { task_id, agent_id, lease_seconds } => {
            commands::render(hub_daemon::renew_task_claim(
                &hub,
                hub_daemon::RenewTaskClaimRequest { task_id, agent_id, lease_seconds, runtime_profile: None },
            ))
        }
        Commands::ReleaseTaskClaim {
            task_id,
            agent_id,
            next_status,
            confidence,
            verification_passed,
            verified_by,
            evidence_refs,
        } => commands::render(hub_daemon::release_task_claim(
            &hub,
            hub_daemon::ReleaseTaskClaimRequest {
                task_id,
                agent_id,
                next_status: next_status.into(),
                confidence,
                verification_passed,
                verified_by,
                evidence_refs: none_if_empty(evidence_refs),
                runtime_profile: None,
            },
        )),
        Commands::ListTaskClaims => {
            commands::render(hub_daemon::list_task_claims(&hub, hub_daemon::ListTaskClaimsRequest {}))
        }
        Commands::AttachTaskArtifact { task_id, artifact_id, attached_by, idempotency_key } => {
            commands::render(hub_daemon::attach_task_artifact(
                &hub,
                hub_daemon::AttachTaskArtifactRequest {
                    task_id,
                    artifact_id,
                    attached_by,
                    runtime_profile: None,
                    idempotency_key,
                },
            ))
        }
        Commands::ListTaskArtifacts { task_id, requesting_agent } => {
            commands::render(hub_daemon::list_task_artifacts(
                &hub,
                hub_daemon::ListTaskArtifactsRequest { task_id, requesting_agent },
            ))
        }
        Commands::GetTaskHandoff {
            task_id,
            requesting_agent,
            response_mode,
            include_downloads,
            download_ttl_sec,
        } => commands::render(hub_daemon::get_task_handoff(
            &hub,
            hub_daemon::GetTaskHandoffRequest {
                task_id,
                requesting_agent,
                response_mode,
                include_downloads,
                download_ttl_sec,
            },
        )),
    };

    println!("{}", format::render(&value, cli.format.into()));

    if mutates {
        commands::save_state(&hub, &state_path)?;
    }

    Ok(code)
}

/// Whether `command` can mutate hub tables and therefore needs the snapshot
/// saved back to disk afterward.
fn command_mutates(command: &Commands) -> bool {
    !matches!(
        command,
        Commands::ListTasks { .. }
            | Commands::ListTaskClaims
            | Commands::ListTaskArtifacts { .. }
            | Commands::GetTaskHandoff { .. }
    )
}

fn none_if_empty(v: Vec<String>) -> Option<Vec<String>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_commands_do_not_mutate() {
        assert!(!command_mutates(&Commands::ListTaskClaims));
    }

    #[test]
    fn write_commands_mutate() {
        assert!(command_mutates(&Commands::SendMessage {
            from: "a".into(),
            to: None,
            content: "hi".into(),
            metadata: None,
            trace_id: None,
            span_id: None,
            idempotency_key: None,
        }));
    }
}
