// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow lifecycle: parse → validate → plan → lock → execute →
//! summarize → cleanup, with every terminal outcome mapped to the stable
//! exit-code table.

use crate::args::Cli;
use crate::{logging, plan};
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;
use tasker_core::task::{TaskId, TaskRecord};
use tasker_core::{ExitCode, ResultStore};
use tasker_engine::{
    check_expression, AlertContext, AlertHook, CleanupManager, Controller, ControllerConfig,
    InstanceLock, LockError, RecoveryState, RunReport, SummaryWriter, TaskContext,
    WorkflowSummary,
};
use tasker_engine::summary::WorkflowMetadata;
use tasker_exec::{Cancel, CancelSource, ExecConfig, HostProbe, ProbeError, Runner, TempTracker};
use tasker_taskfile::{
    has_errors, parse_task_file, validate, Diagnostic, ParseOptions, TaskFile, ValidationOptions,
};

/// Terminal failure carrying its exit code.
#[derive(Debug)]
pub struct Failure {
    pub code: i32,
    pub message: String,
}

impl Failure {
    fn new(code: ExitCode, message: impl Into<String>) -> Self {
        Failure {
            code: code.code(),
            message: message.into(),
        }
    }
}

pub async fn execute(
    cli: Cli,
    cancel_source: Arc<CancelSource>,
    cancel: Cancel,
) -> Result<i32, Failure> {
    let Some(task_file_path) = cli.task_file.clone() else {
        return Err(Failure::new(
            ExitCode::InvalidArguments,
            "a task file is required (see --help)",
        ));
    };

    // --- read + parse (twice when the prelude flips strict mode) ---
    let content = read_task_file(&task_file_path)?;
    let (file, parse_warnings) = parse(&content, false)?;
    let cli = cli
        .merge_prelude(&file.prelude_args)
        .map_err(|e| Failure::new(ExitCode::InvalidArguments, e.to_string()))?;
    let (file, parse_warnings) = if cli.strict_env_validation {
        parse(&content, true)?
    } else {
        (file, parse_warnings)
    };

    let log_file = logging::init(cli.effective_log_dir().as_deref(), cli.effective_log_filter());
    tracing::info!(task_file = %task_file_path.display(), "task file parsed");

    if cli.show_effective_args {
        print_effective_args(&cli, &task_file_path);
        return Ok(ExitCode::Success.code());
    }

    if cli.show_recovery_info {
        return show_recovery_info(&cli, &task_file_path);
    }

    // --- execution-type registry ---
    let exec_config = ExecConfig::load_or_builtin(cli.exec_config_path().as_deref());
    let tracker = TempTracker::new();
    let runner = Runner::new(tracker.clone());

    // --- validation layers ---
    let start_task = cli.start_from.unwrap_or(0);
    let records = run_validation(&cli, &file, &exec_config, &runner, start_task, parse_warnings)
        .await?;

    if cli.validate_only {
        println!("Task file validated: {} tasks", records.len());
        return Ok(ExitCode::Success.code());
    }
    if cli.show_plan || !cli.run {
        print!("{}", plan::render(&records, &file.globals));
        if !cli.run && !cli.show_plan {
            println!("\n(use -r/--run to execute)");
        }
        return Ok(ExitCode::Success.code());
    }

    // --- instance lock (never for validate/plan paths) ---
    let _lock = if cli.instance_check {
        match InstanceLock::acquire(
            &state_dir(&cli).join("locks"),
            &content,
            &file.globals,
            cli.force_instance,
        ) {
            Ok(lock) => Some(lock),
            Err(LockError::AlreadyRunning { pid }) => {
                return Err(Failure::new(
                    ExitCode::InstanceAlreadyRunning,
                    format!("workflow already running (pid {})", pid),
                ));
            }
            Err(LockError::Io(error)) => {
                return Err(Failure::new(
                    ExitCode::InstanceAlreadyRunning,
                    format!("instance lock: {}", error),
                ));
            }
        }
    } else {
        None
    };

    // --- controller ---
    let execution_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    let recovery_path = RecoveryState::path_for(&state_dir(&cli), &task_file_path);
    let start_task = resume_point(&cli, &recovery_path, start_task);

    let store = ResultStore::new();
    let ctx = TaskContext {
        records: Arc::new(records),
        globals: Arc::new(file.globals.clone()),
        store: store.clone(),
        runner,
        exec_config: Arc::new(exec_config),
        cancel,
        default_timeout: cli.effective_timeout(),
        default_exec: cli.effective_exec_type(),
    };
    let config = ControllerConfig {
        start_task,
        master_timeout: None,
        auto_recovery: cli.auto_recovery,
        recovery_path: cli.auto_recovery.then(|| recovery_path.clone()),
        task_file: task_file_path.display().to_string(),
        execution_id: execution_id.clone(),
    };

    let start_time = chrono::Utc::now();
    let report = Controller::new(ctx.clone(), config, cancel_source).run().await;
    let end_time = chrono::Utc::now();

    // --- artifacts ---
    write_artifacts(
        &cli,
        &task_file_path,
        &file,
        &ctx,
        &report,
        &execution_id,
        start_time,
        end_time,
        log_file.as_deref(),
        recovery_path.as_path(),
    )
    .await;

    CleanupManager::new(tracker).run();

    if cli.fire_and_forget && report.exit_code != 0 {
        tracing::warn!(
            exit_code = report.exit_code,
            "fire-and-forget: reporting success despite failure"
        );
        return Ok(ExitCode::Success.code());
    }
    Ok(report.exit_code)
}

fn read_task_file(path: &PathBuf) -> Result<String, Failure> {
    let content = std::fs::read_to_string(path).map_err(|error| {
        Failure::new(
            ExitCode::TaskFileNotFound,
            format!("cannot read {}: {}", path.display(), error),
        )
    })?;
    if content.trim().is_empty() {
        return Err(Failure::new(
            ExitCode::TaskFileEmpty,
            format!("{} is empty", path.display()),
        ));
    }
    Ok(content)
}

fn parse(content: &str, strict_env: bool) -> Result<(TaskFile, Vec<Diagnostic>), Failure> {
    let options = ParseOptions {
        strict_fields: false,
        strict_env,
    };
    parse_task_file(content, &options)
        .map_err(|error| Failure::new(ExitCode::ParseFailed, error.to_string()))
}

async fn run_validation(
    cli: &Cli,
    file: &TaskFile,
    exec_config: &ExecConfig,
    runner: &Runner,
    start_task: TaskId,
    parse_warnings: Vec<Diagnostic>,
) -> Result<IndexMap<TaskId, TaskRecord>, Failure> {
    let options = ValidationOptions {
        start_task,
        skip_task_validation: cli.skip_validation || cli.skip_task_validation,
        skip_security_validation: cli.skip_validation || cli.skip_security_validation,
        shell_execs: exec_config.shell_execs(),
    };
    let (records, mut diagnostics) = validate(file, &options, &check_expression);
    diagnostics.extend(parse_warnings);

    for diagnostic in &diagnostics {
        match diagnostic.severity {
            tasker_taskfile::Severity::Error => {
                tracing::error!(location = %diagnostic.location, "{}", diagnostic.message)
            }
            tasker_taskfile::Severity::Warning => {
                tracing::warn!(location = %diagnostic.location, "{}", diagnostic.message)
            }
        }
        eprintln!("tasker: {}", diagnostic);
    }
    if has_errors(&diagnostics) {
        return Err(Failure::new(
            ExitCode::ValidationFailed,
            "task file validation failed",
        ));
    }

    if !cli.skip_validation {
        check_exec_types(cli, &records, exec_config)?;
        if cli.connection_test && !cli.skip_host_validation {
            probe_hosts(&records, exec_config, runner).await?;
        }
    }

    Ok(records)
}

/// Every exec name must be known, and (unless skipped) its wrapper binary
/// present in PATH.
fn check_exec_types(
    cli: &Cli,
    records: &IndexMap<TaskId, TaskRecord>,
    exec_config: &ExecConfig,
) -> Result<(), Failure> {
    let default_exec = cli.effective_exec_type();
    let mut checked: Vec<&str> = Vec::new();
    for record in records.values() {
        let exec = record.exec.as_deref().unwrap_or(&default_exec);
        if checked.contains(&exec) {
            continue;
        }
        checked.push(exec);
        if !exec_config.known(exec) {
            return Err(Failure::new(
                ExitCode::ExecTypeValidationFailed,
                format!("unknown execution type '{}'", exec),
            ));
        }
        if !cli.skip_command_validation {
            if let Some(binary) = exec_config.binary(exec) {
                if !tasker_exec::probe::binary_in_path(binary) {
                    return Err(Failure::new(
                        ExitCode::ExecTypeValidationFailed,
                        format!("execution type '{}' binary '{}' not in PATH", exec, binary),
                    ));
                }
            }
        }
    }
    Ok(())
}

async fn probe_hosts(
    records: &IndexMap<TaskId, TaskRecord>,
    exec_config: &ExecConfig,
    runner: &Runner,
) -> Result<(), Failure> {
    let probe = HostProbe::new(runner.clone());
    for (hostname, exec) in tasker_taskfile::host_pairs(records) {
        tracing::info!(hostname, exec, "probing host");
        if let Err(error) = probe.probe(&hostname, &exec, exec_config).await {
            let code = match &error {
                ProbeError::Resolution { .. } => ExitCode::HostResolutionFailed,
                ProbeError::Connection { .. } => ExitCode::HostConnectionFailed,
                ProbeError::BinaryMissing { .. } => ExitCode::ExecTypeValidationFailed,
            };
            return Err(Failure::new(code, error.to_string()));
        }
    }
    Ok(())
}

/// Recovery/lock state directory: under the log dir when configured,
/// otherwise a per-user temp location.
fn state_dir(cli: &Cli) -> PathBuf {
    cli.effective_log_dir()
        .map(|dir| dir.join("state"))
        .unwrap_or_else(|| std::env::temp_dir().join("tasker_state"))
}

fn resume_point(cli: &Cli, recovery_path: &std::path::Path, default_start: TaskId) -> TaskId {
    if !cli.auto_recovery || cli.start_from.is_some() {
        return default_start;
    }
    match RecoveryState::load(recovery_path) {
        Ok(state) => {
            tracing::info!(
                resume_task = state.current_task,
                recorded_at = %state.updated_at,
                "resuming from recovery state"
            );
            state.current_task
        }
        Err(_) => default_start,
    }
}

fn show_recovery_info(cli: &Cli, task_file_path: &std::path::Path) -> Result<i32, Failure> {
    let path = RecoveryState::path_for(&state_dir(cli), task_file_path);
    match RecoveryState::load(&path) {
        Ok(state) => {
            println!("Recovery state for {}:", state.task_file);
            println!("  execution id: {}", state.execution_id);
            println!("  current task: {}", state.current_task);
            println!("  path so far:  {:?}", state.execution_path);
            println!("  updated at:   {}", state.updated_at);
        }
        Err(_) => println!("No recovery state recorded for {}", task_file_path.display()),
    }
    Ok(ExitCode::Success.code())
}

fn print_effective_args(cli: &Cli, task_file_path: &std::path::Path) {
    println!("task_file   = {}", task_file_path.display());
    println!("run         = {}", cli.run);
    println!("project     = {}", cli.project.as_deref().unwrap_or("-"));
    println!(
        "log_dir     = {}",
        cli.effective_log_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(stderr)".to_string())
    );
    println!("log_level   = {}", cli.effective_log_filter());
    println!("exec_type   = {}", cli.effective_exec_type());
    println!("timeout     = {}", cli.effective_timeout());
    println!("start_from  = {}", cli.start_from.unwrap_or(0));
    println!("auto_recovery = {}", cli.auto_recovery);
    println!("instance_check = {}", cli.instance_check);
}

#[allow(clippy::too_many_arguments)]
async fn write_artifacts(
    cli: &Cli,
    task_file_path: &std::path::Path,
    file: &TaskFile,
    ctx: &TaskContext,
    report: &RunReport,
    execution_id: &str,
    start_time: chrono::DateTime<chrono::Utc>,
    end_time: chrono::DateTime<chrono::Utc>,
    log_file: Option<&std::path::Path>,
    recovery_path: &std::path::Path,
) {
    let log_file_text = log_file
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    if let Some(json_target) = &cli.output_json {
        let path = if json_target.is_empty() {
            cli.effective_log_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(format!("tasker_{}.json", execution_id))
        } else {
            PathBuf::from(json_target)
        };
        let metadata = WorkflowMetadata {
            task_file: task_file_path.display().to_string(),
            execution_id: execution_id.to_string(),
            status: report.status.clone(),
            start_time: start_time.to_rfc3339(),
            end_time: end_time.to_rfc3339(),
            duration_seconds: (end_time - start_time).num_milliseconds() as f64 / 1000.0,
            log_file: log_file_text.clone(),
        };
        let summary = WorkflowSummary::build(
            metadata,
            report,
            &ctx.store,
            &file.globals,
            ctx.records.len(),
        );
        match summary.write(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "JSON summary written"),
            Err(error) => tracing::error!(path = %path.display(), %error, "JSON summary write failed"),
        }
    }

    if let Some(project) = &cli.project {
        let log_dir = cli
            .effective_log_dir()
            .unwrap_or_else(|| PathBuf::from("."));
        let final_command = report
            .final_task
            .and_then(|id| ctx.records.get(&id))
            .and_then(|record| record.command.clone())
            .unwrap_or_default();
        let writer = SummaryWriter::new(log_dir);
        if let Err(error) = writer.append_project_record(
            project,
            report,
            &ctx.store,
            &task_file_path.display().to_string(),
            &final_command,
            &log_file_text,
        ) {
            tracing::error!(project, %error, "project summary append failed");
        }
    }

    if report.exit_code != 0 {
        if let Some(hook_path) = &cli.alert_on_failure {
            let alert = AlertHook::new(hook_path);
            let context = AlertContext {
                log_file: log_file_text,
                state_file: recovery_path.display().to_string(),
                task_file: task_file_path.display().to_string(),
                failed_task: report
                    .final_task
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                exit_code: report.exit_code,
                error: report.failure.clone().unwrap_or_default(),
            };
            match alert.invoke(&context).await {
                Ok(()) => tracing::info!(hook = %hook_path.display(), "alert hook ran"),
                Err(error) => tracing::warn!(hook = %hook_path.display(), error, "alert hook failed"),
            }
        }
    }
}
