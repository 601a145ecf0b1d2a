// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface and the file-defined argument merge.
//!
//! A task file may open with an argument prelude (lines starting `-` or
//! `--`). Those are parsed with the same grammar as the command line and
//! merged underneath it: boolean flags OR-combine, value options take the
//! command line over the file. `-h/--help`, `--version`, and the
//! positional task file are forbidden in the prelude.

use clap::Parser;
use std::path::PathBuf;
use tasker_core::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "tasker",
    version,
    about = "Declarative workflow executor for shell commands across local and remote hosts"
)]
pub struct Cli {
    /// Task file to execute
    pub task_file: Option<PathBuf>,

    // --- execution ---
    /// Execute the workflow (without this, show the plan and exit)
    #[arg(short = 'r', long = "run")]
    pub run: bool,

    /// Project name for the TSV summary
    #[arg(short = 'p', long = "project", value_name = "NAME")]
    pub project: Option<String>,

    /// Directory for log files and project summaries
    #[arg(short = 'l', long = "log-dir", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log verbosity (ERROR, WARN, INFO, DEBUG)
    #[arg(long = "log-level", value_enum, ignore_case = true, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Shorthand for --log-level debug
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Default execution type for tasks without `exec`
    #[arg(short = 't', long = "type", value_name = "NAME")]
    pub exec_type: Option<String>,

    /// Default per-task timeout in seconds
    #[arg(short = 'o', long = "timeout", value_name = "SEC")]
    pub timeout: Option<u64>,

    // --- validation / planning ---
    /// Print the execution plan and exit
    #[arg(long = "show-plan")]
    pub show_plan: bool,

    /// Validate the task file and exit
    #[arg(long = "validate-only")]
    pub validate_only: bool,

    /// Skip structural/flow/variable validation
    #[arg(long = "skip-task-validation")]
    pub skip_task_validation: bool,

    /// Skip hostname resolution and connectivity probes
    #[arg(long = "skip-host-validation")]
    pub skip_host_validation: bool,

    /// Skip execution-type binary checks
    #[arg(long = "skip-command-validation")]
    pub skip_command_validation: bool,

    /// Skip the security scan of commands and arguments
    #[arg(long = "skip-security-validation")]
    pub skip_security_validation: bool,

    /// Skip all validation layers
    #[arg(long = "skip-validation")]
    pub skip_validation: bool,

    /// Probe host connectivity during validation
    #[arg(short = 'c', long = "connection-test")]
    pub connection_test: bool,

    // --- resume / recovery ---
    /// Start execution at this task id instead of 0
    #[arg(long = "start-from", value_name = "N")]
    pub start_from: Option<TaskId>,

    /// Track progress in a recovery-state file and resume from it
    #[arg(long = "auto-recovery")]
    pub auto_recovery: bool,

    /// Print recorded recovery state and exit
    #[arg(long = "show-recovery-info")]
    pub show_recovery_info: bool,

    // --- instance control ---
    /// Refuse to run while another instance of this workflow holds the lock
    #[arg(long = "instance-check")]
    pub instance_check: bool,

    /// Take over the instance lock even from a live holder
    #[arg(long = "force-instance")]
    pub force_instance: bool,

    // --- misc ---
    /// Ignore task failures in the final exit code
    #[arg(long = "fire-and-forget")]
    pub fire_and_forget: bool,

    /// Fail parsing when globals reference undefined environment variables
    #[arg(long = "strict-env-validation")]
    pub strict_env_validation: bool,

    /// Print the merged CLI/file/environment settings and exit
    #[arg(long = "show-effective-args")]
    pub show_effective_args: bool,

    /// Write the JSON summary (to PATH, or next to the log file)
    #[arg(
        long = "output-json",
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    pub output_json: Option<String>,

    /// Executable invoked when the workflow fails
    #[arg(long = "alert-on-failure", value_name = "PATH")]
    pub alert_on_failure: Option<PathBuf>,
}

/// Errors from the prelude merge (exit code 10).
#[derive(Debug)]
pub struct PreludeError(pub String);

impl std::fmt::Display for PreludeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Cli {
    /// Merge the file-defined argument prelude underneath this command
    /// line.
    pub fn merge_prelude(self, prelude_lines: &[String]) -> Result<Cli, PreludeError> {
        if prelude_lines.is_empty() {
            return Ok(self);
        }

        let mut tokens: Vec<String> = vec!["tasker".to_string()];
        for line in prelude_lines {
            for token in line.split_whitespace() {
                // Support both `--opt value` and `--opt=value` forms.
                match token {
                    "-h" | "--help" | "--version" | "-V" => {
                        return Err(PreludeError(format!(
                            "'{}' is not allowed in the task-file argument prelude",
                            token
                        )))
                    }
                    _ => tokens.push(token.to_string()),
                }
            }
        }

        let file = Cli::try_parse_from(&tokens).map_err(|error| {
            PreludeError(format!("task-file argument prelude: {}", error))
        })?;
        if file.task_file.is_some() {
            return Err(PreludeError(
                "positional task file is not allowed in the argument prelude".to_string(),
            ));
        }

        Ok(self.merged_over(file))
    }

    /// Boolean flags OR-combine; value options prefer `self` (the real
    /// command line) over the file.
    fn merged_over(self, file: Cli) -> Cli {
        Cli {
            task_file: self.task_file,
            run: self.run || file.run,
            project: self.project.or(file.project),
            log_dir: self.log_dir.or(file.log_dir),
            log_level: self.log_level.or(file.log_level),
            debug: self.debug || file.debug,
            exec_type: self.exec_type.or(file.exec_type),
            timeout: self.timeout.or(file.timeout),
            show_plan: self.show_plan || file.show_plan,
            validate_only: self.validate_only || file.validate_only,
            skip_task_validation: self.skip_task_validation || file.skip_task_validation,
            skip_host_validation: self.skip_host_validation || file.skip_host_validation,
            skip_command_validation: self.skip_command_validation || file.skip_command_validation,
            skip_security_validation: self.skip_security_validation
                || file.skip_security_validation,
            skip_validation: self.skip_validation || file.skip_validation,
            connection_test: self.connection_test || file.connection_test,
            start_from: self.start_from.or(file.start_from),
            auto_recovery: self.auto_recovery || file.auto_recovery,
            show_recovery_info: self.show_recovery_info || file.show_recovery_info,
            instance_check: self.instance_check || file.instance_check,
            force_instance: self.force_instance || file.force_instance,
            fire_and_forget: self.fire_and_forget || file.fire_and_forget,
            strict_env_validation: self.strict_env_validation || file.strict_env_validation,
            show_effective_args: self.show_effective_args || file.show_effective_args,
            output_json: self.output_json.or(file.output_json),
            alert_on_failure: self.alert_on_failure.or(file.alert_on_failure),
        }
    }

    /// Environment defaults, applied after the prelude merge.
    pub fn effective_exec_type(&self) -> String {
        self.exec_type
            .clone()
            .or_else(|| std::env::var("TASK_EXECUTOR_TYPE").ok())
            .unwrap_or_else(|| "local".to_string())
    }

    pub fn effective_timeout(&self) -> u64 {
        self.timeout
            .or_else(|| {
                std::env::var("TASK_EXECUTOR_TIMEOUT")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(tasker_core::limits::DEFAULT_TASK_TIMEOUT_SECS)
    }

    pub fn effective_log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .clone()
            .or_else(|| std::env::var("TASK_EXECUTOR_LOG").ok().map(PathBuf::from))
    }

    pub fn effective_log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            self.log_level.map(LogLevel::as_filter).unwrap_or("info")
        }
    }

    /// Execution-type config discovery: `exec_types.yaml` next to the
    /// task file, then the user config directory.
    pub fn exec_config_path(&self) -> Option<PathBuf> {
        if let Some(task_file) = &self.task_file {
            let sibling = task_file
                .parent()
                .unwrap_or_else(|| std::path::Path::new("."))
                .join("exec_types.yaml");
            if sibling.is_file() {
                return Some(sibling);
            }
        }
        let config = dirs::config_dir()?.join("tasker").join("exec_types.yaml");
        config.is_file().then_some(config)
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
