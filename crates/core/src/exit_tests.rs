// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    success = { ExitCode::Success, 0 },
    task_failed = { ExitCode::TaskFailed, 1 },
    invalid_args = { ExitCode::InvalidArguments, 10 },
    not_found = { ExitCode::TaskFileNotFound, 11 },
    empty = { ExitCode::TaskFileEmpty, 12 },
    parse = { ExitCode::ParseFailed, 13 },
    next_not_met = { ExitCode::NextConditionNotMet, 14 },
    interrupted = { ExitCode::Interrupted, 15 },
    parallel = { ExitCode::ParallelFailed, 16 },
    conditional = { ExitCode::ConditionalFailed, 17 },
    final_task = { ExitCode::FinalTaskFailed, 18 },
    dependency = { ExitCode::DependencyFailed, 19 },
    validation = { ExitCode::ValidationFailed, 20 },
    host_validation = { ExitCode::HostValidationFailed, 21 },
    host_connection = { ExitCode::HostConnectionFailed, 22 },
    host_resolution = { ExitCode::HostResolutionFailed, 23 },
    exec_type = { ExitCode::ExecTypeValidationFailed, 24 },
    instance = { ExitCode::InstanceAlreadyRunning, 25 },
    timeout = { ExitCode::TaskTimeout, 124 },
    sigint = { ExitCode::UserInterrupt, 130 },
)]
fn codes_are_stable(exit: ExitCode, expected: i32) {
    assert_eq!(exit.code(), expected);
}

#[test]
fn display_includes_code_and_description() {
    assert_eq!(format!("{}", ExitCode::TaskTimeout), "124 (task timeout)");
}

#[test]
fn only_success_is_success() {
    assert!(ExitCode::Success.is_success());
    assert!(!ExitCode::TaskFailed.is_success());
    assert!(!ExitCode::UserInterrupt.is_success());
}
