// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Size thresholds, depth limits, and reserved id ranges.

use crate::task::TaskId;
use std::ops::RangeInclusive;

/// Bytes a captured stream may hold in memory before spilling to a tempfile.
pub const MEMORY_THRESHOLD: usize = 1024 * 1024;

/// Absolute per-stream capture cap; bytes beyond this are dropped.
pub const STREAM_CAP: u64 = 100 * 1024 * 1024;

/// Max bytes of a captured stream inlined into a substitution.
/// Keeps rendered argv well under ARG_MAX.
pub const INLINE_SUBST_CAP: usize = 100 * 1024;

/// Chunk size for stream reads.
pub const READ_CHUNK: usize = 8 * 1024;

/// Fixed-point variable expansion passes before giving up.
pub const MAX_EXPANSION_PASSES: usize = 10;

/// Per-task timeout bounds (seconds).
pub const TIMEOUT_RANGE: RangeInclusive<u64> = 5..=3600;

/// Post-task sleep bounds (seconds).
pub const SLEEP_RANGE: RangeInclusive<u64> = 0..=300;

/// Loop iteration bounds.
pub const LOOP_RANGE: RangeInclusive<u32> = 1..=1000;

/// Retry count bounds (presence of `retry_count` enables retry).
pub const RETRY_COUNT_RANGE: RangeInclusive<u32> = 1..=1000;

/// Inter-retry delay bounds (seconds).
pub const RETRY_DELAY_RANGE: RangeInclusive<u64> = 0..=300;

/// `max_parallel` bounds.
pub const MAX_PARALLEL_RANGE: RangeInclusive<usize> = 1..=50;

/// Default parallel fan-out when `max_parallel` is not set.
pub const DEFAULT_MAX_PARALLEL: usize = 8;

/// Hard ceiling on workers regardless of `max_parallel` and CPU count.
pub const POOL_HARD_CAP: usize = 32;

/// `hostnames` list length bounds.
pub const HOSTNAMES_RANGE: RangeInclusive<usize> = 2..=1000;

/// Command/argument hard length limit.
pub const COMMAND_HARD_LIMIT: usize = 8192;

/// Stricter command/argument length limit for non-shell execution types.
pub const COMMAND_STRICT_LIMIT: usize = 2000;

/// Task ids in this range are treated as intentional error handlers even
/// when unreachable from the start task.
pub const HANDLER_RANGE: RangeInclusive<TaskId> = 90..=99;

/// User ids at or above this are exempt from reachability errors
/// (parallel-group / handler convention).
pub const HANDLER_FLOOR: TaskId = 100;

/// Base of the reserved id range for auto-generated parallel subtasks.
pub const SUBTASK_ID_BASE: TaskId = 100_000;

/// Stride between the subtask id blocks of adjacent parents.
pub const SUBTASK_ID_STRIDE: TaskId = 10_000;

/// Alert hook hard timeout (seconds).
pub const ALERT_HOOK_TIMEOUT_SECS: u64 = 30;

/// Default per-task timeout when neither the task nor the CLI sets one.
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 60;

/// Id assigned to the i-th auto-generated subtask of a parallel-hostnames
/// parent. The range never collides with user ids, which the validator
/// caps below [`SUBTASK_ID_BASE`].
pub fn subtask_id(parent: TaskId, index: TaskId) -> TaskId {
    SUBTASK_ID_BASE + parent * SUBTASK_ID_STRIDE + index
}

#[cfg(test)]
#[path = "limits_tests.rs"]
mod tests;
