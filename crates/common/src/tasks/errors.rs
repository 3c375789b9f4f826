// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use crate::model::WorldStateError;
use crate::tasks::TaskId;
use loam_var::Error;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error as ThisError;

/// Reasons a task might be aborted for a 'limit'.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AbortLimitReason {
    /// This task hit its allotted tick limit.
    Ticks(usize),
    /// This task hit its allotted wall-clock limit.
    Time(Duration),
}

/// An uncaught MOO error escaping a task, with the traceback lines the player may be shown.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Exception {
    pub error: Error,
    pub backtrace: Vec<String>,
}

impl Display for Exception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Uncaught exception: {}", self.error)
    }
}

impl std::error::Error for Exception {}

#[derive(Debug, ThisError, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("Scheduler not responding")]
    SchedulerNotResponding,
    #[error("Task not found: {0:?}")]
    TaskNotFound(TaskId),
    #[error("Could not start task (internal error)")]
    CouldNotStartTask,
    #[error("Could not start command")]
    CommandExecutionError(#[source] CommandError),
    #[error("Task aborted due to limit: {0:?}")]
    TaskAbortedLimit(AbortLimitReason),
    #[error("Task aborted due to error.")]
    TaskAbortedError,
    #[error("Task aborted due to exception")]
    TaskAbortedException(#[source] Exception),
    #[error("Task aborted due to cancellation.")]
    TaskAbortedCancelled,
}

/// Errors related to command matching.
#[derive(Debug, ThisError, Clone, Eq, PartialEq)]
pub enum CommandError {
    #[error("Could not parse command")]
    CouldNotParseCommand,
    #[error("Could not find object match for command")]
    NoObjectMatch,
    #[error("Could not find verb match for command")]
    NoCommandMatch,
    #[error("Database error during command dispatch")]
    DatabaseError(#[source] WorldStateError),
    #[error("Permission denied")]
    PermissionDenied,
}
