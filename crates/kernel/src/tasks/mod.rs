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

pub mod command_parse;
pub mod scheduler;
pub mod task;

pub use loam_common::tasks::TaskId;

use loam_common::tasks::SchedulerError;
use loam_compiler::Program;
use loam_var::{Obj, Symbol, Var};
use std::collections::HashMap;
use std::time::SystemTime;

/// What a task delivers when it finishes.
#[derive(Debug)]
pub enum TaskResult {
    Success(Var),
    Error(SchedulerError),
}

/// Just a handle to a task, with a receiver for the result.
pub struct TaskHandle(TaskId, oneshot::Receiver<TaskResult>);

impl TaskHandle {
    pub fn new(task_id: TaskId, receiver: oneshot::Receiver<TaskResult>) -> Self {
        Self(task_id, receiver)
    }

    pub fn task_id(&self) -> TaskId {
        self.0
    }

    /// Dissolve the handle into a receiver for the result.
    pub fn into_receiver(self) -> oneshot::Receiver<TaskResult> {
        self.1
    }
}

/// The work a task was born to do.
#[derive(Debug, Clone)]
pub enum TaskStart {
    /// A command line from a logged-in player, run through the command pipeline.
    Command { command: String },
    /// A server-initiated verb call (`do_login_command`, `user_connected`, `accept`...).
    Verb {
        vloc: Obj,
        verb: String,
        args: Vec<Var>,
        argstr: String,
    },
    /// An `eval` of MOO code on behalf of a programmer.
    Eval { code: String },
    /// The body of a `fork` statement, carrying its captured environment.
    Fork {
        this: Obj,
        verb_name: String,
        verb_definer: Obj,
        env: HashMap<Symbol, Var>,
        program: Program,
    },
}

/// External interface description of a task, for purpose of e.g. the `queued_tasks()`
/// builtin.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescription {
    pub task_id: TaskId,
    pub player: Obj,
    pub permissions: Obj,
    pub verb_name: String,
    pub this: Obj,
    pub start_time: SystemTime,
}
