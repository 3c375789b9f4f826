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

use crate::checkpoint::CheckpointManager;
use crate::config::Config;
use crate::tasks::task::Task;
use crate::tasks::{TaskDescription, TaskHandle, TaskId, TaskResult, TaskStart};
use loam_common::model::Perms;
use loam_common::tasks::{SchedulerError, Session};
use loam_compiler::Program;
use loam_db::WorldState;
use loam_var::ErrorCode::{E_INVARG, E_PERM};
use loam_var::{Error, Obj, Symbol, Var};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Instant, SystemTime};
use tracing::{info, warn};
use uuid::Uuid;

/// Responsible for the dispatching, control, and accounting of tasks in the system.
/// There should be only one scheduler per server.
///
/// Every task runs on its own thread; isolation means a fault in one task can never touch
/// another. The scheduler is the registry those threads check in with: it owns the kill
/// switches, the suspended set, and the wakers that resume or cancel blocked tasks.
pub struct Scheduler {
    config: Arc<Config>,
    world_state: Arc<WorldState>,
    running: AtomicBool,
    next_task_id: AtomicUsize,
    task_q: Mutex<TaskQ>,
    checkpoints: Mutex<Option<Arc<CheckpointManager>>>,
    shutdown_sender: flume::Sender<Option<String>>,
    shutdown_receiver: flume::Receiver<Option<String>>,
    /// Handle to ourselves, cloned into each task thread.
    self_ref: Weak<Scheduler>,
}

#[derive(Default)]
struct TaskQ {
    /// Control records for tasks whose thread is live (running or blocked in a built-in).
    running: HashMap<TaskId, RunningTaskControl>,
    /// Records for tasks parked in `suspend()`/`read()`/`fork`, with their wakers.
    suspended: HashMap<TaskId, SuspendedTask>,
}

/// Scheduler-side per-task record, owned by the scheduler and not shared elsewhere.
struct RunningTaskControl {
    player: Obj,
    /// A kill switch to signal the task to stop; observed at the next tick.
    kill_switch: Arc<AtomicBool>,
    description: TaskDescription,
}

/// State a suspended task sits in inside the `suspended` side of the task queue.
struct SuspendedTask {
    player: Obj,
    wake_condition: WakeCondition,
    waker: flume::Sender<WakeReason>,
    description: TaskDescription,
}

/// Possible conditions in which a suspended task can wake from suspension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WakeCondition {
    /// This task will never wake up on its own, and must be manually woken with `resume`.
    Never,
    /// This task will wake up when the given time is reached (handled by the task's own
    /// timed wait; recorded here for `queued_tasks`).
    Time(Instant),
    /// This task will wake up when the given input request is fulfilled.
    Input(Uuid),
}

#[derive(Debug, Clone)]
pub enum WakeReason {
    /// `resume(id, value)` delivered this value as the result of `suspend()`.
    Resumed(Var),
    /// An input line arrived for a task blocked in `read()`.
    Input(String),
    /// The task was killed while suspended.
    Killed,
}

impl Scheduler {
    pub fn new(world_state: Arc<WorldState>, config: Arc<Config>) -> Arc<Self> {
        let (shutdown_sender, shutdown_receiver) = flume::unbounded();
        Arc::new_cyclic(|self_ref| Self {
            config,
            world_state,
            running: AtomicBool::new(true),
            next_task_id: AtomicUsize::new(1),
            task_q: Mutex::new(TaskQ::default()),
            checkpoints: Mutex::new(None),
            shutdown_sender,
            shutdown_receiver,
            self_ref: self_ref.clone(),
        })
    }

    pub fn world_state(&self) -> &Arc<WorldState> {
        &self.world_state
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn attach_checkpoints(&self, manager: Arc<CheckpointManager>) {
        *self.checkpoints.lock().unwrap() = Some(manager);
    }

    /// Ask for an immediate textdump export, as `dump_database()` does.
    pub fn request_text_dump(&self) -> Result<(), Error> {
        let mgr = self.checkpoints.lock().unwrap().clone();
        match mgr {
            Some(mgr) => {
                mgr.export_text_now();
                Ok(())
            }
            None => Err(E_INVARG.msg("no checkpointing configured")),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Begin server shutdown: the host drains this via `shutdown_receiver`.
    pub fn shutdown(&self, msg: Option<String>) {
        info!(?msg, "shutdown requested");
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_sender.send(msg);
    }

    pub fn shutdown_receiver(&self) -> flume::Receiver<Option<String>> {
        self.shutdown_receiver.clone()
    }

    // ------------------------------------------------------------------------------------
    // Task submission
    // ------------------------------------------------------------------------------------

    /// Dispatch one command line for a player, through the full §command pipeline.
    pub fn submit_command_task(
        &self,
        player: Obj,
        command: &str,
        session: Arc<dyn Session>,
    ) -> Result<TaskHandle, SchedulerError> {
        self.spawn_task(
            player,
            player,
            TaskStart::Command {
                command: command.to_string(),
            },
            session,
        )
    }

    /// A server-initiated verb call (login processing, connection hooks, `accept`...).
    pub fn submit_verb_task(
        &self,
        player: Obj,
        vloc: Obj,
        verb: &str,
        args: Vec<Var>,
        argstr: &str,
        session: Arc<dyn Session>,
    ) -> Result<TaskHandle, SchedulerError> {
        self.spawn_task(
            player,
            player,
            TaskStart::Verb {
                vloc,
                verb: verb.to_string(),
                args,
                argstr: argstr.to_string(),
            },
            session,
        )
    }

    pub fn submit_eval_task(
        &self,
        player: Obj,
        perms: Obj,
        code: String,
        session: Arc<dyn Session>,
    ) -> Result<TaskHandle, SchedulerError> {
        self.spawn_task(player, perms, TaskStart::Eval { code }, session)
    }

    /// Launch a `fork` body. The forked task parks as a suspended task for `delay`
    /// seconds (killable in that window), then runs with the captured environment.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_fork_task(
        &self,
        delay_seconds: f64,
        player: Obj,
        perms: Obj,
        this: Obj,
        verb_name: String,
        verb_definer: Obj,
        env: HashMap<Symbol, Var>,
        program: Program,
        session: Arc<dyn Session>,
    ) -> Option<TaskId> {
        let start = TaskStart::Fork {
            this,
            verb_name,
            verb_definer,
            env,
            program,
        };
        match self.spawn_delayed_task(player, perms, start, session, delay_seconds) {
            Ok(handle) => Some(handle.task_id()),
            Err(e) => {
                warn!(?e, "could not start forked task");
                None
            }
        }
    }

    fn spawn_task(
        &self,
        player: Obj,
        perms: Obj,
        start: TaskStart,
        session: Arc<dyn Session>,
    ) -> Result<TaskHandle, SchedulerError> {
        self.spawn_delayed_task(player, perms, start, session, 0.0)
    }

    fn spawn_delayed_task(
        &self,
        player: Obj,
        perms: Obj,
        start: TaskStart,
        session: Arc<dyn Session>,
        delay_seconds: f64,
    ) -> Result<TaskHandle, SchedulerError> {
        if !self.is_running() {
            return Err(SchedulerError::SchedulerNotResponding);
        }
        if self.tasks_for(player) >= self.config.max_tasks_per_player {
            warn!(?player, "too many tasks for player");
            return Err(SchedulerError::CouldNotStartTask);
        }
        let task_id = self.next_task_id.fetch_add(1, Ordering::SeqCst);
        let kill_switch = Arc::new(AtomicBool::new(false));
        let description = TaskDescription {
            task_id,
            player,
            permissions: perms,
            verb_name: match &start {
                TaskStart::Command { command } => command.clone(),
                TaskStart::Verb { verb, .. } => verb.clone(),
                TaskStart::Eval { .. } => "eval".to_string(),
                TaskStart::Fork { verb_name, .. } => verb_name.clone(),
            },
            this: match &start {
                TaskStart::Verb { vloc, .. } => *vloc,
                TaskStart::Fork { this, .. } => *this,
                _ => player,
            },
            start_time: SystemTime::now(),
        };
        {
            let mut q = self.task_q.lock().unwrap();
            q.running.insert(
                task_id,
                RunningTaskControl {
                    player,
                    kill_switch: kill_switch.clone(),
                    description,
                },
            );
        }
        let (result_sender, result_receiver) = oneshot::channel();
        let task = Task {
            task_id,
            player,
            perms,
            start,
            kill_switch,
        };
        let Some(scheduler) = self.self_ref.upgrade() else {
            self.task_q.lock().unwrap().running.remove(&task_id);
            return Err(SchedulerError::SchedulerNotResponding);
        };
        let builder = std::thread::Builder::new().name(format!("loam-task-{task_id}"));
        builder
            .spawn(move || {
                task.run(scheduler, session, delay_seconds, result_sender);
            })
            .map_err(|e| {
                warn!(?e, "could not spawn task thread");
                self.task_q.lock().unwrap().running.remove(&task_id);
                SchedulerError::CouldNotStartTask
            })?;
        Ok(TaskHandle::new(task_id, result_receiver))
    }

    // ------------------------------------------------------------------------------------
    // Suspension & wakeup
    // ------------------------------------------------------------------------------------

    /// Park the calling task. Returns the receiver its thread blocks on.
    pub fn register_suspension(
        &self,
        task_id: TaskId,
        wake_condition: WakeCondition,
    ) -> flume::Receiver<WakeReason> {
        let (waker, receiver) = flume::bounded(1);
        let mut q = self.task_q.lock().unwrap();
        let (player, description) = match q.running.get(&task_id) {
            Some(control) => (control.player, control.description.clone()),
            None => {
                // A fork parking before its delay; synthesize from nothing.
                (Obj::mk_id(-1), TaskDescription {
                    task_id,
                    player: Obj::mk_id(-1),
                    permissions: Obj::mk_id(-1),
                    verb_name: String::new(),
                    this: Obj::mk_id(-1),
                    start_time: SystemTime::now(),
                })
            }
        };
        q.suspended.insert(
            task_id,
            SuspendedTask {
                player,
                wake_condition,
                waker,
                description,
            },
        );
        receiver
    }

    /// Remove the suspension record if it is still present. Returns false when someone
    /// else (a resume or kill) already claimed it, in which case a wake message is in
    /// flight on the channel.
    pub fn claim_suspension(&self, task_id: TaskId) -> bool {
        self.task_q
            .lock()
            .unwrap()
            .suspended
            .remove(&task_id)
            .is_some()
    }

    /// `resume(id, value)`: wake a suspended task with a value.
    pub fn resume_task(&self, task_id: TaskId, value: Var, perms: &Perms) -> Result<(), Error> {
        let record = {
            let mut q = self.task_q.lock().unwrap();
            let Some(record) = q.suspended.get(&task_id) else {
                return Err(E_INVARG.into());
            };
            if !perms.is_wizard() && record.description.permissions != perms.who {
                return Err(E_PERM.into());
            }
            if matches!(record.wake_condition, WakeCondition::Input(_)) {
                // Tasks blocked on read() are not resumable.
                return Err(E_INVARG.into());
            }
            q.suspended.remove(&task_id).unwrap()
        };
        let _ = record.waker.send(WakeReason::Resumed(value));
        Ok(())
    }

    /// Deliver an input line to the task waiting on the given request.
    pub fn submit_requested_input(&self, request: Uuid, line: String) -> Result<(), SchedulerError> {
        let record = {
            let mut q = self.task_q.lock().unwrap();
            let found = q
                .suspended
                .iter()
                .find(|(_, t)| t.wake_condition == WakeCondition::Input(request))
                .map(|(id, _)| *id);
            let Some(task_id) = found else {
                return Err(SchedulerError::TaskNotFound(0));
            };
            q.suspended.remove(&task_id).unwrap()
        };
        let _ = record.waker.send(WakeReason::Input(line));
        Ok(())
    }

    /// Kill a task by id: flips the kill switch of a running task, or wakes and cancels a
    /// suspended one.
    pub fn kill_task(&self, task_id: TaskId, perms: &Perms) -> Result<(), Error> {
        let mut q = self.task_q.lock().unwrap();
        if let Some(record) = q.suspended.get(&task_id) {
            if !perms.is_wizard()
                && record.player != perms.who
                && record.description.permissions != perms.who
            {
                return Err(E_PERM.into());
            }
            let record = q.suspended.remove(&task_id).unwrap();
            let _ = record.waker.send(WakeReason::Killed);
            return Ok(());
        }
        if let Some(control) = q.running.get(&task_id) {
            if !perms.is_wizard() && control.player != perms.who {
                return Err(E_PERM.into());
            }
            control.kill_switch.store(true, Ordering::SeqCst);
            return Ok(());
        }
        Err(E_INVARG.into())
    }

    /// Kill everything a player owns; used on disconnect and by `boot_player`.
    pub fn kill_player_tasks(&self, player: Obj) {
        let mut q = self.task_q.lock().unwrap();
        let suspended_ids: Vec<TaskId> = q
            .suspended
            .iter()
            .filter(|(_, t)| t.player == player)
            .map(|(id, _)| *id)
            .collect();
        for id in suspended_ids {
            if let Some(record) = q.suspended.remove(&id) {
                let _ = record.waker.send(WakeReason::Killed);
            }
        }
        for control in q.running.values() {
            if control.player == player {
                control.kill_switch.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Suspended (and fork-delayed) tasks, for `queued_tasks()`.
    pub fn queued_tasks(&self) -> Vec<TaskDescription> {
        let q = self.task_q.lock().unwrap();
        let mut tasks: Vec<TaskDescription> = q
            .suspended
            .values()
            .map(|t| t.description.clone())
            .collect();
        tasks.sort_by_key(|t| t.task_id);
        tasks
    }

    pub fn tasks_for(&self, player: Obj) -> usize {
        let q = self.task_q.lock().unwrap();
        q.running.values().filter(|t| t.player == player).count()
            + q.suspended.values().filter(|t| t.player == player).count()
    }

    /// Called by the task thread as it finishes, whatever the outcome.
    pub fn remove_task(&self, task_id: TaskId) {
        let mut q = self.task_q.lock().unwrap();
        q.running.remove(&task_id);
        q.suspended.remove(&task_id);
    }
}

/// Helper for hosts and tests: wait for a task result with a timeout.
pub fn wait_for_result(
    handle: TaskHandle,
    timeout: std::time::Duration,
) -> Result<TaskResult, SchedulerError> {
    handle
        .into_receiver()
        .recv_timeout(timeout)
        .map_err(|_| SchedulerError::SchedulerNotResponding)
}
