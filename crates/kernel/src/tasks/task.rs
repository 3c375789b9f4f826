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

use crate::tasks::command_parse::{ParsedCommand, parse_command};
use crate::tasks::scheduler::{Scheduler, WakeCondition, WakeReason};
use crate::tasks::{TaskId, TaskResult, TaskStart};
use crate::vm::{AbortReason, ExecFault, Interpreter};
use loam_common::model::ObjFlag;
use loam_common::tasks::{AbortLimitReason, CommandError, Exception, SchedulerError, Session};
use loam_common::util::parse_into_words;
use loam_db::match_object;
use loam_var::{NOTHING, Obj, SYSTEM_OBJECT, Var, v_string};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{debug, warn};

/// One logical task: a command dispatch, a server verb call, an eval, or a fork body.
/// Runs on its own thread; consumes itself.
pub struct Task {
    pub task_id: TaskId,
    pub player: Obj,
    /// Permission identity the task starts with (frames then setuid-promote per verb).
    pub perms: Obj,
    pub start: TaskStart,
    pub kill_switch: Arc<AtomicBool>,
}

impl Task {
    pub fn run(
        self,
        scheduler: Arc<Scheduler>,
        session: Arc<dyn Session>,
        delay_seconds: f64,
        result_sender: oneshot::Sender<TaskResult>,
    ) {
        if delay_seconds > 0.0 && !self.park_for_delay(&scheduler, delay_seconds) {
            scheduler.remove_task(self.task_id);
            let _ = result_sender.send(TaskResult::Error(SchedulerError::TaskAbortedCancelled));
            return;
        }
        let result = self.execute(&scheduler, &session);
        scheduler.remove_task(self.task_id);
        let _ = result_sender.send(result);
    }

    /// Fork delay: sit in the suspended queue where `queued_tasks` can see us and
    /// `kill_task` can cancel us. True means "go ahead and run".
    fn park_for_delay(&self, scheduler: &Arc<Scheduler>, delay_seconds: f64) -> bool {
        let rx = scheduler.register_suspension(
            self.task_id,
            WakeCondition::Time(std::time::Instant::now() + Duration::from_secs_f64(delay_seconds)),
        );
        match rx.recv_timeout(Duration::from_secs_f64(delay_seconds)) {
            Ok(WakeReason::Killed) => false,
            Ok(_) => true,
            Err(flume::RecvTimeoutError::Timeout) => {
                // Nobody woke us; claim our own record. Losing the claim means a kill or
                // resume raced in, and the verdict is on the channel.
                if scheduler.claim_suspension(self.task_id) {
                    true
                } else {
                    !matches!(rx.recv(), Ok(WakeReason::Killed))
                }
            }
            Err(flume::RecvTimeoutError::Disconnected) => false,
        }
    }

    fn execute(&self, scheduler: &Arc<Scheduler>, session: &Arc<dyn Session>) -> TaskResult {
        let world = scheduler.world_state().clone();
        let config = scheduler.config().clone();
        match &self.start {
            TaskStart::Command { command } => {
                self.run_command(scheduler, session, command)
            }
            TaskStart::Verb {
                vloc,
                verb,
                args,
                argstr,
            } => {
                let mut interp = Interpreter::new(
                    &world,
                    session,
                    scheduler,
                    &config,
                    self.task_id,
                    self.player,
                    self.kill_switch.clone(),
                    None,
                );
                // Server-initiated calls carry the raw input as argstr.
                if let Some(frame_cmd) = non_command_context(argstr) {
                    interp.command = Some(frame_cmd);
                }
                let r = interp.call_verb(*vloc, verb, args.clone(), NOTHING);
                self.finish(&mut interp, r)
            }
            TaskStart::Eval { code } => self.run_eval(scheduler, session, code),
            TaskStart::Fork {
                this,
                verb_name,
                verb_definer,
                env,
                program,
            } => {
                let mut interp = Interpreter::new(
                    &world,
                    session,
                    scheduler,
                    &config,
                    self.task_id,
                    self.player,
                    self.kill_switch.clone(),
                    None,
                );
                let r = interp.run_forked_frame(
                    *this,
                    verb_name,
                    *verb_definer,
                    self.perms,
                    env.clone(),
                    program.clone(),
                );
                self.finish(&mut interp, r)
            }
        }
    }

    /// The command pipeline: shorthand rewrite, `eval` shortcut, `$do_command`, object
    /// matching, verb search over player/location/dobj/iobj, and the `huh` fallback.
    fn run_command(
        &self,
        scheduler: &Arc<Scheduler>,
        session: &Arc<dyn Session>,
        command: &str,
    ) -> TaskResult {
        let world = scheduler.world_state().clone();
        let config = scheduler.config().clone();
        let Ok(mut pc) = parse_command(command) else {
            return TaskResult::Error(SchedulerError::CommandExecutionError(
                CommandError::CouldNotParseCommand,
            ));
        };

        // The `;` shorthand becomes `eval`, a direct programmer surface that bypasses
        // `$do_command` entirely.
        if pc.verb.eq_ignore_ascii_case("eval")
            && world
                .flags_of(self.player)
                .map(|f| f.contains(ObjFlag::Programmer))
                .unwrap_or(false)
        {
            return self.run_eval(scheduler, session, &pc.argstr.clone());
        }

        // Give the world's own dispatcher first crack at the command.
        if let Ok(resolved) = world.resolve_verb(SYSTEM_OBJECT, "do_command", None) {
            let mut interp = Interpreter::new(
                &world,
                session,
                scheduler,
                &config,
                self.task_id,
                self.player,
                self.kill_switch.clone(),
                Some(pc.clone()),
            );
            let mut args: Vec<Var> = vec![v_string(pc.verb.clone())];
            args.extend(pc.args.iter().map(|w| v_string(w.clone())));
            let r = interp.run_frame(
                SYSTEM_OBJECT,
                "do_command",
                resolved.definer,
                resolved.verbdef.owner,
                resolved.verbdef.flags.contains(loam_common::model::VerbFlag::Debug),
                resolved.verbdef.program.clone(),
                args,
                self.player,
            );
            match r {
                Ok(v) if v.is_true() => return TaskResult::Success(v),
                Ok(_) => {}
                r => return self.finish(&mut interp, r),
            }
        }

        // Resolve the object slots in the player's vicinity.
        if !pc.dobjstr.is_empty() {
            pc.dobj = match_object(&world, self.player, &pc.dobjstr).unwrap_or(NOTHING);
        }
        if !pc.iobjstr.is_empty() {
            pc.iobj = match_object(&world, self.player, &pc.iobjstr).unwrap_or(NOTHING);
        }

        // Search order: player, location, dobj, iobj.
        let location = world.location_of(self.player).unwrap_or(NOTHING);
        let mut candidates = vec![self.player, location, pc.dobj, pc.iobj];
        candidates.retain(|c| c.is_positive() && world.valid(*c));
        candidates.dedup();

        let mut matched = None;
        for candidate in &candidates {
            let spec = pc.spec_for_candidate(*candidate);
            if let Ok(resolved) = world.resolve_verb(*candidate, &pc.verb, Some(&spec)) {
                matched = Some((*candidate, pc.verb.clone(), resolved));
                break;
            }
        }

        // Fall back to `huh` on the location, then on the system object.
        if matched.is_none() {
            for candidate in [location, SYSTEM_OBJECT] {
                if !candidate.is_positive() || !world.valid(candidate) {
                    continue;
                }
                if let Ok(resolved) = world.resolve_verb(candidate, "huh", None) {
                    matched = Some((candidate, "huh".to_string(), resolved));
                    break;
                }
            }
        }

        let Some((this, verb_name, resolved)) = matched else {
            debug!(player = ?self.player, command, "no command match");
            let _ = session.send_text(self.player, "I couldn't understand that.");
            return TaskResult::Error(SchedulerError::CommandExecutionError(
                CommandError::NoCommandMatch,
            ));
        };

        let mut interp = Interpreter::new(
            &world,
            session,
            scheduler,
            &config,
            self.task_id,
            self.player,
            self.kill_switch.clone(),
            Some(pc.clone()),
        );
        let args: Vec<Var> = pc.args.iter().map(|w| v_string(w.clone())).collect();
        let r = interp.run_frame(
            this,
            &verb_name,
            resolved.definer,
            resolved.verbdef.owner,
            resolved
                .verbdef
                .flags
                .contains(loam_common::model::VerbFlag::Debug),
            resolved.verbdef.program.clone(),
            args,
            self.player,
        );
        self.finish(&mut interp, r)
    }

    /// Run an `eval`: `;expr` evaluates and echoes the result, `;;stmts` runs a statement
    /// block (whose value is whatever it returns).
    fn run_eval(
        &self,
        scheduler: &Arc<Scheduler>,
        session: &Arc<dyn Session>,
        code: &str,
    ) -> TaskResult {
        let world = scheduler.world_state().clone();
        let config = scheduler.config().clone();
        let code = code.trim();
        let compiled = if let Some(stmts) = code.strip_prefix(';') {
            loam_compiler::compile(stmts)
        } else {
            loam_compiler::compile_expression(code)
        };
        let program = match compiled {
            Ok(program) => program,
            Err(e) => {
                let _ = session.send_text(self.player, &format!("Parse error: {e}"));
                return TaskResult::Error(SchedulerError::CommandExecutionError(
                    CommandError::CouldNotParseCommand,
                ));
            }
        };
        let mut interp = Interpreter::new(
            &world,
            session,
            scheduler,
            &config,
            self.task_id,
            self.player,
            self.kill_switch.clone(),
            None,
        );
        let r = interp.run_frame(
            self.player,
            "eval",
            NOTHING,
            self.perms,
            true,
            program,
            vec![],
            self.player,
        );
        if let Ok(v) = &r {
            let _ = session.send_text(self.player, &format!("=> {}", v.to_literal()));
        }
        self.finish(&mut interp, r)
    }

    /// Map the interpreter's outcome to a task result, delivering tracebacks and abort
    /// notices to the player on the way.
    fn finish(
        &self,
        interp: &mut Interpreter<'_>,
        result: Result<Var, ExecFault>,
    ) -> TaskResult {
        match result {
            Ok(v) => TaskResult::Success(v),
            Err(ExecFault::Err(e)) => {
                let mut backtrace = std::mem::take(&mut interp.traceback);
                backtrace.reverse();
                for line in &backtrace {
                    let _ = interp.session.send_text(self.player, line);
                }
                let _ = interp
                    .session
                    .send_text(self.player, &format!("Traceback: {e}"));
                TaskResult::Error(SchedulerError::TaskAbortedException(Exception {
                    error: e,
                    backtrace,
                }))
            }
            Err(ExecFault::Abort(AbortReason::OutOfTicks)) => {
                warn!(task_id = self.task_id, "task out of ticks");
                let _ = interp
                    .session
                    .send_text(self.player, "Task aborted: out of ticks.");
                TaskResult::Error(SchedulerError::TaskAbortedLimit(AbortLimitReason::Ticks(
                    interp.config.tick_limit,
                )))
            }
            Err(ExecFault::Abort(AbortReason::Killed)) => {
                TaskResult::Error(SchedulerError::TaskAbortedCancelled)
            }
        }
    }
}

/// Build a minimal command context for server-initiated verb calls (`do_login_command`
/// gets the raw line as argstr and words as args).
fn non_command_context(argstr: &str) -> Option<ParsedCommand> {
    if argstr.is_empty() {
        return None;
    }
    Some(ParsedCommand {
        verb: String::new(),
        argstr: argstr.to_string(),
        args: parse_into_words(argstr),
        dobjstr: String::new(),
        dobj: NOTHING,
        prepstr: String::new(),
        prep: loam_common::model::PrepSpec::None,
        iobjstr: String::new(),
        iobj: NOTHING,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_command_context() {
        let pc = non_command_context("connect wizard secret").unwrap();
        assert_eq!(pc.argstr, "connect wizard secret");
        assert_eq!(pc.args, vec!["connect", "wizard", "secret"]);
        assert!(non_command_context("").is_none());
    }
}
