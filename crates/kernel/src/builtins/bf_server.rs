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

use crate::builtins::bf_objects::obj_arg;
use crate::builtins::{BuiltinRegistry, register};
use crate::tasks::scheduler::{WakeCondition, WakeReason};
use crate::vm::{AbortReason, ExecFault, Interpreter};
use loam_var::ErrorCode::{E_INVARG, E_PERM, E_TYPE};
use loam_var::{Error, ErrorCode, Symbol, Var, Variant, v_int, v_list, v_obj, v_str, v_string};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub(crate) fn register_all(registry: &mut BuiltinRegistry) {
    register(registry, "notify", 2, Some(2), bf_notify);
    register(registry, "connected_players", 0, Some(0), bf_connected_players);
    register(registry, "connection_name", 1, Some(1), bf_connection_name);
    register(registry, "boot_player", 1, Some(1), bf_boot_player);
    register(registry, "read", 0, Some(1), bf_read);
    register(registry, "idle_seconds", 1, Some(1), bf_idle_seconds);
    register(registry, "connected_seconds", 1, Some(1), bf_connected_seconds);
    register(registry, "set_connection_option", 3, Some(3), bf_set_connection_option);
    register(registry, "connection_options", 1, Some(1), bf_connection_options);
    register(registry, "check_password", 2, Some(2), bf_check_password);

    register(registry, "task_id", 0, Some(0), bf_task_id);
    register(registry, "queued_tasks", 0, Some(0), bf_queued_tasks);
    register(registry, "kill_task", 1, Some(1), bf_kill_task);
    register(registry, "suspend", 0, Some(1), bf_suspend);
    register(registry, "yield", 0, Some(0), bf_yield);
    register(registry, "resume", 1, Some(2), bf_resume);
    register(registry, "raise", 1, Some(3), bf_raise);
    register(registry, "callers", 0, Some(0), bf_callers);
    register(registry, "caller_perms", 0, Some(0), bf_caller_perms);
    register(registry, "set_task_perms", 1, Some(1), bf_set_task_perms);
    register(registry, "ticks_left", 0, Some(0), bf_ticks_left);
    register(registry, "seconds_left", 0, Some(0), bf_seconds_left);

    register(registry, "server_version", 0, Some(0), bf_server_version);
    register(registry, "server_log", 1, Some(1), bf_server_log);
    register(registry, "shutdown", 0, Some(1), bf_shutdown);
    register(registry, "dump_database", 0, Some(0), bf_dump_database);
    register(registry, "memory_usage", 0, Some(0), bf_memory_usage);
}

/// Deliver a line to a player's connection. Permitted for the player itself, the task's
/// owner speaking to itself, and wizards.
fn bf_notify(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let target = obj_arg(&args[0])?;
    let Some(text) = args[1].as_string() else {
        return Err(E_TYPE.into());
    };
    let perms = interp.task_perms();
    if target != perms.who && target != interp.player && !perms.is_wizard() {
        return Err(E_PERM.into());
    }
    // Delivery failure (no connection, queue overflow) is not the verb's problem.
    let _ = interp.session.send_text(target, text.as_str());
    Ok(v_int(1))
}

fn bf_connected_players(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    let players = interp
        .session
        .connected_players()
        .unwrap_or_default()
        .into_iter()
        .map(v_obj)
        .collect::<Vec<_>>();
    Ok(v_list(&players))
}

fn bf_connection_name(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let who = obj_arg(&args[0])?;
    let perms = interp.task_perms();
    if who != perms.who && !perms.is_wizard() {
        return Err(E_PERM.into());
    }
    match interp.session.connection_name(who) {
        Ok(name) => Ok(v_string(name)),
        Err(_) => Err(E_INVARG.into()),
    }
}

fn bf_boot_player(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let victim = obj_arg(&args[0])?;
    let perms = interp.task_perms();
    if victim != perms.who && !perms.is_wizard() {
        return Err(E_PERM.into());
    }
    interp.scheduler.kill_player_tasks(victim);
    let _ = interp.session.disconnect(victim);
    Ok(v_int(0))
}

/// Block until the player's connection delivers its next input line. The connection
/// captures the request id and routes the line here instead of the command pipeline.
fn bf_read(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let perms = interp.task_perms();
    let who = match args.first() {
        None => interp.player,
        Some(v) => {
            let who = obj_arg(v)?;
            if who != interp.player && !perms.is_wizard() {
                return Err(E_PERM.into());
            }
            who
        }
    };
    let request = Uuid::new_v4();
    let rx = interp
        .scheduler
        .register_suspension(interp.task_id, WakeCondition::Input(request));
    if interp.session.request_input(who, request).is_err() {
        interp.scheduler.claim_suspension(interp.task_id);
        return Err(E_INVARG.into());
    }
    match rx.recv() {
        Ok(WakeReason::Input(line)) => {
            interp.replenish_ticks();
            Ok(v_string(line))
        }
        Ok(WakeReason::Resumed(v)) => {
            interp.replenish_ticks();
            Ok(v)
        }
        Ok(WakeReason::Killed) | Err(_) => Err(ExecFault::Abort(AbortReason::Killed)),
    }
}

fn bf_idle_seconds(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let who = obj_arg(&args[0])?;
    match interp.session.idle_seconds(who) {
        Ok(secs) => Ok(v_int(secs as i64)),
        Err(_) => Err(E_INVARG.into()),
    }
}

fn bf_connected_seconds(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let who = obj_arg(&args[0])?;
    match interp.session.connected_seconds(who) {
        Ok(secs) => Ok(v_int(secs as i64)),
        Err(_) => Err(E_INVARG.into()),
    }
}

fn bf_set_connection_option(
    interp: &mut Interpreter<'_>,
    args: Vec<Var>,
) -> Result<Var, ExecFault> {
    let who = obj_arg(&args[0])?;
    let Some(option) = args[1].as_string() else {
        return Err(E_TYPE.into());
    };
    let perms = interp.task_perms();
    if who != perms.who && !perms.is_wizard() {
        return Err(E_PERM.into());
    }
    let value = args[2].to_display_string();
    interp
        .session
        .set_connection_option(who, option.as_str(), &value)
        .map_err(|_| ExecFault::from(E_INVARG))?;
    Ok(v_int(0))
}

fn bf_connection_options(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let who = obj_arg(&args[0])?;
    let perms = interp.task_perms();
    if who != perms.who && !perms.is_wizard() {
        return Err(E_PERM.into());
    }
    let options = interp
        .session
        .connection_options(who)
        .map_err(|_| ExecFault::from(E_INVARG))?;
    let pairs: Vec<Var> = options
        .into_iter()
        .map(|(k, v)| v_list(&[v_string(k), v_string(v)]))
        .collect();
    Ok(v_list(&pairs))
}

/// `check_password(player, password)`: verify against the crypt text in the player's
/// `password` property. Wizard or self only; there is no other key store.
fn bf_check_password(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let player = obj_arg(&args[0])?;
    let Some(password) = args[1].as_string() else {
        return Err(E_TYPE.into());
    };
    let perms = interp.task_perms();
    if player != perms.who && !perms.is_wizard() {
        return Err(E_PERM.into());
    }
    if !interp.world.valid(player) {
        return Err(E_INVARG.into());
    }
    let Ok(stored) = interp
        .world
        .resolve_property(player, &Symbol::mk("password"))
    else {
        return Ok(v_int(0));
    };
    let Some(hash) = stored.value.as_string() else {
        return Ok(v_int(0));
    };
    Ok(v_int(
        pwhash::unix::verify(password.as_str(), hash.as_str()) as i64,
    ))
}

fn bf_task_id(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(v_int(interp.task_id as i64))
}

fn bf_queued_tasks(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    let perms = interp.task_perms();
    let tasks: Vec<Var> = interp
        .scheduler
        .queued_tasks()
        .into_iter()
        .filter(|t| perms.is_wizard() || t.player == perms.who || t.permissions == perms.who)
        .map(|t| {
            let start = t
                .start_time
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            v_list(&[
                v_int(t.task_id as i64),
                v_int(start),
                v_int(0),
                v_int(interp.config.tick_limit as i64),
                v_obj(t.permissions),
                v_str(&t.verb_name),
                v_obj(t.this),
            ])
        })
        .collect();
    Ok(v_list(&tasks))
}

fn bf_kill_task(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let Some(task_id) = args[0].as_integer() else {
        return Err(E_TYPE.into());
    };
    if task_id < 0 {
        return Err(E_INVARG.into());
    }
    // Killing yourself works, but takes effect at the next tick.
    let perms = interp.task_perms();
    interp.scheduler.kill_task(task_id as usize, &perms)?;
    Ok(v_int(0))
}

/// `suspend([seconds])`: park this task. With no argument it sleeps until `resume()`;
/// otherwise it wakes when the timer fires. Either way the tick budget is replenished.
fn bf_suspend(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let seconds = match args.first() {
        None => None,
        Some(v) => match v.variant() {
            Variant::Int(i) if *i >= 0 => Some(*i as f64),
            Variant::Float(f) if *f >= 0.0 => Some(*f),
            _ => return Err(E_INVARG.into()),
        },
    };
    let wake = match seconds {
        Some(secs) => {
            WakeCondition::Time(std::time::Instant::now() + Duration::from_secs_f64(secs))
        }
        None => WakeCondition::Never,
    };
    let rx = interp.scheduler.register_suspension(interp.task_id, wake);
    let reason = match seconds {
        Some(secs) => match rx.recv_timeout(Duration::from_secs_f64(secs)) {
            Ok(reason) => reason,
            Err(flume::RecvTimeoutError::Timeout) => {
                // Claim our own record; losing the race means the verdict is in flight.
                if interp.scheduler.claim_suspension(interp.task_id) {
                    WakeReason::Resumed(v_int(0))
                } else {
                    rx.recv().unwrap_or(WakeReason::Killed)
                }
            }
            Err(flume::RecvTimeoutError::Disconnected) => WakeReason::Killed,
        },
        None => rx.recv().unwrap_or(WakeReason::Killed),
    };
    match reason {
        WakeReason::Resumed(v) => {
            interp.replenish_ticks();
            Ok(v)
        }
        WakeReason::Input(_) => Err(E_INVARG.into()),
        WakeReason::Killed => Err(ExecFault::Abort(AbortReason::Killed)),
    }
}

/// Hand the processor back for a moment without giving up the remaining tick budget.
fn bf_yield(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    if interp
        .kill_switch
        .load(std::sync::atomic::Ordering::Relaxed)
    {
        return Err(ExecFault::Abort(AbortReason::Killed));
    }
    std::thread::yield_now();
    Ok(v_int(0))
}

fn bf_resume(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let Some(task_id) = args[0].as_integer() else {
        return Err(E_TYPE.into());
    };
    if task_id < 0 {
        return Err(E_INVARG.into());
    }
    let value = args.get(1).cloned().unwrap_or(v_int(0));
    let perms = interp.task_perms();
    interp
        .scheduler
        .resume_task(task_id as usize, value, &perms)?;
    Ok(v_int(0))
}

/// `raise(code [, msg [, value]])`.
fn bf_raise(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let code = match args[0].variant() {
        Variant::Err(e) => e.err_type,
        Variant::Int(i) => match u8::try_from(*i).ok().and_then(ErrorCode::from_repr) {
            Some(code) => code,
            None => return Err(E_INVARG.into()),
        },
        _ => return Err(E_TYPE.into()),
    };
    let msg = match args.get(1) {
        None => None,
        Some(v) => match v.as_string() {
            Some(s) => Some(s.as_str().to_string()),
            None => return Err(E_TYPE.into()),
        },
    };
    Err(ExecFault::Err(Error::new(code, msg)))
}

/// One `{this, verb-name, programmer, verb-loc, player, line}` entry per frame below the
/// current one, innermost first.
fn bf_callers(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    let mut callers = vec![];
    if interp.stack.len() > 1 {
        for frame in interp.stack[..interp.stack.len() - 1].iter().rev() {
            callers.push(v_list(&[
                v_obj(frame.this),
                v_string(frame.verb_name.clone()),
                v_obj(frame.perms),
                v_obj(frame.verb_definer),
                v_obj(frame.player),
                v_int(frame.line as i64),
            ]));
        }
    }
    Ok(v_list(&callers))
}

fn bf_caller_perms(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(v_obj(interp.caller_perms_obj()))
}

/// Drop (or, for wizards, change) the current frame's permission identity.
fn bf_set_task_perms(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let who = obj_arg(&args[0])?;
    let perms = interp.task_perms();
    if who != perms.who && !perms.is_wizard() {
        return Err(E_PERM.into());
    }
    interp.frame_mut().perms = who;
    Ok(v_int(0))
}

fn bf_ticks_left(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(v_int(interp.ticks_left as i64))
}

/// Wall-clock is unlimited under the tick model; report a conventional horizon.
fn bf_seconds_left(_interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(v_int(5))
}

fn bf_server_version(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    let version = semver::Version::parse(env!("CARGO_PKG_VERSION"))
        .map(|v| v.to_string())
        .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
    Ok(v_string(format!(
        "{} {version}",
        interp.config.world_name
    )))
}

fn bf_server_log(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let Some(msg) = args[0].as_string() else {
        return Err(E_TYPE.into());
    };
    interp.task_perms().check_wizard().map_err(Error::from)?;
    info!(player = ?interp.player, "> {}", msg.as_str());
    Ok(v_int(1))
}

fn bf_shutdown(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    interp.task_perms().check_wizard().map_err(Error::from)?;
    let msg = match args.first() {
        None => None,
        Some(v) => match v.as_string() {
            Some(s) => Some(s.as_str().to_string()),
            None => return Err(E_TYPE.into()),
        },
    };
    let _ = interp.session.shutdown(msg.clone());
    interp.scheduler.shutdown(msg);
    Ok(v_int(0))
}

fn bf_dump_database(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    interp.task_perms().check_wizard().map_err(Error::from)?;
    interp.scheduler.request_text_dump()?;
    Ok(v_int(1))
}

fn bf_memory_usage(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(interp.world.memory_usage())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::world_with_wizard;

    #[test]
    fn test_raise() {
        let harness = world_with_wizard();
        let mut interp = harness.interp();
        let r = bf_raise(&mut interp, vec![loam_var::v_err(ErrorCode::E_PERM)]);
        assert!(matches!(r, Err(ExecFault::Err(e)) if e == ErrorCode::E_PERM));
        let r = bf_raise(
            &mut interp,
            vec![loam_var::v_err(ErrorCode::E_PERM), v_str("nope")],
        );
        match r {
            Err(ExecFault::Err(e)) => assert_eq!(e.message(), "nope"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_task_id_and_ticks() {
        let harness = world_with_wizard();
        let mut interp = harness.interp();
        assert_eq!(bf_task_id(&mut interp, vec![]).unwrap(), v_int(1));
        let t = bf_ticks_left(&mut interp, vec![]).unwrap();
        assert!(t.as_integer().unwrap() > 0);
    }
}
