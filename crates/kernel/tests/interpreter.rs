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

//! Whole-system exercises: scheduler + interpreter + database, driven the way the host
//! drives them, with a recording session standing in for the network.

use loam_common::model::{ArgSpec, ObjFlag, Perms, PrepSpec, Preposition, VerbArgsSpec, VerbFlag};
use loam_common::tasks::{AbortLimitReason, SchedulerError, Session, SessionError};
use loam_common::util::BitEnum;
use loam_kernel::config::Config;
use loam_kernel::tasks::TaskResult;
use loam_kernel::tasks::scheduler::{Scheduler, wait_for_result};
use loam_var::ErrorCode::{E_DIV, E_RANGE, E_VERBNF};
use loam_var::{NOTHING, Obj, Symbol, v_err, v_int, v_list, v_obj, v_str};
use loam_db::WorldState;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

struct RecordingSession {
    output: Mutex<Vec<(Obj, String)>>,
    input_requests: Mutex<Vec<(Obj, Uuid)>>,
}

impl RecordingSession {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            output: Mutex::new(vec![]),
            input_requests: Mutex::new(vec![]),
        })
    }

    fn output_for(&self, player: Obj) -> Vec<String> {
        self.output
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, s)| s.clone())
            .collect()
    }

    fn last_input_request(&self) -> Option<(Obj, Uuid)> {
        self.input_requests.lock().unwrap().last().copied()
    }
}

impl Session for RecordingSession {
    fn send_text(&self, player: Obj, msg: &str) -> Result<(), SessionError> {
        self.output.lock().unwrap().push((player, msg.to_string()));
        Ok(())
    }

    fn request_input(&self, player: Obj, request: Uuid) -> Result<(), SessionError> {
        self.input_requests.lock().unwrap().push((player, request));
        Ok(())
    }

    fn connection_name(&self, player: Obj) -> Result<String, SessionError> {
        Ok(format!("test:{player}"))
    }

    fn disconnect(&self, _player: Obj) -> Result<(), SessionError> {
        Ok(())
    }

    fn connected_players(&self) -> Result<Vec<Obj>, SessionError> {
        Ok(vec![])
    }

    fn connected_seconds(&self, _player: Obj) -> Result<f64, SessionError> {
        Ok(1.0)
    }

    fn idle_seconds(&self, _player: Obj) -> Result<f64, SessionError> {
        Ok(0.0)
    }

    fn set_connection_option(&self, _: Obj, _: &str, _: &str) -> Result<(), SessionError> {
        Ok(())
    }

    fn connection_options(&self, _: Obj) -> Result<Vec<(String, String)>, SessionError> {
        Ok(vec![])
    }

    fn shutdown(&self, _msg: Option<String>) -> Result<(), SessionError> {
        Ok(())
    }
}

struct World {
    scheduler: Arc<Scheduler>,
    session: Arc<RecordingSession>,
    world: Arc<WorldState>,
    wizard: Obj,
    room: Obj,
    ball: Obj,
    box_: Obj,
}

fn wizard_perms() -> Perms {
    Perms::new(Obj::mk_id(1), BitEnum::new_with(ObjFlag::Wizard))
}

/// `#0` system object, `#1` wizard player in `#2` (a room), holding nothing; `#3` a ball
/// in the room, `#4` a box in the room.
fn build_world() -> World {
    let world = Arc::new(WorldState::new());
    let boot = Perms::new(Obj::mk_id(0), BitEnum::new_with(ObjFlag::Wizard));
    let system = world.create_object(&boot, NOTHING, Obj::mk_id(1)).unwrap();
    assert_eq!(system, Obj::mk_id(0));
    let wizard = world.create_object(&boot, NOTHING, NOTHING).unwrap();
    world
        .update_property(&boot, wizard, &Symbol::mk("wizard"), v_int(1))
        .unwrap();
    world
        .update_property(&boot, wizard, &Symbol::mk("programmer"), v_int(1))
        .unwrap();
    world.set_player_flag(&boot, wizard, true).unwrap();
    world.set_name(&boot, wizard, "wizard").unwrap();

    let perms = wizard_perms();
    let room = world.create_object(&perms, NOTHING, wizard).unwrap();
    world.set_name(&perms, room, "hallway").unwrap();
    let ball = world.create_object(&perms, NOTHING, wizard).unwrap();
    world.set_name(&perms, ball, "ball").unwrap();
    let box_ = world.create_object(&perms, NOTHING, wizard).unwrap();
    world.set_name(&perms, box_, "box").unwrap();
    world.move_object(&perms, wizard, room).unwrap();
    world.move_object(&perms, ball, room).unwrap();
    world.move_object(&perms, box_, room).unwrap();

    let config = Arc::new(Config::default());
    let scheduler = Scheduler::new(world.clone(), config);
    let session = RecordingSession::new();
    World {
        scheduler,
        session,
        world,
        wizard,
        room,
        ball,
        box_,
    }
}

fn add_verb(
    w: &World,
    on: Obj,
    names: &[&str],
    argspec: VerbArgsSpec,
    flags: BitEnum<VerbFlag>,
    code: &str,
) {
    let perms = wizard_perms();
    let names: Vec<Symbol> = names.iter().map(|n| Symbol::mk(n)).collect();
    w.world
        .add_verb(&perms, on, names, w.wizard, flags, argspec)
        .unwrap();
    let index = w.world.verbs(&perms, on).unwrap().len() - 1;
    let program = loam_compiler::compile(code).unwrap();
    w.world.set_verb_program(&perms, on, index, program).unwrap();
}

/// Mimic the command layer's `;`/`;;` shorthand: one leading `;` is consumed here, and a
/// second one (if present) flips the eval into statement mode.
fn eval(w: &World, code: &str) -> TaskResult {
    let code = code.strip_prefix(';').unwrap_or(code);
    let handle = w
        .scheduler
        .submit_eval_task(w.wizard, w.wizard, code.to_string(), w.session.clone())
        .unwrap();
    wait_for_result(handle, Duration::from_secs(5)).unwrap()
}

fn eval_ok(w: &World, code: &str) -> loam_var::Var {
    match eval(w, code) {
        TaskResult::Success(v) => v,
        TaskResult::Error(e) => panic!("eval of {code:?} failed: {e:?}"),
    }
}

fn command(w: &World, line: &str) -> TaskResult {
    let handle = w
        .scheduler
        .submit_command_task(w.wizard, line, w.session.clone())
        .unwrap();
    wait_for_result(handle, Duration::from_secs(5)).unwrap()
}

#[test]
fn test_eval_arithmetic_and_precedence() {
    let w = build_world();
    assert_eq!(eval_ok(&w, ";1 + 2 * 3"), v_int(7));
    assert_eq!(eval_ok(&w, ";2 ^ 3 ^ 2"), v_int(512));
    assert_eq!(eval_ok(&w, ";\"foo\" + \"bar\""), v_str("foobar"));
}

#[test]
fn test_eval_statement_block() {
    let w = build_world();
    let r = eval_ok(
        &w,
        ";;x = 0; for i in [1..10] x = x + i; endfor return x;",
    );
    assert_eq!(r, v_int(55));
}

#[test]
fn test_string_slicing() {
    let w = build_world();
    assert_eq!(eval_ok(&w, ";\"hello\"[2..$]"), v_str("ello"));
    assert_eq!(eval_ok(&w, ";\"hello\"[$]"), v_str("o"));
    match eval(&w, ";\"hello\"[0]") {
        TaskResult::Error(SchedulerError::TaskAbortedException(e)) => {
            assert_eq!(e.error, E_RANGE);
        }
        other => panic!("expected range exception, got {other:?}"),
    }
    // Inverted ranges are empty, not errors.
    assert_eq!(eval_ok(&w, ";\"hello\"[4..2]"), v_str(""));
}

#[test]
fn test_scatter_assignment() {
    let w = build_world();
    let r = eval_ok(&w, ";;{a, ?b = 5, @c} = {1}; return {a, b, c};");
    assert_eq!(r, v_list(&[v_int(1), v_int(5), v_list(&[])]));
    let r = eval_ok(&w, ";;{a, ?b = 5, @c} = {1, 2, 3, 4}; return {a, b, c};");
    assert_eq!(
        r,
        v_list(&[v_int(1), v_int(2), v_list(&[v_int(3), v_int(4)])])
    );
}

#[test]
fn test_try_except_catches_matching_code() {
    let w = build_world();
    let r = eval_ok(
        &w,
        ";;try x = 1/0; except e (E_DIV) x = 42; endtry return x;",
    );
    assert_eq!(r, v_int(42));
}

#[test]
fn test_try_except_mismatched_code_propagates() {
    let w = build_world();
    match eval(&w, ";;try x = 1/0; except e (E_PERM) x = 42; endtry return x;") {
        TaskResult::Error(SchedulerError::TaskAbortedException(e)) => {
            assert_eq!(e.error, E_DIV);
        }
        other => panic!("expected E_DIV exception, got {other:?}"),
    }
}

#[test]
fn test_catch_expression() {
    let w = build_world();
    assert_eq!(eval_ok(&w, ";`1/0 ! E_DIV => 42'"), v_int(42));
    assert_eq!(eval_ok(&w, ";`1/0 ! ANY'"), v_err(E_DIV));
}

#[test]
fn test_finally_runs_on_error() {
    let w = build_world();
    let r = eval_ok(
        &w,
        ";;add_property(#0, \"tally\", 0, {player, \"rw\"}); \
         try try 1/0; finally #0.tally = 1; endtry except e (ANY) endtry return #0.tally;",
    );
    assert_eq!(r, v_int(1));
}

#[test]
fn test_tick_exhaustion_aborts_task() {
    let w = build_world();
    add_verb(
        &w,
        w.room,
        &["spin"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rxd(),
        "while (1)\nendwhile",
    );
    match command(&w, "spin") {
        TaskResult::Error(SchedulerError::TaskAbortedLimit(AbortLimitReason::Ticks(_))) => {}
        other => panic!("expected tick abort, got {other:?}"),
    }
    // The scheduler survives; other tasks keep running.
    assert_eq!(eval_ok(&w, ";1 + 1"), v_int(2));
}

#[test]
fn test_prepositional_command_moves_ball() {
    let w = build_world();
    add_verb(
        &w,
        w.ball,
        &["put"],
        VerbArgsSpec {
            dobj: ArgSpec::This,
            prep: PrepSpec::Other(Preposition::IntoIn),
            iobj: ArgSpec::Any,
        },
        VerbFlag::rxd(),
        "move(dobj, iobj);\nreturn 1;",
    );
    match command(&w, "put ball in box") {
        TaskResult::Success(_) => {}
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(w.world.location_of(w.ball).unwrap(), w.box_);
}

#[test]
fn test_multiword_preposition_selects_right_verb() {
    let w = build_world();
    add_verb(
        &w,
        w.ball,
        &["drop"],
        VerbArgsSpec {
            dobj: ArgSpec::This,
            prep: PrepSpec::Other(Preposition::IntoIn),
            iobj: ArgSpec::Any,
        },
        VerbFlag::rxd(),
        "return \"in\";",
    );
    add_verb(
        &w,
        w.ball,
        &["drop"],
        VerbArgsSpec {
            dobj: ArgSpec::This,
            prep: PrepSpec::Other(Preposition::InFrontOf),
            iobj: ArgSpec::Any,
        },
        VerbFlag::rxd(),
        "return \"in front of\";",
    );
    match command(&w, "drop ball in front of box") {
        TaskResult::Success(v) => assert_eq!(v, v_str("in front of")),
        other => panic!("expected success, got {other:?}"),
    }
    match command(&w, "drop ball in box") {
        TaskResult::Success(v) => assert_eq!(v, v_str("in")),
        other => panic!("expected success, got {other:?}"),
    }
}

#[test]
fn test_huh_fallback() {
    let w = build_world();
    add_verb(
        &w,
        w.room,
        &["huh"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rxd(),
        "notify(player, \"eh? \" + argstr);\nreturn 0;",
    );
    let _ = command(&w, "frobnicate the widget");
    let out = w.session.output_for(w.wizard);
    assert!(out.iter().any(|l| l == "eh? the widget"));
}

#[test]
fn test_do_command_consumes() {
    let w = build_world();
    add_verb(
        &w,
        Obj::mk_id(0),
        &["do_command"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rxd(),
        "if (args && args[1] == \"xyzzy\")\nnotify(player, \"a hollow voice says plugh\");\nreturn 1;\nendif\nreturn 0;",
    );
    match command(&w, "xyzzy") {
        TaskResult::Success(v) => assert!(v.is_true()),
        other => panic!("expected do_command to consume, got {other:?}"),
    }
    let out = w.session.output_for(w.wizard);
    assert!(out.iter().any(|l| l.contains("plugh")));
}

#[test]
fn test_verb_dispatch_and_setuid() {
    let w = build_world();
    // A mortal programmer owns nothing special.
    let boot = wizard_perms();
    let mortal = w.world.create_object(&boot, NOTHING, NOTHING).unwrap();
    w.world
        .update_property(&boot, mortal, &Symbol::mk("programmer"), v_int(1))
        .unwrap();
    w.world.set_player_flag(&boot, mortal, true).unwrap();

    // outer (owned by mortal) calls inner (owned by wizard, setuid to wizard).
    let perms = wizard_perms();
    w.world
        .add_verb(
            &perms,
            w.room,
            vec![Symbol::mk("outer")],
            mortal,
            VerbFlag::rxd(),
            VerbArgsSpec::none_none_none(),
        )
        .unwrap();
    let idx = w.world.verbs(&perms, w.room).unwrap().len() - 1;
    w.world
        .set_verb_program(
            &perms,
            w.room,
            idx,
            loam_compiler::compile("return this:inner();").unwrap(),
        )
        .unwrap();
    add_verb(
        &w,
        w.room,
        &["inner"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rxd(),
        "return {caller_perms(), callers()[1][3]};",
    );
    let r = eval_ok(&w, &format!(";#{}:outer()", w.room.id()));
    let l = r.as_list().unwrap();
    // caller_perms() reports the pre-crossing (mortal) identity; the inner frame itself
    // runs setuid as the wizard owner.
    assert_eq!(l.index(1).unwrap(), v_obj(mortal));
    assert_eq!(l.index(2).unwrap(), v_obj(mortal));
}

#[test]
fn test_verb_without_x_bit_is_invisible() {
    let w = build_world();
    add_verb(
        &w,
        w.room,
        &["hidden"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rd(),
        "return 1;",
    );
    // A non-wizard programmer calling it sees E_VERBNF, not E_PERM.
    let boot = wizard_perms();
    let mortal = w.world.create_object(&boot, NOTHING, NOTHING).unwrap();
    w.world
        .update_property(&boot, mortal, &Symbol::mk("programmer"), v_int(1))
        .unwrap();
    w.world.set_player_flag(&boot, mortal, true).unwrap();
    let handle = w
        .scheduler
        .submit_eval_task(
            mortal,
            mortal,
            format!(";return #{}:hidden();", w.room.id()),
            w.session.clone(),
        )
        .unwrap();
    match wait_for_result(handle, Duration::from_secs(5)).unwrap() {
        TaskResult::Error(SchedulerError::TaskAbortedException(e)) => {
            assert_eq!(e.error, E_VERBNF);
        }
        other => panic!("expected E_VERBNF, got {other:?}"),
    }
}

#[test]
fn test_no_debug_error_becomes_value() {
    let w = build_world();
    add_verb(
        &w,
        w.room,
        &["risky"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rx(),
        "return 1/0;",
    );
    let r = eval_ok(&w, &format!(";#{}:risky()", w.room.id()));
    assert_eq!(r, v_err(E_DIV));
}

#[test]
fn test_no_debug_abandons_statement_and_continues() {
    let w = build_world();
    // The failing assignment is abandoned; the statements after it still run.
    add_verb(
        &w,
        w.room,
        &["sturdy"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rx(),
        "x = 1/0;\ny = 97;\nreturn y + 2;",
    );
    let r = eval_ok(&w, &format!(";#{}:sturdy()", w.room.id()));
    assert_eq!(r, v_int(99));
}

#[test]
fn test_no_debug_try_except_still_handles() {
    let w = build_world();
    // Handlers get first claim even in a debug-clear verb; the no-debug swallow only
    // applies to errors nothing caught.
    add_verb(
        &w,
        w.room,
        &["careful"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rx(),
        "try\nx = 1/0;\nexcept e (E_DIV)\nreturn 42;\nendtry\nreturn 0;",
    );
    let r = eval_ok(&w, &format!(";#{}:careful()", w.room.id()));
    assert_eq!(r, v_int(42));
}

#[test]
fn test_sysprop_sugar() {
    let w = build_world();
    let perms = wizard_perms();
    w.world
        .define_property(
            &perms,
            Obj::mk_id(0),
            &Symbol::mk("greeting"),
            w.wizard,
            loam_common::model::PropFlag::rc(),
            v_str("howdy"),
        )
        .unwrap();
    assert_eq!(eval_ok(&w, ";$greeting"), v_str("howdy"));
}

#[test]
fn test_suspend_with_timeout_resumes() {
    let w = build_world();
    assert_eq!(eval_ok(&w, ";;suspend(0); return 42;"), v_int(42));
}

#[test]
fn test_kill_running_task() {
    let w = build_world();
    add_verb(
        &w,
        w.room,
        &["churn"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rxd(),
        "while (1)\nsuspend(0);\nendwhile",
    );
    let handle = w
        .scheduler
        .submit_command_task(w.wizard, "churn", w.session.clone())
        .unwrap();
    let task_id = handle.task_id();
    std::thread::sleep(Duration::from_millis(100));
    w.scheduler.kill_task(task_id, &wizard_perms()).unwrap();
    match wait_for_result(handle, Duration::from_secs(5)).unwrap() {
        TaskResult::Error(SchedulerError::TaskAbortedCancelled) => {}
        other => panic!("expected cancellation, got {other:?}"),
    }
    // The rest of the system is untouched.
    assert_eq!(eval_ok(&w, ";1"), v_int(1));
}

#[test]
fn test_read_delivers_next_line() {
    let w = build_world();
    let handle = w
        .scheduler
        .submit_eval_task(
            w.wizard,
            w.wizard,
            ";return read() + \"!\";".to_string(),
            w.session.clone(),
        )
        .unwrap();
    // Wait for the task to park in read().
    let request = loop {
        if let Some((_, request)) = w.session.last_input_request() {
            break request;
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    w.scheduler
        .submit_requested_input(request, "hello".to_string())
        .unwrap();
    match wait_for_result(handle, Duration::from_secs(5)).unwrap() {
        TaskResult::Success(v) => assert_eq!(v, v_str("hello!")),
        other => panic!("expected read result, got {other:?}"),
    }
}

#[test]
fn test_resume_suspended_task() {
    let w = build_world();
    let handle = w
        .scheduler
        .submit_eval_task(
            w.wizard,
            w.wizard,
            ";return suspend();".to_string(),
            w.session.clone(),
        )
        .unwrap();
    let task_id = handle.task_id();
    // Wait for the task to appear in the suspended queue.
    loop {
        if w.scheduler.queued_tasks().iter().any(|t| t.task_id == task_id) {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    w.scheduler
        .resume_task(task_id, v_str("woken"), &wizard_perms())
        .unwrap();
    match wait_for_result(handle, Duration::from_secs(5)).unwrap() {
        TaskResult::Success(v) => assert_eq!(v, v_str("woken")),
        other => panic!("expected resume value, got {other:?}"),
    }
}

#[test]
fn test_fork_runs_detached() {
    let w = build_world();
    let r = eval_ok(
        &w,
        ";;add_property(#0, \"forked\", 0, {player, \"rw\"}); \
         fork (1) #0.forked = 1; endfork return #0.forked;",
    );
    // The fork is still sitting out its delay when the parent finishes.
    assert_eq!(r, v_int(0));
    // But it runs shortly after.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if eval_ok(&w, ";$forked") == v_int(1) {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "fork never ran");
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_builtin_property_write_through_eval() {
    let w = build_world();
    let r = eval_ok(&w, &format!(";;#{}.name = \"lobby\"; return #{}.name;", w.room.id(), w.room.id()));
    assert_eq!(r, v_str("lobby"));
}

#[test]
fn test_dynamic_property_and_verb_forms() {
    let w = build_world();
    add_verb(
        &w,
        w.room,
        &["greet"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rxd(),
        "return \"hi \" + args[1];",
    );
    let code = format!(
        ";;vname = \"greet\"; return #{}:(vname)(\"there\");",
        w.room.id()
    );
    assert_eq!(eval_ok(&w, &code), v_str("hi there"));
    let perms = wizard_perms();
    w.world
        .define_property(
            &perms,
            w.room,
            &Symbol::mk("mood"),
            w.wizard,
            loam_common::model::PropFlag::rc(),
            v_str("calm"),
        )
        .unwrap();
    let code = format!(";;p = \"mood\"; return #{}.(p);", w.room.id());
    assert_eq!(eval_ok(&w, &code), v_str("calm"));
}

#[test]
fn test_in_operator_and_equality() {
    let w = build_world();
    assert_eq!(eval_ok(&w, ";\"Ball\" in {\"ball\", \"box\"}"), v_int(1));
    assert_eq!(eval_ok(&w, ";3 in {1, 2}"), v_int(0));
    assert_eq!(eval_ok(&w, ";1 == 1.0"), v_int(0));
    assert_eq!(eval_ok(&w, ";#-1 && 1"), v_int(1));
}

#[test]
fn test_notify_reaches_session() {
    let w = build_world();
    eval_ok(&w, ";notify(player, \"ding\")");
    let out = w.session.output_for(w.wizard);
    assert!(out.iter().any(|l| l == "ding"));
}

#[test]
fn test_pass_dispatches_to_ancestor() {
    let w = build_world();
    let perms = wizard_perms();
    let generic = w.world.create_object(&perms, NOTHING, w.wizard).unwrap();
    add_verb(
        &w,
        generic,
        &["describe"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rxd(),
        "return \"generic\";",
    );
    let special = w.world.create_object(&perms, generic, w.wizard).unwrap();
    add_verb(
        &w,
        special,
        &["describe"],
        VerbArgsSpec::none_none_none(),
        VerbFlag::rxd(),
        "return pass() + \"+special\";",
    );
    let r = eval_ok(&w, &format!(";#{}:describe()", special.id()));
    assert_eq!(r, v_str("generic+special"));
}
