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

use crate::builtins;
use crate::config::Config;
use crate::tasks::command_parse::ParsedCommand;
use crate::tasks::scheduler::Scheduler;
use crate::vm::Activation;
use loam_common::model::{Perms, VerbFlag};
use loam_common::tasks::{Session, TaskId};
use loam_compiler::Program;
use loam_compiler::ast::{
    Arg, BinaryOp, CatchCodes, CondArm, ExceptArm, Expr, ScatterItem, ScatterKind, Stmt, StmtNode,
    UnaryOp,
};
use loam_db::WorldState;
use loam_var::ErrorCode::{E_ARGS, E_INVIND, E_MAXREC, E_TYPE, E_VARNF, E_VERBNF};
use loam_var::{
    Error, NOTHING, Obj, Symbol, Var, Variant, v_empty_list, v_error, v_int, v_list, v_listv,
    v_str,
};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

/// Why a task stopped without producing a value. Aborts are not visible to MOO error
/// handling; only `finally` bodies get a chance to run on the way out.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AbortReason {
    OutOfTicks,
    Killed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecFault {
    Err(Error),
    Abort(AbortReason),
}

/// Control-flow signals from statement execution, threaded up as values rather than any
/// kind of unwinding.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Var),
}

/// Ticks granted to `finally` bodies while unwinding an abort, so cleanup runs even when
/// the budget is what killed the task.
const FINALLY_GRACE_TICKS: usize = 1_000;

/// The tree-walking evaluator for one task. Owns the activation stack; all world access
/// goes through the explicit handles, so there is no ambient task state anywhere.
pub struct Interpreter<'a> {
    pub world: &'a Arc<WorldState>,
    pub session: &'a Arc<dyn Session>,
    pub scheduler: &'a Arc<Scheduler>,
    pub config: &'a Config,
    pub task_id: TaskId,
    pub player: Obj,
    pub kill_switch: Arc<AtomicBool>,
    pub ticks_left: usize,
    pub stack: Vec<Activation>,
    pub command: Option<ParsedCommand>,
    pub traceback: Vec<String>,
    /// Lengths of the collections currently being indexed, innermost last; what `$` means.
    index_lengths: Vec<i64>,
}

impl<'a> Interpreter<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        world: &'a Arc<WorldState>,
        session: &'a Arc<dyn Session>,
        scheduler: &'a Arc<Scheduler>,
        config: &'a Config,
        task_id: TaskId,
        player: Obj,
        kill_switch: Arc<AtomicBool>,
        command: Option<ParsedCommand>,
    ) -> Self {
        Self {
            world,
            session,
            scheduler,
            config,
            task_id,
            player,
            kill_switch,
            ticks_left: config.tick_limit,
            stack: vec![],
            command,
            traceback: vec![],
            index_lengths: vec![],
        }
    }

    /// One tick per primitive operation; this is also where cancellation lands.
    fn tick(&mut self) -> Result<(), ExecFault> {
        if self.kill_switch.load(AtomicOrdering::Relaxed) {
            return Err(ExecFault::Abort(AbortReason::Killed));
        }
        if self.ticks_left == 0 {
            return Err(ExecFault::Abort(AbortReason::OutOfTicks));
        }
        self.ticks_left -= 1;
        Ok(())
    }

    pub fn replenish_ticks(&mut self) {
        self.ticks_left = self.config.tick_limit;
    }

    pub fn frame(&self) -> &Activation {
        self.stack.last().expect("no active frame")
    }

    pub fn frame_mut(&mut self) -> &mut Activation {
        self.stack.last_mut().expect("no active frame")
    }

    /// The permission identity of the running frame (the task's `perms`).
    #[must_use]
    pub fn task_perms_obj(&self) -> Obj {
        self.stack.last().map(|f| f.perms).unwrap_or(self.player)
    }

    #[must_use]
    pub fn task_perms(&self) -> Perms {
        self.world.perms_of(self.task_perms_obj())
    }

    /// The permissions of the frame below the current one: what `caller_perms()` reports.
    #[must_use]
    pub fn caller_perms_obj(&self) -> Obj {
        if self.stack.len() >= 2 {
            self.stack[self.stack.len() - 2].perms
        } else {
            self.player
        }
    }

    /// Invoke a verb as a fresh frame on this task's stack and run it to completion.
    /// Applies setuid promotion, the `x` bit rule, and the no-debug error-to-value rule.
    pub fn call_verb(
        &mut self,
        this: Obj,
        verb_name: &str,
        args: Vec<Var>,
        caller: Obj,
    ) -> Result<Var, ExecFault> {
        if self.stack.len() >= self.config.max_stack_depth {
            return Err(E_MAXREC.into());
        }
        if !self.world.valid(this) {
            return Err(E_INVIND.into());
        }
        let resolved = self
            .world
            .resolve_verb(this, verb_name, None)
            .map_err(|_| Error::from(E_VERBNF))?;
        // A verb without the execute bit is indistinguishable from a missing one, unless
        // the caller is a wizard.
        if !resolved.verbdef.flags.contains(VerbFlag::Exec) && !self.task_perms().is_wizard() {
            return Err(E_VERBNF.into());
        }
        self.run_frame(
            this,
            verb_name,
            resolved.definer,
            resolved.verbdef.owner,
            resolved.verbdef.flags.contains(VerbFlag::Debug),
            resolved.verbdef.program.clone(),
            args,
            caller,
        )
    }

    /// Push and execute a frame for an already-resolved program. Used by `call_verb`, the
    /// command dispatcher, `eval`, and forks.
    #[allow(clippy::too_many_arguments)]
    pub fn run_frame(
        &mut self,
        this: Obj,
        verb_name: &str,
        verb_definer: Obj,
        verb_owner: Obj,
        debug: bool,
        program: Program,
        args: Vec<Var>,
        caller: Obj,
    ) -> Result<Var, ExecFault> {
        let activation = Activation::new(
            this,
            self.player,
            caller,
            verb_name,
            verb_definer,
            verb_owner,
            debug,
            args,
            program.clone(),
            self.command.as_ref(),
        );
        self.stack.push(activation);
        let result = self.exec_stmts(program.stmts());
        let frame = self.stack.pop().expect("frame imbalance");
        match result {
            Ok(Flow::Return(v)) => Ok(v),
            Ok(_) => Ok(v_int(0)),
            Err(ExecFault::Err(e)) => {
                if frame.debug {
                    self.traceback.push(frame.traceback_line());
                    Err(ExecFault::Err(e))
                } else {
                    // Backstop for errors that slip out of a no-debug frame anyway
                    // (exec_stmts handles the normal statement-level cases).
                    Ok(v_error(e))
                }
            }
            Err(abort) => Err(abort),
        }
    }

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> Result<Flow, ExecFault> {
        for stmt in stmts {
            match self.exec_stmt(stmt) {
                Ok(Flow::Normal) => {}
                Ok(flow) => return Ok(flow),
                Err(ExecFault::Err(e))
                    if !self.frame().debug && self.frame().handler_depth == 0 =>
                {
                    // Legacy no-debug mode, at statement granularity: an error no
                    // handler claimed becomes the failing statement's value. A `return`
                    // returns it; any other statement is abandoned and execution
                    // continues with the next one. Inside a `try` body the error keeps
                    // propagating so the except arms get their look first.
                    if matches!(stmt.node, StmtNode::Return(_)) {
                        return Ok(Flow::Return(v_error(e)));
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, ExecFault> {
        self.tick()?;
        if let Some(f) = self.stack.last_mut() {
            f.line = stmt.line;
        }
        match &stmt.node {
            StmtNode::Expr(e) => {
                self.eval(e)?;
                Ok(Flow::Normal)
            }
            StmtNode::Return(e) => {
                let v = match e {
                    Some(e) => self.eval(e)?,
                    None => v_int(0),
                };
                Ok(Flow::Return(v))
            }
            StmtNode::Break => Ok(Flow::Break),
            StmtNode::Continue => Ok(Flow::Continue),
            StmtNode::Cond { arms, otherwise } => self.exec_cond(arms, otherwise),
            StmtNode::While { condition, body } => self.exec_while(condition, body),
            StmtNode::ForList { id, expr, body } => self.exec_for_list(id, expr, body),
            StmtNode::ForRange { id, from, to, body } => self.exec_for_range(id, from, to, body),
            StmtNode::TryExcept {
                body,
                excepts,
                finally,
            } => self.exec_try(body, excepts, finally),
            StmtNode::Fork { delay, body } => self.exec_fork(delay, body),
        }
    }

    fn exec_cond(&mut self, arms: &[CondArm], otherwise: &[Stmt]) -> Result<Flow, ExecFault> {
        for arm in arms {
            if self.eval(&arm.condition)?.is_true() {
                return self.exec_stmts(&arm.statements);
            }
        }
        self.exec_stmts(otherwise)
    }

    fn exec_while(&mut self, condition: &Expr, body: &[Stmt]) -> Result<Flow, ExecFault> {
        loop {
            if !self.eval(condition)?.is_true() {
                return Ok(Flow::Normal);
            }
            match self.exec_stmts(body)? {
                Flow::Normal | Flow::Continue => continue,
                Flow::Break => return Ok(Flow::Normal),
                flow => return Ok(flow),
            }
        }
    }

    fn exec_for_list(&mut self, id: &Symbol, expr: &Expr, body: &[Stmt]) -> Result<Flow, ExecFault> {
        let over = self.eval(expr)?;
        let Some(list) = over.as_list() else {
            return Err(E_TYPE.into());
        };
        for item in list.iter() {
            self.tick()?;
            self.frame_mut().env.insert(id.clone(), item.clone());
            match self.exec_stmts(body)? {
                Flow::Normal | Flow::Continue => continue,
                Flow::Break => return Ok(Flow::Normal),
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for_range(
        &mut self,
        id: &Symbol,
        from: &Expr,
        to: &Expr,
        body: &[Stmt],
    ) -> Result<Flow, ExecFault> {
        let from = self.eval(from)?;
        let to = self.eval(to)?;
        let (Some(from), Some(to)) = (from.as_integer(), to.as_integer()) else {
            return Err(E_TYPE.into());
        };
        let mut i = from;
        while i <= to {
            self.tick()?;
            self.frame_mut().env.insert(id.clone(), v_int(i));
            match self.exec_stmts(body)? {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => return Ok(Flow::Normal),
                flow => return Ok(flow),
            }
            i += 1;
        }
        Ok(Flow::Normal)
    }

    fn exec_try(
        &mut self,
        body: &[Stmt],
        excepts: &[ExceptArm],
        finally: &[Stmt],
    ) -> Result<Flow, ExecFault> {
        self.frame_mut().handler_depth += 1;
        let body_result = self.exec_stmts(body);
        self.frame_mut().handler_depth -= 1;
        let handled = match body_result {
            Err(ExecFault::Err(e)) => {
                let mut handled = None;
                for arm in excepts {
                    if self.codes_match(&arm.codes, &e)? {
                        if let Some(id) = &arm.id {
                            let info = v_list(&[
                                v_error(e.clone()),
                                v_str(&e.message()),
                                v_int(0),
                                v_empty_list(),
                            ]);
                            self.frame_mut().env.insert(id.clone(), info);
                        }
                        handled = Some(self.exec_stmts(&arm.statements));
                        break;
                    }
                }
                handled.unwrap_or(Err(ExecFault::Err(e)))
            }
            other => other,
        };
        if finally.is_empty() {
            return handled;
        }
        // `finally` runs on every path out, including task termination; grant the cleanup
        // some ticks when an abort is what brought us here.
        if matches!(handled, Err(ExecFault::Abort(_))) {
            self.ticks_left = self.ticks_left.max(FINALLY_GRACE_TICKS);
        }
        let finally_flow = self.exec_stmts(finally)?;
        if finally_flow != Flow::Normal {
            return Ok(finally_flow);
        }
        handled
    }

    fn exec_fork(&mut self, delay: &Expr, body: &[Stmt]) -> Result<Flow, ExecFault> {
        let delay = self.eval(delay)?;
        let seconds = match delay.variant() {
            Variant::Int(i) if *i >= 0 => *i as f64,
            Variant::Float(f) if *f >= 0.0 => *f,
            _ => return Err(E_TYPE.into()),
        };
        let frame = self.frame();
        let program = Program::new(body.to_vec(), String::new());
        let _ = self.scheduler.submit_fork_task(
            seconds,
            self.player,
            frame.perms,
            frame.this,
            frame.verb_name.clone(),
            frame.verb_definer,
            frame.env.clone(),
            program,
            self.session.clone(),
        );
        Ok(Flow::Normal)
    }

    fn codes_match(&mut self, codes: &CatchCodes, e: &Error) -> Result<bool, ExecFault> {
        match codes {
            CatchCodes::Any => Ok(true),
            CatchCodes::Codes(args) => {
                let vals = self.eval_args(args)?;
                Ok(vals.iter().any(|v| match v.variant() {
                    Variant::Err(code) => code == e,
                    Variant::Int(i) => *i == e.to_int() as i64,
                    _ => false,
                }))
            }
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Var, ExecFault> {
        self.tick()?;
        match expr {
            Expr::Value(v) => Ok(v.clone()),
            Expr::Id(id) => self
                .frame()
                .env
                .get(id)
                .cloned()
                .ok_or_else(|| E_VARNF.into()),
            Expr::And(l, r) => {
                let l = self.eval(l)?;
                if !l.is_true() {
                    return Ok(l);
                }
                self.eval(r)
            }
            Expr::Or(l, r) => {
                let l = self.eval(l)?;
                if l.is_true() {
                    return Ok(l);
                }
                self.eval(r)
            }
            Expr::Unary(op, e) => {
                let v = self.eval(e)?;
                match op {
                    UnaryOp::Neg => Ok(v.neg()?),
                    UnaryOp::Not => Ok(v_int(if v.is_true() { 0 } else { 1 })),
                }
            }
            Expr::Binary(op, l, r) => {
                let l = self.eval(l)?;
                let r = self.eval(r)?;
                self.binary_op(*op, &l, &r)
            }
            Expr::Prop { location, property } => {
                let location = self.eval(location)?;
                let name = self.eval(property)?;
                let (obj, name) = self.check_prop_target(&location, &name)?;
                let perms = self.task_perms();
                Ok(self.world.retrieve_property(&perms, obj, &name)?)
            }
            Expr::Verb {
                location,
                verb,
                args,
            } => {
                let location = self.eval(location)?;
                let name = self.eval(verb)?;
                let args = self.eval_args(args)?;
                let Some(obj) = location.as_object() else {
                    return Err(E_TYPE.into());
                };
                let Some(name) = name.as_string() else {
                    return Err(E_TYPE.into());
                };
                let caller = self.frame().this;
                self.call_verb(obj, &name.as_str().to_string(), args, caller)
            }
            Expr::Call { function, args } => {
                let args = self.eval_args(args)?;
                builtins::dispatch(self, function, args)
            }
            Expr::Pass { args } => {
                let args = self.eval_args(args)?;
                self.pass_verb(args)
            }
            Expr::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval_index_expr(&base, index)?;
                Ok(base.index(&index)?)
            }
            Expr::Range { base, from, to } => {
                let base = self.eval(base)?;
                let from = self.eval_index_expr(&base, from)?;
                let to = self.eval_index_expr(&base, to)?;
                Ok(base.range(&from, &to)?)
            }
            Expr::Length => {
                let Some(len) = self.index_lengths.last() else {
                    return Err(E_VARNF.into());
                };
                Ok(v_int(*len))
            }
            Expr::Cond {
                condition,
                consequence,
                alternative,
            } => {
                if self.eval(condition)?.is_true() {
                    self.eval(consequence)
                } else {
                    self.eval(alternative)
                }
            }
            Expr::Catch {
                trye,
                codes,
                except,
            } => match self.eval(trye) {
                Ok(v) => Ok(v),
                Err(ExecFault::Err(e)) => {
                    if self.codes_match(codes, &e)? {
                        match except {
                            Some(d) => self.eval(d),
                            None => Ok(v_error(e)),
                        }
                    } else {
                        Err(ExecFault::Err(e))
                    }
                }
                Err(abort) => Err(abort),
            },
            Expr::List(args) => {
                let vals = self.eval_args(args)?;
                Ok(v_listv(vals))
            }
            Expr::Scatter(items, right) => {
                let right = self.eval(right)?;
                self.scatter_assign(items, &right)?;
                Ok(right)
            }
            Expr::Assign { left, right } => {
                let value = self.eval(right)?;
                self.assign(left, value.clone())?;
                Ok(value)
            }
        }
    }

    /// Evaluate an index expression with `$` bound to the length of `base`.
    fn eval_index_expr(&mut self, base: &Var, index: &Expr) -> Result<Var, ExecFault> {
        let len = base.len().unwrap_or(0);
        self.index_lengths.push(len);
        let result = self.eval(index);
        self.index_lengths.pop();
        result
    }

    fn binary_op(&mut self, op: BinaryOp, l: &Var, r: &Var) -> Result<Var, ExecFault> {
        let v = match op {
            BinaryOp::Add => l.add(r)?,
            BinaryOp::Sub => l.sub(r)?,
            BinaryOp::Mul => l.mul(r)?,
            BinaryOp::Div => l.div(r)?,
            BinaryOp::Mod => l.modulus(r)?,
            BinaryOp::Exp => l.pow(r)?,
            BinaryOp::Eq => v_int(if l == r { 1 } else { 0 }),
            BinaryOp::NEq => v_int(if l != r { 1 } else { 0 }),
            BinaryOp::Lt => v_int((l.cmp_moo(r)? == Ordering::Less) as i64),
            BinaryOp::Gt => v_int((l.cmp_moo(r)? == Ordering::Greater) as i64),
            BinaryOp::LtE => v_int((l.cmp_moo(r)? != Ordering::Greater) as i64),
            BinaryOp::GtE => v_int((l.cmp_moo(r)? != Ordering::Less) as i64),
            BinaryOp::In => l.index_in(r)?,
        };
        Ok(v)
    }

    fn check_prop_target(
        &mut self,
        location: &Var,
        name: &Var,
    ) -> Result<(Obj, Symbol), ExecFault> {
        let Some(obj) = location.as_object() else {
            return Err(E_TYPE.into());
        };
        if !self.world.valid(obj) {
            return Err(E_INVIND.into());
        }
        let Some(name) = name.as_string() else {
            return Err(E_TYPE.into());
        };
        Ok((obj, Symbol::mk(name.as_str())))
    }

    fn eval_args(&mut self, args: &[Arg]) -> Result<Vec<Var>, ExecFault> {
        let mut out = vec![];
        for arg in args {
            match arg {
                Arg::Normal(e) => out.push(self.eval(e)?),
                Arg::Splice(e) => {
                    let v = self.eval(e)?;
                    let Some(l) = v.as_list() else {
                        return Err(E_TYPE.into());
                    };
                    out.extend(l.iter().cloned());
                }
            }
        }
        Ok(out)
    }

    /// Store into an assignment target. Nested index targets rebuild outward: setting
    /// `a[1][2]` computes the new inner collection, then assigns it back into `a[1]`.
    fn assign(&mut self, target: &Expr, value: Var) -> Result<(), ExecFault> {
        self.tick()?;
        match target {
            Expr::Id(id) => {
                self.frame_mut().env.insert(id.clone(), value);
                Ok(())
            }
            Expr::Prop { location, property } => {
                let location = self.eval(location)?;
                let name = self.eval(property)?;
                let (obj, name) = self.check_prop_target(&location, &name)?;
                let perms = self.task_perms();
                self.world.update_property(&perms, obj, &name, value)?;
                Ok(())
            }
            Expr::Index(base, index) => {
                let current = self.eval(base)?;
                let index = self.eval_index_expr(&current, index)?;
                let updated = current.index_set(&index, &value)?;
                self.assign(base, updated)
            }
            Expr::Range { base, from, to } => {
                let current = self.eval(base)?;
                let from = self.eval_index_expr(&current, from)?;
                let to = self.eval_index_expr(&current, to)?;
                let updated = current.range_set(&from, &to, &value)?;
                self.assign(base, updated)
            }
            _ => Err(E_TYPE.into()),
        }
    }

    fn scatter_assign(&mut self, items: &[ScatterItem], value: &Var) -> Result<(), ExecFault> {
        let Some(list) = value.as_list() else {
            return Err(E_TYPE.into());
        };
        let nargs = list.len();
        let nreq = items
            .iter()
            .filter(|i| i.kind == ScatterKind::Required)
            .count();
        let nopt = items
            .iter()
            .filter(|i| i.kind == ScatterKind::Optional)
            .count();
        let has_rest = items.iter().any(|i| i.kind == ScatterKind::Rest);
        if nargs < nreq || (!has_rest && nargs > nreq + nopt) {
            return Err(E_ARGS.into());
        }
        let opt_take = (nargs - nreq).min(nopt);
        let rest_take = nargs - nreq - opt_take;
        let mut pos = 0;
        let mut opts_taken = 0;
        for item in items {
            match item.kind {
                ScatterKind::Required => {
                    let v = list.index(pos as i64 + 1)?;
                    pos += 1;
                    self.frame_mut().env.insert(item.id.clone(), v);
                }
                ScatterKind::Optional => {
                    if opts_taken < opt_take {
                        let v = list.index(pos as i64 + 1)?;
                        pos += 1;
                        opts_taken += 1;
                        self.frame_mut().env.insert(item.id.clone(), v);
                    } else if let Some(default) = &item.expr {
                        let v = self.eval(default)?;
                        self.frame_mut().env.insert(item.id.clone(), v);
                    }
                }
                ScatterKind::Rest => {
                    let vals: Vec<Var> = list.as_slice()[pos..pos + rest_take].to_vec();
                    pos += rest_take;
                    self.frame_mut().env.insert(item.id.clone(), v_listv(vals));
                }
            }
        }
        Ok(())
    }

    /// `pass(...)`: re-dispatch the running verb name starting above its definer.
    pub fn pass_verb(&mut self, args: Vec<Var>) -> Result<Var, ExecFault> {
        let (this, verb_name, definer, caller) = {
            let f = self.frame();
            (f.this, f.verb_name.clone(), f.verb_definer, f.caller)
        };
        let parent = self.world.parent_of(definer)?;
        if !parent.is_positive() {
            return Err(E_VERBNF.into());
        }
        if self.stack.len() >= self.config.max_stack_depth {
            return Err(E_MAXREC.into());
        }
        let resolved = self
            .world
            .resolve_verb(parent, &verb_name, None)
            .map_err(|_| Error::from(E_VERBNF))?;
        self.run_frame(
            this,
            &verb_name,
            resolved.definer,
            resolved.verbdef.owner,
            resolved.verbdef.flags.contains(VerbFlag::Debug),
            resolved.verbdef.program.clone(),
            args,
            caller,
        )
    }

    /// A throwaway frame so unit tests can exercise built-ins that read frame state.
    #[cfg(test)]
    pub fn push_test_frame(&mut self) {
        let activation = Activation::new(
            self.player,
            self.player,
            self.player,
            "test",
            self.player,
            self.player,
            true,
            vec![],
            Program::empty(),
            None,
        );
        self.stack.push(activation);
    }

    /// Seed-and-run used by fork bodies, which inherit the parent frame's environment.
    #[allow(clippy::too_many_arguments)]
    pub fn run_forked_frame(
        &mut self,
        this: Obj,
        verb_name: &str,
        verb_definer: Obj,
        perms: Obj,
        env: HashMap<Symbol, Var>,
        program: Program,
    ) -> Result<Var, ExecFault> {
        let mut activation = Activation::new(
            this,
            self.player,
            NOTHING,
            verb_name,
            verb_definer,
            perms,
            true,
            vec![],
            program.clone(),
            self.command.as_ref(),
        );
        // The fork body sees the variables as they were at the fork point.
        activation.env.extend(env);
        self.stack.push(activation);
        let result = self.exec_stmts(program.stmts());
        let frame = self.stack.pop().expect("frame imbalance");
        match result {
            Ok(Flow::Return(v)) => Ok(v),
            Ok(_) => Ok(v_int(0)),
            Err(ExecFault::Err(e)) => {
                self.traceback.push(frame.traceback_line());
                Err(ExecFault::Err(e))
            }
            Err(abort) => Err(abort),
        }
    }
}
