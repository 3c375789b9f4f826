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
use crate::vm::{ExecFault, Interpreter};
use loam_common::model::{ArgSpec, PrepSpec, VerbArgsSpec, VerbFlag, verb_flags_string};
use loam_var::ErrorCode::{E_INVARG, E_TYPE};
use loam_var::{Obj, Symbol, Var, v_int, v_list, v_obj, v_str, v_string};

pub(crate) fn register_all(registry: &mut BuiltinRegistry) {
    register(registry, "verbs", 1, Some(1), bf_verbs);
    register(registry, "verb_info", 2, Some(2), bf_verb_info);
    register(registry, "set_verb_info", 3, Some(3), bf_set_verb_info);
    register(registry, "verb_args", 2, Some(2), bf_verb_args);
    register(registry, "set_verb_args", 3, Some(3), bf_set_verb_args);
    register(registry, "verb_code", 2, Some(4), bf_verb_code);
    register(registry, "set_verb_code", 3, Some(3), bf_set_verb_code);
    register(registry, "add_verb", 3, Some(3), bf_add_verb);
    register(registry, "delete_verb", 2, Some(2), bf_delete_verb);
    register(registry, "eval", 1, Some(1), bf_eval);
}

fn verb_desc_arg(interp: &Interpreter<'_>, obj: Obj, v: &Var) -> Result<usize, ExecFault> {
    let Some(s) = v.as_string() else {
        return Err(E_TYPE.into());
    };
    Ok(interp.world.local_verb_index(obj, s.as_str())?)
}

fn bf_verbs(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let perms = interp.task_perms();
    let names: Vec<Var> = interp
        .world
        .verbs(&perms, obj)?
        .into_iter()
        .map(v_string)
        .collect();
    Ok(v_list(&names))
}

fn bf_verb_info(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let index = verb_desc_arg(interp, obj, &args[1])?;
    let vd = interp.world.get_verbdef(obj, index)?;
    let perms = interp.task_perms();
    perms
        .check_verb_allows(vd.owner, vd.flags, VerbFlag::Read)
        .map_err(loam_var::Error::from)?;
    Ok(v_list(&[
        v_obj(vd.owner),
        v_string(verb_flags_string(vd.flags)),
        v_string(vd.names_string()),
    ]))
}

/// `set_verb_info(obj, verb-desc, {owner, perms, names})`.
fn bf_set_verb_info(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let index = verb_desc_arg(interp, obj, &args[1])?;
    let Some(info) = args[2].as_list() else {
        return Err(E_TYPE.into());
    };
    if info.len() != 3 {
        return Err(E_INVARG.into());
    }
    let owner = obj_arg(&info.index(1)?)?;
    let flags = parse_verb_flags(&info.index(2)?)?;
    let names = parse_verb_names(&info.index(3)?)?;
    let perms = interp.task_perms();
    interp
        .world
        .set_verb_info(&perms, obj, index, Some(owner), Some(flags), Some(names))?;
    Ok(v_int(0))
}

fn parse_verb_flags(
    v: &Var,
) -> Result<loam_common::util::BitEnum<VerbFlag>, ExecFault> {
    let Some(s) = v.as_string() else {
        return Err(E_TYPE.into());
    };
    VerbFlag::parse_str(s.as_str()).ok_or_else(|| E_INVARG.into())
}

fn parse_verb_names(v: &Var) -> Result<Vec<Symbol>, ExecFault> {
    let Some(s) = v.as_string() else {
        return Err(E_TYPE.into());
    };
    let names: Vec<Symbol> = s.as_str().split_whitespace().map(Symbol::mk).collect();
    if names.is_empty() {
        return Err(E_INVARG.into());
    }
    Ok(names)
}

fn bf_verb_args(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let index = verb_desc_arg(interp, obj, &args[1])?;
    let vd = interp.world.get_verbdef(obj, index)?;
    let perms = interp.task_perms();
    perms
        .check_verb_allows(vd.owner, vd.flags, VerbFlag::Read)
        .map_err(loam_var::Error::from)?;
    let prep = match vd.argspec.prep {
        PrepSpec::Any => "any".to_string(),
        PrepSpec::None => "none".to_string(),
        PrepSpec::Other(p) => p.to_string().to_string(),
    };
    Ok(v_list(&[
        v_str(vd.argspec.dobj.to_string()),
        v_string(prep),
        v_str(vd.argspec.iobj.to_string()),
    ]))
}

/// `set_verb_args(obj, verb-desc, {dobj, prep, iobj})`.
fn bf_set_verb_args(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let index = verb_desc_arg(interp, obj, &args[1])?;
    let argspec = parse_argspec(&args[2])?;
    let perms = interp.task_perms();
    interp.world.set_verb_args(&perms, obj, index, argspec)?;
    Ok(v_int(0))
}

fn parse_argspec(v: &Var) -> Result<VerbArgsSpec, ExecFault> {
    let Some(spec) = v.as_list() else {
        return Err(E_TYPE.into());
    };
    if spec.len() != 3 {
        return Err(E_INVARG.into());
    }
    let part = |i: i64| -> Result<String, ExecFault> {
        let v = spec.index(i)?;
        match v.as_string() {
            Some(s) => Ok(s.as_str().to_lowercase()),
            None => Err(E_TYPE.into()),
        }
    };
    let dobj = ArgSpec::from_string(&part(1)?).ok_or_else(|| ExecFault::from(E_INVARG))?;
    let prep = PrepSpec::parse(&part(2)?).ok_or_else(|| ExecFault::from(E_INVARG))?;
    let iobj = ArgSpec::from_string(&part(3)?).ok_or_else(|| ExecFault::from(E_INVARG))?;
    Ok(VerbArgsSpec { dobj, prep, iobj })
}

fn bf_verb_code(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let index = verb_desc_arg(interp, obj, &args[1])?;
    let perms = interp.task_perms();
    let program = interp.world.verb_program(&perms, obj, index)?;
    let lines: Vec<Var> = program.source_lines().into_iter().map(v_string).collect();
    Ok(v_list(&lines))
}

/// `set_verb_code(obj, verb-desc, lines)`: returns the empty list on success, the parse
/// errors otherwise (leaving the code untouched).
fn bf_set_verb_code(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let index = verb_desc_arg(interp, obj, &args[1])?;
    let Some(lines) = args[2].as_list() else {
        return Err(E_TYPE.into());
    };
    let mut source_lines = Vec::with_capacity(lines.len());
    for line in lines.iter() {
        let Some(s) = line.as_string() else {
            return Err(E_TYPE.into());
        };
        source_lines.push(s.as_str().to_string());
    }
    let source = source_lines.join("\n");
    let program = match loam_compiler::compile(&source) {
        Ok(program) => program,
        Err(e) => return Ok(v_list(&[v_string(e.to_string())])),
    };
    let perms = interp.task_perms();
    interp.world.set_verb_program(&perms, obj, index, program)?;
    Ok(v_list(&[]))
}

/// `add_verb(obj, {owner, perms, names}, {dobj, prep, iobj})`.
fn bf_add_verb(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let Some(info) = args[1].as_list() else {
        return Err(E_TYPE.into());
    };
    if info.len() != 3 {
        return Err(E_INVARG.into());
    }
    let owner = obj_arg(&info.index(1)?)?;
    let flags = parse_verb_flags(&info.index(2)?)?;
    let names = parse_verb_names(&info.index(3)?)?;
    let argspec = parse_argspec(&args[2])?;
    let perms = interp.task_perms();
    if owner != perms.who && !perms.is_wizard() {
        return Err(loam_var::ErrorCode::E_PERM.into());
    }
    interp
        .world
        .add_verb(&perms, obj, names, owner, flags, argspec)?;
    Ok(v_int(0))
}

fn bf_delete_verb(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let index = verb_desc_arg(interp, obj, &args[1])?;
    let perms = interp.task_perms();
    interp.world.delete_verb(&perms, obj, index)?;
    Ok(v_int(0))
}

/// `eval(code)`: run a statement string in-task as the programmer. Returns
/// `{1, value}` on success or `{0, {error-messages}}`.
fn bf_eval(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let Some(code) = args[0].as_string() else {
        return Err(E_TYPE.into());
    };
    let perms = interp.task_perms();
    if !perms.is_programmer() && !perms.is_wizard() {
        return Err(loam_var::ErrorCode::E_PERM.into());
    }
    let program = match loam_compiler::compile(code.as_str()) {
        Ok(program) => program,
        Err(e) => {
            return Ok(v_list(&[v_int(0), v_list(&[v_string(e.to_string())])]));
        }
    };
    let (player, this_perms) = (interp.player, interp.task_perms_obj());
    let r = interp.run_frame(
        player,
        "eval",
        loam_var::NOTHING,
        this_perms,
        true,
        program,
        vec![],
        player,
    );
    match r {
        Ok(v) => Ok(v_list(&[v_int(1), v])),
        Err(ExecFault::Err(e)) => Ok(v_list(&[v_int(0), v_list(&[v_string(e.to_string())])])),
        Err(abort) => Err(abort),
    }
}
