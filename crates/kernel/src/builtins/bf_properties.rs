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
use loam_common::model::{PropFlag, prop_flags_string};
use loam_var::ErrorCode::{E_INVARG, E_TYPE};
use loam_var::{Symbol, Var, v_bool, v_int, v_list, v_obj, v_string};

pub(crate) fn register_all(registry: &mut BuiltinRegistry) {
    register(registry, "properties", 1, Some(1), bf_properties);
    register(registry, "property_info", 2, Some(2), bf_property_info);
    register(registry, "set_property_info", 3, Some(3), bf_set_property_info);
    register(registry, "add_property", 4, Some(4), bf_add_property);
    register(registry, "delete_property", 2, Some(2), bf_delete_property);
    register(registry, "is_clear_property", 2, Some(2), bf_is_clear_property);
    register(registry, "clear_property", 2, Some(2), bf_clear_property);
}

fn prop_name_arg(v: &Var) -> Result<Symbol, ExecFault> {
    match v.as_string() {
        Some(s) => Ok(Symbol::mk(s.as_str())),
        None => Err(E_TYPE.into()),
    }
}

fn bf_properties(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let perms = interp.task_perms();
    let names: Vec<Var> = interp
        .world
        .properties(&perms, obj)?
        .into_iter()
        .map(v_string)
        .collect();
    Ok(v_list(&names))
}

fn bf_property_info(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let name = prop_name_arg(&args[1])?;
    let perms = interp.task_perms();
    let info = interp.world.property_info(&perms, obj, &name)?;
    Ok(v_list(&[
        v_obj(info.owner()),
        v_string(prop_flags_string(info.flags())),
    ]))
}

/// `set_property_info(obj, name, {owner, perms [, new-name]})`.
fn bf_set_property_info(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let name = prop_name_arg(&args[1])?;
    let Some(info) = args[2].as_list() else {
        return Err(E_TYPE.into());
    };
    if info.len() < 2 || info.len() > 3 {
        return Err(E_INVARG.into());
    }
    let owner = obj_arg(&info.index(1)?)?;
    let flags_str = info.index(2)?;
    let Some(flags_str) = flags_str.as_string() else {
        return Err(E_TYPE.into());
    };
    let Some(flags) = PropFlag::parse_str(flags_str.as_str()) else {
        return Err(E_INVARG.into());
    };
    let new_name = if info.len() == 3 {
        Some(prop_name_arg(&info.index(3)?)?)
    } else {
        None
    };
    let perms = interp.task_perms();
    interp
        .world
        .set_property_info(&perms, obj, &name, Some(owner), Some(flags), new_name)?;
    Ok(v_int(0))
}

/// `add_property(obj, name, value, {owner, perms})`.
fn bf_add_property(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let name = prop_name_arg(&args[1])?;
    let value = args[2].clone();
    let Some(info) = args[3].as_list() else {
        return Err(E_TYPE.into());
    };
    if info.len() != 2 {
        return Err(E_INVARG.into());
    }
    let owner = obj_arg(&info.index(1)?)?;
    let flags_str = info.index(2)?;
    let Some(flags_str) = flags_str.as_string() else {
        return Err(E_TYPE.into());
    };
    let Some(flags) = PropFlag::parse_str(flags_str.as_str()) else {
        return Err(E_INVARG.into());
    };
    let perms = interp.task_perms();
    if owner != perms.who && !perms.is_wizard() {
        return Err(loam_var::ErrorCode::E_PERM.into());
    }
    interp
        .world
        .define_property(&perms, obj, &name, owner, flags, value)?;
    Ok(v_int(0))
}

fn bf_delete_property(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let name = prop_name_arg(&args[1])?;
    let perms = interp.task_perms();
    interp.world.delete_property(&perms, obj, &name)?;
    Ok(v_int(0))
}

fn bf_is_clear_property(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let name = prop_name_arg(&args[1])?;
    let perms = interp.task_perms();
    Ok(v_bool(interp.world.is_clear_property(&perms, obj, &name)?))
}

fn bf_clear_property(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let name = prop_name_arg(&args[1])?;
    let perms = interp.task_perms();
    interp.world.clear_property(&perms, obj, &name)?;
    Ok(v_int(0))
}
