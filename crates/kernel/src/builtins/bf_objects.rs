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

use crate::builtins::{BuiltinRegistry, register};
use crate::vm::{ExecFault, Interpreter};
use loam_var::ErrorCode::{E_INVARG, E_NACC, E_PERM, E_TYPE};
use loam_var::{Error, ErrorCode, Obj, Var, v_bool, v_int, v_list, v_obj};

pub(crate) fn register_all(registry: &mut BuiltinRegistry) {
    register(registry, "create", 1, Some(2), bf_create);
    register(registry, "recycle", 1, Some(1), bf_recycle);
    register(registry, "valid", 1, Some(1), bf_valid);
    register(registry, "parent", 1, Some(1), bf_parent);
    register(registry, "children", 1, Some(1), bf_children);
    register(registry, "chparent", 2, Some(2), bf_chparent);
    register(registry, "chown", 2, Some(2), bf_chown);
    register(registry, "max_object", 0, Some(0), bf_max_object);
    register(registry, "move", 2, Some(2), bf_move);
    register(registry, "players", 0, Some(0), bf_players);
    register(registry, "is_player", 1, Some(1), bf_is_player);
    register(registry, "set_player_flag", 2, Some(2), bf_set_player_flag);
}

pub(crate) fn obj_arg(v: &Var) -> Result<Obj, ExecFault> {
    v.as_object().ok_or_else(|| E_TYPE.into())
}

/// Call an object's lifecycle hook (`initialize`, `recycle`, `exitfunc`...), swallowing
/// "no such verb" but letting real faults through.
fn call_hook(
    interp: &mut Interpreter<'_>,
    this: Obj,
    verb: &str,
    args: Vec<Var>,
) -> Result<Option<Var>, ExecFault> {
    let caller = interp.frame().this;
    match interp.call_verb(this, verb, args, caller) {
        Ok(v) => Ok(Some(v)),
        Err(ExecFault::Err(e)) if e == ErrorCode::E_VERBNF => Ok(None),
        Err(e) => Err(e),
    }
}

fn bf_create(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let parent = obj_arg(&args[0])?;
    let perms = interp.task_perms();
    let owner = match args.get(1) {
        None => perms.who,
        Some(v) => {
            let owner = obj_arg(v)?;
            if owner != perms.who && !owner.is_nothing() && !perms.is_wizard() {
                return Err(E_PERM.into());
            }
            owner
        }
    };
    let new = interp.world.create_object(&perms, parent, owner)?;
    call_hook(interp, new, "initialize", vec![])?;
    Ok(v_obj(new))
}

fn bf_recycle(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let victim = obj_arg(&args[0])?;
    if !interp.world.valid(victim) {
        return Err(E_INVARG.into());
    }
    let perms = interp.task_perms();
    perms
        .check_obj_owner_perms(interp.world.owner_of(victim)?)
        .map_err(Error::from)?;
    call_hook(interp, victim, "recycle", vec![])?;
    // The hook may have done anything, including recycling it already.
    if interp.world.valid(victim) {
        let perms = interp.task_perms();
        interp.world.recycle_object(&perms, victim)?;
    }
    Ok(v_int(0))
}

fn bf_valid(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    Ok(v_bool(interp.world.valid(obj)))
}

fn bf_parent(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    Ok(v_obj(interp.world.parent_of(obj)?))
}

fn bf_children(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let children: Vec<Var> = interp
        .world
        .children_of(obj)?
        .into_iter()
        .map(v_obj)
        .collect();
    Ok(v_list(&children))
}

fn bf_chparent(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let new_parent = obj_arg(&args[1])?;
    let perms = interp.task_perms();
    interp.world.chparent(&perms, obj, new_parent)?;
    Ok(v_int(0))
}

fn bf_chown(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let new_owner = obj_arg(&args[1])?;
    let perms = interp.task_perms();
    interp.world.chown(&perms, obj, new_owner)?;
    Ok(v_int(0))
}

fn bf_max_object(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(v_obj(interp.world.max_object()))
}

/// `move(what, where)`: the `accept` protocol, the mechanical move, then the
/// `exitfunc`/`enterfunc` notifications.
fn bf_move(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let what = obj_arg(&args[0])?;
    let to = obj_arg(&args[1])?;
    if !interp.world.valid(what) {
        return Err(E_INVARG.into());
    }
    if !to.is_nothing() && !interp.world.valid(to) {
        return Err(E_INVARG.into());
    }
    let old_location = interp.world.location_of(what)?;
    if !to.is_nothing() && !interp.task_perms().is_wizard() {
        match call_hook(interp, to, "accept", vec![v_obj(what)])? {
            Some(v) if v.is_true() => {}
            _ => return Err(E_NACC.into()),
        }
    }
    let perms = interp.task_perms();
    interp.world.move_object(&perms, what, to)?;
    if old_location.is_positive() && interp.world.valid(old_location) {
        call_hook(interp, old_location, "exitfunc", vec![v_obj(what)])?;
    }
    if to.is_positive() && interp.world.valid(to) {
        call_hook(interp, to, "enterfunc", vec![v_obj(what)])?;
    }
    Ok(v_int(0))
}

fn bf_players(interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    let players: Vec<Var> = interp.world.players().into_iter().map(v_obj).collect();
    Ok(v_list(&players))
}

fn bf_is_player(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    if !interp.world.valid(obj) {
        return Err(E_INVARG.into());
    }
    Ok(v_bool(interp.world.is_player(obj)))
}

fn bf_set_player_flag(interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let obj = obj_arg(&args[0])?;
    let perms = interp.task_perms();
    interp
        .world
        .set_player_flag(&perms, obj, args[1].is_true())?;
    Ok(v_int(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::world_with_wizard;

    #[test]
    fn test_create_and_move_and_recycle() {
        let harness = world_with_wizard();
        let mut interp = harness.interp();
        let room = bf_create(&mut interp, vec![v_obj(harness.root)]).unwrap();
        let room = room.as_object().unwrap();
        let thing = bf_create(&mut interp, vec![v_obj(harness.root)]).unwrap();
        let thing = thing.as_object().unwrap();
        // Wizard moves bypass `accept`.
        bf_move(&mut interp, vec![v_obj(thing), v_obj(room)]).unwrap();
        assert_eq!(interp.world.location_of(thing).unwrap(), room);
        bf_recycle(&mut interp, vec![v_obj(thing)]).unwrap();
        assert!(!interp.world.valid(thing));
    }

    #[test]
    fn test_move_to_invalid_target() {
        let harness = world_with_wizard();
        let mut interp = harness.interp();
        let r = bf_move(
            &mut interp,
            vec![v_obj(harness.root), v_obj(Obj::mk_id(999))],
        );
        assert!(matches!(r, Err(ExecFault::Err(e)) if e == E_INVARG));
    }
}
