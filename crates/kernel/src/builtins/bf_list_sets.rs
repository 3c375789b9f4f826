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

use crate::builtins::bf_values::case_sensitive_eq;
use crate::builtins::{BuiltinRegistry, register};
use crate::vm::{ExecFault, Interpreter};
use loam_var::ErrorCode::{E_INVARG, E_TYPE};
use loam_var::{List, Var, v_int, v_listv};

pub(crate) fn register_all(registry: &mut BuiltinRegistry) {
    register(registry, "is_member", 2, Some(2), bf_is_member);
    register(registry, "listinsert", 2, Some(3), bf_listinsert);
    register(registry, "listappend", 2, Some(3), bf_listappend);
    register(registry, "listdelete", 2, Some(2), bf_listdelete);
    register(registry, "listset", 3, Some(3), bf_listset);
    register(registry, "setadd", 2, Some(2), bf_setadd);
    register(registry, "setremove", 2, Some(2), bf_setremove);
    register(registry, "sort", 1, Some(2), bf_sort);
    register(registry, "reverse", 1, Some(1), bf_reverse);
}

fn list_arg(v: &Var) -> Result<&List, ExecFault> {
    v.as_list().ok_or_else(|| E_TYPE.into())
}

/// Case-sensitive membership, where the `in` operator folds case; returns the 1-based
/// position.
fn bf_is_member(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let list = list_arg(&args[1])?;
    for (i, v) in list.iter().enumerate() {
        if case_sensitive_eq(v, &args[0]) {
            return Ok(v_int(i as i64 + 1));
        }
    }
    Ok(v_int(0))
}

/// `listinsert(list, value [, index])`: insert before `index`, default the front.
fn bf_listinsert(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let list = list_arg(&args[0])?;
    let index = match args.get(2) {
        None => 1,
        Some(v) => v.as_integer().ok_or(ExecFault::from(E_TYPE))?,
    };
    Ok(Var::from_variant(loam_var::Variant::List(
        list.insert(index, args[1].clone()),
    )))
}

/// `listappend(list, value [, index])`: insert after `index`, default the end.
fn bf_listappend(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let list = list_arg(&args[0])?;
    let index = match args.get(2) {
        None => list.len() as i64,
        Some(v) => v.as_integer().ok_or(ExecFault::from(E_TYPE))?,
    };
    Ok(Var::from_variant(loam_var::Variant::List(
        list.insert(index + 1, args[1].clone()),
    )))
}

fn bf_listdelete(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let list = list_arg(&args[0])?;
    let index = args[1].as_integer().ok_or(ExecFault::from(E_TYPE))?;
    Ok(Var::from_variant(loam_var::Variant::List(
        list.delete(index).map_err(|_| ExecFault::from(E_INVARG))?,
    )))
}

fn bf_listset(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let list = list_arg(&args[0])?;
    let index = args[2].as_integer().ok_or(ExecFault::from(E_TYPE))?;
    Ok(Var::from_variant(loam_var::Variant::List(
        list.index_set(index, args[1].clone())
            .map_err(|_| ExecFault::from(E_INVARG))?,
    )))
}

fn bf_setadd(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let list = list_arg(&args[0])?;
    Ok(Var::from_variant(loam_var::Variant::List(
        list.set_add(args[1].clone()),
    )))
}

fn bf_setremove(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let list = list_arg(&args[0])?;
    Ok(Var::from_variant(loam_var::Variant::List(
        list.set_remove(&args[1]),
    )))
}

/// `sort(list [, keys])`: stable sort; with `keys`, sorts `list` by the parallel key
/// list. Unordered (mixed-type) contents raise `E_TYPE`.
fn bf_sort(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let list = list_arg(&args[0])?;
    let keys = match args.get(1) {
        None => list.clone(),
        Some(k) => {
            let k = list_arg(k)?;
            if k.len() != list.len() {
                return Err(E_INVARG.into());
            }
            k.clone()
        }
    };
    let mut paired: Vec<(Var, Var)> = keys
        .iter()
        .cloned()
        .zip(list.iter().cloned())
        .collect();
    // Validate comparability first; sort_by cannot carry the error out.
    for w in paired.windows(2) {
        w[0].0.cmp_moo(&w[1].0)?;
    }
    paired.sort_by(|a, b| a.0.cmp_moo(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    Ok(v_listv(paired.into_iter().map(|(_, v)| v).collect()))
}

fn bf_reverse(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let list = list_arg(&args[0])?;
    let mut v: Vec<Var> = list.iter().cloned().collect();
    v.reverse();
    Ok(v_listv(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::noop_interp;
    use loam_var::{v_list, v_str};

    #[test]
    fn test_insert_append() {
        let harness = noop_interp();
        let mut interp = harness.interp();
        let l = v_list(&[v_int(2), v_int(3)]);
        assert_eq!(
            bf_listinsert(&mut interp, vec![l.clone(), v_int(1)]).unwrap(),
            v_list(&[v_int(1), v_int(2), v_int(3)])
        );
        assert_eq!(
            bf_listappend(&mut interp, vec![l, v_int(4)]).unwrap(),
            v_list(&[v_int(2), v_int(3), v_int(4)])
        );
    }

    #[test]
    fn test_sort_with_keys() {
        let harness = noop_interp();
        let mut interp = harness.interp();
        let names = v_list(&[v_str("ball"), v_str("axe"), v_str("cat")]);
        let weights = v_list(&[v_int(2), v_int(3), v_int(1)]);
        assert_eq!(
            bf_sort(&mut interp, vec![names, weights]).unwrap(),
            v_list(&[v_str("cat"), v_str("ball"), v_str("axe")])
        );
    }

    #[test]
    fn test_sort_mixed_types_rejected() {
        let harness = noop_interp();
        let mut interp = harness.interp();
        let l = v_list(&[v_int(1), v_str("two")]);
        assert!(bf_sort(&mut interp, vec![l]).is_err());
    }
}
