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

mod bf_list_sets;
mod bf_num;
mod bf_objects;
mod bf_properties;
mod bf_server;
mod bf_strings;
mod bf_values;
mod bf_verbs;

use crate::vm::{ExecFault, Interpreter};
use lazy_static::lazy_static;
use loam_var::ErrorCode::{E_ARGS, E_VARNF};
use loam_var::{Symbol, Var};
use std::collections::HashMap;

/// A built-in's implementation: plain function over the interpreter state and the
/// already-evaluated arguments. Raising is returning `Err`; suspension blocks in place.
pub type BfFn = fn(&mut Interpreter<'_>, Vec<Var>) -> Result<Var, ExecFault>;

pub struct BuiltinDesc {
    pub name: &'static str,
    pub min_args: usize,
    /// None means variadic.
    pub max_args: Option<usize>,
    pub f: BfFn,
}

pub type BuiltinRegistry = HashMap<&'static str, BuiltinDesc>;

pub(crate) fn register(
    registry: &mut BuiltinRegistry,
    name: &'static str,
    min_args: usize,
    max_args: Option<usize>,
    f: BfFn,
) {
    let previous = registry.insert(
        name,
        BuiltinDesc {
            name,
            min_args,
            max_args,
            f,
        },
    );
    debug_assert!(previous.is_none(), "duplicate builtin: {name}");
}

lazy_static! {
    /// The one dispatch table: ~140 entries, each an enumerated name with arity bounds.
    static ref BUILTINS: BuiltinRegistry = {
        let mut registry = BuiltinRegistry::new();
        bf_values::register_all(&mut registry);
        bf_num::register_all(&mut registry);
        bf_strings::register_all(&mut registry);
        bf_list_sets::register_all(&mut registry);
        bf_objects::register_all(&mut registry);
        bf_properties::register_all(&mut registry);
        bf_verbs::register_all(&mut registry);
        bf_server::register_all(&mut registry);
        registry
    };
}

/// Call a built-in by name. Unknown names are `E_VARNF`, arity violations `E_ARGS`; both
/// before the implementation sees anything.
pub fn dispatch(
    interp: &mut Interpreter<'_>,
    name: &Symbol,
    args: Vec<Var>,
) -> Result<Var, ExecFault> {
    let lowered = name.to_lowercase();
    let Some(desc) = BUILTINS.get(lowered.as_str()) else {
        return Err(E_VARNF
            .msg(format!("Unknown built-in function: {name}"))
            .into());
    };
    if args.len() < desc.min_args {
        return Err(E_ARGS.into());
    }
    if let Some(max) = desc.max_args {
        if args.len() > max {
            return Err(E_ARGS.into());
        }
    }
    (desc.f)(interp, args)
}

#[must_use]
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains_key(name.to_ascii_lowercase().as_str())
}

#[must_use]
pub fn builtin_count() -> usize {
    BUILTINS.len()
}
