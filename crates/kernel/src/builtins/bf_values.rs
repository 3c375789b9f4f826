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
use loam_var::ErrorCode::E_TYPE;
use loam_var::{Var, Variant, v_int, v_string};
use md5::{Digest, Md5};

pub(crate) fn register_all(registry: &mut BuiltinRegistry) {
    register(registry, "typeof", 1, Some(1), bf_typeof);
    register(registry, "tostr", 0, None, bf_tostr);
    register(registry, "toliteral", 1, Some(1), bf_toliteral);
    register(registry, "toint", 1, Some(1), bf_toint);
    register(registry, "tonum", 1, Some(1), bf_toint);
    register(registry, "tofloat", 1, Some(1), bf_tofloat);
    register(registry, "toobj", 1, Some(1), bf_toobj);
    register(registry, "equal", 2, Some(2), bf_equal);
    register(registry, "length", 1, Some(1), bf_length);
    register(registry, "value_bytes", 1, Some(1), bf_value_bytes);
    register(registry, "value_hash", 1, Some(1), bf_value_hash);
}

fn bf_typeof(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(v_int(args[0].type_of() as i64))
}

fn bf_tostr(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let mut s = String::new();
    for arg in &args {
        s.push_str(&arg.to_display_string());
    }
    Ok(v_string(s))
}

fn bf_toliteral(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(v_string(args[0].to_literal()))
}

fn bf_toint(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(args[0].coerce_int()?)
}

fn bf_tofloat(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(args[0].coerce_float()?)
}

fn bf_toobj(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(args[0].coerce_obj()?)
}

/// Deep equality with case-sensitive strings, where `==` folds case.
pub(crate) fn case_sensitive_eq(l: &Var, r: &Var) -> bool {
    match (l.variant(), r.variant()) {
        (Variant::Str(a), Variant::Str(b)) => a.as_str() == b.as_str(),
        (Variant::List(a), Variant::List(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| case_sensitive_eq(x, y))
        }
        _ => l == r,
    }
}

fn bf_equal(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(v_int(case_sensitive_eq(&args[0], &args[1]) as i64))
}

fn bf_length(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(v_int(args[0].len().map_err(|_| ExecFault::from(E_TYPE))?))
}

fn bf_value_bytes(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    // An approximation: the literal form's size plus the boxing overhead.
    Ok(v_int(args[0].to_literal().len() as i64 + 8))
}

/// LambdaMOO renders its MD5 hashes as uppercase hex.
pub(crate) fn md5_hex(input: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(input);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect()
}

fn bf_value_hash(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    Ok(v_string(md5_hex(args[0].to_literal().as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_var::{v_list, v_str};

    #[test]
    fn test_case_sensitive_eq() {
        assert!(case_sensitive_eq(&v_str("foo"), &v_str("foo")));
        assert!(!case_sensitive_eq(&v_str("Foo"), &v_str("foo")));
        assert!(!case_sensitive_eq(
            &v_list(&[v_str("Foo")]),
            &v_list(&[v_str("foo")])
        ));
        assert!(case_sensitive_eq(&v_int(1), &v_int(1)));
    }
}
