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
use chrono::{Local, TimeZone};
use loam_var::ErrorCode::{E_FLOAT, E_INVARG, E_TYPE};
use loam_var::{Var, Variant, v_float, v_int, v_string};
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn register_all(registry: &mut BuiltinRegistry) {
    register(registry, "abs", 1, Some(1), bf_abs);
    register(registry, "min", 1, None, bf_min);
    register(registry, "max", 1, None, bf_max);
    register(registry, "random", 0, Some(1), bf_random);
    register(registry, "floatstr", 2, Some(3), bf_floatstr);
    register(registry, "sqrt", 1, Some(1), bf_sqrt);
    register(registry, "sin", 1, Some(1), |i, a| trig(i, a, f64::sin));
    register(registry, "cos", 1, Some(1), |i, a| trig(i, a, f64::cos));
    register(registry, "tan", 1, Some(1), |i, a| trig(i, a, f64::tan));
    register(registry, "asin", 1, Some(1), |i, a| trig(i, a, f64::asin));
    register(registry, "acos", 1, Some(1), |i, a| trig(i, a, f64::acos));
    register(registry, "atan", 1, Some(2), bf_atan);
    register(registry, "sinh", 1, Some(1), |i, a| trig(i, a, f64::sinh));
    register(registry, "cosh", 1, Some(1), |i, a| trig(i, a, f64::cosh));
    register(registry, "tanh", 1, Some(1), |i, a| trig(i, a, f64::tanh));
    register(registry, "exp", 1, Some(1), |i, a| trig(i, a, f64::exp));
    register(registry, "log", 1, Some(1), |i, a| trig(i, a, f64::ln));
    register(registry, "log10", 1, Some(1), |i, a| trig(i, a, f64::log10));
    register(registry, "ceil", 1, Some(1), |i, a| trig(i, a, f64::ceil));
    register(registry, "floor", 1, Some(1), |i, a| trig(i, a, f64::floor));
    register(registry, "trunc", 1, Some(1), |i, a| trig(i, a, f64::trunc));
    register(registry, "time", 0, Some(0), bf_time);
    register(registry, "ctime", 0, Some(1), bf_ctime);
}

fn to_float(v: &Var) -> Result<f64, ExecFault> {
    match v.variant() {
        Variant::Int(i) => Ok(*i as f64),
        Variant::Float(f) => Ok(*f),
        _ => Err(E_TYPE.into()),
    }
}

fn check(f: f64) -> Result<Var, ExecFault> {
    if f.is_finite() {
        Ok(v_float(f))
    } else {
        Err(E_FLOAT.into())
    }
}

fn bf_abs(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    match args[0].variant() {
        Variant::Int(i) => Ok(v_int(i.wrapping_abs())),
        Variant::Float(f) => Ok(v_float(f.abs())),
        _ => Err(E_TYPE.into()),
    }
}

fn extremum(args: Vec<Var>, want_greater: bool) -> Result<Var, ExecFault> {
    let mut best = args[0].clone();
    for v in &args[1..] {
        let ord = v.cmp_moo(&best)?;
        let better = if want_greater {
            ord == std::cmp::Ordering::Greater
        } else {
            ord == std::cmp::Ordering::Less
        };
        if better {
            best = v.clone();
        }
    }
    match best.variant() {
        Variant::Int(_) | Variant::Float(_) => Ok(best),
        _ => Err(E_TYPE.into()),
    }
}

fn bf_min(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    extremum(args, false)
}

fn bf_max(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    extremum(args, true)
}

/// `random()` is 1..=2^31-1 like the ancestral C; `random(n)` is 1..=n.
fn bf_random(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let max = match args.first() {
        None => i32::MAX as i64,
        Some(v) => match v.as_integer() {
            Some(i) if i >= 1 => i,
            _ => return Err(E_INVARG.into()),
        },
    };
    let n = rand::rng().random_range(1..=max);
    Ok(v_int(n))
}

fn bf_floatstr(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let x = to_float(&args[0])?;
    let Some(precision) = args[1].as_integer() else {
        return Err(E_TYPE.into());
    };
    if precision < 0 {
        return Err(E_INVARG.into());
    }
    let scientific = args.get(2).map(|v| v.is_true()).unwrap_or(false);
    let precision = precision.min(19) as usize;
    let s = if scientific {
        format!("{x:.precision$e}")
    } else {
        format!("{x:.precision$}")
    };
    Ok(v_string(s))
}

fn bf_sqrt(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let x = to_float(&args[0])?;
    if x < 0.0 {
        return Err(E_INVARG.into());
    }
    check(x.sqrt())
}

fn trig(
    _interp: &mut Interpreter<'_>,
    args: Vec<Var>,
    f: fn(f64) -> f64,
) -> Result<Var, ExecFault> {
    check(f(to_float(&args[0])?))
}

fn bf_atan(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let y = to_float(&args[0])?;
    match args.get(1) {
        None => check(y.atan()),
        Some(x) => check(y.atan2(to_float(x)?)),
    }
}

fn bf_time(_interp: &mut Interpreter<'_>, _args: Vec<Var>) -> Result<Var, ExecFault> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(v_int(secs))
}

/// `ctime([time])` in the classic fixed-width C form.
fn bf_ctime(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let secs = match args.first() {
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        Some(v) => v.as_integer().ok_or(ExecFault::from(E_TYPE))?,
    };
    let Some(dt) = Local.timestamp_opt(secs, 0).single() else {
        return Err(E_INVARG.into());
    };
    Ok(v_string(dt.format("%a %b %e %H:%M:%S %Y %Z").to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extremum() {
        assert_eq!(
            extremum(vec![v_int(3), v_int(1), v_int(2)], false).unwrap(),
            v_int(1)
        );
        assert_eq!(
            extremum(vec![v_int(3), v_int(1), v_int(2)], true).unwrap(),
            v_int(3)
        );
        // Mixed numeric types refuse to compare.
        assert!(extremum(vec![v_int(3), v_float(1.0)], false).is_err());
    }
}
