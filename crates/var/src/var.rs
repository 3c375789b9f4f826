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

use crate::ErrorCode::{E_DIV, E_FLOAT, E_INVARG, E_RANGE, E_TYPE};
use crate::error::Error;
use crate::list::List;
use crate::obj::Obj;
use crate::string::Str;
use crate::variant::Variant;
use crate::{VarType, v_float, v_int};
use bincode::{Decode, Encode};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

#[derive(Clone, Encode, Decode, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(Variant);

impl Debug for Var {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.variant())
    }
}

impl Var {
    pub fn from_variant(variant: Variant) -> Self {
        Var(variant)
    }

    #[must_use]
    pub fn variant(&self) -> &Variant {
        &self.0
    }

    #[must_use]
    pub fn type_of(&self) -> VarType {
        match self.variant() {
            Variant::None => VarType::TYPE_NONE,
            Variant::Int(_) => VarType::TYPE_INT,
            Variant::Float(_) => VarType::TYPE_FLOAT,
            Variant::Obj(_) => VarType::TYPE_OBJ,
            Variant::Str(_) => VarType::TYPE_STR,
            Variant::Err(_) => VarType::TYPE_ERR,
            Variant::List(_) => VarType::TYPE_LIST,
        }
    }

    /// MOO truth: `0`, `0.0`, `""`, `{}` and every error are false; everything else is
    /// true, including all object references.
    #[must_use]
    pub fn is_true(&self) -> bool {
        match self.variant() {
            Variant::None => false,
            Variant::Int(i) => *i != 0,
            Variant::Float(f) => *f != 0.0,
            Variant::Obj(_) => true,
            Variant::Str(s) => !s.is_empty(),
            Variant::Err(_) => false,
            Variant::List(l) => !l.is_empty(),
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self.variant() {
            Variant::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self.variant() {
            Variant::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<Obj> {
        match self.variant() {
            Variant::Obj(o) => Some(*o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_string(&self) -> Option<&Str> {
        match self.variant() {
            Variant::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&List> {
        match self.variant() {
            Variant::List(l) => Some(l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_error(&self) -> Option<&Error> {
        match self.variant() {
            Variant::Err(e) => Some(e),
            _ => None,
        }
    }

    /// Ordered comparison. Mixed types are an `E_TYPE`, never coerced.
    pub fn cmp_moo(&self, other: &Var) -> Result<Ordering, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(l.cmp(r)),
            (Variant::Float(l), Variant::Float(r)) => Ok(l.total_cmp(r)),
            (Variant::Str(l), Variant::Str(r)) => Ok(l.cmp(r)),
            (Variant::Obj(l), Variant::Obj(r)) => Ok(l.cmp(r)),
            (Variant::Err(l), Variant::Err(r)) => Ok(l.cmp(r)),
            _ => Err(E_TYPE.into()),
        }
    }

    /// Sequence length, for strings and lists.
    pub fn len(&self) -> Result<i64, Error> {
        match self.variant() {
            Variant::Str(s) => Ok(s.len() as i64),
            Variant::List(l) => Ok(l.len() as i64),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn index(&self, idx: &Var) -> Result<Var, Error> {
        let Some(i) = idx.as_integer() else {
            return Err(E_TYPE.into());
        };
        match self.variant() {
            Variant::Str(s) => Ok(Var::from_variant(Variant::Str(s.index(i)?))),
            Variant::List(l) => l.index(i),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn range(&self, from: &Var, to: &Var) -> Result<Var, Error> {
        let (Some(from), Some(to)) = (from.as_integer(), to.as_integer()) else {
            return Err(E_TYPE.into());
        };
        match self.variant() {
            Variant::Str(s) => Ok(Var::from_variant(Variant::Str(s.range(from, to)?))),
            Variant::List(l) => Ok(Var::from_variant(Variant::List(l.range(from, to)?))),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn index_set(&self, idx: &Var, value: &Var) -> Result<Var, Error> {
        let Some(i) = idx.as_integer() else {
            return Err(E_TYPE.into());
        };
        match (self.variant(), value.variant()) {
            (Variant::Str(s), Variant::Str(v)) => {
                if v.len() != 1 {
                    return Err(E_RANGE.into());
                }
                Ok(Var::from_variant(Variant::Str(s.index_set(i, v)?)))
            }
            (Variant::Str(_), _) => Err(E_TYPE.into()),
            (Variant::List(l), _) => Ok(Var::from_variant(Variant::List(
                l.index_set(i, value.clone())?,
            ))),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn range_set(&self, from: &Var, to: &Var, value: &Var) -> Result<Var, Error> {
        let (Some(from), Some(to)) = (from.as_integer(), to.as_integer()) else {
            return Err(E_TYPE.into());
        };
        match (self.variant(), value.variant()) {
            (Variant::Str(s), Variant::Str(v)) => {
                Ok(Var::from_variant(Variant::Str(s.range_set(from, to, v)?)))
            }
            (Variant::List(l), Variant::List(v)) => Ok(Var::from_variant(Variant::List(
                l.range_set(from, to, v)?,
            ))),
            _ => Err(E_TYPE.into()),
        }
    }

    /// The `in` operator: 1-based position of self in the list, 0 when absent.
    pub fn index_in(&self, list: &Var) -> Result<Var, Error> {
        match list.variant() {
            Variant::List(l) => Ok(v_int(l.index_in(self))),
            _ => Err(E_TYPE.into()),
        }
    }

    /// `+` adds numbers, concatenates strings and lists.
    pub fn add(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l.wrapping_add(*r))),
            (Variant::Float(l), Variant::Float(r)) => check_float(l + r),
            (Variant::Str(l), Variant::Str(r)) => {
                Ok(Var::from_variant(Variant::Str(l.append(r))))
            }
            (Variant::List(l), Variant::List(r)) => {
                Ok(Var::from_variant(Variant::List(l.append(r))))
            }
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn sub(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l.wrapping_sub(*r))),
            (Variant::Float(l), Variant::Float(r)) => check_float(l - r),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn mul(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l.wrapping_mul(*r))),
            (Variant::Float(l), Variant::Float(r)) => check_float(l * r),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn div(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(_), Variant::Int(0)) => Err(E_DIV.into()),
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l.wrapping_div(*r))),
            (Variant::Float(_), Variant::Float(r)) if *r == 0.0 => Err(E_DIV.into()),
            (Variant::Float(l), Variant::Float(r)) => check_float(l / r),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn modulus(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(_), Variant::Int(0)) => Err(E_DIV.into()),
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l.wrapping_rem(*r))),
            (Variant::Float(_), Variant::Float(r)) if *r == 0.0 => Err(E_DIV.into()),
            (Variant::Float(l), Variant::Float(r)) => check_float(l % r),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn pow(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => {
                if *r < 0 {
                    // Integer exponentiation only closes over non-negative exponents,
                    // except for the bases whose reciprocal is integral.
                    return match *l {
                        1 => Ok(v_int(1)),
                        -1 => Ok(v_int(if r % 2 == 0 { 1 } else { -1 })),
                        0 => Err(E_DIV.into()),
                        _ => Ok(v_int(0)),
                    };
                }
                let Ok(exp) = u32::try_from(*r) else {
                    return Err(E_INVARG.into());
                };
                Ok(v_int(l.wrapping_pow(exp)))
            }
            (Variant::Float(l), Variant::Float(r)) => check_float(l.powf(*r)),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn neg(&self) -> Result<Var, Error> {
        match self.variant() {
            Variant::Int(i) => Ok(v_int(i.wrapping_neg())),
            Variant::Float(f) => Ok(v_float(-f)),
            _ => Err(E_TYPE.into()),
        }
    }

    /// `tostr()` rendition: the unquoted form used by `notify` and string coercion.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self.variant() {
            Variant::None => "None".to_string(),
            Variant::Int(i) => i.to_string(),
            Variant::Float(f) => format_float(*f),
            Variant::Obj(o) => o.to_literal(),
            Variant::Str(s) => s.as_str().to_string(),
            Variant::Err(e) => e.message(),
            Variant::List(_) => "{list}".to_string(),
        }
    }

    /// `toliteral()` rendition: parses back to the same value.
    #[must_use]
    pub fn to_literal(&self) -> String {
        match self.variant() {
            Variant::None => "None".to_string(),
            Variant::Int(i) => i.to_string(),
            Variant::Float(f) => format_float(*f),
            Variant::Obj(o) => o.to_literal(),
            Variant::Str(s) => {
                let escaped = s.as_str().replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{escaped}\"")
            }
            Variant::Err(e) => e.name().to_string(),
            Variant::List(l) => {
                let elems: Vec<String> = l.iter().map(|v| v.to_literal()).collect();
                format!("{{{}}}", elems.join(", "))
            }
        }
    }

    pub fn coerce_int(&self) -> Result<Var, Error> {
        match self.variant() {
            Variant::Int(_) => Ok(self.clone()),
            Variant::Float(f) => Ok(v_int(*f as i64)),
            Variant::Obj(o) => Ok(v_int(o.id())),
            Variant::Err(e) => Ok(v_int(e.to_int() as i64)),
            Variant::Str(s) => Ok(v_int(parse_numeric_prefix(s.as_str()))),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn coerce_float(&self) -> Result<Var, Error> {
        match self.variant() {
            Variant::Float(_) => Ok(self.clone()),
            Variant::Int(i) => Ok(v_float(*i as f64)),
            Variant::Str(s) => Ok(v_float(
                s.as_str().trim().parse::<f64>().unwrap_or(0.0),
            )),
            Variant::Err(e) => Ok(v_float(e.to_int() as f64)),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn coerce_obj(&self) -> Result<Var, Error> {
        match self.variant() {
            Variant::Obj(_) => Ok(self.clone()),
            Variant::Int(i) => Ok(Var::from_variant(Variant::Obj(Obj::mk_id(*i)))),
            Variant::Str(s) => {
                let t = s.as_str().trim();
                if let Some(o) = Obj::parse_literal(t) {
                    return Ok(Var::from_variant(Variant::Obj(o)));
                }
                Ok(Var::from_variant(Variant::Obj(Obj::mk_id(
                    parse_numeric_prefix(t),
                ))))
            }
            _ => Err(E_TYPE.into()),
        }
    }
}

fn check_float(f: f64) -> Result<Var, Error> {
    if f.is_finite() {
        Ok(v_float(f))
    } else {
        Err(E_FLOAT.into())
    }
}

/// `toint("42abc")` is 42, `toint("zork")` is 0; C `atoi` rules.
fn parse_numeric_prefix(s: &str) -> i64 {
    let s = s.trim_start();
    let mut end = 0;
    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')) {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    s[..end].parse().unwrap_or(0)
}

/// Floats always print with a decimal point or exponent so they re-read as floats.
fn format_float(f: f64) -> String {
    let s = format!("{f}");
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{s}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode::E_PERM;
    use crate::{NOTHING, v_empty_list, v_empty_str, v_err, v_list, v_obj, v_str};

    #[test]
    fn test_truthiness() {
        assert!(!v_int(0).is_true());
        assert!(!v_float(0.0).is_true());
        assert!(!v_empty_str().is_true());
        assert!(!v_empty_list().is_true());
        assert!(!v_err(E_PERM).is_true());
        assert!(v_int(-3).is_true());
        assert!(v_str("x").is_true());
        // Every object reference is true, even "nothing".
        assert!(v_obj(NOTHING).is_true());
    }

    #[test]
    fn test_cross_type_equality_is_false() {
        assert_ne!(v_int(1), v_float(1.0));
        assert_ne!(v_int(0), v_empty_str());
        assert_eq!(v_str("Foo"), v_str("foo"));
    }

    #[test]
    fn test_cross_type_comparison_is_e_type() {
        assert_eq!(v_int(1).cmp_moo(&v_float(2.0)).unwrap_err(), E_TYPE);
        assert_eq!(v_int(1).cmp_moo(&v_int(2)).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_division() {
        assert_eq!(v_int(7).div(&v_int(2)).unwrap(), v_int(3));
        assert_eq!(v_int(7).div(&v_int(0)).unwrap_err(), E_DIV);
        assert_eq!(v_int(7).modulus(&v_int(0)).unwrap_err(), E_DIV);
    }

    #[test]
    fn test_float_overflow() {
        let big = v_float(f64::MAX);
        assert_eq!(big.mul(&v_float(2.0)).unwrap_err(), E_FLOAT);
    }

    #[test]
    fn test_concat() {
        assert_eq!(v_str("foo").add(&v_str("bar")).unwrap(), v_str("foobar"));
        assert_eq!(
            v_list(&[v_int(1)]).add(&v_list(&[v_int(2)])).unwrap(),
            v_list(&[v_int(1), v_int(2)])
        );
        assert_eq!(v_str("foo").add(&v_int(1)).unwrap_err(), E_TYPE);
    }

    #[test]
    fn test_pow() {
        assert_eq!(v_int(2).pow(&v_int(10)).unwrap(), v_int(1024));
        assert_eq!(v_int(2).pow(&v_int(-1)).unwrap(), v_int(0));
        assert_eq!(v_int(-1).pow(&v_int(-3)).unwrap(), v_int(-1));
        assert_eq!(v_int(0).pow(&v_int(-1)).unwrap_err(), E_DIV);
    }

    #[test]
    fn test_literal_rendering() {
        let l = v_list(&[v_int(1), v_str("a \"b\""), v_obj(Obj::mk_id(2))]);
        assert_eq!(l.to_literal(), "{1, \"a \\\"b\\\"\", #2}");
        assert_eq!(v_float(3.0).to_literal(), "3.0");
    }

    #[test]
    fn test_coercions() {
        assert_eq!(v_str(" 42 and change").coerce_int().unwrap(), v_int(42));
        assert_eq!(v_str("zork").coerce_int().unwrap(), v_int(0));
        assert_eq!(v_err(E_PERM).coerce_int().unwrap(), v_int(3));
        assert_eq!(
            v_str("#7").coerce_obj().unwrap(),
            v_obj(Obj::mk_id(7))
        );
    }
}
