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

mod error;
mod list;
mod obj;
mod string;
mod symbol;
mod var;
mod variant;

pub use crate::error::{Error, ErrorCode};
pub use crate::list::List;
pub use crate::obj::Obj;
pub use crate::string::Str;
pub use crate::symbol::Symbol;
pub use crate::var::Var;
pub use crate::variant::Variant;

use bincode::{Decode, Encode};
use strum::FromRepr;

/// The server's "system object", where the world's entry points (`do_login_command` and friends)
/// and the `$name` sugar properties live.
pub const SYSTEM_OBJECT: Obj = Obj::mk_id(0);

/// The "nothing" sentinel. Note that as a value it is still truthy; MOO treats every object
/// reference as true.
pub const NOTHING: Obj = Obj::mk_id(-1);

/// Object-match result for "more than one thing by that name".
pub const AMBIGUOUS: Obj = Obj::mk_id(-2);

/// Object-match result for "no such thing here".
pub const FAILED_MATCH: Obj = Obj::mk_id(-3);

/// Not-yet-logged-in connections are identified by descending ids starting here.
pub const FIRST_CONNECTION_ID: Obj = Obj::mk_id(-4);

/// Type discriminants, as they appear in textdumps and as returned by `typeof()`.
/// `TYPE_CLEAR` never escapes into a live `Var`; it marks inherited property slots on disk.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, FromRepr, Encode, Decode)]
#[allow(non_camel_case_types)]
pub enum VarType {
    TYPE_CLEAR = 0,
    TYPE_NONE = 1,
    TYPE_STR = 2,
    TYPE_OBJ = 3,
    TYPE_ERR = 4,
    TYPE_LIST = 5,
    TYPE_INT = 6,
    TYPE_FLOAT = 9,
}

#[must_use]
pub fn v_int(i: i64) -> Var {
    Var::from_variant(Variant::Int(i))
}

#[must_use]
pub fn v_float(f: f64) -> Var {
    Var::from_variant(Variant::Float(f))
}

#[must_use]
pub fn v_bool(b: bool) -> Var {
    v_int(if b { 1 } else { 0 })
}

#[must_use]
pub fn v_none() -> Var {
    Var::from_variant(Variant::None)
}

#[must_use]
pub fn v_str(s: &str) -> Var {
    Var::from_variant(Variant::Str(Str::mk_str(s)))
}

#[must_use]
pub fn v_string(s: String) -> Var {
    Var::from_variant(Variant::Str(Str::mk_string(s)))
}

#[must_use]
pub fn v_empty_str() -> Var {
    v_str("")
}

#[must_use]
pub fn v_obj(o: Obj) -> Var {
    Var::from_variant(Variant::Obj(o))
}

#[must_use]
pub fn v_objid(id: i64) -> Var {
    v_obj(Obj::mk_id(id))
}

#[must_use]
pub fn v_err(e: ErrorCode) -> Var {
    Var::from_variant(Variant::Err(Error::from(e)))
}

#[must_use]
pub fn v_error(e: Error) -> Var {
    Var::from_variant(Variant::Err(e))
}

#[must_use]
pub fn v_list(l: &[Var]) -> Var {
    Var::from_variant(Variant::List(List::from_slice(l)))
}

#[must_use]
pub fn v_listv(l: Vec<Var>) -> Var {
    Var::from_variant(Variant::List(List::from_vec(l)))
}

#[must_use]
pub fn v_empty_list() -> Var {
    v_list(&[])
}

#[must_use]
pub fn v_sym(s: Symbol) -> Var {
    v_str(s.as_str())
}
