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

use crate::util::BitEnum;
use bincode::{Decode, Encode};
use enum_primitive_derive::Primitive;

/// Object flags, at the bit positions LambdaMOO textdumps use. The two obsolete slots are
/// kept so the flag integer round-trips.
#[derive(Debug, Ord, PartialOrd, Copy, Clone, Eq, PartialEq, Hash, Primitive, Encode, Decode)]
pub enum ObjFlag {
    User = 0,
    Programmer = 1,
    Wizard = 2,
    Obsolete1 = 3,
    Read = 4,
    Write = 5,
    Obsolete2 = 6,
    Fertile = 7,
}

pub fn obj_flags_string(flags: BitEnum<ObjFlag>) -> String {
    let mut s = String::new();
    if flags.contains(ObjFlag::User) {
        s.push('u');
    }
    if flags.contains(ObjFlag::Programmer) {
        s.push('p');
    }
    if flags.contains(ObjFlag::Wizard) {
        s.push('w');
    }
    if flags.contains(ObjFlag::Read) {
        s.push('r');
    }
    if flags.contains(ObjFlag::Write) {
        s.push('w');
    }
    if flags.contains(ObjFlag::Fertile) {
        s.push('f');
    }
    s
}
