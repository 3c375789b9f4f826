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

use bincode::{Decode, Encode};
use loam_common::model::{ObjFlag, PropFlag, VerbArgsSpec, VerbFlag};
use loam_common::util::BitEnum;
use loam_compiler::Program;
use loam_var::{Obj, Symbol, Var};
use std::collections::BTreeMap;

/// One property slot. An object carries a slot for every property its ancestry defines;
/// the first `propdefs.len()` slots are its own definitions, the rest follow the ancestor
/// chain in parent order. A `clear` slot defers its value to the nearest ancestor.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct PropVal {
    pub value: Var,
    pub owner: Obj,
    pub flags: BitEnum<PropFlag>,
    pub is_clear: bool,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct VerbDef {
    /// One or more names; each may carry a `*` wildcard.
    pub names: Vec<Symbol>,
    pub owner: Obj,
    pub flags: BitEnum<VerbFlag>,
    pub argspec: VerbArgsSpec,
    pub program: Program,
}

impl VerbDef {
    /// The space-joined form used by `verbs()` and the textdump.
    #[must_use]
    pub fn names_string(&self) -> String {
        self.names
            .iter()
            .map(|s| s.as_str().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[must_use]
    pub fn matches_name(&self, candidate: &str) -> bool {
        self.names
            .iter()
            .any(|n| loam_common::model::verbname_matches(n.as_str(), candidate))
    }
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct Object {
    pub id: Obj,
    pub name: String,
    pub owner: Obj,
    pub parent: Obj,
    pub location: Obj,
    pub contents: Vec<Obj>,
    pub children: Vec<Obj>,
    pub flags: BitEnum<ObjFlag>,
    pub propdefs: Vec<Symbol>,
    pub propvals: Vec<PropVal>,
    pub verbdefs: Vec<VerbDef>,
}

impl Object {
    #[must_use]
    pub fn new(id: Obj, parent: Obj, owner: Obj) -> Self {
        Self {
            id,
            name: String::new(),
            owner,
            parent,
            location: loam_var::NOTHING,
            contents: vec![],
            children: vec![],
            flags: BitEnum::new(),
            propdefs: vec![],
            propvals: vec![],
            verbdefs: vec![],
        }
    }
}

/// A structural copy of the whole database, taken under the store lock. This is what the
/// checkpoint engine serializes, what the textdump converts to and from, and what
/// `load_snapshot` restores.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct WorldStateSnapshot {
    pub objects: BTreeMap<Obj, Object>,
    pub max_object: i64,
}

impl WorldStateSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
