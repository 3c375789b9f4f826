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

/// Representation of the structure of objects, properties, and verbs as read from a
/// LambdaMOO textdump'd db file, plus the conversions to and from the live database
/// snapshot form.
use loam_var::{Obj, Var};
use std::collections::BTreeMap;

mod convert;
mod read;
mod write;

pub use convert::{snapshot_to_textdump, textdump_to_snapshot};
pub use read::{TextdumpReader, TextdumpReaderError};
pub use write::TextdumpWriter;

/// Property value type tags used on disk. `TYPE_CLEAR` marks an inherited slot with no
/// local value and never appears inside a live `Var`.
pub const TYPE_CLEAR: i64 = 0;
pub const TYPE_NONE: i64 = 1;
pub const TYPE_STR: i64 = 2;
pub const TYPE_OBJ: i64 = 3;
pub const TYPE_ERR: i64 = 4;
pub const TYPE_LIST: i64 = 5;
pub const TYPE_INT: i64 = 6;
pub const TYPE_FLOAT: i64 = 9;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextdumpVersion {
    /// Format 1: the four-value-type prehistory, no floats.
    Format1,
    /// Format 4: adds the float type. What we write.
    Format4,
}

impl TextdumpVersion {
    pub fn parse(s: &str) -> Option<TextdumpVersion> {
        let v = s
            .strip_prefix("** LambdaMOO Database, Format Version ")?
            .strip_suffix(" **")?;
        match v.parse::<u16>().ok()? {
            1 => Some(TextdumpVersion::Format1),
            4 => Some(TextdumpVersion::Format4),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_version_string(&self) -> String {
        let v = match self {
            TextdumpVersion::Format1 => 1,
            TextdumpVersion::Format4 => 4,
        };
        format!("** LambdaMOO Database, Format Version {v} **")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TdVerbdef {
    /// The raw name string; multiple names are whitespace-separated within it.
    pub names: String,
    pub owner: Obj,
    pub perms: u16,
    pub dobj: i64,
    pub prep: i64,
    pub iobj: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TdPropval {
    pub value: Var,
    pub is_clear: bool,
    pub owner: Obj,
    pub perms: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TdObject {
    pub id: Obj,
    pub name: String,
    pub flags: u16,
    pub owner: Obj,
    pub location: Obj,
    pub contents_head: Obj,
    pub next: Obj,
    pub parent: Obj,
    pub child_head: Obj,
    pub sibling: Obj,
    pub propdefs: Vec<String>,
    pub propvals: Vec<TdPropval>,
    pub verbdefs: Vec<TdVerbdef>,
}

#[derive(Debug, Default)]
pub struct Textdump {
    pub version: Option<TextdumpVersion>,
    pub objects: BTreeMap<Obj, TdObject>,
    pub recycled: Vec<Obj>,
    pub users: Vec<Obj>,
    /// Verb programs keyed by `(object, verb index)`; absent entries mean an empty program.
    pub programs: BTreeMap<(Obj, usize), Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        assert_eq!(
            TextdumpVersion::parse("** LambdaMOO Database, Format Version 4 **"),
            Some(TextdumpVersion::Format4)
        );
        assert_eq!(
            TextdumpVersion::parse("** LambdaMOO Database, Format Version 1 **"),
            Some(TextdumpVersion::Format1)
        );
        assert_eq!(TextdumpVersion::parse("not a version"), None);
        let v = TextdumpVersion::Format4;
        assert_eq!(TextdumpVersion::parse(&v.to_version_string()), Some(v));
    }
}
