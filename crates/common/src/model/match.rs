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
use strum::FromRepr;

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, Hash, Ord, PartialOrd, Encode, Decode)]
#[repr(u8)]
pub enum ArgSpec {
    None = 0,
    Any = 1,
    This = 2,
}

impl ArgSpec {
    #[must_use]
    pub fn to_string(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Any => "any",
            Self::This => "this",
        }
    }

    #[must_use]
    pub fn from_string(repr: &str) -> Option<Self> {
        match repr {
            "none" => Some(Self::None),
            "any" => Some(Self::Any),
            "this" => Some(Self::This),
            _ => None,
        }
    }
}

/// The set of prepositions that are valid for verbs, corresponding to the set of string
/// constants defined in LambdaMOO 1.8.1. Each entry covers the spelled-out aliases the
/// command line may use.
#[repr(u16)]
#[derive(Copy, Clone, Debug, FromRepr, Eq, PartialEq, Hash, Encode, Decode, Ord, PartialOrd)]
pub enum Preposition {
    WithUsing = 0,
    AtTo = 1,
    InFrontOf = 2,
    IntoIn = 3,
    OnTopOfOn = 4,
    OutOf = 5,
    Over = 6,
    Through = 7,
    Under = 8,
    Behind = 9,
    Beside = 10,
    ForAbout = 11,
    Is = 12,
    As = 13,
    OffOf = 14,
}

impl Preposition {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "with" | "using" => Some(Self::WithUsing),
            "at" | "to" => Some(Self::AtTo),
            "in front of" => Some(Self::InFrontOf),
            "in" | "inside" | "into" => Some(Self::IntoIn),
            "on top of" | "on" | "onto" | "upon" => Some(Self::OnTopOfOn),
            "out of" | "from inside" | "from" => Some(Self::OutOf),
            "over" => Some(Self::Over),
            "through" => Some(Self::Through),
            "under" | "underneath" | "beneath" => Some(Self::Under),
            "behind" => Some(Self::Behind),
            "beside" => Some(Self::Beside),
            "for" | "about" => Some(Self::ForAbout),
            "is" => Some(Self::Is),
            "as" => Some(Self::As),
            "off" | "off of" => Some(Self::OffOf),
            _ => None,
        }
    }

    pub fn to_string(&self) -> &str {
        match self {
            Self::WithUsing => "with/using",
            Self::AtTo => "at/to",
            Self::InFrontOf => "in front of",
            Self::IntoIn => "in/inside/into",
            Self::OnTopOfOn => "on top of/on/onto/upon",
            Self::OutOf => "out of/from inside/from",
            Self::Over => "over",
            Self::Through => "through",
            Self::Under => "under/underneath/beneath",
            Self::Behind => "behind",
            Self::Beside => "beside",
            Self::ForAbout => "for/about",
            Self::Is => "is",
            Self::As => "as",
            Self::OffOf => "off/off of",
        }
    }

    /// The longest alias of any preposition, in words. The command parser scans spans of
    /// this many words down to one, so `in front of` wins over `in`.
    pub const MAX_PHRASE_WORDS: usize = 3;
}

pub fn find_preposition(prep: &str) -> Option<Preposition> {
    // A numeric form (with or without # prefix) names a preposition table entry directly.
    let numeric_offset = if prep.starts_with('#') { 1 } else { 0 };
    if let Ok(id) = prep[numeric_offset..].parse::<u16>() {
        return Preposition::from_repr(id);
    }
    Preposition::parse(prep)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Encode, Decode, Default)]
pub enum PrepSpec {
    Any,
    #[default]
    None,
    Other(Preposition),
}

impl PrepSpec {
    /// The textdump integer encoding: -2 any, -1 none, else the table index.
    #[must_use]
    pub fn to_repr(self) -> i16 {
        match self {
            Self::Any => -2,
            Self::None => -1,
            Self::Other(p) => p as i16,
        }
    }

    pub fn from_repr(v: i16) -> Option<Self> {
        match v {
            -2 => Some(Self::Any),
            -1 => Some(Self::None),
            p => Preposition::from_repr(u16::try_from(p).ok()?).map(Self::Other),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "any" => Some(Self::Any),
            "none" => Some(Self::None),
            _ => find_preposition(s).map(Self::Other),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Encode, Decode)]
pub struct VerbArgsSpec {
    pub dobj: ArgSpec,
    pub prep: PrepSpec,
    pub iobj: ArgSpec,
}

impl VerbArgsSpec {
    #[must_use]
    pub fn this_none_this() -> Self {
        Self {
            dobj: ArgSpec::This,
            prep: PrepSpec::None,
            iobj: ArgSpec::This,
        }
    }

    #[must_use]
    pub fn none_none_none() -> Self {
        Self {
            dobj: ArgSpec::None,
            prep: PrepSpec::None,
            iobj: ArgSpec::None,
        }
    }

    #[must_use]
    pub fn any_any_any() -> Self {
        Self {
            dobj: ArgSpec::Any,
            prep: PrepSpec::Any,
            iobj: ArgSpec::Any,
        }
    }

    /// Does a declared spec (self) admit a parsed command's spec?
    #[must_use]
    pub fn matches(&self, v: &Self) -> bool {
        (self.dobj == ArgSpec::Any || self.dobj == v.dobj)
            && (self.prep == PrepSpec::Any || self.prep == v.prep)
            && (self.iobj == ArgSpec::Any || self.iobj == v.iobj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiword_parse() {
        assert_eq!(Preposition::parse("in front of"), Some(Preposition::InFrontOf));
        assert_eq!(Preposition::parse("in"), Some(Preposition::IntoIn));
        assert_eq!(Preposition::parse("frankly"), None);
    }

    #[test]
    fn test_prep_spec_repr_roundtrip() {
        for spec in [
            PrepSpec::Any,
            PrepSpec::None,
            PrepSpec::Other(Preposition::InFrontOf),
            PrepSpec::Other(Preposition::OffOf),
        ] {
            assert_eq!(PrepSpec::from_repr(spec.to_repr()), Some(spec));
        }
        assert_eq!(PrepSpec::from_repr(15), None);
    }

    #[test]
    fn test_argspec_matching() {
        let declared = VerbArgsSpec {
            dobj: ArgSpec::This,
            prep: PrepSpec::Other(Preposition::IntoIn),
            iobj: ArgSpec::Any,
        };
        let parsed = VerbArgsSpec {
            dobj: ArgSpec::This,
            prep: PrepSpec::Other(Preposition::IntoIn),
            iobj: ArgSpec::This,
        };
        assert!(declared.matches(&parsed));
        assert!(VerbArgsSpec::any_any_any().matches(&parsed));
        assert!(!VerbArgsSpec::none_none_none().matches(&parsed));
    }
}
