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
use std::fmt::{Debug, Display, Formatter};

/// An object reference. Negative ids are sentinels (`#-1` nothing, `#-2` ambiguous match,
/// `#-3` failed match, `#-4` and below un-logged-in connections).
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Encode, Decode)]
pub struct Obj(i64);

impl Obj {
    #[must_use]
    pub const fn mk_id(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.0
    }

    /// True for ids that can name a stored object, i.e. non-negative ones.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 >= 0
    }

    #[must_use]
    pub fn is_nothing(&self) -> bool {
        self.0 == -1
    }

    #[must_use]
    pub fn to_literal(&self) -> String {
        format!("#{}", self.0)
    }

    /// Parse an `#N` literal, as found in commands and textdumps.
    #[must_use]
    pub fn parse_literal(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#')?;
        s.parse::<i64>().ok().map(Self)
    }
}

impl Display for Obj {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Debug for Obj {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_roundtrip() {
        assert_eq!(Obj::parse_literal("#42"), Some(Obj::mk_id(42)));
        assert_eq!(Obj::parse_literal("#-1"), Some(Obj::mk_id(-1)));
        assert_eq!(Obj::parse_literal("42"), None);
        assert_eq!(Obj::parse_literal("#x"), None);
        assert_eq!(Obj::mk_id(7).to_literal(), "#7");
    }
}
