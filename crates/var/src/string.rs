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

use crate::error::{Error, ErrorCode};
use bincode::{Decode, Encode};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

/// An immutable MOO string. Indexing is 1-based and grapheme-aware; `==` and ordering are
/// case-insensitive (`strcmp()` is the case-sensitive escape hatch). All "mutations" build
/// a fresh string.
#[derive(Clone)]
pub struct Str(Arc<String>);

impl Str {
    pub fn mk_str(s: &str) -> Self {
        Self(Arc::new(s.to_string()))
    }

    pub fn mk_string(s: String) -> Self {
        Self(Arc::new(s))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in graphemes, not bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.graphemes(true).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 1-based single-grapheme index.
    pub fn index(&self, idx: i64) -> Result<Str, Error> {
        if idx < 1 {
            return Err(ErrorCode::E_RANGE.into());
        }
        match self.0.graphemes(true).nth(idx as usize - 1) {
            Some(g) => Ok(Str::mk_str(g)),
            None => Err(ErrorCode::E_RANGE.into()),
        }
    }

    /// 1-based inclusive range. An inverted range yields the empty string; otherwise both
    /// ends must be in bounds.
    pub fn range(&self, from: i64, to: i64) -> Result<Str, Error> {
        if to < from {
            return Ok(Str::mk_str(""));
        }
        let len = self.len() as i64;
        if from < 1 || to > len {
            return Err(ErrorCode::E_RANGE.into());
        }
        let s: String = self
            .0
            .graphemes(true)
            .skip(from as usize - 1)
            .take((to - from + 1) as usize)
            .collect();
        Ok(Str::mk_string(s))
    }

    /// Functional set of the grapheme at a 1-based index; the replacement may be any length.
    pub fn index_set(&self, idx: i64, value: &Str) -> Result<Str, Error> {
        let len = self.len() as i64;
        if idx < 1 || idx > len {
            return Err(ErrorCode::E_RANGE.into());
        }
        let mut out = String::with_capacity(self.0.len() + value.0.len());
        for (i, g) in self.0.graphemes(true).enumerate() {
            if i as i64 + 1 == idx {
                out.push_str(value.as_str());
            } else {
                out.push_str(g);
            }
        }
        Ok(Str::mk_string(out))
    }

    /// Functional splice over a 1-based inclusive range.
    pub fn range_set(&self, from: i64, to: i64, value: &Str) -> Result<Str, Error> {
        let len = self.len() as i64;
        // MOO allows the degenerate insert position `s[x..x-1]`.
        if from < 1 || from > len + 1 || to > len || to < from - 1 {
            return Err(ErrorCode::E_RANGE.into());
        }
        let mut out = String::with_capacity(self.0.len() + value.0.len());
        for (i, g) in self.0.graphemes(true).enumerate() {
            let pos = i as i64 + 1;
            if pos == from {
                out.push_str(value.as_str());
            }
            if pos < from || pos > to {
                out.push_str(g);
            }
        }
        if from == len + 1 {
            out.push_str(value.as_str());
        }
        Ok(Str::mk_string(out))
    }

    #[must_use]
    pub fn append(&self, other: &Str) -> Str {
        let mut s = String::with_capacity(self.0.len() + other.0.len());
        s.push_str(&self.0);
        s.push_str(&other.0);
        Str::mk_string(s)
    }
}

impl PartialEq for Str {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_ascii() && other.0.is_ascii() {
            self.0.eq_ignore_ascii_case(&other.0)
        } else {
            self.0.to_lowercase() == other.0.to_lowercase()
        }
    }
}

impl Eq for Str {}

impl Hash for Str {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_lowercase().hash(state);
    }
}

impl Ord for Str {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.to_lowercase().cmp(&other.0.to_lowercase())
    }
}

impl PartialOrd for Str {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Str {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for Str {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Encode for Str {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        self.0.as_str().encode(encoder)
    }
}

impl<Context> Decode<Context> for Str {
    fn decode<D: bincode::de::Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        let s: String = Decode::decode(decoder)?;
        Ok(Str::mk_string(s))
    }
}

impl<'de, Context> bincode::BorrowDecode<'de, Context> for Str {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        let s: String = bincode::BorrowDecode::borrow_decode(decoder)?;
        Ok(Str::mk_string(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_based_bounds() {
        let s = Str::mk_str("moo");
        assert_eq!(s.index(1).unwrap().as_str(), "m");
        assert_eq!(s.index(3).unwrap().as_str(), "o");
        assert!(s.index(0).is_err());
        assert!(s.index(4).is_err());
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let s = Str::mk_str("moo");
        assert_eq!(s.range(3, 1).unwrap().as_str(), "");
        assert_eq!(s.range(2, 3).unwrap().as_str(), "oo");
        assert!(s.range(1, 4).is_err());
    }

    #[test]
    fn test_grapheme_indexing() {
        // A family emoji is many codepoints but one grapheme.
        let s = Str::mk_str("a\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F466}b");
        assert_eq!(s.len(), 3);
        assert_eq!(s.index(3).unwrap().as_str(), "b");
    }

    #[test]
    fn test_case_insensitive_eq() {
        assert_eq!(Str::mk_str("Wizard"), Str::mk_str("wizard"));
        assert_ne!(Str::mk_str("wizard"), Str::mk_str("wizards"));
    }

    #[test]
    fn test_range_set() {
        let s = Str::mk_str("barfoo");
        assert_eq!(s.range_set(1, 3, &Str::mk_str("quux")).unwrap().as_str(), "quuxfoo");
        assert_eq!(s.range_set(4, 6, &Str::mk_str("")).unwrap().as_str(), "bar");
        // Degenerate insert at the front.
        assert_eq!(s.range_set(1, 0, &Str::mk_str("x")).unwrap().as_str(), "xbarfoo");
    }
}
