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
use crate::var::Var;
use bincode::{Decode, Encode};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An immutable MOO list. Every "mutation" produces a new list; the underlying vector is
/// shared until then. Indexing is 1-based.
#[derive(Clone, Encode, Decode)]
pub struct List(Arc<Vec<Var>>);

impl List {
    pub fn from_slice(l: &[Var]) -> Self {
        Self(Arc::new(l.to_vec()))
    }

    pub fn from_vec(l: Vec<Var>) -> Self {
        Self(Arc::new(l))
    }

    pub fn from_iter<I: IntoIterator<Item = Var>>(i: I) -> Self {
        Self(Arc::new(i.into_iter().collect()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Var> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Var] {
        &self.0
    }

    /// 1-based index.
    pub fn index(&self, idx: i64) -> Result<Var, Error> {
        if idx < 1 || idx as usize > self.0.len() {
            return Err(ErrorCode::E_RANGE.into());
        }
        Ok(self.0[idx as usize - 1].clone())
    }

    /// 1-based inclusive range; inverted ranges yield the empty list.
    pub fn range(&self, from: i64, to: i64) -> Result<List, Error> {
        if to < from {
            return Ok(List::from_slice(&[]));
        }
        if from < 1 || to as usize > self.0.len() {
            return Err(ErrorCode::E_RANGE.into());
        }
        Ok(List::from_slice(&self.0[from as usize - 1..to as usize]))
    }

    pub fn index_set(&self, idx: i64, value: Var) -> Result<List, Error> {
        if idx < 1 || idx as usize > self.0.len() {
            return Err(ErrorCode::E_RANGE.into());
        }
        let mut v = self.0.as_ref().clone();
        v[idx as usize - 1] = value;
        Ok(List::from_vec(v))
    }

    /// Functional splice over a 1-based inclusive range; the replacement list may be any
    /// length, so the result can grow or shrink.
    pub fn range_set(&self, from: i64, to: i64, value: &List) -> Result<List, Error> {
        let len = self.0.len() as i64;
        if from < 1 || from > len + 1 || to > len || to < from - 1 {
            return Err(ErrorCode::E_RANGE.into());
        }
        let mut v = Vec::with_capacity(self.0.len() + value.len());
        v.extend_from_slice(&self.0[..from as usize - 1]);
        v.extend_from_slice(&value.0);
        if to >= 0 {
            v.extend_from_slice(&self.0[to as usize..]);
        }
        Ok(List::from_vec(v))
    }

    #[must_use]
    pub fn push(&self, value: Var) -> List {
        let mut v = self.0.as_ref().clone();
        v.push(value);
        List::from_vec(v)
    }

    /// Insert before the 1-based position; out-of-bounds positions clamp to the ends, the
    /// way `listinsert` does.
    #[must_use]
    pub fn insert(&self, idx: i64, value: Var) -> List {
        let pos = (idx - 1).clamp(0, self.0.len() as i64) as usize;
        let mut v = self.0.as_ref().clone();
        v.insert(pos, value);
        List::from_vec(v)
    }

    pub fn delete(&self, idx: i64) -> Result<List, Error> {
        if idx < 1 || idx as usize > self.0.len() {
            return Err(ErrorCode::E_RANGE.into());
        }
        let mut v = self.0.as_ref().clone();
        v.remove(idx as usize - 1);
        Ok(List::from_vec(v))
    }

    #[must_use]
    pub fn append(&self, other: &List) -> List {
        let mut v = self.0.as_ref().clone();
        v.extend_from_slice(&other.0);
        List::from_vec(v)
    }

    /// 1-based position of the first element equal to `value`, or 0.
    #[must_use]
    pub fn index_in(&self, value: &Var) -> i64 {
        for (i, v) in self.0.iter().enumerate() {
            if v == value {
                return i as i64 + 1;
            }
        }
        0
    }

    #[must_use]
    pub fn contains(&self, value: &Var) -> bool {
        self.index_in(value) != 0
    }

    /// Set-style add: append only when not already present.
    #[must_use]
    pub fn set_add(&self, value: Var) -> List {
        if self.contains(&value) {
            self.clone()
        } else {
            self.push(value)
        }
    }

    /// Set-style remove: drop the first occurrence, if any.
    #[must_use]
    pub fn set_remove(&self, value: &Var) -> List {
        let pos = self.index_in(value);
        if pos == 0 {
            self.clone()
        } else {
            self.delete(pos).unwrap()
        }
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

impl Eq for List {}

impl Hash for List {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for v in self.0.iter() {
            v.hash(state);
        }
    }
}

impl Ord for List {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().cmp(other.0.iter())
    }
}

impl PartialOrd for List {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Debug for List {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{v_int, v_str};

    #[test]
    fn test_index_bounds() {
        let l = List::from_slice(&[v_int(1), v_int(2), v_int(3)]);
        assert_eq!(l.index(1).unwrap(), v_int(1));
        assert_eq!(l.index(3).unwrap(), v_int(3));
        assert!(l.index(0).is_err());
        assert!(l.index(4).is_err());
    }

    #[test]
    fn test_range_set_resizes() {
        let l = List::from_slice(&[v_int(1), v_int(2), v_int(3)]);
        let r = l
            .range_set(2, 2, &List::from_slice(&[v_int(7), v_int(8)]))
            .unwrap();
        assert_eq!(r.as_slice(), &[v_int(1), v_int(7), v_int(8), v_int(3)]);
        let r = l.range_set(1, 3, &List::from_slice(&[])).unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn test_set_semantics() {
        let l = List::from_slice(&[v_int(1), v_int(2)]);
        assert_eq!(l.set_add(v_int(2)).len(), 2);
        assert_eq!(l.set_add(v_int(3)).len(), 3);
        assert_eq!(l.set_remove(&v_int(1)).as_slice(), &[v_int(2)]);
        assert_eq!(l.set_remove(&v_int(9)).len(), 2);
    }

    #[test]
    fn test_case_insensitive_membership() {
        let l = List::from_slice(&[v_str("Ball"), v_str("box")]);
        assert_eq!(l.index_in(&v_str("ball")), 1);
    }
}
