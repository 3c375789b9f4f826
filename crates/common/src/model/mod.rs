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

mod r#match;
mod objects;
mod permissions;
mod props;
mod verbs;

pub use r#match::{ArgSpec, PrepSpec, Preposition, VerbArgsSpec, find_preposition};
pub use objects::{ObjFlag, obj_flags_string};
pub use permissions::Perms;
pub use props::{PropFlag, PropPerms, prop_flags_string};
pub use verbs::{VerbFlag, verb_flags_string, verbname_matches};

use loam_var::{Error, ErrorCode, Obj};
use thiserror::Error as ThisError;

/// Faults the object database can raise. The interpreter maps these onto MOO error values;
/// hosts see them directly.
#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
pub enum WorldStateError {
    #[error("Object not found: {0}")]
    ObjectNotFound(Obj),
    #[error("Recursive move detected: {0} -> {1}")]
    RecursiveMove(Obj, Obj),
    #[error("Invalid parent: {0}")]
    InvalidParent(Obj),
    #[error("Object permission denied")]
    ObjectPermissionDenied,

    #[error("Property not found: {0}.{1}")]
    PropertyNotFound(Obj, String),
    #[error("Property permission denied")]
    PropertyPermissionDenied,
    #[error("Duplicate property definition: {0}.{1}")]
    DuplicatePropertyDefinition(Obj, String),

    #[error("Verb not found: {0}:{1}")]
    VerbNotFound(Obj, String),
    #[error("Verb permission denied")]
    VerbPermissionDenied,
    #[error("Duplicate verb: {0}:{1}")]
    DuplicateVerb(Obj, String),

    #[error("Move refused by destination")]
    MoveRefused,

    // Catch-all for system level object DB errors.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Translations from WorldStateError to MOO error codes.
impl WorldStateError {
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            Self::ObjectNotFound(_) => ErrorCode::E_INVIND,
            Self::RecursiveMove(_, _) => ErrorCode::E_RECMOVE,
            Self::InvalidParent(_) => ErrorCode::E_INVARG,
            Self::ObjectPermissionDenied => ErrorCode::E_PERM,
            Self::PropertyNotFound(_, _) => ErrorCode::E_PROPNF,
            Self::PropertyPermissionDenied => ErrorCode::E_PERM,
            Self::DuplicatePropertyDefinition(_, _) => ErrorCode::E_INVARG,
            Self::VerbNotFound(_, _) => ErrorCode::E_VERBNF,
            Self::VerbPermissionDenied => ErrorCode::E_PERM,
            Self::DuplicateVerb(_, _) => ErrorCode::E_INVARG,
            Self::MoveRefused => ErrorCode::E_NACC,
            Self::DatabaseError(_) => ErrorCode::E_QUOTA,
        }
    }
}

impl From<WorldStateError> for Error {
    fn from(val: WorldStateError) -> Self {
        val.to_error_code().into()
    }
}
