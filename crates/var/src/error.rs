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

use ErrorCode::*;
use bincode::{Decode, Encode};
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// A MOO error value. Errors are first-class values: they can be stored in properties,
/// passed around in lists, raised, and caught. The optional message rides along for
/// tracebacks but does not participate in equality.
#[derive(Clone, Eq, Ord, PartialOrd, Encode, Decode)]
pub struct Error {
    pub err_type: ErrorCode,
    pub msg: Option<Box<String>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Encode, Decode)]
#[allow(non_camel_case_types)]
pub enum ErrorCode {
    E_NONE,
    E_TYPE,
    E_DIV,
    E_PERM,
    E_PROPNF,
    E_VERBNF,
    E_VARNF,
    E_INVIND,
    E_RECMOVE,
    E_MAXREC,
    E_RANGE,
    E_ARGS,
    E_NACC,
    E_INVARG,
    E_QUOTA,
    E_FLOAT,
}

impl Error {
    pub fn new(err_type: ErrorCode, msg: Option<String>) -> Self {
        Self {
            err_type,
            msg: msg.map(Box::new),
        }
    }

    pub fn from_repr(v: u8) -> Option<Self> {
        ErrorCode::from_repr(v).map(Error::from)
    }

    #[must_use]
    pub fn to_int(&self) -> u8 {
        self.err_type.to_int()
    }

    #[must_use]
    pub fn message(&self) -> String {
        match &self.msg {
            Some(msg) => msg.as_ref().clone(),
            None => self.err_type.default_message().to_string(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.err_type.name()
    }
}

impl ErrorCode {
    pub fn from_repr(v: u8) -> Option<Self> {
        match v {
            0 => Some(E_NONE),
            1 => Some(E_TYPE),
            2 => Some(E_DIV),
            3 => Some(E_PERM),
            4 => Some(E_PROPNF),
            5 => Some(E_VERBNF),
            6 => Some(E_VARNF),
            7 => Some(E_INVIND),
            8 => Some(E_RECMOVE),
            9 => Some(E_MAXREC),
            10 => Some(E_RANGE),
            11 => Some(E_ARGS),
            12 => Some(E_NACC),
            13 => Some(E_INVARG),
            14 => Some(E_QUOTA),
            15 => Some(E_FLOAT),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_int(self) -> u8 {
        match self {
            E_NONE => 0,
            E_TYPE => 1,
            E_DIV => 2,
            E_PERM => 3,
            E_PROPNF => 4,
            E_VERBNF => 5,
            E_VARNF => 6,
            E_INVIND => 7,
            E_RECMOVE => 8,
            E_MAXREC => 9,
            E_RANGE => 10,
            E_ARGS => 11,
            E_NACC => 12,
            E_INVARG => 13,
            E_QUOTA => 14,
            E_FLOAT => 15,
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "E_NONE" => Some(E_NONE),
            "E_TYPE" => Some(E_TYPE),
            "E_DIV" => Some(E_DIV),
            "E_PERM" => Some(E_PERM),
            "E_PROPNF" => Some(E_PROPNF),
            "E_VERBNF" => Some(E_VERBNF),
            "E_VARNF" => Some(E_VARNF),
            "E_INVIND" => Some(E_INVIND),
            "E_RECMOVE" => Some(E_RECMOVE),
            "E_MAXREC" => Some(E_MAXREC),
            "E_RANGE" => Some(E_RANGE),
            "E_ARGS" => Some(E_ARGS),
            "E_NACC" => Some(E_NACC),
            "E_INVARG" => Some(E_INVARG),
            "E_QUOTA" => Some(E_QUOTA),
            "E_FLOAT" => Some(E_FLOAT),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            E_NONE => "E_NONE",
            E_TYPE => "E_TYPE",
            E_DIV => "E_DIV",
            E_PERM => "E_PERM",
            E_PROPNF => "E_PROPNF",
            E_VERBNF => "E_VERBNF",
            E_VARNF => "E_VARNF",
            E_INVIND => "E_INVIND",
            E_RECMOVE => "E_RECMOVE",
            E_MAXREC => "E_MAXREC",
            E_RANGE => "E_RANGE",
            E_ARGS => "E_ARGS",
            E_NACC => "E_NACC",
            E_INVARG => "E_INVARG",
            E_QUOTA => "E_QUOTA",
            E_FLOAT => "E_FLOAT",
        }
    }

    #[must_use]
    pub fn default_message(self) -> &'static str {
        match self {
            E_NONE => "No error",
            E_TYPE => "Type mismatch",
            E_DIV => "Division by zero",
            E_PERM => "Permission denied",
            E_PROPNF => "Property not found",
            E_VERBNF => "Verb not found",
            E_VARNF => "Variable not found",
            E_INVIND => "Invalid indirection",
            E_RECMOVE => "Recursive move",
            E_MAXREC => "Too many verb calls",
            E_RANGE => "Range error",
            E_ARGS => "Incorrect number of arguments",
            E_NACC => "Move refused by destination",
            E_INVARG => "Invalid argument",
            E_QUOTA => "Resource limit exceeded",
            E_FLOAT => "Floating-point arithmetic error",
        }
    }

    pub fn msg<S: ToString>(self, s: S) -> Error {
        Error::new(self, Some(s.to_string()))
    }
}

impl Hash for Error {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.err_type.hash(state);
    }
}

impl PartialEq<Error> for Error {
    fn eq(&self, other: &Error) -> bool {
        self.err_type == other.err_type
    }
}

impl PartialEq<ErrorCode> for Error {
    fn eq(&self, other: &ErrorCode) -> bool {
        self.err_type == *other
    }
}

impl From<ErrorCode> for Error {
    fn from(val: ErrorCode) -> Self {
        Error::new(val, None)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err_type.name())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.msg.is_some() {
            write!(f, "{} ({})", self.err_type.name(), self.message())
        } else {
            write!(f, "{}", self.err_type.name())
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repr_roundtrip() {
        for v in 0..16u8 {
            let code = ErrorCode::from_repr(v).unwrap();
            assert_eq!(code.to_int(), v);
            assert_eq!(ErrorCode::parse_str(code.name()), Some(code));
        }
        assert_eq!(ErrorCode::from_repr(16), None);
    }

    #[test]
    fn test_message_does_not_affect_equality() {
        let bare: Error = ErrorCode::E_PERM.into();
        let with_msg = ErrorCode::E_PERM.msg("you can't do that");
        assert_eq!(bare, with_msg);
        assert_eq!(with_msg.message(), "you can't do that");
    }
}
