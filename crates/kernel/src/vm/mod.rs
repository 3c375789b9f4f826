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

mod activation;
mod exec;

pub use activation::Activation;
pub use exec::{AbortReason, ExecFault, Flow, Interpreter};

use loam_var::Error;

/// Everything the interpreter can do besides produce a value: raise a MOO error (catchable
/// by MOO code), or abort the task outright (never catchable, though `finally` bodies run).
impl From<Error> for ExecFault {
    fn from(e: Error) -> Self {
        ExecFault::Err(e)
    }
}

impl From<loam_var::ErrorCode> for ExecFault {
    fn from(e: loam_var::ErrorCode) -> Self {
        ExecFault::Err(e.into())
    }
}

impl From<loam_common::model::WorldStateError> for ExecFault {
    fn from(e: loam_common::model::WorldStateError) -> Self {
        ExecFault::Err(e.into())
    }
}
