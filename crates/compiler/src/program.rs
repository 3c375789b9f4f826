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

use crate::ast::Stmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A parsed verb program. Cheap to clone; the tree and its source are shared behind one Arc
/// so activations and the database can hold the same program.
#[derive(Clone)]
pub struct Program(Arc<PrgInner>);

pub struct PrgInner {
    pub stmts: Vec<Stmt>,
    pub source: String,
}

impl Program {
    pub fn new(stmts: Vec<Stmt>, source: String) -> Self {
        Program(Arc::new(PrgInner { stmts, source }))
    }

    #[must_use]
    pub fn empty() -> Self {
        Program::new(vec![], String::new())
    }

    #[must_use]
    pub fn stmts(&self) -> &[Stmt] {
        &self.0.stmts
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.0.source
    }

    /// The source split back into lines, as `verb_code()` and the textdump writer want it.
    #[must_use]
    pub fn source_lines(&self) -> Vec<String> {
        if self.0.source.is_empty() {
            return vec![];
        }
        self.0.source.lines().map(|s| s.to_string()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.stmts.is_empty()
    }
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.0.source == other.0.source
    }
}

impl Eq for Program {}

impl Debug for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Program({} statements)", self.0.stmts.len())
    }
}

impl bincode::Encode for Program {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        self.0.stmts.encode(encoder)?;
        self.0.source.encode(encoder)
    }
}

impl<Context> bincode::Decode<Context> for Program {
    fn decode<D: bincode::de::Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        let stmts: Vec<Stmt> = bincode::Decode::decode(decoder)?;
        let source: String = bincode::Decode::decode(decoder)?;
        Ok(Program::new(stmts, source))
    }
}

impl<'de, Context> bincode::BorrowDecode<'de, Context> for Program {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        let stmts: Vec<Stmt> = bincode::BorrowDecode::borrow_decode(decoder)?;
        let source: String = bincode::BorrowDecode::borrow_decode(decoder)?;
        Ok(Program::new(stmts, source))
    }
}
