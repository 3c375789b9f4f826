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

use crate::{
    TYPE_CLEAR, TYPE_ERR, TYPE_FLOAT, TYPE_INT, TYPE_LIST, TYPE_NONE, TYPE_OBJ, TYPE_STR,
    TdObject, TdPropval, TdVerbdef, Textdump, TextdumpVersion,
};
use loam_var::{Error, ErrorCode, Obj, Var, v_error, v_float, v_int, v_list, v_none, v_obj, v_str};
use std::io::{BufRead, BufReader, Read};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum TextdumpReaderError {
    #[error("could not open file: {0}")]
    CouldNotOpenFile(String),
    #[error("io error: {0} @ line {1}")]
    IoError(std::io::Error, usize),
    #[error("parse error: {0} @ line {1}")]
    ParseError(String, usize),
    #[error("textdump version error: {0}")]
    VersionError(String),
}

pub struct TextdumpReader<R: Read> {
    pub line_num: usize,
    pub version: TextdumpVersion,
    reader: BufReader<R>,
    /// One line of pushback, for the peeks that find section boundaries.
    pending: Option<String>,
}

impl<R: Read> TextdumpReader<R> {
    pub fn new(mut reader: BufReader<R>) -> Result<Self, TextdumpReaderError> {
        let mut version_string = String::new();
        reader.read_line(&mut version_string).map_err(|e| {
            TextdumpReaderError::VersionError(format!("could not read textdump version: {e}"))
        })?;
        version_string.retain(|c| c != '\n' && c != '\r');
        info!("version {}", version_string);
        let version = TextdumpVersion::parse(&version_string).ok_or_else(|| {
            TextdumpReaderError::VersionError(format!("invalid version: {version_string}"))
        })?;
        Ok(Self {
            version,
            reader,
            line_num: 2,
            pending: None,
        })
    }

    fn read_next_line(&mut self) -> Result<String, TextdumpReaderError> {
        if let Some(line) = self.pending.take() {
            return Ok(line);
        }
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {
                return Err(TextdumpReaderError::IoError(
                    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"),
                    self.line_num,
                ));
            }
            Ok(_) => {}
            Err(e) => return Err(TextdumpReaderError::IoError(e, self.line_num)),
        }
        self.line_num += 1;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    fn push_back(&mut self, line: String) {
        debug_assert!(self.pending.is_none());
        self.pending = Some(line);
    }

    fn read_num(&mut self) -> Result<i64, TextdumpReaderError> {
        let buf = self.read_next_line()?;
        let Ok(i) = buf.trim().parse() else {
            return Err(TextdumpReaderError::ParseError(
                format!("invalid number: {buf}"),
                self.line_num,
            ));
        };
        Ok(i)
    }

    fn read_objid(&mut self) -> Result<Obj, TextdumpReaderError> {
        Ok(Obj::mk_id(self.read_num()?))
    }

    fn read_float(&mut self) -> Result<f64, TextdumpReaderError> {
        let buf = self.read_next_line()?;
        let Ok(f) = buf.trim().parse() else {
            return Err(TextdumpReaderError::ParseError(
                format!("invalid float: {buf}"),
                self.line_num,
            ));
        };
        Ok(f)
    }

    fn read_string(&mut self) -> Result<String, TextdumpReaderError> {
        self.read_next_line()
    }

    fn read_var(&mut self) -> Result<Var, TextdumpReaderError> {
        let t_num = self.read_num()?;
        self.read_var_value(t_num)
    }

    fn read_var_value(&mut self, t_num: i64) -> Result<Var, TextdumpReaderError> {
        let v = match t_num {
            TYPE_NONE => v_none(),
            TYPE_STR => v_str(&self.read_string()?),
            TYPE_OBJ => v_obj(self.read_objid()?),
            TYPE_ERR => {
                let s = self.read_string()?;
                // Error values appear by name; ancient dumps may carry the integer form.
                let err: Error = match s.trim().parse::<u8>() {
                    Ok(e_num) => Error::from_repr(e_num).ok_or_else(|| {
                        TextdumpReaderError::ParseError(
                            format!("invalid error code: {s}"),
                            self.line_num,
                        )
                    })?,
                    Err(..) => ErrorCode::parse_str(s.trim())
                        .ok_or_else(|| {
                            TextdumpReaderError::ParseError(
                                format!("invalid error name: {s}"),
                                self.line_num,
                            )
                        })?
                        .into(),
                };
                v_error(err)
            }
            TYPE_LIST => {
                let l_size = self.read_num()?;
                let mut v = Vec::with_capacity(l_size.max(0) as usize);
                for _ in 0..l_size {
                    v.push(self.read_var()?);
                }
                v_list(&v)
            }
            TYPE_INT => v_int(self.read_num()?),
            TYPE_FLOAT => {
                if self.version == TextdumpVersion::Format1 {
                    warn!("float value in a Format 1 dump; reading it anyway");
                }
                v_float(self.read_float()?)
            }
            _ => {
                return Err(TextdumpReaderError::ParseError(
                    format!("invalid var type: {t_num}"),
                    self.line_num,
                ));
            }
        };
        Ok(v)
    }

    fn read_propval(&mut self) -> Result<TdPropval, TextdumpReaderError> {
        let t_num = self.read_num()?;
        // 'clear' is an attribute of the slot rather than a value type; it carries no
        // payload on disk.
        let is_clear = t_num == TYPE_CLEAR;
        let value = if is_clear {
            v_none()
        } else {
            self.read_var_value(t_num)?
        };
        Ok(TdPropval {
            value,
            is_clear,
            owner: self.read_objid()?,
            perms: self.read_num()? as u8,
        })
    }

    fn read_verbdef(&mut self) -> Result<TdVerbdef, TextdumpReaderError> {
        let names = self.read_string()?;
        let owner = self.read_objid()?;
        let perms = self.read_num()? as u16;
        let argspec_line = self.read_string()?;
        let parts: Vec<i64> = argspec_line
            .split_whitespace()
            .map(|p| p.parse::<i64>())
            .collect::<Result<_, _>>()
            .map_err(|e| {
                TextdumpReaderError::ParseError(
                    format!("invalid argspec: {argspec_line}: {e}"),
                    self.line_num,
                )
            })?;
        if parts.len() != 3 {
            return Err(TextdumpReaderError::ParseError(
                format!("argspec needs three values: {argspec_line}"),
                self.line_num,
            ));
        }
        Ok(TdVerbdef {
            names,
            owner,
            perms,
            dobj: parts[0],
            prep: parts[1],
            iobj: parts[2],
        })
    }

    /// An object header is `#N` or `#N recycled`; a program header is `#N:M`. Anything
    /// else ends the object section.
    fn parse_object_header(line: &str) -> Option<(i64, bool)> {
        let rest = line.trim().strip_prefix('#')?;
        if let Some((id, tail)) = rest.split_once(' ') {
            if tail.trim() != "recycled" {
                return None;
            }
            return id.parse().ok().map(|id| (id, true));
        }
        if rest.contains(':') {
            return None;
        }
        rest.parse().ok().map(|id| (id, false))
    }

    fn parse_program_header(line: &str) -> Option<(i64, usize)> {
        let rest = line.trim().strip_prefix('#')?;
        let (oid, verbnum) = rest.split_once(':')?;
        Some((oid.parse().ok()?, verbnum.parse().ok()?))
    }

    fn read_object_body(&mut self, id: i64) -> Result<TdObject, TextdumpReaderError> {
        let name = self.read_string()?;
        let _handles = self.read_string()?;
        let flags = self.read_num()? as u16;
        let owner = self.read_objid()?;
        let location = self.read_objid()?;
        let contents_head = self.read_objid()?;
        let next = self.read_objid()?;
        let parent = self.read_objid()?;
        let child_head = self.read_objid()?;
        let sibling = self.read_objid()?;
        let num_pdefs = self.read_num()? as usize;
        let mut propdefs = Vec::with_capacity(num_pdefs);
        for _ in 0..num_pdefs {
            propdefs.push(self.read_string()?);
        }
        let num_pvals = self.read_num()? as usize;
        let mut propvals = Vec::with_capacity(num_pvals);
        for _ in 0..num_pvals {
            propvals.push(self.read_propval()?);
        }
        let num_verbs = self.read_num()? as usize;
        let mut verbdefs = Vec::with_capacity(num_verbs);
        for _ in 0..num_verbs {
            verbdefs.push(self.read_verbdef()?);
        }
        Ok(TdObject {
            id: Obj::mk_id(id),
            name,
            flags,
            owner,
            location,
            contents_head,
            next,
            parent,
            child_head,
            sibling,
            propdefs,
            propvals,
            verbdefs,
        })
    }

    fn read_program(&mut self) -> Result<Vec<String>, TextdumpReaderError> {
        let mut program = vec![];
        loop {
            let line = self.read_string()?;
            if line.trim() == "." {
                break;
            }
            program.push(line);
        }
        Ok(program)
    }

    pub fn read_textdump(&mut self) -> Result<Textdump, TextdumpReaderError> {
        let (nobjs, nprogs, _dummy, nusers) = (
            self.read_num()?,
            self.read_num()?,
            self.read_num()?,
            self.read_num()?,
        );
        info!("# objs: {nobjs}, # progs: {nprogs}, # users: {nusers}");
        let mut users = Vec::with_capacity(nusers.max(0) as usize);
        for _ in 0..nusers {
            users.push(self.read_objid()?);
        }

        // Header counts in the wild disagree with reality; trust the stream instead and
        // read objects until the program (or trailer) section begins.
        let mut td = Textdump {
            version: Some(self.version),
            ..Default::default()
        };
        let mut seen_objects: i64 = 0;
        loop {
            let line = match self.read_next_line() {
                Ok(line) => line,
                Err(TextdumpReaderError::IoError(_, _)) => break,
                Err(e) => return Err(e),
            };
            match Self::parse_object_header(&line) {
                Some((id, true)) => {
                    td.recycled.push(Obj::mk_id(id));
                    seen_objects += 1;
                }
                Some((id, false)) => {
                    let o = self.read_object_body(id)?;
                    td.objects.insert(o.id, o);
                    seen_objects += 1;
                }
                None => {
                    self.push_back(line);
                    break;
                }
            }
        }
        if seen_objects != nobjs {
            warn!(
                "header claimed {nobjs} objects but the stream held {seen_objects}; \
                 trusting the stream"
            );
        }

        // Verb program sections may arrive in any order; index them all before anyone
        // reconciles them against verbdefs.
        loop {
            let line = match self.read_next_line() {
                Ok(line) => line,
                Err(TextdumpReaderError::IoError(_, _)) => break,
                Err(e) => return Err(e),
            };
            match Self::parse_program_header(&line) {
                Some((oid, verbnum)) => {
                    let program = self.read_program()?;
                    td.programs.insert((Obj::mk_id(oid), verbnum), program);
                }
                None => {
                    // The queued/suspended task trailer; nothing in it survives a restart.
                    break;
                }
            }
        }

        td.users = users;
        Ok(td)
    }
}
