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
use loam_var::{Var, Variant};
use std::io;

pub struct TextdumpWriter<W: io::Write> {
    writer: W,
}

impl<W: io::Write> TextdumpWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_var(&mut self, var: &Var, is_clear: bool) -> Result<(), io::Error> {
        if is_clear {
            writeln!(self.writer, "{TYPE_CLEAR}")?;
            return Ok(());
        }
        match var.variant() {
            Variant::None => writeln!(self.writer, "{TYPE_NONE}")?,
            Variant::Str(s) => writeln!(self.writer, "{TYPE_STR}\n{s}")?,
            Variant::Obj(o) => writeln!(self.writer, "{TYPE_OBJ}\n{}", o.id())?,
            Variant::Err(e) => writeln!(self.writer, "{TYPE_ERR}\n{}", e.name())?,
            Variant::List(l) => {
                writeln!(self.writer, "{TYPE_LIST}\n{}", l.len())?;
                for v in l.iter() {
                    self.write_var(v, false)?;
                }
            }
            Variant::Int(i) => writeln!(self.writer, "{TYPE_INT}\n{i}")?,
            Variant::Float(f) => writeln!(self.writer, "{TYPE_FLOAT}\n{f}")?,
        }
        Ok(())
    }

    fn write_propval(&mut self, propval: &TdPropval) -> Result<(), io::Error> {
        self.write_var(&propval.value, propval.is_clear)?;
        writeln!(self.writer, "{}", propval.owner.id())?;
        writeln!(self.writer, "{}", propval.perms)?;
        Ok(())
    }

    fn write_verbdef(&mut self, verbdef: &TdVerbdef) -> Result<(), io::Error> {
        writeln!(self.writer, "{}", verbdef.names)?;
        writeln!(self.writer, "{}", verbdef.owner.id())?;
        writeln!(self.writer, "{}", verbdef.perms)?;
        writeln!(
            self.writer,
            "{} {} {}",
            verbdef.dobj, verbdef.prep, verbdef.iobj
        )?;
        Ok(())
    }

    fn write_object(&mut self, object: &TdObject) -> Result<(), io::Error> {
        writeln!(self.writer, "#{}", object.id.id())?;
        writeln!(self.writer, "{}", object.name)?;
        // The handles line is a historical artifact, always blank.
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", object.flags)?;
        writeln!(self.writer, "{}", object.owner.id())?;
        writeln!(self.writer, "{}", object.location.id())?;
        writeln!(self.writer, "{}", object.contents_head.id())?;
        writeln!(self.writer, "{}", object.next.id())?;
        writeln!(self.writer, "{}", object.parent.id())?;
        writeln!(self.writer, "{}", object.child_head.id())?;
        writeln!(self.writer, "{}", object.sibling.id())?;
        writeln!(self.writer, "{}", object.propdefs.len())?;
        for propdef in &object.propdefs {
            writeln!(self.writer, "{propdef}")?;
        }
        writeln!(self.writer, "{}", object.propvals.len())?;
        for propval in &object.propvals {
            self.write_propval(propval)?;
        }
        writeln!(self.writer, "{}", object.verbdefs.len())?;
        for verbdef in &object.verbdefs {
            self.write_verbdef(verbdef)?;
        }
        Ok(())
    }

    pub fn write_textdump(&mut self, textdump: &Textdump) -> Result<(), io::Error> {
        let version = textdump.version.unwrap_or(TextdumpVersion::Format4);
        writeln!(self.writer, "{}", version.to_version_string())?;
        writeln!(
            self.writer,
            "{}\n{}\n0\n{}",
            textdump.objects.len() + textdump.recycled.len(),
            textdump.programs.len(),
            textdump.users.len()
        )?;
        for user in &textdump.users {
            writeln!(self.writer, "{}", user.id())?;
        }
        // Objects and recycled markers, in id order.
        let mut ids: Vec<_> = textdump
            .objects
            .keys()
            .copied()
            .chain(textdump.recycled.iter().copied())
            .collect();
        ids.sort();
        for id in ids {
            match textdump.objects.get(&id) {
                Some(o) => self.write_object(o)?,
                None => writeln!(self.writer, "#{} recycled", id.id())?,
            }
        }
        for ((oid, verbnum), program) in &textdump.programs {
            writeln!(self.writer, "#{}:{}", oid.id(), verbnum)?;
            for line in program {
                writeln!(self.writer, "{line}")?;
            }
            writeln!(self.writer, ".")?;
        }
        writeln!(self.writer, "0 clocks")?;
        writeln!(self.writer, "0 queued tasks")?;
        writeln!(self.writer, "0 suspended tasks")?;
        Ok(())
    }
}
