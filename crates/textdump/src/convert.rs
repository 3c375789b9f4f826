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

use crate::{TdObject, TdPropval, TdVerbdef, Textdump, TextdumpReaderError, TextdumpVersion};
use loam_common::model::{ArgSpec, ObjFlag, PrepSpec, VerbArgsSpec};
use loam_common::util::BitEnum;
use loam_db::{Object, PropVal, VerbDef, WorldStateSnapshot};
use loam_var::{NOTHING, Obj, Symbol};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

/// Build the on-disk form from a database snapshot. The contents/children linked-list
/// heads are regenerated from the in-memory vectors.
#[must_use]
pub fn snapshot_to_textdump(snapshot: &WorldStateSnapshot) -> Textdump {
    let mut next_in_location: HashMap<Obj, Obj> = HashMap::new();
    let mut sibling_in_parent: HashMap<Obj, Obj> = HashMap::new();
    for o in snapshot.objects.values() {
        for w in o.contents.windows(2) {
            next_in_location.insert(w[0], w[1]);
        }
        for w in o.children.windows(2) {
            sibling_in_parent.insert(w[0], w[1]);
        }
    }

    let mut td = Textdump {
        version: Some(TextdumpVersion::Format4),
        ..Default::default()
    };
    for (id, o) in &snapshot.objects {
        if o.flags.contains(ObjFlag::User) {
            td.users.push(*id);
        }
        let propvals = o
            .propvals
            .iter()
            .map(|pv| TdPropval {
                value: pv.value.clone(),
                is_clear: pv.is_clear,
                owner: pv.owner,
                perms: pv.flags.to_u16() as u8,
            })
            .collect();
        let verbdefs = o
            .verbdefs
            .iter()
            .map(|vd| TdVerbdef {
                names: vd.names_string(),
                owner: vd.owner,
                perms: vd.flags.to_u16(),
                dobj: vd.argspec.dobj as i64,
                prep: vd.argspec.prep.to_repr() as i64,
                iobj: vd.argspec.iobj as i64,
            })
            .collect();
        td.objects.insert(
            *id,
            TdObject {
                id: *id,
                name: o.name.clone(),
                flags: o.flags.to_u16(),
                owner: o.owner,
                location: o.location,
                contents_head: o.contents.first().copied().unwrap_or(NOTHING),
                next: next_in_location.get(id).copied().unwrap_or(NOTHING),
                parent: o.parent,
                child_head: o.children.first().copied().unwrap_or(NOTHING),
                sibling: sibling_in_parent.get(id).copied().unwrap_or(NOTHING),
                propdefs: o.propdefs.iter().map(|p| p.to_string()).collect(),
                propvals,
                verbdefs,
            },
        );
        for (i, vd) in o.verbdefs.iter().enumerate() {
            let lines = vd.program.source_lines();
            if !lines.is_empty() {
                td.programs.insert((*id, i), lines);
            }
        }
    }
    // Recycled markers for every gap below max_object, so ids stay retired across dumps.
    for id in 0..=snapshot.max_object {
        let o = Obj::mk_id(id);
        if !td.objects.contains_key(&o) {
            td.recycled.push(o);
        }
    }
    td
}

/// Follow a head/next chain; fall back to derived membership (in id order) when the chain
/// disagrees with the objects' own back-references.
fn chase_chain(
    td: &Textdump,
    head: Obj,
    next_of: impl Fn(&TdObject) -> Obj,
    mut derived: Vec<Obj>,
) -> Vec<Obj> {
    let mut chain = vec![];
    let mut seen = HashSet::new();
    let mut cur = head;
    while cur.is_positive() && seen.insert(cur) {
        let Some(o) = td.objects.get(&cur) else {
            break;
        };
        chain.push(cur);
        cur = next_of(o);
    }
    let chain_set: HashSet<Obj> = chain.iter().copied().collect();
    let derived_set: HashSet<Obj> = derived.iter().copied().collect();
    if chain_set == derived_set {
        chain
    } else {
        derived.sort();
        derived
    }
}

/// Reconstruct a live database snapshot from the on-disk form, compiling verb programs as
/// we go. A verb with no program section entry gets the empty program; a program that no
/// longer parses is kept as source so it survives the next dump.
pub fn textdump_to_snapshot(td: &Textdump) -> Result<WorldStateSnapshot, TextdumpReaderError> {
    let mut by_location: HashMap<Obj, Vec<Obj>> = HashMap::new();
    let mut by_parent: HashMap<Obj, Vec<Obj>> = HashMap::new();
    for o in td.objects.values() {
        by_location.entry(o.location).or_default().push(o.id);
        by_parent.entry(o.parent).or_default().push(o.id);
    }

    let mut objects = BTreeMap::new();
    for (id, tdo) in &td.objects {
        let propdefs: Vec<Symbol> = tdo.propdefs.iter().map(|p| Symbol::mk(p)).collect();
        let propvals: Vec<PropVal> = tdo
            .propvals
            .iter()
            .map(|pv| PropVal {
                value: pv.value.clone(),
                owner: pv.owner,
                flags: BitEnum::from_u8(pv.perms),
                is_clear: pv.is_clear,
            })
            .collect();
        let mut verbdefs = Vec::with_capacity(tdo.verbdefs.len());
        for (i, vd) in tdo.verbdefs.iter().enumerate() {
            let names: Vec<Symbol> = vd.names.split_whitespace().map(Symbol::mk).collect();
            let dobj = ArgSpec::from_repr(vd.dobj as u8).ok_or_else(|| {
                TextdumpReaderError::ParseError(format!("invalid dobj spec: {}", vd.dobj), 0)
            })?;
            let iobj = ArgSpec::from_repr(vd.iobj as u8).ok_or_else(|| {
                TextdumpReaderError::ParseError(format!("invalid iobj spec: {}", vd.iobj), 0)
            })?;
            let prep = PrepSpec::from_repr(vd.prep as i16).ok_or_else(|| {
                TextdumpReaderError::ParseError(format!("invalid prep spec: {}", vd.prep), 0)
            })?;
            let program = match td.programs.get(&(*id, i)) {
                None => loam_compiler::Program::empty(),
                Some(lines) => {
                    let source = lines.join("\n");
                    match loam_compiler::compile(&source) {
                        Ok(program) => program,
                        Err(e) => {
                            warn!("verb {id}:{i} ({}) does not compile: {e}", vd.names);
                            loam_compiler::Program::new(vec![], source)
                        }
                    }
                }
            };
            verbdefs.push(VerbDef {
                names,
                owner: vd.owner,
                flags: BitEnum::from_u8((vd.perms & 0xf) as u8),
                argspec: VerbArgsSpec { dobj, prep, iobj },
                program,
            });
        }
        let contents = chase_chain(
            td,
            tdo.contents_head,
            |o| o.next,
            by_location.get(id).cloned().unwrap_or_default(),
        );
        let children = chase_chain(
            td,
            tdo.child_head,
            |o| o.sibling,
            by_parent.get(id).cloned().unwrap_or_default(),
        );
        objects.insert(
            *id,
            Object {
                id: *id,
                name: tdo.name.clone(),
                owner: tdo.owner,
                parent: tdo.parent,
                location: tdo.location,
                contents,
                children,
                flags: BitEnum::from_u8(tdo.flags as u8),
                propdefs,
                propvals,
                verbdefs,
            },
        );
    }
    let max_object = objects
        .keys()
        .map(|o| o.id())
        .chain(td.recycled.iter().map(|o| o.id()))
        .max()
        .unwrap_or(-1);
    Ok(WorldStateSnapshot {
        objects,
        max_object,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TextdumpReader, TextdumpWriter};
    use loam_common::model::{Perms, PropFlag, VerbFlag};
    use loam_db::WorldState;
    use loam_var::{v_err, v_float, v_int, v_list, v_str, ErrorCode};
    use pretty_assertions::assert_eq;
    use std::io::BufReader;

    fn wizard_perms() -> Perms {
        Perms::new(Obj::mk_id(0), BitEnum::new_with(ObjFlag::Wizard))
    }

    /// A world exercising every value type, clear slots, multi-named verbs, verb code, a
    /// recycled id gap, and a player.
    fn fixture_snapshot() -> WorldStateSnapshot {
        let ws = WorldState::new();
        let perms = wizard_perms();
        let root = ws.create_object(&perms, NOTHING, Obj::mk_id(0)).unwrap();
        ws.set_name(&perms, root, "root").unwrap();
        let player = ws.create_object(&perms, root, Obj::mk_id(0)).unwrap();
        ws.set_name(&perms, player, "wizard").unwrap();
        ws.set_player_flag(&perms, player, true).unwrap();
        let doomed = ws.create_object(&perms, root, Obj::mk_id(0)).unwrap();
        let ball = ws.create_object(&perms, root, Obj::mk_id(0)).unwrap();
        ws.set_name(&perms, ball, "ball").unwrap();
        ws.move_object(&perms, ball, player).unwrap();
        ws.recycle_object(&perms, doomed).unwrap();

        ws.define_property(
            &perms,
            root,
            &Symbol::mk("junk"),
            Obj::mk_id(0),
            PropFlag::rc(),
            v_list(&[
                v_int(1),
                v_float(2.5),
                v_str("three"),
                v_err(ErrorCode::E_PERM),
                v_list(&[v_int(4)]),
            ]),
        )
        .unwrap();
        ws.add_verb(
            &perms,
            root,
            vec![Symbol::mk("l*ook"), Symbol::mk("examine")],
            Obj::mk_id(0),
            VerbFlag::rxd(),
            VerbArgsSpec::this_none_this(),
        )
        .unwrap();
        let program = loam_compiler::compile("return this.junk;").unwrap();
        ws.set_verb_program(&perms, root, 0, program).unwrap();
        // A second verb with no code at all.
        ws.add_verb(
            &perms,
            root,
            vec![Symbol::mk("poke")],
            Obj::mk_id(0),
            VerbFlag::rx(),
            VerbArgsSpec::none_none_none(),
        )
        .unwrap();
        ws.snapshot()
    }

    #[test]
    fn test_roundtrip_through_text() {
        let snapshot = fixture_snapshot();
        let td = snapshot_to_textdump(&snapshot);
        let mut out = Vec::new();
        TextdumpWriter::new(&mut out).write_textdump(&td).unwrap();

        let mut reader = TextdumpReader::new(BufReader::new(&out[..])).unwrap();
        let td2 = reader.read_textdump().unwrap();
        let snapshot2 = textdump_to_snapshot(&td2).unwrap();
        assert_eq!(snapshot, snapshot2);
    }

    #[test]
    fn test_recycled_gap_survives() {
        let snapshot = fixture_snapshot();
        let td = snapshot_to_textdump(&snapshot);
        assert_eq!(td.recycled, vec![Obj::mk_id(2)]);
        let snapshot2 = textdump_to_snapshot(&td).unwrap();
        assert_eq!(snapshot2.max_object, snapshot.max_object);
        assert!(!snapshot2.objects.contains_key(&Obj::mk_id(2)));
    }

    #[test]
    fn test_users_listed() {
        let td = snapshot_to_textdump(&fixture_snapshot());
        assert_eq!(td.users, vec![Obj::mk_id(1)]);
    }

    #[test]
    fn test_header_count_disagreement_tolerated() {
        let snapshot = fixture_snapshot();
        let td = snapshot_to_textdump(&snapshot);
        let mut out = Vec::new();
        TextdumpWriter::new(&mut out).write_textdump(&td).unwrap();
        // Lie about the object count in the header.
        let text = String::from_utf8(out).unwrap();
        let mut lines: Vec<&str> = text.lines().collect();
        lines[1] = "1";
        let corrupted = lines.join("\n") + "\n";

        let mut reader = TextdumpReader::new(BufReader::new(corrupted.as_bytes())).unwrap();
        let td2 = reader.read_textdump().unwrap();
        assert_eq!(td2.objects.len(), td.objects.len());
    }

    #[test]
    fn test_missing_verb_code_is_empty_program() {
        let snapshot = fixture_snapshot();
        let mut td = snapshot_to_textdump(&snapshot);
        td.programs.clear();
        let snapshot2 = textdump_to_snapshot(&td).unwrap();
        let root = snapshot2.objects.get(&Obj::mk_id(0)).unwrap();
        assert!(root.verbdefs[0].program.is_empty());
    }

    #[test]
    fn test_format1_reads() {
        let snapshot = fixture_snapshot();
        let td = snapshot_to_textdump(&snapshot);
        let mut out = Vec::new();
        TextdumpWriter::new(&mut out).write_textdump(&td).unwrap();
        let text = String::from_utf8(out).unwrap();
        let text = text.replace("Format Version 4", "Format Version 1");
        let mut reader = TextdumpReader::new(BufReader::new(text.as_bytes())).unwrap();
        let td2 = reader.read_textdump().unwrap();
        assert_eq!(td2.version, Some(TextdumpVersion::Format1));
        assert_eq!(td2.objects.len(), td.objects.len());
    }
}
