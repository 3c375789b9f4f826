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

use crate::object::{Object, PropVal, VerbDef, WorldStateSnapshot};
use loam_common::model::{
    ObjFlag, Perms, PropFlag, PropPerms, VerbArgsSpec, VerbFlag, WorldStateError,
};
use loam_common::util::BitEnum;
use loam_compiler::Program;
use loam_var::{NOTHING, Obj, Symbol, Var, v_bool, v_int, v_list, v_none, v_obj, v_objid, v_str,
    v_string};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

/// The shared, mutable state of the world: every object, property, and verb. Reads take the
/// read side of one `RwLock`; every mutating entry point takes the write side, so writers
/// are serialized and readers never observe a torn object.
pub struct WorldState {
    inner: RwLock<Inner>,
}

struct Inner {
    objects: HashMap<Obj, Object>,
    max_object: i64,
}

/// A property resolved through the inheritance chain: the value (possibly supplied by an
/// ancestor), and the owner/flags of the slot that supplied it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProp {
    pub value: Var,
    pub perms: PropPerms,
    /// Whether the queried object's own slot is clear.
    pub is_clear: bool,
    /// The object whose local definition introduced the property.
    pub definer: Obj,
}

/// A verb resolved through the inheritance chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVerb {
    pub definer: Obj,
    pub index: usize,
    pub verbdef: VerbDef,
}

const BUILTIN_PROPERTIES: &[&str] = &[
    "name",
    "owner",
    "location",
    "contents",
    "programmer",
    "wizard",
    "r",
    "w",
    "f",
    "player",
];

impl Inner {
    fn get(&self, obj: Obj) -> Result<&Object, WorldStateError> {
        self.objects
            .get(&obj)
            .ok_or(WorldStateError::ObjectNotFound(obj))
    }

    fn get_mut(&mut self, obj: Obj) -> Result<&mut Object, WorldStateError> {
        self.objects
            .get_mut(&obj)
            .ok_or(WorldStateError::ObjectNotFound(obj))
    }

    /// The object and its ancestors, nearest first. Defensive against parent cycles in a
    /// corrupt database.
    fn ancestry(&self, obj: Obj) -> Vec<Obj> {
        let mut chain = vec![];
        let mut seen = HashSet::new();
        let mut cur = obj;
        while cur.is_positive() && seen.insert(cur) {
            chain.push(cur);
            cur = match self.objects.get(&cur) {
                Some(o) => o.parent,
                None => break,
            };
        }
        chain
    }

    fn descendants(&self, obj: Obj) -> Vec<Obj> {
        let mut result = vec![];
        let mut queue = match self.objects.get(&obj) {
            Some(o) => o.children.clone(),
            None => return result,
        };
        while let Some(c) = queue.pop() {
            if let Some(o) = self.objects.get(&c) {
                queue.extend(o.children.iter().copied());
            }
            result.push(c);
        }
        result
    }

    /// Index of the named slot in `obj`'s property slot list, plus the defining ancestor.
    fn find_slot(&self, obj: Obj, name: &Symbol) -> Option<(usize, Obj)> {
        let mut offset = 0;
        for a in self.ancestry(obj) {
            let Some(ao) = self.objects.get(&a) else {
                break;
            };
            for (i, pd) in ao.propdefs.iter().enumerate() {
                if pd == name {
                    return Some((offset + i, a));
                }
            }
            offset += ao.propdefs.len();
        }
        None
    }

    /// Number of slots contributed by ancestors strictly above `of` in `obj`'s slot list,
    /// i.e. the offset at which `of`'s own definitions start.
    fn slot_offset_of(&self, obj: Obj, of: Obj) -> usize {
        let mut offset = 0;
        for a in self.ancestry(obj) {
            if a == of {
                return offset;
            }
            if let Some(ao) = self.objects.get(&a) {
                offset += ao.propdefs.len();
            }
        }
        offset
    }

    fn resolve_property(&self, obj: Obj, name: &Symbol) -> Result<ResolvedProp, WorldStateError> {
        let (idx, definer) = self
            .find_slot(obj, name)
            .ok_or_else(|| WorldStateError::PropertyNotFound(obj, name.to_string()))?;
        let o = self.get(obj)?;
        let own_slot = o.propvals.get(idx);
        let is_clear = own_slot.map(|s| s.is_clear).unwrap_or(true);
        // Permission checks always consult the queried object's own slot, even when a
        // clear slot defers the value itself to an ancestor: a descendant's slot can be
        // chowned independently of where the value comes from.
        let own_perms = own_slot.map(|s| PropPerms::new(s.owner, s.flags));
        // Walk ancestors for the first non-clear slot; definition order within an object
        // never matters here, only parent order.
        for a in self.ancestry(obj) {
            let Some((aidx, _)) = self.find_slot(a, name) else {
                break;
            };
            let Some(aslot) = self.get(a)?.propvals.get(aidx) else {
                continue;
            };
            if !aslot.is_clear || a == definer {
                return Ok(ResolvedProp {
                    value: aslot.value.clone(),
                    perms: own_perms
                        .unwrap_or_else(|| PropPerms::new(aslot.owner, aslot.flags)),
                    is_clear,
                    definer,
                });
            }
        }
        Err(WorldStateError::PropertyNotFound(obj, name.to_string()))
    }

    fn resolve_verb(
        &self,
        obj: Obj,
        name: &str,
        command: Option<&VerbArgsSpec>,
    ) -> Result<ResolvedVerb, WorldStateError> {
        for a in self.ancestry(obj) {
            let ao = self.get(a)?;
            for (i, vd) in ao.verbdefs.iter().enumerate() {
                if !vd.matches_name(name) {
                    continue;
                }
                if let Some(parsed) = command {
                    if !vd.argspec.matches(parsed) {
                        continue;
                    }
                }
                return Ok(ResolvedVerb {
                    definer: a,
                    index: i,
                    verbdef: vd.clone(),
                });
            }
        }
        Err(WorldStateError::VerbNotFound(obj, name.to_string()))
    }

    /// Rebuild the inherited (tail) region of `obj`'s slots against a new ancestor chain.
    /// Local slots are preserved; everything inherited resets to clear.
    fn rebuild_inherited_slots(&mut self, obj: Obj, old_tail: usize) {
        let (local_len, owner) = {
            let o = self.objects.get(&obj).expect("rebuilding missing object");
            (o.propvals.len().saturating_sub(old_tail), o.owner)
        };
        let parent = self.objects.get(&obj).unwrap().parent;
        let new_tail: Vec<PropVal> = if parent.is_positive() {
            self.objects
                .get(&parent)
                .map(|p| {
                    p.propvals
                        .iter()
                        .map(|template| PropVal {
                            value: v_none(),
                            owner: if template.flags.contains(PropFlag::Chown) {
                                owner
                            } else {
                                template.owner
                            },
                            flags: template.flags,
                            is_clear: true,
                        })
                        .collect()
                })
                .unwrap_or_default()
        } else {
            vec![]
        };
        let o = self.objects.get_mut(&obj).unwrap();
        o.propvals.truncate(local_len);
        o.propvals.extend(new_tail);
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                objects: HashMap::new(),
                max_object: -1,
            }),
        }
    }

    #[must_use]
    pub fn from_snapshot(snapshot: WorldStateSnapshot) -> Self {
        let ws = Self::new();
        ws.load_snapshot(snapshot);
        ws
    }

    /// Replace the entire world with the given snapshot's contents.
    pub fn load_snapshot(&self, snapshot: WorldStateSnapshot) {
        let mut inner = self.inner.write().unwrap();
        inner.max_object = snapshot
            .max_object
            .max(snapshot.objects.keys().map(|o| o.id()).max().unwrap_or(-1));
        inner.objects = snapshot.objects.into_iter().collect();
    }

    /// A structural copy of the whole database, for checkpoints and textdump export.
    #[must_use]
    pub fn snapshot(&self) -> WorldStateSnapshot {
        let inner = self.inner.read().unwrap();
        WorldStateSnapshot {
            objects: inner
                .objects
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect::<BTreeMap<_, _>>(),
            max_object: inner.max_object,
        }
    }

    #[must_use]
    pub fn valid(&self, obj: Obj) -> bool {
        self.inner.read().unwrap().objects.contains_key(&obj)
    }

    #[must_use]
    pub fn max_object(&self) -> Obj {
        Obj::mk_id(self.inner.read().unwrap().max_object)
    }

    /// The effective permission record for an acting object.
    #[must_use]
    pub fn perms_of(&self, who: Obj) -> Perms {
        let flags = self
            .inner
            .read()
            .unwrap()
            .get(who)
            .map(|o| o.flags)
            .unwrap_or_default();
        Perms::new(who, flags)
    }

    pub fn name_of(&self, obj: Obj) -> Result<String, WorldStateError> {
        Ok(self.inner.read().unwrap().get(obj)?.name.clone())
    }

    pub fn owner_of(&self, obj: Obj) -> Result<Obj, WorldStateError> {
        Ok(self.inner.read().unwrap().get(obj)?.owner)
    }

    pub fn parent_of(&self, obj: Obj) -> Result<Obj, WorldStateError> {
        Ok(self.inner.read().unwrap().get(obj)?.parent)
    }

    pub fn children_of(&self, obj: Obj) -> Result<Vec<Obj>, WorldStateError> {
        Ok(self.inner.read().unwrap().get(obj)?.children.clone())
    }

    pub fn location_of(&self, obj: Obj) -> Result<Obj, WorldStateError> {
        Ok(self.inner.read().unwrap().get(obj)?.location)
    }

    pub fn contents_of(&self, obj: Obj) -> Result<Vec<Obj>, WorldStateError> {
        Ok(self.inner.read().unwrap().get(obj)?.contents.clone())
    }

    pub fn flags_of(&self, obj: Obj) -> Result<BitEnum<ObjFlag>, WorldStateError> {
        Ok(self.inner.read().unwrap().get(obj)?.flags)
    }

    /// All objects carrying the player (user) flag.
    #[must_use]
    pub fn players(&self) -> Vec<Obj> {
        let inner = self.inner.read().unwrap();
        let mut players: Vec<Obj> = inner
            .objects
            .values()
            .filter(|o| o.flags.contains(ObjFlag::User))
            .map(|o| o.id)
            .collect();
        players.sort();
        players
    }

    #[must_use]
    pub fn is_player(&self, obj: Obj) -> bool {
        self.flags_of(obj)
            .map(|f| f.contains(ObjFlag::User))
            .unwrap_or(false)
    }

    /// Case-insensitive aliases for an object: its name plus the `aliases` list property,
    /// used by the command-line object matcher.
    pub fn names_of(&self, obj: Obj) -> Result<(String, Vec<String>), WorldStateError> {
        let inner = self.inner.read().unwrap();
        let name = inner.get(obj)?.name.clone();
        let mut aliases = vec![];
        if let Ok(resolved) = inner.resolve_property(obj, &Symbol::mk("aliases")) {
            if let Some(l) = resolved.value.as_list() {
                for a in l.iter() {
                    if let Some(s) = a.as_string() {
                        aliases.push(s.as_str().to_string());
                    }
                }
            }
        }
        Ok((name, aliases))
    }

    // ------------------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------------------

    /// Read a property value, enforcing read permission. Built-in attributes (`name`,
    /// `owner`, `location`, ...) resolve before stored properties and are readable by all.
    pub fn retrieve_property(
        &self,
        perms: &Perms,
        obj: Obj,
        name: &Symbol,
    ) -> Result<Var, WorldStateError> {
        if let Some(v) = self.builtin_property(obj, name)? {
            return Ok(v);
        }
        let inner = self.inner.read().unwrap();
        let resolved = inner.resolve_property(obj, name)?;
        perms.check_property_allows(&resolved.perms, PropFlag::Read)?;
        Ok(resolved.value)
    }

    fn builtin_property(&self, obj: Obj, name: &Symbol) -> Result<Option<Var>, WorldStateError> {
        let inner = self.inner.read().unwrap();
        let o = inner.get(obj)?;
        let v = match name.to_lowercase().as_str() {
            "name" => v_string(o.name.clone()),
            "owner" => v_obj(o.owner),
            "location" => v_obj(o.location),
            "contents" => v_list(&o.contents.iter().map(|c| v_obj(*c)).collect::<Vec<_>>()),
            "programmer" => v_bool(o.flags.contains(ObjFlag::Programmer)),
            "wizard" => v_bool(o.flags.contains(ObjFlag::Wizard)),
            "player" => v_bool(o.flags.contains(ObjFlag::User)),
            "r" => v_bool(o.flags.contains(ObjFlag::Read)),
            "w" => v_bool(o.flags.contains(ObjFlag::Write)),
            "f" => v_bool(o.flags.contains(ObjFlag::Fertile)),
            _ => return Ok(None),
        };
        Ok(Some(v))
    }

    /// Resolve without a permission check, for the inheritance-aware internals (matching,
    /// `property_info`, the interpreter's setuid machinery).
    pub fn resolve_property(
        &self,
        obj: Obj,
        name: &Symbol,
    ) -> Result<ResolvedProp, WorldStateError> {
        self.inner.read().unwrap().resolve_property(obj, name)
    }

    /// Write a property value on the object's own slot, enforcing write permission against
    /// the resolved definition.
    pub fn update_property(
        &self,
        perms: &Perms,
        obj: Obj,
        name: &Symbol,
        value: Var,
    ) -> Result<(), WorldStateError> {
        if BUILTIN_PROPERTIES.contains(&name.to_lowercase().as_str()) {
            return self.update_builtin_property(perms, obj, name, value);
        }
        let mut inner = self.inner.write().unwrap();
        let resolved = inner.resolve_property(obj, name)?;
        perms.check_property_allows(&resolved.perms, PropFlag::Write)?;
        let (idx, _) = inner.find_slot(obj, name).unwrap();
        let o = inner.get_mut(obj)?;
        if idx >= o.propvals.len() {
            return Err(WorldStateError::DatabaseError(format!(
                "slot list out of sync on {obj}"
            )));
        }
        o.propvals[idx].value = value;
        o.propvals[idx].is_clear = false;
        Ok(())
    }

    fn update_builtin_property(
        &self,
        perms: &Perms,
        obj: Obj,
        name: &Symbol,
        value: Var,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let owner = inner.get(obj)?.owner;
        match name.to_lowercase().as_str() {
            "name" => {
                let is_player = inner.get(obj)?.flags.contains(ObjFlag::User);
                if is_player {
                    perms.check_wizard()?;
                } else {
                    perms.check_obj_owner_perms(owner)?;
                }
                let Some(s) = value.as_string() else {
                    return Err(WorldStateError::PropertyPermissionDenied);
                };
                inner.get_mut(obj)?.name = s.as_str().to_string();
                Ok(())
            }
            "owner" => {
                perms.check_wizard()?;
                let Some(new_owner) = value.as_object() else {
                    return Err(WorldStateError::PropertyPermissionDenied);
                };
                inner.get_mut(obj)?.owner = new_owner;
                Ok(())
            }
            "r" | "w" | "f" => {
                perms.check_obj_owner_perms(owner)?;
                let flag = match name.to_lowercase().as_str() {
                    "r" => ObjFlag::Read,
                    "w" => ObjFlag::Write,
                    _ => ObjFlag::Fertile,
                };
                let o = inner.get_mut(obj)?;
                if value.is_true() {
                    o.flags.set(flag);
                } else {
                    o.flags.clear(flag);
                }
                Ok(())
            }
            "programmer" | "wizard" => {
                perms.check_wizard()?;
                let flag = if name.to_lowercase() == "programmer" {
                    ObjFlag::Programmer
                } else {
                    ObjFlag::Wizard
                };
                let o = inner.get_mut(obj)?;
                if value.is_true() {
                    o.flags.set(flag);
                } else {
                    o.flags.clear(flag);
                }
                Ok(())
            }
            // location/contents/player move through move(), set_player_flag().
            _ => Err(WorldStateError::PropertyPermissionDenied),
        }
    }

    /// Define a new property on `definer`, giving every descendant a clear slot.
    pub fn define_property(
        &self,
        perms: &Perms,
        definer: Obj,
        name: &Symbol,
        prop_owner: Obj,
        flags: BitEnum<PropFlag>,
        value: Var,
    ) -> Result<(), WorldStateError> {
        if BUILTIN_PROPERTIES.contains(&name.to_lowercase().as_str()) {
            return Err(WorldStateError::DuplicatePropertyDefinition(
                definer,
                name.to_string(),
            ));
        }
        let mut inner = self.inner.write().unwrap();
        {
            let d = inner.get(definer)?;
            perms.check_object_allows(d.owner, d.flags, ObjFlag::Write)?;
        }
        // The name must be fresh across ancestors and descendants both.
        if inner.find_slot(definer, name).is_some() {
            return Err(WorldStateError::DuplicatePropertyDefinition(
                definer,
                name.to_string(),
            ));
        }
        for d in inner.descendants(definer) {
            if inner.get(d)?.propdefs.iter().any(|p| p == name) {
                return Err(WorldStateError::DuplicatePropertyDefinition(
                    d,
                    name.to_string(),
                ));
            }
        }
        let local_idx = {
            let o = inner.get_mut(definer)?;
            o.propdefs.push(name.clone());
            let idx = o.propdefs.len() - 1;
            o.propvals.insert(
                idx,
                PropVal {
                    value,
                    owner: prop_owner,
                    flags,
                    is_clear: false,
                },
            );
            idx
        };
        for d in inner.descendants(definer) {
            let offset = inner.slot_offset_of(d, definer);
            let child_owner = inner.get(d)?.owner;
            let o = inner.get_mut(d)?;
            let insert_at = (offset + local_idx).min(o.propvals.len());
            o.propvals.insert(
                insert_at,
                PropVal {
                    value: v_none(),
                    owner: if flags.contains(PropFlag::Chown) {
                        child_owner
                    } else {
                        prop_owner
                    },
                    flags,
                    is_clear: true,
                },
            );
        }
        Ok(())
    }

    /// Remove a property definition; only legal on its definer, and removes the slot from
    /// every descendant.
    pub fn delete_property(
        &self,
        perms: &Perms,
        obj: Obj,
        name: &Symbol,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let local_idx = {
            let o = inner.get(obj)?;
            perms.check_object_allows(o.owner, o.flags, ObjFlag::Write)?;
            o.propdefs
                .iter()
                .position(|p| p == name)
                .ok_or_else(|| WorldStateError::PropertyNotFound(obj, name.to_string()))?
        };
        {
            let o = inner.get_mut(obj)?;
            o.propdefs.remove(local_idx);
            if local_idx < o.propvals.len() {
                o.propvals.remove(local_idx);
            }
        }
        for d in inner.descendants(obj) {
            let offset = inner.slot_offset_of(d, obj);
            let o = inner.get_mut(d)?;
            let at = offset + local_idx;
            if at < o.propvals.len() {
                o.propvals.remove(at);
            }
        }
        Ok(())
    }

    pub fn property_info(
        &self,
        perms: &Perms,
        obj: Obj,
        name: &Symbol,
    ) -> Result<PropPerms, WorldStateError> {
        let inner = self.inner.read().unwrap();
        let resolved = inner.resolve_property(obj, name)?;
        perms.check_property_allows(&resolved.perms, PropFlag::Read)?;
        Ok(resolved.perms)
    }

    pub fn set_property_info(
        &self,
        perms: &Perms,
        obj: Obj,
        name: &Symbol,
        new_owner: Option<Obj>,
        new_flags: Option<BitEnum<PropFlag>>,
        new_name: Option<Symbol>,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let resolved = inner.resolve_property(obj, name)?;
        perms.check_property_allows(&resolved.perms, PropFlag::Write)?;
        if let Some(new_owner) = new_owner {
            if new_owner != perms.who {
                perms.check_wizard()?;
            }
        }
        let (idx, definer) = inner.find_slot(obj, name).unwrap();
        if let Some(new_name) = &new_name {
            // Renames only make sense on the defining object.
            if definer != obj {
                return Err(WorldStateError::PropertyPermissionDenied);
            }
            if inner.find_slot(obj, new_name).is_some() {
                return Err(WorldStateError::DuplicatePropertyDefinition(
                    obj,
                    new_name.to_string(),
                ));
            }
            let local_idx = idx;
            let o = inner.get_mut(obj)?;
            o.propdefs[local_idx] = new_name.clone();
        }
        let o = inner.get_mut(obj)?;
        if let Some(slot) = o.propvals.get_mut(idx) {
            if let Some(new_owner) = new_owner {
                slot.owner = new_owner;
            }
            if let Some(new_flags) = new_flags {
                slot.flags = new_flags;
            }
        }
        Ok(())
    }

    pub fn is_clear_property(
        &self,
        perms: &Perms,
        obj: Obj,
        name: &Symbol,
    ) -> Result<bool, WorldStateError> {
        let inner = self.inner.read().unwrap();
        let resolved = inner.resolve_property(obj, name)?;
        perms.check_property_allows(&resolved.perms, PropFlag::Read)?;
        Ok(resolved.is_clear)
    }

    /// Re-clear the object's own slot so it inherits again. Illegal on the definer itself.
    pub fn clear_property(
        &self,
        perms: &Perms,
        obj: Obj,
        name: &Symbol,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let resolved = inner.resolve_property(obj, name)?;
        perms.check_property_allows(&resolved.perms, PropFlag::Write)?;
        let (idx, definer) = inner.find_slot(obj, name).unwrap();
        if definer == obj {
            return Err(WorldStateError::PropertyPermissionDenied);
        }
        let o = inner.get_mut(obj)?;
        if let Some(slot) = o.propvals.get_mut(idx) {
            slot.is_clear = true;
            slot.value = v_none();
        }
        Ok(())
    }

    /// Locally-defined property names, in definition order.
    pub fn properties(&self, perms: &Perms, obj: Obj) -> Result<Vec<String>, WorldStateError> {
        let inner = self.inner.read().unwrap();
        let o = inner.get(obj)?;
        perms.check_object_allows(o.owner, o.flags, ObjFlag::Read)?;
        Ok(o.propdefs.iter().map(|p| p.to_string()).collect())
    }

    // ------------------------------------------------------------------------------------
    // Verbs
    // ------------------------------------------------------------------------------------

    /// Resolve a verb through inheritance, optionally constrained by a parsed command's
    /// argument spec.
    pub fn resolve_verb(
        &self,
        obj: Obj,
        name: &str,
        command: Option<&VerbArgsSpec>,
    ) -> Result<ResolvedVerb, WorldStateError> {
        self.inner.read().unwrap().resolve_verb(obj, name, command)
    }

    /// Find a locally-defined verb by name or 1-based index string, the way the verb
    /// management built-ins address them.
    pub fn local_verb_index(&self, obj: Obj, name: &str) -> Result<usize, WorldStateError> {
        let inner = self.inner.read().unwrap();
        let o = inner.get(obj)?;
        if let Ok(n) = name.parse::<usize>() {
            if n >= 1 && n <= o.verbdefs.len() {
                return Ok(n - 1);
            }
            return Err(WorldStateError::VerbNotFound(obj, name.to_string()));
        }
        o.verbdefs
            .iter()
            .position(|vd| vd.matches_name(name))
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, name.to_string()))
    }

    pub fn get_verbdef(&self, obj: Obj, index: usize) -> Result<VerbDef, WorldStateError> {
        let inner = self.inner.read().unwrap();
        let o = inner.get(obj)?;
        o.verbdefs
            .get(index)
            .cloned()
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, format!("{}", index + 1)))
    }

    /// All verb name-strings on the object itself (not inherited).
    pub fn verbs(&self, perms: &Perms, obj: Obj) -> Result<Vec<String>, WorldStateError> {
        let inner = self.inner.read().unwrap();
        let o = inner.get(obj)?;
        perms.check_object_allows(o.owner, o.flags, ObjFlag::Read)?;
        Ok(o.verbdefs.iter().map(|vd| vd.names_string()).collect())
    }

    pub fn add_verb(
        &self,
        perms: &Perms,
        obj: Obj,
        names: Vec<Symbol>,
        owner: Obj,
        flags: BitEnum<VerbFlag>,
        argspec: VerbArgsSpec,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let o = inner.get(obj)?;
        perms.check_object_allows(o.owner, o.flags, ObjFlag::Write)?;
        let o = inner.get_mut(obj)?;
        o.verbdefs.push(VerbDef {
            names,
            owner,
            flags,
            argspec,
            program: Program::empty(),
        });
        Ok(())
    }

    pub fn delete_verb(
        &self,
        perms: &Perms,
        obj: Obj,
        index: usize,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let o = inner.get(obj)?;
        let vd = o
            .verbdefs
            .get(index)
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, format!("{}", index + 1)))?;
        perms.check_verb_allows(vd.owner, vd.flags, VerbFlag::Write)?;
        inner.get_mut(obj)?.verbdefs.remove(index);
        Ok(())
    }

    pub fn set_verb_info(
        &self,
        perms: &Perms,
        obj: Obj,
        index: usize,
        owner: Option<Obj>,
        flags: Option<BitEnum<VerbFlag>>,
        names: Option<Vec<Symbol>>,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let o = inner.get(obj)?;
        let vd = o
            .verbdefs
            .get(index)
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, format!("{}", index + 1)))?;
        perms.check_verb_allows(vd.owner, vd.flags, VerbFlag::Write)?;
        if let Some(new_owner) = owner {
            if new_owner != perms.who {
                perms.check_wizard()?;
            }
        }
        let vd = &mut inner.get_mut(obj)?.verbdefs[index];
        if let Some(owner) = owner {
            vd.owner = owner;
        }
        if let Some(flags) = flags {
            vd.flags = flags;
        }
        if let Some(names) = names {
            vd.names = names;
        }
        Ok(())
    }

    pub fn set_verb_args(
        &self,
        perms: &Perms,
        obj: Obj,
        index: usize,
        argspec: VerbArgsSpec,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let o = inner.get(obj)?;
        let vd = o
            .verbdefs
            .get(index)
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, format!("{}", index + 1)))?;
        perms.check_verb_allows(vd.owner, vd.flags, VerbFlag::Write)?;
        inner.get_mut(obj)?.verbdefs[index].argspec = argspec;
        Ok(())
    }

    pub fn set_verb_program(
        &self,
        perms: &Perms,
        obj: Obj,
        index: usize,
        program: Program,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let o = inner.get(obj)?;
        let vd = o
            .verbdefs
            .get(index)
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, format!("{}", index + 1)))?;
        perms.check_verb_allows(vd.owner, vd.flags, VerbFlag::Write)?;
        inner.get_mut(obj)?.verbdefs[index].program = program;
        Ok(())
    }

    /// Read the source of a verb, enforcing the read bit.
    pub fn verb_program(
        &self,
        perms: &Perms,
        obj: Obj,
        index: usize,
    ) -> Result<Program, WorldStateError> {
        let inner = self.inner.read().unwrap();
        let o = inner.get(obj)?;
        let vd = o
            .verbdefs
            .get(index)
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, format!("{}", index + 1)))?;
        perms.check_verb_allows(vd.owner, vd.flags, VerbFlag::Read)?;
        Ok(vd.program.clone())
    }

    // ------------------------------------------------------------------------------------
    // Object lifecycle
    // ------------------------------------------------------------------------------------

    /// Create a child of `parent`. The parent must be fertile, owned, or the caller a
    /// wizard. Returns the fresh id (lowest unused above `max_object`).
    pub fn create_object(
        &self,
        perms: &Perms,
        parent: Obj,
        owner: Obj,
    ) -> Result<Obj, WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        if parent.is_positive() {
            let p = inner.get(parent)?;
            perms.check_object_allows(p.owner, p.flags, ObjFlag::Fertile)?;
        } else if !parent.is_nothing() {
            return Err(WorldStateError::InvalidParent(parent));
        }
        inner.max_object += 1;
        let id = Obj::mk_id(inner.max_object);
        let mut obj = Object::new(id, parent, owner);
        // An owner of NOTHING means "owns itself", as with player creation.
        if obj.owner.is_nothing() {
            obj.owner = id;
        }
        if parent.is_positive() {
            let new_owner = obj.owner;
            obj.propvals = inner
                .get(parent)?
                .propvals
                .iter()
                .map(|template| PropVal {
                    value: v_none(),
                    owner: if template.flags.contains(PropFlag::Chown) {
                        new_owner
                    } else {
                        template.owner
                    },
                    flags: template.flags,
                    is_clear: true,
                })
                .collect();
            inner.get_mut(parent)?.children.push(id);
        }
        inner.objects.insert(id, obj);
        Ok(id)
    }

    /// Destroy an object. Contents are expelled to nowhere, children are reparented to the
    /// victim's parent, inbound references are nullified. Ids are never reused.
    pub fn recycle_object(&self, perms: &Perms, obj: Obj) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let (owner, parent, location, contents, children) = {
            let o = inner.get(obj)?;
            (
                o.owner,
                o.parent,
                o.location,
                o.contents.clone(),
                o.children.clone(),
            )
        };
        perms.check_obj_owner_perms(owner)?;
        for c in contents {
            if let Ok(co) = inner.get_mut(c) {
                co.location = NOTHING;
            }
        }
        // Reparenting the children swaps the victim's slots out of their inherited region.
        let victim_tail = inner.get(obj)?.propvals.len();
        for c in children {
            let old_tail = victim_tail;
            if let Ok(co) = inner.get_mut(c) {
                co.parent = parent;
            }
            inner.rebuild_inherited_slots(c, old_tail);
            if parent.is_positive() {
                if let Ok(po) = inner.get_mut(parent) {
                    po.children.push(c);
                }
            }
        }
        if parent.is_positive() {
            if let Ok(po) = inner.get_mut(parent) {
                po.children.retain(|c| *c != obj);
            }
        }
        if location.is_positive() {
            if let Ok(lo) = inner.get_mut(location) {
                lo.contents.retain(|c| *c != obj);
            }
        }
        inner.objects.remove(&obj);
        Ok(())
    }

    /// Mechanical relocation with cycle protection. The `accept`/`exitfunc`/`enterfunc`
    /// protocol happens above, in the `move` built-in.
    pub fn move_object(&self, perms: &Perms, what: Obj, to: Obj) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let (owner, old_location) = {
            let o = inner.get(what)?;
            (o.owner, o.location)
        };
        perms.check_obj_owner_perms(owner)?;
        if !to.is_nothing() {
            inner.get(to)?;
            // Walk up from the destination; landing on `what` means a containment loop.
            let mut cur = to;
            let mut seen = HashSet::new();
            while cur.is_positive() && seen.insert(cur) {
                if cur == what {
                    return Err(WorldStateError::RecursiveMove(what, to));
                }
                cur = inner.get(cur)?.location;
            }
        }
        if old_location == to {
            return Ok(());
        }
        if old_location.is_positive() {
            if let Ok(lo) = inner.get_mut(old_location) {
                lo.contents.retain(|c| *c != what);
            }
        }
        inner.get_mut(what)?.location = to;
        if to.is_positive() {
            inner.get_mut(to)?.contents.push(what);
        }
        Ok(())
    }

    /// Change an object's parent, rebuilding the inherited property slots of the object and
    /// all its descendants.
    pub fn chparent(&self, perms: &Perms, obj: Obj, new_parent: Obj) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        {
            let o = inner.get(obj)?;
            perms.check_obj_owner_perms(o.owner)?;
        }
        if !new_parent.is_nothing() {
            let p = inner.get(new_parent)?;
            perms.check_object_allows(p.owner, p.flags, ObjFlag::Fertile)?;
            if inner.ancestry(new_parent).contains(&obj) {
                return Err(WorldStateError::RecursiveMove(obj, new_parent));
            }
        }
        // No property name defined on obj or below may collide with the new ancestry.
        let new_ancestry_names: HashSet<String> = inner
            .ancestry(new_parent)
            .iter()
            .filter_map(|a| inner.objects.get(a))
            .flat_map(|a| a.propdefs.iter().map(|p| p.to_lowercase()))
            .collect();
        let mut family = vec![obj];
        family.extend(inner.descendants(obj));
        for d in &family {
            for pd in &inner.get(*d)?.propdefs {
                if new_ancestry_names.contains(&pd.to_lowercase()) {
                    return Err(WorldStateError::DuplicatePropertyDefinition(
                        *d,
                        pd.to_string(),
                    ));
                }
            }
        }
        let old_parent = inner.get(obj)?.parent;
        let old_tail = if old_parent.is_positive() {
            inner
                .objects
                .get(&old_parent)
                .map(|p| p.propvals.len())
                .unwrap_or(0)
        } else {
            0
        };
        if old_parent.is_positive() {
            if let Ok(po) = inner.get_mut(old_parent) {
                po.children.retain(|c| *c != obj);
            }
        }
        inner.get_mut(obj)?.parent = new_parent;
        if new_parent.is_positive() {
            inner.get_mut(new_parent)?.children.push(obj);
        }
        // Rebuild depth-first so each child rebuilds against an already-rebuilt parent.
        inner.rebuild_inherited_slots(obj, old_tail);
        let mut queue: Vec<Obj> = inner.get(obj)?.children.clone();
        while let Some(c) = queue.pop() {
            let Some(co) = inner.objects.get(&c) else {
                continue;
            };
            // The child's old tail is everything beyond its local defs; its parent's slot
            // count may have changed, so recompute from its own layout.
            let c_old_tail = co.propvals.len().saturating_sub(co.propdefs.len());
            inner.rebuild_inherited_slots(c, c_old_tail);
            queue.extend(inner.objects.get(&c).map(|o| o.children.clone()).unwrap_or_default());
        }
        Ok(())
    }

    /// Change ownership. Owners may relinquish to themselves only; wizards to anyone.
    pub fn chown(&self, perms: &Perms, obj: Obj, new_owner: Obj) -> Result<(), WorldStateError> {
        let mut inner = self.inner.write().unwrap();
        let owner = inner.get(obj)?.owner;
        if !perms.is_wizard() {
            perms.check_obj_owner_perms(owner)?;
            if new_owner != perms.who {
                return Err(WorldStateError::ObjectPermissionDenied);
            }
        }
        inner.get_mut(obj)?.owner = new_owner;
        Ok(())
    }

    pub fn set_name(&self, perms: &Perms, obj: Obj, name: &str) -> Result<(), WorldStateError> {
        self.update_builtin_property(perms, obj, &Symbol::mk("name"), v_str(name))
    }

    /// Toggle the player (user) flag; wizard-only.
    pub fn set_player_flag(
        &self,
        perms: &Perms,
        obj: Obj,
        is_player: bool,
    ) -> Result<(), WorldStateError> {
        perms.check_wizard()?;
        let mut inner = self.inner.write().unwrap();
        let o = inner.get_mut(obj)?;
        if is_player {
            o.flags.set(ObjFlag::User);
        } else {
            o.flags.clear(ObjFlag::User);
        }
        Ok(())
    }

    /// Raw object access for loaders (textdump import); bypasses all checks.
    pub fn insert_object_raw(&self, object: Object) {
        let mut inner = self.inner.write().unwrap();
        let id = object.id.id();
        if id > inner.max_object {
            inner.max_object = id;
        }
        inner.objects.insert(object.id, object);
    }

    /// Approximate in-memory footprint, for `memory_usage()`.
    #[must_use]
    pub fn memory_usage(&self) -> Var {
        let inner = self.inner.read().unwrap();
        let objects = inner.objects.len() as i64;
        let verbs: i64 = inner.objects.values().map(|o| o.verbdefs.len() as i64).sum();
        let props: i64 = inner.objects.values().map(|o| o.propvals.len() as i64).sum();
        v_list(&[
            v_list(&[v_str("objects"), v_int(objects)]),
            v_list(&[v_str("verbs"), v_int(verbs)]),
            v_list(&[v_str("properties"), v_int(props)]),
            v_list(&[v_str("max_object"), v_objid(inner.max_object)]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_var::v_str;
    use pretty_assertions::assert_eq;

    fn wizard_perms() -> Perms {
        Perms::new(Obj::mk_id(0), BitEnum::new_with(ObjFlag::Wizard))
    }

    /// Build root -> thing, both wizard-owned, fertile root.
    fn test_world() -> (WorldState, Obj, Obj) {
        let ws = WorldState::new();
        let perms = wizard_perms();
        let root = ws.create_object(&perms, NOTHING, Obj::mk_id(0)).unwrap();
        let thing = ws.create_object(&perms, root, Obj::mk_id(0)).unwrap();
        (ws, root, thing)
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let (ws, root, thing) = test_world();
        assert_eq!(root, Obj::mk_id(0));
        assert_eq!(thing, Obj::mk_id(1));
        assert_eq!(ws.max_object(), Obj::mk_id(1));
        assert_eq!(ws.parent_of(thing).unwrap(), root);
        assert_eq!(ws.children_of(root).unwrap(), vec![thing]);
    }

    #[test]
    fn test_property_inheritance_and_clear() {
        let (ws, root, thing) = test_world();
        let perms = wizard_perms();
        let name = Symbol::mk("description");
        ws.define_property(&perms, root, &name, Obj::mk_id(0), PropFlag::rc(), v_str("dusty"))
            .unwrap();
        // The child inherits through a clear slot.
        assert!(ws.is_clear_property(&perms, thing, &name).unwrap());
        assert_eq!(
            ws.retrieve_property(&perms, thing, &name).unwrap(),
            v_str("dusty")
        );
        // Writing on the child shadows; clearing restores inheritance.
        ws.update_property(&perms, thing, &name, v_str("shiny"))
            .unwrap();
        assert_eq!(
            ws.retrieve_property(&perms, thing, &name).unwrap(),
            v_str("shiny")
        );
        assert_eq!(
            ws.retrieve_property(&perms, root, &name).unwrap(),
            v_str("dusty")
        );
        ws.clear_property(&perms, thing, &name).unwrap();
        assert_eq!(
            ws.retrieve_property(&perms, thing, &name).unwrap(),
            v_str("dusty")
        );
        // Clearing on the definer is refused.
        assert!(ws.clear_property(&perms, root, &name).is_err());
    }

    #[test]
    fn test_local_definition_shadows_ancestor() {
        let (ws, root, thing) = test_world();
        let perms = wizard_perms();
        // Another root property first, so the child's slot offsets are non-trivial.
        ws.define_property(&perms, root, &Symbol::mk("size"), Obj::mk_id(0), PropFlag::rc(), v_int(1))
            .unwrap();
        let grandchild = ws.create_object(&perms, thing, Obj::mk_id(0)).unwrap();
        ws.define_property(
            &perms,
            thing,
            &Symbol::mk("color"),
            Obj::mk_id(0),
            PropFlag::rc(),
            v_str("red"),
        )
        .unwrap();
        assert_eq!(
            ws.retrieve_property(&perms, grandchild, &Symbol::mk("color"))
                .unwrap(),
            v_str("red")
        );
        assert_eq!(
            ws.retrieve_property(&perms, grandchild, &Symbol::mk("size"))
                .unwrap(),
            v_int(1)
        );
    }

    #[test]
    fn test_duplicate_definition_refused() {
        let (ws, root, thing) = test_world();
        let perms = wizard_perms();
        let name = Symbol::mk("color");
        ws.define_property(&perms, root, &name, Obj::mk_id(0), PropFlag::rc(), v_int(1))
            .unwrap();
        // On a descendant: collides with the inherited slot.
        assert!(
            ws.define_property(&perms, thing, &name, Obj::mk_id(0), PropFlag::rc(), v_int(2))
                .is_err()
        );
        // On an ancestor of a definer: collides downward.
        let name2 = Symbol::mk("shade");
        ws.define_property(&perms, thing, &name2, Obj::mk_id(0), PropFlag::rc(), v_int(1))
            .unwrap();
        assert!(
            ws.define_property(&perms, root, &name2, Obj::mk_id(0), PropFlag::rc(), v_int(2))
                .is_err()
        );
    }

    #[test]
    fn test_delete_property_removes_descendant_slots() {
        let (ws, root, thing) = test_world();
        let perms = wizard_perms();
        let name = Symbol::mk("transient");
        ws.define_property(&perms, root, &name, Obj::mk_id(0), PropFlag::rc(), v_int(9))
            .unwrap();
        assert!(ws.retrieve_property(&perms, thing, &name).is_ok());
        ws.delete_property(&perms, root, &name).unwrap();
        assert!(ws.retrieve_property(&perms, thing, &name).is_err());
        // Deleting from a non-definer fails.
        assert!(ws.delete_property(&perms, thing, &name).is_err());
    }

    #[test]
    fn test_chparent_rebuilds_slots() {
        let ws = WorldState::new();
        let perms = wizard_perms();
        let a = ws.create_object(&perms, NOTHING, Obj::mk_id(0)).unwrap();
        let b = ws.create_object(&perms, NOTHING, Obj::mk_id(0)).unwrap();
        let c = ws.create_object(&perms, a, Obj::mk_id(0)).unwrap();
        ws.define_property(&perms, a, &Symbol::mk("from_a"), Obj::mk_id(0), PropFlag::rc(), v_int(1))
            .unwrap();
        ws.define_property(&perms, b, &Symbol::mk("from_b"), Obj::mk_id(0), PropFlag::rc(), v_int(2))
            .unwrap();
        assert!(ws.retrieve_property(&perms, c, &Symbol::mk("from_a")).is_ok());
        ws.chparent(&perms, c, b).unwrap();
        assert!(ws.retrieve_property(&perms, c, &Symbol::mk("from_a")).is_err());
        assert_eq!(
            ws.retrieve_property(&perms, c, &Symbol::mk("from_b")).unwrap(),
            v_int(2)
        );
        assert_eq!(ws.children_of(a).unwrap(), Vec::<Obj>::new());
        assert_eq!(ws.children_of(b).unwrap(), vec![c]);
    }

    #[test]
    fn test_chparent_cycle_refused() {
        let (ws, root, thing) = test_world();
        let perms = wizard_perms();
        let err = ws.chparent(&perms, root, thing).unwrap_err();
        assert!(matches!(err, WorldStateError::RecursiveMove(_, _)));
    }

    #[test]
    fn test_move_and_cycle() {
        let (ws, root, thing) = test_world();
        let perms = wizard_perms();
        let box_ = ws.create_object(&perms, root, Obj::mk_id(0)).unwrap();
        ws.move_object(&perms, thing, box_).unwrap();
        assert_eq!(ws.location_of(thing).unwrap(), box_);
        assert_eq!(ws.contents_of(box_).unwrap(), vec![thing]);
        let err = ws.move_object(&perms, box_, thing).unwrap_err();
        assert!(matches!(err, WorldStateError::RecursiveMove(_, _)));
        ws.move_object(&perms, thing, NOTHING).unwrap();
        assert_eq!(ws.contents_of(box_).unwrap(), Vec::<Obj>::new());
    }

    #[test]
    fn test_recycle_reparents_children() {
        let (ws, root, thing) = test_world();
        let perms = wizard_perms();
        let grandchild = ws.create_object(&perms, thing, Obj::mk_id(0)).unwrap();
        ws.define_property(&perms, root, &Symbol::mk("p"), Obj::mk_id(0), PropFlag::rc(), v_int(5))
            .unwrap();
        ws.recycle_object(&perms, thing).unwrap();
        assert!(!ws.valid(thing));
        assert_eq!(ws.parent_of(grandchild).unwrap(), root);
        assert_eq!(
            ws.retrieve_property(&perms, grandchild, &Symbol::mk("p")).unwrap(),
            v_int(5)
        );
        // Ids are never reused.
        let next = ws.create_object(&perms, root, Obj::mk_id(0)).unwrap();
        assert_eq!(next.id(), grandchild.id() + 1);
    }

    #[test]
    fn test_permission_enforcement() {
        let (ws, root, _thing) = test_world();
        let wiz = wizard_perms();
        let mortal_obj = ws.create_object(&wiz, root, NOTHING).unwrap();
        let mortal = Perms::new(mortal_obj, BitEnum::new_with(ObjFlag::User));
        let name = Symbol::mk("secret");
        ws.define_property(&wiz, root, &name, Obj::mk_id(0), BitEnum::new(), v_int(7))
            .unwrap();
        // No read bit, not owner: denied.
        assert!(matches!(
            ws.retrieve_property(&mortal, mortal_obj, &name).unwrap_err(),
            WorldStateError::PropertyPermissionDenied
        ));
        assert!(ws.retrieve_property(&wiz, mortal_obj, &name).is_ok());
        // Non-fertile parent refused for mortals.
        let other = ws.create_object(&wiz, NOTHING, Obj::mk_id(0)).unwrap();
        assert!(ws.create_object(&mortal, other, mortal_obj).is_err());
    }

    #[test]
    fn test_clear_slot_keeps_own_perms() {
        // A descendant's clear slot can be chowned independently; permission checks then
        // consult that slot even though the value still comes from the ancestor.
        let ws = WorldState::new();
        let wiz = wizard_perms();
        let a = ws.create_object(&wiz, NOTHING, Obj::mk_id(0)).unwrap();
        let b = ws.create_object(&wiz, a, Obj::mk_id(0)).unwrap();
        let mortal = ws.create_object(&wiz, NOTHING, NOTHING).unwrap();
        ws.chown(&wiz, b, mortal).unwrap();
        let name = Symbol::mk("trim");
        ws.define_property(&wiz, a, &name, Obj::mk_id(0), BitEnum::new(), v_str("plain"))
            .unwrap();
        let mortal_perms = Perms::new(mortal, BitEnum::new_with(ObjFlag::User));
        // b's slot starts owned by the definer's owner: the mortal is denied.
        assert!(
            ws.update_property(&mortal_perms, b, &name, v_str("fancy"))
                .is_err()
        );
        // Chown b's own (still clear) slot to the mortal.
        ws.set_property_info(&wiz, b, &name, Some(mortal), None, None)
            .unwrap();
        assert!(ws.is_clear_property(&wiz, b, &name).unwrap());
        assert_eq!(
            ws.property_info(&mortal_perms, b, &name).unwrap().owner(),
            mortal
        );
        // The write check consults b's slot now, not a's.
        ws.update_property(&mortal_perms, b, &name, v_str("fancy"))
            .unwrap();
        assert_eq!(ws.retrieve_property(&wiz, b, &name).unwrap(), v_str("fancy"));
        assert_eq!(ws.retrieve_property(&wiz, a, &name).unwrap(), v_str("plain"));
    }

    #[test]
    fn test_builtin_properties() {
        let (ws, _root, thing) = test_world();
        let perms = wizard_perms();
        ws.set_name(&perms, thing, "ball").unwrap();
        assert_eq!(
            ws.retrieve_property(&perms, thing, &Symbol::mk("name")).unwrap(),
            v_str("ball")
        );
        assert_eq!(
            ws.retrieve_property(&perms, thing, &Symbol::mk("wizard")).unwrap(),
            v_int(0)
        );
        ws.update_property(&perms, thing, &Symbol::mk("f"), v_int(1))
            .unwrap();
        assert!(ws.flags_of(thing).unwrap().contains(ObjFlag::Fertile));
    }

    #[test]
    fn test_verb_resolution() {
        let (ws, root, thing) = test_world();
        let perms = wizard_perms();
        ws.add_verb(
            &perms,
            root,
            vec![Symbol::mk("l*ook")],
            Obj::mk_id(0),
            VerbFlag::rxd(),
            VerbArgsSpec::this_none_this(),
        )
        .unwrap();
        let resolved = ws.resolve_verb(thing, "look", None).unwrap();
        assert_eq!(resolved.definer, root);
        let resolved = ws.resolve_verb(thing, "l", None).unwrap();
        assert_eq!(resolved.definer, root);
        assert!(ws.resolve_verb(thing, "looks", None).is_err());
        // With a command spec that doesn't match, resolution skips it.
        assert!(
            ws.resolve_verb(thing, "look", Some(&VerbArgsSpec::none_none_none()))
                .is_err()
        );
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let (ws, root, thing) = test_world();
        let perms = wizard_perms();
        ws.define_property(&perms, root, &Symbol::mk("p"), Obj::mk_id(0), PropFlag::rc(), v_int(1))
            .unwrap();
        let snap = ws.snapshot();
        // Mutate, then restore.
        ws.update_property(&perms, thing, &Symbol::mk("p"), v_int(99))
            .unwrap();
        assert_eq!(
            ws.retrieve_property(&perms, thing, &Symbol::mk("p")).unwrap(),
            v_int(99)
        );
        ws.load_snapshot(snap.clone());
        assert_eq!(
            ws.retrieve_property(&perms, thing, &Symbol::mk("p")).unwrap(),
            v_int(1)
        );
        assert_eq!(ws.snapshot(), snap);
    }
}
