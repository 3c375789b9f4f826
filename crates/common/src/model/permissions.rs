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

use crate::model::WorldStateError;
use crate::model::objects::ObjFlag;
use crate::model::props::{PropFlag, PropPerms};
use crate::model::verbs::VerbFlag;
use crate::util::BitEnum;
use loam_var::Obj;

/// Combination of who a set of permissions is for, and what permissions they have.
/// Wizards pass every check.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Perms {
    // "Who" the permissions are for
    pub who: Obj,
    // What flags apply for those permissions.
    pub flags: BitEnum<ObjFlag>,
}

impl Perms {
    #[must_use]
    pub fn new(who: Obj, flags: BitEnum<ObjFlag>) -> Self {
        Self { who, flags }
    }

    #[must_use]
    pub fn is_wizard(&self) -> bool {
        self.flags.contains(ObjFlag::Wizard)
    }

    #[must_use]
    pub fn is_programmer(&self) -> bool {
        self.flags.contains(ObjFlag::Programmer)
    }

    pub fn check_wizard(&self) -> Result<(), WorldStateError> {
        if self.is_wizard() {
            Ok(())
        } else {
            Err(WorldStateError::ObjectPermissionDenied)
        }
    }

    pub fn check_property_allows(
        &self,
        perms: &PropPerms,
        allows: PropFlag,
    ) -> Result<(), WorldStateError> {
        if self.who == perms.owner() || self.is_wizard() {
            return Ok(());
        }
        if !perms.flags().contains(allows) {
            return Err(WorldStateError::PropertyPermissionDenied);
        }
        Ok(())
    }

    pub fn check_verb_allows(
        &self,
        verb_owner: Obj,
        verb_flags: BitEnum<VerbFlag>,
        allows: VerbFlag,
    ) -> Result<(), WorldStateError> {
        if self.who == verb_owner || self.is_wizard() {
            return Ok(());
        }
        if !verb_flags.contains(allows) {
            return Err(WorldStateError::VerbPermissionDenied);
        }
        Ok(())
    }

    pub fn check_object_allows(
        &self,
        object_owner: Obj,
        object_flags: BitEnum<ObjFlag>,
        allows: ObjFlag,
    ) -> Result<(), WorldStateError> {
        if self.who == object_owner || self.is_wizard() {
            return Ok(());
        }
        if !object_flags.contains(allows) {
            return Err(WorldStateError::ObjectPermissionDenied);
        }
        Ok(())
    }

    pub fn check_obj_owner_perms(&self, object_owner: Obj) -> Result<(), WorldStateError> {
        if self.who == object_owner || self.is_wizard() {
            return Ok(());
        }
        Err(WorldStateError::ObjectPermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_var::Obj;

    fn wizard() -> Perms {
        Perms::new(Obj::mk_id(2), BitEnum::new_with(ObjFlag::Wizard))
    }

    fn mortal() -> Perms {
        Perms::new(Obj::mk_id(10), BitEnum::new_with(ObjFlag::User))
    }

    #[test]
    fn test_wizard_bypasses() {
        let pp = PropPerms::new(Obj::mk_id(3), BitEnum::new());
        assert!(wizard().check_property_allows(&pp, PropFlag::Write).is_ok());
        assert!(mortal().check_property_allows(&pp, PropFlag::Write).is_err());
    }

    #[test]
    fn test_owner_bypasses() {
        let pp = PropPerms::new(Obj::mk_id(10), BitEnum::new());
        assert!(mortal().check_property_allows(&pp, PropFlag::Read).is_ok());
    }

    #[test]
    fn test_flag_grants() {
        let pp = PropPerms::new(Obj::mk_id(3), BitEnum::new_with(PropFlag::Read));
        assert!(mortal().check_property_allows(&pp, PropFlag::Read).is_ok());
        assert!(mortal().check_property_allows(&pp, PropFlag::Write).is_err());
    }
}
