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

use crate::worldstate::WorldState;
use loam_common::model::WorldStateError;
use loam_var::{AMBIGUOUS, FAILED_MATCH, NOTHING, Obj};

/// Resolve a command-line object name in the player's vicinity the way the LambdaMOO
/// matcher does: `me`/`here` and `#N` literals first, then names and aliases of things the
/// player carries, then things in the room. An exact name beats a prefix match; two
/// equally-good hits yield `AMBIGUOUS`, none `FAILED_MATCH`.
pub fn match_object(
    ws: &WorldState,
    player: Obj,
    name: &str,
) -> Result<Obj, WorldStateError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(NOTHING);
    }
    if name.eq_ignore_ascii_case("me") {
        return Ok(player);
    }
    if name.eq_ignore_ascii_case("here") {
        return ws.location_of(player);
    }
    if let Some(o) = Obj::parse_literal(name) {
        return Ok(o);
    }

    let mut candidates = vec![];
    if ws.valid(player) {
        candidates.extend(ws.contents_of(player)?);
        let location = ws.location_of(player)?;
        if ws.valid(location) {
            candidates.push(location);
            candidates.extend(ws.contents_of(location)?);
        }
    }

    let mut exact = vec![];
    let mut partial = vec![];
    for c in candidates {
        if c == player {
            continue;
        }
        let Ok((obj_name, aliases)) = ws.names_of(c) else {
            continue;
        };
        let mut names = vec![obj_name];
        names.extend(aliases);
        for n in &names {
            if n.eq_ignore_ascii_case(name) {
                exact.push(c);
                break;
            }
        }
        if exact.last() == Some(&c) {
            continue;
        }
        for n in &names {
            let prefix = n.len() > name.len() && n.get(..name.len()).is_some_and(|p| p.eq_ignore_ascii_case(name));
            if prefix {
                partial.push(c);
                break;
            }
        }
    }

    let bucket = if !exact.is_empty() { exact } else { partial };
    match bucket.len() {
        0 => Ok(FAILED_MATCH),
        1 => Ok(bucket[0]),
        _ => Ok(AMBIGUOUS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_common::model::{ObjFlag, Perms, PropFlag};
    use loam_common::util::BitEnum;
    use loam_var::{Symbol, v_list, v_str};

    fn wizard_perms() -> Perms {
        Perms::new(Obj::mk_id(0), BitEnum::new_with(ObjFlag::Wizard))
    }

    /// A room holding the player and a couple of things.
    fn matching_world() -> (WorldState, Obj, Obj, Obj) {
        let ws = WorldState::new();
        let perms = wizard_perms();
        let room = ws.create_object(&perms, NOTHING, Obj::mk_id(0)).unwrap();
        ws.set_name(&perms, room, "hallway").unwrap();
        let player = ws.create_object(&perms, NOTHING, Obj::mk_id(0)).unwrap();
        ws.set_name(&perms, player, "wizard").unwrap();
        let ball = ws.create_object(&perms, NOTHING, Obj::mk_id(0)).unwrap();
        ws.set_name(&perms, ball, "ball").unwrap();
        ws.move_object(&perms, player, room).unwrap();
        ws.move_object(&perms, ball, room).unwrap();
        (ws, room, player, ball)
    }

    #[test]
    fn test_me_here_literal() {
        let (ws, room, player, ball) = matching_world();
        assert_eq!(match_object(&ws, player, "me").unwrap(), player);
        assert_eq!(match_object(&ws, player, "here").unwrap(), room);
        assert_eq!(
            match_object(&ws, player, &format!("#{}", ball.id())).unwrap(),
            ball
        );
        assert_eq!(match_object(&ws, player, "").unwrap(), NOTHING);
    }

    #[test]
    fn test_name_and_prefix() {
        let (ws, _room, player, ball) = matching_world();
        assert_eq!(match_object(&ws, player, "ball").unwrap(), ball);
        assert_eq!(match_object(&ws, player, "bal").unwrap(), ball);
        assert_eq!(match_object(&ws, player, "sword").unwrap(), FAILED_MATCH);
    }

    #[test]
    fn test_aliases() {
        let (ws, _room, player, ball) = matching_world();
        let perms = wizard_perms();
        ws.define_property(
            &perms,
            ball,
            &Symbol::mk("aliases"),
            Obj::mk_id(0),
            PropFlag::rc(),
            v_list(&[v_str("sphere"), v_str("orb")]),
        )
        .unwrap();
        assert_eq!(match_object(&ws, player, "orb").unwrap(), ball);
    }

    #[test]
    fn test_exact_beats_prefix_and_ambiguity() {
        let (ws, room, player, ball) = matching_world();
        let perms = wizard_perms();
        let balloon = ws.create_object(&perms, NOTHING, Obj::mk_id(0)).unwrap();
        ws.set_name(&perms, balloon, "balloon").unwrap();
        ws.move_object(&perms, balloon, room).unwrap();
        // "ball" matches `ball` exactly even though `balloon` matches as a prefix.
        assert_eq!(match_object(&ws, player, "ball").unwrap(), ball);
        // "bal" prefixes both.
        assert_eq!(match_object(&ws, player, "bal").unwrap(), AMBIGUOUS);
    }
}
