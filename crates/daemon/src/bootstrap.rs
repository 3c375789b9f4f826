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

//! The minimal bootstrapping core, for starting a server with no database at all: a
//! system object with login plumbing, one wizard, and one room. Real worlds come from
//! textdumps; this exists so a bare `loam-daemon` is immediately usable.

use loam_common::model::{ObjFlag, Perms, PropFlag, VerbArgsSpec, VerbFlag};
use loam_common::util::BitEnum;
use loam_db::WorldState;
use loam_var::{NOTHING, Obj, Symbol, v_int, v_obj, v_string};
use tracing::info;

pub const DEFAULT_WIZARD_PASSWORD: &str = "secret";

const DO_LOGIN_COMMAND: &str = r#"if (length(args) < 2 || args[1] != "connect")
  notify(player, "Try: connect <player> <password>");
  return 0;
endif
for p in (players())
  if (valid(p) && p.name == args[2])
    if (check_password(p, length(args) >= 3 ? args[3] | ""))
      return p;
    endif
  endif
endfor
notify(player, "Either that player does not exist, or has a different password.");
return 0;"#;

const USER_CONNECTED: &str = r#"if (!valid(args[1].location))
  move(args[1], $first_room);
endif
notify(args[1], "*** Connected ***");
return 0;"#;

const USER_DISCONNECTED: &str = "return 0;";

const HUH: &str = r#"notify(player, "I couldn't understand that.");
return 1;"#;

const SAY: &str = r#"for t in (this.contents)
  if (is_player(t) && t != player)
    notify(t, player.name + " says, \"" + argstr + "\"");
  endif
endfor
notify(player, "You say, \"" + argstr + "\"");
return 1;"#;

const EMOTE: &str = r#"for t in (this.contents)
  if (is_player(t))
    notify(t, player.name + " " + argstr);
  endif
endfor
return 1;"#;

const LOOK: &str = r#"notify(player, this.name);
for t in (this.contents)
  if (t != player)
    notify(player, "You see " + t.name + " here.");
  endif
endfor
return 1;"#;

fn add_verb(ws: &WorldState, perms: &Perms, on: Obj, names: &[&str], spec: VerbArgsSpec, code: &str) {
    let names: Vec<Symbol> = names.iter().map(|n| Symbol::mk(n)).collect();
    ws.add_verb(perms, on, names, Obj::mk_id(1), VerbFlag::rxd(), spec)
        .expect("bootstrap verb");
    let index = ws.verbs(perms, on).expect("bootstrap verbs").len() - 1;
    let program = loam_compiler::compile(code).expect("bootstrap verb parses");
    ws.set_verb_program(perms, on, index, program)
        .expect("bootstrap verb code");
}

/// Build the three-object starter world: `#0` system, `#1` wizard, `#2` first room.
pub fn minimal_core() -> WorldState {
    let ws = WorldState::new();
    let perms = Perms::new(Obj::mk_id(1), BitEnum::new_with(ObjFlag::Wizard));

    let system = ws
        .create_object(&perms, NOTHING, Obj::mk_id(1))
        .expect("bootstrap system object");
    ws.set_name(&perms, system, "System Object").unwrap();

    let wizard = ws
        .create_object(&perms, NOTHING, NOTHING)
        .expect("bootstrap wizard");
    ws.set_name(&perms, wizard, "Wizard").unwrap();
    ws.update_property(&perms, wizard, &Symbol::mk("wizard"), v_int(1))
        .unwrap();
    ws.update_property(&perms, wizard, &Symbol::mk("programmer"), v_int(1))
        .unwrap();
    ws.set_player_flag(&perms, wizard, true).unwrap();
    let hashed = pwhash::unix_crypt::hash_with("lo", DEFAULT_WIZARD_PASSWORD)
        .expect("bootstrap password hash");
    ws.define_property(
        &perms,
        wizard,
        &Symbol::mk("password"),
        wizard,
        BitEnum::new(),
        v_string(hashed),
    )
    .unwrap();

    let room = ws
        .create_object(&perms, NOTHING, Obj::mk_id(1))
        .expect("bootstrap room");
    ws.set_name(&perms, room, "The First Room").unwrap();
    ws.move_object(&perms, wizard, room).unwrap();

    ws.define_property(
        &perms,
        system,
        &Symbol::mk("first_room"),
        wizard,
        PropFlag::r(),
        v_obj(room),
    )
    .unwrap();

    add_verb(
        &ws,
        &perms,
        system,
        &["do_login_command"],
        VerbArgsSpec::this_none_this(),
        DO_LOGIN_COMMAND,
    );
    add_verb(
        &ws,
        &perms,
        system,
        &["user_connected", "user_reconnected"],
        VerbArgsSpec::this_none_this(),
        USER_CONNECTED,
    );
    add_verb(
        &ws,
        &perms,
        system,
        &["user_disconnected"],
        VerbArgsSpec::this_none_this(),
        USER_DISCONNECTED,
    );
    add_verb(
        &ws,
        &perms,
        system,
        &["huh"],
        VerbArgsSpec::none_none_none(),
        HUH,
    );
    add_verb(&ws, &perms, room, &["say"], VerbArgsSpec::any_any_any(), SAY);
    add_verb(
        &ws,
        &perms,
        room,
        &["emote"],
        VerbArgsSpec::any_any_any(),
        EMOTE,
    );
    add_verb(
        &ws,
        &perms,
        room,
        &["l*ook"],
        VerbArgsSpec::none_none_none(),
        LOOK,
    );

    info!(
        "bootstrapped minimal core; wizard password is {:?}",
        DEFAULT_WIZARD_PASSWORD
    );
    ws
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_core_shape() {
        let ws = minimal_core();
        assert!(ws.valid(Obj::mk_id(0)));
        assert!(ws.valid(Obj::mk_id(1)));
        assert!(ws.valid(Obj::mk_id(2)));
        assert_eq!(ws.players(), vec![Obj::mk_id(1)]);
        assert_eq!(ws.location_of(Obj::mk_id(1)).unwrap(), Obj::mk_id(2));
        // The login verb resolves on the system object.
        assert!(ws.resolve_verb(Obj::mk_id(0), "do_login_command", None).is_ok());
        assert!(ws.resolve_verb(Obj::mk_id(2), "look", None).is_ok());
    }
}
