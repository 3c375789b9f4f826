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

use crate::tasks::command_parse::ParsedCommand;
use loam_compiler::Program;
use loam_var::{NOTHING, Obj, Symbol, Var, VarType, v_int, v_list, v_obj, v_str, v_string};
use std::collections::HashMap;

/// One frame of the verb call stack: who is running, as whom, over which program, and the
/// variable environment.
#[derive(Clone, Debug)]
pub struct Activation {
    pub this: Obj,
    pub player: Obj,
    pub caller: Obj,
    pub verb_name: String,
    pub verb_definer: Obj,
    /// Effective permission identity for this frame; the verb owner after setuid
    /// promotion.
    pub perms: Obj,
    /// The verb's debug bit: unset means uncaught errors become values in the caller.
    pub debug: bool,
    pub args: Vec<Var>,
    pub program: Program,
    pub env: HashMap<Symbol, Var>,
    /// Source line of the statement currently executing, for tracebacks.
    pub line: usize,
    /// How many `try` bodies of this frame we are inside. While non-zero, unhandled
    /// errors keep propagating toward the except arms instead of being swallowed by the
    /// no-debug rule.
    pub handler_depth: usize,
}

impl Activation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        this: Obj,
        player: Obj,
        caller: Obj,
        verb_name: &str,
        verb_definer: Obj,
        perms: Obj,
        debug: bool,
        args: Vec<Var>,
        program: Program,
        command: Option<&ParsedCommand>,
    ) -> Self {
        let mut act = Self {
            this,
            player,
            caller,
            verb_name: verb_name.to_string(),
            verb_definer,
            perms,
            debug,
            args,
            program,
            env: HashMap::new(),
            line: 0,
            handler_depth: 0,
        };
        act.seed_env(command);
        act
    }

    /// The built-in variables every verb starts with. Note these shadow any property of
    /// the same name; `this.player` stays reachable when a world defines one.
    fn seed_env(&mut self, command: Option<&ParsedCommand>) {
        let env = &mut self.env;
        env.insert(Symbol::mk("player"), v_obj(self.player));
        env.insert(Symbol::mk("this"), v_obj(self.this));
        env.insert(Symbol::mk("caller"), v_obj(self.caller));
        env.insert(Symbol::mk("verb"), v_str(&self.verb_name));
        env.insert(Symbol::mk("args"), v_list(&self.args));
        match command {
            Some(pc) => {
                env.insert(Symbol::mk("argstr"), v_string(pc.argstr.clone()));
                env.insert(Symbol::mk("dobjstr"), v_string(pc.dobjstr.clone()));
                env.insert(Symbol::mk("dobj"), v_obj(pc.dobj));
                env.insert(Symbol::mk("prepstr"), v_string(pc.prepstr.clone()));
                env.insert(Symbol::mk("iobjstr"), v_string(pc.iobjstr.clone()));
                env.insert(Symbol::mk("iobj"), v_obj(pc.iobj));
            }
            None => {
                env.insert(Symbol::mk("argstr"), v_str(""));
                env.insert(Symbol::mk("dobjstr"), v_str(""));
                env.insert(Symbol::mk("dobj"), v_obj(NOTHING));
                env.insert(Symbol::mk("prepstr"), v_str(""));
                env.insert(Symbol::mk("iobjstr"), v_str(""));
                env.insert(Symbol::mk("iobj"), v_obj(NOTHING));
            }
        }
        // The type-constant globals.
        env.insert(Symbol::mk("INT"), v_int(VarType::TYPE_INT as i64));
        env.insert(Symbol::mk("NUM"), v_int(VarType::TYPE_INT as i64));
        env.insert(Symbol::mk("FLOAT"), v_int(VarType::TYPE_FLOAT as i64));
        env.insert(Symbol::mk("OBJ"), v_int(VarType::TYPE_OBJ as i64));
        env.insert(Symbol::mk("STR"), v_int(VarType::TYPE_STR as i64));
        env.insert(Symbol::mk("ERR"), v_int(VarType::TYPE_ERR as i64));
        env.insert(Symbol::mk("LIST"), v_int(VarType::TYPE_LIST as i64));
    }

    #[must_use]
    pub fn traceback_line(&self) -> String {
        format!(
            "... called from {}:{} (this == {}), line {}",
            self.verb_definer, self.verb_name, self.this, self.line
        )
    }
}
