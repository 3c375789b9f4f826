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

//! Unit-test scaffolding: a minimal world with a wizard, and a session that records
//! everything sent to it.

use crate::config::Config;
use crate::tasks::scheduler::Scheduler;
use crate::vm::Interpreter;
use loam_common::model::{ObjFlag, Perms};
use loam_common::tasks::{Session, SessionError};
use loam_common::util::BitEnum;
use loam_db::WorldState;
use loam_var::{NOTHING, Obj, Symbol, v_int};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub(crate) struct MockSession {
    output: Mutex<Vec<(Obj, String)>>,
}

impl MockSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            output: Mutex::new(vec![]),
        })
    }

    #[allow(dead_code)]
    pub fn output_for(&self, player: Obj) -> Vec<String> {
        self.output
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

impl Session for MockSession {
    fn send_text(&self, player: Obj, msg: &str) -> Result<(), SessionError> {
        self.output.lock().unwrap().push((player, msg.to_string()));
        Ok(())
    }

    fn request_input(&self, _player: Obj, _request: Uuid) -> Result<(), SessionError> {
        Ok(())
    }

    fn connection_name(&self, player: Obj) -> Result<String, SessionError> {
        Ok(format!("test-connection-{player}"))
    }

    fn disconnect(&self, _player: Obj) -> Result<(), SessionError> {
        Ok(())
    }

    fn connected_players(&self) -> Result<Vec<Obj>, SessionError> {
        Ok(vec![])
    }

    fn connected_seconds(&self, _player: Obj) -> Result<f64, SessionError> {
        Ok(0.0)
    }

    fn idle_seconds(&self, _player: Obj) -> Result<f64, SessionError> {
        Ok(0.0)
    }

    fn set_connection_option(
        &self,
        _player: Obj,
        _option: &str,
        _value: &str,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    fn connection_options(&self, _player: Obj) -> Result<Vec<(String, String)>, SessionError> {
        Ok(vec![])
    }

    fn shutdown(&self, _msg: Option<String>) -> Result<(), SessionError> {
        Ok(())
    }
}

pub(crate) struct TestHarness {
    pub world: Arc<WorldState>,
    pub session: Arc<dyn Session>,
    pub mock: Arc<MockSession>,
    pub scheduler: Arc<Scheduler>,
    pub config: Arc<Config>,
    pub root: Obj,
    pub wizard: Obj,
}

impl TestHarness {
    pub fn interp(&self) -> Interpreter<'_> {
        let mut interp = Interpreter::new(
            &self.world,
            &self.session,
            &self.scheduler,
            &self.config,
            1,
            self.wizard,
            Arc::new(AtomicBool::new(false)),
            None,
        );
        interp.push_test_frame();
        interp
    }
}

/// A world holding `#0` (a fertile root) and `#1` (a wizard programmer player).
pub(crate) fn world_with_wizard() -> TestHarness {
    let world = Arc::new(WorldState::new());
    let boot = Perms::new(Obj::mk_id(0), BitEnum::new_with(ObjFlag::Wizard));
    let root = world.create_object(&boot, NOTHING, Obj::mk_id(0)).unwrap();
    world
        .update_property(&boot, root, &Symbol::mk("f"), v_int(1))
        .unwrap();
    let wizard = world.create_object(&boot, root, NOTHING).unwrap();
    world
        .update_property(&boot, wizard, &Symbol::mk("wizard"), v_int(1))
        .unwrap();
    world
        .update_property(&boot, wizard, &Symbol::mk("programmer"), v_int(1))
        .unwrap();
    world.set_player_flag(&boot, wizard, true).unwrap();

    let config = Arc::new(Config::default());
    let scheduler = Scheduler::new(world.clone(), config.clone());
    let mock = MockSession::new();
    let session: Arc<dyn Session> = mock.clone();
    TestHarness {
        world,
        session,
        mock,
        scheduler,
        config,
        root,
        wizard,
    }
}

/// For builtins that never look at the world.
pub(crate) fn noop_interp() -> TestHarness {
    world_with_wizard()
}
