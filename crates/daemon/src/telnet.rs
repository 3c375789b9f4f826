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

//! The one concrete transport: a plain TCP line protocol. Everything interesting lives
//! behind the `Session` contract; what's here is line discipline and the per-connection
//! login/command state machine.

use crate::connections::{ConnectionMessage, ConnectionRegistry, OUTPUT_QUEUE_DEPTH};
use loam_common::tasks::Session;
use loam_kernel::config::Config;
use loam_kernel::tasks::TaskResult;
use loam_kernel::tasks::scheduler::{Scheduler, wait_for_result};
use loam_var::{Obj, SYSTEM_OBJECT, Var, v_obj, v_string};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How long the connection loop waits for one command task before giving up on it.
const TASK_WAIT: Duration = Duration::from_secs(600);

pub struct Listener {
    pub local_addr: SocketAddr,
}

/// Bind and start accepting. Each connection gets a reader thread (which owns the state
/// machine) and a writer thread draining the bounded output queue.
pub fn spawn_listener(
    config: Arc<Config>,
    scheduler: Arc<Scheduler>,
    registry: Arc<ConnectionRegistry>,
) -> std::io::Result<Listener> {
    let listener = TcpListener::bind(&config.listen_address)?;
    let local_addr = listener.local_addr()?;
    info!("listening on {local_addr}");
    std::thread::Builder::new()
        .name("loam-accept".to_string())
        .spawn(move || {
            for stream in listener.incoming() {
                if !scheduler.is_running() {
                    break;
                }
                match stream {
                    Ok(stream) => {
                        if registry.connection_count() >= config.max_connections {
                            warn!("connection limit reached; refusing connection");
                            let _ = stream.shutdown(Shutdown::Both);
                            continue;
                        }
                        let config = config.clone();
                        let scheduler = scheduler.clone();
                        let registry = registry.clone();
                        let _ = std::thread::Builder::new()
                            .name("loam-conn".to_string())
                            .spawn(move || {
                                handle_connection(stream, config, scheduler, registry);
                            });
                    }
                    Err(e) => {
                        error!(?e, "accept failed");
                    }
                }
            }
        })?;
    Ok(Listener { local_addr })
}

fn handle_connection(
    stream: TcpStream,
    config: Arc<Config>,
    scheduler: Arc<Scheduler>,
    registry: Arc<ConnectionRegistry>,
) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let (outbound_tx, outbound_rx) = flume::bounded(OUTPUT_QUEUE_DEPTH);
    let connection_id = registry.register(&peer, outbound_tx);
    info!(%peer, ?connection_id, "connection");

    // Writer side: drain the queue onto the socket until told to disconnect.
    let writer_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            error!(?e, "could not clone stream");
            registry.remove(connection_id);
            return;
        }
    };
    let writer = std::thread::spawn(move || {
        let mut out = writer_stream;
        while let Ok(msg) = outbound_rx.recv() {
            match msg {
                ConnectionMessage::Line(line) => {
                    if out.write_all(line.as_bytes()).is_err()
                        || out.write_all(b"\r\n").is_err()
                    {
                        break;
                    }
                }
                ConnectionMessage::Disconnect => {
                    let _ = out.flush();
                    let _ = out.shutdown(Shutdown::Both);
                    break;
                }
            }
        }
    });

    let session: Arc<dyn Session> = registry.clone();
    for line in &config.welcome_banner {
        let _ = session.send_text(connection_id, line);
    }

    let mut machine = ConnectionState {
        identity: connection_id,
        logged_in: false,
        config: &config,
        scheduler: &scheduler,
        registry: &registry,
        session: &session,
    };
    read_lines(stream, &mut machine);

    // Transport gone: tear down whatever identity we ended with.
    let identity = machine.identity;
    registry.remove(identity);
    if machine.logged_in {
        scheduler.kill_player_tasks(identity);
        let _ = scheduler.submit_verb_task(
            identity,
            SYSTEM_OBJECT,
            "user_disconnected",
            vec![v_obj(identity)],
            "",
            session.clone(),
        );
    }
    info!(%peer, "disconnected");
    let _ = writer.join();
}

/// Split the byte stream into lines on `\r\n`, `\n`, or bare `\r`, feeding each to the
/// state machine.
fn read_lines(mut stream: TcpStream, machine: &mut ConnectionState<'_>) {
    let mut buf = [0u8; 1024];
    let mut pending: Vec<u8> = vec![];
    let mut last_was_cr = false;
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        for &b in &buf[..n] {
            match b {
                b'\n' => {
                    if !last_was_cr {
                        let line = String::from_utf8_lossy(&pending).to_string();
                        pending.clear();
                        if !machine.handle_line(&line) {
                            return;
                        }
                    }
                    last_was_cr = false;
                }
                b'\r' => {
                    let line = String::from_utf8_lossy(&pending).to_string();
                    pending.clear();
                    last_was_cr = true;
                    if !machine.handle_line(&line) {
                        return;
                    }
                }
                b => {
                    pending.push(b);
                    last_was_cr = false;
                }
            }
        }
    }
}

struct ConnectionState<'a> {
    /// Negative connection id before login, the player object after.
    identity: Obj,
    logged_in: bool,
    config: &'a Arc<Config>,
    scheduler: &'a Arc<Scheduler>,
    registry: &'a Arc<ConnectionRegistry>,
    session: &'a Arc<dyn Session>,
}

impl ConnectionState<'_> {
    /// Returns false when the connection should close.
    fn handle_line(&mut self, line: &str) -> bool {
        self.registry.touch(self.identity);
        if self.logged_in {
            self.handle_command(line)
        } else {
            self.handle_login_line(line);
            true
        }
    }

    /// Pre-login: every line goes to `#0:do_login_command`; a player object return value
    /// promotes the connection.
    fn handle_login_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let words: Vec<Var> = loam_common::util::parse_into_words(line)
            .into_iter()
            .map(v_string)
            .collect();
        let Ok(handle) = self.scheduler.submit_verb_task(
            self.identity,
            SYSTEM_OBJECT,
            "do_login_command",
            words,
            line,
            self.session.clone(),
        ) else {
            let _ = self
                .session
                .send_text(self.identity, "Login is not available right now.");
            return;
        };
        let result = wait_for_result(handle, TASK_WAIT);
        let Ok(TaskResult::Success(value)) = result else {
            return;
        };
        let Some(player) = value.as_object() else {
            return;
        };
        if !player.is_positive()
            || !self.scheduler.world_state().valid(player)
            || !self.scheduler.world_state().is_player(player)
        {
            return;
        }
        let was_connected = self.registry.promote(self.identity, player);
        info!(?player, reconnected = was_connected, "login");
        self.identity = player;
        self.logged_in = true;
        let hook = if was_connected {
            "user_reconnected"
        } else {
            "user_connected"
        };
        let _ = self.scheduler.submit_verb_task(
            player,
            SYSTEM_OBJECT,
            hook,
            vec![v_obj(player)],
            "",
            self.session.clone(),
        );
    }

    /// Logged in: manager commands short-circuit, a parked `read()` swallows the line,
    /// everything else runs through the command pipeline, serially, preserving input
    /// order per connection.
    fn handle_command(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("quit") {
            let _ = self.session.send_text(self.identity, "*** Disconnected ***");
            let _ = self.session.disconnect(self.identity);
            return false;
        }
        if trimmed.eq_ignore_ascii_case("@who") {
            self.show_who();
            return true;
        }
        if trimmed.eq_ignore_ascii_case("@stats") {
            self.show_stats();
            return true;
        }
        if let Some(request) = self.registry.take_pending_input(self.identity) {
            let _ = self
                .scheduler
                .submit_requested_input(request, line.to_string());
            return true;
        }
        if trimmed.is_empty() {
            return true;
        }
        match self
            .scheduler
            .submit_command_task(self.identity, line, self.session.clone())
        {
            Ok(handle) => {
                // Wait for completion so this connection's commands stay ordered, but
                // resume reading the moment the task parks itself in `read()`: its input
                // has to come through us.
                let receiver = handle.into_receiver();
                let deadline = std::time::Instant::now() + TASK_WAIT;
                loop {
                    match receiver.recv_timeout(Duration::from_millis(50)) {
                        Ok(_) => break,
                        Err(oneshot::RecvTimeoutError::Timeout) => {
                            if self.registry.has_pending_input(self.identity)
                                || std::time::Instant::now() >= deadline
                            {
                                break;
                            }
                        }
                        Err(oneshot::RecvTimeoutError::Disconnected) => break,
                    }
                }
            }
            Err(e) => {
                warn!(?e, "could not submit command");
                let _ = self
                    .session
                    .send_text(self.identity, "The server is too busy for that right now.");
            }
        }
        true
    }

    fn show_who(&self) {
        let world = self.scheduler.world_state();
        let _ = self.session.send_text(self.identity, "Player          Connected  Idle");
        for player in self.registry.logged_in_players() {
            let name = world.name_of(player).unwrap_or_default();
            let (connected, idle) = self
                .registry
                .connection_times(player)
                .unwrap_or((0.0, 0.0));
            let _ = self.session.send_text(
                self.identity,
                &format!(
                    "{:<15} {:>8}s {:>4}s  ({})",
                    name, connected as u64, idle as u64, player
                ),
            );
        }
    }

    fn show_stats(&self) {
        let world = self.scheduler.world_state();
        let _ = self.session.send_text(
            self.identity,
            &format!(
                "{}: {} players, max object {}, {} connections, {} queued tasks",
                self.config.world_name,
                world.players().len(),
                world.max_object(),
                self.registry.connection_count(),
                self.scheduler.queued_tasks().len()
            ),
        );
    }
}
