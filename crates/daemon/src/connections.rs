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

use loam_common::tasks::{Session, SessionError};
use loam_var::{FIRST_CONNECTION_ID, Obj};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

/// Cap on undelivered output lines per connection; beyond this, the newest messages are
/// dropped and a warning logged.
pub const OUTPUT_QUEUE_DEPTH: usize = 1000;

/// What the writer side of a connection consumes.
#[derive(Debug, Clone)]
pub enum ConnectionMessage {
    Line(String),
    Disconnect,
}

struct ConnectionRecord {
    peer: String,
    outbound: flume::Sender<ConnectionMessage>,
    connect_time: Instant,
    last_activity: Instant,
    /// Output delimiters wrapped around every `notify`.
    prefix: String,
    suffix: String,
    /// A task parked in `read()` waiting for this connection's next line.
    pending_input: Option<Uuid>,
}

/// All live connections, keyed by their current identity: a negative connection id while
/// logging in, the player object afterwards. Touched by connection threads and by
/// built-ins through the `Session` trait.
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

struct Inner {
    next_connection_id: i64,
    connections: HashMap<Obj, ConnectionRecord>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_connection_id: FIRST_CONNECTION_ID.id(),
                connections: HashMap::new(),
            }),
        }
    }

    /// Register a fresh connection, handing back its pre-login identity.
    pub fn register(&self, peer: &str, outbound: flume::Sender<ConnectionMessage>) -> Obj {
        let mut inner = self.inner.lock().unwrap();
        let id = Obj::mk_id(inner.next_connection_id);
        inner.next_connection_id -= 1;
        inner.connections.insert(
            id,
            ConnectionRecord {
                peer: peer.to_string(),
                outbound,
                connect_time: Instant::now(),
                last_activity: Instant::now(),
                prefix: String::new(),
                suffix: String::new(),
                pending_input: None,
            },
        );
        id
    }

    /// Promote a logging-in connection to a player identity. If that player is already
    /// connected elsewhere, the older connection is booted. Returns whether this was a
    /// reconnection.
    pub fn promote(&self, connection: Obj, player: Obj) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let was_connected = match inner.connections.remove(&player) {
            Some(old) => {
                let _ = old.outbound.try_send(ConnectionMessage::Line(
                    "*** Redirecting connection to new port ***".to_string(),
                ));
                let _ = old.outbound.try_send(ConnectionMessage::Disconnect);
                true
            }
            None => false,
        };
        if let Some(mut record) = inner.connections.remove(&connection) {
            record.last_activity = Instant::now();
            inner.connections.insert(player, record);
        }
        was_connected
    }

    pub fn remove(&self, who: Obj) {
        self.inner.lock().unwrap().connections.remove(&who);
    }

    pub fn touch(&self, who: Obj) {
        if let Some(record) = self.inner.lock().unwrap().connections.get_mut(&who) {
            record.last_activity = Instant::now();
        }
    }

    /// Park a `read()` request against the connection; the next input line goes to it.
    pub fn set_pending_input(&self, who: Obj, request: Uuid) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.connections.get_mut(&who) {
            Some(record) => {
                record.pending_input = Some(request);
                Ok(())
            }
            None => Err(SessionError::NoConnectionForPlayer(who)),
        }
    }

    pub fn take_pending_input(&self, who: Obj) -> Option<Uuid> {
        self.inner
            .lock()
            .unwrap()
            .connections
            .get_mut(&who)
            .and_then(|record| record.pending_input.take())
    }

    /// Whether a task is parked in `read()` on this connection; the command loop stops
    /// waiting on the running task when one appears, so the next line can reach it.
    #[must_use]
    pub fn has_pending_input(&self, who: Obj) -> bool {
        self.inner
            .lock()
            .unwrap()
            .connections
            .get(&who)
            .map(|record| record.pending_input.is_some())
            .unwrap_or(false)
    }

    /// Everyone logged in (positive identities), for `@who` and `connected_players()`.
    #[must_use]
    pub fn logged_in_players(&self) -> Vec<Obj> {
        let inner = self.inner.lock().unwrap();
        let mut players: Vec<Obj> = inner
            .connections
            .keys()
            .filter(|o| o.is_positive())
            .copied()
            .collect();
        players.sort();
        players
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.lock().unwrap().connections.len()
    }

    /// `(connected-seconds, idle-seconds)` for the `@who` table and the time built-ins.
    pub fn connection_times(&self, who: Obj) -> Result<(f64, f64), SessionError> {
        let inner = self.inner.lock().unwrap();
        let record = inner
            .connections
            .get(&who)
            .ok_or(SessionError::NoConnectionForPlayer(who))?;
        Ok((
            record.connect_time.elapsed().as_secs_f64(),
            record.last_activity.elapsed().as_secs_f64(),
        ))
    }
}

impl Session for ConnectionRegistry {
    fn send_text(&self, player: Obj, msg: &str) -> Result<(), SessionError> {
        let inner = self.inner.lock().unwrap();
        let record = inner
            .connections
            .get(&player)
            .ok_or(SessionError::NoConnectionForPlayer(player))?;
        let line = format!("{}{}{}", record.prefix, msg, record.suffix);
        if record
            .outbound
            .try_send(ConnectionMessage::Line(line))
            .is_err()
        {
            warn!(?player, "output queue full; dropping message");
            return Err(SessionError::DeliveryError);
        }
        Ok(())
    }

    fn request_input(&self, player: Obj, request: Uuid) -> Result<(), SessionError> {
        self.set_pending_input(player, request)
    }

    fn connection_name(&self, player: Obj) -> Result<String, SessionError> {
        let inner = self.inner.lock().unwrap();
        inner
            .connections
            .get(&player)
            .map(|record| record.peer.clone())
            .ok_or(SessionError::NoConnectionForPlayer(player))
    }

    fn disconnect(&self, player: Obj) -> Result<(), SessionError> {
        let inner = self.inner.lock().unwrap();
        let record = inner
            .connections
            .get(&player)
            .ok_or(SessionError::NoConnectionForPlayer(player))?;
        let _ = record.outbound.try_send(ConnectionMessage::Disconnect);
        Ok(())
    }

    fn connected_players(&self) -> Result<Vec<Obj>, SessionError> {
        Ok(self.logged_in_players())
    }

    fn connected_seconds(&self, player: Obj) -> Result<f64, SessionError> {
        Ok(self.connection_times(player)?.0)
    }

    fn idle_seconds(&self, player: Obj) -> Result<f64, SessionError> {
        Ok(self.connection_times(player)?.1)
    }

    fn set_connection_option(
        &self,
        player: Obj,
        option: &str,
        value: &str,
    ) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .connections
            .get_mut(&player)
            .ok_or(SessionError::NoConnectionForPlayer(player))?;
        match option {
            "output-prefix" => record.prefix = value.to_string(),
            "output-suffix" => record.suffix = value.to_string(),
            other => return Err(SessionError::InvalidOption(other.to_string())),
        }
        Ok(())
    }

    fn connection_options(&self, player: Obj) -> Result<Vec<(String, String)>, SessionError> {
        let inner = self.inner.lock().unwrap();
        let record = inner
            .connections
            .get(&player)
            .ok_or(SessionError::NoConnectionForPlayer(player))?;
        Ok(vec![
            ("output-prefix".to_string(), record.prefix.clone()),
            ("output-suffix".to_string(), record.suffix.clone()),
        ])
    }

    fn shutdown(&self, msg: Option<String>) -> Result<(), SessionError> {
        let inner = self.inner.lock().unwrap();
        let text = match &msg {
            Some(msg) => format!("*** Shutting down: {msg} ***"),
            None => "*** Shutting down ***".to_string(),
        };
        for record in inner.connections.values() {
            let _ = record.outbound.try_send(ConnectionMessage::Line(text.clone()));
            let _ = record.outbound.try_send(ConnectionMessage::Disconnect);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_promotes_and_rekeys() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = flume::bounded(OUTPUT_QUEUE_DEPTH);
        let conn = registry.register("10.0.0.1:5000", tx);
        assert_eq!(conn, FIRST_CONNECTION_ID);
        assert!(registry.logged_in_players().is_empty());

        let player = Obj::mk_id(7);
        assert!(!registry.promote(conn, player));
        assert_eq!(registry.logged_in_players(), vec![player]);
        assert_eq!(registry.connection_name(player).unwrap(), "10.0.0.1:5000");
    }

    #[test]
    fn test_reconnection_boots_older_connection() {
        let registry = ConnectionRegistry::new();
        let (tx1, rx1) = flume::bounded(OUTPUT_QUEUE_DEPTH);
        let c1 = registry.register("one", tx1);
        let player = Obj::mk_id(7);
        registry.promote(c1, player);

        let (tx2, _rx2) = flume::bounded(OUTPUT_QUEUE_DEPTH);
        let c2 = registry.register("two", tx2);
        assert!(registry.promote(c2, player));
        // The first connection got told to go away.
        let msgs: Vec<ConnectionMessage> = rx1.drain().collect();
        assert!(
            msgs.iter()
                .any(|m| matches!(m, ConnectionMessage::Disconnect))
        );
        assert_eq!(registry.connection_name(player).unwrap(), "two");
    }

    #[test]
    fn test_output_delimiters() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = flume::bounded(OUTPUT_QUEUE_DEPTH);
        let conn = registry.register("x", tx);
        registry
            .set_connection_option(conn, "output-prefix", ">> ")
            .unwrap();
        registry
            .set_connection_option(conn, "output-suffix", " <<")
            .unwrap();
        registry.send_text(conn, "hello").unwrap();
        match rx.recv().unwrap() {
            ConnectionMessage::Line(l) => assert_eq!(l, ">> hello <<"),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_bounded_queue_drops_overflow() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = flume::bounded(2);
        let conn = registry.register("x", tx);
        registry.send_text(conn, "one").unwrap();
        registry.send_text(conn, "two").unwrap();
        assert!(registry.send_text(conn, "three").is_err());
        assert_eq!(rx.drain().count(), 2);
    }
}
