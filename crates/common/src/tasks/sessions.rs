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

use loam_var::Obj;
use thiserror::Error as ThisError;
use uuid::Uuid;

/// The interface for managing the user I/O connection side of state, exposed by the host to
/// the scheduler and to built-ins during execution. Implementations live in the host (the
/// TCP daemon here; tests use mocks). One `Session` serves a whole host; players are
/// addressed by object id, connections-in-login by their negative connection id.
pub trait Session: Send + Sync {
    /// Spool `msg` (wrapped in the connection's output delimiters) to the given player's
    /// output queue. Queues are bounded; an overloaded connection drops the message.
    fn send_text(&self, player: Obj, msg: &str) -> Result<(), SessionError>;

    /// Park the current task's pending `read()` against the player's connection; the next
    /// input line is delivered to the given request id instead of the command pipeline.
    fn request_input(&self, player: Obj, input_request_id: Uuid) -> Result<(), SessionError>;

    /// The 'name' of the most recent connection associated with the player. LambdaMOO cores
    /// tend to expect a resolved hostname; we give them `host:port`.
    fn connection_name(&self, player: Obj) -> Result<String, SessionError>;

    /// Disconnect the given player's connection.
    fn disconnect(&self, player: Obj) -> Result<(), SessionError>;

    /// The list of currently-connected (logged-in) players.
    fn connected_players(&self) -> Result<Vec<Obj>, SessionError>;

    /// Seconds since the player's connection logged in.
    fn connected_seconds(&self, player: Obj) -> Result<f64, SessionError>;

    /// Seconds since the player last submitted a line.
    fn idle_seconds(&self, player: Obj) -> Result<f64, SessionError>;

    /// Set a connection option; only the output delimiter options are modeled.
    fn set_connection_option(
        &self,
        player: Obj,
        option: &str,
        value: &str,
    ) -> Result<(), SessionError>;

    /// Current connection options as (name, value) pairs.
    fn connection_options(&self, player: Obj) -> Result<Vec<(String, String)>, SessionError>;

    /// Process a (wizard) request for system shutdown, with an optional shutdown message.
    fn shutdown(&self, msg: Option<String>) -> Result<(), SessionError>;
}

#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error("No connection for player {0}")]
    NoConnectionForPlayer(Obj),
    #[error("Could not deliver session message")]
    DeliveryError,
    #[error("Invalid connection option: {0}")]
    InvalidOption(String),
}
