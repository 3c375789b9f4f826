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

//! Config is created by the host daemon and passed through the scheduler, whereupon it is
//! available to all components. Holds things typically configured by CLI flags or the
//! config file; unknown keys in that file are ignored.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of this world, for the version banner and `server_version()`.
    pub world_name: String,
    /// Lines sent to a fresh connection before login.
    pub welcome_banner: Vec<String>,
    /// Tick budget a task starts with (and regains on suspend).
    pub tick_limit: usize,
    /// Maximum verb-call depth before `E_MAXREC`.
    pub max_stack_depth: usize,
    /// Cap on concurrently queued/running tasks a single player may hold.
    pub max_tasks_per_player: usize,
    /// Cap on simultaneous connections.
    pub max_connections: usize,
    /// Address the line-protocol listener binds.
    pub listen_address: String,
    /// Base directory for runtime data.
    pub data_dir: PathBuf,
    pub checkpoint: CheckpointConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            world_name: "loam".to_string(),
            welcome_banner: vec![
                "Welcome to loam.".to_string(),
                "Connect with: connect <player> <password>".to_string(),
            ],
            tick_limit: 30_000,
            max_stack_depth: 50,
            max_tasks_per_player: 10,
            max_connections: 128,
            listen_address: "0.0.0.0:7777".to_string(),
            data_dir: PathBuf::from("loam-data"),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Where snapshots and exports land; relative paths resolve under `data_dir`.
    pub checkpoint_dir: PathBuf,
    /// Seconds between binary snapshots; None disables them. Prime, so the two jobs
    /// drift apart instead of piling up on a shared harmonic.
    pub snapshot_interval_seconds: Option<u64>,
    /// Seconds between textdump exports; None disables them.
    pub export_interval_seconds: Option<u64>,
    /// How many binary snapshot files retention keeps.
    pub binary_keep: usize,
    /// How many textdump files retention keeps (plus the day-old survivor guarantee).
    pub text_keep: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("checkpoints"),
            snapshot_interval_seconds: Some(307),
            export_interval_seconds: Some(3607),
            binary_keep: 8,
            text_keep: 8,
        }
    }
}

impl CheckpointConfig {
    #[must_use]
    pub fn snapshot_interval(&self) -> Option<Duration> {
        self.snapshot_interval_seconds.map(Duration::from_secs)
    }

    #[must_use]
    pub fn export_interval(&self) -> Option<Duration> {
        self.export_interval_seconds.map(Duration::from_secs)
    }
}
