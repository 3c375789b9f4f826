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

mod args;
mod bootstrap;
mod connections;
mod telnet;

use crate::args::Args;
use crate::connections::ConnectionRegistry;
use clap::Parser;
use loam_db::WorldState;
use loam_kernel::checkpoint::{CheckpointManager, load_latest_snapshot};
use loam_kernel::tasks::scheduler::Scheduler;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process::exit;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit codes: 0 clean shutdown, 1 configuration error, 2 fatal database error.
const EXIT_CONFIG_ERROR: i32 = 1;
const EXIT_DATABASE_ERROR: i32 = 2;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match args.load_config() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("configuration error: {e}");
            exit(EXIT_CONFIG_ERROR);
        }
    };
    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!("could not create data directory {:?}: {e}", config.data_dir);
        exit(EXIT_CONFIG_ERROR);
    }

    let world_state = match open_world(&args, &config) {
        Ok(ws) => Arc::new(ws),
        Err(e) => {
            error!("fatal database error: {e}");
            exit(EXIT_DATABASE_ERROR);
        }
    };

    let scheduler = Scheduler::new(world_state.clone(), config.clone());
    let checkpoints = match CheckpointManager::start(
        world_state.clone(),
        config.checkpoint.clone(),
        &config.data_dir,
    ) {
        Ok(manager) => manager,
        Err(e) => {
            error!("could not start checkpointing: {e}");
            exit(EXIT_DATABASE_ERROR);
        }
    };
    scheduler.attach_checkpoints(checkpoints.clone());

    let registry = Arc::new(ConnectionRegistry::new());
    if let Err(e) = telnet::spawn_listener(config.clone(), scheduler.clone(), registry) {
        error!("could not bind {}: {e}", config.listen_address);
        exit(EXIT_CONFIG_ERROR);
    }

    info!("{} is up", config.world_name);

    // Sit here until a shutdown() built-in or a dead channel says otherwise.
    let shutdown = scheduler.shutdown_receiver();
    match shutdown.recv() {
        Ok(msg) => info!(?msg, "shutting down"),
        Err(_) => info!("scheduler went away; shutting down"),
    }
    checkpoints.shutdown();
    exit(0);
}

#[derive(Debug, thiserror::Error)]
enum WorldOpenError {
    #[error("could not open textdump: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse textdump: {0}")]
    Textdump(#[from] loam_textdump::TextdumpReaderError),
    #[error("could not load snapshot: {0}")]
    Checkpoint(#[from] loam_kernel::checkpoint::CheckpointError),
}

/// Database resolution order: an explicit `--import` textdump, then the newest binary
/// snapshot in the checkpoint directory, then the built-in minimal core.
fn open_world(
    args: &Args,
    config: &loam_kernel::config::Config,
) -> Result<WorldState, WorldOpenError> {
    if let Some(path) = &args.import {
        return import_textdump(path);
    }
    let checkpoint_dir = if config.checkpoint.checkpoint_dir.is_absolute() {
        config.checkpoint.checkpoint_dir.clone()
    } else {
        config.data_dir.join(&config.checkpoint.checkpoint_dir)
    };
    if let Some(snapshot) = load_latest_snapshot(&checkpoint_dir)? {
        info!(objects = snapshot.objects.len(), "resumed from binary snapshot");
        return Ok(WorldState::from_snapshot(snapshot));
    }
    info!("no database found; bootstrapping minimal core");
    Ok(bootstrap::minimal_core())
}

fn import_textdump(path: &Path) -> Result<WorldState, WorldOpenError> {
    info!(?path, "importing textdump");
    let file = File::open(path)?;
    let mut reader = loam_textdump::TextdumpReader::new(BufReader::new(file))?;
    let td = reader.read_textdump()?;
    let snapshot = loam_textdump::textdump_to_snapshot(&td)?;
    info!(objects = snapshot.objects.len(), "textdump imported");
    Ok(WorldState::from_snapshot(snapshot))
}
