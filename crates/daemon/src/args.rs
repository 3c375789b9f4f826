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

use clap::Parser;
use figment::Figment;
use figment::providers::{Format, Serialized, Yaml};
use loam_kernel::config::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "loam-daemon", about = "A LambdaMOO-compatible world server")]
pub struct Args {
    /// Path to a YAML config file; CLI flags override its values. Unknown keys in the
    /// file are ignored.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base directory for runtime data (checkpoints, lock files).
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Import this textdump instead of resuming from the latest binary snapshot.
    #[arg(long)]
    pub import: Option<PathBuf>,

    /// Address for the line-protocol listener, e.g. 0.0.0.0:7777.
    #[arg(long)]
    pub listen: Option<String>,

    /// World name for banners and server_version().
    #[arg(long)]
    pub world_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read configuration: {0}")]
    Figment(#[from] Box<figment::Error>),
}

impl Args {
    /// Defaults, then the config file, then the CLI flags on top.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = &self.config {
            figment = figment.merge(Yaml::file(path));
        }
        let mut config: Config = figment.extract().map_err(Box::new)?;
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(listen) = &self.listen {
            config.listen_address = listen.clone();
        }
        if let Some(world_name) = &self.world_name {
            config.world_name = world_name.clone();
        }
        Ok(config)
    }
}
