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

use crate::config::CheckpointConfig;
use loam_db::{WorldState, WorldStateSnapshot};
use loam_textdump::{TextdumpWriter, snapshot_to_textdump};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{error, info, warn};

const BINARY_EXT: &str = "bin";
const TEXT_EXT: &str = "moo";

/// The age past which one export per retention pass is sacred: we always leave at least
/// one file older than this on disk if one existed.
const DAY_OLD: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error during checkpoint: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error during checkpoint: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("decode error during checkpoint: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// Two background jobs with independent clocks: fast binary snapshots for crash recovery,
/// slower textdump exports for archival and interchange. Both write `<file>.part` then
/// rename, so a torn write never shadows a good generation.
pub struct CheckpointManager {
    world_state: Arc<WorldState>,
    config: CheckpointConfig,
    dir: PathBuf,
    running: Arc<AtomicBool>,
    export_poke: flume::Sender<()>,
}

impl CheckpointManager {
    /// Spawn the periodic jobs (when enabled) and return the manager handle.
    pub fn start(
        world_state: Arc<WorldState>,
        config: CheckpointConfig,
        data_dir: &Path,
    ) -> Result<Arc<Self>, CheckpointError> {
        let dir = if config.checkpoint_dir.is_absolute() {
            config.checkpoint_dir.clone()
        } else {
            data_dir.join(&config.checkpoint_dir)
        };
        fs::create_dir_all(&dir)?;
        let running = Arc::new(AtomicBool::new(true));
        let (export_poke, export_poked) = flume::unbounded();
        let manager = Arc::new(Self {
            world_state,
            config,
            dir,
            running,
            export_poke,
        });

        if let Some(interval) = manager.config.snapshot_interval() {
            let m = manager.clone();
            std::thread::Builder::new()
                .name("loam-snapshot".to_string())
                .spawn(move || {
                    while m.running.load(Ordering::SeqCst) {
                        interruptible_sleep(&m.running, interval);
                        if !m.running.load(Ordering::SeqCst) {
                            break;
                        }
                        if let Err(e) = m.write_binary_snapshot() {
                            error!(?e, "binary snapshot failed");
                        }
                    }
                })
                .expect("could not spawn snapshot thread");
        }
        if let Some(interval) = manager.config.export_interval() {
            let m = manager.clone();
            std::thread::Builder::new()
                .name("loam-export".to_string())
                .spawn(move || {
                    while m.running.load(Ordering::SeqCst) {
                        // Wake early when dump_database() pokes us.
                        let _ = export_poked.recv_timeout(interval);
                        if !m.running.load(Ordering::SeqCst) {
                            break;
                        }
                        if let Err(e) = m.write_text_export() {
                            error!(?e, "textdump export failed");
                        }
                    }
                })
                .expect("could not spawn export thread");
        }
        Ok(manager)
    }

    /// Final snapshot, then stop the clocks.
    pub fn shutdown(&self) {
        if self.config.snapshot_interval().is_some() {
            if let Err(e) = self.write_binary_snapshot() {
                error!(?e, "final shutdown snapshot failed");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Request an immediate textdump export from the export thread.
    pub fn export_text_now(&self) {
        let _ = self.export_poke.send(());
    }

    pub fn write_binary_snapshot(&self) -> Result<Option<PathBuf>, CheckpointError> {
        let snapshot = self.world_state.snapshot();
        if snapshot.is_empty() {
            warn!("database is empty; skipping binary snapshot");
            return Ok(None);
        }
        let path = self.dir.join(format!("loam-{}.{BINARY_EXT}", unix_now()));
        let part = path.with_extension("part");
        {
            let mut out = BufWriter::new(fs::File::create(&part)?);
            let encoded = bincode::encode_to_vec(&snapshot, bincode::config::standard())?;
            out.write_all(&encoded)?;
            out.flush()?;
        }
        fs::rename(&part, &path)?;
        info!(?path, objects = snapshot.objects.len(), "binary snapshot written");
        self.apply_retention(BINARY_EXT, self.config.binary_keep, false)?;
        Ok(Some(path))
    }

    pub fn write_text_export(&self) -> Result<Option<PathBuf>, CheckpointError> {
        let snapshot = self.world_state.snapshot();
        if snapshot.is_empty() {
            warn!("database is empty; skipping textdump export");
            return Ok(None);
        }
        let path = self.dir.join(format!("loam-{}.{TEXT_EXT}", unix_now()));
        let part = path.with_extension("part");
        {
            let out = BufWriter::new(fs::File::create(&part)?);
            let td = snapshot_to_textdump(&snapshot);
            let mut writer = TextdumpWriter::new(out);
            writer.write_textdump(&td)?;
        }
        fs::rename(&part, &path)?;
        info!(?path, objects = snapshot.objects.len(), "textdump export written");
        self.apply_retention(TEXT_EXT, self.config.text_keep, true)?;
        Ok(Some(path))
    }

    fn apply_retention(
        &self,
        ext: &str,
        keep: usize,
        preserve_day_old: bool,
    ) -> Result<(), CheckpointError> {
        let mut files = vec![];
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(UNIX_EPOCH);
            files.push((path, modified));
        }
        for path in retention_victims(files, keep, preserve_day_old, SystemTime::now()) {
            info!(?path, "retention removing old checkpoint");
            if let Err(e) = fs::remove_file(&path) {
                warn!(?e, ?path, "could not remove old checkpoint");
            }
        }
        Ok(())
    }
}

/// Load the most recent binary snapshot in a directory, if any.
pub fn load_latest_snapshot(dir: &Path) -> Result<Option<WorldStateSnapshot>, CheckpointError> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Ok(None);
    };
    let mut candidates: Vec<(PathBuf, SystemTime)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().extension().and_then(|x| x.to_str()) == Some(BINARY_EXT)
        })
        .map(|e| {
            let modified = e
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(UNIX_EPOCH);
            (e.path(), modified)
        })
        .collect();
    candidates.sort_by_key(|(_, t)| *t);
    let Some((path, _)) = candidates.pop() else {
        return Ok(None);
    };
    info!(?path, "loading binary snapshot");
    Ok(Some(load_snapshot_file(&path)?))
}

pub fn load_snapshot_file(path: &Path) -> Result<WorldStateSnapshot, CheckpointError> {
    let bytes = fs::read(path)?;
    let (snapshot, _) = bincode::decode_from_slice(&bytes, bincode::config::standard())?;
    Ok(snapshot)
}

/// Decide which files retention deletes. Keeps the newest `keep`; when `preserve_day_old`
/// is set and no survivor is older than 24 hours, the youngest day-old candidate is
/// rescued and the youngest would-be survivor is deleted in its place.
fn retention_victims(
    mut files: Vec<(PathBuf, SystemTime)>,
    keep: usize,
    preserve_day_old: bool,
    now: SystemTime,
) -> Vec<PathBuf> {
    if files.len() <= keep {
        return vec![];
    }
    // Newest first.
    files.sort_by(|a, b| b.1.cmp(&a.1));
    let is_day_old = |t: &SystemTime| {
        now.duration_since(*t)
            .map(|age| age >= DAY_OLD)
            .unwrap_or(false)
    };
    let mut survivors: Vec<usize> = (0..keep).collect();
    if preserve_day_old && !survivors.iter().any(|i| is_day_old(&files[*i].1)) {
        // The youngest candidate past the age threshold, i.e. the first one in
        // newest-first order beyond the keep window.
        if let Some(rescue) = (keep..files.len()).find(|i| is_day_old(&files[*i].1)) {
            survivors.pop();
            survivors.push(rescue);
        }
    }
    files
        .iter()
        .enumerate()
        .filter(|(i, _)| !survivors.contains(i))
        .map(|(_, (p, _))| p.clone())
        .collect()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn interruptible_sleep(running: &AtomicBool, total: Duration) {
    let step = Duration::from_millis(250);
    let mut slept = Duration::ZERO;
    while slept < total && running.load(Ordering::SeqCst) {
        let chunk = step.min(total - slept);
        std::thread::sleep(chunk);
        slept += chunk;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(name: &str, age_secs: u64, now: SystemTime) -> (PathBuf, SystemTime) {
        (
            PathBuf::from(name),
            now - Duration::from_secs(age_secs),
        )
    }

    #[test]
    fn test_retention_keeps_newest() {
        let now = SystemTime::now();
        let files = vec![f("a", 10, now), f("b", 20, now), f("c", 30, now)];
        let victims = retention_victims(files, 2, false, now);
        assert_eq!(victims, vec![PathBuf::from("c")]);
    }

    #[test]
    fn test_retention_under_limit_deletes_nothing() {
        let now = SystemTime::now();
        let files = vec![f("a", 10, now)];
        assert!(retention_victims(files, 2, false, now).is_empty());
    }

    #[test]
    fn test_day_old_survivor_guaranteed() {
        let now = SystemTime::now();
        let day = 24 * 60 * 60;
        // Three fresh files and two old generations; keep=3 would normally delete both
        // old ones.
        let files = vec![
            f("fresh1", 10, now),
            f("fresh2", 20, now),
            f("fresh3", 30, now),
            f("old1", day + 100, now),
            f("old2", 3 * day, now),
        ];
        let victims = retention_victims(files, 3, true, now);
        // The youngest day-old file survives; the freshest would-be survivor (fresh3) is
        // sacrificed along with the oldest.
        assert!(victims.contains(&PathBuf::from("fresh3")));
        assert!(victims.contains(&PathBuf::from("old2")));
        assert!(!victims.contains(&PathBuf::from("old1")));
        assert_eq!(victims.len(), 2);
    }

    #[test]
    fn test_day_old_not_invoked_when_survivor_exists() {
        let now = SystemTime::now();
        let day = 24 * 60 * 60;
        let files = vec![
            f("fresh1", 10, now),
            f("old1", day + 100, now),
            f("old2", 2 * day, now),
        ];
        // keep=2 keeps fresh1 and old1; old1 already satisfies the guarantee.
        let victims = retention_victims(files, 2, true, now);
        assert_eq!(victims, vec![PathBuf::from("old2")]);
    }

    #[test]
    fn test_binary_snapshot_roundtrip() {
        use loam_common::model::{ObjFlag, Perms};
        use loam_common::util::BitEnum;
        use loam_var::{NOTHING, Obj, Symbol, v_int};

        let ws = Arc::new(WorldState::new());
        let perms = Perms::new(Obj::mk_id(0), BitEnum::new_with(ObjFlag::Wizard));
        let root = ws.create_object(&perms, NOTHING, Obj::mk_id(0)).unwrap();
        ws.define_property(
            &perms,
            root,
            &Symbol::mk("p"),
            Obj::mk_id(0),
            loam_common::model::PropFlag::rc(),
            v_int(1),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let config = CheckpointConfig {
            checkpoint_dir: dir.path().to_path_buf(),
            snapshot_interval_seconds: None,
            export_interval_seconds: None,
            ..Default::default()
        };
        let manager = CheckpointManager::start(ws.clone(), config, dir.path()).unwrap();
        let path = manager.write_binary_snapshot().unwrap().unwrap();

        // Mutate, then restore from the snapshot.
        ws.update_property(&perms, root, &Symbol::mk("p"), v_int(99))
            .unwrap();
        let snap = load_snapshot_file(&path).unwrap();
        ws.load_snapshot(snap);
        assert_eq!(
            ws.retrieve_property(&perms, root, &Symbol::mk("p")).unwrap(),
            v_int(1)
        );
    }

    #[test]
    fn test_empty_database_skipped() {
        let ws = Arc::new(WorldState::new());
        let dir = tempfile::tempdir().unwrap();
        let config = CheckpointConfig {
            checkpoint_dir: dir.path().to_path_buf(),
            snapshot_interval_seconds: None,
            export_interval_seconds: None,
            ..Default::default()
        };
        let manager = CheckpointManager::start(ws, config, dir.path()).unwrap();
        assert!(manager.write_binary_snapshot().unwrap().is_none());
        assert!(manager.write_text_export().unwrap().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
