use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tch::Tensor;
use super::model::GanModel;

pub const MODEL_NAME: &str = "one_class_gan.model";
const INDEX_FILE: &str = "checkpoint.json";
const SNAPSHOT_EXTENSION: &str = "ot";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub file_name: String,
    pub step: u64,
    pub timestamp: DateTime<Utc>,
}

/// On-disk index of the snapshots of one model, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointIndex {
    pub snapshots: Vec<SnapshotEntry>,
}

impl CheckpointIndex {
    pub fn latest(&self) -> Option<&SnapshotEntry> {
        self.snapshots.last()
    }
}

/// Writes and restores snapshots of both networks under a directory keyed by
/// the model identity (`{dataset}_{batch}_{height}_{width}`).
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    model_key: String,
    max_to_keep: usize,
}

impl CheckpointManager {
    pub fn new(model_key: impl Into<String>, max_to_keep: usize) -> Self {
        Self { model_key: model_key.into(), max_to_keep: max_to_keep.max(1) }
    }

    pub fn model_key(&self) -> &str {
        &self.model_key
    }

    pub fn model_dir(&self, directory: &Path) -> PathBuf {
        directory.join(&self.model_key)
    }

    pub fn snapshot_name(step: u64) -> String {
        format!("{}-{}.{}", MODEL_NAME, step, SNAPSHOT_EXTENSION)
    }

    /// Writes a new snapshot tagged with `step`, then prunes the oldest
    /// snapshots beyond the retention cap.
    pub fn save(&self, directory: &Path, step: u64, model: &GanModel) -> Result<PathBuf> {
        let model_dir = self.model_dir(directory);
        if !model_dir.exists() {
            fs::create_dir_all(&model_dir)?;
        }

        let file_name = Self::snapshot_name(step);
        let path = model_dir.join(&file_name);
        let named = model.named_variables();
        Tensor::save_multi(&named, &path)?;

        let mut index = self
            .read_index(&model_dir)
            .unwrap_or_else(|| scanned_index(&model_dir));
        index.snapshots.retain(|s| s.file_name != file_name);
        index.snapshots.push(SnapshotEntry { file_name, step, timestamp: Utc::now() });

        while index.snapshots.len() > self.max_to_keep {
            let evicted = index.snapshots.remove(0);
            let evicted_path = model_dir.join(&evicted.file_name);
            if let Err(e) = fs::remove_file(&evicted_path) {
                warn!("Failed to prune checkpoint {:?}: {}", evicted_path, e);
            }
        }

        self.write_index(&model_dir, &index)?;
        info!("Saved checkpoint {:?}", path);
        Ok(path)
    }

    /// Restores the newest snapshot into `model`. Returns `(false, 0)` when
    /// there is nothing usable to restore; a snapshot whose variables do not
    /// match the model is an error.
    pub fn load(&self, directory: &Path, model: &mut GanModel) -> Result<(bool, u64)> {
        info!(" [*] Reading checkpoints...");
        let model_dir = self.model_dir(directory);

        let file_name = match self.latest_snapshot(&model_dir) {
            Some(name) => name,
            None => {
                info!(" [*] Failed to find a checkpoint");
                return Ok((false, 0));
            }
        };
        let path = model_dir.join(&file_name);
        let step = trailing_number(&file_name).ok_or_else(|| Error::IncompatibleCheckpoint {
            path: path.display().to_string(),
            reason: "snapshot name carries no step number".to_string(),
        })?;

        let stored = match Tensor::load_multi(&path) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(" [*] Failed to read checkpoint {:?}: {}", path, e);
                return Ok((false, 0));
            }
        };

        restore(model, stored, &path)?;
        info!(" [*] Success to read {}", file_name);
        Ok((true, step))
    }

    /// Snapshot files of this model, oldest first.
    pub fn list(&self, directory: &Path) -> Vec<SnapshotEntry> {
        let model_dir = self.model_dir(directory);
        self.read_index(&model_dir)
            .unwrap_or_else(|| scanned_index(&model_dir))
            .snapshots
    }

    fn latest_snapshot(&self, model_dir: &Path) -> Option<String> {
        if let Some(entry) = self.read_index(model_dir).as_ref().and_then(|i| i.latest()) {
            if model_dir.join(&entry.file_name).exists() {
                return Some(entry.file_name.clone());
            }
            warn!("Checkpoint index points at missing file {}", entry.file_name);
        }
        scan_snapshots(model_dir).pop().map(|(_, name)| name)
    }

    fn read_index(&self, model_dir: &Path) -> Option<CheckpointIndex> {
        let raw = fs::read_to_string(model_dir.join(INDEX_FILE)).ok()?;
        match serde_json::from_str(&raw) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!("Ignoring unreadable checkpoint index in {:?}: {}", model_dir, e);
                None
            }
        }
    }

    fn write_index(&self, model_dir: &Path, index: &CheckpointIndex) -> Result<()> {
        let raw = serde_json::to_string_pretty(index)?;
        fs::write(model_dir.join(INDEX_FILE), raw)?;
        Ok(())
    }
}

/// Snapshot files found by listing the directory, sorted by step.
fn scan_snapshots(model_dir: &Path) -> Vec<(u64, String)> {
    let entries = match fs::read_dir(model_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut found: Vec<(u64, String)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(MODEL_NAME))
        .filter_map(|name| trailing_number(&name).map(|step| (step, name)))
        .collect();
    found.sort();
    found
}

/// Index rebuilt from the snapshot files on disk, used when `checkpoint.json`
/// is missing or unreadable.
fn scanned_index(model_dir: &Path) -> CheckpointIndex {
    CheckpointIndex {
        snapshots: scan_snapshots(model_dir)
            .into_iter()
            .map(|(step, file_name)| SnapshotEntry { file_name, step, timestamp: Utc::now() })
            .collect(),
    }
}

/// Last run of ASCII digits in `name`, e.g. 34 for `one_class_gan.model-34.ot`.
pub fn trailing_number(name: &str) -> Option<u64> {
    let end = name.rfind(|c: char| c.is_ascii_digit())? + 1;
    let start = name[..end]
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    name[start..end].parse().ok()
}

fn restore(model: &mut GanModel, stored: Vec<(String, Tensor)>, path: &Path) -> Result<()> {
    let incompatible = |reason: String| Error::IncompatibleCheckpoint {
        path: path.display().to_string(),
        reason,
    };

    let mut stored: HashMap<String, Tensor> = stored.into_iter().collect();
    let targets = model.named_variables();

    // Check everything before copying so a bad snapshot never half-loads.
    for (name, target) in &targets {
        let source = stored
            .get(name)
            .ok_or_else(|| incompatible(format!("missing variable {}", name)))?;
        if source.size() != target.size() {
            return Err(incompatible(format!(
                "variable {} has shape {:?}, model expects {:?}",
                name,
                source.size(),
                target.size()
            )));
        }
    }
    if stored.len() != targets.len() {
        return Err(incompatible(format!(
            "snapshot holds {} variables, model has {}",
            stored.len(),
            targets.len()
        )));
    }

    tch::no_grad(|| -> Result<()> {
        for (name, mut target) in targets {
            if let Some(source) = stored.remove(&name) {
                target.f_copy_(&source.to_device(target.device()))?;
            }
        }
        Ok(())
    })
}
