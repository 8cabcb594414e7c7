//! Dataset snapshot persistence.
//!
//! One JSON file per export. Saves are atomic (temp file + rename) and the
//! previous snapshot is copied to a timestamped backup first, so a crashed
//! run can never destroy history.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::Dataset;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to write snapshot: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to persist snapshot: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Load the prior snapshot. Any failure (missing file, unreadable file,
/// unparsable JSON) yields `None`; the caller degrades to a full,
/// non-incremental run.
pub fn load_dataset(path: &Path) -> Option<Dataset> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "unreadable snapshot");
            }
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(dataset) => Some(dataset),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "unparsable snapshot, ignoring");
            None
        }
    }
}

/// Save a snapshot atomically, backing up any existing file beside it as
/// `<stem>_backup_<unix-ts>.json` first.
pub fn save_dataset(path: &Path, dataset: &Dataset) -> Result<(), SnapshotError> {
    if path.exists() {
        let backup = backup_path(path);
        std::fs::copy(path, &backup)?;
        tracing::info!(backup = %backup.display(), "backed up previous snapshot");
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(serde_json::to_string_pretty(dataset)?.as_bytes())?;
    tmp.persist(path)?;
    Ok(())
}

fn backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("snapshot");
    let ts = chrono::Local::now().timestamp();
    path.with_file_name(format!("{stem}_backup_{ts}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Contact, Message, contact_id};

    fn sample_dataset() -> Dataset {
        let mut dataset = Dataset {
            contacts: vec![Contact {
                id: contact_id("+15551234567"),
                canonical_key: "+15551234567".to_string(),
                display_name: "Alice".to_string(),
                is_group: false,
                participants: vec![],
                message_count: 1,
            }],
            messages: vec![Message {
                id: 1,
                contact_id: contact_id("+15551234567"),
                content: "hello".to_string(),
                date: "2025-01-01 10:00:00".to_string(),
                is_from_me: true,
            }],
            images: vec![],
            statistics: Default::default(),
        };
        dataset.finalize();
        dataset
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let dataset = sample_dataset();

        save_dataset(&path, &dataset).unwrap();
        let loaded = load_dataset(&path).unwrap();
        assert_eq!(loaded.messages, dataset.messages);
        assert_eq!(loaded.contacts, dataset.contacts);
        assert_eq!(loaded.statistics, dataset.statistics);
    }

    #[test]
    fn missing_snapshot_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dataset(&dir.path().join("absent.json")).is_none());
    }

    #[test]
    fn corrupt_snapshot_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{ truncated").unwrap();
        assert!(load_dataset(&path).is_none());
    }

    #[test]
    fn overwrite_creates_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let dataset = sample_dataset();

        save_dataset(&path, &dataset).unwrap();
        save_dataset(&path, &dataset).unwrap();

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with("data_backup_")
            })
            .collect();
        assert_eq!(backups.len(), 1);
    }
}
