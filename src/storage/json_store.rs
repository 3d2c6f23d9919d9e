use crate::config::Config;
use crate::error::{StatsError, StatsResult};
use crate::storage::document::StatsDocument;
use crate::storage::lock::lock_for;
use crate::storage::migrations::{LegacyStats, migrate_legacy};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

pub const STATS_FILE_NAME: &str = "stats.json";

/// How [`StatsStore::load_with_status`] obtained its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No file yet.
    Fresh,
    /// Current tiered format.
    Current,
    /// Legacy flat list converted to tiers; not yet written back.
    Migrated { records: usize },
    /// File unreadable or unparsable; replaced by an empty document.
    Recovered,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredStats {
    Current(StatsDocument),
    Legacy(LegacyStats),
}

/// The single JSON file backing the stats document.
#[derive(Debug, Clone)]
pub struct StatsStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl StatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = lock_for(&path);
        Self { path, lock }
    }

    /// Store at `~/.config/compstats/stats.json`.
    pub fn at_default_path() -> anyhow::Result<Self> {
        Ok(Self::new(Config::config_dir()?.join(STATS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the in-process mutex for this file.
    pub async fn lock(&self) -> OwnedMutexGuard<()> {
        self.lock.clone().lock_owned().await
    }

    /// Load the document; never fails. See [`Self::load_with_status`].
    pub fn load(&self, now: DateTime<Utc>) -> StatsDocument {
        self.load_with_status(now).0
    }

    /// Load the document, migrating a legacy file in memory. A missing or
    /// corrupt file yields an empty document.
    pub fn load_with_status(&self, now: DateTime<Utc>) -> (StatsDocument, LoadStatus) {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No stats file at {}, starting fresh", self.path.display());
                return (StatsDocument::new(), LoadStatus::Fresh);
            }
            Err(e) => {
                warn!("Cannot read stats file {}: {e}; starting fresh", self.path.display());
                return (StatsDocument::new(), LoadStatus::Recovered);
            }
        };

        match serde_json::from_str::<StoredStats>(&contents) {
            Ok(StoredStats::Current(doc)) => (doc, LoadStatus::Current),
            Ok(StoredStats::Legacy(legacy)) => {
                let records = legacy.into_records();
                let count = records.len();
                warn!(
                    "Migrating legacy stats file {} ({count} records)",
                    self.path.display()
                );
                (migrate_legacy(records, now), LoadStatus::Migrated { records: count })
            }
            Err(e) => {
                warn!(
                    "Stats file {} is corrupt ({e}); starting fresh",
                    self.path.display()
                );
                self.preserve_corrupt_file();
                (StatsDocument::new(), LoadStatus::Recovered)
            }
        }
    }

    /// Keep a copy of an unparsable file before it gets overwritten.
    fn preserve_corrupt_file(&self) {
        let backup = self.path.with_extension("json.corrupt");
        if let Err(e) = fs::copy(&self.path, &backup) {
            warn!("Could not back up corrupt stats file: {e}");
        }
    }

    /// Write the whole document to a temp file, then rename it over the
    /// stats file so readers never see a partial write.
    pub fn save(&self, doc: &StatsDocument) -> StatsResult<()> {
        let storage_err = |source: std::io::Error| StatsError::Storage {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(storage_err)?;
            }
        }

        let json = serde_json::to_vec_pretty(doc)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let write_tmp = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()
        };
        if let Err(e) = write_tmp() {
            let _ = fs::remove_file(&tmp_path);
            return Err(storage_err(e));
        }
        fs::rename(&tmp_path, &self.path).map_err(storage_err)?;

        debug!("Saved stats to {}", self.path.display());
        Ok(())
    }
}
