use crate::types::{ReportType, Snapshot, SnapshotKey};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Append-only history of snapshots, one per (report type, publication time)
pub trait SnapshotStore {
    fn get_latest(&self, report_type: ReportType) -> Result<Option<Snapshot>>;

    /// Store a new snapshot. Re-appending identical content is a no-op;
    /// different content under an existing key is an error.
    fn append(&mut self, snapshot: Snapshot) -> Result<()>;

    /// Every stored snapshot of a type, oldest first
    fn history(&self, report_type: ReportType) -> Result<Vec<Snapshot>>;
}

/// On-disk envelope around a snapshot
#[derive(Debug, Serialize, Deserialize)]
struct StoredSnapshot {
    stored_at: DateTime<Utc>,
    snapshot: Snapshot,
}

/// One pretty-printed JSON file per snapshot:
/// `<data_dir>/<report_type>/<YYYY-MM-DDTHHMM>.json`
pub struct FileSnapshotStore {
    data_dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating snapshot directory {}", data_dir.display()))?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn type_dir(&self, report_type: ReportType) -> PathBuf {
        self.data_dir.join(report_type.as_str())
    }

    fn snapshot_path(&self, key: &SnapshotKey) -> PathBuf {
        self.type_dir(key.report_type)
            .join(format!("{}.json", key.published.format("%Y-%m-%dT%H%M")))
    }

    fn read(path: &Path) -> Result<Snapshot> {
        let json_str = fs::read_to_string(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        let stored: StoredSnapshot = serde_json::from_str(&json_str)
            .map_err(|e| anyhow!("Failed to deserialize snapshot {}: {}", path.display(), e))?;
        Ok(stored.snapshot)
    }

    /// Snapshot files of a type in chronological (= lexicographic) order
    fn snapshot_files(&self, report_type: ReportType) -> Result<Vec<PathBuf>> {
        let dir = self.type_dir(report_type);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn get_latest(&self, report_type: ReportType) -> Result<Option<Snapshot>> {
        match self.snapshot_files(report_type)?.last() {
            Some(path) => Ok(Some(Self::read(path)?)),
            None => Ok(None),
        }
    }

    fn append(&mut self, snapshot: Snapshot) -> Result<()> {
        let key = snapshot.key();
        let path = self.snapshot_path(&key);

        if path.exists() {
            let existing = Self::read(&path)?;
            if existing == snapshot {
                tracing::debug!(%key, "snapshot already stored");
                return Ok(());
            }
            return Err(anyhow!(
                "a different snapshot for {} is already stored at {}",
                key,
                path.display()
            ));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredSnapshot {
            stored_at: Utc::now(),
            snapshot,
        };
        let json_str = serde_json::to_string_pretty(&stored)
            .map_err(|e| anyhow!("Failed to serialize snapshot: {}", e))?;

        // Write-then-rename keeps a half-written file from ever being "latest"
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json_str)
            .with_context(|| format!("writing {}", temp_path.display()))?;
        fs::rename(&temp_path, &path)
            .with_context(|| format!("moving snapshot into place at {}", path.display()))?;

        tracing::info!(%key, path = %path.display(), "stored snapshot");
        Ok(())
    }

    fn history(&self, report_type: ReportType) -> Result<Vec<Snapshot>> {
        self.snapshot_files(report_type)?
            .iter()
            .map(|path| Self::read(path))
            .collect()
    }
}

/// Store held in memory, for tests and one-off runs
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: BTreeMap<SnapshotKey, Snapshot>,
    appends: usize,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshots.insert(snapshot.key(), snapshot);
        self
    }

    /// Number of snapshots actually written through `append`
    pub fn append_count(&self) -> usize {
        self.appends
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn get_latest(&self, report_type: ReportType) -> Result<Option<Snapshot>> {
        Ok(self
            .snapshots
            .values()
            .filter(|s| s.report_type() == report_type)
            .max_by_key(|s| s.published())
            .cloned())
    }

    fn append(&mut self, snapshot: Snapshot) -> Result<()> {
        let key = snapshot.key();
        match self.snapshots.get(&key) {
            Some(existing) if *existing == snapshot => Ok(()),
            Some(_) => Err(anyhow!("a different snapshot for {key} is already stored")),
            None => {
                self.snapshots.insert(key, snapshot);
                self.appends += 1;
                Ok(())
            }
        }
    }

    fn history(&self, report_type: ReportType) -> Result<Vec<Snapshot>> {
        Ok(self
            .snapshots
            .values()
            .filter(|s| s.report_type() == report_type)
            .cloned()
            .collect())
    }
}

/// SHA-256 of downloaded report bytes, hex encoded
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistrictName, DistrictRecord, MetricValue};
    use chrono::NaiveDate;

    fn snapshot(day: u32, affected: i64) -> Snapshot {
        let published = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Snapshot::new(
            SnapshotKey::new(ReportType::Situation, published),
            "https://example.org/sitrep.pdf",
            content_digest(format!("report {day}").as_bytes()),
            vec![DistrictRecord {
                district: DistrictName::Canonical("Colombo".into()),
                metrics: [("affected".to_string(), MetricValue::Count(affected))].into(),
            }],
        )
    }

    fn temp_store() -> (FileSnapshotStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("dmc_monitor_test_{}", uuid::Uuid::new_v4()));
        (FileSnapshotStore::new(&dir).unwrap(), dir)
    }

    #[test]
    fn digest_is_full_sha256() {
        let digest = content_digest(b"abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_store_roundtrip_and_latest() {
        let (mut store, dir) = temp_store();
        assert!(store.get_latest(ReportType::Situation).unwrap().is_none());

        store.append(snapshot(2, 150)).unwrap();
        store.append(snapshot(1, 100)).unwrap();

        let latest = store.get_latest(ReportType::Situation).unwrap().unwrap();
        assert_eq!(latest, snapshot(2, 150));
        assert!(dir.join("situation").join("2024-01-02T1200.json").exists());

        let history = store.history(ReportType::Situation).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].published().date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(store.history(ReportType::Weather).unwrap().is_empty());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn file_store_is_append_only() {
        let (mut store, dir) = temp_store();
        store.append(snapshot(1, 100)).unwrap();
        store.append(snapshot(1, 100)).unwrap();
        assert!(store.append(snapshot(1, 999)).is_err());
        assert_eq!(store.get_latest(ReportType::Situation).unwrap().unwrap(), snapshot(1, 100));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn in_memory_store_counts_appends() {
        let mut store = InMemorySnapshotStore::new().with_snapshot(snapshot(1, 100));
        store.append(snapshot(2, 150)).unwrap();
        store.append(snapshot(2, 150)).unwrap();
        assert!(store.append(snapshot(2, 1)).is_err());

        assert_eq!(store.append_count(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_latest(ReportType::Situation).unwrap().unwrap(), snapshot(2, 150));
    }
}
