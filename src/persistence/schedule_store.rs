//! Timetable stores
//!
//! The in-memory timetable stays authoritative; stores only let a restart
//! resume the same day.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::TimetableSnapshot;
use crate::error::{Result, TableauError};

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Replace the stored timetable for the snapshot's day
    async fn save(&self, snapshot: &TimetableSnapshot) -> Result<()>;

    /// Stored timetable for `date`, if any
    async fn load(&self, date: NaiveDate) -> Result<Option<TimetableSnapshot>>;
}

/// Single JSON document on disk, overwritten on every save
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ScheduleStore for JsonFileStore {
    async fn save(&self, snapshot: &TimetableSnapshot) -> Result<()> {
        let body = serde_json::to_vec_pretty(snapshot)?;

        // Write-then-rename
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            entries = snapshot.entries.len(),
            "timetable saved"
        );
        Ok(())
    }

    async fn load(&self, date: NaiveDate) -> Result<Option<TimetableSnapshot>> {
        let body = match tokio::fs::read(&self.path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: TimetableSnapshot = serde_json::from_slice(&body).map_err(|e| {
            TableauError::CorruptRecord(format!("{}: {}", self.path.display(), e))
        })?;

        if snapshot.date != date {
            info!(
                path = %self.path.display(),
                stored = %snapshot.date,
                requested = %date,
                "stored timetable is for another day"
            );
            return Ok(None);
        }
        Ok(Some(snapshot))
    }
}

/// Keeps the last saved snapshot in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<TimetableSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn latest(&self) -> Option<TimetableSnapshot> {
        self.snapshot.lock().await.clone()
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn save(&self, snapshot: &TimetableSnapshot) -> Result<()> {
        *self.snapshot.lock().await = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self, date: NaiveDate) -> Result<Option<TimetableSnapshot>> {
        Ok(self
            .snapshot
            .lock()
            .await
            .clone()
            .filter(|s| s.date == date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScheduleEntry;
    use chrono::NaiveTime;

    fn snapshot(date: NaiveDate) -> TimetableSnapshot {
        let generated = date.and_hms_opt(8, 0, 0).unwrap();
        TimetableSnapshot {
            date,
            entries: vec![
                ScheduleEntry::new(900, NaiveTime::from_hms_opt(9, 0, 0).unwrap(), 3, generated),
                ScheduleEntry::new(1000, NaiveTime::from_hms_opt(10, 0, 0).unwrap(), 1, generated),
            ],
        }
    }

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tableau-{}-{}.json", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_json_store_same_day() {
        let path = scratch_path("same-day");
        let store = JsonFileStore::new(&path);
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        assert!(store.load(date).await.unwrap().is_none());
        store.save(&snapshot(date)).await.unwrap();
        assert_eq!(store.load(date).await.unwrap(), Some(snapshot(date)));

        let next_day = date.succ_opt().unwrap();
        assert!(store.load(next_day).await.unwrap().is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_json_store_records_hhmm() {
        let path = scratch_path("hhmm");
        let store = JsonFileStore::new(&path);
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        store.save(&snapshot(date)).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["entries"][0]["launch_time"], "08:57");
        assert_eq!(raw["entries"][0]["prediction_time"], "09:00");
        assert_eq!(raw["entries"][0]["launched"], false);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_json_store_corrupt_file() {
        let path = scratch_path("corrupt");
        std::fs::write(&path, b"{ not json").unwrap();
        let store = JsonFileStore::new(&path);
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        assert!(matches!(
            store.load(date).await,
            Err(TableauError::CorruptRecord(_))
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        store.save(&snapshot(date)).await.unwrap();
        assert!(store.load(date).await.unwrap().is_some());
        assert!(store.load(date.pred_opt().unwrap()).await.unwrap().is_none());
        assert_eq!(store.latest().await.unwrap().entries.len(), 2);
    }
}
