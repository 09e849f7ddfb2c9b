use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};

use crate::entry::{assign_ids, merge_entries, sort_entries, Entry, IdentityKey};
use crate::error::TrackError;
use crate::lifecycle::{ensure_can_start, finish_entry, EntryPatch};
use crate::tracker::Tracker;

/// ローカルのJSONファイルにエントリーを記録する。
#[derive(Clone, Debug)]
pub struct LocalTracker {
    log_location: PathBuf,
}

impl LocalTracker {
    /// 新しい`LocalTracker`を返す。
    ///
    /// # Arguments
    ///
    /// * `log_location` - エントリーを記録するJSONファイルのパス
    pub fn new(log_location: impl AsRef<Path>) -> Self {
        Self {
            log_location: log_location.as_ref().to_path_buf(),
        }
    }

    /// ファイルに記録された順でエントリーを読み込む。ファイルがない場合は空とする。
    pub fn read_entries(&self) -> Result<Vec<Entry>, TrackError> {
        let content = match fs::read_to_string(&self.log_location) {
            Ok(content) => content,
            Err(err) => {
                return match TrackError::from_io(&self.log_location, err) {
                    TrackError::NotFound(_) => Ok(Vec::new()),
                    err => Err(err),
                }
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    /// エントリーをIDでマージしてファイルに書き込み、保存後の`entries`を返す。
    ///
    /// IDのないエントリーには連番のIDを割り当てる。ファイルは開始時刻の昇順で全体を書き直す。
    pub fn write_entries(&self, entries: Vec<Entry>) -> Result<Vec<Entry>, TrackError> {
        let current = self.read_entries()?;
        let existing_ids: HashSet<u64> = current.iter().filter_map(|entry| entry.id).collect();
        let base_len = current.len();

        let mut merged = merge_entries(&current, &entries, IdentityKey::Id)?;
        assign_ids(&mut merged);

        // 追加されたエントリーはマージ結果の末尾に入力順で並んでいる
        let mut appended = merged[base_len..].iter();
        let saved = entries
            .iter()
            .filter_map(|entry| match entry.id {
                Some(id) if existing_ids.contains(&id) => {
                    merged.iter().find(|merged| merged.id == Some(id))
                }
                _ => appended.next(),
            })
            .cloned()
            .collect();

        sort_entries(&mut merged);
        let data = serde_json::to_string_pretty(&merged)?;
        fs::write(&self.log_location, data)
            .map_err(|err| TrackError::from_io(&self.log_location, err))?;
        debug!(
            "Wrote {} entries to {}",
            merged.len(),
            self.log_location.display()
        );

        Ok(saved)
    }
}

#[async_trait]
impl Tracker for LocalTracker {
    async fn start(&self, entry: Entry) -> Result<Entry> {
        let entries = self.read_entries().context("Failed to load entries")?;
        ensure_can_start(&entries)?;

        let mut saved = self
            .write_entries(vec![entry])
            .context("Failed to save entry")?;
        saved.pop().context("Saved entry is missing")
    }

    async fn finish(&self, patch: &EntryPatch) -> Result<Entry> {
        let entries = self.read_entries().context("Failed to load entries")?;
        let entry = finish_entry(&entries, patch)?;
        info!("Updating entry {} in the log", entry.id.unwrap_or_default());

        let mut saved = self
            .write_entries(vec![entry])
            .context("Failed to save entry")?;
        saved.pop().context("Saved entry is missing")
    }

    async fn load_entries(&self) -> Result<Vec<Entry>> {
        let mut entries = self.read_entries().with_context(|| {
            format!("Failed to load entries from {}", self.log_location.display())
        })?;
        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn save_entries(&self, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        self.write_entries(entries).with_context(|| {
            format!("Failed to save entries to {}", self.log_location.display())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::TempDir;

    use super::LocalTracker;
    use crate::entry::Entry;
    use crate::error::TrackError;
    use crate::lifecycle::EntryPatch;
    use crate::tracker::Tracker;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, 21, hour, 0, 0).unwrap()
    }

    fn tracker(dir: &TempDir) -> LocalTracker {
        LocalTracker::new(dir.path().join("ttrack.log.json"))
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();

        assert!(tracker(&dir).read_entries().unwrap().is_empty());
    }

    #[test]
    fn test_read_invalid_file() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        fs::write(dir.path().join("ttrack.log.json"), "{not json").unwrap();

        assert!(matches!(tracker.read_entries(), Err(TrackError::Json(_))));
    }

    #[test]
    fn test_write_assigns_sequential_ids() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let saved = tracker
            .write_entries(vec![Entry::new(at(12)), Entry::new(at(10))])
            .unwrap();
        let more = tracker.write_entries(vec![Entry::new(at(14))]).unwrap();

        assert_eq!(saved[0].id, Some(1));
        assert_eq!(saved[1].id, Some(2));
        assert_eq!(more[0].id, Some(3));
        let ids: Vec<_> = tracker
            .read_entries()
            .unwrap()
            .iter()
            .map(|entry| entry.id)
            .collect();
        assert_eq!(ids, vec![Some(2), Some(1), Some(3)]);
    }

    #[test]
    fn test_write_updates_by_id() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let mut saved = tracker.write_entries(vec![Entry::new(at(10))]).unwrap();
        saved[0].description = "updated".to_string();

        let updated = tracker.write_entries(saved).unwrap();

        let entries = tracker.read_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "updated");
        assert_eq!(updated[0], entries[0]);
    }

    #[test]
    fn test_write_is_pretty_printed() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        tracker.write_entries(vec![Entry::new(at(10))]).unwrap();

        let content = fs::read_to_string(dir.path().join("ttrack.log.json")).unwrap();
        assert!(content.starts_with("[\n  {\n    \"id\": 1,"));
    }

    /// 空のログで開始し、2時間後に引数なしで終了する。
    #[tokio::test]
    async fn test_start_then_finish() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let mut entry = Entry::new(at(10));
        entry.description = "code".to_string();

        let started = tracker.start(entry).await.unwrap();
        let patch = EntryPatch {
            finished_at: Some(at(10) + Duration::hours(2)),
            ..Default::default()
        };
        let finished = tracker.finish(&patch).await.unwrap();

        assert_eq!(started.id, Some(1));
        assert!(started.in_progress());
        assert_eq!(finished.id, Some(1));
        assert_eq!(finished.duration, 7200);
        assert_eq!(finished.finished_at, Some(at(12)));
        assert_eq!(finished.description, "code");
        assert_eq!(tracker.load_entries().await.unwrap(), vec![finished]);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        tracker.start(Entry::new(at(10))).await.unwrap();

        let result = tracker.start(Entry::new(at(11))).await;

        assert!(result.is_err());
        assert_eq!(tracker.load_entries().await.unwrap().len(), 1);
    }

    /// 終了したエントリーと同じ時刻に開始した場合も、進行中のエントリーは1つだけになる。
    #[tokio::test]
    async fn test_start_at_same_minute_as_finished_entry() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        tracker.start(Entry::new(at(9))).await.unwrap();
        let patch = EntryPatch {
            finished_at: Some(at(9)),
            ..Default::default()
        };
        tracker.finish(&patch).await.unwrap();

        let started = tracker.start(Entry::new(at(9))).await.unwrap();
        let again = tracker.start(Entry::new(at(9))).await;
        let finished = tracker
            .finish(&EntryPatch {
                duration: Some(Duration::minutes(30)),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(again.is_err());
        assert_eq!(started.id, Some(2));
        assert_eq!(finished.id, Some(2));
        assert_eq!(finished.duration, 1800);
        let entries = tracker.load_entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| !entry.in_progress()));
    }

    #[tokio::test]
    async fn test_finish_without_entries_fails() {
        let dir = TempDir::new().unwrap();
        let patch = EntryPatch {
            finished_at: Some(at(12)),
            ..Default::default()
        };

        let result = tracker(&dir).finish(&patch).await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackError>(),
            Some(TrackError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_finish_twice_fails() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let patch = EntryPatch {
            duration: Some(Duration::minutes(30)),
            ..Default::default()
        };
        tracker.start(Entry::new(at(10))).await.unwrap();
        tracker.finish(&patch).await.unwrap();

        assert!(tracker.finish(&patch).await.is_err());
    }
}
