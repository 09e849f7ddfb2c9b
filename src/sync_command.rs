use anyhow::Result;
use log::info;

use crate::entry::Entry;
use crate::freshbooks::{FreshBooksRepository, FreshBooksTracker};

pub struct SyncCommand<'a, R: FreshBooksRepository> {
    tracker: &'a FreshBooksTracker<R>,
}

impl<'a, R: FreshBooksRepository> SyncCommand<'a, R> {
    /// 新しい`SyncCommand`を返す。
    pub fn new(tracker: &'a FreshBooksTracker<R>) -> Self {
        Self { tracker }
    }

    /// `sync`サブコマンドの処理を行う。
    ///
    /// FreshBooksのエントリーとローカルのログをマージしてローカルのログに保存する。
    pub async fn run(&self) -> Result<Vec<Entry>> {
        info!("Syncing time entries...");
        let entries = self.tracker.sync_entries().await?;
        info!("Synced {} time entries", entries.len());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::SyncCommand;
    use crate::entry::Entry;
    use crate::freshbooks::{FreshBooksTracker, MockFreshBooksRepository};
    use crate::local::LocalTracker;
    use crate::time_entry::{TimeEntriesPage, TimeEntry};

    fn time_entry(id: u64, hour: u32, note: &str) -> TimeEntry {
        TimeEntry {
            note: Some(note.to_string()),
            duration: 3600,
            client_id: Some(7),
            project_id: None,
            is_logged: true,
            started_at: Utc.with_ymd_and_hms(2020, 11, 21, hour, 0, 0).unwrap(),
            active: true,
            id: Some(id),
        }
    }

    #[tokio::test]
    async fn test_sync_keeps_local_only_entries() {
        let dir = TempDir::new().unwrap();
        let log_location = dir.path().join("ttrack.log.json");
        let local = LocalTracker::new(&log_location);
        let mut offline = Entry::new(Utc.with_ymd_and_hms(2020, 11, 20, 9, 0, 0).unwrap());
        offline.description = "offline work".to_string();
        local.write_entries(vec![offline]).unwrap();

        let mut repository = MockFreshBooksRepository::new();
        repository.expect_read_business_id().times(1).returning(|| Ok(42));
        repository
            .expect_read_time_entries_page()
            .withf(|business_id, page| *business_id == 42 && *page == 1)
            .times(1)
            .returning(|_, _| {
                Ok(TimeEntriesPage {
                    time_entries: vec![time_entry(123, 10, "remote work")],
                    page: 1,
                    pages: 1,
                })
            });
        let tracker = FreshBooksTracker::new(repository, local);

        SyncCommand::new(&tracker).run().await.unwrap();

        let entries = LocalTracker::new(&log_location).read_entries().unwrap();
        let descriptions: Vec<_> = entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["offline work", "remote work"]);
        assert_eq!(entries[1].external_id, Some(123));
        assert_eq!(entries[1].id, Some(2));
    }
}
