use anyhow::{Context, Result};
use log::info;

use crate::entry::Entry;
use crate::entry_args::EntryArgs;
use crate::lifecycle::edit_entry;
use crate::tracker::Tracker;

/// `edit`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct EditArgs {
    #[clap(help = "Replaces the description of the entry")]
    description: Option<String>,

    #[clap(
        short = 'a',
        long = "ago",
        default_value = "1",
        help = "Edit ago-th most recent entry"
    )]
    ago: usize,
}

pub struct EditCommand<'a, T: Tracker + ?Sized> {
    tracker: &'a T,
}

impl<'a, T: Tracker + ?Sized> EditCommand<'a, T> {
    /// 新しい`EditCommand`を返す。
    pub fn new(tracker: &'a T) -> Self {
        Self { tracker }
    }

    /// `edit`サブコマンドの処理を行う。
    ///
    /// `ago`番目に新しいエントリーの開始時刻、終了時刻、作業時間、説明文を上書きして保存する。
    pub async fn run(&self, edit: EditArgs, entry_args: &EntryArgs) -> Result<Entry> {
        let entries = self
            .tracker
            .load_entries()
            .await
            .context("Failed to load time entries")?;
        let patch = entry_args.to_patch(edit.description);
        let entry = edit_entry(&entries, edit.ago, &patch)?;
        info!("Editing entry {}", entry.id.unwrap_or_default());

        let mut saved = self
            .tracker
            .save_entries(vec![entry.clone()])
            .await
            .context("Failed to save time entry")?;
        // 変更がなければFreshBooksには何も送られない
        Ok(saved.pop().unwrap_or(entry))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{EditArgs, EditCommand};
    use crate::entry::Entry;
    use crate::entry_args::EntryArgs;
    use crate::tracker::MockTracker;

    fn completed() -> Entry {
        let mut entry = Entry::new(Utc.with_ymd_and_hms(2020, 11, 21, 10, 0, 0).unwrap());
        entry.id = Some(1);
        entry.description = "old description".to_string();
        entry.end(Some(Duration::hours(2)), None);
        entry
    }

    #[tokio::test]
    async fn test_edit_command_changes_description_only() {
        let mut tracker = MockTracker::new();
        tracker
            .expect_load_entries()
            .times(1)
            .returning(|| Ok(vec![completed()]));
        tracker
            .expect_save_entries()
            .withf(|entries| {
                let original = completed();
                entries.len() == 1
                    && entries[0].description == "new description"
                    && entries[0].started_at == original.started_at
                    && entries[0].finished_at == original.finished_at
                    && entries[0].duration == original.duration
            })
            .times(1)
            .returning(Ok);
        let args = EditArgs {
            description: Some("new description".to_string()),
            ago: 1,
        };

        let command = EditCommand::new(&tracker);
        let entry = command.run(args, &EntryArgs::default()).await.unwrap();

        assert_eq!(entry.id, Some(1));
        assert_eq!(entry.description, "new description");
    }

    #[tokio::test]
    async fn test_edit_command_ago_out_of_range() {
        let mut tracker = MockTracker::new();
        tracker
            .expect_load_entries()
            .returning(|| Ok(vec![completed()]));
        tracker.expect_save_entries().never();
        let args = EditArgs {
            description: None,
            ago: 2,
        };

        let command = EditCommand::new(&tracker);
        let result = command.run(args, &EntryArgs::default()).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_edit_command_rejects_finished_at_with_duration() {
        let mut tracker = MockTracker::new();
        tracker
            .expect_load_entries()
            .returning(|| Ok(vec![completed()]));
        tracker.expect_save_entries().never();
        let entry_args = EntryArgs {
            finished_at: Some(Utc.with_ymd_and_hms(2020, 11, 21, 13, 0, 0).unwrap()),
            duration: Some(Duration::minutes(30)),
            ..Default::default()
        };
        let args = EditArgs {
            description: None,
            ago: 1,
        };

        let command = EditCommand::new(&tracker);
        let result = command.run(args, &entry_args).await;

        assert!(result.is_err());
    }
}
