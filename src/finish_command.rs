use anyhow::{Context, Result};
use log::info;

use crate::datetime::{now, truncate_to_minute};
use crate::entry::Entry;
use crate::entry_args::EntryArgs;
use crate::tracker::Tracker;

/// `finish`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct FinishArgs {
    #[clap(help = "Replaces the description of the entry")]
    description: Option<String>,
}

pub struct FinishCommand<'a, T: Tracker + ?Sized> {
    tracker: &'a T,
}

impl<'a, T: Tracker + ?Sized> FinishCommand<'a, T> {
    /// 新しい`FinishCommand`を返す。
    pub fn new(tracker: &'a T) -> Self {
        Self { tracker }
    }

    /// `finish`サブコマンドの処理を行う。
    ///
    /// 最新の進行中のエントリーを終了させる。作業時間も終了時刻も指定されていない場合は、
    /// 現在時刻を分単位に切り捨てて終了時刻とする。
    pub async fn run(&self, finish: FinishArgs, entry_args: &EntryArgs) -> Result<Entry> {
        info!("Finishing last time entry...");
        let mut patch = entry_args.to_patch(finish.description);
        if patch.duration.is_none() && patch.finished_at.is_none() {
            patch.finished_at = Some(truncate_to_minute(now()));
        }

        self.tracker
            .finish(&patch)
            .await
            .context("Failed to finish time entry")
    }
}
