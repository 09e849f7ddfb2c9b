use anyhow::{Context, Result};
use log::info;

use crate::client::Client;
use crate::datetime::{now, truncate_to_minute};
use crate::entry::Entry;
use crate::entry_args::EntryArgs;
use crate::tracker::Tracker;

/// `start`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct StartArgs {
    #[clap(help = "Description of the entry")]
    description: Option<String>,
}

pub struct StartCommand<'a, T: Tracker + ?Sized> {
    tracker: &'a T,
}

impl<'a, T: Tracker + ?Sized> StartCommand<'a, T> {
    /// 新しい`StartCommand`を返す。
    ///
    /// # Arguments
    /// * `tracker` - エントリーを記録する先
    pub fn new(tracker: &'a T) -> Self {
        Self { tracker }
    }

    /// `start`サブコマンドの処理を行う。
    ///
    /// 開始時刻が指定されていない場合は、現在時刻を分単位に切り捨てて利用する。
    /// client id, project idは現在のclientから設定する。
    ///
    /// # Arguments
    ///
    /// * `start` - `start`サブコマンドの引数
    /// * `entry_args` - 共通の時刻指定
    /// * `client` - 現在のclient
    pub async fn run(
        &self,
        start: StartArgs,
        entry_args: &EntryArgs,
        client: Option<&Client>,
    ) -> Result<Entry> {
        info!("Creating new time entry...");
        let started_at = entry_args
            .started_at
            .unwrap_or_else(|| truncate_to_minute(now()));

        let mut entry = Entry::new(started_at);
        entry.description = start.description.unwrap_or_default();
        entry.client_id = client.and_then(|client| client.client_id);
        entry.project_id = client.and_then(|client| client.project_id);

        self.tracker
            .start(entry)
            .await
            .context("Failed to start time entry")
    }
}
