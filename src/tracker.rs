use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
#[cfg(test)]
use mockall::automock;

use crate::entry::Entry;
use crate::freshbooks::{FreshBooksClient, FreshBooksTracker};
use crate::lifecycle::EntryPatch;
use crate::local::LocalTracker;
use crate::oauth::OAuthClient;

/// エントリーを記録する先を表すtrait。
///
/// ローカルのJSONファイルに記録する`LocalTracker`と、FreshBooksに記録する
/// `FreshBooksTracker`がある。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Tracker: Send + Sync {
    /// 新しいエントリーを開始する。
    ///
    /// 最新のエントリーが進行中の場合はエラーを返す。
    async fn start(&self, entry: Entry) -> Result<Entry>;

    /// 最新の進行中のエントリーを終了する。
    async fn finish(&self, patch: &EntryPatch) -> Result<Entry>;

    /// 全てのエントリーを開始時刻の昇順で取得する。
    async fn load_entries(&self) -> Result<Vec<Entry>>;

    /// エントリーを保存し、保存後のエントリーを返す。
    ///
    /// 既存のエントリーはIDで上書きし、IDのないエントリーは新規に追加する。
    async fn save_entries(&self, entries: Vec<Entry>) -> Result<Vec<Entry>>;
}

/// 認証情報の有無で利用する`Tracker`を選択する。
///
/// キャッシュされた認証情報があればFreshBooks、なければローカルファイルに記録する。
pub async fn select_tracker(oauth: &OAuthClient, log_location: &Path) -> Result<Box<dyn Tracker>> {
    let local = LocalTracker::new(log_location);
    if !oauth
        .is_authenticated()
        .context("Failed to read cached credentials")?
    {
        info!("Recording to {}", log_location.display());
        return Ok(Box::new(local));
    }

    let credentials = oauth
        .fresh_credentials()
        .await
        .context("Failed to load FreshBooks credentials")?;
    info!("Recording to FreshBooks");
    let client = FreshBooksClient::new(&credentials.access_token);

    Ok(Box::new(FreshBooksTracker::new(client, local)))
}
