use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
#[cfg(test)]
use mockall::automock;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder, Response};
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::entry::{merge_entries, sort_entries, Entry, IdentityKey};
use crate::error::TrackError;
use crate::lifecycle::{ensure_can_start, finish_entry, EntryPatch};
use crate::local::LocalTracker;
use crate::time_entry::{TimeEntriesPage, TimeEntry, TimeEntryPayload};
use crate::tracker::Tracker;

/// FreshBooks APIのベースURL。
pub const FRESHBOOKS_API_URL: &str = "https://api.freshbooks.com";

/// FreshBooks APIのtime entryを読み書きするためのtrait。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FreshBooksRepository: Send + Sync {
    /// ユーザーが所属するbusinessのIDを取得する。
    async fn read_business_id(&self) -> Result<u64>;

    /// time entry一覧の指定ページを取得する。ページは1から始まる。
    async fn read_time_entries_page(&self, business_id: u64, page: u32)
        -> Result<TimeEntriesPage>;

    /// time entryを作成し、割り当てられたIDを返す。
    async fn create_time_entry(&self, business_id: u64, time_entry: &TimeEntry) -> Result<u64>;

    /// 指定IDのtime entryを更新する。
    async fn update_time_entry(
        &self,
        business_id: u64,
        id: u64,
        time_entry: &TimeEntry,
    ) -> Result<()>;
}

/// `users/me`のレスポンスをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct MeResponse {
    response: Me,
}

#[derive(Debug, Deserialize)]
struct Me {
    #[serde(default)]
    business_memberships: Vec<BusinessMembership>,
}

#[derive(Debug, Deserialize)]
struct BusinessMembership {
    business: Business,
}

#[derive(Debug, Deserialize)]
struct Business {
    id: u64,
}

/// time entry一覧のレスポンスをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TimeEntriesResponse {
    #[serde(default)]
    time_entries: Vec<TimeEntry>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Meta {
    page: u32,
    pages: u32,
}

/// time entry作成のレスポンスをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct CreatedTimeEntry {
    time_entry: CreatedId,
}

#[derive(Debug, Deserialize)]
struct CreatedId {
    id: u64,
}

/// FreshBooks APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = FreshBooksClient::new(&credentials.access_token);
/// let business_id = client.read_business_id().await?;
/// ```
pub struct FreshBooksClient {
    client: Client,
    api_url: String,
    access_token: String,
}

impl FreshBooksClient {
    /// 新しい`FreshBooksClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `access_token` - OAuthで取得したアクセストークン
    pub fn new(access_token: &str) -> Self {
        Self::with_api_url(FRESHBOOKS_API_URL, access_token)
    }

    /// 接続先のURLを指定して新しい`FreshBooksClient`を返す。
    pub fn with_api_url(api_url: &str, access_token: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn time_entries_url(&self, business_id: u64) -> String {
        format!(
            "{}/timetracking/business/{}/time_entries",
            self.api_url, business_id
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.access_token)
            .header("Api-Version", "alpha")
            .header(CONTENT_TYPE, "application/json")
    }

    /// リクエストを送信し、成功以外のステータスは`TrackError::Remote`とする。
    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .with_context(|| format!("Failed to send request to FreshBooks at {}", self.api_url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackError::Remote(format!(
                "Unexpected error when {} ({}): {}",
                action, status, body
            ))
            .into());
        }

        Ok(response)
    }
}

#[async_trait]
impl FreshBooksRepository for FreshBooksClient {
    async fn read_business_id(&self) -> Result<u64> {
        let url = format!("{}/auth/api/v1/users/me", self.api_url);
        let me = self
            .send(self.client.get(url), "getting user identity")
            .await?
            .json::<MeResponse>()
            .await
            .context("Failed to deserialize response")?;

        match me.response.business_memberships.as_slice() {
            [membership] => Ok(membership.business.id),
            [] => Err(TrackError::Remote("One business membership is required.".to_string()).into()),
            memberships => Err(TrackError::Remote(format!(
                "Found {} business memberships, but only one is supported.",
                memberships.len()
            ))
            .into()),
        }
    }

    async fn read_time_entries_page(
        &self,
        business_id: u64,
        page: u32,
    ) -> Result<TimeEntriesPage> {
        let request = self
            .client
            .get(self.time_entries_url(business_id))
            .query(&[("page", page)]);
        let response = self
            .send(request, "retrieving page of time entries")
            .await?
            .json::<TimeEntriesResponse>()
            .await
            .context("Failed to deserialize response")?;

        Ok(TimeEntriesPage {
            time_entries: response.time_entries,
            page: response.meta.page,
            pages: response.meta.pages,
        })
    }

    async fn create_time_entry(&self, business_id: u64, time_entry: &TimeEntry) -> Result<u64> {
        let payload = TimeEntryPayload {
            time_entry: time_entry.clone(),
        };
        let request = self
            .client
            .post(self.time_entries_url(business_id))
            .json(&payload);
        let created = self
            .send(request, "creating time entry")
            .await?
            .json::<CreatedTimeEntry>()
            .await
            .context("Unable to parse response from FreshBooks")?;

        Ok(created.time_entry.id)
    }

    async fn update_time_entry(
        &self,
        business_id: u64,
        id: u64,
        time_entry: &TimeEntry,
    ) -> Result<()> {
        let payload = TimeEntryPayload {
            time_entry: time_entry.clone(),
        };
        let url = format!("{}/{}", self.time_entries_url(business_id), id);
        self.send(self.client.put(url).json(&payload), "updating time entry")
            .await?;

        Ok(())
    }
}

/// FreshBooksにエントリーを記録する。
///
/// FreshBooksから取得したエントリーはExternalIDでローカルのログとマージし、
/// 作成・更新したエントリーはローカルのログにも書き戻す。
pub struct FreshBooksTracker<R: FreshBooksRepository> {
    repository: R,
    local: LocalTracker,
    business_id: OnceCell<u64>,
}

impl<R: FreshBooksRepository> FreshBooksTracker<R> {
    /// 新しい`FreshBooksTracker`を返す。
    ///
    /// # Arguments
    ///
    /// * `repository` - FreshBooks APIと通信するためのリポジトリ
    /// * `local` - マージに利用するローカルのログ
    pub fn new(repository: R, local: LocalTracker) -> Self {
        Self {
            repository,
            local,
            business_id: OnceCell::new(),
        }
    }

    async fn business_id(&self) -> Result<u64> {
        self.business_id
            .get_or_try_init(|| self.repository.read_business_id())
            .await
            .copied()
            .context("Failed to retrieve business id")
    }

    /// FreshBooksの全てのtime entryをページ順に取得する。
    async fn read_remote_entries(&self) -> Result<Vec<Entry>> {
        let business_id = self.business_id().await?;
        let mut entries = Vec::new();
        let mut page = 1;
        loop {
            let result = self
                .repository
                .read_time_entries_page(business_id, page)
                .await
                .with_context(|| format!("Failed to retrieve page {} of time entries", page))?;
            entries.extend(result.time_entries.iter().map(TimeEntry::to_entry));
            debug!("Retrieved page {} of {}", result.page, result.pages);
            if result.page >= result.pages {
                break;
            }
            page = result.page + 1;
        }
        info!("Retrieved {} time entries from FreshBooks", entries.len());

        Ok(entries)
    }

    /// IDの有無に応じてtime entryを作成または更新する。
    async fn push_entry(&self, mut entry: Entry) -> Result<Entry> {
        let business_id = self.business_id().await?;
        let time_entry = TimeEntry::from(&entry);
        match entry.external_id {
            Some(external_id) => {
                self.repository
                    .update_time_entry(business_id, external_id, &time_entry)
                    .await
                    .with_context(|| format!("Failed to update time entry {}", external_id))?;
            }
            None => {
                let external_id = self
                    .repository
                    .create_time_entry(business_id, &time_entry)
                    .await
                    .context("Failed to create time entry")?;
                entry.external_id = Some(external_id);
            }
        }

        Ok(entry)
    }

    /// FreshBooksのエントリーでローカルのログを更新する。
    pub async fn sync_entries(&self) -> Result<Vec<Entry>> {
        let entries = self.load_entries().await?;
        self.local
            .write_entries(entries)
            .context("Failed to save entries to the local log")
    }
}

#[async_trait]
impl<R: FreshBooksRepository> Tracker for FreshBooksTracker<R> {
    async fn start(&self, entry: Entry) -> Result<Entry> {
        let entries = self.load_entries().await?;
        ensure_can_start(&entries)?;

        let entry = self.push_entry(entry).await?;
        let mut saved = self
            .local
            .write_entries(vec![entry])
            .context("Failed to save entry to the local log")?;
        saved.pop().context("Saved entry is missing")
    }

    async fn finish(&self, patch: &EntryPatch) -> Result<Entry> {
        let entries = self.load_entries().await?;
        let entry = finish_entry(&entries, patch)?;

        let entry = self.push_entry(entry).await?;
        let mut saved = self
            .local
            .write_entries(vec![entry])
            .context("Failed to save entry to the local log")?;
        saved.pop().context("Saved entry is missing")
    }

    async fn load_entries(&self) -> Result<Vec<Entry>> {
        let remote = self.read_remote_entries().await?;
        let local = self
            .local
            .read_entries()
            .context("Failed to load entries from the local log")?;

        let mut entries = merge_entries(&local, &remote, IdentityKey::ExternalId)?;
        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn save_entries(&self, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let current = self.load_entries().await?;

        let mut pushed = Vec::new();
        for entry in entries {
            let changed = match entry.external_id {
                None => true,
                Some(external_id) => current
                    .iter()
                    .any(|curr| curr.external_id == Some(external_id) && *curr != entry),
            };
            if changed {
                pushed.push(self.push_entry(entry).await?);
            }
        }

        self.local
            .write_entries(pushed)
            .context("Failed to save entries to the local log")
    }
}
