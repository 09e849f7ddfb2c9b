use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::{Deserialize, Serialize};

use crate::datetime::now;
use crate::error::TrackError;
use crate::freshbooks::FRESHBOOKS_API_URL;

/// FreshBooksの認可画面のURL。
const AUTHORIZE_URL: &str = "https://my.freshbooks.com/service/auth/oauth/authorize/";

/// 認証に成功した時に取得する認証情報。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    /// 有効期間の秒数。
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub scope: String,
    /// 発行時刻のUNIX時間。
    #[serde(default)]
    pub created_at: i64,
}

impl Credentials {
    /// `created_at + expires_in`が現在時刻以前なら期限切れとする。
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.created_at + self.expires_in <= now.timestamp()
    }
}

/// トークンエンドポイントに送信するリクエスト。
#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
}

/// OAuthのクライアント側の処理を行う。
pub struct OAuthClient {
    client: Client,
    api_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    cache_location: PathBuf,
}

impl OAuthClient {
    /// 新しい`OAuthClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `client_id` - FreshBooksに登録したアプリケーションのclient id
    /// * `client_secret` - FreshBooksに登録したアプリケーションのclient secret
    /// * `redirect_uri` - FreshBooksに登録したリダイレクト先
    /// * `cache_location` - 認証情報を保存するファイルのパス
    pub fn new(
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        cache_location: impl AsRef<Path>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_url: FRESHBOOKS_API_URL.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            cache_location: cache_location.as_ref().to_path_buf(),
        }
    }

    /// トークンエンドポイントの接続先を変更する。
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// ユーザーがログインするためのURLを返す。
    pub fn authorization_url(&self) -> String {
        format!(
            "{}?response_type=code&redirect_uri={}&client_id={}",
            AUTHORIZE_URL, self.redirect_uri, self.client_id
        )
    }

    /// 認可コードを認証情報と交換する。
    pub async fn exchange(&self, code: &str) -> Result<Credentials> {
        let request = TokenRequest {
            grant_type: "authorization_code",
            code: Some(code),
            refresh_token: None,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            redirect_uri: &self.redirect_uri,
        };
        self.request_token(&request)
            .await
            .context("Failed to exchange authorization code")
    }

    /// 期限切れの認証情報を更新する。
    pub async fn refresh(&self, credentials: &Credentials) -> Result<Credentials> {
        let request = TokenRequest {
            grant_type: "refresh_token",
            code: None,
            refresh_token: Some(&credentials.refresh_token),
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            redirect_uri: &self.redirect_uri,
        };
        self.request_token(&request)
            .await
            .context("Failed to refresh credentials")
    }

    async fn request_token(&self, request: &TokenRequest<'_>) -> Result<Credentials> {
        let url = format!("{}/auth/oauth/token", self.api_url);
        let response = self
            .client
            .post(&url)
            .header("Api-Version", "alpha")
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackError::Remote(format!(
                "Unexpected error when authenticating credentials ({}): {}",
                status, body
            ))
            .into());
        }

        response
            .json::<Credentials>()
            .await
            .context("Failed to deserialize credentials")
    }

    /// キャッシュされた認証情報を読み込む。
    ///
    /// ファイルがない場合は`TrackError::NotFound`を返す。
    pub fn from_cache(&self) -> Result<Credentials, TrackError> {
        let content = fs::read_to_string(&self.cache_location)
            .map_err(|err| TrackError::from_io(&self.cache_location, err))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// 認証情報をファイルに保存する。
    pub fn cache(&self, credentials: &Credentials) -> Result<(), TrackError> {
        let data = serde_json::to_string_pretty(credentials)?;
        info!("Writing credentials to: {}", self.cache_location.display());
        fs::write(&self.cache_location, data)
            .map_err(|err| TrackError::from_io(&self.cache_location, err))
    }

    /// 認証情報がキャッシュされているかを返す。
    ///
    /// FreshBooksへの問い合わせは行わない。
    pub fn is_authenticated(&self) -> Result<bool, TrackError> {
        match self.from_cache() {
            Ok(_) => Ok(true),
            Err(TrackError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// キャッシュされた認証情報を返す。期限切れの場合は更新して保存し直す。
    pub async fn fresh_credentials(&self) -> Result<Credentials> {
        let credentials = self.from_cache()?;
        if !credentials.is_expired(now()) {
            return Ok(credentials);
        }

        info!("Refreshing expired credentials...");
        let refreshed = self.refresh(&credentials).await?;
        self.cache(&refreshed)?;
        Ok(refreshed)
    }
}
