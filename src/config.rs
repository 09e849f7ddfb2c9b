use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::TrackError;

/// 設定ファイルの既定のパス。
pub const DEFAULT_CONFIG_LOCATION: &str = "~/.ttrack.toml";

/// エントリーを記録するファイルの既定のパス。
pub const DEFAULT_LOG_LOCATION: &str = "~/.ttrack.log.json";

/// 認証情報を保存するファイルの既定のパス。
pub const DEFAULT_CREDENTIALS_LOCATION: &str = "~/.ttrack.creds.json";

/// FreshBooksのアプリケーションに登録したリダイレクト先の既定値。
pub const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// ttrackの設定。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_location: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_location: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_client: Option<Client>,
    #[serde(default)]
    pub clients: Vec<Client>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            log_location: None,
            credentials_location: None,
            current_client: None,
            clients: Vec::new(),
        }
    }
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

impl Config {
    /// 設定ファイルを読み込む。
    ///
    /// ファイルがない場合は既定の設定を返す。`TTRACK_CLIENT_ID`と`TTRACK_CLIENT_SECRET`が
    /// 設定されている場合はファイルの値より優先する。
    pub fn load(path: &Path) -> Result<Self, TrackError> {
        let mut config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|source| TrackError::Toml {
                path: path.to_path_buf(),
                source,
            })?,
            Err(err) => match TrackError::from_io(path, err) {
                TrackError::NotFound(_) => {
                    debug!("No config file at {}, using defaults", path.display());
                    Config::default()
                }
                err => return Err(err),
            },
        };

        if let Ok(client_id) = env::var("TTRACK_CLIENT_ID") {
            config.client_id = client_id;
        }
        if let Ok(client_secret) = env::var("TTRACK_CLIENT_SECRET") {
            config.client_secret = client_secret;
        }

        Ok(config)
    }

    /// 設定ファイルに書き込む。
    pub fn write(&self, path: &Path) -> Result<()> {
        let data = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        info!("Wrote config to {}", path.display());
        Ok(())
    }

    /// clientが1つもなければ`default`を追加して現在のclientにする。
    ///
    /// 追加した場合は`true`を返す。
    pub fn ensure_default_client(&mut self) -> bool {
        if !self.clients.is_empty() {
            return false;
        }
        let client = Client {
            nickname: "default".to_string(),
            client_id: None,
            project_id: None,
        };
        self.clients.push(client.clone());
        self.current_client = Some(client);
        true
    }

    /// エントリーを記録するファイルのパスを返す。
    ///
    /// コマンドラインの指定、設定ファイル、既定値の順に優先する。
    pub fn log_location(&self, flag: Option<&Path>) -> PathBuf {
        let location = flag
            .map(Path::to_path_buf)
            .or_else(|| self.log_location.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_LOCATION));
        expand_home(&location)
    }

    /// 認証情報を保存するファイルのパスを返す。
    pub fn credentials_location(&self) -> PathBuf {
        let location = self
            .credentials_location
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_LOCATION));
        expand_home(&location)
    }
}

/// 先頭の`~`をホームディレクトリに展開する。
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
