use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use log::info;

use crate::datetime::now;
use crate::error::TrackError;
use crate::oauth::{Credentials, OAuthClient};

pub struct ConnectCommand<'a> {
    oauth: &'a OAuthClient,
}

impl<'a> ConnectCommand<'a> {
    /// 新しい`ConnectCommand`を返す。
    pub fn new(oauth: &'a OAuthClient) -> Self {
        Self { oauth }
    }

    /// `connect`サブコマンドの処理を行う。
    ///
    /// 認証情報がキャッシュされていなければ認可画面のURLを表示し、入力された認可コードを
    /// 認証情報と交換して保存する。キャッシュが期限切れなら更新して保存し直す。
    ///
    /// # Arguments
    ///
    /// * `reader` - 認可コードを読み込む入力
    /// * `writer` - 案内を表示する出力
    pub async fn run<R: BufRead, W: Write>(&self, reader: &mut R, writer: &mut W) -> Result<Credentials> {
        let credentials = match self.oauth.from_cache() {
            Ok(credentials) => credentials,
            Err(TrackError::NotFound(_)) => {
                let credentials = self.authorize(reader, writer).await?;
                self.oauth.cache(&credentials)?;
                credentials
            }
            Err(err) => return Err(err).context("Failed to read cached credentials"),
        };

        if !credentials.is_expired(now()) {
            return Ok(credentials);
        }

        writeln!(writer, "Credentials have expired. Refreshing credentials now.")
            .context("Failed to write message")?;
        let refreshed = self.oauth.refresh(&credentials).await?;
        self.oauth.cache(&refreshed)?;
        Ok(refreshed)
    }

    async fn authorize<R: BufRead, W: Write>(&self, reader: &mut R, writer: &mut W) -> Result<Credentials> {
        writeln!(writer, "Go to link: {}", self.oauth.authorization_url())
            .context("Failed to write authorization url")?;
        write!(writer, "Enter authorization code: ").context("Failed to write prompt")?;
        writer.flush().context("Failed to flush prompt")?;

        let mut code = String::new();
        reader
            .read_line(&mut code)
            .context("Failed to read authorization code")?;
        let code = code.trim();
        if code.is_empty() {
            return Err(TrackError::Validation("Authorization code is empty.".to_string()).into());
        }

        info!("Exchanging authorization code for credentials");
        self.oauth.exchange(code).await
    }
}
