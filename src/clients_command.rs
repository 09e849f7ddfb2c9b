use std::io::Write;

use anyhow::{Context, Result};
use log::info;

use crate::client::{add_client, filter_clients, Client, ClientFilter};
use crate::config::Config;
use crate::error::TrackError;

/// `clients`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct ClientsArgs {
    #[clap(long = "nickname", global = true, help = "Nickname for client")]
    nickname: Option<String>,

    #[clap(long = "client-id", global = true, help = "ID for client")]
    client_id: Option<u64>,

    #[clap(long = "project-id", global = true, help = "ID for project")]
    project_id: Option<u64>,

    #[clap(subcommand)]
    action: ClientsAction,
}

/// `clients`の操作を表す列挙型。
#[derive(Debug, clap::Subcommand)]
pub enum ClientsAction {
    /// Add a new client
    Add,
    /// Set the client to be used when logging time entries
    SetCurrent {
        #[clap(value_name = "NICKNAME")]
        name: Option<String>,
    },
    /// List clients
    List,
    /// Get current client
    GetCurrent,
}

pub struct ClientsCommand<'a> {
    config: &'a mut Config,
}

impl<'a> ClientsCommand<'a> {
    /// 新しい`ClientsCommand`を返す。
    pub fn new(config: &'a mut Config) -> Self {
        Self { config }
    }

    /// `clients`サブコマンドの処理を行う。
    ///
    /// 設定を変更した場合は`true`を返すので、呼び出し側で設定ファイルに書き込む。
    pub fn run<W: Write>(&mut self, clients: ClientsArgs, writer: &mut W) -> Result<bool> {
        match clients.action {
            ClientsAction::Add => {
                let nickname = clients.nickname.ok_or_else(|| {
                    TrackError::Validation("A nickname is required to add a client.".to_string())
                })?;
                let client = Client {
                    nickname,
                    client_id: clients.client_id,
                    project_id: clients.project_id,
                };
                add_client(&mut self.config.clients, client.clone())?;
                info!("Added client {}", client.nickname);
                writeln!(writer, "Added new client:\n{}", client).context("Failed to write client")?;
                Ok(true)
            }
            ClientsAction::SetCurrent { name } => {
                let filter = ClientFilter {
                    nickname: name.or(clients.nickname),
                    ..Default::default()
                };
                let nickname = filter.nickname.clone().unwrap_or_default();
                let client = match filter_clients(&self.config.clients, &filter).as_slice() {
                    [client] => (*client).clone(),
                    [] => {
                        return Err(TrackError::Validation(format!(
                            "No clients found with nickname: {}",
                            nickname
                        ))
                        .into())
                    }
                    _ => {
                        return Err(TrackError::Conflict(format!(
                            "More than one client found with nickname: {}",
                            nickname
                        ))
                        .into())
                    }
                };
                writeln!(writer, "Current client set to: {}", client.nickname)
                    .context("Failed to write client")?;
                self.config.current_client = Some(client);
                Ok(true)
            }
            ClientsAction::List => {
                let filter = ClientFilter {
                    nickname: clients.nickname,
                    client_id: clients.client_id,
                    project_id: clients.project_id,
                };
                let found = filter_clients(&self.config.clients, &filter);
                if found.is_empty() {
                    writeln!(writer, "No clients found.").context("Failed to write message")?;
                }
                for client in found {
                    writeln!(writer, "{}", client).context("Failed to write client")?;
                }
                Ok(false)
            }
            ClientsAction::GetCurrent => {
                let message = match &self.config.current_client {
                    Some(client) => client.to_string(),
                    None => "Current client has not been configured yet.".to_string(),
                };
                writeln!(writer, "{}", message).context("Failed to write client")?;
                Ok(false)
            }
        }
    }
}
