use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};
use log::{info, LevelFilter};

mod client;
mod clients_command;
mod config;
mod connect_command;
mod console;
mod datetime;
mod edit_command;
mod entry;
mod entry_args;
mod error;
mod filter;
mod finish_command;
mod freshbooks;
mod lifecycle;
mod local;
mod log_command;
mod oauth;
mod start_command;
mod sync_command;
mod time_entry;
mod tracker;

use clients_command::{ClientsArgs, ClientsCommand};
use config::{expand_home, Config, DEFAULT_CONFIG_LOCATION};
use connect_command::ConnectCommand;
use console::{ConsoleEntryLog, ConsoleMarkdownList, ConsolePresenter};
use edit_command::{EditArgs, EditCommand};
use entry_args::EntryArgs;
use finish_command::{FinishArgs, FinishCommand};
use freshbooks::{FreshBooksClient, FreshBooksTracker};
use local::LocalTracker;
use log_command::{LogArgs, LogCommand};
use oauth::OAuthClient;
use start_command::{StartArgs, StartCommand};
use sync_command::SyncCommand;
use tracker::select_tracker;

/// 作業時間をローカルのログまたはFreshBooksに記録するCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- start "Write some code"
/// $ cargo run -- finish
/// $ cargo run -- log --last 1w
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        long = "config",
        global = true,
        default_value = DEFAULT_CONFIG_LOCATION,
        parse(from_os_str),
        help = "Config file",
    )]
    config: PathBuf,

    #[clap(
        long = "log-path",
        global = true,
        parse(from_os_str),
        help = "Location of time entry log",
    )]
    log_path: Option<PathBuf>,

    #[clap(short = 'v', long = "verbose", global = true, help = "Show debug logs")]
    verbose: bool,

    #[clap(flatten)]
    entry_args: EntryArgs,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Start a new time entry
    Start(StartArgs),
    /// Finish the time entry in progress
    Finish(FinishArgs),
    /// Edit a recent time entry
    Edit(EditArgs),
    /// Show recorded time entries
    Log(LogArgs),
    /// Sync time entries on FreshBooks with local time entries
    Sync,
    /// Connect to FreshBooks with OAuth
    Connect,
    /// Manage clients
    Clients(ClientsArgs),
}

/// ログを標準エラー出力に書き出すように設定する。
fn setup_logger(verbose: bool) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue);
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .chain(io::stderr())
        .apply()
        .context("Failed to set up logger")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger(args.verbose)?;

    let config_location = expand_home(&args.config);
    let mut config = Config::load(&config_location)
        .with_context(|| format!("Failed to load config from {}", config_location.display()))?;
    if config.ensure_default_client() && config_location.exists() {
        config.write(&config_location)?;
    }
    let log_location = config.log_location(args.log_path.as_deref());
    let oauth = OAuthClient::new(
        &config.client_id,
        &config.client_secret,
        &config.redirect_uri,
        config.credentials_location(),
    );

    match args.subcommand {
        SubCommands::Start(start) => {
            let tracker = select_tracker(&oauth, &log_location).await?;
            if let Some(client) = &config.current_client {
                info!("Using client: {}", client.nickname);
            }
            let entry = StartCommand::new(tracker.as_ref())
                .run(start, &args.entry_args, config.current_client.as_ref())
                .await?;
            println!("{}", entry);
        }
        SubCommands::Finish(finish) => {
            let tracker = select_tracker(&oauth, &log_location).await?;
            let entry = FinishCommand::new(tracker.as_ref())
                .run(finish, &args.entry_args)
                .await?;
            println!("{}", entry);
        }
        SubCommands::Edit(edit) => {
            let tracker = select_tracker(&oauth, &log_location).await?;
            let entry = EditCommand::new(tracker.as_ref())
                .run(edit, &args.entry_args)
                .await?;
            println!("{}", entry);
        }
        SubCommands::Log(log_args) => {
            let tracker = select_tracker(&oauth, &log_location).await?;
            let entries = LogCommand::new(tracker.as_ref()).run(&log_args).await?;
            let mut stdout = io::stdout();
            if log_args.markdown {
                ConsoleMarkdownList::new(&mut stdout).show_entries(&entries)?;
            } else {
                ConsoleEntryLog::new(&mut stdout).show_entries(&entries)?;
            }
        }
        SubCommands::Sync => {
            if !oauth.is_authenticated()? {
                bail!("Use 'ttrack connect' to log in to FreshBooks");
            }
            let credentials = oauth.fresh_credentials().await?;
            let tracker = FreshBooksTracker::new(
                FreshBooksClient::new(&credentials.access_token),
                LocalTracker::new(&log_location),
            );
            let entries = SyncCommand::new(&tracker).run().await?;
            println!("Synced {} time entries.", entries.len());
        }
        SubCommands::Connect => {
            ConnectCommand::new(&oauth)
                .run(&mut io::stdin().lock(), &mut io::stdout())
                .await?;
            println!("Connected to FreshBooks.");
        }
        SubCommands::Clients(clients) => {
            let changed = ClientsCommand::new(&mut config).run(clients, &mut io::stdout())?;
            if changed {
                config.write(&config_location)?;
            }
        }
    }

    Ok(())
}
