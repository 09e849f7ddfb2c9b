use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::info;

use crate::datetime::{now, parse_duration, parse_time_arg};
use crate::entry::Entry;
use crate::filter::{filter_entries, FilterParameters};
use crate::tracker::Tracker;

/// `log`サブコマンドの引数。
#[derive(Debug, Default, clap::Args)]
pub struct LogArgs {
    #[clap(
        short = 'l',
        long = "last",
        help = "Show entries over previous time period (e.g. --last 1w)",
        parse(try_from_str = parse_duration),
    )]
    last: Option<Duration>,

    #[clap(
        long = "since",
        help = "Show entries starting from some date",
        parse(try_from_str = parse_time_arg),
    )]
    since: Option<DateTime<Utc>>,

    #[clap(
        long = "until",
        help = "Show entries until some date",
        parse(try_from_str = parse_time_arg),
    )]
    until: Option<DateTime<Utc>>,

    #[clap(short = 'n', long = "limit", help = "Show at most this many recent entries")]
    limit: Option<usize>,

    #[clap(long = "grep", help = "Show entries whose description contains this text")]
    grep: Option<String>,

    #[clap(long = "markdown", help = "Show entries as a markdown list")]
    pub markdown: bool,
}

pub struct LogCommand<'a, T: Tracker + ?Sized> {
    tracker: &'a T,
}

impl<'a, T: Tracker + ?Sized> LogCommand<'a, T> {
    /// 新しい`LogCommand`を返す。
    pub fn new(tracker: &'a T) -> Self {
        Self { tracker }
    }

    /// `log`サブコマンドの処理を行う。
    ///
    /// `--since`が指定されていなければ`--last`から開始時刻の下限を求める。
    pub async fn run(&self, log: &LogArgs) -> Result<Vec<Entry>> {
        let since = log.since.or_else(|| log.last.map(|last| now() - last));
        let params = FilterParameters {
            since,
            until: log.until,
            description: log.grep.clone(),
            limit: log.limit,
        };
        info!("Since: {:?}, Until: {:?}", params.since, params.until);

        let entries = self
            .tracker
            .load_entries()
            .await
            .context("Failed to load time entries")?;

        Ok(filter_entries(&entries, &params))
    }
}
