use chrono::{DateTime, Duration, Utc};

use crate::datetime::{parse_duration, parse_time_arg};
use crate::lifecycle::EntryPatch;

/// 全てのサブコマンドで共通のエントリーの時刻指定。
///
/// 起動時に1度だけ作られ、各コマンドには参照で渡す。
#[derive(Clone, Debug, Default, clap::Args)]
pub struct EntryArgs {
    #[clap(
        short = 's',
        long = "started-at",
        global = true,
        help = "Start time for entry",
        parse(try_from_str = parse_time_arg),
    )]
    pub started_at: Option<DateTime<Utc>>,

    #[clap(
        short = 'f',
        long = "finished-at",
        global = true,
        help = "Finish time for entry",
        parse(try_from_str = parse_time_arg),
    )]
    pub finished_at: Option<DateTime<Utc>>,

    #[clap(
        short = 'd',
        long = "duration",
        global = true,
        help = "Entry duration e.g. 30m (can be used instead of finished-at)",
        parse(try_from_str = parse_duration),
    )]
    pub duration: Option<Duration>,
}

impl EntryArgs {
    /// 説明文を加えて`EntryPatch`に変換する。
    pub fn to_patch(&self, description: Option<String>) -> EntryPatch {
        EntryPatch {
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration: self.duration,
            description,
        }
    }
}
