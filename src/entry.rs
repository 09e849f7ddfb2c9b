use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, Local, Utc};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

use crate::datetime::format_duration;
use crate::error::TrackError;

/// 記録された1つの作業時間。
///
/// `finished_at`が`None`のエントリーは進行中として扱う。
/// `id`はローカルのログ内での識別子、`external_id`はFreshBooks側の識別子で、
/// どちらも未割り当ての場合は`None`となる。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(
        default,
        deserialize_with = "zero_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
    pub started_at: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "zero_time_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub finished_at: Option<DateTime<Utc>>,
    /// 秒単位の作業時間。
    #[serde(default, skip_serializing_if = "is_zero")]
    pub duration: i64,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "zero_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "zero_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "zero_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_id: Option<u64>,
}

impl Entry {
    /// 指定時刻に開始した進行中の`Entry`を返す。
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            started_at,
            finished_at: None,
            duration: 0,
            description: String::new(),
            client_id: None,
            project_id: None,
            external_id: None,
        }
    }

    /// 終了時刻が設定されていなければ進行中とみなす。
    pub fn in_progress(&self) -> bool {
        self.finished_at.is_none()
    }

    /// 作業時間または終了時刻からエントリーを終了させる。
    ///
    /// 正の`duration`が指定された場合は`started_at + duration`を終了時刻とし、
    /// そうでなければ`finished_at`から作業時間を計算する。どちらもなければ何もしない。
    pub fn end(&mut self, duration: Option<Duration>, finished_at: Option<DateTime<Utc>>) {
        match (duration.filter(|d| *d > Duration::zero()), finished_at) {
            (Some(duration), _) => {
                self.finished_at = Some(self.started_at + duration);
                self.duration = duration.num_seconds();
            }
            (None, Some(finished_at)) => {
                self.finished_at = Some(finished_at);
                self.duration = (finished_at - self.started_at).num_seconds();
            }
            (None, None) => {}
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let started = self
            .started_at
            .with_timezone(&Local)
            .format("%a %b %e %H:%M:%S %z %Y");
        let finished = self
            .finished_at
            .map(|finished| {
                finished
                    .with_timezone(&Local)
                    .format("%a %b %e %H:%M:%S %z %Y")
                    .to_string()
            })
            .unwrap_or_else(|| "In progress".to_string());
        let id = self.id.unwrap_or_default();
        writeln!(f, "Description: {}", self.description)?;
        writeln!(f, "Started At: {}", started)?;
        writeln!(f, "Finished At: {}", finished)?;
        writeln!(f, "Duration: {}", format_duration(self.duration))?;
        match self.external_id {
            Some(external_id) => writeln!(f, "ID: {} (External ID: {})", id, external_id)?,
            None => writeln!(f, "ID: {}", id)?,
        }
        write!(f, "Client ID: {}", self.client_id.unwrap_or_default())
    }
}

/// エントリーを突き合わせるためのキー。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityKey {
    /// ローカルのID。
    Id,
    /// FreshBooksのID。
    ExternalId,
}

impl IdentityKey {
    fn value(self, entry: &Entry) -> Option<u64> {
        match self {
            IdentityKey::Id => entry.id,
            IdentityKey::ExternalId => entry.external_id,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Id => write!(f, "ID"),
            IdentityKey::ExternalId => write!(f, "ExternalID"),
        }
    }
}

/// `base`に`incoming`を`key`で突き合わせてマージする。
///
/// 一致したエントリーは`base`の位置のまま`incoming`の内容で置き換え、一致しなかったものは
/// `incoming`の順序を保って末尾に追加する。`ExternalId`で突き合わせた場合は`base`側の`id`を
/// 引き継ぐ。キーが未設定のエントリーは突き合わせの対象にならない。
///
/// # Arguments
///
/// * `base` - マージ先のエントリー
/// * `incoming` - 上書き・追加するエントリー
/// * `key` - 突き合わせに利用するキー
///
/// # Errors
///
/// `base`に同じキーを持つエントリーが複数ある場合は`TrackError::DuplicateKey`を返す。
pub fn merge_entries(
    base: &[Entry],
    incoming: &[Entry],
    key: IdentityKey,
) -> Result<Vec<Entry>, TrackError> {
    let mut index: HashMap<u64, usize> = HashMap::new();
    for (ix, entry) in base.iter().enumerate() {
        let Some(value) = key.value(entry) else {
            continue;
        };
        if index.insert(value, ix).is_some() {
            return Err(TrackError::DuplicateKey { key, value });
        }
    }

    let mut merged = base.to_vec();
    let mut appended = Vec::new();
    for entry in incoming {
        match key.value(entry).and_then(|value| index.get(&value)) {
            Some(&ix) => {
                let mut replacement = entry.clone();
                if key == IdentityKey::ExternalId {
                    replacement.id = base[ix].id;
                }
                merged[ix] = replacement;
            }
            None => appended.push(entry.clone()),
        }
    }
    debug!(
        "Merged by {}: {} replaced or kept, {} appended",
        key,
        merged.len(),
        appended.len()
    );
    merged.extend(appended);

    Ok(merged)
}

/// 次に割り当てるIDを返す。
pub fn next_id(entries: &[Entry]) -> u64 {
    entries
        .iter()
        .filter_map(|entry| entry.id)
        .max()
        .unwrap_or(0)
        + 1
}

/// IDが未割り当てのエントリーに、並び順に連番のIDを割り当てる。
pub fn assign_ids(entries: &mut [Entry]) {
    let mut next = next_id(entries);
    for entry in entries.iter_mut().filter(|entry| entry.id.is_none()) {
        entry.id = Some(next);
        next += 1;
    }
}

/// 開始時刻が最も遅いエントリーを返す。同時刻の場合は後に現れたものを優先し、
/// `sort_entries`で並べた末尾と一致させる。
pub fn most_recent_entry(entries: &[Entry]) -> Option<&Entry> {
    entries.iter().fold(None, |recent, entry| match recent {
        Some(recent) if entry.started_at < recent.started_at => Some(recent),
        _ => Some(entry),
    })
}

/// 開始時刻の昇順に安定ソートする。
pub fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by_key(|entry| entry.started_at);
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

// 古いログファイルでは未割り当てのIDが0で書き込まれている。
fn zero_as_none<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.filter(|value| *value != 0))
}

// 古いログファイルでは進行中のエントリーの終了時刻が`0001-01-01T00:00:00Z`で書き込まれている。
fn zero_time_as_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<DateTime<Utc>>::deserialize(deserializer)?.filter(|time| time.year() > 1))
}
