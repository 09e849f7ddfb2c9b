use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::Entry;

/// FreshBooks APIのtime entry。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    #[serde(default)]
    pub note: Option<String>,
    /// 秒単位の作業時間。
    #[serde(default)]
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    #[serde(default)]
    pub is_logged: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

/// FreshBooks APIに送信するtime entry。
#[derive(Debug, Serialize, Deserialize)]
pub struct TimeEntryPayload {
    pub time_entry: TimeEntry,
}

/// time entry一覧の1ページ分。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeEntriesPage {
    pub time_entries: Vec<TimeEntry>,
    pub page: u32,
    pub pages: u32,
}

impl TimeEntry {
    /// `Entry`に変換する。
    ///
    /// 作業時間が正の場合のみ`started_at + duration`を終了時刻とし、
    /// そうでなければ進行中のエントリーとする。
    pub fn to_entry(&self) -> Entry {
        let finished_at =
            (self.duration > 0).then(|| self.started_at + Duration::seconds(self.duration));

        Entry {
            id: None,
            started_at: self.started_at,
            finished_at,
            duration: self.duration,
            description: self.note.clone().unwrap_or_default(),
            client_id: self.client_id,
            project_id: self.project_id,
            external_id: self.id,
        }
    }
}

impl From<&Entry> for TimeEntry {
    fn from(entry: &Entry) -> Self {
        Self {
            note: Some(entry.description.clone()),
            duration: entry.duration,
            client_id: entry.client_id,
            project_id: entry.project_id,
            is_logged: true,
            started_at: entry.started_at,
            active: true,
            id: entry.external_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rstest::rstest;

    use super::{TimeEntry, TimeEntryPayload};
    use crate::entry::Entry;

    #[rstest]
    #[case::completed(3600, true)]
    #[case::running(0, false)]
    fn test_to_entry(#[case] duration: i64, #[case] finished: bool) {
        let started_at = Utc.with_ymd_and_hms(2020, 11, 21, 10, 0, 0).unwrap();
        let time_entry = TimeEntry {
            note: Some("Write some code".to_string()),
            duration,
            client_id: Some(67837),
            project_id: None,
            is_logged: true,
            started_at,
            active: true,
            id: Some(123),
        };

        let entry = time_entry.to_entry();

        assert_eq!(entry.id, None);
        assert_eq!(entry.external_id, Some(123));
        assert_eq!(entry.description, "Write some code");
        assert_eq!(entry.client_id, Some(67837));
        assert_eq!(entry.duration, duration);
        assert_eq!(
            entry.finished_at,
            finished.then(|| started_at + Duration::seconds(duration))
        );
    }

    #[test]
    fn test_payload_from_entry() {
        let mut entry = Entry::new(Utc.with_ymd_and_hms(2020, 11, 21, 10, 0, 0).unwrap());
        entry.id = Some(4);
        entry.description = "Write some tests".to_string();
        entry.end(Some(Duration::minutes(30)), None);

        let payload = TimeEntryPayload {
            time_entry: TimeEntry::from(&entry),
        };

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({
                "time_entry": {
                    "note": "Write some tests",
                    "duration": 1800,
                    "is_logged": true,
                    "started_at": "2020-11-21T10:00:00Z",
                    "active": true,
                }
            })
        );
    }

    #[test]
    fn test_deserialize_null_note() {
        let json = r#"{"note": null, "duration": 60, "started_at": "2020-11-21T10:00:00.000Z", "id": 9}"#;

        let time_entry: TimeEntry = serde_json::from_str(json).unwrap();

        assert_eq!(time_entry.to_entry().description, "");
        assert_eq!(time_entry.id, Some(9));
    }
}
