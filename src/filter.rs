use chrono::{DateTime, Utc};

use crate::entry::{sort_entries, Entry};

/// `filter_entries`の検索条件。
#[derive(Clone, Debug, Default)]
pub struct FilterParameters {
    /// この時刻以降に開始したエントリーに絞る。
    pub since: Option<DateTime<Utc>>,
    /// この時刻より前に開始したエントリーに絞る。
    pub until: Option<DateTime<Utc>>,
    /// 説明文に含まれる文字列。大文字小文字は区別しない。
    pub description: Option<String>,
    /// 最新のエントリーから数えた最大件数。
    pub limit: Option<usize>,
}

/// 開始時刻の昇順に並べたエントリーのコピーを検索条件で絞り込む。
///
/// 絞り込みはsince, until, description, limitの順に適用し、並び順は変えない。
/// 引数のエントリーは変更しない。
pub fn filter_entries(entries: &[Entry], params: &FilterParameters) -> Vec<Entry> {
    let mut result = entries.to_vec();
    sort_entries(&mut result);

    if let Some(since) = params.since {
        let ix = result.partition_point(|entry| entry.started_at < since);
        result.drain(..ix);
    }
    if let Some(until) = params.until {
        let ix = result.partition_point(|entry| entry.started_at < until);
        result.truncate(ix);
    }
    if let Some(needle) = params.description.as_deref().map(str::to_lowercase) {
        result.retain(|entry| entry.description.to_lowercase().contains(&needle));
    }
    if let Some(limit) = params.limit.filter(|limit| *limit > 0) {
        let excess = result.len().saturating_sub(limit);
        result.drain(..excess);
    }

    result
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use rstest::rstest;

    use super::{filter_entries, FilterParameters};
    use crate::entry::Entry;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, 21, hour, 0, 0).unwrap()
    }

    /// 10:00, 13:00, 15:00, 17:00に開始したエントリーを順不同で返す。
    fn mock_entries() -> Vec<Entry> {
        [(15, "Write some docs"), (10, "Write some code"), (17, "Fix some bugs"), (13, "Write some tests")]
            .into_iter()
            .enumerate()
            .map(|(ix, (hour, description))| {
                let mut entry = Entry::new(at(hour));
                entry.id = Some(ix as u64 + 1);
                entry.description = description.to_string();
                entry
            })
            .collect()
    }

    fn started_hours(entries: &[Entry]) -> Vec<u32> {
        use chrono::Timelike;
        entries.iter().map(|entry| entry.started_at.hour()).collect()
    }

    #[rstest]
    #[case::no_filter(FilterParameters::default(), vec![10, 13, 15, 17])]
    #[case::window(
        FilterParameters { since: Some(at(12)), until: Some(at(16)), ..Default::default() },
        vec![13, 15],
    )]
    #[case::since_is_inclusive(
        FilterParameters { since: Some(at(13)), ..Default::default() },
        vec![13, 15, 17],
    )]
    #[case::until_is_exclusive(
        FilterParameters { until: Some(at(13)), ..Default::default() },
        vec![10],
    )]
    #[case::since_after_all(
        FilterParameters { since: Some(at(18)), ..Default::default() },
        vec![],
    )]
    #[case::until_before_all(
        FilterParameters { until: Some(at(9)), ..Default::default() },
        vec![],
    )]
    #[case::limit_keeps_most_recent(
        FilterParameters { limit: Some(2), ..Default::default() },
        vec![15, 17],
    )]
    #[case::limit_larger_than_result(
        FilterParameters { limit: Some(10), ..Default::default() },
        vec![10, 13, 15, 17],
    )]
    #[case::limit_after_window(
        FilterParameters { since: Some(at(11)), until: Some(at(16)), limit: Some(1), ..Default::default() },
        vec![15],
    )]
    #[case::description(
        FilterParameters { description: Some("WRITE some".to_string()), ..Default::default() },
        vec![10, 13, 15],
    )]
    fn test_filter_entries(#[case] params: FilterParameters, #[case] expected: Vec<u32>) {
        let result = filter_entries(&mock_entries(), &params);

        assert_eq!(started_hours(&result), expected);
    }

    #[test]
    fn test_filter_entries_does_not_mutate_input() {
        let entries = mock_entries();
        let before = entries.clone();

        let result = filter_entries(&entries, &FilterParameters::default());

        assert_eq!(entries, before);
        assert!(result
            .windows(2)
            .all(|pair| pair[0].started_at <= pair[1].started_at));
    }

    #[test]
    fn test_filter_entries_empty() {
        let params = FilterParameters {
            since: Some(at(12)),
            until: Some(at(16)),
            limit: Some(3),
            ..Default::default()
        };

        assert!(filter_entries(&[], &params).is_empty());
    }
}
