use chrono::{DateTime, Duration, Utc};

use crate::entry::{most_recent_entry, sort_entries, Entry};
use crate::error::TrackError;

/// エントリーの終了・編集時に上書きする値。
///
/// 値が`None`の項目は変更しない。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntryPatch {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub description: Option<String>,
}

impl EntryPatch {
    /// 終了時刻と作業時間が同時に指定されていないことを確認する。
    pub fn ensure_exclusive(&self) -> Result<(), TrackError> {
        if self.finished_at.is_some() && self.duration.is_some() {
            return Err(TrackError::Validation(
                "Only one of finished-at and duration can be specified.".to_string(),
            ));
        }
        Ok(())
    }
}

/// 新しいエントリーを開始できるか確認する。
///
/// 最新のエントリーが進行中の場合は開始できない。
pub fn ensure_can_start(entries: &[Entry]) -> Result<(), TrackError> {
    match most_recent_entry(entries) {
        Some(recent) if recent.in_progress() => Err(TrackError::Conflict(format!(
            "The last item in the log is missing a finish time:\n{}",
            recent
        ))),
        _ => Ok(()),
    }
}

/// 最新のエントリーを終了させたものを返す。
///
/// # Errors
///
/// エントリーがない場合、最新のエントリーが既に終了している場合、
/// 終了時刻と作業時間のどちらも指定されていない場合はエラーを返す。
pub fn finish_entry(entries: &[Entry], patch: &EntryPatch) -> Result<Entry, TrackError> {
    patch.ensure_exclusive()?;
    let recent = most_recent_entry(entries)
        .ok_or_else(|| TrackError::Conflict("There are no entries to update.".to_string()))?;
    if !recent.in_progress() {
        return Err(TrackError::Conflict(format!(
            "This would overwrite the most recent entry:\n{}",
            recent
        )));
    }
    if patch.finished_at.is_none() && patch.duration.is_none() {
        return Err(TrackError::Validation(
            "A finish time or a duration is required.".to_string(),
        ));
    }

    let mut entry = recent.clone();
    if let Some(description) = patch.description.as_ref().filter(|d| !d.is_empty()) {
        entry.description = description.clone();
    }
    end_entry(&mut entry, patch)?;

    Ok(entry)
}

/// `ago`番目に新しいエントリーを編集したものを返す。
///
/// # Arguments
///
/// * `entries` - 編集対象を含むエントリー
/// * `ago` - 最新を1とした順番
/// * `patch` - 上書きする値
pub fn edit_entry(entries: &[Entry], ago: usize, patch: &EntryPatch) -> Result<Entry, TrackError> {
    patch.ensure_exclusive()?;
    if ago == 0 || ago > entries.len() {
        return Err(TrackError::Validation(format!(
            "There are only {} entries, which is less than ago: {}.",
            entries.len(),
            ago
        )));
    }

    let mut sorted = entries.to_vec();
    sort_entries(&mut sorted);
    let mut entry = sorted.swap_remove(sorted.len() - ago);

    if let Some(started_at) = patch.started_at {
        entry.started_at = started_at;
        // 開始時刻だけを変更した場合は終了時刻を保ち、作業時間を計算し直す
        if let Some(finished_at) = entry
            .finished_at
            .filter(|_| patch.finished_at.is_none() && patch.duration.is_none())
        {
            if finished_at < started_at {
                return Err(TrackError::Validation(format!(
                    "Start time {} is after finish time {}.",
                    started_at, finished_at
                )));
            }
            entry.end(None, Some(finished_at));
        }
    }
    end_entry(&mut entry, patch)?;
    if let Some(description) = &patch.description {
        entry.description = description.clone();
    }

    Ok(entry)
}

fn end_entry(entry: &mut Entry, patch: &EntryPatch) -> Result<(), TrackError> {
    if let Some(finished_at) = patch.finished_at {
        if finished_at < entry.started_at {
            return Err(TrackError::Validation(format!(
                "Finish time {} is before start time {}.",
                finished_at, entry.started_at
            )));
        }
    }
    if let Some(duration) = patch.duration {
        if duration <= Duration::zero() {
            return Err(TrackError::Validation(format!(
                "Duration must be positive: {}",
                duration
            )));
        }
    }
    entry.end(patch.duration, patch.finished_at);
    Ok(())
}
