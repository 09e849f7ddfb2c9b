use std::io::Write;

use anyhow::{Context, Result};
use chrono::Local;

use crate::datetime::format_duration;
use crate::entry::Entry;

/// Consoleにエントリーを表示するためのtrait。
pub trait ConsolePresenter {
    /// エントリーを表示する。
    ///
    /// # Arguments
    ///
    /// * `entries` - 表示するエントリー
    fn show_entries(&mut self, entries: &[Entry]) -> Result<()>;
}

/// エントリーの詳細と合計時間を表示する。
pub struct ConsoleEntryLog<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleEntryLog<'a, W> {
    /// 新しい`ConsoleEntryLog`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleEntryLog<'a, W> {
    fn show_entries(&mut self, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            writeln!(self.writer, "No entries matched the query parameters.")
                .context("Failed to write message")?;
            return Ok(());
        }

        for entry in entries {
            writeln!(self.writer, "{}\n", entry)
                .with_context(|| format!("Failed to write entry: {:?}", entry))?;
        }
        let total: i64 = entries.iter().map(|entry| entry.duration).sum();
        writeln!(
            self.writer,
            "Total hours recorded: {}",
            format_duration(total)
        )
        .context("Failed to write total")?;

        Ok(())
    }
}

/// エントリーをMarkdownのlist形式で表示する。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownList<'a, W> {
    // エントリーは呼び出し側で開始時刻順に並べてある前提で、そのまま表示する。
    fn show_entries(&mut self, entries: &[Entry]) -> Result<()> {
        for entry in entries {
            let start_str = entry
                .started_at
                .with_timezone(&Local)
                .format("%H:%M")
                .to_string();
            let end_str = entry
                .finished_at
                .map(|finished| finished.with_timezone(&Local).format("%H:%M").to_string())
                .unwrap_or_else(|| "now".to_string());
            writeln!(
                self.writer,
                "- {} ~ {}: {}",
                start_str, end_str, entry.description
            )
            .with_context(|| format!("Failed to write entry: {:?}", entry))?;
        }

        Ok(())
    }
}
