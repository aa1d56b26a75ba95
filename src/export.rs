//! Read-only projections of the message log: the downloadable transcript and
//! the short timestamps shown next to messages.

use crate::error::ExportError;
use crate::message::MessageLog;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use std::fmt::Display;
use std::path::{Path, PathBuf};

const TRANSCRIPT_TIME_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";
const DISPLAY_TIME_FORMAT: &str = "%b %-d, %I:%M %p";

/// `[time] Role: text` per committed message, in local time.
pub fn transcript(log: &MessageLog) -> String {
    render_transcript(log, &Local)
}

fn render_transcript<Tz>(log: &MessageLog, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    log.committed()
        .map(|m| {
            format!(
                "[{}] {}: {}",
                m.created_at.with_timezone(tz).format(TRANSCRIPT_TIME_FORMAT),
                m.role.as_str(),
                m.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("chat-export-{}.txt", date.format("%Y-%m-%d"))
}

/// Write the transcript into `dir`, returning the file path.
pub fn write_transcript(log: &MessageLog, dir: &Path) -> Result<PathBuf, ExportError> {
    let path = dir.join(export_file_name(Local::now().date_naive()));
    std::fs::write(&path, transcript(log)).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Short local timestamp, e.g. `Oct 18, 02:30 PM`.
pub fn format_display_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(DISPLAY_TIME_FORMAT).to_string()
}
