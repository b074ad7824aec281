//! File naming inside the content directory.

use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

pub const DAY_ENTRY_SUFFIX: &str = ".dayentry.json";
pub const DAY_EXTRA_SUFFIX: &str = ".dayfeedback.json";
pub const ALL_COMMENTS_FILE: &str = "allcomments.json";

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    DayEntry,
    DayExtra,
}

pub fn file_name(date: Date, kind: FileKind) -> String {
    let suffix = match kind {
        FileKind::DayEntry => DAY_ENTRY_SUFFIX,
        FileKind::DayExtra => DAY_EXTRA_SUFFIX,
    };
    format!("{}{suffix}", format_date(date))
}

/// `YYYY-MM-DD`, also used for virtual day titles.
pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()))
}

/// Recognises day file names; anything else in the directory is ignored.
pub fn parse_file_name(name: &str) -> Option<(Date, FileKind)> {
    let (stem, kind) = if let Some(stem) = name.strip_suffix(DAY_ENTRY_SUFFIX) {
        (stem, FileKind::DayEntry)
    } else if let Some(stem) = name.strip_suffix(DAY_EXTRA_SUFFIX) {
        (stem, FileKind::DayExtra)
    } else {
        return None;
    };
    let date = Date::parse(stem, DATE_FORMAT).ok()?;
    Some((date, kind))
}
