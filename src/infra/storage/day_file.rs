//! One calendar day's entries.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::Date;
use tracing::warn;

use super::{codec, error::StoreError};
use crate::domain::{entities::Entry, slug::compressed_title};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Entries whose UTC creation date is `date`.
///
/// Entries are held behind `Arc` so readers can keep a record after the day
/// moves on; an edit replaces the slot instead of mutating the shared value.
#[derive(Debug, Clone, PartialEq)]
pub struct DayFile {
    date: Date,
    entries: Vec<Arc<Entry>>,
}

#[derive(Serialize)]
struct DayFileView<'a> {
    #[serde(with = "iso_date")]
    date: Date,
    entries: Vec<&'a Entry>,
}

#[derive(Deserialize)]
struct DayFileRecord {
    #[serde(with = "iso_date")]
    date: Date,
    #[serde(default)]
    entries: Vec<Entry>,
}

impl DayFile {
    pub fn new(date: Date) -> Self {
        Self {
            date,
            entries: Vec::new(),
        }
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn entries(&self) -> &[Arc<Entry>] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered newest first.
    pub fn newest_first(&self) -> Vec<Arc<Entry>> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        entries
    }

    /// Looks up by entry id, then by compressed title.
    pub fn find(&self, key: &str) -> Option<&Arc<Entry>> {
        self.position(key).map(|index| &self.entries[index])
    }

    fn position(&self, key: &str) -> Option<usize> {
        if let Some(index) = self.entries.iter().position(|entry| entry.matches_id(key)) {
            return Some(index);
        }
        let compressed = compressed_title(key)?;
        self.entries
            .iter()
            .position(|entry| entry.matches_compressed_title(&compressed))
    }

    pub fn find_by_id(&self, entry_id: &str) -> Option<&Arc<Entry>> {
        self.entries.iter().find(|entry| entry.matches_id(entry_id))
    }

    /// Replaces the entry with the same id or appends it.
    /// Returns the record that was replaced.
    pub fn upsert(&mut self, entry: Arc<Entry>) -> Option<Arc<Entry>> {
        match self
            .entries
            .iter()
            .position(|existing| existing.matches_id(&entry.entry_id))
        {
            Some(index) => Some(std::mem::replace(&mut self.entries[index], entry)),
            None => {
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn remove(&mut self, entry_id: &str) -> Option<Arc<Entry>> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.matches_id(entry_id))?;
        Some(self.entries.remove(index))
    }

    pub(crate) fn load(path: &Path, date: Date) -> Result<Option<Self>, StoreError> {
        let Some(record) = codec::read_json::<DayFileRecord>(path)? else {
            return Ok(None);
        };
        if record.date != date {
            warn!(
                path = %path.display(),
                recorded = %record.date,
                "Day file date disagrees with its file name; using the file name"
            );
        }
        Ok(Some(Self {
            date,
            entries: record.entries.into_iter().map(Arc::new).collect(),
        }))
    }

    pub(crate) fn save(&self, path: &Path) -> Result<(), StoreError> {
        let view = DayFileView {
            date: self.date,
            entries: self.entries.iter().map(|entry| entry.as_ref()).collect(),
        };
        codec::write_json(path, &view)
    }
}
