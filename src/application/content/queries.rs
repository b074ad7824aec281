use std::collections::BTreeSet;
use std::sync::Arc;

use time::{Date, Month, Time, UtcOffset};
use tracing::{debug, instrument};

use super::{ContentError, ContentService};
use crate::{
    cache::CategoryEntry,
    domain::{
        entities::Entry,
        filters::{
            all_of, day_in_month, entry_in_local_month, from_user, in_category,
            occurs_on_or_before, visible_to,
        },
        types::Viewer,
    },
    infra::storage::{DayFile, layout::format_date},
    util::timezone::{local_date, month_bounds},
};

const VIRTUAL_ENTRY_PREFIX: &str = "day-";

impl ContentService {
    /// Range query over registered days, newest first.
    ///
    /// `max_days` counts day files actually inspected, so days with no file
    /// never count while an existing empty day does. Untitled entries of a day
    /// are folded into one virtual `day-YYYYMMDD` entry placed after that
    /// day's titled entries. Stops once `max_entries` titled entries are
    /// collected.
    pub fn get_entries(
        &self,
        day_filter: impl Fn(Date) -> bool,
        entry_filter: impl Fn(&Entry) -> bool,
        max_days: usize,
        max_entries: usize,
    ) -> Result<Vec<Arc<Entry>>, ContentError> {
        let mut collected = Vec::new();
        let mut titled = 0;
        let mut inspected = 0;

        for date in self.data.day_dates().into_iter().rev() {
            if inspected >= max_days || titled >= max_entries {
                break;
            }
            if !day_filter(date) {
                continue;
            }
            let Some(day_entries) = self.data.read_existing_day(date, DayFile::newest_first)? else {
                continue;
            };
            inspected += 1;

            let mut untitled = Vec::new();
            for entry in day_entries.into_iter().filter(|entry| entry_filter(&**entry)) {
                if !entry.has_title() {
                    untitled.push(entry);
                } else if titled < max_entries {
                    collected.push(entry);
                    titled += 1;
                } else {
                    break;
                }
            }
            if let Some(virtual_entry) = self.fold_untitled(date, &untitled) {
                collected.push(Arc::new(virtual_entry));
            }
        }

        debug!(inspected, titled, returned = collected.len(), "Range query finished");
        Ok(collected)
    }

    /// Entries on or before `start`, walking back over at most `max_days`
    /// day files, optionally restricted to a category.
    #[instrument(skip(self))]
    pub fn get_entries_for_day(
        &self,
        start: Date,
        viewer: Viewer,
        max_days: usize,
        max_entries: usize,
        category: Option<&str>,
    ) -> Result<Vec<Arc<Entry>>, ContentError> {
        let mut filters: Vec<Box<dyn Fn(&Entry) -> bool + Send + Sync>> =
            vec![Box::new(visible_to(viewer))];
        if let Some(category) = category.map(str::trim).filter(|name| !name.is_empty()) {
            filters.push(Box::new(in_category(category)));
        }
        self.get_entries(occurs_on_or_before(start), all_of(filters), max_days, max_entries)
    }

    /// Entries created in the given month as seen at `offset`.
    #[instrument(skip(self))]
    pub fn get_entries_for_month(
        &self,
        year: i32,
        month: Month,
        offset: UtcOffset,
        viewer: Viewer,
    ) -> Result<Vec<Arc<Entry>>, ContentError> {
        let (Some(day_filter), Some((first, last))) = (day_in_month(year, month), month_bounds(year, month)) else {
            return Ok(Vec::new());
        };
        // Padding days on both sides of the month.
        let max_days = usize::from(last.day() - first.day()) + 3;
        let visible = visible_to(viewer);
        let in_month = entry_in_local_month(offset, year, month);
        self.get_entries(
            day_filter,
            move |entry: &Entry| visible(entry) && in_month(entry),
            max_days,
            usize::MAX,
        )
    }

    /// Entries in the category (by name or URL-safe name), newest first.
    #[instrument(skip(self))]
    pub fn get_entries_for_category(
        &self,
        name_or_url_safe: &str,
        viewer: Viewer,
    ) -> Result<Vec<Arc<Entry>>, ContentError> {
        let Some(category) = self.categories.category(name_or_url_safe)? else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::with_capacity(category.details.len());
        for detail in category.details.iter().filter(|detail| viewer.can_see(detail.is_public)) {
            let found = self
                .data
                .read_existing_day(detail.day, |day| day.find_by_id(&detail.entry_id).cloned())?
                .flatten();
            entries.extend(found.filter(|entry| viewer.can_see(entry.is_public)));
        }
        entries.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(entries)
    }

    /// Every entry by `author` (case-insensitive), newest first.
    #[instrument(skip(self))]
    pub fn get_entries_for_user(&self, author: &str, viewer: Viewer) -> Result<Vec<Arc<Entry>>, ContentError> {
        let visible = visible_to(viewer);
        let by_author = from_user(author);
        let mut entries = Vec::new();
        for date in self.data.day_dates().into_iter().rev() {
            let Some(day_entries) = self.data.read_existing_day(date, DayFile::newest_first)? else {
                continue;
            };
            entries.extend(
                day_entries
                    .into_iter()
                    .filter(|entry| visible(&**entry) && by_author(&**entry)),
            );
        }
        Ok(entries)
    }

    /// Distinct local dates, newest first, that have at least one public entry.
    pub fn get_days_with_entries(&self, offset: UtcOffset) -> Result<Vec<Date>, ContentError> {
        let snapshot = self.entries.snapshot()?;
        let days: BTreeSet<Date> = snapshot
            .entries()
            .iter()
            .filter(|entry| entry.is_public)
            .map(|entry| local_date(entry.created_utc, offset))
            .collect();
        Ok(days.into_iter().rev().collect())
    }

    /// Copy of the day file for `date`, if one exists.
    pub fn get_day(&self, date: Date) -> Result<Option<DayFile>, ContentError> {
        Ok(self.data.read_existing_day(date, DayFile::clone)?)
    }

    /// The virtual entry folding the day's untitled entries, if there are any.
    pub fn get_virtual_entry_for_day(&self, date: Date, viewer: Viewer) -> Result<Option<Entry>, ContentError> {
        let visible = visible_to(viewer);
        let Some(untitled) = self.data.read_existing_day(date, |day| {
            day.newest_first()
                .into_iter()
                .filter(|entry| !entry.has_title() && visible(&**entry))
                .collect::<Vec<_>>()
        })?
        else {
            return Ok(None);
        };
        Ok(self.fold_untitled(date, &untitled))
    }

    /// Lite copies of every entry, newest first.
    pub fn lite_entries(&self) -> Result<Vec<Entry>, ContentError> {
        Ok(self.entries.entries()?)
    }

    pub fn get_categories(&self, viewer: Viewer) -> Result<Vec<CategoryEntry>, ContentError> {
        Ok(self.categories.categories(viewer)?)
    }

    /// Category name behind a URL-safe name; the input when unknown.
    pub fn get_category_title(&self, url_safe: &str) -> Result<String, ContentError> {
        Ok(self.categories.category_title(url_safe)?)
    }

    pub fn title_for_entry_id(&self, entry_id: &str) -> Result<Option<String>, ContentError> {
        Ok(self.entries.title_for_entry_id(entry_id)?)
    }

    /// Public, comment-less entry whose content is one `dayentry` block per
    /// untitled entry, each led by a `#` link to the entry. `None` when no
    /// untitled entry has any text.
    fn fold_untitled(&self, date: Date, untitled: &[Arc<Entry>]) -> Option<Entry> {
        let mut content = String::new();
        for entry in untitled {
            let text = if entry.content.is_empty() {
                entry.description.as_str()
            } else {
                entry.content.as_str()
            };
            if text.is_empty() {
                continue;
            }
            let link = self.link(&format!("post/{}", entry.entry_id));
            content.push_str(&format!(
                "<div class=\"dayentry\"><a href=\"{link}\">#</a>{text}</div>"
            ));
        }
        if content.is_empty() {
            return None;
        }

        let midnight = date.with_time(Time::MIDNIGHT).assume_utc();
        let mut day_entry = Entry::new(virtual_entry_id(date), format_date(date), midnight);
        day_entry.content = content;
        day_entry.allow_comments = false;
        Some(day_entry)
    }
}

/// `day-YYYYMMDD`.
fn virtual_entry_id(date: Date) -> String {
    format!(
        "{VIRTUAL_ENTRY_PREFIX}{:04}{:02}{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}
