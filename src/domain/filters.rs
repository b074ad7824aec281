//! Predicates for range queries over days and entries.
//!
//! Day filters see only the UTC date of a registered day file; entry filters
//! see the full record. Both are plain closures so callers can combine them
//! with [`all_of`] or write their own.

use time::{Date, Month, UtcOffset};

use crate::{
    domain::{
        entities::{Entry, keys_match},
        types::Viewer,
    },
    util::timezone::{local_date, month_bounds},
};

/// Days on or before `date`.
pub fn occurs_on_or_before(date: Date) -> impl Fn(Date) -> bool + Send + Sync {
    move |day| day <= date
}

/// Days whose UTC date can hold an entry created in the given local month.
///
/// UTC day files straddle local month boundaries, so the window is widened by
/// one day on each side; pair it with [`entry_in_local_month`] for exact
/// results. Returns `None` for an invalid year.
pub fn day_in_month(year: i32, month: Month) -> Option<impl Fn(Date) -> bool + Send + Sync> {
    let (first, last) = month_bounds(year, month)?;
    let start = first.previous_day().unwrap_or(first);
    let end = last.next_day().unwrap_or(last);
    Some(move |day: Date| day >= start && day <= end)
}

pub fn any_day() -> impl Fn(Date) -> bool + Send + Sync {
    |_| true
}

pub fn any_entry() -> impl Fn(&Entry) -> bool + Send + Sync {
    |_| true
}

pub fn visible_to(viewer: Viewer) -> impl Fn(&Entry) -> bool + Send + Sync {
    move |entry| viewer.can_see(entry.is_public)
}

pub fn in_category(name: &str) -> impl Fn(&Entry) -> bool + Send + Sync + use<> {
    let name = name.to_string();
    move |entry| entry.is_in_category(&name)
}

pub fn from_user(author: &str) -> impl Fn(&Entry) -> bool + Send + Sync + use<> {
    let author = author.to_string();
    move |entry| keys_match(&entry.author, &author)
}

/// Entries whose creation time, viewed at `offset`, falls in `year`/`month`.
pub fn entry_in_local_month(
    offset: UtcOffset,
    year: i32,
    month: Month,
) -> impl Fn(&Entry) -> bool + Send + Sync {
    move |entry| {
        let local = local_date(entry.created_utc, offset);
        local.year() == year && local.month() == month
    }
}

/// Conjunction of entry filters.
pub fn all_of(
    filters: Vec<Box<dyn Fn(&Entry) -> bool + Send + Sync>>,
) -> impl Fn(&Entry) -> bool + Send + Sync {
    move |entry| filters.iter().all(|filter| filter(entry))
}
