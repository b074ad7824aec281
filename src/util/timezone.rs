use time::{Date, Month, OffsetDateTime, UtcOffset};

/// Calendar date of `time` as observed at `offset`.
pub fn local_date(time: OffsetDateTime, offset: UtcOffset) -> Date {
    time.to_offset(offset).date()
}

/// Calendar date of `time` in UTC; this is the key of the owning day file.
pub fn utc_date(time: OffsetDateTime) -> Date {
    local_date(time, UtcOffset::UTC)
}

/// First and last day of the given month.
pub fn month_bounds(year: i32, month: Month) -> Option<(Date, Date)> {
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let next_year = if month == Month::December {
        year.checked_add(1)?
    } else {
        year
    };
    let next_first = Date::from_calendar_date(next_year, month.next(), 1).ok()?;
    Some((first, next_first.previous_day()?))
}
