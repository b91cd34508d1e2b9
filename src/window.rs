use std::borrow::Cow;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::{ActivityEvent, DateWindow};

/// The last representable instant of a calendar day, so an end date selects
/// the whole day.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN),
    )
}

/// Narrows `events` to the window. Both bounds absent is the identity case
/// and borrows the input rather than copying it. Each present bound is
/// applied on its own, so a start after the end selects nothing instead of
/// failing.
pub fn filter_events<'a>(
    window: &DateWindow,
    events: &'a [ActivityEvent],
) -> Cow<'a, [ActivityEvent]> {
    if window.is_unbounded() {
        return Cow::Borrowed(events);
    }

    let start = window.start.map(|date| date.and_time(NaiveTime::MIN));
    let end = window.end.map(end_of_day);

    Cow::Owned(
        events
            .iter()
            .filter(|event| {
                start.map_or(true, |bound| event.occurred_at >= bound)
                    && end.map_or(true, |bound| event.occurred_at <= bound)
            })
            .cloned()
            .collect(),
    )
}

/// Window covering one whole calendar month, for the month-scoped daily
/// performance view. An out-of-range month yields an unbounded window; the
/// CLI validates before calling.
pub fn month_window(year: i32, month: u32) -> DateWindow {
    let start = NaiveDate::from_ymd_opt(year, month, 1);
    let end = start.and_then(|_| {
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
    });
    DateWindow { start, end }
}
