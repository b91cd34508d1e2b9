use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use uuid::Uuid;

use crate::models::{
    ActivityEvent, DayBucket, MonthBucket, RankedSubset, Salesman, SalesmanPoints,
};

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub const DEFAULT_RANK_DEPTH: usize = 5;

/// Points per roster member: one activity event is one point. Emits one row
/// per Salesman in roster order, zero-point members included. Events whose
/// salesman_id matches nobody on the roster are left out here; they still
/// count toward the store's raw total.
pub fn points_per_person(
    events: &[ActivityEvent],
    salesmen: &[Salesman],
) -> Vec<SalesmanPoints> {
    let mut counts: HashMap<Uuid, u64> = HashMap::new();
    for event in events {
        *counts.entry(event.salesman_id).or_insert(0) += 1;
    }

    salesmen
        .iter()
        .map(|salesman| SalesmanPoints {
            salesman_id: salesman.id,
            name: salesman.name.clone(),
            points: counts.get(&salesman.id).copied().unwrap_or(0),
        })
        .collect()
}

/// Top and bottom `k` performers. Sorts are stable, so zero-point ties keep
/// roster order. The bottom list is reversed to read highest-of-the-low
/// group first.
pub fn ranked(events: &[ActivityEvent], salesmen: &[Salesman], k: usize) -> RankedSubset {
    let rows = points_per_person(events, salesmen);

    let mut top = rows.clone();
    top.sort_by(|a, b| b.points.cmp(&a.points));
    top.truncate(k);

    let mut bottom = rows;
    bottom.sort_by(|a, b| a.points.cmp(&b.points));
    bottom.truncate(k);
    bottom.reverse();

    RankedSubset { top, bottom }
}

/// Twelve fixed calendar-month buckets, January through December, zeros
/// included. Re-filters on each event's own client_id rather than trusting
/// upstream scoping. `reference_year` restricts to one year; `None` folds
/// all years together.
pub fn monthly_trend(
    events: &[ActivityEvent],
    client_id: Uuid,
    reference_year: Option<i32>,
) -> Vec<MonthBucket> {
    let mut buckets = [0u64; 12];
    for event in events {
        if event.client_id != client_id {
            continue;
        }
        if let Some(year) = reference_year {
            if event.occurred_at.year() != year {
                continue;
            }
        }
        buckets[event.occurred_at.month0() as usize] += 1;
    }

    MONTH_NAMES
        .iter()
        .zip(buckets)
        .map(|(month, points)| MonthBucket { month, points })
        .collect()
}

/// Sparse per-day counts in chronological order. Days with no events are
/// omitted, not zero-filled.
pub fn daily_trend(events: &[ActivityEvent]) -> Vec<DayBucket> {
    let mut buckets: BTreeMap<chrono::NaiveDate, u64> = BTreeMap::new();
    for event in events {
        *buckets.entry(event.occurred_at.date()).or_insert(0) += 1;
    }

    buckets
        .into_iter()
        .map(|(date, count)| DayBucket { date, count })
        .collect()
}
