use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use uuid::Uuid;

/// A roster entry. Created, renamed and removed by admin action; the core
/// only observes those edits through the change feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Salesman {
    pub id: Uuid,
    pub name: String,
    pub client_id: Uuid,
}

/// One logged review-generation activity, worth one point. Weak reference to
/// a Salesman: the row may outlive its roster entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub salesman_id: Uuid,
    pub client_id: Uuid,
    pub occurred_at: NaiveDateTime,
}

/// The owning organization, passed explicitly into store and reconciler
/// construction. No ambient tenant lookups anywhere in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub client_id: Uuid,
}

/// Optional calendar-date range. Each bound applies independently; an end
/// date is inclusive through 23:59:59.999 of that day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FeedTable {
    #[serde(rename = "salesmen")]
    Salesmen,
    #[serde(rename = "salesman_activity")]
    Activity,
}

/// One change-feed delivery. `new` carries the row for inserts and updates,
/// `old` for deletes; both stay raw JSON until the reconciler decodes them.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeNotification {
    pub op: Operation,
    pub table: FeedTable,
    #[serde(default)]
    pub new: Option<serde_json::Value>,
    #[serde(default)]
    pub old: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One row of the points-per-person view.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesmanPoints {
    pub salesman_id: Uuid,
    pub name: String,
    pub points: u64,
}

/// Top and bottom performers. The two lists may overlap when the roster has
/// fewer than twice the requested depth; that is accepted, not deduplicated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedSubset {
    pub top: Vec<SalesmanPoints>,
    pub bottom: Vec<SalesmanPoints>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthBucket {
    pub month: &'static str,
    pub points: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub count: u64,
}
