use crate::aggregate::{self, DEFAULT_RANK_DEPTH};
use crate::models::{
    DateWindow, DayBucket, MonthBucket, RankedSubset, SalesmanPoints, SortOrder,
};
use crate::store::EventStore;
use crate::window;

#[derive(Debug)]
struct Cached<P, V> {
    params: P,
    value: V,
}

type PointsStamp = (u64, DateWindow, SortOrder);
type RankedStamp = (u64, DateWindow, usize);
type MonthlyStamp = (u64, DateWindow, Option<i32>);
type DailyStamp = (u64, DateWindow);

/// Owns the store plus the parameters that shape every derived view, and
/// memoizes each view stamped with the store version and the parameters it
/// depends on. Setters only invalidate; recomputation happens on the next
/// `get`, so aggregation cost is decoupled from how often the UI polls.
#[derive(Debug)]
pub struct ViewCoordinator {
    store: EventStore,
    window: DateWindow,
    sort_order: SortOrder,
    rank_depth: usize,
    reference_year: Option<i32>,
    points: Option<Cached<PointsStamp, Vec<SalesmanPoints>>>,
    ranked: Option<Cached<RankedStamp, RankedSubset>>,
    monthly: Option<Cached<MonthlyStamp, Vec<MonthBucket>>>,
    daily: Option<Cached<DailyStamp, Vec<DayBucket>>>,
}

impl ViewCoordinator {
    pub fn new(store: EventStore) -> Self {
        Self {
            store,
            window: DateWindow::unbounded(),
            sort_order: SortOrder::Descending,
            rank_depth: DEFAULT_RANK_DEPTH,
            reference_year: None,
            points: None,
            ranked: None,
            monthly: None,
            daily: None,
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Mutable access for the initial-load path and the reconciler, the only
    /// writers. Version stamps pick up whatever they change.
    pub fn store_mut(&mut self) -> &mut EventStore {
        &mut self.store
    }

    pub fn date_window(&self) -> DateWindow {
        self.window
    }

    pub fn set_date_window(&mut self, window: DateWindow) {
        self.window = window;
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.sort_order = order;
    }

    pub fn set_rank_depth(&mut self, k: usize) {
        self.rank_depth = k;
    }

    pub fn set_reference_year(&mut self, year: Option<i32>) {
        self.reference_year = year;
    }

    /// Roster rows with points over the active window, ordered by points per
    /// the active sort order (stable, so ties keep roster order).
    pub fn get_points_per_person(&mut self) -> Vec<SalesmanPoints> {
        let stamp = (self.store.version(), self.window, self.sort_order);
        let stale = self.points.as_ref().map_or(true, |c| c.params != stamp);
        if stale {
            let events = window::filter_events(&self.window, self.store.events());
            let mut rows = aggregate::points_per_person(&events, self.store.salesmen());
            match self.sort_order {
                SortOrder::Ascending => rows.sort_by(|a, b| a.points.cmp(&b.points)),
                SortOrder::Descending => rows.sort_by(|a, b| b.points.cmp(&a.points)),
            }
            self.points = Some(Cached {
                params: stamp,
                value: rows,
            });
        }
        self.points
            .as_ref()
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn get_ranked(&mut self) -> RankedSubset {
        let stamp = (self.store.version(), self.window, self.rank_depth);
        let stale = self.ranked.as_ref().map_or(true, |c| c.params != stamp);
        if stale {
            let events = window::filter_events(&self.window, self.store.events());
            let value = aggregate::ranked(&events, self.store.salesmen(), self.rank_depth);
            self.ranked = Some(Cached {
                params: stamp,
                value,
            });
        }
        self.ranked
            .as_ref()
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn get_monthly_trend(&mut self) -> Vec<MonthBucket> {
        let stamp = (self.store.version(), self.window, self.reference_year);
        let stale = self.monthly.as_ref().map_or(true, |c| c.params != stamp);
        if stale {
            let events = window::filter_events(&self.window, self.store.events());
            let value =
                aggregate::monthly_trend(&events, self.store.client_id(), self.reference_year);
            self.monthly = Some(Cached {
                params: stamp,
                value,
            });
        }
        self.monthly
            .as_ref()
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn get_daily_trend(&mut self) -> Vec<DayBucket> {
        let stamp = (self.store.version(), self.window);
        let stale = self.daily.as_ref().map_or(true, |c| c.params != stamp);
        if stale {
            let events = window::filter_events(&self.window, self.store.events());
            let value = aggregate::daily_trend(&events);
            self.daily = Some(Cached {
                params: stamp,
                value,
            });
        }
        self.daily
            .as_ref()
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityEvent, Salesman, TenantContext};
    use chrono::NaiveDate;
    use uuid::Uuid;

    const CLIENT: Uuid = Uuid::from_u128(100);

    fn salesman(id: u128, name: &str) -> Salesman {
        Salesman {
            id: Uuid::from_u128(id),
            name: name.to_string(),
            client_id: CLIENT,
        }
    }

    fn event(id: u128, salesman: u128, m: u32, d: u32) -> ActivityEvent {
        ActivityEvent {
            id: Uuid::from_u128(id),
            salesman_id: Uuid::from_u128(salesman),
            client_id: CLIENT,
            occurred_at: NaiveDate::from_ymd_opt(2024, m, d)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        }
    }

    fn loaded_coordinator() -> ViewCoordinator {
        let mut store = EventStore::new(TenantContext { client_id: CLIENT });
        store.load(
            vec![salesman(1, "Amy"), salesman(2, "Bo")],
            vec![event(10, 1, 1, 5), event(11, 1, 1, 20), event(12, 2, 2, 1)],
        );
        ViewCoordinator::new(store)
    }

    #[test]
    fn points_view_reflects_sort_order() {
        let mut coordinator = loaded_coordinator();
        let desc = coordinator.get_points_per_person();
        assert_eq!(desc[0].name, "Amy");
        assert_eq!(desc[1].name, "Bo");

        coordinator.set_sort_order(SortOrder::Ascending);
        let asc = coordinator.get_points_per_person();
        assert_eq!(asc[0].name, "Bo");
        assert_eq!(asc[1].name, "Amy");
    }

    #[test]
    fn cached_view_survives_repeated_gets() {
        let mut coordinator = loaded_coordinator();
        let first = coordinator.get_points_per_person();
        let second = coordinator.get_points_per_person();
        assert_eq!(first, second);
    }

    #[test]
    fn store_mutation_invalidates_views() {
        let mut coordinator = loaded_coordinator();
        let before = coordinator.get_points_per_person();
        assert_eq!(before.iter().map(|r| r.points).sum::<u64>(), 3);

        coordinator.store_mut().upsert_event(event(13, 2, 3, 1));
        let after = coordinator.get_points_per_person();
        assert_eq!(after.iter().map(|r| r.points).sum::<u64>(), 4);
    }

    #[test]
    fn window_change_invalidates_lazily() {
        let mut coordinator = loaded_coordinator();
        assert_eq!(coordinator.get_daily_trend().len(), 3);

        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        coordinator.set_date_window(DateWindow {
            start: Some(feb),
            end: Some(feb),
        });
        let days = coordinator.get_daily_trend();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, feb);

        let rows = coordinator.get_points_per_person();
        let amy = rows.iter().find(|r| r.name == "Amy").unwrap();
        assert_eq!(amy.points, 0);
    }

    #[test]
    fn removed_salesman_vanishes_from_views_but_not_raw_count() {
        let mut coordinator = loaded_coordinator();
        coordinator.store_mut().remove_salesman(Uuid::from_u128(1));

        let rows = coordinator.get_points_per_person();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Bo");
        // Amy's two events are orphaned, not erased.
        assert_eq!(coordinator.store().raw_event_count(), 3);
    }

    #[test]
    fn rank_depth_parameterizes_ranked_view() {
        let mut coordinator = loaded_coordinator();
        coordinator.set_rank_depth(1);
        let ranking = coordinator.get_ranked();
        assert_eq!(ranking.top.len(), 1);
        assert_eq!(ranking.top[0].name, "Amy");
        assert_eq!(ranking.bottom.len(), 1);
        assert_eq!(ranking.bottom[0].name, "Bo");
    }

    #[test]
    fn monthly_view_recomputes_on_reference_year_change() {
        let mut coordinator = loaded_coordinator();
        let all = coordinator.get_monthly_trend();
        assert_eq!(all[0].points, 2);

        coordinator.set_reference_year(Some(2023));
        let scoped = coordinator.get_monthly_trend();
        assert!(scoped.iter().all(|b| b.points == 0));
        assert_eq!(scoped.len(), 12);
    }
}
