use uuid::Uuid;

use crate::models::{ActivityEvent, Salesman, TenantContext};

/// Authoritative in-memory copy of one client's roster and activity rows.
///
/// Every mutation bumps a monotonic version counter; the coordinator stamps
/// its cached views with it to decide staleness. Upserts are idempotent and
/// last-write-wins by arrival order, because the change feed's delivered
/// order is authoritative even when it disagrees with a record's own
/// timestamp.
#[derive(Debug)]
pub struct EventStore {
    ctx: TenantContext,
    salesmen: Vec<Salesman>,
    events: Vec<ActivityEvent>,
    version: u64,
}

impl EventStore {
    pub fn new(ctx: TenantContext) -> Self {
        Self {
            ctx,
            salesmen: Vec::new(),
            events: Vec::new(),
            version: 0,
        }
    }

    pub fn client_id(&self) -> Uuid {
        self.ctx.client_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Roster in insertion order, which is the tie-break order every
    /// ranked view inherits.
    pub fn salesmen(&self) -> &[Salesman] {
        &self.salesmen
    }

    /// Events sorted by (occurred_at, id) so snapshots are deterministic.
    pub fn events(&self) -> &[ActivityEvent] {
        &self.events
    }

    /// Tenant-wide raw count, orphaned rows included.
    pub fn raw_event_count(&self) -> usize {
        self.events.len()
    }

    /// Replaces the full contents with a fresh snapshot.
    pub fn load(&mut self, salesmen: Vec<Salesman>, events: Vec<ActivityEvent>) {
        self.salesmen = salesmen;
        self.events = events;
        self.events
            .sort_by(|a, b| (a.occurred_at, a.id).cmp(&(b.occurred_at, b.id)));
        self.version += 1;
    }

    /// Insert if the id is unseen, otherwise overwrite in place. Never
    /// fails on a duplicate id.
    pub fn upsert_salesman(&mut self, salesman: Salesman) {
        match self.salesmen.iter_mut().find(|s| s.id == salesman.id) {
            Some(existing) => *existing = salesman,
            None => self.salesmen.push(salesman),
        }
        self.version += 1;
    }

    /// Removes the roster entry. Activity rows referencing it stay put:
    /// deleting a salesperson must not retroactively erase history.
    pub fn remove_salesman(&mut self, id: Uuid) -> bool {
        let before = self.salesmen.len();
        self.salesmen.retain(|s| s.id != id);
        let removed = self.salesmen.len() != before;
        if removed {
            self.version += 1;
        }
        removed
    }

    pub fn upsert_event(&mut self, event: ActivityEvent) {
        // The replacement may carry a different timestamp, so drop any
        // existing row first and reinsert at the sorted position.
        self.events.retain(|e| e.id != event.id);
        let key = (event.occurred_at, event.id);
        let position = self
            .events
            .partition_point(|e| (e.occurred_at, e.id) < key);
        self.events.insert(position, event);
        self.version += 1;
    }

    pub fn remove_event(&mut self, id: Uuid) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        let removed = self.events.len() != before;
        if removed {
            self.version += 1;
        }
        removed
    }
}
