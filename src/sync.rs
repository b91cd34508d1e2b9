use serde::Deserialize;
use uuid::Uuid;

use crate::models::{
    ActivityEvent, ChangeNotification, FeedTable, Operation, Salesman, TenantContext,
};
use crate::store::EventStore;

/// What became of one delivered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The store was mutated; its version advanced.
    Applied,
    /// Valid notification with nothing to do, e.g. a delete whose id is
    /// already absent because deliveries raced or repeated.
    NoOp,
    /// The record belongs to another client; the feed filter is not trusted.
    OtherTenant,
    /// Payload missing or undecodable; dropped with a diagnostic.
    Malformed,
}

/// Minimal shape a delete payload must carry. The feed may strip deleted
/// rows down to their primary key.
#[derive(Debug, Deserialize)]
struct RowKey {
    id: Uuid,
    #[serde(default)]
    client_id: Option<Uuid>,
}

/// Applies change-feed deliveries to the store so it converges to the remote
/// state despite duplicate and out-of-order delivery.
///
/// Insert and update collapse into one upsert path, which absorbs replays
/// and reordering on its own; deletes tolerate absence. Conflicts are never
/// resolved by re-fetching: last-delivered-write-wins is the consistency
/// model, and a stale update racing a delete from another stream can
/// momentarily resurrect a row until a later delete arrives.
#[derive(Debug)]
pub struct LiveSyncReconciler {
    ctx: TenantContext,
}

impl LiveSyncReconciler {
    pub fn new(ctx: TenantContext) -> Self {
        Self { ctx }
    }

    /// Applies one notification. Never fails and never stalls the feed: a
    /// malformed payload is logged and dropped, leaving the store as it was.
    pub fn apply(
        &self,
        store: &mut EventStore,
        notification: ChangeNotification,
    ) -> ApplyOutcome {
        let op = notification.op;
        match (op, notification.table) {
            (Operation::Insert | Operation::Update, FeedTable::Salesmen) => {
                match decode::<Salesman>(notification.new, op, "salesmen") {
                    Some(salesman) if salesman.client_id == self.ctx.client_id => {
                        store.upsert_salesman(salesman);
                        ApplyOutcome::Applied
                    }
                    Some(_) => ApplyOutcome::OtherTenant,
                    None => ApplyOutcome::Malformed,
                }
            }
            (Operation::Insert | Operation::Update, FeedTable::Activity) => {
                match decode::<ActivityEvent>(notification.new, op, "salesman_activity") {
                    Some(event) if event.client_id == self.ctx.client_id => {
                        store.upsert_event(event);
                        ApplyOutcome::Applied
                    }
                    Some(_) => ApplyOutcome::OtherTenant,
                    None => ApplyOutcome::Malformed,
                }
            }
            (Operation::Delete, table) => {
                let Some(key) = decode::<RowKey>(notification.old, op, "delete") else {
                    return ApplyOutcome::Malformed;
                };
                if key.client_id.is_some_and(|client| client != self.ctx.client_id) {
                    return ApplyOutcome::OtherTenant;
                }
                let removed = match table {
                    FeedTable::Salesmen => store.remove_salesman(key.id),
                    FeedTable::Activity => store.remove_event(key.id),
                };
                if removed {
                    ApplyOutcome::Applied
                } else {
                    ApplyOutcome::NoOp
                }
            }
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    payload: Option<serde_json::Value>,
    op: Operation,
    table: &str,
) -> Option<T> {
    let Some(payload) = payload else {
        tracing::warn!(?op, table, "change notification carried no record, dropped");
        return None;
    };
    match serde_json::from_value(payload) {
        Ok(record) => Some(record),
        Err(error) => {
            tracing::warn!(?op, table, %error, "malformed change notification dropped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    const CLIENT: Uuid = Uuid::from_u128(100);

    fn ctx() -> TenantContext {
        TenantContext { client_id: CLIENT }
    }

    fn event_row(id: u128, salesman: u128, client: Uuid) -> serde_json::Value {
        json!({
            "id": Uuid::from_u128(id),
            "salesman_id": Uuid::from_u128(salesman),
            "client_id": client,
            "occurred_at": "2024-01-05T10:30:00",
        })
    }

    fn insert_event(id: u128) -> ChangeNotification {
        ChangeNotification {
            op: Operation::Insert,
            table: FeedTable::Activity,
            new: Some(event_row(id, 1, CLIENT)),
            old: None,
        }
    }

    fn delete_event(id: u128) -> ChangeNotification {
        ChangeNotification {
            op: Operation::Delete,
            table: FeedTable::Activity,
            new: None,
            old: Some(json!({ "id": Uuid::from_u128(id), "client_id": CLIENT })),
        }
    }

    #[test]
    fn duplicate_insert_delivery_is_absorbed() {
        let reconciler = LiveSyncReconciler::new(ctx());
        let mut store = EventStore::new(ctx());
        assert_eq!(
            reconciler.apply(&mut store, insert_event(9)),
            ApplyOutcome::Applied
        );
        let contents = store.events().to_vec();
        reconciler.apply(&mut store, insert_event(9));
        assert_eq!(store.events(), contents.as_slice());
    }

    #[test]
    fn delete_before_insert_leaves_store_unchanged() {
        let reconciler = LiveSyncReconciler::new(ctx());
        let mut store = EventStore::new(ctx());
        assert_eq!(
            reconciler.apply(&mut store, delete_event(9)),
            ApplyOutcome::NoOp
        );
        assert_eq!(store.raw_event_count(), 0);
    }

    #[test]
    fn replayed_insert_delete_insert_converges_to_present() {
        let reconciler = LiveSyncReconciler::new(ctx());
        let mut store = EventStore::new(ctx());
        reconciler.apply(&mut store, insert_event(9));
        reconciler.apply(&mut store, delete_event(9));
        reconciler.apply(&mut store, insert_event(9));
        assert_eq!(store.raw_event_count(), 1);
        assert_eq!(store.events()[0].id, Uuid::from_u128(9));
    }

    #[test]
    fn malformed_payload_is_dropped_without_stalling() {
        let reconciler = LiveSyncReconciler::new(ctx());
        let mut store = EventStore::new(ctx());
        let missing_id = ChangeNotification {
            op: Operation::Insert,
            table: FeedTable::Activity,
            new: Some(json!({ "salesman_id": Uuid::from_u128(1), "client_id": CLIENT })),
            old: None,
        };
        assert_eq!(
            reconciler.apply(&mut store, missing_id),
            ApplyOutcome::Malformed
        );
        assert_eq!(store.raw_event_count(), 0);

        let empty = ChangeNotification {
            op: Operation::Update,
            table: FeedTable::Salesmen,
            new: None,
            old: None,
        };
        assert_eq!(reconciler.apply(&mut store, empty), ApplyOutcome::Malformed);

        // The next well-formed delivery still applies.
        assert_eq!(
            reconciler.apply(&mut store, insert_event(1)),
            ApplyOutcome::Applied
        );
    }

    #[test]
    fn foreign_tenant_rows_are_skipped() {
        let reconciler = LiveSyncReconciler::new(ctx());
        let mut store = EventStore::new(ctx());
        let foreign = ChangeNotification {
            op: Operation::Insert,
            table: FeedTable::Activity,
            new: Some(event_row(1, 1, Uuid::from_u128(999))),
            old: None,
        };
        assert_eq!(
            reconciler.apply(&mut store, foreign),
            ApplyOutcome::OtherTenant
        );
        assert_eq!(store.raw_event_count(), 0);
    }

    #[test]
    fn update_renames_roster_entry() {
        let reconciler = LiveSyncReconciler::new(ctx());
        let mut store = EventStore::new(ctx());
        let insert = ChangeNotification {
            op: Operation::Insert,
            table: FeedTable::Salesmen,
            new: Some(json!({ "id": Uuid::from_u128(1), "name": "Amy", "client_id": CLIENT })),
            old: None,
        };
        let rename = ChangeNotification {
            op: Operation::Update,
            table: FeedTable::Salesmen,
            new: Some(json!({ "id": Uuid::from_u128(1), "name": "Amelia", "client_id": CLIENT })),
            old: None,
        };
        reconciler.apply(&mut store, insert);
        reconciler.apply(&mut store, rename);
        assert_eq!(store.salesmen().len(), 1);
        assert_eq!(store.salesmen()[0].name, "Amelia");
    }

    #[test]
    fn delete_with_bare_key_still_applies() {
        let reconciler = LiveSyncReconciler::new(ctx());
        let mut store = EventStore::new(ctx());
        reconciler.apply(&mut store, insert_event(9));
        let bare = ChangeNotification {
            op: Operation::Delete,
            table: FeedTable::Activity,
            new: None,
            old: Some(json!({ "id": Uuid::from_u128(9) })),
        };
        assert_eq!(reconciler.apply(&mut store, bare), ApplyOutcome::Applied);
        assert_eq!(store.raw_event_count(), 0);
    }
}
