use anyhow::Context;
use chrono::NaiveDateTime;
use sqlx::postgres::PgListener;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{ActivityEvent, ChangeNotification, Salesman};
use crate::store::EventStore;

/// NOTIFY channel the schema triggers publish on.
pub const FEED_CHANNEL: &str = "review_dashboard_changes";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Inserts a demo client with a small roster and activity history; returns
/// the client id the other subcommands should be pointed at.
pub async fn seed(pool: &PgPool) -> anyhow::Result<Uuid> {
    let client_id = Uuid::parse_str("f6a1c1de-7c45-4bd0-9f3e-2d4a8f0b6c11")?;

    sqlx::query(
        r#"
        INSERT INTO review_dashboard.clients (id, name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
        "#,
    )
    .bind(client_id)
    .bind("Acme Plumbing")
    .execute(pool)
    .await?;

    let salesmen = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Amy Park",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Bo Reyes",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
        ),
    ];

    for (id, name) in &salesmen {
        sqlx::query(
            r#"
            INSERT INTO review_dashboard.salesmen (id, client_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(id)
        .bind(client_id)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let activity = vec![
        ("seed-001", salesmen[0].0, "2026-01-05T09:30:00"),
        ("seed-002", salesmen[0].0, "2026-01-20T14:10:00"),
        ("seed-003", salesmen[1].0, "2026-02-01T11:00:00"),
        ("seed-004", salesmen[2].0, "2026-02-12T16:45:00"),
        ("seed-005", salesmen[0].0, "2026-03-03T10:05:00"),
    ];

    for (source_key, salesman_id, occurred_at) in activity {
        let occurred_at: NaiveDateTime = occurred_at
            .parse()
            .context("invalid seed timestamp")?;
        sqlx::query(
            r#"
            INSERT INTO review_dashboard.salesman_activity
            (id, client_id, salesman_id, occurred_at, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(salesman_id)
        .bind(occurred_at)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(client_id)
}

pub async fn fetch_salesmen(pool: &PgPool, client_id: Uuid) -> anyhow::Result<Vec<Salesman>> {
    let rows = sqlx::query(
        "SELECT id, client_id, name FROM review_dashboard.salesmen \
         WHERE client_id = $1 ORDER BY created_at, id",
    )
    .bind(client_id)
    .fetch_all(pool)
    .await
    .context("failed to fetch roster")?;

    let mut salesmen = Vec::new();
    for row in rows {
        salesmen.push(Salesman {
            id: row.get("id"),
            client_id: row.get("client_id"),
            name: row.get("name"),
        });
    }

    Ok(salesmen)
}

pub async fn fetch_activity(
    pool: &PgPool,
    client_id: Uuid,
) -> anyhow::Result<Vec<ActivityEvent>> {
    let rows = sqlx::query(
        "SELECT id, client_id, salesman_id, occurred_at \
         FROM review_dashboard.salesman_activity WHERE client_id = $1",
    )
    .bind(client_id)
    .fetch_all(pool)
    .await
    .context("failed to fetch activity")?;

    let mut events = Vec::new();
    for row in rows {
        events.push(ActivityEvent {
            id: row.get("id"),
            client_id: row.get("client_id"),
            salesman_id: row.get("salesman_id"),
            occurred_at: row.get("occurred_at"),
        });
    }

    Ok(events)
}

/// Fetches the full snapshot and replaces the store's contents. Both
/// queries complete before anything is loaded, so a failed fetch leaves the
/// last-known-good contents in place.
pub async fn load_snapshot(pool: &PgPool, store: &mut EventStore) -> anyhow::Result<()> {
    let client_id = store.client_id();
    let salesmen = fetch_salesmen(pool, client_id).await?;
    let events = fetch_activity(pool, client_id).await?;
    store.load(salesmen, events);
    Ok(())
}

pub async fn import_csv(
    pool: &PgPool,
    client_id: Uuid,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        salesman_name: String,
        occurred_at: NaiveDateTime,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let salesman_id: Uuid = sqlx::query(
            r#"
            INSERT INTO review_dashboard.salesmen (id, client_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (client_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(&row.salesman_name)
        .fetch_one(pool)
        .await?
        .get("id");

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO review_dashboard.salesman_activity
            (id, client_id, salesman_id, occurred_at, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(salesman_id)
        .bind(row.occurred_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

/// Long-lived subscription to the trigger-driven change feed. Dropping it
/// ends delivery.
pub struct ChangeFeed {
    listener: PgListener,
}

impl ChangeFeed {
    pub async fn subscribe(pool: &PgPool) -> anyhow::Result<Self> {
        let mut listener = PgListener::connect_with(pool)
            .await
            .context("failed to open change feed connection")?;
        listener
            .listen(FEED_CHANNEL)
            .await
            .context("failed to subscribe to change feed")?;
        Ok(Self { listener })
    }

    /// Waits for the next decodable notification. A payload that is not
    /// valid JSON is logged and skipped so one bad delivery cannot stall
    /// the feed; only transport failures surface as errors.
    pub async fn recv(&mut self) -> anyhow::Result<ChangeNotification> {
        loop {
            let delivery = self
                .listener
                .recv()
                .await
                .context("change feed connection lost")?;
            match serde_json::from_str(delivery.payload()) {
                Ok(notification) => return Ok(notification),
                Err(error) => {
                    tracing::warn!(%error, "undecodable feed payload skipped");
                }
            }
        }
    }
}
