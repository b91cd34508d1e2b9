use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod aggregate;
mod db;
mod models;
mod report;
mod store;
mod sync;
mod views;
mod window;

use models::{DateWindow, SortOrder, TenantContext};
use store::EventStore;
use sync::{ApplyOutcome, LiveSyncReconciler};
use views::ViewCoordinator;

#[derive(Parser)]
#[command(name = "review-dashboard")]
#[command(about = "Review activity dashboard for White Tap", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo client data
    Seed,
    /// Import historical activity from a CSV file
    Import {
        #[arg(long)]
        client: Uuid,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show the roster with points over a date window
    Roster {
        #[arg(long)]
        client: Uuid,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value = "desc")]
        sort: String,
    },
    /// Show top and low performers
    Ranked {
        #[arg(long)]
        client: Uuid,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(short, default_value_t = aggregate::DEFAULT_RANK_DEPTH)]
        k: usize,
    },
    /// Show monthly and daily trend series
    Trends {
        #[arg(long)]
        client: Uuid,
        #[arg(long)]
        year: Option<i32>,
        /// Restrict the daily series to one calendar month of --year
        #[arg(long, requires = "year", conflicts_with_all = ["start", "end"])]
        month: Option<u32>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        client: Uuid,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(short, default_value_t = aggregate::DEFAULT_RANK_DEPTH)]
        k: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Follow the change feed and keep a live points summary
    Watch {
        #[arg(long)]
        client: Uuid,
    },
}

fn parse_sort(value: &str) -> anyhow::Result<SortOrder> {
    match value {
        "asc" => Ok(SortOrder::Ascending),
        "desc" => Ok(SortOrder::Descending),
        other => anyhow::bail!("unknown sort order '{other}' (expected asc or desc)"),
    }
}

async fn loaded_coordinator(pool: &PgPool, client: Uuid) -> anyhow::Result<ViewCoordinator> {
    let mut store = EventStore::new(TenantContext { client_id: client });
    db::load_snapshot(pool, &mut store).await?;
    Ok(ViewCoordinator::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let client = db::seed(&pool).await?;
            println!("Seed data inserted for client {client}.");
        }
        Commands::Import { client, csv } => {
            let inserted = db::import_csv(&pool, client, &csv).await?;
            println!("Inserted {inserted} activity rows from {}.", csv.display());
        }
        Commands::Roster {
            client,
            start,
            end,
            sort,
        } => {
            let order = parse_sort(&sort)?;
            let mut coordinator = loaded_coordinator(&pool, client).await?;
            coordinator.set_date_window(DateWindow { start, end });
            coordinator.set_sort_order(order);

            let rows = coordinator.get_points_per_person();
            if rows.is_empty() {
                println!("No salespeople on the roster.");
                return Ok(());
            }
            for row in rows {
                println!("- {}: {} points", row.name, row.points);
            }
        }
        Commands::Ranked {
            client,
            start,
            end,
            k,
        } => {
            let mut coordinator = loaded_coordinator(&pool, client).await?;
            coordinator.set_date_window(DateWindow { start, end });
            coordinator.set_rank_depth(k);

            let ranking = coordinator.get_ranked();
            println!("Top performers:");
            for row in ranking.top.iter() {
                println!("- {} with {} points", row.name, row.points);
            }
            println!("Low performers:");
            for row in ranking.bottom.iter() {
                println!("- {} with {} points", row.name, row.points);
            }
        }
        Commands::Trends {
            client,
            year,
            month,
            start,
            end,
        } => {
            let mut coordinator = loaded_coordinator(&pool, client).await?;
            let window = match (year, month) {
                (Some(year), Some(month)) => {
                    if !(1..=12).contains(&month) {
                        anyhow::bail!("month must be between 1 and 12");
                    }
                    window::month_window(year, month)
                }
                _ => DateWindow { start, end },
            };
            coordinator.set_date_window(window);
            coordinator.set_reference_year(year);

            println!("Monthly trend:");
            for bucket in coordinator.get_monthly_trend() {
                println!("- {}: {}", bucket.month, bucket.points);
            }
            println!("Daily trend:");
            let days = coordinator.get_daily_trend();
            if days.is_empty() {
                println!("No activity in this window.");
            } else {
                for day in days {
                    println!("- {}: {}", day.date, day.count);
                }
            }
        }
        Commands::Report {
            client,
            start,
            end,
            k,
            out,
        } => {
            let mut coordinator = loaded_coordinator(&pool, client).await?;
            coordinator.set_date_window(DateWindow { start, end });
            coordinator.set_rank_depth(k);

            let points = coordinator.get_points_per_person();
            let ranking = coordinator.get_ranked();
            let monthly = coordinator.get_monthly_trend();
            let report = report::build_report(
                &client.to_string(),
                &coordinator.date_window(),
                &points,
                &ranking,
                &monthly,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Watch { client } => {
            let ctx = TenantContext { client_id: client };
            let reconciler = LiveSyncReconciler::new(ctx);
            let mut coordinator = ViewCoordinator::new(EventStore::new(ctx));

            // Subscribe before the snapshot fetch so changes committed during
            // the load are replayed through the idempotent upsert path
            // instead of being missed.
            let mut feed = db::ChangeFeed::subscribe(&pool).await?;
            db::load_snapshot(&pool, coordinator.store_mut()).await?;
            print_summary(&mut coordinator);

            loop {
                let notification = feed.recv().await?;
                match reconciler.apply(coordinator.store_mut(), notification) {
                    ApplyOutcome::Applied => print_summary(&mut coordinator),
                    ApplyOutcome::NoOp
                    | ApplyOutcome::OtherTenant
                    | ApplyOutcome::Malformed => {}
                }
            }
        }
    }

    Ok(())
}

fn print_summary(coordinator: &mut ViewCoordinator) {
    let rows = coordinator.get_points_per_person();
    let total: u64 = rows.iter().map(|row| row.points).sum();
    match rows.first() {
        Some(leader) => println!(
            "{} salespeople, {} points total, {} leads with {}",
            rows.len(),
            total,
            leader.name,
            leader.points
        ),
        None => println!("Roster is empty."),
    }
}
