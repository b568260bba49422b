//! Basic example showing how to use pg-tracing.
//!
//! Run with: cargo run --example basic --features sqlx-postgres

use pg_tracing::prelude::*;
use pg_tracing::SeaOrmClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,pg_tracing=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Enable instrumentation with the subscriber installed above
    instrument(None);

    let config: ConnectionConfig = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "host=localhost port=5432 dbname=postgres user=postgres".into())
        .parse()?;

    tracing::info!("Connecting to database...");

    // Span "pg.initialize"
    let conn = TracedConnection::<SeaOrmClient>::connect(&config).await?;

    // Span "SELECT" with db.statement
    conn.exec("SELECT 1 AS one").await?;

    // Spans "CREATE", "INSERT" (prepare) and "pg.exec_prepared"
    conn.exec("CREATE TEMP TABLE test_pg (col1 text, col2 text, col3 text)")
        .await?;
    conn.prepare(
        "statement1",
        "insert into test_pg (col1, col2, col3) values ($1, $2, $3)",
    )
    .await?;
    conn.exec_prepared(
        "statement1",
        &["1".into(), "Test User".into(), "User testing...".into()],
    )
    .await?;

    // Failures are tagged error=true and still returned to the caller
    if let Err(err) = conn.exec("SELEC broken").await {
        tracing::warn!(error = %err, "query failed as expected");
    }

    Ok(())
}
