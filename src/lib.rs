//! # pg-tracing
//!
//! Tracing instrumentation for PostgreSQL client connections.
//!
//! This crate wraps a PostgreSQL connection in a decorator that creates a
//! `tracing` span around every connect, query, prepare and prepared-statement
//! call, tagging it with the connection's target and the statement being run.
//! Spans nest under whatever span is current, so database calls show up under
//! HTTP request spans from axum, actix-web and friends.
//!
//! ## Features
//!
//! - **Drop-in Wrapper**: `TracedConnection<C>` exposes the same operations as the client it wraps
//! - **Any Client**: implement [`PgClient`] for your driver; a SeaORM backend ships with the crate
//! - **Unchanged Results**: return values and errors pass through untouched
//! - **Error Reporting**: failed calls are tagged `error=true` with a structured error event
//! - **Explicit Tracer**: spans go to the `Dispatch` chosen when the connection is built
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pg_tracing::{instrument, ConnectionConfig, SeaOrmClient, TracedConnection};
//!
//! // Enable instrumentation once, with the current default subscriber
//! instrument(None);
//!
//! let config: ConnectionConfig = "host=localhost port=5432 dbname=postgres user=app".parse()?;
//! let conn = TracedConnection::<SeaOrmClient>::connect(&config).await?;
//!
//! conn.exec("SELECT * FROM users").await?;
//! conn.prepare("find_user", "SELECT * FROM users WHERE id = $1").await?;
//! conn.exec_prepared("find_user", &[1.into()]).await?;
//! ```
//!
//! ## Wrapping an Open Connection
//!
//! ```rust,ignore
//! use pg_tracing::{Instrumentation, SeaOrmClient, TracingExt};
//!
//! let db = sea_orm::Database::connect(&url).await?;
//! let conn = SeaOrmClient::from(db)
//!     .with_instrumentation(&Instrumentation::from_default(), &config);
//! ```
//!
//! ## Span Attributes
//!
//! | Attribute | Description |
//! |-----------|-------------|
//! | `otel.name` | `SELECT`, `INSERT`, ... from the statement, or `pg.query` / `pg.prepare` / `pg.exec_prepared` / `pg.initialize` |
//! | `component`, `db.type` | Always "pg" |
//! | `span.kind` | Always "client" |
//! | `db.instance` | Database name (when configured) |
//! | `db.user` | User name (when configured) |
//! | `peer.hostname`, `peer.port` | Server host and port (when configured) |
//! | `peer.address` | `pg://{host}:{port}` (when both are configured) |
//! | `db.statement` | SQL text, first 1024 characters |
//! | `prepared.statement.name` | Name given to `prepare` / `exec_prepared` |
//! | `prepared.statement.input` | First 21 characters of the `exec_prepared` parameter list |
//! | `error` | `true` when the call failed |
//! | `otel.status_code` | "OK" or "ERROR" |

mod client;
mod config;
mod connection;
mod conninfo;
mod database;
mod instrumentation;
mod parser;
mod tags;

#[cfg(test)]
mod testing;

pub use client::PgClient;
pub use config::TracingConfig;
pub use connection::{TracedConnection, TracingExt};
pub use conninfo::{ConfigError, ConnectionConfig};
pub use database::SeaOrmClient;
pub use instrumentation::{instrument, is_instrumented, Instrumentation, Operation};
pub use parser::{operation_name, truncate_chars};
pub use tags::{SharedTags, TagValue, Tags};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        instrument, ConnectionConfig, Instrumentation, PgClient, TracedConnection, TracingConfig,
        TracingExt,
    };
}
