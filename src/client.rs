//! The PostgreSQL client interface the tracing wrapper decorates.

use std::fmt;

use async_trait::async_trait;

use crate::conninfo::ConnectionConfig;

/// A PostgreSQL connection.
///
/// Implement this for the client you use; [`TracedConnection`](crate::TracedConnection)
/// implements it too, so code written against `PgClient` accepts either.
#[async_trait]
pub trait PgClient: Send + Sync + Sized {
    /// Result set returned by queries.
    type Rows: Send;
    /// Bound parameter value.
    type Param: fmt::Debug + Send + Sync;
    /// Error returned by every operation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a connection.
    async fn connect(config: &ConnectionConfig) -> Result<Self, Self::Error>;

    /// Run `sql` without waiting on the blocking driver path.
    ///
    /// Clients without a distinct asynchronous path use [`PgClient::exec`].
    async fn async_exec(&self, sql: &str) -> Result<Self::Rows, Self::Error> {
        self.exec(sql).await
    }

    /// Run `sql`.
    async fn exec(&self, sql: &str) -> Result<Self::Rows, Self::Error>;

    /// Run `sql` with positional parameters bound to `$1`, `$2`, ...
    async fn exec_params(
        &self,
        sql: &str,
        params: &[Self::Param],
    ) -> Result<Self::Rows, Self::Error>;

    /// Prepare `sql` as the named statement `name`.
    async fn prepare(&self, name: &str, sql: &str) -> Result<Self::Rows, Self::Error>;

    /// Execute the prepared statement `name`.
    async fn exec_prepared(
        &self,
        name: &str,
        params: &[Self::Param],
    ) -> Result<Self::Rows, Self::Error>;

    /// Whether calls on this connection already produce spans.
    fn is_traced(&self) -> bool {
        false
    }
}
