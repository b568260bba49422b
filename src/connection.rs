//! Traced database connection wrapper.

use std::fmt;

use async_trait::async_trait;

use crate::client::PgClient;
use crate::conninfo::ConnectionConfig;
use crate::instrumentation::{Instrumentation, Operation};
use crate::parser::{operation_name, prepared_input, truncate_chars};
use crate::tags::{SharedTags, Tags};

/// A traced wrapper around a [`PgClient`] connection.
///
/// The wrapper exposes the client's operations and implements [`PgClient`]
/// itself, making it a drop-in replacement for the connection it wraps.
/// Every operation runs inside a span carrying the connection's tags; the
/// wrapped operation's result, success or error, is returned unchanged.
///
/// # Span Nesting
///
/// Spans created by `TracedConnection` become children of the current span,
/// and any span the client creates while a call is running nests under the
/// call's span.
///
/// # Untraced Connections
///
/// A connection opened without parameters, or while instrumentation is
/// disabled, is wrapped untraced: calls go straight to the client for the
/// connection's whole lifetime.
///
/// # Example
///
/// ```rust,ignore
/// use pg_tracing::{instrument, ConnectionConfig, SeaOrmClient, TracedConnection};
///
/// instrument(None);
///
/// let config: ConnectionConfig = "postgres://test_user@localhost:5432/postgres".parse()?;
/// let conn = TracedConnection::<SeaOrmClient>::connect(&config).await?;
///
/// // Span "SELECT" with db.statement = "SELECT * FROM users"
/// conn.exec("SELECT * FROM users").await?;
/// ```
#[derive(Debug, Clone)]
pub struct TracedConnection<C> {
    inner: C,
    trace: Option<Trace>,
}

#[derive(Debug, Clone)]
struct Trace {
    instrumentation: Instrumentation,
    shared: SharedTags,
}

impl Trace {
    /// Tags and span name for an operation that carries SQL text.
    fn statement_tags(&self, sql: &str, operation: Operation) -> (String, Tags) {
        let config = self.instrumentation.config();
        let statement = truncate_chars(sql, config.max_statement_chars);

        let mut tags = self.shared.to_tags();
        if config.log_statements {
            tags.insert("db.statement", statement.into());
        }

        (operation_name(statement, operation.default_name()), tags)
    }
}

impl<C: PgClient> TracedConnection<C> {
    /// Open a connection through the instrumentation enabled with
    /// [`instrument`](crate::instrument).
    ///
    /// When instrumentation is not enabled the connection is opened untraced.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, C::Error> {
        match Instrumentation::global() {
            Some(instrumentation) => instrumentation.connect(config).await,
            None => C::connect(config).await.map(Self::untraced),
        }
    }

    pub(crate) fn traced(inner: C, instrumentation: Instrumentation, shared: SharedTags) -> Self {
        Self {
            inner,
            trace: Some(Trace {
                instrumentation,
                shared,
            }),
        }
    }

    /// Wrap `inner` without tracing any of its calls.
    pub fn untraced(inner: C) -> Self {
        Self { inner, trace: None }
    }

    /// Get a reference to the underlying connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Consume the wrapper and return the underlying connection.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// The connection-level tags, or `None` for an untraced connection.
    pub fn shared_tags(&self) -> Option<&SharedTags> {
        self.trace.as_ref().map(|trace| &trace.shared)
    }

    /// Run `sql` through the client's asynchronous path.
    ///
    /// `sql` is anything printable; its display string is what the client runs.
    pub async fn async_exec<S>(&self, sql: &S) -> Result<C::Rows, C::Error>
    where
        S: fmt::Display + ?Sized,
    {
        let sql = sql.to_string();
        let Some(trace) = &self.trace else {
            return self.inner.async_exec(&sql).await;
        };

        let operation = Operation::Query;
        let (name, tags) = trace.statement_tags(&sql, operation);
        trace
            .instrumentation
            .trace_call(operation, &name, &tags, self.inner.async_exec(&sql))
            .await
    }

    /// Run `sql`.
    pub async fn exec<S>(&self, sql: &S) -> Result<C::Rows, C::Error>
    where
        S: fmt::Display + ?Sized,
    {
        let sql = sql.to_string();
        let Some(trace) = &self.trace else {
            return self.inner.exec(&sql).await;
        };

        let operation = Operation::Query;
        let (name, tags) = trace.statement_tags(&sql, operation);
        trace
            .instrumentation
            .trace_call(operation, &name, &tags, self.inner.exec(&sql))
            .await
    }

    /// Run `sql` with bound parameters. Parameters are not recorded.
    pub async fn exec_params<S>(&self, sql: &S, params: &[C::Param]) -> Result<C::Rows, C::Error>
    where
        S: fmt::Display + ?Sized,
    {
        let sql = sql.to_string();
        let Some(trace) = &self.trace else {
            return self.inner.exec_params(&sql, params).await;
        };

        let operation = Operation::Query;
        let (name, tags) = trace.statement_tags(&sql, operation);
        trace
            .instrumentation
            .trace_call(operation, &name, &tags, self.inner.exec_params(&sql, params))
            .await
    }

    /// Prepare `sql` as the statement `name`.
    pub async fn prepare<S>(&self, name: &str, sql: &S) -> Result<C::Rows, C::Error>
    where
        S: fmt::Display + ?Sized,
    {
        let sql = sql.to_string();
        let Some(trace) = &self.trace else {
            return self.inner.prepare(name, &sql).await;
        };

        let operation = Operation::Prepare;
        let (span_name, mut tags) = trace.statement_tags(&sql, operation);
        tags.insert("prepared.statement.name", name.into());
        trace
            .instrumentation
            .trace_call(operation, &span_name, &tags, self.inner.prepare(name, &sql))
            .await
    }

    /// Execute the prepared statement `name`.
    ///
    /// The span is always named `pg.exec_prepared`. `prepared.statement.input`
    /// holds the leading characters of the parameter list's `Debug` rendering.
    pub async fn exec_prepared(&self, name: &str, params: &[C::Param]) -> Result<C::Rows, C::Error> {
        let Some(trace) = &self.trace else {
            return self.inner.exec_prepared(name, params).await;
        };

        let operation = Operation::ExecPrepared;
        let input_chars = trace.instrumentation.config().prepared_input_chars;
        let mut tags = trace.shared.to_tags();
        tags.insert("prepared.statement.name", name.into());
        tags.insert("prepared.statement.input", prepared_input(params, input_chars).into());
        trace
            .instrumentation
            .trace_call(
                operation,
                operation.default_name(),
                &tags,
                self.inner.exec_prepared(name, params),
            )
            .await
    }
}

#[async_trait]
impl<C: PgClient> PgClient for TracedConnection<C> {
    type Rows = C::Rows;
    type Param = C::Param;
    type Error = C::Error;

    async fn connect(config: &ConnectionConfig) -> Result<Self, Self::Error> {
        Self::connect(config).await
    }

    async fn async_exec(&self, sql: &str) -> Result<Self::Rows, Self::Error> {
        Self::async_exec(self, sql).await
    }

    async fn exec(&self, sql: &str) -> Result<Self::Rows, Self::Error> {
        Self::exec(self, sql).await
    }

    async fn exec_params(
        &self,
        sql: &str,
        params: &[Self::Param],
    ) -> Result<Self::Rows, Self::Error> {
        Self::exec_params(self, sql, params).await
    }

    async fn prepare(&self, name: &str, sql: &str) -> Result<Self::Rows, Self::Error> {
        Self::prepare(self, name, sql).await
    }

    async fn exec_prepared(
        &self,
        name: &str,
        params: &[Self::Param],
    ) -> Result<Self::Rows, Self::Error> {
        Self::exec_prepared(self, name, params).await
    }

    fn is_traced(&self) -> bool {
        self.trace.is_some() || self.inner.is_traced()
    }
}

/// Extension trait for easy wrapping of open connections.
pub trait TracingExt: PgClient {
    /// Wrap this connection using the instrumentation enabled with
    /// [`instrument`](crate::instrument); untraced when it is not enabled.
    fn with_tracing(self, config: &ConnectionConfig) -> TracedConnection<Self>;

    /// Wrap this connection using `instrumentation`.
    fn with_instrumentation(
        self,
        instrumentation: &Instrumentation,
        config: &ConnectionConfig,
    ) -> TracedConnection<Self>;
}

impl<C: PgClient> TracingExt for C {
    fn with_tracing(self, config: &ConnectionConfig) -> TracedConnection<Self> {
        match Instrumentation::global() {
            Some(instrumentation) => instrumentation.wrap(self, config),
            None => TracedConnection::untraced(self),
        }
    }

    fn with_instrumentation(
        self,
        instrumentation: &Instrumentation,
        config: &ConnectionConfig,
    ) -> TracedConnection<Self> {
        instrumentation.wrap(self, config)
    }
}
