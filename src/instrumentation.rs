//! Span creation, error reporting, and process-wide activation.

use std::error::Error;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use tracing::dispatcher::{self, Dispatch};
use tracing::instrument::WithSubscriber;
use tracing::{field, Instrument, Span};

use crate::client::PgClient;
use crate::config::TracingConfig;
use crate::connection::TracedConnection;
use crate::conninfo::ConnectionConfig;
use crate::tags::{SharedTags, TagValue, Tags};

static GLOBAL: Lazy<RwLock<Option<Instrumentation>>> = Lazy::new(|| RwLock::new(None));

/// The kinds of call that produce a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    Query,
    Prepare,
    ExecPrepared,
}

impl Operation {
    /// Span name used when no name can be derived from the statement.
    pub fn default_name(self) -> &'static str {
        match self {
            Operation::Initialize => "pg.initialize",
            Operation::Query => "pg.query",
            Operation::Prepare => "pg.prepare",
            Operation::ExecPrepared => "pg.exec_prepared",
        }
    }
}

// Every tag the crate can set has to be declared up front.
macro_rules! pg_span {
    ($name:literal) => {
        tracing::info_span!(
            $name,
            otel.name = field::Empty,
            otel.kind = "client",
            otel.status_code = field::Empty,
            component = field::Empty,
            "db.type" = field::Empty,
            span.kind = field::Empty,
            db.instance = field::Empty,
            db.user = field::Empty,
            db.statement = field::Empty,
            peer.hostname = field::Empty,
            peer.port = field::Empty,
            peer.address = field::Empty,
            prepared.statement.name = field::Empty,
            prepared.statement.input = field::Empty,
            error = field::Empty,
        )
    };
}

/// The tracer and settings a traced connection reports through.
///
/// Spans are created on the instrumentation's [`Dispatch`], so the choice of
/// tracer is made once, when the connection is built, rather than on every call.
///
/// # Example
///
/// ```rust,ignore
/// use pg_tracing::{ConnectionConfig, Instrumentation, SeaOrmClient, TracingConfig};
///
/// let instrumentation = Instrumentation::from_default()
///     .with_config(TracingConfig::default().with_max_statement_chars(256));
///
/// let config: ConnectionConfig = "host=localhost port=5432 dbname=postgres".parse()?;
/// let conn = instrumentation.connect::<SeaOrmClient>(&config).await?;
/// conn.exec("SELECT * FROM users").await?;
/// ```
#[derive(Debug, Clone)]
pub struct Instrumentation {
    dispatch: Dispatch,
    config: Arc<TracingConfig>,
}

impl Instrumentation {
    /// Report through `dispatch` with the default configuration.
    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            dispatch,
            config: Arc::new(TracingConfig::default()),
        }
    }

    /// Report through the dispatcher that is current at the time of the call.
    pub fn from_default() -> Self {
        Self::new(dispatcher::get_default(Dispatch::clone))
    }

    pub fn with_config(mut self, config: TracingConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// The instrumentation registered with [`instrument`], if any.
    pub fn global() -> Option<Self> {
        GLOBAL
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Open a connection, tracing the connect call as `pg.initialize`.
    ///
    /// An empty `config` opens the connection without any span, and every
    /// operation on it stays untraced.
    pub async fn connect<C: PgClient>(
        &self,
        config: &ConnectionConfig,
    ) -> Result<TracedConnection<C>, C::Error> {
        if config.is_empty() {
            tracing::debug!("connection opened without parameters; tracing disabled for it");
            return C::connect(config).await.map(TracedConnection::untraced);
        }

        let shared = SharedTags::from_config(config);
        let operation = Operation::Initialize;
        let inner = self
            .trace_call(
                operation,
                operation.default_name(),
                &shared.to_tags(),
                C::connect(config),
            )
            .await?;

        Ok(self.decorate(inner, shared))
    }

    /// Trace an already open connection.
    ///
    /// `config` should describe how `connection` was opened; it only feeds the
    /// connection's tags. No `pg.initialize` span is produced.
    pub fn wrap<C: PgClient>(&self, connection: C, config: &ConnectionConfig) -> TracedConnection<C> {
        if config.is_empty() {
            tracing::debug!("connection wrapped without parameters; tracing disabled for it");
            return TracedConnection::untraced(connection);
        }
        self.decorate(connection, SharedTags::from_config(config))
    }

    fn decorate<C: PgClient>(&self, connection: C, shared: SharedTags) -> TracedConnection<C> {
        if connection.is_traced() {
            tracing::debug!("connection is already traced; not wrapping it again");
            return TracedConnection::untraced(connection);
        }
        TracedConnection::traced(connection, self.clone(), shared)
    }

    /// Run `call` inside a span named `name`, tagged with `tags`.
    ///
    /// The span is the active span while `call` is polled. A failure is
    /// recorded on the span and returned unchanged. The span closes when this
    /// future completes or is dropped.
    pub(crate) async fn trace_call<T, E, F>(
        &self,
        operation: Operation,
        name: &str,
        tags: &Tags,
        call: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let span = self.start_span(operation, name, tags);

        let result = call
            .instrument(span.clone())
            .with_subscriber(self.dispatch.clone())
            .await;

        match &result {
            Ok(_) => {
                span.record("otel.status_code", "OK");
            }
            Err(err) => self.log_error(&span, err),
        }

        result
    }

    fn start_span(&self, operation: Operation, name: &str, tags: &Tags) -> Span {
        dispatcher::with_default(&self.dispatch, || {
            let span = match operation {
                Operation::Initialize => pg_span!("pg.initialize"),
                Operation::Query => pg_span!("pg.query"),
                Operation::Prepare => pg_span!("pg.prepare"),
                Operation::ExecPrepared => pg_span!("pg.exec_prepared"),
            };

            span.record("otel.name", name);
            for (key, value) in tags {
                match value {
                    TagValue::Str(s) => span.record(*key, s.as_str()),
                    TagValue::Int(i) => span.record(*key, *i),
                    TagValue::Bool(b) => span.record(*key, *b),
                };
            }

            span
        })
    }

    fn log_error<E: Error + 'static>(&self, span: &Span, err: &E) {
        span.record("error", true);
        span.record("otel.status_code", "ERROR");

        let kind = std::any::type_name::<E>();
        let stack = error_stack(err);

        dispatcher::with_default(&self.dispatch, || {
            tracing::error!(
                parent: span,
                event = "error",
                error.kind = kind,
                error.object = ?err,
                error.stack = %stack,
                "{err}"
            );
        });
    }
}

/// The error followed by its sources, one per line.
fn error_stack(err: &(dyn Error + 'static)) -> String {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(cause.to_string());
        source = cause.source();
    }
    lines.join("\n")
}

/// Enable tracing for connections opened through [`TracedConnection::connect`]
/// and [`TracingExt::with_tracing`](crate::TracingExt::with_tracing).
///
/// Without a `dispatch`, the dispatcher current at the time of the call is used.
/// Every call re-resolves the tracer, so a later call replaces the registered
/// one for connections opened afterwards; nothing is ever wrapped twice.
///
/// Returns `true` for the call that enabled instrumentation.
pub fn instrument(dispatch: Option<Dispatch>) -> bool {
    let dispatch = dispatch.unwrap_or_else(|| dispatcher::get_default(Dispatch::clone));
    let enabled = {
        let mut global = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
        match global.as_mut() {
            Some(existing) => {
                existing.dispatch = dispatch;
                false
            }
            None => {
                *global = Some(Instrumentation::new(dispatch));
                true
            }
        }
    };

    if enabled {
        tracing::info!("pg instrumentation enabled");
    }
    enabled
}

/// Whether [`instrument`] has been called.
pub fn is_instrumented() -> bool {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}
