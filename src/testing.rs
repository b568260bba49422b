//! Test doubles: a span-recording subscriber and a scriptable client.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crate::client::PgClient;
use crate::conninfo::ConnectionConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Debug(String),
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub level: Level,
    pub fields: BTreeMap<String, FieldValue>,
}

impl RecordedEvent {
    pub fn message(&self) -> Option<&str> {
        match self.fields.get("message") {
            Some(FieldValue::Debug(s)) | Some(FieldValue::Str(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedSpan {
    /// Unique per collector, unlike span ids which get reused.
    pub seq: u64,
    pub name: &'static str,
    pub parent: Option<u64>,
    pub fields: BTreeMap<String, FieldValue>,
    pub events: Vec<RecordedEvent>,
}

impl RecordedSpan {
    /// `otel.name` when set, the callsite name otherwise.
    pub fn operation_name(&self) -> &str {
        self.str_tag("otel.name").unwrap_or(self.name)
    }

    pub fn tag(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn str_tag(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(FieldValue::Str(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    next_seq: u64,
    open: HashMap<u64, RecordedSpan>,
    finished: Vec<RecordedSpan>,
}

/// Records every span and event reported through [`SpanCollector::dispatch`].
#[derive(Clone)]
pub struct SpanCollector {
    state: Arc<Mutex<State>>,
    dispatch: Dispatch,
}

impl Default for SpanCollector {
    fn default() -> Self {
        let state = Arc::new(Mutex::new(State::default()));
        let layer = CollectorLayer {
            state: state.clone(),
        };
        let dispatch = Dispatch::new(tracing_subscriber::registry().with(layer));
        Self { state, dispatch }
    }
}

impl SpanCollector {
    pub fn dispatch(&self) -> Dispatch {
        self.dispatch.clone()
    }

    /// Closed spans, in closing order.
    pub fn finished(&self) -> Vec<RecordedSpan> {
        lock(&self.state).finished.clone()
    }

    pub fn finished_named(&self, name: &str) -> Vec<RecordedSpan> {
        lock(&self.state)
            .finished
            .iter()
            .filter(|span| span.name == name)
            .cloned()
            .collect()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).open.len()
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct CollectorLayer {
    state: Arc<Mutex<State>>,
}

impl<S: Subscriber> Layer<S> for CollectorLayer {
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = BTreeMap::new();
        attrs.record(&mut FieldVisitor(&mut fields));

        let parent_id = if attrs.is_contextual() {
            ctx.current_span().id().cloned()
        } else {
            attrs.parent().cloned()
        };

        let mut state = lock(&self.state);
        let parent = parent_id.and_then(|p| state.open.get(&p.into_u64()).map(|s| s.seq));
        state.next_seq += 1;
        let seq = state.next_seq;
        state.open.insert(
            id.into_u64(),
            RecordedSpan {
                seq,
                name: attrs.metadata().name(),
                parent,
                fields,
                events: Vec::new(),
            },
        );
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        if let Some(span) = lock(&self.state).open.get_mut(&id.into_u64()) {
            values.record(&mut FieldVisitor(&mut span.fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let parent_id = if event.is_contextual() {
            ctx.current_span().id().cloned()
        } else {
            event.parent().cloned()
        };

        let mut fields = BTreeMap::new();
        event.record(&mut FieldVisitor(&mut fields));
        let recorded = RecordedEvent {
            level: *event.metadata().level(),
            fields,
        };

        if let Some(id) = parent_id {
            if let Some(span) = lock(&self.state).open.get_mut(&id.into_u64()) {
                span.events.push(recorded);
            }
        }
    }

    fn on_close(&self, id: Id, _ctx: Context<'_, S>) {
        let mut state = lock(&self.state);
        if let Some(span) = state.open.remove(&id.into_u64()) {
            state.finished.push(span);
        }
    }
}

struct FieldVisitor<'a>(&'a mut BTreeMap<String, FieldValue>);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0
            .insert(field.name().to_string(), FieldValue::Str(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), FieldValue::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0
            .insert(field.name().to_string(), FieldValue::Int(value as i64));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), FieldValue::Bool(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_string(), FieldValue::Debug(format!("{value:?}")));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(ConnectionConfig),
    AsyncExec(String),
    Exec(String),
    ExecParams(String, Vec<String>),
    Prepare(String, String),
    ExecPrepared(String, Vec<String>),
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct FakeError {
    message: String,
    #[source]
    source: Option<std::io::Error>,
}

impl FakeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: &str) -> Self {
        Self {
            message: message.into(),
            source: Some(std::io::Error::other(source.to_string())),
        }
    }
}

/// A client that records its calls and answers with the SQL it was given.
///
/// Connecting with the option `fail=<message>` fails; [`FakeClient::fail_with`]
/// makes every later operation fail.
#[derive(Debug, Clone, Default)]
pub struct FakeClient {
    calls: Arc<Mutex<Vec<Call>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl FakeClient {
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn fail_with(&self, message: &str) {
        *self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(message.to_string());
    }

    fn record(&self, call: Call, answer: &str) -> Result<Vec<String>, FakeError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);

        let failure = self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match failure {
            Some(message) => Err(FakeError::new(message)),
            None => Ok(vec![answer.to_string()]),
        }
    }
}

#[async_trait]
impl PgClient for FakeClient {
    type Rows = Vec<String>;
    type Param = String;
    type Error = FakeError;

    async fn connect(config: &ConnectionConfig) -> Result<Self, Self::Error> {
        tracing::info_span!("fake.handshake").in_scope(|| {});

        if let Some(message) = config.options.get("fail") {
            return Err(FakeError::new(message.as_str()));
        }

        let client = Self::default();
        client
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Call::Connect(config.clone()));
        Ok(client)
    }

    async fn async_exec(&self, sql: &str) -> Result<Self::Rows, Self::Error> {
        self.record(Call::AsyncExec(sql.to_string()), sql)
    }

    async fn exec(&self, sql: &str) -> Result<Self::Rows, Self::Error> {
        self.record(Call::Exec(sql.to_string()), sql)
    }

    async fn exec_params(
        &self,
        sql: &str,
        params: &[Self::Param],
    ) -> Result<Self::Rows, Self::Error> {
        self.record(Call::ExecParams(sql.to_string(), params.to_vec()), sql)
    }

    async fn prepare(&self, name: &str, sql: &str) -> Result<Self::Rows, Self::Error> {
        self.record(Call::Prepare(name.to_string(), sql.to_string()), sql)
    }

    async fn exec_prepared(
        &self,
        name: &str,
        params: &[Self::Param],
    ) -> Result<Self::Rows, Self::Error> {
        self.record(Call::ExecPrepared(name.to_string(), params.to_vec()), name)
    }
}
