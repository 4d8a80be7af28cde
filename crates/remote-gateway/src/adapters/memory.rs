//! # In-Memory Gateway
//!
//! A process-local stand-in for the hosted backend: tables, functions and
//! change feeds behave like the real thing, and failures can be injected.

use crate::errors::GatewayError;
use crate::ports::{ChangeFeed, Filter, GatewayOp, RemoteGateway};
use async_trait::async_trait;
use chrono::Utc;
use compliance_types::{Row, RowChange};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Buffer size of each change feed.
pub const FEED_CAPACITY: usize = 256;

/// Handler answering a serverless function invocation.
pub type FunctionHandler = Arc<dyn Fn(Value) -> Result<Value, GatewayError> + Send + Sync>;

struct FeedSender {
    channel: String,
    table: String,
    filter: Filter,
    sender: mpsc::Sender<RowChange>,
}

/// In-memory backend.
#[derive(Default)]
pub struct InMemoryGateway {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    functions: RwLock<HashMap<String, FunctionHandler>>,
    invocations: Mutex<Vec<(String, Value)>>,
    feeds: Mutex<Vec<FeedSender>>,
    injected: Mutex<HashMap<GatewayOp, VecDeque<GatewayError>>>,
    delays: Mutex<HashMap<GatewayOp, VecDeque<Duration>>>,
    calls: Mutex<HashMap<GatewayOp, usize>>,
    offline: RwLock<bool>,
}

impl InMemoryGateway {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of `table` without emitting change events.
    pub fn seed(&self, table: &str, rows: Vec<Row>) {
        self.tables.write().insert(table.to_string(), rows);
    }

    /// Snapshot of the rows currently in `table`.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    /// Register a serverless function handler.
    pub fn register_function<F>(&self, name: &str, handler: F)
    where
        F: Fn(Value) -> Result<Value, GatewayError> + Send + Sync + 'static,
    {
        self.functions
            .write()
            .insert(name.to_string(), Arc::new(handler));
    }

    /// Every function invocation received so far, in order.
    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().clone()
    }

    /// Make the next call of `op` fail with `error`. Calls queue up.
    pub fn fail_next(&self, op: GatewayOp, error: GatewayError) {
        self.injected.lock().entry(op).or_default().push_back(error);
    }

    /// Hold the next call of `op` for `delay` before it completes. Calls
    /// queue up.
    ///
    /// The call's outcome, including any failure queued with `fail_next`,
    /// is fixed when it starts, so calls made during the delay do not
    /// take its place.
    pub fn delay_next(&self, op: GatewayOp, delay: Duration) {
        self.delays.lock().entry(op).or_default().push_back(delay);
    }

    /// Toggle connectivity. While offline every call fails with
    /// `GatewayError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    /// Number of calls made for `op`, including failed ones.
    pub fn call_count(&self, op: GatewayOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Number of open change feeds.
    pub fn feed_count(&self) -> usize {
        let mut feeds = self.feeds.lock();
        feeds.retain(|f| !f.sender.is_closed());
        feeds.len()
    }

    /// Push a change to matching feeds without touching the tables.
    ///
    /// Simulates a write made by another client whose row we do not hold.
    pub fn emit(&self, change: RowChange) -> usize {
        let mut delivered = 0;
        let mut feeds = self.feeds.lock();
        feeds.retain(|f| !f.sender.is_closed());

        for feed in feeds.iter() {
            if feed.table != change.table {
                continue;
            }
            let Some(row) = change.subject() else {
                continue;
            };
            if !feed.filter.matches(row) {
                continue;
            }
            match feed.sender.try_send(change.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(channel = %feed.channel, error = %e, "Change feed full, event dropped"),
            }
        }
        delivered
    }

    async fn enter(&self, op: GatewayOp) -> Result<(), GatewayError> {
        let outcome = self.admit(op);
        let delay = self.delays.lock().get_mut(&op).and_then(VecDeque::pop_front);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    fn admit(&self, op: GatewayOp) -> Result<(), GatewayError> {
        *self.calls.lock().entry(op).or_insert(0) += 1;

        if *self.offline.read() {
            return Err(GatewayError::Unavailable("gateway offline".to_string()));
        }
        if let Some(error) = self.injected.lock().get_mut(&op).and_then(VecDeque::pop_front) {
            debug!(?op, %error, "Injected gateway failure");
            return Err(error);
        }
        Ok(())
    }

    fn now_value() -> Value {
        serde_json::to_value(Utc::now()).unwrap_or(Value::Null)
    }
}

#[async_trait]
impl RemoteGateway for InMemoryGateway {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, GatewayError> {
        self.enter(GatewayOp::Select).await?;
        let tables = self.tables.read();
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, GatewayError> {
        self.enter(GatewayOp::Insert).await?;

        if !row.contains_key("id") {
            row.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
        }
        let now = Self::now_value();
        row.entry("created_at").or_insert_with(|| now.clone());
        row.entry("updated_at").or_insert(now);

        {
            let mut tables = self.tables.write();
            let rows = tables.entry(table.to_string()).or_default();
            if rows.iter().any(|r| r.get("id") == row.get("id")) {
                return Err(GatewayError::Validation(format!(
                    "duplicate key in {table}"
                )));
            }
            rows.push(row.clone());
        }

        self.emit(RowChange::insert(table, row.clone()));
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: Row,
    ) -> Result<Vec<Row>, GatewayError> {
        self.enter(GatewayOp::Update).await?;

        let mut changes = Vec::new();
        {
            let mut tables = self.tables.write();
            let rows = tables
                .get_mut(table)
                .ok_or_else(|| GatewayError::NotFound(table.to_string()))?;

            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                let old = row.clone();
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                row.insert("updated_at".into(), Self::now_value());
                changes.push((old, row.clone()));
            }
        }

        let updated: Vec<Row> = changes.iter().map(|(_, new)| new.clone()).collect();
        for (old, new) in changes {
            self.emit(RowChange::update(table, Some(old), new));
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<usize, GatewayError> {
        self.enter(GatewayOp::Delete).await?;

        let removed: Vec<Row> = {
            let mut tables = self.tables.write();
            let Some(rows) = tables.get_mut(table) else {
                return Ok(0);
            };
            let (removed, kept): (Vec<Row>, Vec<Row>) =
                rows.drain(..).partition(|r| filter.matches(r));
            *rows = kept;
            removed
        };

        let count = removed.len();
        for old in removed {
            self.emit(RowChange::delete(table, old));
        }
        Ok(count)
    }

    async fn invoke(&self, function: &str, body: Value) -> Result<Value, GatewayError> {
        self.enter(GatewayOp::Invoke).await?;
        self.invocations
            .lock()
            .push((function.to_string(), body.clone()));

        let handler = self
            .functions
            .read()
            .get(function)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("function {function}")))?;
        handler(body)
    }

    async fn subscribe(
        &self,
        channel: &str,
        table: &str,
        filter: &Filter,
    ) -> Result<ChangeFeed, GatewayError> {
        self.enter(GatewayOp::Subscribe).await?;

        let (sender, receiver) = mpsc::channel(FEED_CAPACITY);
        self.feeds.lock().push(FeedSender {
            channel: channel.to_string(),
            table: table.to_string(),
            filter: filter.clone(),
            sender,
        });
        debug!(channel, table, filter = %filter, "Change feed opened");
        Ok(ChangeFeed::new(channel, receiver))
    }
}
