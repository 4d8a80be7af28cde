//! # Remote Gateway Port
//!
//! The small set of backend capabilities the store depends on.

use super::filter::Filter;
use crate::errors::GatewayError;
use async_trait::async_trait;
use compliance_types::{Row, RowChange};
use serde_json::Value;
use tokio::sync::mpsc;

/// Operations exposed by the gateway, used for failure injection and
/// call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    /// Table read.
    Select,
    /// Row insert.
    Insert,
    /// Row update.
    Update,
    /// Row delete.
    Delete,
    /// Serverless function call.
    Invoke,
    /// Change-feed subscription.
    Subscribe,
}

/// Hosted backend - outbound port.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Read all rows of `table` matching `filter`.
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, GatewayError>;

    /// Insert a row and return it as stored (with generated columns).
    async fn insert(&self, table: &str, row: Row) -> Result<Row, GatewayError>;

    /// Apply `patch` to every row matching `filter`; return the updated rows.
    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: Row,
    ) -> Result<Vec<Row>, GatewayError>;

    /// Delete every row matching `filter`; return the number removed.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<usize, GatewayError>;

    /// Invoke a serverless function with a JSON body.
    async fn invoke(&self, function: &str, body: Value) -> Result<Value, GatewayError>;

    /// Open a row-change feed for `table` rows matching `filter`.
    async fn subscribe(
        &self,
        channel: &str,
        table: &str,
        filter: &Filter,
    ) -> Result<ChangeFeed, GatewayError>;
}

/// Receiving end of a real-time row-change subscription.
///
/// Dropping the feed unsubscribes.
#[derive(Debug)]
pub struct ChangeFeed {
    channel: String,
    receiver: mpsc::Receiver<RowChange>,
}

impl ChangeFeed {
    /// Wrap a receiver delivered by a gateway implementation.
    pub fn new(channel: impl Into<String>, receiver: mpsc::Receiver<RowChange>) -> Self {
        Self {
            channel: channel.into(),
            receiver,
        }
    }

    /// Channel name given at subscription time.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next change. `None` once the gateway closes the feed.
    pub async fn recv(&mut self) -> Option<RowChange> {
        self.receiver.recv().await
    }

    /// Take a change if one is buffered.
    pub fn try_recv(&mut self) -> Option<RowChange> {
        self.receiver.try_recv().ok()
    }
}
