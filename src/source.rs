use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::{event::RawEvent, monitor::cursor::Cursor};

/// Failures surfaced by an [`EventSource`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The subscription could not be established.
    #[error("connection error: {0}")]
    Connection(String),
    /// A live subscription hiccupped; the handle is discarded and reopened.
    #[error("transient error: {0}")]
    Transient(String),
    /// The provider no longer knows the subscription.
    #[error("fatal subscription error: {0}")]
    Fatal(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl SourceError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Fatal(_))
    }
}

/// Remote event log, reachable either by polling a filter or by draining a
/// push subscription.
///
/// Handles are owned by the caller and passed back into [`EventSource::poll`];
/// the source itself keeps no per-subscription state.
#[async_trait]
pub trait EventSource: Send + Sync {
    type Handle: Send;

    /// Current chain head, used to seed the cursor.
    async fn latest_block(&self) -> Result<u64, SourceError>;

    /// Start a subscription covering everything from `cursor.from_block()` on.
    async fn open(&self, cursor: &Cursor) -> Result<Self::Handle, SourceError>;

    /// Events that appeared since the previous poll on `handle`, in source order.
    async fn poll(
        &self,
        handle: &mut Self::Handle,
    ) -> Result<Vec<RawEvent>, SourceError>;

    /// Release provider-side resources held by a discarded handle.
    async fn close(&self, _handle: Self::Handle) {}
}
