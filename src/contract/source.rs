//! [`EventSource`] implementations over an Ethereum JSON-RPC provider.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    pubsub::Subscription,
    rpc::types::{Filter, Log},
    transports::{RpcError, TransportErrorKind},
};
use async_trait::async_trait;
use tokio::sync::broadcast::error::TryRecvError;

use super::providers::{ChainProvider, ws_public};
use crate::{
    event::{RawEvent, decode},
    monitor::cursor::Cursor,
    source::{EventSource, SourceError},
};

/// Filter matching every `PanelEventAdded` shape on `contract`.
pub fn panel_event_filter(contract: Address) -> Filter {
    Filter::new()
        .address(contract)
        .event_signature(decode::event_signatures())
}

/// Decode a batch, dropping logs that are not panel events.
pub fn decode_logs(logs: Vec<Log>, print_raw: bool) -> Vec<RawEvent> {
    logs.into_iter()
        .filter_map(|log| {
            if print_raw {
                tracing::info!(?log, "raw log");
            }
            match decode::raw_event_from_log(&log) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        tx_hash = ?log.transaction_hash,
                        "skipping undecodable log"
                    );
                    None
                }
            }
        })
        .collect()
}

fn is_filter_gone(err: &RpcError<TransportErrorKind>) -> bool {
    match err {
        RpcError::ErrorResp(payload) => {
            let msg = payload.message.to_ascii_lowercase();
            msg.contains("filter not found") || msg.contains("filter does not exist")
        }
        _ => false,
    }
}

fn classify_poll_error(err: RpcError<TransportErrorKind>) -> SourceError {
    if is_filter_gone(&err) {
        SourceError::Fatal(err.to_string())
    } else {
        SourceError::Transient(err.to_string())
    }
}

/// `None` once the subscription buffer is drained.
fn classify_recv_error(err: TryRecvError) -> Option<SourceError> {
    match err {
        TryRecvError::Empty => None,
        TryRecvError::Lagged(skipped) => Some(SourceError::Transient(format!(
            "subscription lagged, {skipped} logs skipped"
        ))),
        TryRecvError::Closed => Some(SourceError::Fatal(
            "subscription closed by provider".into(),
        )),
    }
}

/// Polls a server-side log filter (eth_newFilter / eth_getFilterChanges).
pub struct FilterSource<P> {
    provider: P,
    filter: Filter,
    print_raw: bool,
}

pub struct FilterHandle {
    id: U256,
    // logs in [cursor, head] fetched at open, returned by the first poll
    backlog: Vec<Log>,
}

impl<P> FilterSource<P> {
    pub fn new(provider: P, filter: Filter) -> Self {
        Self {
            provider,
            filter,
            print_raw: false,
        }
    }

    pub fn print_raw_logs(mut self, enabled: bool) -> Self {
        self.print_raw = enabled;
        self
    }
}

#[async_trait]
impl<P> EventSource for FilterSource<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    type Handle = FilterHandle;

    async fn latest_block(&self) -> Result<u64, SourceError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))
    }

    async fn open(&self, cursor: &Cursor) -> Result<FilterHandle, SourceError> {
        let filter = self.filter.clone().from_block(cursor.from_block());
        let id = self
            .provider
            .new_filter(&filter)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        // getFilterChanges only reports logs newer than the filter itself
        let backlog = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        tracing::debug!(%id, backlog = backlog.len(), "log filter installed");
        Ok(FilterHandle { id, backlog })
    }

    async fn poll(
        &self,
        handle: &mut FilterHandle,
    ) -> Result<Vec<RawEvent>, SourceError> {
        let mut logs = std::mem::take(&mut handle.backlog);
        let changes: Vec<Log> = self
            .provider
            .get_filter_changes(handle.id)
            .await
            .map_err(classify_poll_error)?;
        logs.extend(changes);
        Ok(decode_logs(logs, self.print_raw))
    }

    async fn close(&self, handle: FilterHandle) {
        if let Err(e) = self.provider.uninstall_filter(handle.id).await {
            tracing::debug!(id = %handle.id, error = %e, "uninstall_filter failed");
        }
    }
}

/// Drains an eth_subscribe log subscription. Each `open` dials a fresh
/// WebSocket connection; dropping the handle drops the connection.
pub struct SubscriptionSource {
    ws_url: String,
    head_provider: ChainProvider,
    filter: Filter,
    print_raw: bool,
}

pub struct SubscriptionHandle {
    // keeps the websocket alive for as long as the subscription is in use
    _provider: ChainProvider,
    subscription: Subscription<Log>,
    backlog: Vec<Log>,
}

impl SubscriptionSource {
    pub fn new(
        ws_url: impl Into<String>,
        head_provider: ChainProvider,
        filter: Filter,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            head_provider,
            filter,
            print_raw: false,
        }
    }

    pub fn print_raw_logs(mut self, enabled: bool) -> Self {
        self.print_raw = enabled;
        self
    }
}

#[async_trait]
impl EventSource for SubscriptionSource {
    type Handle = SubscriptionHandle;

    async fn latest_block(&self) -> Result<u64, SourceError> {
        self.head_provider
            .get_block_number()
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))
    }

    async fn open(
        &self,
        cursor: &Cursor,
    ) -> Result<SubscriptionHandle, SourceError> {
        let provider = ws_public(&self.ws_url)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        let subscription = provider
            .subscribe_logs(&self.filter)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        // push delivery starts at the current head; backfill what the cursor still owes
        let backfill = self.filter.clone().from_block(cursor.from_block());
        let backlog = provider
            .get_logs(&backfill)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        tracing::debug!(backlog = backlog.len(), "log subscription established");
        Ok(SubscriptionHandle {
            _provider: provider,
            subscription,
            backlog,
        })
    }

    async fn poll(
        &self,
        handle: &mut SubscriptionHandle,
    ) -> Result<Vec<RawEvent>, SourceError> {
        let mut logs = std::mem::take(&mut handle.backlog);
        loop {
            match handle.subscription.try_recv() {
                Ok(log) => logs.push(log),
                Err(e) => match classify_recv_error(e) {
                    None => break,
                    Some(err) => return Err(err),
                },
            }
        }
        Ok(decode_logs(logs, self.print_raw))
    }
}
