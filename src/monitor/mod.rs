//! Long-running loop that follows the panel event log and hands each new
//! event to the anchoring pipeline.
//!
//! ```text
//! CONNECTING --open ok--> LISTENING --poll ok--> LISTENING
//!     |                      |
//!  open err              poll err / timeout
//!     v                      v
//!  BACKOFF <-----------------+
//!     |
//!  delay elapsed --> CONNECTING
//! ```
//!
//! Any state moves to `STOPPED` once the cancellation token fires.

pub mod backoff;
pub mod cursor;

use std::{future::Future, time::Duration};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    anchor::{AnchorSink, Dispatcher},
    config::MonitorConfig,
    event::normalize,
    source::{EventSource, SourceError},
};
use backoff::{BackoffPolicy, Sleeper, TokioSleeper};
use cursor::{CheckpointStore, Cursor, NoCheckpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorState {
    Connecting,
    Listening,
    Backoff,
    Stopped,
}

/// Snapshot of the loop published after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub cursor_block: Option<u64>,
    pub dispatched: u64,
    pub failed_dispatches: u64,
    pub reconnects: u64,
    pub last_error: Option<String>,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self {
            state: MonitorState::Connecting,
            cursor_block: None,
            dispatched: 0,
            failed_dispatches: 0,
            reconnects: 0,
            last_error: None,
        }
    }
}

/// Final tally returned when the loop stops.
pub type MonitorReport = MonitorStatus;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub start_margin: u64,
    pub poll_interval: Duration,
    pub backoff: BackoffPolicy,
    pub rpc_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        MonitorSettings::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(cfg: &MonitorConfig) -> Self {
        Self {
            start_margin: cfg.start_margin,
            poll_interval: cfg.poll_interval,
            backoff: cfg.backoff,
            rpc_timeout: cfg.rpc_timeout,
        }
    }
}

pub struct Monitor<S, A, Z = TokioSleeper>
where
    S: EventSource,
{
    source: S,
    dispatcher: Dispatcher<A>,
    sleeper: Z,
    settings: MonitorSettings,
    checkpoint: Box<dyn CheckpointStore>,
    cancel: CancellationToken,
    cursor: Option<Cursor>,
    status: MonitorStatus,
    status_tx: watch::Sender<MonitorStatus>,
}

impl<S, A> Monitor<S, A, TokioSleeper>
where
    S: EventSource,
    A: AnchorSink,
{
    pub fn new(source: S, sink: A, settings: MonitorSettings) -> Self {
        let (status_tx, _) = watch::channel(MonitorStatus::default());
        Self {
            source,
            dispatcher: Dispatcher::new(sink),
            sleeper: TokioSleeper,
            settings,
            checkpoint: Box::new(NoCheckpoint),
            cancel: CancellationToken::new(),
            cursor: None,
            status: MonitorStatus::default(),
            status_tx,
        }
    }
}

impl<S, A, Z> Monitor<S, A, Z>
where
    S: EventSource,
    A: AnchorSink,
    Z: Sleeper,
{
    pub fn with_sleeper<Z2: Sleeper>(self, sleeper: Z2) -> Monitor<S, A, Z2> {
        Monitor {
            source: self.source,
            dispatcher: self.dispatcher,
            sleeper,
            settings: self.settings,
            checkpoint: self.checkpoint,
            cancel: self.cancel,
            cursor: self.cursor,
            status: self.status,
            status_tx: self.status_tx,
        }
    }

    pub fn with_checkpoint(
        mut self,
        checkpoint: impl CheckpointStore + 'static,
    ) -> Self {
        self.checkpoint = Box::new(checkpoint);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Start from a known cursor instead of deriving one from the chain head.
    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self.status.cursor_block = Some(cursor.from_block());
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    /// Run until cancelled. Errors never escape; they become state
    /// transitions and log records.
    pub async fn run(mut self) -> MonitorReport {
        tracing::info!(
            poll_interval = ?self.settings.poll_interval,
            backoff = ?self.settings.backoff,
            "monitor started"
        );
        self.restore_checkpoint();

        let mut handle: Option<S::Handle> = None;
        let mut failures: u32 = 0;
        let mut state = MonitorState::Connecting;

        while state != MonitorState::Stopped {
            if self.cancel.is_cancelled() {
                break;
            }
            self.publish(state);
            state = match state {
                MonitorState::Connecting => match self.connect().await {
                    Ok(Some(h)) => {
                        handle = Some(h);
                        failures = 0;
                        MonitorState::Listening
                    }
                    Ok(None) => MonitorState::Stopped,
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        self.record_error(&e, failures);
                        MonitorState::Backoff
                    }
                },
                MonitorState::Listening => match handle.as_mut() {
                    None => MonitorState::Connecting,
                    Some(h) => match self.poll_once(h).await {
                        Ok(true) => {
                            let interval = self.settings.poll_interval;
                            if self.pause(interval).await {
                                MonitorState::Listening
                            } else {
                                MonitorState::Stopped
                            }
                        }
                        Ok(false) => MonitorState::Stopped,
                        Err(e) => {
                            failures = failures.saturating_add(1);
                            self.record_error(&e, failures);
                            if let Some(h) = handle.take() {
                                self.source.close(h).await;
                            }
                            MonitorState::Backoff
                        }
                    },
                },
                MonitorState::Backoff => {
                    let delay = self.settings.backoff.delay(failures);
                    tracing::info!(?delay, attempt = failures, "backing off");
                    if self.pause(delay).await {
                        self.status.reconnects += 1;
                        MonitorState::Connecting
                    } else {
                        MonitorState::Stopped
                    }
                }
                MonitorState::Stopped => MonitorState::Stopped,
            };
        }

        if let Some(h) = handle.take() {
            self.source.close(h).await;
        }
        self.publish(MonitorState::Stopped);
        tracing::info!(
            dispatched = self.status.dispatched,
            failed = self.status.failed_dispatches,
            reconnects = self.status.reconnects,
            "monitor stopped"
        );
        self.status
    }

    fn restore_checkpoint(&mut self) {
        if self.cursor.is_some() {
            return;
        }
        match self.checkpoint.load() {
            Ok(Some(cursor)) => {
                tracing::info!(
                    from_block = cursor.from_block(),
                    last_seen = ?cursor.last_seen(),
                    "resuming from checkpoint"
                );
                self.cursor = Some(cursor);
                self.status.cursor_block = Some(cursor.from_block());
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "checkpoint unreadable; starting behind head")
            }
        }
    }

    /// `Ok(None)` means cancelled mid-connect.
    async fn connect(&mut self) -> Result<Option<S::Handle>, SourceError> {
        let cursor = match self.cursor {
            Some(c) => c,
            None => {
                let Some(head) =
                    self.bounded(self.source.latest_block()).await
                else {
                    return Ok(None);
                };
                let head = head.map_err(into_connection_error)?;
                let cursor = Cursor::behind_head(head, self.settings.start_margin);
                tracing::info!(
                    head,
                    from_block = cursor.from_block(),
                    "cursor derived from chain head"
                );
                self.cursor = Some(cursor);
                self.status.cursor_block = Some(cursor.from_block());
                cursor
            }
        };

        let Some(opened) = self.bounded(self.source.open(&cursor)).await else {
            return Ok(None);
        };
        let handle = opened.map_err(into_connection_error)?;
        tracing::info!(from_block = cursor.from_block(), "subscription open");
        Ok(Some(handle))
    }

    /// Poll once and dispatch the batch in order. `Ok(false)` means cancelled.
    async fn poll_once(
        &mut self,
        handle: &mut S::Handle,
    ) -> Result<bool, SourceError> {
        // read before polling so every block under it is covered once the poll returns
        let head = match self.bounded(self.source.latest_block()).await {
            None => return Ok(false),
            Some(Ok(head)) => Some(head),
            Some(Err(e)) => {
                tracing::debug!(error = %e, "chain head unavailable; cursor not raised");
                None
            }
        };
        let Some(polled) = self.bounded(self.source.poll(handle)).await else {
            return Ok(false);
        };
        let batch = polled?;
        if !batch.is_empty() {
            tracing::debug!(count = batch.len(), "new events");
        }

        let mut advanced = false;
        for raw in batch {
            let cursor = self.cursor.get_or_insert(Cursor::starting_at(0));
            if cursor.has_seen(raw.position) {
                tracing::debug!(position = ?raw.position, "skipping already dispatched event");
                continue;
            }
            let position = raw.position;
            let event = normalize(raw);
            tracing::info!(
                panel_id = %event.panel_id,
                event_type = %event.event_type,
                fault_type = %event.fault_type,
                fault_severity = %event.fault_severity,
                validated_by = %event.validated_by,
                timestamp = event.timestamp,
                "new panel event"
            );

            match self.dispatcher.dispatch(&event).await {
                Ok(_) => self.status.dispatched += 1,
                Err(e) => {
                    self.status.failed_dispatches += 1;
                    self.status.last_error = Some(e.to_string());
                    tracing::warn!(
                        panel_id = %event.panel_id,
                        event_hash = %event.event_hash,
                        error = %e,
                        "dispatch failed; continuing with next event"
                    );
                }
            }
            // failed events are not retried, so the cursor moves past them too
            if let Some(pos) = position {
                if let Some(cursor) = self.cursor.as_mut() {
                    advanced |= cursor.advance(pos);
                }
            }
        }

        // raised even when the batch was empty
        if let Some(head) = head {
            let safe = head.saturating_sub(self.settings.start_margin);
            let cursor = self.cursor.get_or_insert(Cursor::starting_at(0));
            advanced |= cursor.raise_to(safe);
        }

        if advanced {
            self.persist_cursor();
        }
        Ok(true)
    }

    fn persist_cursor(&mut self) {
        let Some(cursor) = self.cursor else { return };
        self.status.cursor_block = Some(cursor.from_block());
        if let Err(e) = self.checkpoint.save(&cursor) {
            tracing::warn!(error = %e, "failed to persist checkpoint");
        }
    }

    /// Apply the rpc timeout and race against cancellation. `None` means cancelled.
    async fn bounded<T, F>(&self, fut: F) -> Option<Result<T, SourceError>>
    where
        F: Future<Output = Result<T, SourceError>>,
    {
        let timeout = self.settings.rpc_timeout;
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            res = tokio::time::timeout(timeout, fut) => Some(
                res.unwrap_or(Err(SourceError::Timeout(timeout)))
            ),
        }
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = self.sleeper.sleep(duration) => true,
        }
    }

    fn record_error(&mut self, error: &SourceError, attempt: u32) {
        tracing::warn!(error = %error, attempt, fatal = error.is_fatal(), "event source error");
        self.status.last_error = Some(error.to_string());
    }

    fn publish(&mut self, state: MonitorState) {
        self.status.state = state;
        self.status_tx.send_replace(self.status.clone());
    }
}

fn into_connection_error(e: SourceError) -> SourceError {
    match e {
        SourceError::Connection(_) => e,
        other => SourceError::Connection(other.to_string()),
    }
}
