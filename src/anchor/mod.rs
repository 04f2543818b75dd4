pub mod http;
pub mod journal;

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::{
    config::{AnchorTarget, Config},
    event::PanelEvent,
    panels::PanelStore,
};

pub use http::HttpSink;
pub use journal::JournalSink;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("anchor rejected event: status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("anchor transport error: {0}")]
    Transport(String),
    #[error("anchor io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anchor encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Downstream system of record for panel events.
///
/// Implementations should tolerate receiving the same event more than once.
#[async_trait]
pub trait AnchorSink: Send + Sync {
    async fn anchor(&self, event: &PanelEvent) -> Result<(), DispatchError>;

    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: AnchorSink + ?Sized> AnchorSink for Box<T> {
    async fn anchor(&self, event: &PanelEvent) -> Result<(), DispatchError> {
        (**self).anchor(event).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[async_trait]
impl<T: AnchorSink + ?Sized> AnchorSink for Arc<T> {
    async fn anchor(&self, event: &PanelEvent) -> Result<(), DispatchError> {
        (**self).anchor(event).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// What a sink records for one event.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceRecord<'a> {
    #[serde(flatten)]
    pub event: &'a PanelEvent,
    /// Receipt time in unix seconds, distinct from the on-chain timestamp.
    pub received_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_hash: Option<String>,
}

impl<'a> EvidenceRecord<'a> {
    /// Build a record, attaching the stored artifact hash when there is one.
    /// A store failure only drops the hash.
    pub async fn build(
        event: &'a PanelEvent,
        store: Option<&PanelStore>,
    ) -> EvidenceRecord<'a> {
        let artifact_hash = match store {
            Some(store) => match store.hash(&event.panel_id).await {
                Ok(hash) => hash,
                Err(e) => {
                    tracing::debug!(panel_id = %event.panel_id, error = %e, "artifact not hashed");
                    None
                }
            },
            None => None,
        };
        EvidenceRecord {
            event,
            received_at: chrono::Utc::now().timestamp(),
            artifact_hash,
        }
    }
}

/// Records events through tracing only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl AnchorSink for LogSink {
    async fn anchor(&self, event: &PanelEvent) -> Result<(), DispatchError> {
        tracing::info!(
            panel_id = %event.panel_id,
            event_type = %event.event_type,
            fault_type = %event.fault_type,
            fault_severity = %event.fault_severity,
            action_taken = %event.action_taken,
            event_hash = %event.event_hash,
            validated_by = %event.validated_by,
            timestamp = event.timestamp,
            "panel event anchored"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Acknowledgement of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub sink: &'static str,
    pub elapsed_ms: u64,
}

/// Forwards normalized events to the configured sink. Holds no state and
/// does not retry.
pub struct Dispatcher<A> {
    sink: A,
}

impl<A: AnchorSink> Dispatcher<A> {
    pub fn new(sink: A) -> Self {
        Self { sink }
    }

    pub async fn dispatch(
        &self,
        event: &PanelEvent,
    ) -> Result<Ack, DispatchError> {
        let started = Instant::now();
        self.sink.anchor(event).await?;
        let ack = Ack {
            sink: self.sink.name(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::debug!(
            panel_id = %event.panel_id,
            sink = ack.sink,
            elapsed_ms = ack.elapsed_ms,
            "dispatched"
        );
        Ok(ack)
    }
}

/// Build the sink selected by configuration.
pub fn sink_from_config(config: &Config) -> eyre::Result<Box<dyn AnchorSink>> {
    let store = PanelStore::new(&config.api.panels_dir);
    let sink: Box<dyn AnchorSink> = match &config.anchor {
        AnchorTarget::Log => Box::new(LogSink),
        AnchorTarget::Http { url, timeout } => {
            Box::new(HttpSink::new(url.clone(), *timeout)?.with_store(store))
        }
        AnchorTarget::Journal { path } => {
            Box::new(JournalSink::new(path.clone()).with_store(store))
        }
    };
    tracing::info!(sink = sink.name(), "anchor sink configured");
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Flaky {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl AnchorSink for Flaky {
        async fn anchor(&self, _e: &PanelEvent) -> Result<(), DispatchError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls % 2 == 0 {
                return Err(DispatchError::Transport("down".into()));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn event() -> PanelEvent {
        PanelEvent {
            panel_id: "panel-1".into(),
            event_type: "FAULT".into(),
            fault_type: "hotspot".into(),
            fault_severity: "2".into(),
            action_taken: "isolate".into(),
            event_hash: "ab".repeat(32),
            validated_by: String::new(),
            timestamp: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn dispatch_reports_sink_result() {
        let dispatcher = Dispatcher::new(Flaky {
            calls: Mutex::new(0),
        });
        let ack = dispatcher.dispatch(&event()).await.unwrap();
        assert_eq!(ack.sink, "flaky");
        assert!(dispatcher.dispatch(&event()).await.is_err());
        // same event again is fine
        assert!(dispatcher.dispatch(&event()).await.is_ok());
    }

    #[tokio::test]
    async fn evidence_record_flattens_event_and_attaches_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("panel-1.json"), b"{}").unwrap();
        let store = PanelStore::new(dir.path());
        let ev = event();

        let record = EvidenceRecord::build(&ev, Some(&store)).await;
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["panel_id"], "panel-1");
        assert_eq!(json["validated_by"], "");
        assert_eq!(
            json["artifact_hash"],
            crate::panels::hash_bytes(b"{}").as_str()
        );
        assert!(json["received_at"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn evidence_record_without_artifact_omits_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = PanelStore::new(dir.path());
        let ev = event();
        let record = EvidenceRecord::build(&ev, Some(&store)).await;
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("artifact_hash").is_none());
    }
}
