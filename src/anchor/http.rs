use std::time::Duration;

use async_trait::async_trait;

use super::{AnchorSink, DispatchError, EvidenceRecord};
use crate::{event::PanelEvent, panels::PanelStore};

/// POSTs each event as JSON to a downstream anchoring service.
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
    store: Option<PanelStore>,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> eyre::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            store: None,
        })
    }

    pub fn with_store(mut self, store: PanelStore) -> Self {
        self.store = Some(store);
        self
    }
}

#[async_trait]
impl AnchorSink for HttpSink {
    async fn anchor(&self, event: &PanelEvent) -> Result<(), DispatchError> {
        let record = EvidenceRecord::build(event, self.store.as_ref()).await;
        let res = self
            .client
            .post(&self.url)
            .json(&record)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use std::sync::{Arc, Mutex};

    fn event() -> PanelEvent {
        PanelEvent {
            panel_id: "panel-3".into(),
            event_type: "INSPECTION".into(),
            fault_type: String::new(),
            fault_severity: "0".into(),
            action_taken: "none".into(),
            event_hash: "00".repeat(32),
            validated_by: String::new(),
            timestamp: 7,
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/anchor")
    }

    #[tokio::test]
    async fn posts_evidence_json() {
        let seen: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();
        let captured = seen.clone();
        let app = Router::new().route(
            "/anchor",
            post(move |Json(body): Json<serde_json::Value>| {
                let captured = captured.clone();
                async move {
                    captured.lock().unwrap().push(body);
                    StatusCode::ACCEPTED
                }
            }),
        );
        let url = serve(app).await;

        let sink = HttpSink::new(url, Duration::from_secs(5)).unwrap();
        sink.anchor(&event()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["panel_id"], "panel-3");
        assert_eq!(seen[0]["timestamp"], 7);
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let app = Router::new().route(
            "/anchor",
            post(|| async { (StatusCode::CONFLICT, "duplicate") }),
        );
        let url = serve(app).await;

        let sink = HttpSink::new(url, Duration::from_secs(5)).unwrap();
        match sink.anchor(&event()).await {
            Err(DispatchError::Rejected { status, body }) => {
                assert_eq!(status, 409);
                assert_eq!(body, "duplicate");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}
