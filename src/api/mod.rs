pub mod error;
pub mod health;
pub mod panels;
pub mod request;
pub mod response;
pub mod schema;

use std::{net::SocketAddr, sync::Arc, sync::OnceLock};

use alloy::primitives::Address;
use axum::http::HeaderName;
use axum::http::{HeaderValue, Method};
use bytes::Bytes;
use eyre::Result;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::{contract::ChainHead, monitor::MonitorStatus, panels::PanelStore};

/// Everything the routes read. Nothing here is written by a handler.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<dyn ChainHead>,
    pub wallet: Address,
    pub store: PanelStore,
    pub monitor: watch::Receiver<MonitorStatus>,
}

// Request-id header name, read from env once.
static REQ_ID_HEADER: OnceLock<HeaderName> = OnceLock::new();

pub fn request_id_header() -> &'static HeaderName {
    REQ_ID_HEADER.get_or_init(|| {
        std::env::var("REQ_ID_HEADER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| HeaderName::from_static("x-request-id"))
    })
}

fn cors_layer() -> CorsLayer {
    // CORS_ALLOW_ORIGIN: "*" or a comma separated list; unset allows any
    let base = match std::env::var("CORS_ALLOW_ORIGIN").ok() {
        Some(o) if o != "*" => {
            let origins: Vec<HeaderValue> = o
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        }
        _ => CorsLayer::new().allow_origin(Any),
    };
    base.allow_headers(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .expose_headers([request_id_header().clone()])
}

/// Router with every route and layer; `listen_app` serves it.
pub fn build_router(state: AppState) -> axum::Router {
    let log_headers = std::env::var("LOG_HTTP_HEADERS")
        .ok()
        .map_or(false, |v| v == "1");
    let log_body = std::env::var("LOG_HTTP_BODY")
        .ok()
        .map_or(false, |v| v == "1");
    let req_id_header = request_id_header().clone();
    let req_id_for_span = req_id_header.clone();
    let trace = TraceLayer::new_for_http()
        .make_span_with(move |req: &axum::http::Request<_>| {
            let ua = req
                .headers()
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            let rid = req
                .headers()
                .get(&req_id_for_span)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            let span = tracing::info_span!(
                "http.request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
                user_agent = %ua,
                request_id = tracing::field::Empty,
            );
            span.record("request_id", rid);
            span
        })
        .on_request(
            move |req: &axum::http::Request<_>, _span: &tracing::Span| {
                if log_headers {
                    tracing::debug!(headers = ?req.headers(), "http headers");
                }
            },
        )
        .on_response({
            let req_id_on_resp = req_id_header.clone();
            move |res: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                let status = res.status().as_u16();
                let rid = res
                    .headers()
                    .get(&req_id_on_resp)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                tracing::info!(status, ?latency, request_id = %rid, "http response");
            }
        })
        .on_body_chunk(
            move |chunk: &Bytes,
                  latency: std::time::Duration,
                  _span: &tracing::Span| {
                if log_body {
                    let size = chunk.len();
                    tracing::debug!(size, ?latency, "http body chunk");
                }
            },
        );

    let artifacts = ServeDir::new(state.store.dir());

    axum::Router::new()
        .route("/", axum::routing::get(health::home))
        .route("/health", axum::routing::get(health::health))
        .route("/api/hash/{id}", axum::routing::get(panels::hash_panel))
        .nest_service("/panels", artifacts)
        // outermost last: Propagate (inner) -> Trace -> Cors -> Set (outer)
        .layer(PropagateRequestIdLayer::new(request_id_header().clone()))
        .layer(trace)
        .layer(cors_layer())
        .layer(SetRequestIdLayer::new(
            request_id_header().clone(),
            MakeRequestUuid::default(),
        ))
        .with_state(state)
}

/// Serve the HTTP surface until `cancel` fires.
pub async fn listen_app(
    state: AppState,
    addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
