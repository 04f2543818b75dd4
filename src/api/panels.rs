use axum::{extract::State, response::Response};
use serde::Serialize;

use super::{
    AppState,
    error::AppError,
    request::ValidatedPath,
    response::ok,
    schema::PanelId,
};

#[derive(Debug, Serialize)]
pub struct PanelHash {
    pub panel_id: String,
    pub sha3_hash: String,
}

/// `GET /api/hash/{id}`: Keccak-256 of the stored `{id}.json` artifact.
pub async fn hash_panel(
    State(state): State<AppState>,
    ValidatedPath(PanelId(panel_id)): ValidatedPath<PanelId>,
) -> Result<Response, AppError> {
    match state.store.hash(&panel_id).await? {
        Some(sha3_hash) => Ok(ok(PanelHash {
            panel_id,
            sha3_hash,
        })),
        None => {
            tracing::debug!(%panel_id, "artifact not found");
            Err(AppError::ArtifactNotFound(panel_id))
        }
    }
}
