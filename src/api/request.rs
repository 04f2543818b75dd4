use super::schema::{Validate, ValidationError};
use crate::api::error::AppError;
use crate::api::request_id_header;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
// no async_trait: axum 0.8 FromRequestParts returns an explicit impl Future

fn extract_request_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(request_id_header())
        .and_then(|v| v.to_str().ok())
}

/// Path parameters deserialized into `T` and run through [`Validate`].
pub struct ValidatedPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedPath<T>
where
    T: Validate<Err = ValidationError>
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    S: Send + Sync + 'static,
{
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send
    {
        async move {
            let rid = extract_request_id(&parts.headers)
                .unwrap_or("")
                .to_string();
            match Path::<T>::from_request_parts(parts, state).await {
                Ok(Path(val)) => match val.validate() {
                    Ok(v) => {
                        tracing::debug!(
                            target = "extractor",
                            extractor = "ValidatedPath",
                            request_id = %rid,
                            "path validated"
                        );
                        Ok(ValidatedPath(v))
                    }
                    Err(e) => {
                        tracing::debug!(target="extractor", extractor="ValidatedPath", error=%e.0, request_id = %rid, "path validation failed");
                        Err(AppError::PanelIdInvalid(e.0).to_response())
                    }
                },
                Err(_) => {
                    tracing::debug!(
                        target = "extractor",
                        extractor = "ValidatedPath",
                        request_id = %rid,
                        "path deserialize failed"
                    );
                    Err(AppError::Validation("invalid path params".into())
                        .to_response())
                }
            }
        }
    }
}
