use serde::Deserialize;
use std::{fmt, result::Result as StdResult};

pub const MAX_PANEL_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct ValidationError(pub String);

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

pub trait Validate: Sized {
    type Err;
    fn validate(self) -> StdResult<Self, Self::Err>;
}

/// `{id}` path segment of `/api/hash/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct PanelId(pub String);

impl Validate for PanelId {
    type Err = ValidationError;

    fn validate(self) -> StdResult<Self, Self::Err> {
        let id = self.0.trim();
        if id.is_empty() {
            return Err(ValidationError("panel id is empty".into()));
        }
        if id.len() > MAX_PANEL_ID_LEN {
            return Err(ValidationError(format!(
                "panel id longer than {MAX_PANEL_ID_LEN} chars"
            )));
        }
        Ok(PanelId(id.to_string()))
    }
}
