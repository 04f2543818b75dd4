use std::path::{Path, PathBuf};

use alloy::primitives::keccak256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid panel id: {0:?}")]
    InvalidId(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory of panel evidence artifacts, one `{panel_id}.json` per panel.
#[derive(Debug, Clone)]
pub struct PanelStore {
    dir: PathBuf,
}

impl PanelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `panel_id`; ids that could leave the directory
    /// are rejected.
    pub fn artifact_path(&self, panel_id: &str) -> Result<PathBuf, StoreError> {
        validate_id(panel_id)?;
        Ok(self.dir.join(format!("{panel_id}.json")))
    }

    /// Keccak-256 of the artifact bytes as lowercase hex, `None` if missing.
    pub async fn hash(
        &self,
        panel_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let path = self.artifact_path(panel_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(hash_bytes(&bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(keccak256(bytes))
}

fn validate_id(id: &str) -> Result<(), StoreError> {
    let bad = id.is_empty()
        || id == "."
        || id.contains("..")
        || id.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}
