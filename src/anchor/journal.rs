use std::path::PathBuf;

use async_trait::async_trait;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

use super::{AnchorSink, DispatchError, EvidenceRecord};
use crate::{event::PanelEvent, panels::PanelStore};

/// Appends one JSON line per event to a local journal file.
pub struct JournalSink {
    path: PathBuf,
    store: Option<PanelStore>,
    // serializes appends so lines never interleave
    write_lock: Mutex<()>,
}

impl JournalSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            store: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_store(mut self, store: PanelStore) -> Self {
        self.store = Some(store);
        self
    }
}

#[async_trait]
impl AnchorSink for JournalSink {
    async fn anchor(&self, event: &PanelEvent) -> Result<(), DispatchError> {
        let record = EvidenceRecord::build(event, self.store.as_ref()).await;
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "journal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anchors/journal.jsonl");
        let sink = JournalSink::new(&path);

        for id in ["panel-a", "panel-b"] {
            let event = PanelEvent {
                panel_id: id.into(),
                event_type: "FAULT".into(),
                fault_type: "arc".into(),
                fault_severity: "1".into(),
                action_taken: "shutdown".into(),
                event_hash: "ff".into(),
                validated_by: String::new(),
                timestamp: 1,
            };
            sink.anchor(&event).await.unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["panel_id"], "panel-a");
        assert_eq!(lines[1]["panel_id"], "panel-b");
    }
}
