use std::{fs, path::PathBuf};

use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::event::EventPosition;

/// Block-height cursor into the event log.
///
/// `from_block` only moves forward. `last_seen` is the position of the most
/// recently dispatched event; a reopened subscription replays from
/// `from_block`, and anything at or before `last_seen` is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    from_block: u64,
    last_seen: Option<EventPosition>,
}

impl Cursor {
    pub fn starting_at(from_block: u64) -> Self {
        Self {
            from_block,
            last_seen: None,
        }
    }

    /// Head minus a safety margin, clamped at genesis.
    pub fn behind_head(head: u64, margin: u64) -> Self {
        Self::starting_at(head.saturating_sub(margin))
    }

    pub fn from_block(&self) -> u64 {
        self.from_block
    }

    pub fn last_seen(&self) -> Option<EventPosition> {
        self.last_seen
    }

    /// Whether an event at `position` was already handled. Events without a
    /// position can't be ordered and are never considered seen.
    pub fn has_seen(&self, position: Option<EventPosition>) -> bool {
        match (position, self.last_seen) {
            (Some(pos), Some(last)) => pos <= last,
            _ => false,
        }
    }

    /// Record a handled event. Returns false if it would move the cursor back.
    pub fn advance(&mut self, position: EventPosition) -> bool {
        if self.has_seen(Some(position)) {
            return false;
        }
        self.last_seen = Some(position);
        self.from_block = self.from_block.max(position.block_number);
        true
    }

    /// Move `from_block` up to `block` when the log below it is known to be
    /// retrieved. Returns whether the cursor moved.
    pub fn raise_to(&mut self, block: u64) -> bool {
        if block <= self.from_block {
            return false;
        }
        self.from_block = block;
        true
    }
}

/// Durable storage for the cursor between process runs.
pub trait CheckpointStore: Send + Sync {
    fn load(&self) -> Result<Option<Cursor>>;
    fn save(&self, cursor: &Cursor) -> Result<()>;
}

/// Keeps nothing; every start derives the cursor from the chain head.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCheckpoint;

impl CheckpointStore for NoCheckpoint {
    fn load(&self) -> Result<Option<Cursor>> {
        Ok(None)
    }

    fn save(&self, _cursor: &Cursor) -> Result<()> {
        Ok(())
    }
}

/// JSON file checkpoint, rewritten atomically via a sibling temp file.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CheckpointStore for FileCheckpoint {
    fn load(&self) -> Result<Option<Cursor>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        let cursor = serde_json::from_slice(&bytes).map_err(|e| {
            eyre::eyre!("corrupt checkpoint {}: {}", self.path.display(), e)
        })?;
        Ok(Some(cursor))
    }

    fn save(&self, cursor: &Cursor) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(cursor)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behind_head_clamps_at_zero() {
        assert_eq!(Cursor::behind_head(5, 10).from_block(), 0);
        assert_eq!(Cursor::behind_head(100, 10).from_block(), 90);
    }

    #[test]
    fn advance_is_monotonic() {
        let mut cursor = Cursor::starting_at(90);
        assert!(cursor.advance(EventPosition::new(95, 1)));
        assert!(!cursor.advance(EventPosition::new(95, 1)));
        assert!(!cursor.advance(EventPosition::new(94, 7)));
        assert_eq!(cursor.from_block(), 95);
        assert!(cursor.advance(EventPosition::new(95, 2)));
        assert_eq!(cursor.last_seen(), Some(EventPosition::new(95, 2)));
    }

    #[test]
    fn advance_never_rewinds_block() {
        let mut cursor = Cursor::starting_at(200);
        assert!(cursor.advance(EventPosition::new(150, 0)));
        assert_eq!(cursor.from_block(), 200);
    }

    #[test]
    fn raise_to_only_moves_forward() {
        let mut cursor = Cursor::starting_at(90);
        cursor.advance(EventPosition::new(95, 0));
        assert!(cursor.raise_to(99_990));
        assert!(!cursor.raise_to(500));
        assert_eq!(cursor.from_block(), 99_990);
        assert_eq!(cursor.last_seen(), Some(EventPosition::new(95, 0)));
    }

    #[test]
    fn unpositioned_events_are_never_seen() {
        let mut cursor = Cursor::starting_at(0);
        cursor.advance(EventPosition::new(10, 0));
        assert!(!cursor.has_seen(None));
        assert!(cursor.has_seen(Some(EventPosition::new(9, 99))));
    }

    #[test]
    fn file_checkpoint_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpoint::new(dir.path().join("state/cursor.json"));
        assert_eq!(store.load().unwrap(), None);

        let mut cursor = Cursor::starting_at(1_000);
        cursor.advance(EventPosition::new(1_004, 3));
        store.save(&cursor).unwrap();
        assert_eq!(store.load().unwrap(), Some(cursor));
    }

    #[test]
    fn corrupt_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");
        fs::write(&path, b"not json").unwrap();
        assert!(FileCheckpoint::new(path).load().is_err());
    }
}
