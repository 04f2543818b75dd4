use alloy::primitives::U256;

use super::{PanelEvent, RawEvent, RawValue};

/// Map a raw provider record onto a [`PanelEvent`].
///
/// Never fails: absent fields fall back to empty strings (or `0` for the
/// timestamp) and malformed values are coerced as well as they can be, so a
/// single odd record cannot stall the feed.
pub fn normalize(raw: RawEvent) -> PanelEvent {
    PanelEvent {
        panel_id: text(raw.field("panelId")),
        event_type: text(raw.field("eventType")),
        fault_type: text(raw.field("faultType")),
        fault_severity: text(raw.field("faultSeverity")),
        action_taken: text(raw.field("actionTaken")),
        event_hash: hash(raw.field("eventHash")),
        validated_by: text(raw.field("validatedBy")),
        timestamp: unix_seconds(raw.field("timestamp")),
    }
}

fn text(value: Option<&RawValue>) -> String {
    match value {
        None => String::new(),
        Some(RawValue::Text(s)) => s.clone(),
        Some(RawValue::Bytes(b)) => String::from_utf8_lossy(b).into_owned(),
        Some(RawValue::Uint(u)) => u.to_string(),
        Some(RawValue::Address(a)) => a.to_checksum(None),
    }
}

// Strings are trusted as already rendered by the provider.
fn hash(value: Option<&RawValue>) -> String {
    match value {
        None => String::new(),
        Some(RawValue::Text(s)) => s.clone(),
        Some(RawValue::Bytes(b)) => hex::encode(b),
        Some(RawValue::Uint(u)) => hex::encode(u.to_be_bytes::<32>()),
        Some(RawValue::Address(a)) => hex::encode(a.as_slice()),
    }
}

fn unix_seconds(value: Option<&RawValue>) -> u64 {
    match value {
        Some(RawValue::Uint(u)) => u.saturating_to::<u64>(),
        Some(RawValue::Text(s)) => s.trim().parse().unwrap_or_default(),
        Some(RawValue::Bytes(b)) if b.len() <= 32 => {
            U256::from_be_slice(b).saturating_to::<u64>()
        }
        _ => 0,
    }
}
