use alloy::{
    primitives::{B256, U256},
    rpc::types::Log,
    sol_types::SolEvent,
};
use eyre::{Result, bail};

use super::{EventPosition, RawEvent, RawValue};
use crate::contract::bindings::{LegacyPanelRegistry, PanelRegistry};

type CurrentEvent = PanelRegistry::PanelEventAdded;
type LegacyEvent = LegacyPanelRegistry::PanelEventAdded;

/// Topic0 values of every `PanelEventAdded` shape the registry has emitted.
pub fn event_signatures() -> Vec<B256> {
    vec![CurrentEvent::SIGNATURE_HASH, LegacyEvent::SIGNATURE_HASH]
}

/// Decode a `PanelEventAdded` log into a [`RawEvent`].
pub fn raw_event_from_log(log: &Log) -> Result<RawEvent> {
    if log.removed {
        bail!("log removed by reorg");
    }
    let inner = &log.inner; // primitives::Log
    let Some(topic0) = inner.topics().first() else {
        bail!("log without topics");
    };

    let raw = if *topic0 == CurrentEvent::SIGNATURE_HASH {
        let event = CurrentEvent::decode_log(inner)?.data;
        tracing::debug!(?event, "decoded PanelEventAdded");
        RawEvent::new()
            .with_field("panelId", event.panelId)
            .with_field("eventType", event.eventType)
            .with_field("faultType", event.faultType)
            .with_field("faultSeverity", U256::from(event.faultSeverity))
            .with_field("actionTaken", event.actionTaken)
            .with_field("eventHash", RawValue::Bytes(event.eventHash.to_vec()))
            .with_field("validatedBy", event.validatedBy)
            .with_field("timestamp", event.timestamp)
    } else if *topic0 == LegacyEvent::SIGNATURE_HASH {
        let event = LegacyEvent::decode_log(inner)?.data;
        tracing::debug!(?event, "decoded legacy PanelEventAdded");
        RawEvent::new()
            .with_field("panelId", event.panelId)
            .with_field("eventType", event.eventType)
            .with_field("faultType", event.faultType)
            .with_field("faultSeverity", event.faultSeverity)
            .with_field("actionTaken", event.actionTaken)
            .with_field("eventHash", RawValue::Bytes(event.eventHash.to_vec()))
            .with_field("timestamp", event.timestamp)
    } else {
        bail!("not a PanelEventAdded log: topic0 {topic0}");
    };

    let position = log
        .block_number
        .zip(log.log_index)
        .map(|(block, index)| EventPosition::new(block, index));
    Ok(RawEvent {
        position,
        tx_hash: log.transaction_hash,
        ..raw
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::normalize;
    use alloy::primitives::{Address, FixedBytes, LogData, address};

    fn rpc_log(data: LogData) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Address::ZERO,
                data,
            },
            block_number: Some(42),
            log_index: Some(3),
            transaction_hash: Some(B256::repeat_byte(0x11)),
            ..Default::default()
        }
    }

    #[test]
    fn decodes_current_event_shape() {
        let validator = address!("0xb8935eBEb1dA663C187fc9090b77E1972A909e12");
        let event = CurrentEvent {
            panelId: "panel-1".into(),
            eventType: "INSPECTION".into(),
            faultType: "".into(),
            faultSeverity: 2,
            actionTaken: "none".into(),
            eventHash: FixedBytes::repeat_byte(0xab),
            validatedBy: validator,
            timestamp: U256::from(1_700_000_000u64),
        };
        let raw = raw_event_from_log(&rpc_log(event.encode_log_data()))
            .expect("decode");

        assert_eq!(raw.position, Some(EventPosition::new(42, 3)));
        assert_eq!(raw.tx_hash, Some(B256::repeat_byte(0x11)));
        let ev = normalize(raw);
        assert_eq!(ev.panel_id, "panel-1");
        assert_eq!(ev.fault_severity, "2");
        assert_eq!(ev.event_hash, "ab".repeat(32));
        assert_eq!(ev.validated_by, validator.to_checksum(None));
        assert_eq!(ev.timestamp, 1_700_000_000);
    }

    #[test]
    fn legacy_event_has_no_validator() {
        let event = LegacyEvent {
            panelId: "panel-2".into(),
            eventType: "FAULT".into(),
            faultType: "crack".into(),
            faultSeverity: "HIGH".into(),
            actionTaken: "replace".into(),
            eventHash: FixedBytes::repeat_byte(0x01),
            timestamp: U256::from(5u8),
        };
        let raw = raw_event_from_log(&rpc_log(event.encode_log_data()))
            .expect("decode");
        let ev = normalize(raw);
        assert_eq!(ev.fault_severity, "HIGH");
        assert_eq!(ev.validated_by, "");
    }

    #[test]
    fn unrelated_topic_is_rejected() {
        let data = LogData::new_unchecked(vec![B256::repeat_byte(0x99)], Default::default());
        assert!(raw_event_from_log(&rpc_log(data)).is_err());
    }
}
