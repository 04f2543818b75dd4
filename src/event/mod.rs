pub mod decode;
pub mod normalize;

use std::{cmp::Ordering, collections::BTreeMap};

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

pub use normalize::normalize;

/// Canonical panel event handed to the anchoring pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelEvent {
    pub panel_id: String,
    pub event_type: String,
    pub fault_type: String,
    pub fault_severity: String,
    pub action_taken: String,
    pub event_hash: String,
    pub validated_by: String,
    pub timestamp: u64,
}

/// Location of a log inside the chain, used to order events and to skip
/// anything already dispatched after a reconnect.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct EventPosition {
    pub block_number: u64,
    pub log_index: u64,
}

impl EventPosition {
    pub fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl PartialOrd for EventPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.block_number
            .cmp(&other.block_number)
            .then(self.log_index.cmp(&other.log_index))
    }
}

/// A single provider value, before any coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    Bytes(Vec<u8>),
    Uint(U256),
    Address(Address),
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl From<U256> for RawValue {
    fn from(v: U256) -> Self {
        RawValue::Uint(v)
    }
}

impl From<Address> for RawValue {
    fn from(v: Address) -> Self {
        RawValue::Address(v)
    }
}

/// Provider-agnostic event record as produced by an event source.
///
/// Fields are keyed by their on-chain argument name (`panelId`, `eventHash`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub fields: BTreeMap<String, RawValue>,
    pub position: Option<EventPosition>,
    pub tx_hash: Option<B256>,
}

impl RawEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<RawValue>,
    ) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_position(mut self, position: EventPosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn field(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }
}
