pub mod bindings;
pub mod providers;
pub mod source;

pub use providers::{ChainHead, ProviderHead, ProviderPool};
pub use source::{FilterSource, SubscriptionSource, panel_event_filter};
