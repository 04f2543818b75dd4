pub mod anchor;
pub mod api;
pub mod config;
pub mod contract;
pub mod event;
pub mod logging;
pub mod monitor;
pub mod panels;
pub mod source;
