//! Port traits for the hexagonal boundary.

pub mod config_port;
pub mod panel_source;
pub mod trade_log_sink;
