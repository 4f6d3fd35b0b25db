//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod equity_report;
pub mod file_config_adapter;
pub mod message_report;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
