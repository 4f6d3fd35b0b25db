//! Port traits separating the domain from storage, configuration and reporting.

pub mod config_port;
pub mod data_port;
pub mod store_port;
pub mod report_port;
