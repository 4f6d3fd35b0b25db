//! Core domain types and logic.

pub mod bar;
pub mod channel;
pub mod simulator;
pub mod accounting;
pub mod instrument;
pub mod series;
pub mod batch;
pub mod equity;
pub mod summary;
pub mod config_validation;
pub mod run_config;
pub mod error;
