// Core modules
pub mod analyzer;
pub mod api;
pub mod config;
pub mod cycle;
pub mod db;
pub mod decision;
pub mod error;
pub mod execution;
pub mod gateway;
pub mod guardrails;
pub mod models;
pub mod persistence;
pub mod profit;
pub mod providers;
pub mod reporting;

// Re-export commonly used types
pub use config::{GuardrailConfig, OptimizerConfig};
pub use error::CycleError;
pub use models::*;

pub type Result<T> = std::result::Result<T, CycleError>;
