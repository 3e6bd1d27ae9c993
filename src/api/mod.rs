//! HTTP adapters for the collaborator ports.

pub mod competitor;
pub mod retail;

pub use competitor::CompetitorCrawlClient;
pub use retail::RetailOpsClient;
