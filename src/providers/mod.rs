//! Collaborator ports consumed by the optimization loop.
//!
//! The core never talks to POS databases, crawlers, or pricing systems
//! directly; it goes through these traits so the loop can be driven against
//! HTTP adapters in production and in-memory fakes in tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::cycle::CycleResult;
use crate::models::{
    CompetitorSnapshot, InventorySnapshot, ProductVelocity, SeasonalTrend, StorePerformance,
};

/// Sales-velocity signals from the sales system
#[async_trait]
pub trait SalesSignalProvider: Send + Sync {
    async fn velocity_for(&self, product_id: &str, window_days: u32) -> Result<ProductVelocity>;

    /// Bulk velocity map for all active products
    async fn velocities(&self, window_days: u32) -> Result<HashMap<String, ProductVelocity>>;

    async fn seasonal_trends(&self, window_days: u32) -> Result<Vec<SeasonalTrend>>;

    async fn store_performance(&self) -> Result<Vec<StorePerformance>>;
}

/// Stock levels from the inventory system
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    async fn stock_for(&self, outlet_id: &str, product_id: &str) -> Result<u32>;

    async fn warehouse_stock_for(&self, product_id: &str) -> Result<u32>;

    /// Full outlet x product snapshot for one run
    async fn snapshot(&self) -> Result<InventorySnapshot>;
}

/// Freshness state of the competitor dataset
#[derive(Debug, Clone)]
pub enum SnapshotAge {
    Fresh(CompetitorSnapshot),
    Stale(CompetitorSnapshot),
    Missing,
}

/// Structured output of the competitor crawler. The crawling mechanics live
/// elsewhere; the loop only consumes records.
#[async_trait]
pub trait CompetitorIntelligenceProvider: Send + Sync {
    /// Last-known snapshot if one exists, classified against `max_age`
    async fn fresh_snapshot(&self, max_age_secs: u64) -> Result<SnapshotAge>;

    /// Request a new crawl of the given competitor targets
    async fn trigger_crawl(&self, targets: &[String]) -> Result<CompetitorSnapshot>;
}

/// Applies validated stock transfers
#[async_trait]
pub trait TransferExecutionService: Send + Sync {
    async fn execute(
        &self,
        product_id: &str,
        from_outlet: &str,
        to_outlet: &str,
        quantity: u32,
    ) -> Result<()>;
}

/// Applies validated price changes
#[async_trait]
pub trait PricingExecutionService: Send + Sync {
    async fn set_price(&self, product_id: &str, new_price: f64) -> Result<()>;
}

/// Out-of-band pause signal. Polled before each cycle and between item
/// executions; never terminates the process.
pub trait KillSwitchSignal: Send + Sync {
    fn is_active(&self) -> bool;
}

/// Durable archive of per-cycle summaries
#[async_trait]
pub trait RunHistoryStore: Send + Sync {
    async fn persist(&self, result: &CycleResult) -> Result<Uuid>;

    async fn recent(&self, limit: u32) -> Result<Vec<CycleResult>>;
}

/// Kill switch armed by the presence of a file on disk, so operators can
/// pause the loop with `touch` from outside the process.
pub struct FileKillSwitch {
    path: PathBuf,
}

impl FileKillSwitch {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn arm(&self) -> std::io::Result<()> {
        std::fs::write(&self.path, b"armed\n")
    }

    pub fn disarm(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl KillSwitchSignal for FileKillSwitch {
    fn is_active(&self) -> bool {
        self.path.exists()
    }
}

/// Flag-backed kill switch for tests and embedded use
#[derive(Default)]
pub struct StaticKillSwitch {
    active: AtomicBool,
}

impl StaticKillSwitch {
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
        }
    }

    pub fn set(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl KillSwitchSignal for StaticKillSwitch {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// In-memory history store, used when Postgres is unavailable and in tests
#[derive(Default)]
pub struct InMemoryHistoryStore {
    results: Mutex<Vec<CycleResult>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RunHistoryStore for InMemoryHistoryStore {
    async fn persist(&self, result: &CycleResult) -> Result<Uuid> {
        self.results.lock().unwrap().push(result.clone());
        Ok(Uuid::new_v4())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<CycleResult>> {
        let results = self.results.lock().unwrap();
        Ok(results.iter().rev().take(limit as usize).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kill_switch_arm_disarm() {
        let dir = std::env::temp_dir().join(format!("retailbot-ks-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let switch = FileKillSwitch::new(dir.join("kill"));

        assert!(!switch.is_active());
        switch.arm().unwrap();
        assert!(switch.is_active());
        switch.disarm().unwrap();
        assert!(!switch.is_active());
        // Disarming twice is not an error
        switch.disarm().unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_static_kill_switch_toggles() {
        let switch = StaticKillSwitch::new(false);
        assert!(!switch.is_active());
        switch.set(true);
        assert!(switch.is_active());
    }

    #[tokio::test]
    async fn test_in_memory_history_recent_is_newest_first() {
        let store = InMemoryHistoryStore::new();
        for run_id in 1..=3 {
            let result = CycleResult::empty(run_id);
            store.persist(&result).await.unwrap();
        }

        let recent = store.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].run_id, 3);
        assert_eq!(recent[1].run_id, 2);
    }
}
