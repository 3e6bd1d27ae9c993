//! Market signal gateway: the single entry point for everything a cycle
//! knows about the outside world.
//!
//! Signal failures never abort a cycle. A down provider degrades to an
//! empty dataset with a diagnostic note, a failed competitor refresh falls
//! back to the last-known snapshot tagged stale, and a totally absent
//! dataset means "no competitive signal", not an error.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config::OptimizerConfig;
use crate::models::{CompetitorSnapshot, MarketSignals};
use crate::persistence::CompetitorSnapshotCache;
use crate::providers::{
    CompetitorIntelligenceProvider, InventoryProvider, SalesSignalProvider, SnapshotAge,
};

pub struct MarketSignalGateway {
    sales: Arc<dyn SalesSignalProvider>,
    inventory: Arc<dyn InventoryProvider>,
    competitor: Arc<dyn CompetitorIntelligenceProvider>,
    cache: Option<Mutex<CompetitorSnapshotCache>>,
    config: Arc<OptimizerConfig>,
}

impl MarketSignalGateway {
    pub fn new(
        sales: Arc<dyn SalesSignalProvider>,
        inventory: Arc<dyn InventoryProvider>,
        competitor: Arc<dyn CompetitorIntelligenceProvider>,
        config: Arc<OptimizerConfig>,
    ) -> Self {
        Self {
            sales,
            inventory,
            competitor,
            cache: None,
            config,
        }
    }

    pub fn with_cache(mut self, cache: CompetitorSnapshotCache) -> Self {
        self.cache = Some(Mutex::new(cache));
        self
    }

    /// Gather all signals for one run. Never fails; degraded sources are
    /// flagged in `notes`.
    pub async fn gather(&self) -> MarketSignals {
        let mut signals = MarketSignals::default();

        match self
            .bounded(self.sales.velocities(self.config.velocity_window_days))
            .await
        {
            Ok(velocities) => signals.velocities = velocities,
            Err(e) => signals.notes.push(format!("sales: {}", e)),
        }

        match self.bounded(self.inventory.snapshot()).await {
            Ok(snapshot) => signals.inventory = snapshot,
            Err(e) => signals.notes.push(format!("inventory: {}", e)),
        }

        signals.competitor = self.competitor_snapshot(&mut signals.notes).await;
        signals
    }

    async fn competitor_snapshot(&self, notes: &mut Vec<String>) -> CompetitorSnapshot {
        let age = self
            .bounded(self.competitor.fresh_snapshot(self.config.crawl_frequency_secs))
            .await;

        match age {
            Ok(SnapshotAge::Fresh(snapshot)) => {
                self.cache_best_effort(&snapshot).await;
                snapshot
            }
            Ok(SnapshotAge::Stale(last_known)) => match self.crawl().await {
                Ok(fresh) => {
                    self.cache_best_effort(&fresh).await;
                    fresh
                }
                Err(e) => {
                    notes.push(format!("competitor crawl: {}", e));
                    mark_stale(last_known, format!("crawl failed: {}", e))
                }
            },
            Ok(SnapshotAge::Missing) => self.recover_from_scratch(notes, None).await,
            Err(e) => {
                self.recover_from_scratch(notes, Some(format!("snapshot lookup: {}", e)))
                    .await
            }
        }
    }

    /// No usable snapshot from the provider: crawl, then the Redis cache,
    /// then give up with a diagnostic.
    async fn recover_from_scratch(
        &self,
        notes: &mut Vec<String>,
        prior_failure: Option<String>,
    ) -> CompetitorSnapshot {
        if let Some(failure) = prior_failure {
            notes.push(format!("competitor: {}", failure));
        }

        match self.crawl().await {
            Ok(fresh) => {
                self.cache_best_effort(&fresh).await;
                fresh
            }
            Err(crawl_err) => {
                notes.push(format!("competitor crawl: {}", crawl_err));
                if let Some(cached) = self.load_cached().await {
                    return mark_stale(cached, format!("crawl failed: {}", crawl_err));
                }
                CompetitorSnapshot::empty(format!(
                    "no competitor data available ({})",
                    crawl_err
                ))
            }
        }
    }

    async fn crawl(&self) -> anyhow::Result<CompetitorSnapshot> {
        // Empty target list means "all configured competitors"
        self.bounded(self.competitor.trigger_crawl(&[])).await
    }

    async fn cache_best_effort(&self, snapshot: &CompetitorSnapshot) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.lock().await.save_snapshot(snapshot).await {
                tracing::warn!("Failed to cache competitor snapshot: {}", e);
            }
        }
    }

    async fn load_cached(&self) -> Option<CompetitorSnapshot> {
        let cache = self.cache.as_ref()?;
        match cache.lock().await.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Failed to load cached competitor snapshot: {}", e);
                None
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        timeout(self.config.call_timeout(), call)
            .await
            .map_err(|_| anyhow::anyhow!("call timed out"))?
    }
}

fn mark_stale(mut snapshot: CompetitorSnapshot, reason: String) -> CompetitorSnapshot {
    snapshot.stale = true;
    snapshot.reason = Some(reason);
    snapshot
}
