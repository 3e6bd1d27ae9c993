use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::time::{timeout, Duration};

use crate::models::CompetitorSnapshot;

const SNAPSHOT_KEY: &str = "competitor:last_snapshot";

/// Redis cache of the last-known competitor snapshot.
///
/// The gateway's stale-fallback normally lives in the crawl service; this
/// cache lets the fallback survive a restart of this process too.
pub struct CompetitorSnapshotCache {
    conn: ConnectionManager,
}

impl CompetitorSnapshotCache {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)?;

        // 5 second limit on the connection attempt
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| anyhow::anyhow!("Redis connection timeout after 5 seconds"))??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    pub async fn save_snapshot(&mut self, snapshot: &CompetitorSnapshot) -> anyhow::Result<()> {
        let value = serde_json::to_string(snapshot)?;
        self.conn.set::<_, _, ()>(SNAPSHOT_KEY, value).await?;
        tracing::debug!(
            "Cached competitor snapshot with {} records",
            snapshot.records.len()
        );
        Ok(())
    }

    pub async fn load_snapshot(&mut self) -> anyhow::Result<Option<CompetitorSnapshot>> {
        let raw: Option<String> = self.conn.get(SNAPSHOT_KEY).await?;
        match raw {
            Some(json) => {
                let snapshot: CompetitorSnapshot = serde_json::from_str(&json)?;
                tracing::info!(
                    "Loaded cached competitor snapshot with {} records",
                    snapshot.records.len()
                );
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    pub async fn clear(&mut self) -> anyhow::Result<()> {
        self.conn.del::<_, ()>(SNAPSHOT_KEY).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompetitorPriceRecord;
    use chrono::Utc;

    fn test_snapshot() -> CompetitorSnapshot {
        CompetitorSnapshot {
            records: vec![CompetitorPriceRecord {
                competitor_id: "acme".to_string(),
                product_id: "sku-1".to_string(),
                price: 19.99,
                observed_at: Utc::now(),
                confidence: 0.9,
            }],
            fetched_at: Some(Utc::now()),
            stale: false,
            reason: None,
        }
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_connection_timeout() {
        let result = CompetitorSnapshotCache::new("redis://192.0.2.1:6379").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_save_and_load_roundtrip() {
        let mut cache = CompetitorSnapshotCache::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");

        let _ = cache.clear().await;
        assert!(cache.load_snapshot().await.unwrap().is_none());

        let snapshot = test_snapshot();
        cache.save_snapshot(&snapshot).await.unwrap();

        let loaded = cache.load_snapshot().await.unwrap().unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].competitor_id, "acme");

        let _ = cache.clear().await;
    }
}
