//! Client for the competitor crawl service.
//!
//! The crawl service owns scraping and product-identity matching; this
//! client only fetches its results. Crawls are expensive for the service,
//! so requests are rate limited and retried with backoff.

use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::models::{CompetitorPriceRecord, CompetitorSnapshot};
use crate::providers::{CompetitorIntelligenceProvider, SnapshotAge};

const RATE_LIMIT_RPM: u32 = 12;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;

// Type alias for the rate limiter to simplify signatures
type CrawlRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Crawl service client. Cloneable; clones share the rate limiter.
#[derive(Clone)]
pub struct CompetitorCrawlClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<CrawlRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    fetched_at: DateTime<Utc>,
    records: Vec<RecordPayload>,
}

#[derive(Debug, Deserialize)]
struct RecordPayload {
    competitor_id: String,
    product_id: String,
    price: f64,
    observed_at: DateTime<Utc>,
    confidence: f64,
}

#[derive(Debug, Serialize)]
struct CrawlRequest<'a> {
    targets: &'a [String],
}

impl CompetitorCrawlClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let quota = Quota::per_minute(NonZeroU32::new(RATE_LIMIT_RPM).unwrap());
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    /// GET with rate limiting and backoff on 429/5xx
    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        for attempt in 1..=MAX_RETRIES {
            self.rate_limiter.until_ready().await;

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() || status == StatusCode::NOT_FOUND {
                        return Ok(response);
                    }
                    if status.as_u16() == 429 || status.is_server_error() {
                        if attempt < MAX_RETRIES {
                            let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
                            tracing::warn!(
                                "Crawl service returned {}, retrying in {}ms (attempt {}/{})",
                                status,
                                backoff_ms,
                                attempt,
                                MAX_RETRIES
                            );
                            tokio::time::sleep(std::time::Duration::from_millis(backoff_ms))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("crawl service returned {} after retries", status));
                    }
                    return Err(anyhow!("crawl service returned {}", status));
                }
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
                        tracing::warn!(
                            "Crawl service request failed: {}. Retrying in {}ms (attempt {}/{})",
                            e,
                            backoff_ms,
                            attempt,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                        continue;
                    }
                    return Err(e).context("crawl service unreachable");
                }
            }
        }
        unreachable!("retry loop always returns")
    }

    fn into_snapshot(payload: SnapshotResponse, stale: bool) -> CompetitorSnapshot {
        let mut records: Vec<CompetitorPriceRecord> = payload
            .records
            .into_iter()
            .map(|r| CompetitorPriceRecord {
                competitor_id: r.competitor_id,
                product_id: r.product_id,
                price: r.price,
                observed_at: r.observed_at,
                confidence: r.confidence,
            })
            .collect();
        records.sort_by(|a, b| {
            (a.product_id.as_str(), a.competitor_id.as_str())
                .cmp(&(b.product_id.as_str(), b.competitor_id.as_str()))
        });

        CompetitorSnapshot {
            records,
            fetched_at: Some(payload.fetched_at),
            stale,
            reason: None,
        }
    }
}

#[async_trait]
impl CompetitorIntelligenceProvider for CompetitorCrawlClient {
    async fn fresh_snapshot(&self, max_age_secs: u64) -> Result<SnapshotAge> {
        let url = format!("{}/snapshots/latest", self.base_url);
        let response = self.get_with_retry(&url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(SnapshotAge::Missing);
        }

        let payload: SnapshotResponse = response
            .json()
            .await
            .context("malformed snapshot payload from crawl service")?;

        let age_secs = (Utc::now() - payload.fetched_at).num_seconds().max(0) as u64;
        let stale = age_secs > max_age_secs;
        let snapshot = Self::into_snapshot(payload, stale);

        if stale {
            Ok(SnapshotAge::Stale(snapshot))
        } else {
            Ok(SnapshotAge::Fresh(snapshot))
        }
    }

    async fn trigger_crawl(&self, targets: &[String]) -> Result<CompetitorSnapshot> {
        let url = format!("{}/crawls", self.base_url);

        // Crawls are not retried: a second in-flight crawl would double the
        // load on competitor sites for the same data.
        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .post(&url)
            .json(&CrawlRequest { targets })
            .send()
            .await
            .context("crawl service unreachable")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("crawl request rejected with {}", status));
        }

        let payload: SnapshotResponse = response
            .json()
            .await
            .context("malformed crawl result from crawl service")?;
        Ok(Self::into_snapshot(payload, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_body(fetched_at: DateTime<Utc>) -> String {
        serde_json::json!({
            "fetched_at": fetched_at,
            "records": [
                {
                    "competitor_id": "acme",
                    "product_id": "sku-2",
                    "price": 19.99,
                    "observed_at": fetched_at,
                    "confidence": 0.95
                },
                {
                    "competitor_id": "acme",
                    "product_id": "sku-1",
                    "price": 57.50,
                    "observed_at": fetched_at,
                    "confidence": 0.90
                }
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_fresh_snapshot_within_max_age() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/snapshots/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(snapshot_body(Utc::now()))
            .create_async()
            .await;

        let client = CompetitorCrawlClient::new(server.url()).unwrap();
        let age = client.fresh_snapshot(3600).await.unwrap();

        match age {
            SnapshotAge::Fresh(snapshot) => {
                assert_eq!(snapshot.records.len(), 2);
                // Records come back sorted by (product, competitor)
                assert_eq!(snapshot.records[0].product_id, "sku-1");
                assert!(!snapshot.stale);
            }
            other => panic!("expected Fresh, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_old_snapshot_classified_stale() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/snapshots/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(snapshot_body(Utc::now() - chrono::Duration::hours(12)))
            .create_async()
            .await;

        let client = CompetitorCrawlClient::new(server.url()).unwrap();
        let age = client.fresh_snapshot(21600).await.unwrap();

        match age {
            SnapshotAge::Stale(snapshot) => assert!(snapshot.stale),
            other => panic!("expected Stale, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_snapshot_returns_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/snapshots/latest")
            .with_status(404)
            .create_async()
            .await;

        let client = CompetitorCrawlClient::new(server.url()).unwrap();
        let age = client.fresh_snapshot(3600).await.unwrap();
        assert!(matches!(age, SnapshotAge::Missing));
    }

    #[tokio::test]
    async fn test_trigger_crawl_posts_targets() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/crawls")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "targets": ["acme"]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(snapshot_body(Utc::now()))
            .create_async()
            .await;

        let client = CompetitorCrawlClient::new(server.url()).unwrap();
        let snapshot = client
            .trigger_crawl(&["acme".to_string()])
            .await
            .unwrap();

        assert_eq!(snapshot.records.len(), 2);
        assert!(!snapshot.stale);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_crawl_rejection_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/crawls")
            .with_status(503)
            .create_async()
            .await;

        let client = CompetitorCrawlClient::new(server.url()).unwrap();
        let result = client.trigger_crawl(&["acme".to_string()]).await;
        assert!(result.is_err());
    }
}
