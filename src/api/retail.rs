//! Client for the internal retail operations API.
//!
//! One client backs four ports: sales signals, inventory, transfer
//! execution, and pricing execution. Reads are retried with backoff;
//! mutations are sent exactly once because the ops API does not
//! deduplicate repeated transfer or price requests.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::{
    InventorySnapshot, OutletStock, ProductEconomics, ProductVelocity, SeasonalTrend,
    StorePerformance,
};
use crate::providers::{
    InventoryProvider, PricingExecutionService, SalesSignalProvider, TransferExecutionService,
};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Clone)]
pub struct RetailOpsClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PositionPayload {
    outlet_id: String,
    product_id: String,
    on_hand: u32,
    reorder_point: u32,
    days_without_sale: u32,
}

#[derive(Debug, Deserialize)]
struct WarehousePayload {
    product_id: String,
    units: u32,
}

#[derive(Debug, Deserialize)]
struct EconomicsPayload {
    product_id: String,
    price: f64,
    cost_price: f64,
    estimated_monthly_volume: f64,
}

#[derive(Debug, Deserialize)]
struct InventoryPayload {
    positions: Vec<PositionPayload>,
    warehouse: Vec<WarehousePayload>,
    products: Vec<EconomicsPayload>,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    product_id: &'a str,
    from_outlet: &'a str,
    to_outlet: &'a str,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct PriceRequest {
    price: f64,
}

impl RetailOpsClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<T>()
                        .await
                        .with_context(|| format!("malformed response from {}", path));
                }
                Ok(response) => {
                    let status = response.status();
                    if !status.is_server_error() && status.as_u16() != 429 {
                        return Err(anyhow!("retail ops API returned {} for {}", status, path));
                    }
                    last_error = Some(anyhow!("retail ops API returned {} for {}", status, path));
                }
                Err(e) => {
                    last_error = Some(anyhow::Error::new(e).context("retail ops API unreachable"));
                }
            }

            if attempt < MAX_RETRIES {
                let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
                tracing::warn!(
                    "GET {} failed, retrying in {}ms (attempt {}/{})",
                    path,
                    backoff_ms,
                    attempt,
                    MAX_RETRIES
                );
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("all retry attempts failed for {}", path)))
    }

    async fn send_mutation(&self, request: reqwest::RequestBuilder, what: &str) -> Result<()> {
        let response = request
            .send()
            .await
            .with_context(|| format!("retail ops API unreachable for {}", what))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(anyhow!("{} rejected with {}: {}", what, status, detail))
    }
}

#[async_trait]
impl SalesSignalProvider for RetailOpsClient {
    async fn velocity_for(&self, product_id: &str, window_days: u32) -> Result<ProductVelocity> {
        self.get_json(&format!(
            "/sales/velocity/{}?window_days={}",
            product_id, window_days
        ))
        .await
    }

    async fn velocities(&self, window_days: u32) -> Result<HashMap<String, ProductVelocity>> {
        let list: Vec<ProductVelocity> = self
            .get_json(&format!("/sales/velocity?window_days={}", window_days))
            .await?;
        Ok(list
            .into_iter()
            .map(|v| (v.product_id.clone(), v))
            .collect())
    }

    async fn seasonal_trends(&self, window_days: u32) -> Result<Vec<SeasonalTrend>> {
        self.get_json(&format!("/sales/seasonal?window_days={}", window_days))
            .await
    }

    async fn store_performance(&self) -> Result<Vec<StorePerformance>> {
        self.get_json("/sales/performance").await
    }
}

#[async_trait]
impl InventoryProvider for RetailOpsClient {
    async fn stock_for(&self, outlet_id: &str, product_id: &str) -> Result<u32> {
        let position: PositionPayload = self
            .get_json(&format!(
                "/inventory/outlets/{}/products/{}",
                outlet_id, product_id
            ))
            .await?;
        Ok(position.on_hand)
    }

    async fn warehouse_stock_for(&self, product_id: &str) -> Result<u32> {
        let entry: WarehousePayload = self
            .get_json(&format!("/inventory/warehouse/{}", product_id))
            .await?;
        Ok(entry.units)
    }

    async fn snapshot(&self) -> Result<InventorySnapshot> {
        let payload: InventoryPayload = self.get_json("/inventory/snapshot").await?;

        let mut snapshot = InventorySnapshot::default();
        for position in payload.positions {
            snapshot.outlets.insert(
                (position.outlet_id, position.product_id),
                OutletStock {
                    on_hand: position.on_hand,
                    reorder_point: position.reorder_point,
                    days_without_sale: position.days_without_sale,
                },
            );
        }
        for entry in payload.warehouse {
            snapshot.warehouse.insert(entry.product_id, entry.units);
        }
        for econ in payload.products {
            snapshot.products.insert(
                econ.product_id,
                ProductEconomics {
                    price: econ.price,
                    cost_price: econ.cost_price,
                    estimated_monthly_volume: econ.estimated_monthly_volume,
                },
            );
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl TransferExecutionService for RetailOpsClient {
    async fn execute(
        &self,
        product_id: &str,
        from_outlet: &str,
        to_outlet: &str,
        quantity: u32,
    ) -> Result<()> {
        let url = format!("{}/transfers", self.base_url);
        let body = TransferRequest {
            product_id,
            from_outlet,
            to_outlet,
            quantity,
        };
        self.send_mutation(self.client.post(&url).json(&body), "transfer")
            .await
    }
}

#[async_trait]
impl PricingExecutionService for RetailOpsClient {
    async fn set_price(&self, product_id: &str, new_price: f64) -> Result<()> {
        let url = format!("{}/products/{}/price", self.base_url, product_id);
        self.send_mutation(
            self.client.put(&url).json(&PriceRequest { price: new_price }),
            "price change",
        )
        .await
    }
}
