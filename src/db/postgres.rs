use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

use crate::cycle::{ActionCounters, CycleResult};
use crate::providers::RunHistoryStore;

/// Postgres-backed run history. Counter blocks are stored as JSONB so the
/// schema does not need a column per counter.
pub struct PostgresRunHistory {
    pool: PgPool,
}

impl PostgresRunHistory {
    /// Connect to Postgres and run pending migrations
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        tracing::info!("Connected to Postgres run history");

        Ok(Self { pool })
    }

    fn counters_from(value: serde_json::Value) -> Result<ActionCounters> {
        serde_json::from_value(value).context("corrupt counter block in cycle_results")
    }

    /// Delete all rows (testing only)
    #[cfg(test)]
    pub async fn clear_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM cycle_results")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RunHistoryStore for PostgresRunHistory {
    async fn persist(&self, result: &CycleResult) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO cycle_results (
                id, run_id, started_at, finished_at,
                transfers, price_changes, clearances,
                estimated_profit_delta, realized_profit_delta,
                signals_degraded, notes, next_sleep_secs
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(id)
        .bind(result.run_id as i64)
        .bind(result.started_at)
        .bind(result.finished_at)
        .bind(serde_json::to_value(result.transfers)?)
        .bind(serde_json::to_value(result.price_changes)?)
        .bind(serde_json::to_value(result.clearances)?)
        .bind(result.estimated_profit_delta)
        .bind(result.realized_profit_delta)
        .bind(result.signals_degraded)
        .bind(&result.notes)
        .bind(result.next_sleep_secs as i64)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Archived cycle {} as {}", result.run_id, id);

        Ok(id)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<CycleResult>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, started_at, finished_at,
                   transfers, price_changes, clearances,
                   estimated_profit_delta, realized_profit_delta,
                   signals_degraded, notes, next_sleep_secs
            FROM cycle_results
            ORDER BY started_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let run_id: i64 = row.get("run_id");
            let started_at: DateTime<Utc> = row.get("started_at");
            let finished_at: DateTime<Utc> = row.get("finished_at");
            let transfers: serde_json::Value = row.get("transfers");
            let price_changes: serde_json::Value = row.get("price_changes");
            let clearances: serde_json::Value = row.get("clearances");
            let estimated_profit_delta: f64 = row.get("estimated_profit_delta");
            let realized_profit_delta: f64 = row.get("realized_profit_delta");
            let signals_degraded: bool = row.get("signals_degraded");
            let notes: Vec<String> = row.get("notes");
            let next_sleep_secs: i64 = row.get("next_sleep_secs");

            results.push(CycleResult {
                run_id: run_id as u64,
                started_at,
                finished_at,
                transfers: Self::counters_from(transfers)?,
                price_changes: Self::counters_from(price_changes)?,
                clearances: Self::counters_from(clearances)?,
                estimated_profit_delta,
                realized_profit_delta,
                signals_degraded,
                notes,
                next_sleep_secs: next_sleep_secs.max(0) as u64,
            });
        }

        Ok(results)
    }
}
