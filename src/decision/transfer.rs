//! Transfer opportunities: fast-moving products whose outlet stock covers
//! fewer than `target_days` of sales get a warehouse replenishment.

use crate::config::OptimizerConfig;
use crate::models::{MarketSignals, Opportunity, OpportunityKind, Priority, Trend};

pub fn build(signals: &MarketSignals, config: &OptimizerConfig) -> Vec<Opportunity> {
    // Fix iteration order up front; the final rank sort is stable, so full
    // ties keep this order and the output is deterministic.
    let mut positions: Vec<(&(String, String), &crate::models::OutletStock)> =
        signals.inventory.outlets.iter().collect();
    positions.sort_by(|a, b| a.0.cmp(b.0));

    let mut opportunities = Vec::new();

    for ((outlet_id, product_id), stock) in positions {
        let Some(velocity) = signals.velocities.get(product_id) else {
            continue;
        };
        if velocity.daily_units < config.velocity_threshold {
            continue;
        }

        let target_units = (velocity.daily_units * config.target_days as f64).ceil() as i64;
        let need = target_units - stock.on_hand as i64;
        if need <= 0 {
            // Already at or above target cover
            continue;
        }

        let warehouse_stock = signals.inventory.warehouse_stock_for(product_id);
        let cap = (warehouse_stock as f64 * config.guardrails.max_transfer_fraction_of_warehouse)
            .floor() as i64;
        let quantity = need.min(cap);
        if quantity <= 0 {
            continue;
        }

        let cover_days = stock.on_hand as f64 / velocity.daily_units;
        let priority = if cover_days < config.target_days as f64 / 2.0 {
            Priority::High
        } else {
            Priority::Medium
        };

        let unit_margin = signals
            .inventory
            .products
            .get(product_id)
            .map(|e| e.price - e.cost_price)
            .unwrap_or(0.0);

        opportunities.push(Opportunity {
            product_id: product_id.clone(),
            priority,
            expected_profit_delta: quantity as f64 * unit_margin,
            confidence: trend_confidence(velocity.trend),
            reason: format!(
                "{:.1} days of cover at {:.1}/day, target {} days",
                cover_days, velocity.daily_units, config.target_days
            ),
            source: "velocity".to_string(),
            kind: OpportunityKind::Transfer {
                from_outlet: config.warehouse_outlet.clone(),
                to_outlet: outlet_id.clone(),
                quantity: quantity as u32,
                current_stock: stock.on_hand,
            },
        });
    }

    opportunities
}

fn trend_confidence(trend: Trend) -> f64 {
    match trend {
        Trend::Rising => 0.9,
        Trend::Flat => 0.8,
        Trend::Falling => 0.6,
    }
}
