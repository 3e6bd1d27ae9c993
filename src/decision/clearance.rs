//! Clearance opportunities: progressive discounts for stock that has sat
//! idle or piled up at an outlet, never below the margin floor.

use crate::config::OptimizerConfig;
use crate::models::{MarketSignals, Opportunity, OpportunityKind, Priority};

/// Discount tier for a clearance candidate, in percent off current price
pub fn discount_percent(days_without_sale: u32, overstocked: bool) -> f64 {
    match days_without_sale {
        d if d >= 90 => 40.0,
        d if d >= 60 => 30.0,
        d if d >= 30 => 20.0,
        d if d >= 14 => 15.0,
        _ if overstocked => 10.0,
        _ => 5.0,
    }
}

pub fn build(signals: &MarketSignals, config: &OptimizerConfig) -> Vec<Opportunity> {
    let mut positions: Vec<(&(String, String), &crate::models::OutletStock)> =
        signals.inventory.outlets.iter().collect();
    positions.sort_by(|a, b| a.0.cmp(b.0));

    let mut opportunities = Vec::new();

    for ((outlet_id, product_id), stock) in positions {
        if stock.on_hand == 0 {
            continue;
        }
        let overstocked = stock.on_hand > config.overstock_units;
        let idle = stock.days_without_sale >= 14;
        if !idle && !overstocked {
            continue;
        }

        let Some(economics) = signals.inventory.products.get(product_id) else {
            continue;
        };

        let discount = discount_percent(stock.days_without_sale, overstocked);
        let clearance_price = economics.price * (1.0 - discount / 100.0);

        // Margin floor is strict: equality is not good enough
        if clearance_price <= config.guardrails.margin_floor(economics.cost_price) {
            continue;
        }

        let priority = match discount {
            d if d >= 40.0 => Priority::High,
            d if d >= 30.0 => Priority::Medium,
            _ => Priority::Low,
        };

        let (source, confidence) = if idle {
            ("inventory:idle", 0.85)
        } else {
            ("inventory:overstock", 0.7)
        };

        opportunities.push(Opportunity {
            product_id: product_id.clone(),
            priority,
            // Gross margin recovered by moving stock that is otherwise dead
            expected_profit_delta: (clearance_price - economics.cost_price)
                * stock.on_hand as f64,
            confidence,
            reason: format!(
                "{} days without sale, {} on hand at {}, {:.0}% off",
                stock.days_without_sale, stock.on_hand, outlet_id, discount
            ),
            source: source.to_string(),
            kind: OpportunityKind::Clearance {
                outlet: outlet_id.clone(),
                current_price: economics.price,
                clearance_price,
                cost_price: economics.cost_price,
                discount_percent: discount,
                days_without_sale: stock.days_without_sale,
                units_on_hand: stock.on_hand,
            },
        });
    }

    opportunities
}
