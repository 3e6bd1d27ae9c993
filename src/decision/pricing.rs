//! Pricing opportunities from competitive gap classifications.
//!
//! Where we undercut the market, move up to just below the competitor; where
//! a high threat exists, come down to just above the competitor as long as
//! the margin floor holds. Medium threats and neutral gaps produce nothing.

use crate::analyzer::{GapClass, GapSeverity, PriceGap};
use crate::config::OptimizerConfig;
use crate::models::{MarketSignals, Opportunity, OpportunityKind, Priority};

/// Raise toward the competitor but keep a small undercut
const UNDERCUT_FACTOR: f64 = 0.95;
/// Defensive cut lands slightly above the competitor
const DEFEND_FACTOR: f64 = 1.02;

pub fn build(
    gaps: &[PriceGap],
    signals: &MarketSignals,
    config: &OptimizerConfig,
) -> Vec<Opportunity> {
    let mut opportunities: Vec<Opportunity> = gaps
        .iter()
        .filter_map(|gap| candidate_for(gap, signals, config))
        .collect();

    // Several competitors can flag the same product; keep only the
    // strongest candidate per product.
    Opportunity::sort_ranked(&mut opportunities);
    let mut seen = std::collections::HashSet::new();
    opportunities.retain(|o| seen.insert(o.product_id.clone()));
    opportunities
}

fn candidate_for(
    gap: &PriceGap,
    signals: &MarketSignals,
    config: &OptimizerConfig,
) -> Option<Opportunity> {
    let economics = signals.inventory.products.get(&gap.product_id)?;

    let (proposed_price, priority, narrative) = match gap.class {
        GapClass::Opportunity(severity) => {
            let proposed = gap.competitor_price * UNDERCUT_FACTOR;
            if proposed <= gap.our_price {
                // Already at or above the undercut point, nothing to gain
                return None;
            }
            let priority = match severity {
                GapSeverity::High => Priority::High,
                GapSeverity::Medium => Priority::Medium,
            };
            (
                proposed,
                priority,
                format!(
                    "{:.1}% under {}, raising toward market",
                    gap.diff_percent.abs(),
                    gap.competitor_id
                ),
            )
        }
        GapClass::Threat(GapSeverity::High) => {
            let proposed = gap.competitor_price * DEFEND_FACTOR;
            if proposed <= config.guardrails.margin_floor(economics.cost_price) {
                // Cannot defend without breaking the margin floor
                return None;
            }
            (
                proposed,
                Priority::High,
                format!(
                    "{:.1}% over {}, defending share",
                    gap.diff_percent, gap.competitor_id
                ),
            )
        }
        GapClass::Threat(GapSeverity::Medium) | GapClass::Neutral => return None,
    };

    let expected_profit_delta =
        (proposed_price - gap.our_price) * economics.estimated_monthly_volume;

    // Only upward moves must clear the minimum profit threshold. Share-
    // defending cuts carry a negative delta and pass through.
    if expected_profit_delta > 0.0
        && expected_profit_delta <= config.guardrails.min_profit_increase_threshold
    {
        return None;
    }

    Some(Opportunity {
        product_id: gap.product_id.clone(),
        priority,
        expected_profit_delta,
        confidence: gap.confidence,
        reason: narrative,
        source: format!("competitor:{}", gap.competitor_id),
        kind: OpportunityKind::PriceChange {
            current_price: gap.our_price,
            proposed_price,
            cost_price: economics.cost_price,
            estimated_monthly_volume: economics.estimated_monthly_volume,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{classify, market_position};
    use crate::models::{InventorySnapshot, ProductEconomics};

    fn gap(product: &str, our: f64, competitor: f64, confidence: f64) -> PriceGap {
        let diff = (our - competitor) / our * 100.0;
        PriceGap {
            product_id: product.to_string(),
            competitor_id: "acme".to_string(),
            our_price: our,
            competitor_price: competitor,
            diff_percent: diff,
            class: classify(diff),
            position: market_position(diff),
            confidence,
        }
    }

    fn signals_with_economics(product: &str, price: f64, cost: f64, volume: f64) -> MarketSignals {
        let mut signals = MarketSignals::default();
        let mut inventory = InventorySnapshot::default();
        inventory.products.insert(
            product.to_string(),
            ProductEconomics {
                price,
                cost_price: cost,
                estimated_monthly_volume: volume,
            },
        );
        signals.inventory = inventory;
        signals
    }

    #[test]
    fn test_underpriced_product_moves_up() {
        let config = OptimizerConfig::default();
        // our 20 vs competitor 25 -> -25% -> high opportunity
        let signals = signals_with_economics("sku-1", 20.0, 12.0, 150.0);
        let gaps = vec![gap("sku-1", 20.0, 25.0, 0.9)];

        let opportunities = build(&gaps, &signals, &config);
        assert_eq!(opportunities.len(), 1);
        let opp = &opportunities[0];
        assert_eq!(opp.priority, Priority::High);
        match &opp.kind {
            OpportunityKind::PriceChange { proposed_price, .. } => {
                assert!((proposed_price - 23.75).abs() < 1e-9); // 25 * 0.95
            }
            other => panic!("expected price change, got {:?}", other),
        }
        // (23.75 - 20) * 150 = 562.5
        assert!((opp.expected_profit_delta - 562.5).abs() < 1e-9);
    }

    #[test]
    fn test_high_threat_defends_above_floor() {
        let config = OptimizerConfig::default();
        // our 30 vs competitor 22 -> +26.7% -> high threat
        // proposed 22.44, floor = 15 * 1.1 = 16.5 -> allowed
        let signals = signals_with_economics("sku-1", 30.0, 15.0, 100.0);
        let gaps = vec![gap("sku-1", 30.0, 22.0, 0.8)];

        let opportunities = build(&gaps, &signals, &config);
        assert_eq!(opportunities.len(), 1);
        match &opportunities[0].kind {
            OpportunityKind::PriceChange { proposed_price, .. } => {
                assert!((proposed_price - 22.44).abs() < 1e-9);
            }
            other => panic!("expected price change, got {:?}", other),
        }
        assert!(opportunities[0].expected_profit_delta < 0.0);
    }

    #[test]
    fn test_high_threat_blocked_by_margin_floor() {
        let config = OptimizerConfig::default();
        // proposed = 22 * 1.02 = 22.44, floor = 21 * 1.1 = 23.1 -> blocked
        let signals = signals_with_economics("sku-1", 30.0, 21.0, 100.0);
        let gaps = vec![gap("sku-1", 30.0, 22.0, 0.8)];

        assert!(build(&gaps, &signals, &config).is_empty());
    }

    #[test]
    fn test_medium_threat_produces_nothing() {
        let config = OptimizerConfig::default();
        // our 65 vs competitor 57.5 -> ~11.5% -> medium threat, no action
        let signals = signals_with_economics("sku-1", 65.0, 40.0, 100.0);
        let gaps = vec![gap("sku-1", 65.0, 57.5, 0.9)];

        assert!(build(&gaps, &signals, &config).is_empty());
    }

    #[test]
    fn test_small_gain_below_threshold_not_emitted() {
        let config = OptimizerConfig::default();
        // our 10 vs competitor 11.2 -> -12% -> medium opportunity
        // proposed 10.64, delta = 0.64 * 10 = 6.4, under the $50 threshold
        let signals = signals_with_economics("sku-1", 10.0, 6.0, 10.0);
        let gaps = vec![gap("sku-1", 10.0, 11.2, 0.9)];

        assert!(build(&gaps, &signals, &config).is_empty());
    }

    #[test]
    fn test_one_candidate_per_product() {
        let config = OptimizerConfig::default();
        let signals = signals_with_economics("sku-1", 20.0, 12.0, 150.0);
        let mut second = gap("sku-1", 20.0, 24.0, 0.9);
        second.competitor_id = "zenith".to_string();
        let gaps = vec![gap("sku-1", 20.0, 25.0, 0.9), second];

        let opportunities = build(&gaps, &signals, &config);
        assert_eq!(opportunities.len(), 1);
        // The larger move wins the ranking
        assert_eq!(opportunities[0].source, "competitor:acme");
    }
}
