//! Competitive analyzer: classifies price gaps between our products and
//! mapped competitor products. All classification is pure and uses fixed
//! thresholds so it can be tested against the literal boundaries.

use serde::{Deserialize, Serialize};

use crate::models::{CompetitorSnapshot, InventorySnapshot};

/// Confidence multiplier applied when the competitor dataset is stale
const STALE_CONFIDENCE_FACTOR: f64 = 0.8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GapSeverity {
    Medium,
    High,
}

/// Classification of one price gap
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GapClass {
    /// We are more expensive than the competitor
    Threat(GapSeverity),
    /// We are cheaper than the competitor, room to move up
    Opportunity(GapSeverity),
    Neutral,
}

/// Where our price sits relative to the market
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketPosition {
    Premium,
    AboveMarket,
    Competitive,
    BelowMarket,
    Discount,
}

/// One analyzed (our product, competitor product) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceGap {
    pub product_id: String,
    pub competitor_id: String,
    pub our_price: f64,
    pub competitor_price: f64,
    pub diff_percent: f64,
    pub class: GapClass,
    pub position: MarketPosition,
    pub confidence: f64,
}

/// Classify a price gap percentage.
///
/// `diff_percent = (our - competitor) / our * 100`. Positive means we are
/// more expensive.
pub fn classify(diff_percent: f64) -> GapClass {
    if diff_percent > 10.0 {
        if diff_percent > 20.0 {
            GapClass::Threat(GapSeverity::High)
        } else {
            GapClass::Threat(GapSeverity::Medium)
        }
    } else if diff_percent < -5.0 {
        if diff_percent < -15.0 {
            GapClass::Opportunity(GapSeverity::High)
        } else {
            GapClass::Opportunity(GapSeverity::Medium)
        }
    } else {
        GapClass::Neutral
    }
}

/// Band our market position from the same gap percentage
pub fn market_position(diff_percent: f64) -> MarketPosition {
    if diff_percent > 20.0 {
        MarketPosition::Premium
    } else if diff_percent > 5.0 {
        MarketPosition::AboveMarket
    } else if diff_percent > -5.0 {
        MarketPosition::Competitive
    } else if diff_percent > -20.0 {
        MarketPosition::BelowMarket
    } else {
        MarketPosition::Discount
    }
}

/// Analyze every competitor record that maps to a product we price.
///
/// Records for unknown products are skipped (no confirmed identity mapping
/// means no signal). Output order follows (product_id, competitor_id) so the
/// result is deterministic regardless of snapshot ordering.
pub fn analyze(inventory: &InventorySnapshot, competitor: &CompetitorSnapshot) -> Vec<PriceGap> {
    let mut gaps: Vec<PriceGap> = competitor
        .records
        .iter()
        .filter_map(|record| {
            let economics = inventory.products.get(&record.product_id)?;
            if economics.price <= 0.0 || record.price <= 0.0 {
                return None;
            }

            let diff_percent = (economics.price - record.price) / economics.price * 100.0;
            let confidence = if competitor.stale {
                record.confidence * STALE_CONFIDENCE_FACTOR
            } else {
                record.confidence
            };

            Some(PriceGap {
                product_id: record.product_id.clone(),
                competitor_id: record.competitor_id.clone(),
                our_price: economics.price,
                competitor_price: record.price,
                diff_percent,
                class: classify(diff_percent),
                position: market_position(diff_percent),
                confidence,
            })
        })
        .collect();

    gaps.sort_by(|a, b| {
        a.product_id
            .cmp(&b.product_id)
            .then_with(|| a.competitor_id.cmp(&b.competitor_id))
    });
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompetitorPriceRecord, ProductEconomics};
    use chrono::Utc;

    #[test]
    fn test_classify_threat_boundaries() {
        assert_eq!(classify(10.0001), GapClass::Threat(GapSeverity::Medium));
        assert_eq!(classify(20.0001), GapClass::Threat(GapSeverity::High));
        // Exactly on the boundary stays on the lower side
        assert_eq!(classify(10.0), GapClass::Neutral);
        assert_eq!(classify(20.0), GapClass::Threat(GapSeverity::Medium));
    }

    #[test]
    fn test_classify_opportunity_boundaries() {
        assert_eq!(classify(-5.0001), GapClass::Opportunity(GapSeverity::Medium));
        assert_eq!(classify(-15.0001), GapClass::Opportunity(GapSeverity::High));
        assert_eq!(classify(-5.0), GapClass::Neutral);
        assert_eq!(classify(-15.0), GapClass::Opportunity(GapSeverity::Medium));
    }

    #[test]
    fn test_classify_neutral_band() {
        assert_eq!(classify(0.0), GapClass::Neutral);
        assert_eq!(classify(7.5), GapClass::Neutral);
        assert_eq!(classify(-3.0), GapClass::Neutral);
    }

    #[test]
    fn test_market_position_bands() {
        assert_eq!(market_position(25.0), MarketPosition::Premium);
        assert_eq!(market_position(12.0), MarketPosition::AboveMarket);
        assert_eq!(market_position(0.0), MarketPosition::Competitive);
        assert_eq!(market_position(-12.0), MarketPosition::BelowMarket);
        assert_eq!(market_position(-30.0), MarketPosition::Discount);
    }

    fn snapshot_with(records: Vec<CompetitorPriceRecord>) -> CompetitorSnapshot {
        CompetitorSnapshot {
            records,
            fetched_at: Some(Utc::now()),
            stale: false,
            reason: None,
        }
    }

    fn record(competitor: &str, product: &str, price: f64) -> CompetitorPriceRecord {
        CompetitorPriceRecord {
            competitor_id: competitor.to_string(),
            product_id: product.to_string(),
            price,
            observed_at: Utc::now(),
            confidence: 0.9,
        }
    }

    fn inventory_with_price(product: &str, price: f64) -> InventorySnapshot {
        let mut inventory = InventorySnapshot::default();
        inventory.products.insert(
            product.to_string(),
            ProductEconomics {
                price,
                cost_price: price * 0.6,
                estimated_monthly_volume: 100.0,
            },
        );
        inventory
    }

    #[test]
    fn test_analyze_scenario_from_sales_floor() {
        // our 65.00 vs competitor 57.50 -> ~11.54% -> medium threat
        let inventory = inventory_with_price("sku-1", 65.0);
        let competitor = snapshot_with(vec![record("acme", "sku-1", 57.5)]);

        let gaps = analyze(&inventory, &competitor);
        assert_eq!(gaps.len(), 1);
        assert!((gaps[0].diff_percent - 11.538).abs() < 0.01);
        assert_eq!(gaps[0].class, GapClass::Threat(GapSeverity::Medium));
        assert_eq!(gaps[0].position, MarketPosition::AboveMarket);
    }

    #[test]
    fn test_analyze_skips_unmapped_products() {
        let inventory = inventory_with_price("sku-1", 65.0);
        let competitor = snapshot_with(vec![
            record("acme", "sku-1", 57.5),
            record("acme", "unknown-sku", 10.0),
        ]);

        let gaps = analyze(&inventory, &competitor);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].product_id, "sku-1");
    }

    #[test]
    fn test_analyze_reduces_confidence_when_stale() {
        let inventory = inventory_with_price("sku-1", 65.0);
        let mut competitor = snapshot_with(vec![record("acme", "sku-1", 57.5)]);
        competitor.stale = true;

        let gaps = analyze(&inventory, &competitor);
        assert!((gaps[0].confidence - 0.72).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_is_order_independent() {
        let inventory = {
            let mut inv = inventory_with_price("sku-a", 50.0);
            inv.products.insert(
                "sku-b".to_string(),
                ProductEconomics {
                    price: 30.0,
                    cost_price: 18.0,
                    estimated_monthly_volume: 50.0,
                },
            );
            inv
        };

        let forward = snapshot_with(vec![
            record("acme", "sku-a", 40.0),
            record("zenith", "sku-b", 35.0),
        ]);
        let reversed = snapshot_with(vec![
            record("zenith", "sku-b", 35.0),
            record("acme", "sku-a", 40.0),
        ]);

        let a = analyze(&inventory, &forward);
        let b = analyze(&inventory, &reversed);
        let ids_a: Vec<_> = a.iter().map(|g| g.product_id.clone()).collect();
        let ids_b: Vec<_> = b.iter().map(|g| g.product_id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_analyze_ignores_non_positive_prices() {
        let inventory = inventory_with_price("sku-1", 0.0);
        let competitor = snapshot_with(vec![record("acme", "sku-1", 10.0)]);
        assert!(analyze(&inventory, &competitor).is_empty());
    }
}
