//! Profit impact aggregation across one cycle.
//!
//! Estimated impact sums every identified opportunity; realized impact sums
//! only what actually executed. Within a cycle the expected delta stands in
//! for the realized figure, since sell-through lags the action.

use crate::models::Opportunity;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProfitImpact {
    pub estimated: f64,
    pub realized: f64,
}

#[derive(Debug, Default)]
pub struct ProfitImpactAggregator {
    totals: ProfitImpact,
}

impl ProfitImpactAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_identified(&mut self, opportunity: &Opportunity) {
        self.totals.estimated += opportunity.expected_profit_delta;
    }

    pub fn record_executed(&mut self, opportunity: &Opportunity) {
        self.totals.realized += opportunity.expected_profit_delta;
    }

    pub fn totals(&self) -> ProfitImpact {
        self.totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OpportunityKind, Priority};

    fn opportunity(delta: f64) -> Opportunity {
        Opportunity {
            product_id: "sku-1".to_string(),
            priority: Priority::Medium,
            expected_profit_delta: delta,
            confidence: 0.9,
            reason: "test".to_string(),
            source: "test".to_string(),
            kind: OpportunityKind::Transfer {
                from_outlet: "warehouse".to_string(),
                to_outlet: "outlet-1".to_string(),
                quantity: 10,
                current_stock: 2,
            },
        }
    }

    #[test]
    fn test_estimated_counts_all_identified() {
        let mut aggregator = ProfitImpactAggregator::new();
        aggregator.record_identified(&opportunity(100.0));
        aggregator.record_identified(&opportunity(-40.0));

        let totals = aggregator.totals();
        assert!((totals.estimated - 60.0).abs() < 1e-9);
        assert_eq!(totals.realized, 0.0);
    }

    #[test]
    fn test_realized_counts_only_executed() {
        let mut aggregator = ProfitImpactAggregator::new();
        let a = opportunity(100.0);
        let b = opportunity(50.0);
        aggregator.record_identified(&a);
        aggregator.record_identified(&b);
        aggregator.record_executed(&a);

        let totals = aggregator.totals();
        assert!((totals.estimated - 150.0).abs() < 1e-9);
        assert!((totals.realized - 100.0).abs() < 1e-9);
    }
}
