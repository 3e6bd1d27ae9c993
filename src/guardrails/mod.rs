//! Guardrail validation: pure business-rule checks with no side effects.
//!
//! A rejection is an expected outcome carried as a [`Verdict`], never an
//! error. Malformed input (missing fields, non-finite numbers) is a fatal
//! condition instead, since it means an upstream builder is broken.
//!
//! Boundary convention, applied uniformly: margin checks are strict
//! (`price > floor`; equality rejected), percent-change range checks are
//! inclusive on both ends.

use anyhow::anyhow;

use crate::config::GuardrailConfig;
use crate::error::CycleError;
use crate::models::{Opportunity, OpportunityKind};

/// Outcome of validating one opportunity
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    Reject {
        rule: &'static str,
        reason: String,
    },
}

impl Verdict {
    fn reject(rule: &'static str, reason: String) -> Self {
        Self::Reject { rule, reason }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

pub struct GuardrailValidator {
    config: GuardrailConfig,
}

impl GuardrailValidator {
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    /// Validate one opportunity. `Err` is reserved for malformed input.
    pub fn validate(&self, opportunity: &Opportunity) -> Result<Verdict, CycleError> {
        self.check_shape(opportunity)?;

        let verdict = match &opportunity.kind {
            OpportunityKind::Transfer {
                from_outlet,
                to_outlet,
                quantity,
                ..
            } => self.validate_transfer(from_outlet, to_outlet, *quantity),
            OpportunityKind::PriceChange {
                current_price,
                proposed_price,
                cost_price,
                ..
            } => self.validate_price_change(*current_price, *proposed_price, *cost_price),
            OpportunityKind::Clearance {
                clearance_price,
                cost_price,
                ..
            } => self.validate_clearance(*clearance_price, *cost_price),
        };

        Ok(verdict)
    }

    fn check_shape(&self, opportunity: &Opportunity) -> Result<(), CycleError> {
        if opportunity.product_id.trim().is_empty() {
            return Err(CycleError::Fatal(anyhow!(
                "malformed opportunity: empty product id"
            )));
        }
        if !opportunity.expected_profit_delta.is_finite()
            || !opportunity.confidence.is_finite()
        {
            return Err(CycleError::Fatal(anyhow!(
                "malformed opportunity for {}: non-finite numbers",
                opportunity.product_id
            )));
        }
        let prices_ok = match &opportunity.kind {
            OpportunityKind::Transfer { .. } => true,
            OpportunityKind::PriceChange {
                current_price,
                proposed_price,
                cost_price,
                ..
            } => {
                current_price.is_finite()
                    && proposed_price.is_finite()
                    && cost_price.is_finite()
                    && *current_price > 0.0
            }
            OpportunityKind::Clearance {
                current_price,
                clearance_price,
                cost_price,
                ..
            } => {
                current_price.is_finite() && clearance_price.is_finite() && cost_price.is_finite()
            }
        };
        if !prices_ok {
            return Err(CycleError::Fatal(anyhow!(
                "malformed opportunity for {}: invalid price fields",
                opportunity.product_id
            )));
        }
        Ok(())
    }

    fn validate_transfer(&self, from_outlet: &str, to_outlet: &str, quantity: u32) -> Verdict {
        if quantity == 0 {
            return Verdict::reject("transfer_quantity", "non-positive quantity".to_string());
        }
        if from_outlet.trim().is_empty() || to_outlet.trim().is_empty() {
            return Verdict::reject("transfer_location", "missing location".to_string());
        }
        if from_outlet == to_outlet {
            return Verdict::reject(
                "transfer_location",
                format!("source and destination are both '{}'", from_outlet),
            );
        }
        Verdict::Accept
    }

    fn validate_price_change(
        &self,
        current_price: f64,
        proposed_price: f64,
        cost_price: f64,
    ) -> Verdict {
        let change_percent = (proposed_price - current_price) / current_price * 100.0;
        let magnitude = change_percent.abs();

        if magnitude < self.config.min_price_change_percent {
            return Verdict::reject(
                "price_change_range",
                format!(
                    "{:.2}% change below the {:.2}% minimum",
                    change_percent, self.config.min_price_change_percent
                ),
            );
        }
        if magnitude > self.config.max_price_change_percent {
            return Verdict::reject(
                "price_change_range",
                format!(
                    "{:.2}% change exceeds the {:.2}% maximum",
                    change_percent, self.config.max_price_change_percent
                ),
            );
        }

        let floor = self.config.margin_floor(cost_price);
        if proposed_price <= floor {
            return Verdict::reject(
                "margin_floor",
                format!(
                    "proposed {:.2} does not clear the {:.2} margin floor",
                    proposed_price, floor
                ),
            );
        }
        Verdict::Accept
    }

    fn validate_clearance(&self, clearance_price: f64, cost_price: f64) -> Verdict {
        let floor = self.config.margin_floor(cost_price);
        if clearance_price <= floor {
            return Verdict::reject(
                "margin_floor",
                format!(
                    "clearance {:.3} does not clear the {:.2} margin floor",
                    clearance_price, floor
                ),
            );
        }
        Verdict::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn validator() -> GuardrailValidator {
        GuardrailValidator::new(GuardrailConfig::default())
    }

    fn opportunity(kind: OpportunityKind) -> Opportunity {
        Opportunity {
            product_id: "sku-1".to_string(),
            priority: Priority::Medium,
            expected_profit_delta: 100.0,
            confidence: 0.9,
            reason: "test".to_string(),
            source: "test".to_string(),
            kind,
        }
    }

    fn price_change(current: f64, proposed: f64, cost: f64) -> Opportunity {
        opportunity(OpportunityKind::PriceChange {
            current_price: current,
            proposed_price: proposed,
            cost_price: cost,
            estimated_monthly_volume: 100.0,
        })
    }

    fn transfer(from: &str, to: &str, quantity: u32) -> Opportunity {
        opportunity(OpportunityKind::Transfer {
            from_outlet: from.to_string(),
            to_outlet: to.to_string(),
            quantity,
            current_stock: 5,
        })
    }

    fn clearance(price: f64, cost: f64) -> Opportunity {
        opportunity(OpportunityKind::Clearance {
            outlet: "outlet-1".to_string(),
            current_price: price / 0.6,
            clearance_price: price,
            cost_price: cost,
            discount_percent: 40.0,
            days_without_sale: 95,
            units_on_hand: 10,
        })
    }

    #[test]
    fn test_transfer_zero_quantity_rejected() {
        let verdict = validator().validate(&transfer("warehouse", "outlet-1", 0)).unwrap();
        assert!(matches!(verdict, Verdict::Reject { rule: "transfer_quantity", .. }));
    }

    #[test]
    fn test_transfer_missing_location_rejected() {
        let verdict = validator().validate(&transfer("", "outlet-1", 10)).unwrap();
        assert!(matches!(verdict, Verdict::Reject { rule: "transfer_location", .. }));
    }

    #[test]
    fn test_transfer_same_outlet_rejected() {
        let verdict = validator().validate(&transfer("outlet-1", "outlet-1", 10)).unwrap();
        assert!(matches!(verdict, Verdict::Reject { rule: "transfer_location", .. }));
    }

    #[test]
    fn test_valid_transfer_accepted() {
        let verdict = validator().validate(&transfer("warehouse", "outlet-1", 10)).unwrap();
        assert!(verdict.is_accept());
    }

    #[test]
    fn test_price_change_within_range_accepted() {
        // +5% change, comfortably above the 16.50 floor on cost 15
        let verdict = validator().validate(&price_change(20.0, 21.0, 15.0)).unwrap();
        assert!(verdict.is_accept());
    }

    #[test]
    fn test_price_change_below_min_percent_rejected() {
        // 0.5% change, under the 1% minimum
        let verdict = validator().validate(&price_change(20.0, 20.1, 10.0)).unwrap();
        assert!(matches!(verdict, Verdict::Reject { rule: "price_change_range", .. }));
    }

    #[test]
    fn test_price_change_above_max_percent_rejected() {
        // +25% change, over the 15% maximum
        let verdict = validator().validate(&price_change(20.0, 25.0, 10.0)).unwrap();
        assert!(matches!(verdict, Verdict::Reject { rule: "price_change_range", .. }));
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        // Exactly 1% and exactly 15% both pass the range check
        let verdict = validator().validate(&price_change(100.0, 101.0, 50.0)).unwrap();
        assert!(verdict.is_accept());
        let verdict = validator().validate(&price_change(100.0, 115.0, 50.0)).unwrap();
        assert!(verdict.is_accept());
    }

    #[test]
    fn test_margin_exactly_at_floor_rejected() {
        // floor = 10 * 1.1 = 11.0; proposed exactly 11.0 must be rejected
        let verdict = validator().validate(&price_change(10.0, 11.0, 10.0)).unwrap();
        assert!(matches!(verdict, Verdict::Reject { rule: "margin_floor", .. }));
    }

    #[test]
    fn test_margin_just_above_floor_accepted() {
        let verdict = validator().validate(&price_change(10.0, 11.01, 10.0)).unwrap();
        assert!(verdict.is_accept());
    }

    #[test]
    fn test_clearance_floor_recheck() {
        // 14.994 vs floor 16.50: rejected
        let verdict = validator().validate(&clearance(14.994, 15.0)).unwrap();
        assert!(matches!(verdict, Verdict::Reject { rule: "margin_floor", .. }));

        let verdict = validator().validate(&clearance(30.0, 10.0)).unwrap();
        assert!(verdict.is_accept());
    }

    #[test]
    fn test_malformed_empty_product_is_fatal() {
        let mut opp = transfer("warehouse", "outlet-1", 10);
        opp.product_id = " ".to_string();
        let err = validator().validate(&opp).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_malformed_nan_price_is_fatal() {
        let opp = price_change(20.0, f64::NAN, 10.0);
        let err = validator().validate(&opp).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_rejection_reason_is_human_readable() {
        let verdict = validator().validate(&price_change(10.0, 11.0, 10.0)).unwrap();
        match verdict {
            Verdict::Reject { reason, .. } => {
                assert!(reason.contains("margin floor"));
            }
            Verdict::Accept => panic!("expected rejection"),
        }
    }
}
