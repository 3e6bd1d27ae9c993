//! Decision matrix builder: merges velocity, inventory, and competitive
//! signals into the three ranked opportunity lists.

pub mod clearance;
pub mod pricing;
pub mod transfer;

use crate::analyzer::PriceGap;
use crate::config::OptimizerConfig;
use crate::models::{MarketSignals, Opportunity};

/// Ranked opportunity lists for one cycle
#[derive(Debug, Clone, Default)]
pub struct DecisionMatrix {
    pub transfers: Vec<Opportunity>,
    pub price_changes: Vec<Opportunity>,
    pub clearances: Vec<Opportunity>,
}

impl DecisionMatrix {
    pub fn total_identified(&self) -> usize {
        self.transfers.len() + self.price_changes.len() + self.clearances.len()
    }
}

/// Build all three lists. Each is ranked by the shared rule (priority desc,
/// |profit delta| desc, product id asc); building twice from the same
/// snapshot yields identical, identically-ordered lists.
pub fn build(
    signals: &MarketSignals,
    gaps: &[PriceGap],
    config: &OptimizerConfig,
) -> DecisionMatrix {
    let mut matrix = DecisionMatrix {
        transfers: transfer::build(signals, config),
        price_changes: pricing::build(gaps, signals, config),
        clearances: clearance::build(signals, config),
    };

    Opportunity::sort_ranked(&mut matrix.transfers);
    Opportunity::sort_ranked(&mut matrix.price_changes);
    Opportunity::sort_ranked(&mut matrix.clearances);
    matrix
}
