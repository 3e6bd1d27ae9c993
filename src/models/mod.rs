use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action urgency. Ordering matters: ranked lists sort High first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Direction of a sales-velocity trend over the trailing window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Flat,
    Falling,
}

/// Average units sold per day for one product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductVelocity {
    pub product_id: String,
    pub daily_units: f64,
    pub trend: Trend,
}

/// One observed competitor price, with a confirmed identity mapping
/// to one of our products
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetitorPriceRecord {
    pub competitor_id: String,
    pub product_id: String,
    pub price: f64,
    pub observed_at: DateTime<Utc>,
    pub confidence: f64,
}

/// Competitor dataset for one run.
///
/// An empty snapshot means "no competitive signal", never an error; the
/// `reason` carries the diagnostic for the cycle summary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompetitorSnapshot {
    pub records: Vec<CompetitorPriceRecord>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub reason: Option<String>,
}

impl CompetitorSnapshot {
    pub fn empty(reason: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            fetched_at: None,
            stale: false,
            reason: Some(reason.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Stock position of one product at one outlet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct OutletStock {
    pub on_hand: u32,
    pub reorder_point: u32,
    pub days_without_sale: u32,
}

/// Pricing economics of one product (chain-wide)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProductEconomics {
    pub price: f64,
    pub cost_price: f64,
    pub estimated_monthly_volume: f64,
}

/// Inventory state across outlets and the warehouse for one run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InventorySnapshot {
    /// (outlet_id, product_id) -> stock position
    pub outlets: HashMap<(String, String), OutletStock>,
    /// product_id -> warehouse units
    pub warehouse: HashMap<String, u32>,
    /// product_id -> economics
    pub products: HashMap<String, ProductEconomics>,
}

impl InventorySnapshot {
    pub fn stock_for(&self, outlet_id: &str, product_id: &str) -> Option<OutletStock> {
        self.outlets
            .get(&(outlet_id.to_string(), product_id.to_string()))
            .copied()
    }

    pub fn warehouse_stock_for(&self, product_id: &str) -> u32 {
        self.warehouse.get(product_id).copied().unwrap_or(0)
    }
}

/// Seasonal sales pattern over a trailing window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalTrend {
    pub label: String,
    pub change_percent: f64,
}

/// Revenue summary for one outlet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorePerformance {
    pub outlet_id: String,
    pub revenue: f64,
    pub units_sold: u64,
}

/// Everything the decision matrix needs for one cycle
#[derive(Debug, Clone, Default)]
pub struct MarketSignals {
    pub velocities: HashMap<String, ProductVelocity>,
    pub inventory: InventorySnapshot,
    pub competitor: CompetitorSnapshot,
    /// Diagnostics for degraded sources (stale data, provider down)
    pub notes: Vec<String>,
}

impl MarketSignals {
    pub fn degraded(&self) -> bool {
        !self.notes.is_empty() || self.competitor.stale
    }
}

/// A candidate action pending guardrail validation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Opportunity {
    pub product_id: String,
    pub priority: Priority,
    pub expected_profit_delta: f64,
    /// [0, 1]
    pub confidence: f64,
    pub reason: String,
    /// Which signal produced this candidate (e.g. "velocity", "competitor:acme")
    pub source: String,
    pub kind: OpportunityKind,
}

/// Closed set of action types. Validator and executors match exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OpportunityKind {
    Transfer {
        from_outlet: String,
        to_outlet: String,
        quantity: u32,
        current_stock: u32,
    },
    PriceChange {
        current_price: f64,
        proposed_price: f64,
        cost_price: f64,
        estimated_monthly_volume: f64,
    },
    Clearance {
        outlet: String,
        current_price: f64,
        clearance_price: f64,
        cost_price: f64,
        discount_percent: f64,
        days_without_sale: u32,
        units_on_hand: u32,
    },
}

impl OpportunityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::PriceChange { .. } => "price_change",
            Self::Clearance { .. } => "clearance",
        }
    }
}

impl Opportunity {
    /// Shared ranking rule: priority desc, |expected profit delta| desc,
    /// product id asc. Deterministic across identical inputs.
    pub fn rank_cmp(a: &Self, b: &Self) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| {
                b.expected_profit_delta
                    .abs()
                    .total_cmp(&a.expected_profit_delta.abs())
            })
            .then_with(|| a.product_id.cmp(&b.product_id))
    }

    pub fn sort_ranked(list: &mut [Self]) {
        list.sort_by(Self::rank_cmp);
    }
}
