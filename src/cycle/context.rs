use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::OptimizerConfig;

/// Per-action-type outcome counters.
///
/// `identified`, `skipped_by_guardrail`, `deferred`, and `failed` are kept
/// separate so a cycle summary can distinguish "nothing to do", "guardrails
/// blocked everything", and "execution layer is broken".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionCounters {
    pub identified: u32,
    pub executed: u32,
    pub skipped_by_guardrail: u32,
    pub deferred: u32,
    pub failed: u32,
}

impl ActionCounters {
    pub fn merge(&mut self, other: &ActionCounters) {
        self.identified += other.identified;
        self.executed += other.executed;
        self.skipped_by_guardrail += other.skipped_by_guardrail;
        self.deferred += other.deferred;
        self.failed += other.failed;
    }
}

/// Mutable accumulator carried through one cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleStats {
    pub transfers: ActionCounters,
    pub price_changes: ActionCounters,
    pub clearances: ActionCounters,
    pub estimated_profit_delta: f64,
    pub realized_profit_delta: f64,
    pub signals_degraded: bool,
    pub notes: Vec<String>,
}

/// One run's identity and state: created at cycle start, folded into a
/// [`CycleResult`] at cycle end.
pub struct RunContext {
    pub run_id: u64,
    pub started_at: DateTime<Utc>,
    pub config: Arc<OptimizerConfig>,
    pub stats: CycleStats,
}

impl RunContext {
    pub fn new(run_id: u64, config: Arc<OptimizerConfig>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            config,
            stats: CycleStats::default(),
        }
    }

    pub fn finish(self, finished_at: DateTime<Utc>, next_sleep_secs: u64) -> CycleResult {
        CycleResult {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at,
            transfers: self.stats.transfers,
            price_changes: self.stats.price_changes,
            clearances: self.stats.clearances,
            estimated_profit_delta: self.stats.estimated_profit_delta,
            realized_profit_delta: self.stats.realized_profit_delta,
            signals_degraded: self.stats.signals_degraded,
            notes: self.stats.notes,
            next_sleep_secs,
        }
    }
}

/// Coarse health classification of one finished cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleHealth {
    /// No opportunities identified
    NothingToDo,
    /// Opportunities existed but guardrails rejected every one
    GuardrailsBlockedAll,
    /// Executions were attempted and every one failed
    ExecutionBroken,
    Normal,
}

/// Documented per-cycle summary record, archived via the run-history store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub run_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub transfers: ActionCounters,
    pub price_changes: ActionCounters,
    pub clearances: ActionCounters,
    pub estimated_profit_delta: f64,
    pub realized_profit_delta: f64,
    pub signals_degraded: bool,
    pub notes: Vec<String>,
    /// Recommended sleep before the next run, pre-jitter
    pub next_sleep_secs: u64,
}

impl CycleResult {
    pub fn empty(run_id: u64) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            started_at: now,
            finished_at: now,
            transfers: ActionCounters::default(),
            price_changes: ActionCounters::default(),
            clearances: ActionCounters::default(),
            estimated_profit_delta: 0.0,
            realized_profit_delta: 0.0,
            signals_degraded: false,
            notes: Vec::new(),
            next_sleep_secs: 0,
        }
    }

    pub fn totals(&self) -> ActionCounters {
        let mut totals = self.transfers;
        totals.merge(&self.price_changes);
        totals.merge(&self.clearances);
        totals
    }

    pub fn health(&self) -> CycleHealth {
        let totals = self.totals();
        if totals.identified == 0 {
            CycleHealth::NothingToDo
        } else if totals.executed == 0 && totals.failed == 0 && totals.skipped_by_guardrail > 0 {
            CycleHealth::GuardrailsBlockedAll
        } else if totals.executed == 0 && totals.failed > 0 {
            CycleHealth::ExecutionBroken
        } else {
            CycleHealth::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_merge() {
        let mut a = ActionCounters {
            identified: 3,
            executed: 2,
            skipped_by_guardrail: 1,
            deferred: 0,
            failed: 0,
        };
        let b = ActionCounters {
            identified: 2,
            executed: 0,
            skipped_by_guardrail: 0,
            deferred: 1,
            failed: 1,
        };
        a.merge(&b);
        assert_eq!(a.identified, 5);
        assert_eq!(a.executed, 2);
        assert_eq!(a.deferred, 1);
        assert_eq!(a.failed, 1);
    }

    #[test]
    fn test_health_nothing_to_do() {
        let result = CycleResult::empty(1);
        assert_eq!(result.health(), CycleHealth::NothingToDo);
    }

    #[test]
    fn test_health_guardrails_blocked_all() {
        let mut result = CycleResult::empty(1);
        result.transfers.identified = 3;
        result.transfers.skipped_by_guardrail = 3;
        assert_eq!(result.health(), CycleHealth::GuardrailsBlockedAll);
    }

    #[test]
    fn test_health_execution_broken() {
        let mut result = CycleResult::empty(1);
        result.price_changes.identified = 2;
        result.price_changes.failed = 2;
        assert_eq!(result.health(), CycleHealth::ExecutionBroken);
    }

    #[test]
    fn test_health_normal_with_partial_failure() {
        let mut result = CycleResult::empty(1);
        result.price_changes.identified = 5;
        result.price_changes.executed = 4;
        result.price_changes.failed = 1;
        assert_eq!(result.health(), CycleHealth::Normal);
    }

    #[test]
    fn test_run_context_folds_into_result() {
        let config = Arc::new(OptimizerConfig::default());
        let started = Utc::now();
        let mut ctx = RunContext::new(7, config, started);
        ctx.stats.transfers.identified = 2;
        ctx.stats.transfers.executed = 2;
        ctx.stats.estimated_profit_delta = 120.0;

        let result = ctx.finish(started + chrono::Duration::seconds(5), 600);
        assert_eq!(result.run_id, 7);
        assert_eq!(result.transfers.executed, 2);
        assert_eq!(result.next_sleep_secs, 600);
        assert!(result.finished_at > result.started_at);
    }
}
