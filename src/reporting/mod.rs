//! Structured phase events. Core logic never prints progress directly; it
//! emits events through a [`CycleObserver`] and the reporter decides how to
//! render them.

use crate::cycle::CycleResult;

#[derive(Debug, Clone)]
pub enum CycleEvent<'a> {
    CycleStarted {
        run_id: u64,
    },
    SignalsGathered {
        run_id: u64,
        velocities: usize,
        competitor_records: usize,
        stale: bool,
        notes: &'a [String],
    },
    MatrixBuilt {
        run_id: u64,
        transfers: usize,
        price_changes: usize,
        clearances: usize,
    },
    ItemSkipped {
        product_id: &'a str,
        kind: &'static str,
        rule: &'static str,
        reason: &'a str,
    },
    ItemExecuted {
        product_id: &'a str,
        kind: &'static str,
        expected_profit_delta: f64,
    },
    ItemFailed {
        product_id: &'a str,
        kind: &'static str,
        error: &'a str,
    },
    ItemDeferred {
        product_id: &'a str,
        kind: &'static str,
        reason: &'a str,
    },
    CycleCompleted {
        result: &'a CycleResult,
    },
    CycleFailed {
        run_id: u64,
        error: &'a str,
    },
    KillSwitchActive,
    EmergencyStop,
}

pub trait CycleObserver: Send + Sync {
    fn on_event(&self, event: CycleEvent<'_>);
}

/// Renders phase events through `tracing`
pub struct TracingReporter;

impl CycleObserver for TracingReporter {
    fn on_event(&self, event: CycleEvent<'_>) {
        match event {
            CycleEvent::CycleStarted { run_id } => {
                tracing::info!(run_id, "🔄 Cycle starting");
            }
            CycleEvent::SignalsGathered {
                run_id,
                velocities,
                competitor_records,
                stale,
                notes,
            } => {
                tracing::info!(
                    run_id,
                    velocities,
                    competitor_records,
                    stale,
                    "📡 Signals gathered"
                );
                for note in notes {
                    tracing::warn!(run_id, "  ⚠ degraded signal: {}", note);
                }
            }
            CycleEvent::MatrixBuilt {
                run_id,
                transfers,
                price_changes,
                clearances,
            } => {
                tracing::info!(
                    run_id,
                    transfers,
                    price_changes,
                    clearances,
                    "📊 Decision matrix built"
                );
            }
            CycleEvent::ItemSkipped {
                product_id,
                kind,
                rule,
                reason,
            } => {
                tracing::info!(product_id, kind, rule, "  ⛔ skipped: {}", reason);
            }
            CycleEvent::ItemExecuted {
                product_id,
                kind,
                expected_profit_delta,
            } => {
                tracing::info!(
                    product_id,
                    kind,
                    "  ✓ executed (est. ${:.2})",
                    expected_profit_delta
                );
            }
            CycleEvent::ItemFailed {
                product_id,
                kind,
                error,
            } => {
                tracing::error!(product_id, kind, "  ✗ failed: {}", error);
            }
            CycleEvent::ItemDeferred {
                product_id,
                kind,
                reason,
            } => {
                tracing::info!(product_id, kind, "  ⏸ deferred: {}", reason);
            }
            CycleEvent::CycleCompleted { result } => {
                let totals = result.totals();
                tracing::info!(
                    run_id = result.run_id,
                    identified = totals.identified,
                    executed = totals.executed,
                    skipped = totals.skipped_by_guardrail,
                    deferred = totals.deferred,
                    failed = totals.failed,
                    "✅ Cycle complete (est. ${:.2}, realized ${:.2})",
                    result.estimated_profit_delta,
                    result.realized_profit_delta
                );
            }
            CycleEvent::CycleFailed { run_id, error } => {
                tracing::error!(run_id, "💥 Cycle failed: {}", error);
            }
            CycleEvent::KillSwitchActive => {
                tracing::warn!("🛑 Kill switch active, skipping cycle");
            }
            CycleEvent::EmergencyStop => {
                tracing::warn!("🛑 Emergency stop, aborting in-flight work");
            }
        }
    }
}

/// Discards all events; used in tests that assert on results, not logs
pub struct NullReporter;

impl CycleObserver for NullReporter {
    fn on_event(&self, _event: CycleEvent<'_>) {}
}
