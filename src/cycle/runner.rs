//! One full pass: gather -> analyze -> decide -> validate -> execute ->
//! measure -> archive.

use std::sync::Arc;

use crate::analyzer;
use crate::config::OptimizerConfig;
use crate::cycle::{ActionCounters, CancelToken, Clock, CycleResult, RunContext};
use crate::decision;
use crate::error::CycleError;
use crate::execution::{ExecutionReport, ItemState, PricingExecutor, TransferExecutor};
use crate::gateway::MarketSignalGateway;
use crate::guardrails::{GuardrailValidator, Verdict};
use crate::models::Opportunity;
use crate::profit::ProfitImpactAggregator;
use crate::providers::{KillSwitchSignal, RunHistoryStore};
use crate::reporting::{CycleEvent, CycleObserver};

/// Recommended pre-jitter sleep after a cycle: more executed actions mean a
/// busier market and a shorter sleep, clamped to the configured bounds.
pub fn recommended_sleep_secs(executed_actions: u32, config: &OptimizerConfig) -> u64 {
    let cap_total =
        config.guardrails.max_transfers_per_cycle + config.guardrails.max_price_changes_per_cycle;
    if cap_total == 0 {
        return config.max_sleep_secs;
    }
    let load = (executed_actions.min(cap_total) as f64) / cap_total as f64;
    let span = (config.max_sleep_secs - config.min_sleep_secs) as f64;
    let sleep = config.max_sleep_secs as f64 - span * load;
    (sleep as u64).clamp(config.min_sleep_secs, config.max_sleep_secs)
}

pub struct CycleRunner {
    gateway: MarketSignalGateway,
    validator: GuardrailValidator,
    transfer_executor: TransferExecutor,
    pricing_executor: PricingExecutor,
    kill_switch: Arc<dyn KillSwitchSignal>,
    history: Arc<dyn RunHistoryStore>,
    observer: Arc<dyn CycleObserver>,
    clock: Arc<dyn Clock>,
    config: Arc<OptimizerConfig>,
}

impl CycleRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: MarketSignalGateway,
        validator: GuardrailValidator,
        transfer_executor: TransferExecutor,
        pricing_executor: PricingExecutor,
        kill_switch: Arc<dyn KillSwitchSignal>,
        history: Arc<dyn RunHistoryStore>,
        observer: Arc<dyn CycleObserver>,
        clock: Arc<dyn Clock>,
        config: Arc<OptimizerConfig>,
    ) -> Self {
        Self {
            gateway,
            validator,
            transfer_executor,
            pricing_executor,
            kill_switch,
            history,
            observer,
            clock,
            config,
        }
    }

    /// Run one cycle to completion. Signal problems degrade, execution
    /// failures are per-item; only malformed opportunities or panics in
    /// collaborators surface as `Err`.
    pub async fn run_cycle(
        &self,
        run_id: u64,
        cancel: &CancelToken,
    ) -> Result<CycleResult, CycleError> {
        let mut ctx = RunContext::new(run_id, self.config.clone(), self.clock.now());
        self.observer.on_event(CycleEvent::CycleStarted { run_id });

        // Gather
        let signals = self.gateway.gather().await;
        ctx.stats.signals_degraded = signals.degraded();
        ctx.stats.notes = signals.notes.clone();
        if let Some(reason) = &signals.competitor.reason {
            ctx.stats.notes.push(format!("competitor: {}", reason));
        }
        self.observer.on_event(CycleEvent::SignalsGathered {
            run_id,
            velocities: signals.velocities.len(),
            competitor_records: signals.competitor.records.len(),
            stale: signals.competitor.stale,
            notes: &signals.notes,
        });

        // Decide
        let gaps = analyzer::analyze(&signals.inventory, &signals.competitor);
        let matrix = decision::build(&signals, &gaps, &self.config);
        self.observer.on_event(CycleEvent::MatrixBuilt {
            run_id,
            transfers: matrix.transfers.len(),
            price_changes: matrix.price_changes.len(),
            clearances: matrix.clearances.len(),
        });

        let mut profit = ProfitImpactAggregator::new();
        for opportunity in matrix
            .transfers
            .iter()
            .chain(&matrix.price_changes)
            .chain(&matrix.clearances)
        {
            profit.record_identified(opportunity);
        }

        // Validate
        let transfers = self.apply_guardrails(&matrix.transfers, &mut ctx.stats.transfers)?;
        let price_changes =
            self.apply_guardrails(&matrix.price_changes, &mut ctx.stats.price_changes)?;
        let clearances = self.apply_guardrails(&matrix.clearances, &mut ctx.stats.clearances)?;

        // Execute: transfers and price actions carry independent caps;
        // pricing and clearance share one since both land as price sets.
        // The kill switch rides along so arming it mid-cycle defers the
        // remaining items instead of waiting for the next cycle boundary.
        let kill_switch = self.kill_switch.as_ref();
        let mut transfer_budget = self.config.guardrails.max_transfers_per_cycle;
        let report = self
            .transfer_executor
            .execute_all(&transfers, &mut transfer_budget, cancel, kill_switch, self.observer.as_ref())
            .await;
        fold_report(&report, &transfers, &mut ctx.stats.transfers, &mut profit);

        let mut pricing_budget = self.config.guardrails.max_price_changes_per_cycle;
        let report = self
            .pricing_executor
            .execute_all(&price_changes, &mut pricing_budget, cancel, kill_switch, self.observer.as_ref())
            .await;
        fold_report(&report, &price_changes, &mut ctx.stats.price_changes, &mut profit);

        let report = self
            .pricing_executor
            .execute_all(&clearances, &mut pricing_budget, cancel, kill_switch, self.observer.as_ref())
            .await;
        fold_report(&report, &clearances, &mut ctx.stats.clearances, &mut profit);

        // Measure and archive
        let totals = profit.totals();
        ctx.stats.estimated_profit_delta = totals.estimated;
        ctx.stats.realized_profit_delta = totals.realized;

        let executed = ctx.stats.transfers.executed
            + ctx.stats.price_changes.executed
            + ctx.stats.clearances.executed;
        let next_sleep = recommended_sleep_secs(executed, &self.config);
        let result = ctx.finish(self.clock.now(), next_sleep);

        if let Err(e) = self.history.persist(&result).await {
            tracing::warn!(run_id, "Failed to persist cycle result: {}", e);
        }

        self.observer
            .on_event(CycleEvent::CycleCompleted { result: &result });
        Ok(result)
    }

    /// Split a ranked list into the accepted items, counting rejections.
    /// Order is preserved, so execution still happens in ranked order.
    fn apply_guardrails(
        &self,
        items: &[Opportunity],
        counters: &mut ActionCounters,
    ) -> Result<Vec<Opportunity>, CycleError> {
        counters.identified = items.len() as u32;
        let mut accepted = Vec::with_capacity(items.len());

        for item in items {
            match self.validator.validate(item)? {
                Verdict::Accept => accepted.push(item.clone()),
                Verdict::Reject { rule, reason } => {
                    counters.skipped_by_guardrail += 1;
                    self.observer.on_event(CycleEvent::ItemSkipped {
                        product_id: &item.product_id,
                        kind: item.kind.label(),
                        rule,
                        reason: &reason,
                    });
                }
            }
        }
        Ok(accepted)
    }
}

fn fold_report(
    report: &ExecutionReport,
    items: &[Opportunity],
    counters: &mut ActionCounters,
    profit: &mut ProfitImpactAggregator,
) {
    for (outcome, item) in report.outcomes.iter().zip(items) {
        match outcome.state {
            ItemState::Executed => {
                counters.executed += 1;
                profit.record_executed(item);
            }
            ItemState::Failed => counters.failed += 1,
            ItemState::Deferred => counters.deferred += 1,
        }
    }
}
