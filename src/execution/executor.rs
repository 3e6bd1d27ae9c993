//! Transfer and pricing executors.
//!
//! Partial failure is a first-class outcome: a failed or timed-out item is
//! recorded and the loop moves on to the next one. The cancellation token
//! and the kill switch are both polled between every item so an emergency
//! stop or an operator pause lands mid-cycle instead of at the next cycle
//! boundary.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::cycle::CancelToken;
use crate::execution::{ItemOutcome, ItemState};
use crate::models::{Opportunity, OpportunityKind};
use crate::providers::{KillSwitchSignal, PricingExecutionService, TransferExecutionService};
use crate::reporting::{CycleEvent, CycleObserver};

#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl ExecutionReport {
    pub fn executed(&self) -> u32 {
        self.count(ItemState::Executed)
    }

    pub fn failed(&self) -> u32 {
        self.count(ItemState::Failed)
    }

    pub fn deferred(&self) -> u32 {
        self.count(ItemState::Deferred)
    }

    fn count(&self, state: ItemState) -> u32 {
        self.outcomes.iter().filter(|o| o.state == state).count() as u32
    }

    fn push(&mut self, item: &Opportunity, state: ItemState, detail: Option<String>) {
        self.outcomes.push(ItemOutcome {
            product_id: item.product_id.clone(),
            kind: item.kind.label(),
            state,
            detail,
        });
    }
}

pub struct TransferExecutor {
    service: Arc<dyn TransferExecutionService>,
    call_timeout: Duration,
}

impl TransferExecutor {
    pub fn new(service: Arc<dyn TransferExecutionService>, call_timeout: Duration) -> Self {
        Self {
            service,
            call_timeout,
        }
    }

    /// Execute validated transfers in ranked order, consuming `budget`.
    pub async fn execute_all(
        &self,
        items: &[Opportunity],
        budget: &mut u32,
        cancel: &CancelToken,
        kill_switch: &dyn KillSwitchSignal,
        observer: &dyn CycleObserver,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for item in items {
            if let Some(deferral) = check_deferral(cancel, kill_switch, *budget) {
                defer(&mut report, item, deferral, observer);
                continue;
            }

            let OpportunityKind::Transfer {
                from_outlet,
                to_outlet,
                quantity,
                ..
            } = &item.kind
            else {
                report.push(item, ItemState::Failed, Some("not a transfer".to_string()));
                continue;
            };

            let call = self
                .service
                .execute(&item.product_id, from_outlet, to_outlet, *quantity);
            settle(&mut report, item, budget, timeout(self.call_timeout, call).await, observer);
        }

        report
    }
}

pub struct PricingExecutor {
    service: Arc<dyn PricingExecutionService>,
    call_timeout: Duration,
}

impl PricingExecutor {
    pub fn new(service: Arc<dyn PricingExecutionService>, call_timeout: Duration) -> Self {
        Self {
            service,
            call_timeout,
        }
    }

    /// Execute validated price changes and clearances in ranked order.
    ///
    /// Both kinds land as a price set; they share `budget`
    /// (`max_price_changes_per_cycle`) so a clearance-heavy cycle cannot
    /// double its pricing blast radius.
    pub async fn execute_all(
        &self,
        items: &[Opportunity],
        budget: &mut u32,
        cancel: &CancelToken,
        kill_switch: &dyn KillSwitchSignal,
        observer: &dyn CycleObserver,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for item in items {
            if let Some(deferral) = check_deferral(cancel, kill_switch, *budget) {
                defer(&mut report, item, deferral, observer);
                continue;
            }

            let new_price = match &item.kind {
                OpportunityKind::PriceChange { proposed_price, .. } => *proposed_price,
                OpportunityKind::Clearance { clearance_price, .. } => *clearance_price,
                OpportunityKind::Transfer { .. } => {
                    report.push(item, ItemState::Failed, Some("not a price action".to_string()));
                    continue;
                }
            };

            let call = self.service.set_price(&item.product_id, new_price);
            settle(&mut report, item, budget, timeout(self.call_timeout, call).await, observer);
        }

        report
    }
}

fn check_deferral(
    cancel: &CancelToken,
    kill_switch: &dyn KillSwitchSignal,
    budget: u32,
) -> Option<&'static str> {
    if cancel.is_cancelled() {
        Some("stop signal received")
    } else if kill_switch.is_active() {
        Some("kill switch armed")
    } else if budget == 0 {
        Some("per-cycle cap reached")
    } else {
        None
    }
}

fn defer(
    report: &mut ExecutionReport,
    item: &Opportunity,
    reason: &'static str,
    observer: &dyn CycleObserver,
) {
    observer.on_event(CycleEvent::ItemDeferred {
        product_id: &item.product_id,
        kind: item.kind.label(),
        reason,
    });
    report.push(item, ItemState::Deferred, Some(reason.to_string()));
}

fn settle(
    report: &mut ExecutionReport,
    item: &Opportunity,
    budget: &mut u32,
    result: Result<anyhow::Result<()>, tokio::time::error::Elapsed>,
    observer: &dyn CycleObserver,
) {
    match result {
        Ok(Ok(())) => {
            *budget -= 1;
            observer.on_event(CycleEvent::ItemExecuted {
                product_id: &item.product_id,
                kind: item.kind.label(),
                expected_profit_delta: item.expected_profit_delta,
            });
            report.push(item, ItemState::Executed, None);
        }
        Ok(Err(e)) => {
            let detail = e.to_string();
            observer.on_event(CycleEvent::ItemFailed {
                product_id: &item.product_id,
                kind: item.kind.label(),
                error: &detail,
            });
            report.push(item, ItemState::Failed, Some(detail));
        }
        Err(_) => {
            let detail = "collaborator call timed out".to_string();
            observer.on_event(CycleEvent::ItemFailed {
                product_id: &item.product_id,
                kind: item.kind.label(),
                error: &detail,
            });
            report.push(item, ItemState::Failed, Some(detail));
        }
    }
}
