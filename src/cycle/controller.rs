//! Continuous loop driver.
//!
//! The controller owns run-id sequencing, kill-switch cool-downs, adaptive
//! sleeps, and the guarantee that no single cycle failure terminates the
//! loop. All waiting goes through the injected [`Clock`] so tests can drive
//! full cycles without real sleeps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::timeout;

use crate::config::OptimizerConfig;
use crate::cycle::{Clock, CycleResult, CycleRunner};
use crate::error::CycleError;
use crate::providers::KillSwitchSignal;
use crate::reporting::{CycleEvent, CycleObserver};

/// Cooperative cancellation, polled at cycle start and between item
/// executions. Tripping it is the emergency stop.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Running,
    Sleeping,
    Stopped,
}

pub struct CycleController {
    runner: CycleRunner,
    clock: Arc<dyn Clock>,
    kill_switch: Arc<dyn KillSwitchSignal>,
    observer: Arc<dyn CycleObserver>,
    config: Arc<OptimizerConfig>,
    cancel: CancelToken,
    state: ControllerState,
    next_run_id: u64,
}

impl CycleController {
    pub fn new(
        runner: CycleRunner,
        clock: Arc<dyn Clock>,
        kill_switch: Arc<dyn KillSwitchSignal>,
        observer: Arc<dyn CycleObserver>,
        config: Arc<OptimizerConfig>,
    ) -> Self {
        Self {
            runner,
            clock,
            kill_switch,
            observer,
            config,
            cancel: CancelToken::new(),
            state: ControllerState::Idle,
            next_run_id: 1,
        }
    }

    /// Swap the waiting clock, keeping everything else. Used by tests that
    /// drive the loop with a scripted clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Token shared with executors; external code (signal handlers) can
    /// clone it and trip the emergency stop.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run a single cycle. Returns `None` when the kill switch is active;
    /// the run id is not consumed in that case.
    pub async fn run_once(&mut self) -> Result<Option<CycleResult>, CycleError> {
        if self.kill_switch.is_active() {
            self.observer.on_event(CycleEvent::KillSwitchActive);
            return Ok(None);
        }

        self.state = ControllerState::Running;
        let run_id = self.next_run_id;
        self.next_run_id += 1;

        let outcome = self.bounded_cycle(run_id).await;
        self.state = ControllerState::Idle;
        outcome.map(Some)
    }

    /// Continuous loop: runs until the cancel token trips. Cycle failures
    /// back off and continue; they never end the loop.
    pub async fn run_continuous(&mut self) {
        loop {
            if self.cancel.is_cancelled() {
                self.observer.on_event(CycleEvent::EmergencyStop);
                self.state = ControllerState::Stopped;
                return;
            }

            if self.kill_switch.is_active() {
                self.observer.on_event(CycleEvent::KillSwitchActive);
                self.state = ControllerState::Sleeping;
                self.clock
                    .sleep(Duration::from_secs(self.config.kill_switch_cooldown_secs))
                    .await;
                continue;
            }

            self.state = ControllerState::Running;
            let run_id = self.next_run_id;
            self.next_run_id += 1;

            let sleep_secs = match self.bounded_cycle(run_id).await {
                Ok(result) => jittered_secs(result.next_sleep_secs),
                Err(e) => {
                    self.observer.on_event(CycleEvent::CycleFailed {
                        run_id,
                        error: &e.to_string(),
                    });
                    self.config.fatal_backoff_secs
                }
            };

            self.state = ControllerState::Sleeping;
            self.clock.sleep(Duration::from_secs(sleep_secs)).await;
        }
    }

    /// One cycle under the max-duration guard, so a hung collaborator
    /// cannot stall the loop indefinitely.
    async fn bounded_cycle(&self, run_id: u64) -> Result<CycleResult, CycleError> {
        match timeout(
            self.config.max_cycle_duration(),
            self.runner.run_cycle(run_id, &self.cancel),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CycleError::Fatal(anyhow::anyhow!(
                "cycle exceeded max duration of {}s",
                self.config.max_cycle_duration_secs
            ))),
        }
    }
}

/// Apply +/-10% jitter so a fleet of instances does not synchronize
fn jittered_secs(base: u64) -> u64 {
    if base == 0 {
        return 0;
    }
    let factor = rand::thread_rng().gen_range(0.9..=1.1);
    (base as f64 * factor).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_trips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        for _ in 0..100 {
            let jittered = jittered_secs(1000);
            assert!((900..=1100).contains(&jittered), "out of range: {}", jittered);
        }
        assert_eq!(jittered_secs(0), 0);
    }
}
