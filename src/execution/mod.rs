pub mod executor;

pub use executor::{ExecutionReport, PricingExecutor, TransferExecutor};

use serde::{Deserialize, Serialize};

/// Terminal state of one opportunity after the execution phase.
///
/// `Deferred` covers items left unexecuted by per-cycle caps or a mid-cycle
/// stop signal. Guardrail rejections never reach the executors; they are
/// counted separately as `skipped_by_guardrail`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ItemState {
    Executed,
    Failed,
    Deferred,
}

/// Final state of one opportunity after the execution phase
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub product_id: String,
    pub kind: &'static str,
    pub state: ItemState,
    pub detail: Option<String>,
}
