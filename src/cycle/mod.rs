// Cycle orchestration: one pass through gather -> decide -> validate ->
// execute -> measure, and the continuous controller loop around it.
pub mod clock;
pub mod context;
pub mod controller;
pub mod runner;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{ActionCounters, CycleHealth, CycleResult, CycleStats, RunContext};
pub use controller::{CancelToken, ControllerState, CycleController};
pub use runner::CycleRunner;
