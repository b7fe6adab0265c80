//! Worker engine — polling scheduler, executor dispatch, stuck-task recovery.
//!
//! Core components:
//! - `executor` — `Executor` trait, registry, tagged failure type
//! - `worker` — `WorkerLoop` (claim → dispatch → finalize, graceful drain)
//! - `reaper` — periodic recovery of tasks wedged in `processing`

pub mod executor;
pub mod reaper;
pub mod worker;

pub use executor::{ExecutionError, Executor, ExecutorRegistry, TaskContext};
pub use reaper::spawn_reaper_loop;
pub use worker::WorkerLoop;
