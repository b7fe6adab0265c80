//! Task domain model — row type, lifecycle state machine, progress entries.

pub mod model;

pub use model::{ProgressEntry, Task, TaskStatus, TaskType, DEFAULT_MAX_RETRIES};
