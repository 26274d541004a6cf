pub mod completion;
pub mod export;
pub mod filter;
pub mod import;
pub mod recurrence;
pub mod stats;
pub mod task_ops;
