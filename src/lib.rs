pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod filter;
pub mod hasher;
pub mod plan;
pub mod progress;
pub mod scanner;
pub mod snapshot;
pub mod sync;

pub use config::AppConfig;
pub use engine::{RunOptions, RunSummary, SyncEngine};
pub use error::{Error, Result};
pub use executor::{AutoConfirm, Confirm, ExecutionReport, ExecutorOptions, PlanExecutor};
pub use filter::PathFilter;
pub use hasher::{HashMode, Identity};
pub use plan::{Operation, Plan};
pub use progress::{ProgressReporter, SilentReporter};
pub use scanner::{FileScope, ScanOptions};
pub use snapshot::{FileRecord, TreeSnapshot};
pub use sync::{SyncMode, SyncPlanner};
