/// Trait for reporting run progress.
///
/// The CLI implements it with tracing/indicatif; library callers that do not
/// care use [`SilentReporter`]. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _root: &str) {}
    fn on_scan_complete(&self, _root: &str, _entries: usize, _duration_secs: f64) {}
    fn on_hash_start(&self, _total_files: usize) {}
    fn on_hash_progress(&self, _files_hashed: usize, _total_files: usize) {}
    fn on_execute_start(&self, _total_operations: usize) {}
    fn on_execute_progress(&self, _done: usize, _total_operations: usize) {}
    fn on_execute_complete(&self, _failed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
