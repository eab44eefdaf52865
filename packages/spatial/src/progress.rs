//! Progress reporting for long-running joins.
//!
//! [`ProgressCallback`] decouples the join loop from any rendering backend;
//! the CLI plugs in `indicatif` bars while tests and library callers use
//! [`NullProgress`].

use std::sync::Arc;

/// Number of points processed between progress updates.
pub const PROGRESS_CHUNK: usize = 1_000;

/// Receives progress updates from a batch operation.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total units of work (switches a spinner to a bar).
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Replaces the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the operation complete with a final message.
    fn finish(&self, msg: String);

    /// Marks the operation complete and removes the indicator.
    fn finish_and_clear(&self);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
