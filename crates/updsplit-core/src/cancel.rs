//! Cooperative cancellation for long scans and copies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked by the scanner and the extractor between steps.
///
/// Clones share the same underlying flag, so a front end can keep one clone
/// and hand another to a [`ScannerConfig`](crate::ScannerConfig) or
/// [`ExtractorConfig`](crate::ExtractorConfig).
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag that is not yet cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once [`cancel`](Self::cancel) was called on any clone
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
