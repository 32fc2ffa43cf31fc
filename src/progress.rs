//! Progress reporting for long-running encode passes.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives progress callbacks from the LZ encoder.
///
/// All methods have empty default implementations, so a sink only
/// implements what it cares about. Callbacks may arrive from worker
/// threads concurrently.
pub trait ProgressSink: Send + Sync {
    /// A pipeline stage is starting with `items` work items ahead.
    fn on_stage(&self, stage: &'static str, items: usize) {
        let _ = (stage, items);
    }

    /// One group of equal-prefix positions has been examined.
    fn on_group(&self) {}

    /// One back-reference token has been written.
    fn on_token(&self) {}
}

/// The default sink: ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// A sink that counts events, useful for tests and coarse reporting.
#[derive(Debug, Default)]
pub struct CountingProgress {
    groups: AtomicUsize,
    tokens: AtomicUsize,
}

impl CountingProgress {
    /// A sink with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix groups examined so far.
    pub fn groups(&self) -> usize {
        self.groups.load(Ordering::Relaxed)
    }

    /// Tokens written so far.
    pub fn tokens(&self) -> usize {
        self.tokens.load(Ordering::Relaxed)
    }
}

impl ProgressSink for CountingProgress {
    fn on_group(&self) {
        self.groups.fetch_add(1, Ordering::Relaxed);
    }

    fn on_token(&self) {
        self.tokens.fetch_add(1, Ordering::Relaxed);
    }
}
