// Side-effect counters

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts calls across clones and threads.
///
/// Hand a clone to a handler, store or factory, then check the original.
#[derive(Clone, Debug, Default)]
pub struct CallCounter {
    count: Arc<AtomicUsize>,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call
    pub fn hit(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn was_called(&self) -> bool {
        self.count() > 0
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}
