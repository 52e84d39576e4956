use std::sync::{Arc, PoisonError, RwLock};

use co2_core::Reading;

/// Holds the most recent reading.
///
/// Readings are swapped in whole behind an `Arc`, so readers see either the
/// previous or the new value and never a mix of both.
#[derive(Clone, Default)]
pub struct ReadingStore {
    latest: Arc<RwLock<Option<Arc<Reading>>>>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current reading.
    pub fn store(&self, reading: Reading) {
        let reading = Arc::new(reading);
        // The slot only ever holds a complete value, so a poisoned lock is
        // still safe to use.
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *latest = Some(reading);
    }

    /// The current reading, or `None` if nothing has been captured yet.
    pub fn latest(&self) -> Option<Arc<Reading>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
