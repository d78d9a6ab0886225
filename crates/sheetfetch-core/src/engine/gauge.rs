//! In-flight fetch counter with a high-water mark.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts fetches currently holding a limiter permit and remembers the peak.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one fetch as running until the returned guard is dropped.
    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        GaugeGuard { gauge: self }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Highest number of simultaneous fetches seen so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

pub struct GaugeGuard<'a> {
    gauge: &'a InFlightGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::AcqRel);
    }
}
