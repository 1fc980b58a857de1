use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Delivered versus dropped ticks of one producer, read at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickCounts {
    pub delivered: u64,
    pub dropped: u64,
}

impl TickCounts {
    pub fn total(&self) -> u64 {
        self.delivered + self.dropped
    }
}

impl fmt::Display for TickCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ticks dropped", self.dropped, self.total())
    }
}

/// Tick outcome counters shared between a producer loop and its owner.
#[derive(Debug, Default)]
pub struct TickMetrics {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl TickMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> TickCounts {
        TickCounts {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
