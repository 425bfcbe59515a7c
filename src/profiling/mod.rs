//! Lightweight counters for the translation layer.
//!
//! Only running totals, no history. Updates are relaxed atomics and never block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counter snapshot
#[derive(Debug, Clone)]
pub struct ProfileStats {
    // Allocation
    pub pages_allocated: u64,
    pub allocation_failures: u64,
    pub segment_probes: u64,
    pub consistency_warnings: u64,

    // Mapping
    pub map_updates: u64,
    pub map_lookups: u64,
    pub out_of_range: u64,

    pub uptime_secs: u64,
}

impl ProfileStats {
    /// Average segments probed per allocation attempt
    #[inline]
    pub fn avg_probes(&self) -> f64 {
        let attempts = self.pages_allocated + self.allocation_failures;
        if attempts > 0 {
            self.segment_probes as f64 / attempts as f64
        } else {
            0.0
        }
    }
}

/// Lock-free metric tracking
pub struct Profiler {
    pages_allocated: AtomicU64,
    allocation_failures: AtomicU64,
    segment_probes: AtomicU64,
    consistency_warnings: AtomicU64,
    map_updates: AtomicU64,
    map_lookups: AtomicU64,
    out_of_range: AtomicU64,
    start_time: Instant,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self {
            pages_allocated: AtomicU64::new(0),
            allocation_failures: AtomicU64::new(0),
            segment_probes: AtomicU64::new(0),
            consistency_warnings: AtomicU64::new(0),
            map_updates: AtomicU64::new(0),
            map_lookups: AtomicU64::new(0),
            out_of_range: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Get current statistics snapshot
    pub fn stats(&self) -> ProfileStats {
        ProfileStats {
            pages_allocated: self.pages_allocated.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            segment_probes: self.segment_probes.load(Ordering::Relaxed),
            consistency_warnings: self.consistency_warnings.load(Ordering::Relaxed),
            map_updates: self.map_updates.load(Ordering::Relaxed),
            map_lookups: self.map_lookups.load(Ordering::Relaxed),
            out_of_range: self.out_of_range.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn record_allocation(&self, probes: u64) {
        self.pages_allocated.fetch_add(1, Ordering::Relaxed);
        self.segment_probes.fetch_add(probes, Ordering::Relaxed);
    }

    pub fn record_allocation_failure(&self, probes: u64) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
        self.segment_probes.fetch_add(probes, Ordering::Relaxed);
    }

    pub fn record_consistency_warning(&self) {
        self.consistency_warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_map_update(&self) {
        self.map_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_map_lookup(&self) {
        self.map_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out_of_range(&self) {
        self.out_of_range.fetch_add(1, Ordering::Relaxed);
    }
}
