//! Stats Module - Heap and collector statistics
//!
//! Counters are updated by the single mutator, so they are plain integers.
//!
//! Metrics:
//! - Collection count and pause times (total, max)
//! - Allocation count and volume
//! - Reclaimed objects and bytes
//! - Heap growth events

pub mod timer;

pub use timer::GcTimer;

use serde::Serialize;
use std::time::Duration;

/// GcStats - statistics collector for one heap
#[derive(Debug, Default, Clone)]
pub struct GcStats {
    cycles: u64,
    allocations: u64,
    bytes_allocated: u64,
    objects_reclaimed: u64,
    bytes_reclaimed: u64,
    free_list_hits: u64,
    heap_growths: u64,
    total_pause: Duration,
    max_pause: Duration,
    live_bytes: usize,
}

impl GcStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful allocation of `bytes` (header included)
    #[inline]
    pub fn record_allocation(&mut self, bytes: usize, from_free_list: bool) {
        self.allocations += 1;
        self.bytes_allocated += bytes as u64;
        if from_free_list {
            self.free_list_hits += 1;
        }
    }

    /// Record a finished collection
    pub fn record_collection(
        &mut self,
        reclaimed_objects: usize,
        reclaimed_bytes: usize,
        live_bytes: usize,
        pause: Duration,
    ) {
        self.cycles += 1;
        self.objects_reclaimed += reclaimed_objects as u64;
        self.bytes_reclaimed += reclaimed_bytes as u64;
        self.live_bytes = live_bytes;
        self.total_pause += pause;
        self.max_pause = self.max_pause.max(pause);
    }

    pub fn record_growth(&mut self) {
        self.heap_growths += 1;
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn bytes_allocated(&self) -> u64 {
        self.bytes_allocated
    }

    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_reclaimed
    }

    pub fn heap_growths(&self) -> u64 {
        self.heap_growths
    }

    /// Get summary statistics
    pub fn summary(&self) -> GcSummary {
        let avg_pause_ms = if self.cycles == 0 {
            0.0
        } else {
            self.total_pause.as_secs_f64() * 1000.0 / self.cycles as f64
        };

        GcSummary {
            total_cycles: self.cycles,
            allocations: self.allocations,
            bytes_allocated: self.bytes_allocated,
            objects_reclaimed: self.objects_reclaimed,
            bytes_reclaimed: self.bytes_reclaimed,
            free_list_hits: self.free_list_hits,
            heap_growths: self.heap_growths,
            avg_pause_ms,
            max_pause_ms: self.max_pause.as_secs_f64() * 1000.0,
            live_bytes_after_last_cycle: self.live_bytes,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Summary statistics
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct GcSummary {
    pub total_cycles: u64,
    pub allocations: u64,
    pub bytes_allocated: u64,
    pub objects_reclaimed: u64,
    pub bytes_reclaimed: u64,
    /// Allocations served from the free list instead of the bump tail
    pub free_list_hits: u64,
    pub heap_growths: u64,
    pub avg_pause_ms: f64,
    pub max_pause_ms: f64,
    pub live_bytes_after_last_cycle: usize,
}

impl GcSummary {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_summarize() {
        let mut stats = GcStats::new();
        stats.record_allocation(32, false);
        stats.record_allocation(48, true);
        stats.record_collection(1, 32, 48, Duration::from_millis(2));
        stats.record_collection(0, 0, 48, Duration::from_millis(4));

        let summary = stats.summary();
        assert_eq!(summary.total_cycles, 2);
        assert_eq!(summary.allocations, 2);
        assert_eq!(summary.bytes_allocated, 80);
        assert_eq!(summary.free_list_hits, 1);
        assert_eq!(summary.bytes_reclaimed, 32);
        assert!((summary.avg_pause_ms - 3.0).abs() < 1e-9);
        assert!((summary.max_pause_ms - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_serializes() {
        let json = GcStats::new().summary().to_json();
        assert!(json.contains("\"total_cycles\":0"));
    }

    #[test]
    fn test_reset() {
        let mut stats = GcStats::new();
        stats.record_growth();
        stats.reset();
        assert_eq!(stats.heap_growths(), 0);
    }
}
