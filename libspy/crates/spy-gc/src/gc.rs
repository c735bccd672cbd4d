//! GC Core - Stop-the-world mark and sweep
//!
//! ```text
//!  Idle ──collect──► Marking ──► Sweeping ──► Idle
//!   ▲                  │            │
//!   └──── error ───────┴────────────┘   (marks cleared, error returned)
//! ```
//!
//! A cycle runs synchronously on the mutator's thread, either because an
//! allocation could not be served or because `Heap::collect` was called.
//! Running out of reclaimable memory is not an error here; only a broken
//! root set or header fails a cycle.

use crate::error::{GcError, Result};
use crate::heap::Heap;
use crate::logging::GcEvent;
use crate::marker::{HeapView, MarkResult, MarkStackStats, Marker};
use crate::object::header::{header_at_mut, HEADER_SIZE, OBJECT_ALIGNMENT};
use crate::stats::GcTimer;
use crate::sweeper::{self, SweepResult};
use crate::util::Alignment;
use std::time::Duration;

/// Collector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcState {
    /// No collection in progress
    Idle,
    /// Tracing from the root set
    Marking,
    /// Reclaiming unmarked objects
    Sweeping,
}

/// Reason for a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcReason {
    /// `Heap::collect` / `spy_gc_collect`
    Explicit,
    /// Neither the bump tail nor the free list could serve an allocation
    AllocationFailure,
}

impl std::fmt::Display for GcReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GcReason::Explicit => write!(f, "explicit"),
            GcReason::AllocationFailure => write!(f, "allocation failure"),
        }
    }
}

/// Outcome of one collection cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionReport {
    pub cycle: u64,
    pub reason: GcReason,
    pub roots: usize,
    pub marked_objects: usize,
    /// Worklist usage during marking
    pub mark_stack: MarkStackStats,
    pub reclaimed_objects: usize,
    pub reclaimed_bytes: usize,
    pub live_bytes: usize,
    pub free_chunks: usize,
    pub free_bytes: usize,
    /// Bump tail after the cycle
    pub tail_bytes: usize,
    pub mark_duration: Duration,
    pub sweep_duration: Duration,
    pub duration: Duration,
}

/// Collector bookkeeping owned by the heap
#[derive(Debug)]
pub struct Collector {
    state: GcState,
    cycle: u64,
    marker: Marker,
    last_report: Option<CollectionReport>,
}

impl Collector {
    pub fn new() -> Self {
        Self {
            state: GcState::Idle,
            cycle: 0,
            marker: Marker::new(),
            last_report: None,
        }
    }

    pub fn state(&self) -> GcState {
        self.state
    }

    /// Completed and attempted cycles
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    fn transition(&mut self, from: GcState, to: GcState) -> Result<()> {
        if self.state != from {
            return Err(GcError::InvalidState {
                expected: format!("{:?}", from),
                actual: format!("{:?}", self.state),
            });
        }
        self.state = to;
        Ok(())
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    /// Run a full collection now
    pub fn collect(&mut self) -> Result<CollectionReport> {
        self.collect_for(GcReason::Explicit)
    }

    pub fn gc_state(&self) -> GcState {
        self.collector.state()
    }

    pub fn last_collection(&self) -> Option<&CollectionReport> {
        self.collector.last_report.as_ref()
    }

    pub(crate) fn collect_for(&mut self, reason: GcReason) -> Result<CollectionReport> {
        self.collector.transition(GcState::Idle, GcState::Marking)?;
        self.collector.cycle += 1;
        let cycle = self.collector.cycle;
        let mut timer = GcTimer::new();

        self.logger.log(GcEvent::CycleStart {
            cycle,
            reason: reason.to_string(),
        });

        let mark = match self.mark_phase() {
            Ok(mark) => mark,
            Err(e) => return Err(self.abort_cycle(e)),
        };
        let mark_duration = timer.lap();
        self.logger.log(GcEvent::PhaseEnd {
            cycle,
            phase: "mark".to_string(),
            duration_ms: mark_duration.as_secs_f64() * 1000.0,
        });
        self.logger.log(GcEvent::MarkStats {
            cycle,
            roots: mark.roots,
            marked_objects: mark.marked_objects,
        });

        self.collector.transition(GcState::Marking, GcState::Sweeping)?;
        let sweep = match self.sweep_phase() {
            Ok(sweep) => sweep,
            Err(e) => return Err(self.abort_cycle(e)),
        };
        let sweep_duration = timer.lap();
        self.logger.log(GcEvent::PhaseEnd {
            cycle,
            phase: "sweep".to_string(),
            duration_ms: sweep_duration.as_secs_f64() * 1000.0,
        });
        self.collector.transition(GcState::Sweeping, GcState::Idle)?;

        let duration = mark_duration + sweep_duration;
        let report = CollectionReport {
            cycle,
            reason,
            roots: mark.roots,
            marked_objects: mark.marked_objects,
            mark_stack: mark.stack,
            reclaimed_objects: sweep.reclaimed_objects,
            reclaimed_bytes: sweep.reclaimed_bytes,
            live_bytes: sweep.live_bytes,
            free_chunks: sweep.free_chunks,
            free_bytes: sweep.free_bytes,
            tail_bytes: self.tail_remaining(),
            mark_duration,
            sweep_duration,
            duration,
        };

        if self.config.stats_enabled {
            self.stats.record_collection(
                sweep.reclaimed_objects,
                sweep.reclaimed_bytes,
                sweep.live_bytes,
                duration,
            );
        }

        self.logger.log(GcEvent::CycleEnd {
            cycle,
            duration_ms: duration.as_secs_f64() * 1000.0,
            reclaimed_bytes: sweep.reclaimed_bytes,
            live_bytes: sweep.live_bytes,
        });
        let total_bytes = self.committed_bytes();
        self.logger.log(GcEvent::HeapStats {
            used_bytes: sweep.live_bytes,
            total_bytes,
            utilization: if total_bytes == 0 {
                0.0
            } else {
                sweep.live_bytes as f64 / total_bytes as f64
            },
        });

        if self.config.verify_heap {
            self.verify()?;
        }

        self.collector.last_report = Some(report.clone());
        Ok(report)
    }

    fn mark_phase(&mut self) -> Result<MarkResult> {
        let view = HeapView {
            start: self.start,
            top: self.top,
            descriptors: &self.descriptors,
        };
        self.collector.marker.mark_from_roots(view, &self.roots)
    }

    fn sweep_phase(&mut self) -> Result<SweepResult> {
        // SAFETY: [start, top) is tiled by headers and marking completed
        let sweep = unsafe {
            sweeper::sweep(
                self.start,
                self.top,
                &mut self.free_list,
                self.config.poison_free_memory,
            )?
        };
        self.top = sweep.new_top;
        Ok(sweep)
    }

    /// Leave the heap unmarked and idle after a failed cycle
    fn abort_cycle(&mut self, error: GcError) -> GcError {
        log::error!(target: "spy_gc", "collection {} failed: {}", self.collector.cycle, error);

        let mut addr = self.start;
        while addr < self.top {
            // SAFETY: walk stops at the first header with an implausible size
            let header = unsafe { header_at_mut(addr) };
            let size = header.size();
            if size < HEADER_SIZE || !Alignment::is_aligned(size, OBJECT_ALIGNMENT) || size > self.top - addr {
                break;
            }
            header.clear_mark();
            addr += size;
        }

        self.collector.state = GcState::Idle;
        error
    }
}
