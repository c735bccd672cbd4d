//! GC Logging and Tracing
//!
//! Every heap keeps a bounded ring of structured [`GcEvent`]s and forwards
//! each one, formatted, to the `log` facade under target `spy_gc`. Whatever
//! logger the embedding program installs decides where the line ends up;
//! the runtime library routes it to the host console.
//!
//! Log Levels:
//! - ERROR: allocation failures
//! - INFO: collection cycles and heap growth (when verbose)
//! - DEBUG: phases, cycles when not verbose
//! - TRACE: mark statistics

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Log level for GC events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

/// GC event types
#[derive(Debug, Clone, PartialEq)]
pub enum GcEvent {
    /// Collection cycle started
    CycleStart { cycle: u64, reason: String },

    /// Phase of a cycle completed
    PhaseEnd {
        cycle: u64,
        phase: String,
        duration_ms: f64,
    },

    /// Collection cycle completed
    CycleEnd {
        cycle: u64,
        duration_ms: f64,
        reclaimed_bytes: usize,
        live_bytes: usize,
    },

    /// Mark phase statistics
    MarkStats {
        cycle: u64,
        roots: usize,
        marked_objects: usize,
    },

    /// Heap statistics after a cycle
    HeapStats {
        used_bytes: usize,
        total_bytes: usize,
        utilization: f64,
    },

    /// Backing memory grown
    HeapGrow { old_size: usize, new_size: usize },

    /// Allocation could not be satisfied
    AllocationFailure { size: usize, heap_used: usize },
}

/// GC Logger configuration
#[derive(Debug, Clone)]
pub struct GcLoggerConfig {
    /// Most detailed level recorded
    pub level: LogLevel,

    /// Promote cycle events from DEBUG to INFO
    pub verbose: bool,

    /// Format forwarded lines as JSON
    pub json: bool,

    /// Prefix forwarded lines with a local timestamp
    pub timestamps: bool,

    /// Events kept in the ring
    pub capacity: usize,

    /// Forward formatted events to the `log` facade
    pub forward: bool,
}

impl Default for GcLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Debug,
            verbose: false,
            json: false,
            timestamps: true,
            capacity: 256,
            forward: true,
        }
    }
}

/// Structured event log owned by a heap
pub struct GcLogger {
    config: GcLoggerConfig,
    events: VecDeque<(DateTime<Local>, GcEvent)>,
    enabled: bool,
}

impl GcLogger {
    pub fn new(config: GcLoggerConfig) -> Self {
        Self {
            events: VecDeque::with_capacity(config.capacity.min(1024)),
            config,
            enabled: true,
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn config(&self) -> &GcLoggerConfig {
        &self.config
    }

    /// Record an event and forward it
    pub fn log(&mut self, event: GcEvent) {
        if !self.enabled {
            return;
        }

        let level = self.event_level(&event);
        if level > self.config.level {
            return;
        }

        let now = Local::now();
        let log_level: log::Level = level.into();

        if self.config.forward && log::log_enabled!(target: "spy_gc", log_level) {
            let line = if self.config.json {
                format_json(&event).to_string()
            } else {
                format_human(&event)
            };
            if self.config.timestamps {
                log::log!(
                    target: "spy_gc",
                    log_level,
                    "[{}] {}",
                    now.format("%Y-%m-%d %H:%M:%S%.3f"),
                    line
                );
            } else {
                log::log!(target: "spy_gc", log_level, "{}", line);
            }
        }

        if self.config.capacity == 0 {
            return;
        }
        if self.events.len() == self.config.capacity {
            self.events.pop_front();
        }
        self.events.push_back((now, event));
    }

    fn event_level(&self, event: &GcEvent) -> LogLevel {
        match event {
            GcEvent::AllocationFailure { .. } => LogLevel::Error,
            GcEvent::CycleStart { .. }
            | GcEvent::CycleEnd { .. }
            | GcEvent::HeapStats { .. }
            | GcEvent::HeapGrow { .. } => {
                if self.config.verbose {
                    LogLevel::Info
                } else {
                    LogLevel::Debug
                }
            }
            GcEvent::PhaseEnd { .. } => LogLevel::Debug,
            GcEvent::MarkStats { .. } => LogLevel::Trace,
        }
    }

    /// Events currently in the ring, oldest first
    pub fn events(&self) -> impl Iterator<Item = &GcEvent> {
        self.events.iter().map(|(_, event)| event)
    }

    /// Events with their timestamps
    pub fn timed_events(&self) -> Vec<(DateTime<Local>, GcEvent)> {
        self.events.iter().cloned().collect()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

impl Default for GcLogger {
    fn default() -> Self {
        Self::new(default_logger_config())
    }
}

/// Human-readable one-line rendering
pub fn format_human(event: &GcEvent) -> String {
    match event {
        GcEvent::CycleStart { cycle, reason } => {
            format!("[GC] Cycle {} started (reason: {})", cycle, reason)
        }
        GcEvent::PhaseEnd {
            cycle,
            phase,
            duration_ms,
        } => format!(
            "[GC] Cycle {}: {} phase completed ({:.3}ms)",
            cycle, phase, duration_ms
        ),
        GcEvent::CycleEnd {
            cycle,
            duration_ms,
            reclaimed_bytes,
            live_bytes,
        } => format!(
            "[GC] Cycle {} completed ({:.3}ms, reclaimed {} bytes, {} bytes live)",
            cycle, duration_ms, reclaimed_bytes, live_bytes
        ),
        GcEvent::MarkStats {
            cycle,
            roots,
            marked_objects,
        } => format!(
            "[GC] Cycle {}: {} roots, {} objects marked",
            cycle, roots, marked_objects
        ),
        GcEvent::HeapStats {
            used_bytes,
            total_bytes,
            utilization,
        } => format!(
            "[GC] Heap: {}/{} bytes ({:.1}% utilized)",
            used_bytes,
            total_bytes,
            utilization * 100.0
        ),
        GcEvent::HeapGrow { old_size, new_size } => {
            format!("[GC] Heap grown from {} to {} bytes", old_size, new_size)
        }
        GcEvent::AllocationFailure { size, heap_used } => format!(
            "[GC] Allocation failure: {} bytes (heap used: {})",
            size, heap_used
        ),
    }
}

/// JSON rendering
pub fn format_json(event: &GcEvent) -> serde_json::Value {
    match event {
        GcEvent::CycleStart { cycle, reason } => serde_json::json!({
            "type": "cycle_start",
            "cycle": cycle,
            "reason": reason
        }),
        GcEvent::PhaseEnd {
            cycle,
            phase,
            duration_ms,
        } => serde_json::json!({
            "type": "phase_end",
            "cycle": cycle,
            "phase": phase,
            "duration_ms": duration_ms
        }),
        GcEvent::CycleEnd {
            cycle,
            duration_ms,
            reclaimed_bytes,
            live_bytes,
        } => serde_json::json!({
            "type": "cycle_end",
            "cycle": cycle,
            "duration_ms": duration_ms,
            "reclaimed_bytes": reclaimed_bytes,
            "live_bytes": live_bytes
        }),
        GcEvent::MarkStats {
            cycle,
            roots,
            marked_objects,
        } => serde_json::json!({
            "type": "mark_stats",
            "cycle": cycle,
            "roots": roots,
            "marked_objects": marked_objects
        }),
        GcEvent::HeapStats {
            used_bytes,
            total_bytes,
            utilization,
        } => serde_json::json!({
            "type": "heap_stats",
            "used_bytes": used_bytes,
            "total_bytes": total_bytes,
            "utilization": utilization
        }),
        GcEvent::HeapGrow { old_size, new_size } => serde_json::json!({
            "type": "heap_grow",
            "old_size": old_size,
            "new_size": new_size
        }),
        GcEvent::AllocationFailure { size, heap_used } => serde_json::json!({
            "type": "allocation_failure",
            "size": size,
            "heap_used": heap_used
        }),
    }
}

/// Defaults for loggers created after this point
lazy_static::lazy_static! {
    static ref DEFAULT_CONFIG: Mutex<GcLoggerConfig> = Mutex::new(GcLoggerConfig::default());
}

/// Configure the defaults used by every new heap's logger
pub fn configure_logger(config: GcLoggerConfig) {
    if let Ok(mut default) = DEFAULT_CONFIG.lock() {
        *default = config;
    }
}

/// Current default logger configuration
pub fn default_logger_config() -> GcLoggerConfig {
    match DEFAULT_CONFIG.lock() {
        Ok(config) => config.clone(),
        Err(_) => GcLoggerConfig::default(),
    }
}
