//! Configuration Module - Heap Tuning Parameters
//!
//! Controls how large the heap region starts, how far it may grow and which
//! debug checks run around a collection.

use crate::util::constants::{GB, KB, MB};

/// Main configuration for the SPy heap
///
/// # Examples
///
/// ```rust
/// use spy_gc::HeapConfig;
///
/// let config = HeapConfig {
///     initial_heap_size: 64 * 1024,
///     max_heap_size: 4 * 1024 * 1024,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Bytes committed when the heap is created
    ///
    /// Default: 1MB
    pub initial_heap_size: usize,

    /// Hard limit for the heap region
    ///
    /// On native targets the whole range is reserved up front and committed
    /// on demand. On wasm32 it caps how far linear memory is grown.
    /// Default: 256MB native, 1GB wasm32
    pub max_heap_size: usize,

    /// Minimum number of bytes requested from the host per growth
    ///
    /// Default: 1MB
    pub grow_step: usize,

    /// Log every collection cycle at info level
    ///
    /// Default: false
    pub verbose: bool,

    /// Collect allocation and pause statistics
    ///
    /// Default: true
    pub stats_enabled: bool,

    /// Run `Heap::verify` after each collection
    ///
    /// Default: true in debug builds
    pub verify_heap: bool,

    /// Fill reclaimed payloads with `POISON_BYTE`
    ///
    /// Default: true in debug builds
    pub poison_free_memory: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        HeapConfig {
            initial_heap_size: MB,
            max_heap_size: default_max_heap(),
            grow_step: MB,
            verbose: false,
            stats_enabled: true,
            verify_heap: cfg!(debug_assertions),
            poison_free_memory: cfg!(debug_assertions),
        }
    }
}

impl HeapConfig {
    /// Validate configuration
    ///
    /// ```rust
    /// use spy_gc::HeapConfig;
    ///
    /// let config = HeapConfig {
    ///     max_heap_size: 0,
    ///     ..Default::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_heap_size == 0 {
            return Err(ConfigError::InvalidHeapSize(
                "max_heap_size must be > 0".to_string(),
            ));
        }

        if self.initial_heap_size < MIN_HEAP_SIZE {
            return Err(ConfigError::InvalidHeapSize(format!(
                "initial_heap_size must be at least {} bytes",
                MIN_HEAP_SIZE
            )));
        }

        if self.initial_heap_size > self.max_heap_size {
            return Err(ConfigError::InvalidHeapSize(
                "initial_heap_size cannot exceed max_heap_size".to_string(),
            ));
        }

        if self.grow_step == 0 {
            return Err(ConfigError::InvalidGrowStep(
                "grow_step must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with:
    /// - SPY_HEAP_INITIAL
    /// - SPY_HEAP_MAX
    /// - SPY_HEAP_GROW_STEP
    /// - SPY_GC_VERBOSE
    /// - SPY_GC_VERIFY
    ///
    /// ```bash
    /// export SPY_HEAP_MAX=67108864   # 64MB
    /// export SPY_GC_VERBOSE=1
    /// ```
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_usize("SPY_HEAP_INITIAL") {
            config.initial_heap_size = size;
        }

        if let Some(size) = env_usize("SPY_HEAP_MAX") {
            config.max_heap_size = size;
        }

        if let Some(size) = env_usize("SPY_HEAP_GROW_STEP") {
            config.grow_step = size;
        }

        if let Some(flag) = env_flag("SPY_GC_VERBOSE") {
            config.verbose = flag;
        }

        if let Some(flag) = env_flag("SPY_GC_VERIFY") {
            config.verify_heap = flag;
        }

        config
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid heap size: {0}")]
    InvalidHeapSize(String),

    #[error("Invalid grow step: {0}")]
    InvalidGrowStep(String),
}

/// Smallest heap that can hold a handful of objects
pub const MIN_HEAP_SIZE: usize = 4 * KB;

fn default_max_heap() -> usize {
    if cfg!(target_arch = "wasm32") {
        GB
    } else {
        256 * MB
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.parse().ok()
}

fn env_flag(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    Some(val == "1" || val.eq_ignore_ascii_case("true"))
}
