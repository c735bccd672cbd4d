//! # spy-gc - Heap and Garbage Collector for the SPy runtime
//!
//! spy-gc owns the memory of a compiled SPy program: one contiguous heap
//! region, a uniform object header, a stop-the-world mark-and-sweep
//! collector, and the two builtin value kinds generated code relies on
//! (strings and raw buffers). The same layout and allocation discipline run
//! on WebAssembly linear memory and on native hardware.
//!
//! ## Quick Start
//!
//! ```rust
//! use spy_gc::{Heap, HeapConfig, SpyStr};
//!
//! fn main() -> Result<(), spy_gc::GcError> {
//!     let mut heap = Heap::new(HeapConfig::default())?;
//!
//!     // Keep the string alive across collections
//!     let frame = heap.roots_mut().enter_frame();
//!     let s = SpyStr::from_str(&mut heap, "hello")?;
//!     heap.roots_mut().push(Some(s.obj()));
//!
//!     heap.collect()?;
//!     assert_eq!(s.as_str(&heap)?, "hello");
//!
//!     heap.roots_mut().leave_frame(frame);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Generated code / spy-runtime             │
//! │      allocate ──┐            ┌── roots (shadow frames,   │
//! │                 │            │   handles, global slots)  │
//! └─────────────────┼────────────┼───────────────────────────┘
//!                   ▼            │
//! ┌──────────────────────────────┼───────────────────────────┐
//! │  Heap                        │                           │
//! │   1. bump tail [top, end)    │                           │
//! │   2. first-fit free list     ▼                           │
//! │   3. collect ──► Mark (explicit stack) ──► Sweep         │
//! │   4. grow host memory        (coalesce, rebuild list)    │
//! │   5. OutOfMemory                                         │
//! └──────────────────────────────────────────────────────────┘
//!                   │
//!                   ▼
//!       HostMemory: mmap arena (native) │ memory.grow (wasm32)
//! ```
//!
//! ### Object Layout
//!
//! ```text
//! header_addr                      ref (what generated code holds)
//! │                                │
//! ┌──────────┬──────────┬──────────┬──────────────────────────────┐
//! │ mark     │ type     │ size     │ payload                      │
//! └──────────┴──────────┴──────────┴──────────────────────────────┘
//! ```
//!
//! ## Safety
//!
//! The collector only sees what the root set shows it. Callers must:
//!
//! 1. **Root every live reference before allocating**: any allocation may collect
//! 2. **Keep shadow frames valid while installed**: they are read during marking
//! 3. **Never keep payload borrows across allocation**: the borrow checker enforces
//!    this for the safe API
//!
//! ### Thread Safety
//!
//! - `Heap` is `Send` but not `Sync`: a single mutator owns it
//! - There are no GC threads; collection runs on the caller's thread
//!
//! ## Modules
//!
//! - [`config`]: Heap sizing and debug switches
//! - [`error`]: Error types for every operation
//! - [`gc`]: Collection cycle and state machine
//! - [`heap`]: Region, allocator, free list and host memory
//! - [`logging`]: Structured GC events
//! - [`marker`]: Root set and tracing
//! - [`object`]: Header, descriptors and reference maps
//! - [`stats`]: Counters and timers
//! - [`sweeper`]: Reclamation and coalescing
//! - [`util`]: Alignment and debugging helpers
//! - [`value`]: Strings and raw buffers

// Core
pub mod config;
pub mod error;
pub mod gc;

// Memory
pub mod heap;
pub mod object;

// Collection
pub mod marker;
pub mod sweeper;

// Values
pub mod value;

// Monitoring
pub mod logging;
pub mod stats;

pub mod util;

pub use config::HeapConfig;
pub use error::{GcError, Result};
pub use gc::{CollectionReport, GcReason, GcState};
pub use heap::{Heap, HeapBlock, HeapReport};
pub use marker::{RootSet, ShadowFrame, ROOT_SET_VERSION};
pub use object::{DescriptorId, Layout, ObjRef, TypeDescriptor};
pub use value::{with_pinned, RawBuffer, SpyStr};

/// spy-gc version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a heap with the default configuration
pub fn init() -> Result<Heap> {
    Heap::new(HeapConfig::default())
}

/// Create a heap configured from `SPY_HEAP_*` / `SPY_GC_*` variables
///
/// ```rust
/// let heap = spy_gc::init_from_env()?;
/// assert_eq!(heap.used_bytes(), 0);
/// # Ok::<(), spy_gc::GcError>(())
/// ```
pub fn init_from_env() -> Result<Heap> {
    Heap::new(HeapConfig::from_env())
}
