//! Host Memory - Backing storage for the heap region
//!
//! The heap needs one contiguous address range that can only grow. How that
//! range is obtained depends on the target:
//!
//! ```text
//! native:  mmap(max_heap_size) ──► commit initial ──► commit grow_step ... ──► max
//!          [base ........ committed ........................ reserved)
//!
//! wasm32:  memory.grow(initial pages) ──► memory.grow(n) ... ──► max
//!          [base ........ committed)  (must stay at the end of linear memory)
//! ```

use crate::config::HeapConfig;
use crate::error::{GcError, Result};

/// Host primitive providing a growable, contiguous region
pub trait HostMemory {
    /// First byte of the region
    fn base(&self) -> usize;

    /// Bytes usable from `base`
    fn committed(&self) -> usize;

    /// Upper bound `committed` may reach
    fn limit(&self) -> usize;

    /// Extend the region by at least `additional` bytes
    ///
    /// Returns the new committed size. The region never moves.
    fn grow(&mut self, additional: usize) -> Result<usize>;
}

/// Create the backing memory for the current target
pub fn default_host_memory(config: &HeapConfig) -> Result<Box<dyn HostMemory + Send>> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        Ok(Box::new(NativeArena::reserve(
            config.initial_heap_size,
            config.max_heap_size,
        )?))
    }

    #[cfg(target_arch = "wasm32")]
    {
        Ok(Box::new(LinearMemory::claim(
            config.initial_heap_size,
            config.max_heap_size,
        )?))
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::NativeArena;

#[cfg(target_arch = "wasm32")]
pub use wasm::LinearMemory;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::HostMemory;
    use crate::error::{GcError, Result};
    use crate::util::Alignment;
    use memmap2::{MmapMut, MmapOptions};

    /// Anonymous mapping reserved at `max_heap_size`, committed on demand
    ///
    /// The kernel backs anonymous pages lazily, so "committing" only moves the
    /// boundary the heap is allowed to touch.
    pub struct NativeArena {
        mmap: MmapMut,
        committed: usize,
    }

    impl NativeArena {
        pub fn reserve(initial: usize, max: usize) -> Result<Self> {
            let page = page_size::get();
            let reserved = Alignment::align_up(max, page)
                .ok_or_else(|| GcError::HostMemory(format!("cannot reserve {} bytes", max)))?;

            let mmap = MmapOptions::new().len(reserved).map_anon().map_err(|e| {
                GcError::HostMemory(format!("failed to reserve {} bytes: {}", reserved, e))
            })?;

            let committed = Alignment::align_up(initial, page)
                .unwrap_or(reserved)
                .min(reserved);

            log::debug!(
                target: "spy_gc",
                "reserved native arena at {:#x}: {} bytes, {} committed",
                mmap.as_ptr() as usize,
                reserved,
                committed
            );

            Ok(Self { mmap, committed })
        }
    }

    impl HostMemory for NativeArena {
        fn base(&self) -> usize {
            self.mmap.as_ptr() as usize
        }

        fn committed(&self) -> usize {
            self.committed
        }

        fn limit(&self) -> usize {
            self.mmap.len()
        }

        fn grow(&mut self, additional: usize) -> Result<usize> {
            let available = self.limit() - self.committed;
            let step = Alignment::align_up(additional, page_size::get()).unwrap_or(usize::MAX);

            if additional > available {
                return Err(GcError::OutOfMemory {
                    requested: additional,
                    available,
                });
            }

            self.committed += step.min(available);
            Ok(self.committed)
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm {
    use super::HostMemory;
    use crate::error::{GcError, Result};
    use crate::util::constants::WASM_PAGE_SIZE;
    use core::arch::wasm32;

    /// Tail of the module's linear memory, grown with `memory.grow`
    pub struct LinearMemory {
        base: usize,
        committed: usize,
        limit: usize,
    }

    impl LinearMemory {
        /// Append `initial` bytes to linear memory and own them
        pub fn claim(initial: usize, max: usize) -> Result<Self> {
            let pages = initial.div_ceil(WASM_PAGE_SIZE);
            let previous = wasm32::memory_grow::<0>(pages);
            if previous == usize::MAX {
                return Err(GcError::HostMemory(format!(
                    "memory.grow({}) refused by host",
                    pages
                )));
            }

            Ok(Self {
                base: previous * WASM_PAGE_SIZE,
                committed: pages * WASM_PAGE_SIZE,
                limit: max.max(pages * WASM_PAGE_SIZE),
            })
        }
    }

    impl HostMemory for LinearMemory {
        fn base(&self) -> usize {
            self.base
        }

        fn committed(&self) -> usize {
            self.committed
        }

        fn limit(&self) -> usize {
            self.limit
        }

        fn grow(&mut self, additional: usize) -> Result<usize> {
            let available = self.limit - self.committed;
            let pages = additional.div_ceil(WASM_PAGE_SIZE);
            let bytes = pages * WASM_PAGE_SIZE;

            if bytes > available {
                return Err(GcError::OutOfMemory {
                    requested: additional,
                    available,
                });
            }

            let end = self.base + self.committed;
            if wasm32::memory_size::<0>() * WASM_PAGE_SIZE != end {
                return Err(GcError::HostMemory(
                    "linear memory was grown by someone else; heap region is no longer at its end"
                        .to_string(),
                ));
            }

            let previous = wasm32::memory_grow::<0>(pages);
            if previous == usize::MAX {
                return Err(GcError::HostMemory(format!(
                    "memory.grow({}) refused by host",
                    pages
                )));
            }

            self.committed += bytes;
            Ok(self.committed)
        }
    }
}

/// Bytes a grow request asks the host for
pub(crate) fn grow_request(needed: usize, config: &HeapConfig) -> usize {
    needed.max(config.grow_step)
}

/// Error for a grow request the host cannot satisfy
pub(crate) fn exhausted(requested: usize, memory: &dyn HostMemory) -> GcError {
    GcError::OutOfMemory {
        requested,
        available: memory.limit() - memory.committed(),
    }
}
