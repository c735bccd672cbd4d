//! Heap Module - Contiguous region, bump allocation and free-list reuse
//!
//! ```text
//! start                                   top                 end          limit
//!   │ [hdr|payload][FREE ...][hdr|payload] │     bump tail     │  reserve     │
//!   └──────────── tiled by headers ────────┴───────────────────┴──────────────┘
//! ```
//!
//! Allocation order:
//! 1. bump `top` if the tail is large enough
//! 2. first-fit on the address-ordered free list
//! 3. full collection, then retry 1 and 2
//! 4. grow the backing memory by `max(grow_step, shortfall)`
//! 5. `GcError::OutOfMemory`
//!
//! # Thread Safety
//!
//! `Heap` is `Send` but not `Sync`: one mutator owns it and collections run
//! synchronously inside its allocation calls.

pub mod free_list;
pub mod memory;

pub use free_list::FreeList;
pub use memory::{default_host_memory, HostMemory};

#[cfg(not(target_arch = "wasm32"))]
pub use memory::NativeArena;
#[cfg(target_arch = "wasm32")]
pub use memory::LinearMemory;

use crate::config::HeapConfig;
use crate::error::{GcError, Result};
use crate::gc::{Collector, GcReason};
use crate::logging::{GcEvent, GcLogger, GcLoggerConfig};
use crate::marker::{HeapView, RootSet};
use crate::object::header::{header_at, write_header, ObjectHeader, HEADER_SIZE, OBJECT_ALIGNMENT};
use crate::object::{DescriptorId, DescriptorTable, Layout, ObjRef, TypeDescriptor};
use crate::stats::GcStats;
use crate::util::constants::WORD_SIZE;
use crate::util::debug::format_address;
use crate::util::Alignment;
use indexmap::IndexMap;

/// One header-delimited block of the allocated region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapBlock {
    Live {
        obj: ObjRef,
        descriptor: DescriptorId,
        size: usize,
    },
    Free {
        header_addr: usize,
        size: usize,
    },
}

/// Result of `Heap::verify`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapReport {
    pub live_objects: usize,
    pub live_bytes: usize,
    pub free_chunks: usize,
    pub free_bytes: usize,
    /// Unallocated bytes between `top` and the end of committed memory
    pub tail_bytes: usize,
    pub committed_bytes: usize,
}

/// Garbage-collected heap
pub struct Heap {
    pub(crate) config: HeapConfig,
    pub(crate) memory: Box<dyn HostMemory + Send>,
    pub(crate) start: usize,
    pub(crate) top: usize,
    pub(crate) free_list: FreeList,
    pub(crate) descriptors: DescriptorTable,
    pub(crate) roots: RootSet,
    pub(crate) collector: Collector,
    pub(crate) stats: GcStats,
    pub(crate) logger: GcLogger,
}

impl Heap {
    /// Create a heap backed by the target's default host memory
    pub fn new(config: HeapConfig) -> Result<Self> {
        config.validate()?;
        let memory = default_host_memory(&config)?;
        Self::with_memory(config, memory)
    }

    /// Create a heap over caller-supplied backing memory
    pub fn with_memory(config: HeapConfig, memory: Box<dyn HostMemory + Send>) -> Result<Self> {
        config.validate()?;

        let base = memory.base();
        let start = Alignment::align_up(base, OBJECT_ALIGNMENT)
            .ok_or_else(|| GcError::HostMemory(format!("unusable base {:#x}", base)))?;
        if start + HEADER_SIZE > base + memory.committed() {
            return Err(GcError::HostMemory(format!(
                "backing memory of {} bytes is too small",
                memory.committed()
            )));
        }

        let logger = GcLogger::new(GcLoggerConfig {
            verbose: config.verbose,
            ..crate::logging::default_logger_config()
        });

        log::debug!(
            target: "spy_gc",
            "heap created at {} ({} bytes committed, limit {})",
            format_address(start),
            memory.committed(),
            memory.limit()
        );

        Ok(Self {
            config,
            memory,
            start,
            top: start,
            free_list: FreeList::new(),
            descriptors: DescriptorTable::with_builtins(),
            roots: RootSet::new(),
            collector: Collector::new(),
            stats: GcStats::new(),
            logger,
        })
    }

    // === Types ===

    /// Register a compiler-emitted type
    pub fn register_type(&mut self, descriptor: TypeDescriptor) -> Result<DescriptorId> {
        self.descriptors.register(descriptor)
    }

    pub fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    // === Allocation ===

    /// Allocate a zeroed object
    ///
    /// `length` is the element count for variable types (stored in the
    /// length field), the byte count for blobs, and ignored for fixed types.
    /// May run a full collection: every live reference must be rooted.
    pub fn allocate(&mut self, descriptor: DescriptorId, length: usize) -> Result<ObjRef> {
        let desc = self.descriptors.get(descriptor)?;
        let size = desc.allocation_size(length)?;
        let length_offset = match *desc.layout() {
            Layout::Variable { length_offset, .. } => Some(length_offset),
            Layout::Fixed { .. } | Layout::Blob => None,
        };

        let (header_addr, reused) = self.reserve(size)?;

        // SAFETY: reserve hands out `size` bytes nothing else owns
        unsafe {
            write_header(header_addr, ObjectHeader::live(descriptor, size));
            std::ptr::write_bytes((header_addr + HEADER_SIZE) as *mut u8, 0, size - HEADER_SIZE);
            if let Some(offset) = length_offset {
                *((header_addr + HEADER_SIZE + offset) as *mut usize) = length;
            }
        }

        if self.config.stats_enabled {
            self.stats.record_allocation(size, reused);
        }
        Ok(ObjRef::from_header(header_addr))
    }

    /// Allocate `size` bytes of zeroed, untraced memory
    pub fn allocate_blob(&mut self, size: usize) -> Result<ObjRef> {
        self.allocate(DescriptorId::RAW_MEMORY, size)
    }

    /// Find `size` bytes, returning the header address and whether the free
    /// list supplied them
    fn reserve(&mut self, size: usize) -> Result<(usize, bool)> {
        if let Some(found) = self.try_reserve(size) {
            return Ok(found);
        }

        self.collect_for(GcReason::AllocationFailure)?;
        if let Some(found) = self.try_reserve(size) {
            return Ok(found);
        }

        self.grow_for(size)?;
        self.try_reserve(size).ok_or(GcError::OutOfMemory {
            requested: size,
            available: self.tail_remaining(),
        })
    }

    fn try_reserve(&mut self, size: usize) -> Option<(usize, bool)> {
        if self.tail_remaining() >= size {
            let header_addr = self.top;
            self.top += size;
            return Some((header_addr, false));
        }

        // SAFETY: the list only holds free headers inside [start, top)
        unsafe { self.free_list.take_first_fit(size) }.map(|addr| (addr, true))
    }

    fn grow_for(&mut self, size: usize) -> Result<()> {
        let shortfall = size - self.tail_remaining();
        let old_size = self.memory.committed();
        let available = self.memory.limit() - old_size;
        let heap_used = self.used_bytes();

        if shortfall > available {
            self.logger.log(GcEvent::AllocationFailure { size, heap_used });
            return Err(memory::exhausted(size, &*self.memory));
        }

        let request = memory::grow_request(shortfall, &self.config).min(available);
        let new_size = match self.memory.grow(request) {
            Ok(new_size) => new_size,
            Err(e) => {
                self.logger.log(GcEvent::AllocationFailure { size, heap_used });
                return Err(e);
            }
        };

        self.logger.log(GcEvent::HeapGrow { old_size, new_size });
        if self.config.stats_enabled {
            self.stats.record_growth();
        }
        Ok(())
    }

    // === Roots ===

    pub fn roots(&self) -> &RootSet {
        &self.roots
    }

    pub fn roots_mut(&mut self) -> &mut RootSet {
        &mut self.roots
    }

    // === Object access ===

    pub(crate) fn view(&self) -> HeapView<'_> {
        HeapView {
            start: self.start,
            top: self.top,
            descriptors: &self.descriptors,
        }
    }

    /// True if `obj` is the payload address of a live object
    pub fn is_live(&self, obj: ObjRef) -> bool {
        self.view().validate_reference(obj.addr()).is_ok()
    }

    /// Descriptor of a live object
    pub fn descriptor_of(&self, obj: ObjRef) -> Result<DescriptorId> {
        let (header_addr, _) = self.view().validate_reference(obj.addr())?;
        // SAFETY: validated live header
        let raw = unsafe { header_at(header_addr) }.descriptor_raw();
        DescriptorId::new(raw as u32).ok_or(GcError::UnknownDescriptor(raw as u32))
    }

    /// Fail with `DescriptorMismatch` unless `obj` is a live `expected`
    pub fn expect_kind(&self, obj: ObjRef, expected: DescriptorId) -> Result<()> {
        let actual = self.descriptor_of(obj)?;
        if actual != expected {
            return Err(GcError::DescriptorMismatch {
                address: obj.addr(),
                expected: expected.index(),
                actual: actual.index(),
            });
        }
        Ok(())
    }

    /// Total size of a live object, header included
    pub fn object_size(&self, obj: ObjRef) -> Result<usize> {
        let (header_addr, _) = self.view().validate_reference(obj.addr())?;
        // SAFETY: validated live header
        Ok(unsafe { header_at(header_addr) }.size())
    }

    /// Payload bytes of a live object
    pub fn payload(&self, obj: ObjRef) -> Result<&[u8]> {
        let size = self.object_size(obj)?;
        // SAFETY: the payload belongs to a live object and &self blocks mutation
        Ok(unsafe { std::slice::from_raw_parts(obj.as_ptr(), size - HEADER_SIZE) })
    }

    /// Mutable payload bytes of a live object
    pub fn payload_mut(&mut self, obj: ObjRef) -> Result<&mut [u8]> {
        let size = self.object_size(obj)?;
        // SAFETY: as above, &mut self makes the borrow exclusive
        Ok(unsafe { std::slice::from_raw_parts_mut(obj.as_ptr(), size - HEADER_SIZE) })
    }

    /// Read the reference field at `offset` of a fixed-layout object
    pub fn read_ref(&self, obj: ObjRef, offset: usize) -> Result<Option<ObjRef>> {
        let addr = self.reference_slot(obj, offset)?;
        // SAFETY: slot checked against the object's reference map
        Ok(ObjRef::new(unsafe { *(addr as *const usize) }))
    }

    /// Store `value` into the reference field at `offset`
    pub fn write_ref(&mut self, obj: ObjRef, offset: usize, value: Option<ObjRef>) -> Result<()> {
        let addr = self.reference_slot(obj, offset)?;
        if let Some(target) = value {
            self.view().validate_reference(target.addr())?;
        }
        // SAFETY: slot checked against the object's reference map
        unsafe { *(addr as *mut usize) = value.map_or(0, ObjRef::addr) };
        Ok(())
    }

    fn reference_slot(&self, obj: ObjRef, offset: usize) -> Result<usize> {
        let (_, descriptor) = self.view().validate_reference(obj.addr())?;
        match descriptor.layout() {
            Layout::Fixed { payload_size, refs } => {
                let payload_size = *payload_size;
                if offset.checked_add(WORD_SIZE).map_or(true, |end| end > payload_size) {
                    return Err(GcError::IndexOutOfBounds {
                        index: offset,
                        length: payload_size,
                    });
                }
                if !refs.is_reference(offset) {
                    return Err(GcError::Configuration(format!(
                        "offset {} of '{}' is not a reference field",
                        offset,
                        descriptor.name()
                    )));
                }
                Ok(obj.addr() + offset)
            }
            Layout::Variable { .. } | Layout::Blob => Err(GcError::Configuration(format!(
                "'{}' has no reference fields",
                descriptor.name()
            ))),
        }
    }

    // === Inspection ===

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    pub fn logger(&self) -> &GcLogger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut GcLogger {
        &mut self.logger
    }

    /// First address of the region
    pub fn start(&self) -> usize {
        self.start
    }

    /// Bump cursor
    pub fn top(&self) -> usize {
        self.top
    }

    /// End of committed memory
    pub fn end(&self) -> usize {
        self.memory.base() + self.memory.committed()
    }

    /// Bytes between `start` and the bump cursor (live + free)
    pub fn used_bytes(&self) -> usize {
        self.top - self.start
    }

    pub fn committed_bytes(&self) -> usize {
        self.end() - self.start
    }

    /// Bytes the bump fast path can still hand out
    pub fn tail_remaining(&self) -> usize {
        self.end() - self.top
    }

    /// Free chunks as `(header_addr, size)`, in list order
    pub fn free_ranges(&self) -> Vec<(usize, usize)> {
        // SAFETY: the list only holds free headers inside [start, top)
        unsafe { self.free_list.iter() }.collect()
    }

    /// Walk `[start, top)` header by header
    pub fn blocks(&self) -> Result<Vec<HeapBlock>> {
        let mut blocks = Vec::new();
        let mut addr = self.start;

        while addr < self.top {
            // SAFETY: addr is a header boundary inside [start, top)
            let header = unsafe { header_at(addr) };
            let size = header.size();
            if size < HEADER_SIZE || !Alignment::is_aligned(size, OBJECT_ALIGNMENT) || size > self.top - addr {
                return Err(GcError::CorruptHeader {
                    address: addr,
                    descriptor: header.descriptor_raw(),
                    reason: format!("invalid size {}", size),
                });
            }

            if header.is_free() {
                blocks.push(HeapBlock::Free {
                    header_addr: addr,
                    size,
                });
            } else {
                let obj = ObjRef::from_header(addr);
                blocks.push(HeapBlock::Live {
                    obj,
                    descriptor: self.descriptor_of(obj)?,
                    size,
                });
            }
            addr += size;
        }

        Ok(blocks)
    }

    /// Check every heap invariant outside a collection
    ///
    /// - headers tile `[start, top)` exactly
    /// - free-list entries are exactly the FREE headers, in address order
    /// - no mark bits are set
    /// - every live header has a known descriptor and a matching size
    pub fn verify(&self) -> Result<HeapReport> {
        let mut report = HeapReport {
            tail_bytes: self.tail_remaining(),
            committed_bytes: self.committed_bytes(),
            ..Default::default()
        };
        let mut free_headers = Vec::new();

        let mut addr = self.start;
        while addr < self.top {
            // SAFETY: addr is a header boundary inside [start, top)
            let header = unsafe { header_at(addr) };
            let size = header.size();
            let corrupt = |reason: String| GcError::CorruptHeader {
                address: addr,
                descriptor: header.descriptor_raw(),
                reason,
            };

            if size < HEADER_SIZE || !Alignment::is_aligned(size, OBJECT_ALIGNMENT) || size > self.top - addr {
                return Err(corrupt(format!("invalid size {}", size)));
            }
            if header.is_marked() {
                return Err(corrupt("mark bit set outside a collection".to_string()));
            }

            if header.is_free() {
                free_headers.push((addr, size));
                report.free_chunks += 1;
                report.free_bytes += size;
            } else {
                self.view().validate_reference(addr + HEADER_SIZE)?;
                report.live_objects += 1;
                report.live_bytes += size;
            }
            addr += size;
        }

        if self.free_ranges() != free_headers {
            return Err(GcError::CorruptHeader {
                address: self.free_list.head(),
                descriptor: 0,
                reason: "free list does not match the free headers in the heap".to_string(),
            });
        }

        Ok(report)
    }

    /// Human-readable state summary
    pub fn diagnostics(&self) -> IndexMap<String, String> {
        let mut diag = IndexMap::new();

        diag.insert("state".to_string(), format!("{:?}", self.collector.state()));
        diag.insert("cycles".to_string(), self.collector.cycle().to_string());
        diag.insert("region_start".to_string(), format_address(self.start));
        diag.insert("region_top".to_string(), format_address(self.top));
        diag.insert("region_end".to_string(), format_address(self.end()));
        diag.insert("used_bytes".to_string(), self.used_bytes().to_string());
        diag.insert(
            "free_list_bytes".to_string(),
            self.free_list.free_bytes().to_string(),
        );
        diag.insert(
            "free_list_chunks".to_string(),
            self.free_list.chunk_count().to_string(),
        );
        diag.insert("tail_bytes".to_string(), self.tail_remaining().to_string());
        diag.insert("limit_bytes".to_string(), self.memory.limit().to_string());
        diag.insert("types".to_string(), self.descriptors.len().to_string());
        diag.insert(
            "roots".to_string(),
            format!(
                "{} handles, {} globals, {} shadow frames",
                self.roots.handle_count(),
                self.roots.global_count(),
                self.roots.shadow_depth()
            ),
        );
        diag.insert(
            "allocations".to_string(),
            self.stats.allocations().to_string(),
        );

        diag
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("start", &format_address(self.start))
            .field("top", &format_address(self.top))
            .field("end", &format_address(self.end()))
            .field("free_chunks", &self.free_list.chunk_count())
            .field("cycles", &self.collector.cycle())
            .finish()
    }
}
