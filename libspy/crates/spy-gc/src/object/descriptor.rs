//! Type Descriptors - Static per-type metadata used for sizing and tracing
//!
//! Every live header stores a [`DescriptorId`]. The id indexes a
//! [`DescriptorTable`] owned by the heap; the descriptor's [`Layout`] decides
//! both the allocation size and which payload words the tracer follows.
//!
//! The layout set is closed: one `match` computes sizes, one `match` traces.

use super::header::{HEADER_SIZE, OBJECT_ALIGNMENT};
use super::refmap::ReferenceMap;
use crate::error::{GcError, Result};
use crate::util::constants::WORD_SIZE;
use crate::util::Alignment;

/// Identifier of a registered type descriptor
///
/// Id 0 is reserved and never names a valid descriptor, so a zeroed header
/// can never pass validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DescriptorId(u32);

impl DescriptorId {
    /// Immutable UTF-8 string: `[len: W][bytes: len]`
    pub const STR: DescriptorId = DescriptorId(1);
    /// Growable byte buffer: `[len: W][capacity: W][bytes: capacity]`
    pub const RAW_BUFFER: DescriptorId = DescriptorId(2);
    /// Untraced raw memory handed out by `allocate_blob`
    pub const RAW_MEMORY: DescriptorId = DescriptorId(3);

    /// Number of builtin descriptors
    pub const BUILTIN_COUNT: u32 = 3;

    /// Wrap a raw id, rejecting the reserved 0
    pub const fn new(raw: u32) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(DescriptorId(raw))
        }
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Payload shape of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Fixed-size record with reference fields at known offsets
    Fixed {
        payload_size: usize,
        refs: ReferenceMap,
    },
    /// Length-prefixed data with no child references
    ///
    /// Payload size = `base_size + len * element_size`, where `len` is the word
    /// stored at `length_offset`.
    Variable {
        length_offset: usize,
        base_size: usize,
        element_size: usize,
    },
    /// Opaque bytes, size known only from the header
    Blob,
}

/// Type descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: String,
    layout: Layout,
}

impl TypeDescriptor {
    /// Fixed-size type with reference fields at `ref_offsets`
    pub fn fixed(name: impl Into<String>, payload_size: usize, ref_offsets: &[usize]) -> Result<Self> {
        let refs = ReferenceMap::new(ref_offsets)?;
        if refs.extent() > payload_size {
            return Err(GcError::Configuration(format!(
                "reference map extends to byte {} but payload is {} bytes",
                refs.extent(),
                payload_size
            )));
        }
        Ok(Self {
            name: name.into(),
            layout: Layout::Fixed { payload_size, refs },
        })
    }

    /// Variable-size type whose length word lives at `length_offset`
    pub fn variable(
        name: impl Into<String>,
        length_offset: usize,
        base_size: usize,
        element_size: usize,
    ) -> Result<Self> {
        if length_offset % WORD_SIZE != 0 || length_offset + WORD_SIZE > base_size {
            return Err(GcError::Configuration(format!(
                "length field at offset {} does not fit a {} byte base",
                length_offset, base_size
            )));
        }
        if element_size == 0 {
            return Err(GcError::Configuration(
                "element_size must be > 0".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            layout: Layout::Variable {
                length_offset,
                base_size,
                element_size,
            },
        })
    }

    pub fn blob(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layout: Layout::Blob,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Total bytes (header included, 8-byte aligned) for an instance
    ///
    /// `length` is the element count for variable types, the byte count for
    /// blobs, and ignored for fixed types.
    pub fn allocation_size(&self, length: usize) -> Result<usize> {
        let payload = match self.layout {
            Layout::Fixed { payload_size, .. } => Some(payload_size),
            Layout::Variable {
                base_size,
                element_size,
                ..
            } => length
                .checked_mul(element_size)
                .and_then(|bytes| bytes.checked_add(base_size)),
            Layout::Blob => Some(length),
        };

        payload
            .and_then(|p| p.checked_add(HEADER_SIZE))
            .and_then(|total| Alignment::align_up(total, OBJECT_ALIGNMENT))
            .ok_or(GcError::OutOfMemory {
                requested: usize::MAX,
                available: 0,
            })
    }

    /// Check that the size recorded in a header agrees with this layout
    ///
    /// # Safety
    /// `payload` must address an object of `recorded_size` bytes (header
    /// included) whose header is at `payload - HEADER_SIZE`.
    pub unsafe fn size_matches(&self, payload: usize, recorded_size: usize) -> bool {
        match self.layout {
            Layout::Fixed { .. } => self.allocation_size(0).ok() == Some(recorded_size),
            Layout::Variable { length_offset, .. } => {
                if length_offset + WORD_SIZE > recorded_size.saturating_sub(HEADER_SIZE) {
                    return false;
                }
                let length = *((payload + length_offset) as *const usize);
                self.allocation_size(length).ok() == Some(recorded_size)
            }
            Layout::Blob => recorded_size >= HEADER_SIZE && recorded_size % OBJECT_ALIGNMENT == 0,
        }
    }

    /// Call `visit` with every non-null reference stored in the payload
    ///
    /// # Safety
    /// `payload` must address a live object of this type.
    pub unsafe fn for_each_reference<E>(
        &self,
        payload: usize,
        mut visit: impl FnMut(usize) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        match &self.layout {
            Layout::Fixed { refs, .. } => {
                for offset in refs.iter() {
                    let child = *((payload + offset) as *const usize);
                    if child != 0 {
                        visit(child)?;
                    }
                }
                Ok(())
            }
            Layout::Variable { .. } | Layout::Blob => Ok(()),
        }
    }
}

/// Registry of descriptors, indexed by `DescriptorId`
#[derive(Debug, Clone)]
pub struct DescriptorTable {
    descriptors: Vec<TypeDescriptor>,
}

impl DescriptorTable {
    /// Table holding only the builtin descriptors
    pub fn with_builtins() -> Self {
        let descriptors = vec![
            TypeDescriptor {
                name: "str".to_string(),
                layout: Layout::Variable {
                    length_offset: 0,
                    base_size: WORD_SIZE,
                    element_size: 1,
                },
            },
            TypeDescriptor {
                name: "RawBuffer".to_string(),
                layout: Layout::Variable {
                    length_offset: WORD_SIZE,
                    base_size: 2 * WORD_SIZE,
                    element_size: 1,
                },
            },
            TypeDescriptor::blob("RawMemory"),
        ];
        Self { descriptors }
    }

    /// Register a descriptor and return its id
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<DescriptorId> {
        let next = u32::try_from(self.descriptors.len() + 1).map_err(|_| {
            GcError::Configuration("descriptor table is full".to_string())
        })?;
        log::debug!(
            target: "spy_gc",
            "registered type '{}' as descriptor #{}",
            descriptor.name,
            next
        );
        self.descriptors.push(descriptor);
        Ok(DescriptorId(next))
    }

    pub fn get(&self, id: DescriptorId) -> Result<&TypeDescriptor> {
        self.lookup(id.0 as usize)
            .ok_or(GcError::UnknownDescriptor(id.0))
    }

    /// Look up a raw descriptor word read from a header
    #[inline]
    pub fn lookup(&self, raw: usize) -> Option<&TypeDescriptor> {
        raw.checked_sub(1).and_then(|i| self.descriptors.get(i))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}
