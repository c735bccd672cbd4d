//! Root Set - References the collector treats as live
//!
//! The library never scans native stacks. Whoever holds references across an
//! allocating call makes them discoverable through one of three sources:
//!
//! 1. **Handle frames** - LIFO slots owned by the heap, used from Rust
//!    (`enter_frame` / `push` / `set` / `leave_frame`).
//! 2. **Global slots** - addresses of words that hold a reference, read at
//!    collection time.
//! 3. **Shadow frames** - a `#[repr(C)]` linked list kept by generated code on
//!    its own stack; the heap only stores the innermost frame.
//!
//! Null (0) slots are ignored in all three.

use crate::error::{GcError, Result};
use crate::object::ObjRef;

/// Layout version of [`ShadowFrame`] understood by this library
pub const ROOT_SET_VERSION: u32 = 1;

/// Frame of reference slots pushed by generated code
///
/// ```text
/// top ──► ShadowFrame { version: 1, len: 2, parent ─┐, slots ──► [ref, 0] }
///                                                   │
///         ShadowFrame { version: 1, len: 1, parent: null, slots ──► [ref] }
/// ```
#[repr(C)]
#[derive(Debug)]
pub struct ShadowFrame {
    pub version: u32,
    pub len: u32,
    pub parent: *const ShadowFrame,
    pub slots: *const usize,
}

/// Slot in the handle stack
///
/// Carries the serial stamped on its slot at `push`, so a handle that
/// outlived its frame is told apart from whatever reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    index: usize,
    serial: u64,
}

/// Token returned by `enter_frame`, consumed by `leave_frame`
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a handle frame must be left with leave_frame"]
pub struct HandleFrame {
    depth: usize,
    base: usize,
}

/// Externally supplied root set
#[derive(Debug)]
pub struct RootSet {
    handles: Vec<usize>,
    serials: Vec<u64>,
    next_serial: u64,
    frames: Vec<usize>,
    globals: Vec<*const usize>,
    shadow_top: *const ShadowFrame,
}

// Raw slot pointers belong to the single mutator that owns the heap.
unsafe impl Send for RootSet {}

impl RootSet {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            serials: Vec::new(),
            next_serial: 0,
            frames: Vec::new(),
            globals: Vec::new(),
            shadow_top: std::ptr::null(),
        }
    }

    // === Handle frames ===

    /// Open a frame; handles pushed until the matching `leave_frame` die with it
    pub fn enter_frame(&mut self) -> HandleFrame {
        let frame = HandleFrame {
            depth: self.frames.len(),
            base: self.handles.len(),
        };
        self.frames.push(frame.base);
        frame
    }

    /// Close `frame` and every frame opened after it
    pub fn leave_frame(&mut self, frame: HandleFrame) {
        debug_assert_eq!(
            frame.depth + 1,
            self.frames.len(),
            "handle frames left out of order"
        );
        self.frames.truncate(frame.depth);
        self.handles.truncate(frame.base);
        self.serials.truncate(frame.base);
    }

    /// Root `obj` in the innermost frame
    pub fn push(&mut self, obj: Option<ObjRef>) -> Handle {
        self.next_serial += 1;
        self.handles.push(obj.map_or(0, ObjRef::addr));
        self.serials.push(self.next_serial);
        Handle {
            index: self.handles.len() - 1,
            serial: self.next_serial,
        }
    }

    /// True while the frame that created `handle` is still open
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.serials.get(handle.index) == Some(&handle.serial)
    }

    fn check(&self, handle: Handle) -> Result<usize> {
        if self.is_valid(handle) {
            Ok(handle.index)
        } else {
            Err(GcError::InvalidState {
                expected: "handle in an open frame".to_string(),
                actual: format!("stale handle for slot {}", handle.index),
            })
        }
    }

    /// Current value of a handle; `InvalidState` once its frame was left
    pub fn checked_get(&self, handle: Handle) -> Result<Option<ObjRef>> {
        let index = self.check(handle)?;
        Ok(ObjRef::new(self.handles[index]))
    }

    /// Replace the reference held by a handle; `InvalidState` once its
    /// frame was left
    pub fn checked_set(&mut self, handle: Handle, obj: Option<ObjRef>) -> Result<()> {
        let index = self.check(handle)?;
        self.handles[index] = obj.map_or(0, ObjRef::addr);
        Ok(())
    }

    /// Current value of a handle
    ///
    /// # Panics
    /// If the handle's frame has already been left.
    pub fn get(&self, handle: Handle) -> Option<ObjRef> {
        self.checked_get(handle).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Replace the reference held by a handle
    ///
    /// # Panics
    /// If the handle's frame has already been left.
    pub fn set(&mut self, handle: Handle, obj: Option<ObjRef>) {
        if let Err(e) = self.checked_set(handle, obj) {
            panic!("{}", e);
        }
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    // === Global slots ===

    /// Treat the word at `slot` as a root until unregistered
    ///
    /// # Safety
    /// `slot` must stay valid and aligned for reads until
    /// `unregister_global` is called with it.
    pub unsafe fn register_global(&mut self, slot: *const usize) {
        self.globals.push(slot);
    }

    /// Remove one registration of `slot`; false if it was never registered
    pub fn unregister_global(&mut self, slot: *const usize) -> bool {
        match self.globals.iter().rposition(|&s| s == slot) {
            Some(index) => {
                self.globals.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    // === Shadow frames ===

    /// Install the innermost shadow frame (null clears it)
    ///
    /// # Safety
    /// Every frame reachable through `parent` links, and its slot array,
    /// must stay valid until the next call.
    pub unsafe fn set_shadow_stack(&mut self, top: *const ShadowFrame) {
        self.shadow_top = top;
    }

    pub fn shadow_stack(&self) -> *const ShadowFrame {
        self.shadow_top
    }

    /// Number of frames in the shadow stack
    pub fn shadow_depth(&self) -> usize {
        let mut depth = 0;
        let mut frame = self.shadow_top;
        while !frame.is_null() {
            depth += 1;
            // SAFETY: guaranteed by `set_shadow_stack`
            frame = unsafe { (*frame).parent };
        }
        depth
    }

    // === Scanning ===

    /// Call `visit` with every non-null root reference
    ///
    /// Fails with `RootSetVersion` on a shadow frame of another layout, or
    /// with whatever `visit` returns.
    pub fn for_each_root(&self, mut visit: impl FnMut(usize) -> Result<()>) -> Result<usize> {
        let mut visited = 0;

        for &value in self.handles.iter().filter(|&&v| v != 0) {
            visit(value)?;
            visited += 1;
        }

        for &slot in &self.globals {
            // SAFETY: guaranteed by `register_global`
            let value = unsafe { *slot };
            if value != 0 {
                visit(value)?;
                visited += 1;
            }
        }

        let mut frame = self.shadow_top;
        while !frame.is_null() {
            // SAFETY: guaranteed by `set_shadow_stack`
            let current = unsafe { &*frame };
            if current.version != ROOT_SET_VERSION {
                return Err(GcError::RootSetVersion {
                    expected: ROOT_SET_VERSION,
                    found: current.version,
                });
            }
            for i in 0..current.len as usize {
                let value = unsafe { *current.slots.add(i) };
                if value != 0 {
                    visit(value)?;
                    visited += 1;
                }
            }
            frame = current.parent;
        }

        Ok(visited)
    }
}

impl Default for RootSet {
    fn default() -> Self {
        Self::new()
    }
}
