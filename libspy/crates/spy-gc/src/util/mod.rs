//! Util Module - Shared Utilities
//!
//! Helpers used throughout spy-gc.

pub mod alignment;
pub mod debug;

pub use alignment::Alignment;

/// Constants for spy-gc
pub mod constants {
    /// 1 Kilobyte
    pub const KB: usize = 1024;
    /// 1 Megabyte
    pub const MB: usize = 1024 * 1024;
    /// 1 Gigabyte
    pub const GB: usize = 1024 * 1024 * 1024;

    /// Pointer width in bytes (8 native, 4 on wasm32)
    pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

    /// WebAssembly linear memory page: 64KB
    pub const WASM_PAGE_SIZE: usize = 64 * KB;

    /// Byte written over reclaimed payloads when poisoning is enabled
    pub const POISON_BYTE: u8 = 0xDE;
}
