//! libspy - Runtime Library for Compiled SPy Programs
//!
//! Provides the C ABI that generated code links against:
//! - Heap allocation and root registration (via spy-gc)
//! - String and raw buffer operations
//! - Debug bridge to the host console
//! - Builtin functions
//!
//! Exactly one target feature must be enabled: `native` (default), `wasi`
//! or `emscripten`. Build the WebAssembly flavours with
//! `--no-default-features --features wasi`.

#[cfg(any(
    all(feature = "native", feature = "wasi"),
    all(feature = "native", feature = "emscripten"),
    all(feature = "wasi", feature = "emscripten"),
    not(any(feature = "native", feature = "wasi", feature = "emscripten"))
))]
compile_error!("enable exactly one of the `native`, `wasi` or `emscripten` features");

pub mod builtins;
pub mod debug;
pub mod gc;
pub mod rawbuffer;
pub mod string;
pub mod target;

pub use gc::{
    spy_gc_alloc, spy_gc_alloc_mem, spy_gc_collect, spy_gc_register_root, spy_gc_register_type,
    spy_gc_set_shadow_stack, spy_gc_unregister_root, spy_panic, spy_runtime_init,
    spy_runtime_shutdown, with_heap, SPY_ERR_INVALID_UTF8, SPY_ERR_NOT_CHAR_BOUNDARY,
    SPY_ERR_NULL, SPY_ERR_OUT_OF_BOUNDS, SPY_OK,
};
pub use target::Target;
