//! Target Selection
//!
//! Chosen at build time through Cargo features. The host memory backend is
//! picked separately by spy-gc from `target_arch`.

/// Host environment the library was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Native executable with a C runtime
    Native,
    /// WebAssembly under a WASI host; console output is a host import
    Wasi,
    /// WebAssembly under Emscripten's JS runtime
    Emscripten,
}

impl Target {
    /// The target selected by the enabled feature
    pub const fn current() -> Target {
        if cfg!(feature = "wasi") {
            Target::Wasi
        } else if cfg!(feature = "emscripten") {
            Target::Emscripten
        } else {
            Target::Native
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Target::Native => "native",
            Target::Wasi => "wasi",
            Target::Emscripten => "emscripten",
        }
    }

    /// True when the debug bridge is implemented by the host, not by libspy
    pub const fn host_provides_debug(self) -> bool {
        matches!(self, Target::Wasi)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
