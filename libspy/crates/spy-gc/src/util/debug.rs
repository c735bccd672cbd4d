//! Debug Utilities
//!
//! Formatting helpers for diagnostics.

/// Format an address the way every spy-gc diagnostic prints it
pub fn format_address(address: usize) -> String {
    format!("0x{:0width$X}", address, width = std::mem::size_of::<usize>() * 2)
}

/// Hex dump of up to `limit` bytes starting at `start`
///
/// # Safety
/// `start..start + limit` must be readable.
pub unsafe fn hex_dump(start: usize, limit: usize) -> String {
    let mut out = String::new();
    for line in 0..limit.div_ceil(16) {
        let offset = line * 16;
        out.push_str(&format_address(start + offset));
        out.push(':');
        for j in offset..(offset + 16).min(limit) {
            let byte = *((start + j) as *const u8);
            out.push_str(&format!(" {:02X}", byte));
        }
        out.push('\n');
    }
    out
}
