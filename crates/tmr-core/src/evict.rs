//! Cache eviction for hot-region buffers
//!
//! Flushing forces the next stage to re-read the lane copies from memory
//! instead of sharing a cached line across lanes.

/// Flush every cache line overlapping `bytes`
///
/// A no-op on targets without `clflush`.
pub fn flush(bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }

    #[cfg(target_arch = "x86_64")]
    {
        use std::arch::x86_64::{_mm_clflush, _mm_mfence};
        use tmr_primitives::CACHE_LINE;

        let base = bytes.as_ptr();
        let mut offset = 0;
        while offset < bytes.len() {
            // SAFETY: `base + offset` lies inside `bytes`; clflush only needs a
            // valid address and sse2 is part of the x86_64 baseline.
            unsafe { _mm_clflush(base.add(offset)) };
            offset += CACHE_LINE - (base as usize + offset) % CACHE_LINE;
        }
        // SAFETY: fences have no memory preconditions.
        unsafe { _mm_mfence() };
    }
}
