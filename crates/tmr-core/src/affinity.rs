//! Lane-to-core pinning

use tmr_primitives::Lane;
use tracing::warn;

/// Pin the calling thread to `core`
///
/// Returns false when the core does not exist or the OS refused.
pub fn pin_current_thread(core: usize) -> bool {
    core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().find(|id| id.id == core))
        .map(core_affinity::set_for_current)
        .unwrap_or(false)
}

/// Pin a lane worker, logging a warning on failure
pub(crate) fn pin_lane(lane: Lane, core: usize) -> bool {
    let pinned = pin_current_thread(core);
    if !pinned {
        warn!(%lane, core, "failed to bind lane worker to core, running unpinned");
    }
    pinned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_core_is_not_fatal() {
        assert!(!pin_current_thread(usize::MAX));
    }
}
