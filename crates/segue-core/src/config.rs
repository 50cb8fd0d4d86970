//! Engine tuning

use std::time::Duration;

use crate::history::MAX_HISTORY_SIZE;


/// Tunables of the playback service.
#[derive( Debug, Clone, PartialEq )]
pub struct EngineConfig {
    /// Consecutive open failures tolerated before going idle.
    pub retry_budget: u32,

    /// Delay before reopening after a backend death or skipping past a
    /// decode error.
    pub retry_delay: Duration,

    /// Normal shuffle history capacity.
    pub history_capacity: usize,

    /// How far before the stored bookmark a podcast resumes, in ms.
    pub podcast_rewind_ms: u64,

    /// A bookmark closer than this to the stored one is not rewritten.
    pub bookmark_min_change_ms: u64,

    /// Positions this close to the start of a podcast clear the bookmark.
    pub bookmark_head_ms: u64,

    /// Positions this close to the end of a podcast clear the bookmark.
    pub bookmark_tail_ms: u64,

    /// Buffered events per subscriber.
    pub event_capacity: usize,
}


impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_budget: 10,
            retry_delay: Duration::from_secs( 2 ),
            history_capacity: MAX_HISTORY_SIZE,
            podcast_rewind_ms: 5_000,
            bookmark_min_change_ms: 10_000,
            bookmark_head_ms: 15_000,
            bookmark_tail_ms: 10_000,
            event_capacity: 64,
        }
    }
}
