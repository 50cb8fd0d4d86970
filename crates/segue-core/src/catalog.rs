//! Metadata collaborator
//!
//! The queue only knows track ids; everything else is looked up lazily
//! through a [`TrackCatalog`].

use serde::{ Deserialize, Serialize };

use crate::types::TrackId;


/// Metadata of a single track.
#[derive( Debug, Clone, PartialEq, Default, Serialize, Deserialize )]
pub struct TrackInfo {
    pub id: TrackId,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Location handed to the player's `prepare`.
    pub uri: String,
    pub duration_ms: Option<u64>,
    pub podcast: bool,
    pub bookmark_ms: u64,
}


/// Source of track metadata.
pub trait TrackCatalog: Send + Sync {
    /// Looks up a track. `None` means the row is gone, which the service
    /// treats the same as a failed open.
    fn lookup( &self, id: TrackId ) -> Option<TrackInfo>;

    /// Every playable track, used to feed auto shuffle.
    fn library( &self ) -> Vec<TrackId>;

    /// Stores a podcast resume position.
    fn save_bookmark( &self, id: TrackId, position_ms: u64 ) {
        tracing::debug!( "Bookmark for {} at {} ms not stored", id, position_ms );
    }
}
