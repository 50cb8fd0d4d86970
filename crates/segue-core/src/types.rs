//! Shared value types
//!
//! Track identifiers and the playback mode enumerations used by the
//! queue, the transition engine and the persistence codec.

use std::fmt;

use serde::{ Deserialize, Serialize };


/// Opaque handle of a track in the external metadata catalog.
#[derive( Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize )]
#[serde( transparent )]
pub struct TrackId( pub u64 );


impl fmt::Display for TrackId {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "{}", self.0 )
    }
}


impl From<u64> for TrackId {
    fn from( id: u64 ) -> Self {
        Self( id )
    }
}


/// How the next track is chosen.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum ShuffleMode {
    /// List order.
    #[default]
    None,
    /// Random pick among not-yet-played entries of the queue.
    Normal,
    /// Endless random window sourced from the whole library.
    Auto,
}


impl ShuffleMode {
    /// Integer value used in persisted state.
    pub fn as_i32( self ) -> i32 {
        match self {
            ShuffleMode::None => 0,
            ShuffleMode::Normal => 1,
            ShuffleMode::Auto => 2,
        }
    }


    /// Parses a persisted value. Unknown values fall back to `None`.
    pub fn from_i32( value: i32 ) -> Self {
        match value {
            1 => ShuffleMode::Normal,
            2 => ShuffleMode::Auto,
            _ => ShuffleMode::None,
        }
    }
}


/// What happens at the end of a track or of the queue.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum RepeatMode {
    /// Stop at the end of the queue.
    #[default]
    None,
    /// Replay the current track forever.
    Current,
    /// Wrap around to the first entry.
    All,
}


impl RepeatMode {
    /// Integer value used in persisted state.
    pub fn as_i32( self ) -> i32 {
        match self {
            RepeatMode::None => 0,
            RepeatMode::Current => 1,
            RepeatMode::All => 2,
        }
    }


    /// Parses a persisted value. Unknown values fall back to `None`.
    pub fn from_i32( value: i32 ) -> Self {
        match value {
            1 => RepeatMode::Current,
            2 => RepeatMode::All,
            _ => RepeatMode::None,
        }
    }
}


/// Where enqueued tracks go.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum EnqueueAction {
    /// Append and jump playback to the first new entry.
    Now,
    /// Insert right after the current entry.
    Next,
    /// Append.
    Last,
}


/// Current playback state as seen by subscribers.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_mode_values_round_trip() {
        for mode in [ ShuffleMode::None, ShuffleMode::Normal, ShuffleMode::Auto ] {
            assert_eq!( ShuffleMode::from_i32( mode.as_i32() ), mode );
        }
        for mode in [ RepeatMode::None, RepeatMode::Current, RepeatMode::All ] {
            assert_eq!( RepeatMode::from_i32( mode.as_i32() ), mode );
        }
    }


    #[test]
    fn test_unknown_mode_values_degrade_to_none() {
        assert_eq!( ShuffleMode::from_i32( 7 ), ShuffleMode::None );
        assert_eq!( RepeatMode::from_i32( -1 ), RepeatMode::None );
    }
}
