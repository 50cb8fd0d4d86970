//! Playback events
//!
//! Notifications broadcast to UI-side subscribers whenever the queue or
//! playback state changes.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::{ PlaybackState, RepeatMode, ShuffleMode, TrackId };


/// Event emitted by the playback service.
#[derive( Debug, Clone, PartialEq, Serialize )]
#[serde( tag = "event", rename_all = "snake_case" )]
pub enum PlaybackEvent {
    /// Entries were added, removed or reordered.
    QueueChanged,

    /// A different track is now current.
    TrackChanged { track: TrackId, position: usize },

    PlaystateChanged { state: PlaybackState },

    ShuffleChanged { mode: ShuffleMode },

    RepeatChanged { mode: RepeatMode },

    /// Playback gave up; the message is meant for the user.
    PlaybackFailed { message: String },
}


impl PlaybackEvent {
    /// True for events that change the persisted queue contents, which
    /// need a full save rather than a position/mode update.
    pub fn is_structural( &self ) -> bool {
        matches!( self, PlaybackEvent::QueueChanged )
    }
}


/// Broadcast sender for playback events.
#[derive( Debug, Clone )]
pub struct EventBus {
    tx: broadcast::Sender<PlaybackEvent>,
}


impl EventBus {
    /// Creates a bus that buffers up to `capacity` events per slow
    /// subscriber before it starts lagging.
    pub fn new( capacity: usize ) -> Self {
        let ( tx, _ ) = broadcast::channel( capacity.max( 1 ) );
        Self { tx }
    }


    pub fn subscribe( &self ) -> broadcast::Receiver<PlaybackEvent> {
        self.tx.subscribe()
    }


    /// Sends an event. Having no subscribers is not an error.
    pub fn emit( &self, event: PlaybackEvent ) {
        tracing::trace!( "Event: {:?}", event );
        let _ = self.tx.send( event );
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new( 8 );
        let mut rx = bus.subscribe();
        bus.emit( PlaybackEvent::QueueChanged );
        bus.emit( PlaybackEvent::RepeatChanged { mode: RepeatMode::All } );

        assert_eq!( rx.try_recv().unwrap(), PlaybackEvent::QueueChanged );
        assert_eq!( rx.try_recv().unwrap(), PlaybackEvent::RepeatChanged { mode: RepeatMode::All } );
        assert!( rx.try_recv().is_err() );
    }


    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new( 1 );
        bus.emit( PlaybackEvent::QueueChanged );
    }


    #[test]
    fn test_events_serialize_tagged() {
        let event = PlaybackEvent::TrackChanged { track: TrackId( 12 ), position: 3 };
        assert_eq!(
            serde_json::to_string( &event ).unwrap(),
            r#"{"event":"track_changed","track":12,"position":3}"#
        );

        let event = PlaybackEvent::ShuffleChanged { mode: ShuffleMode::Auto };
        assert_eq!( serde_json::to_string( &event ).unwrap(), r#"{"event":"shuffle_changed","mode":"auto"}"# );
    }
}
