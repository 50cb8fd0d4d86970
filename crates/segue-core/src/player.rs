//! Single-track player abstraction
//!
//! A [`TrackPlayer`] plays exactly one track: prepare, start, pause, seek,
//! stop. Decoding and output live behind it. Completion and error events
//! are posted to the control thread through [`PlayerSignals`], tagged with
//! the handle they came from so superseded handles can be recognised.

use std::fmt;
use std::sync::mpsc::Sender;

use thiserror::Error;

use crate::engine::ControlMessage;


/// Errors that can occur while preparing or driving a track.
#[derive( Debug, Error )]
pub enum PlayerError {
    #[error( "Failed to open: {0}" )]
    FileOpen( String ),

    #[error( "Decode error: {0}" )]
    Decode( String ),

    #[error( "Audio output error: {0}" )]
    Output( String ),

    #[error( "No track loaded" )]
    NoTrack,
}


/// Kind of asynchronous failure reported by a playing handle.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum PlayerErrorKind {
    /// The playback backend went away. The handle is unusable but the
    /// track itself is probably fine.
    ServerDied,
    /// The track could not be decoded.
    Decode,
}


/// Identity of one player handle.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub struct HandleId( pub u64 );


impl fmt::Display for HandleId {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "#{}", self.0 )
    }
}


/// Event reported by a player handle.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum PlayerSignal {
    Completed,
    Error( PlayerErrorKind ),
}


/// Sending half a player uses to report completion and errors.
#[derive( Debug, Clone )]
pub struct PlayerSignals {
    handle: HandleId,
    inbox: Sender<ControlMessage>,
}


impl PlayerSignals {
    pub( crate ) fn new( handle: HandleId, inbox: Sender<ControlMessage> ) -> Self {
        Self { handle, inbox }
    }


    /// The handle these signals are tagged with.
    pub fn handle( &self ) -> HandleId {
        self.handle
    }


    /// Reports that the track played to its end.
    pub fn completed( &self ) {
        self.send( PlayerSignal::Completed );
    }


    /// Reports an asynchronous failure.
    pub fn error( &self, kind: PlayerErrorKind ) {
        self.send( PlayerSignal::Error( kind ) );
    }


    fn send( &self, signal: PlayerSignal ) {
        let message = ControlMessage::Player { handle: self.handle, signal };
        if self.inbox.send( message ).is_err() {
            tracing::debug!( "Control thread gone, dropping {:?} from {}", signal, self.handle );
        }
    }
}


/// One decoder/output instance.
///
/// Handles are moved to the staging worker for `prepare`, so they must be
/// `Send`. Positions and durations are in milliseconds.
pub trait TrackPlayer: Send {
    /// Loads `uri` and gets ready to start. Blocking.
    fn prepare( &mut self, uri: &str ) -> Result<(), PlayerError>;

    fn start( &mut self );

    fn pause( &mut self );

    /// Stops playback; the handle needs a new `prepare` afterwards.
    fn stop( &mut self );

    fn seek( &mut self, position_ms: u64 );

    fn position( &self ) -> u64;

    fn duration( &self ) -> u64;

    fn is_playing( &self ) -> bool;

    fn set_volume( &mut self, volume: f32 );

    fn set_audio_session_id( &mut self, session_id: i32 ) {
        let _ = session_id;
    }

    /// Frees every resource. The handle is not used again.
    fn release( &mut self ) {
        self.stop();
    }
}


/// Creates player handles.
pub trait PlayerFactory: Send + Sync {
    fn create( &self, signals: PlayerSignals ) -> Box<dyn TrackPlayer>;
}
