//! Scripted players and catalog for integration tests.

#![allow( dead_code )]

use std::collections::{ BTreeMap, HashSet };
use std::sync::{ Arc, Condvar, Mutex };
use std::thread;
use std::time::Duration;

use segue_core::{
    EngineConfig, HandleId, PlaybackEvent, PlaybackService, PlayerError, PlayerErrorKind,
    PlayerFactory, PlayerSignals, TrackCatalog, TrackId, TrackInfo, TrackPlayer,
};
use tokio::sync::broadcast;


pub const TRACK_MS: u64 = 180_000;


#[derive( Debug, Default, Clone )]
pub struct HandleState {
    pub uri: Option<String>,
    pub playing: bool,
    pub released: bool,
    pub position: u64,
    pub volume: f32,
}


struct Handle {
    signals: PlayerSignals,
    state: Arc<Mutex<HandleState>>,
}


#[derive( Default )]
struct Shared {
    handles: Mutex<Vec<Handle>>,
    failing: Mutex<HashSet<String>>,
    gate_closed: Mutex<bool>,
    gate: Condvar,
}


/// Player factory whose handles only record what is done to them.
///
/// Preparation on the staging thread can be held back to force the
/// completion-before-staging race.
#[derive( Default )]
pub struct FakeFactory {
    shared: Arc<Shared>,
}


impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new( Self::default() )
    }


    pub fn fail_uri( &self, uri: &str ) {
        self.shared.failing.lock().unwrap().insert( uri.to_string() );
    }


    pub fn hold_staging( &self ) {
        *self.shared.gate_closed.lock().unwrap() = true;
    }


    pub fn release_staging( &self ) {
        *self.shared.gate_closed.lock().unwrap() = false;
        self.shared.gate.notify_all();
    }


    fn states( &self ) -> Vec<( HandleId, HandleState )> {
        self.shared.handles.lock().unwrap()
            .iter()
            .map( |h| ( h.signals.handle(), h.state.lock().unwrap().clone() ) )
            .collect()
    }


    /// Handles that ever loaded `uri`.
    pub fn handles_for( &self, uri: &str ) -> Vec<( HandleId, HandleState )> {
        self.states().into_iter()
            .filter( |( _, s )| s.uri.as_deref() == Some( uri ) )
            .collect()
    }


    /// Handles that are loaded and not released.
    pub fn live_handles( &self ) -> Vec<( HandleId, HandleState )> {
        self.states().into_iter()
            .filter( |( _, s )| s.uri.is_some() && !s.released )
            .collect()
    }


    pub fn playing_uri( &self ) -> Option<String> {
        self.states().into_iter()
            .find( |( _, s )| s.playing && !s.released )
            .and_then( |( _, s )| s.uri )
    }


    fn with_signals( &self, handle: HandleId, f: impl FnOnce( &PlayerSignals ) ) {
        let handles = self.shared.handles.lock().unwrap();
        let h = handles.iter().find( |h| h.signals.handle() == handle ).expect( "unknown handle" );
        f( &h.signals );
    }


    pub fn complete( &self, handle: HandleId ) {
        self.with_signals( handle, |s| s.completed() );
    }


    pub fn fail( &self, handle: HandleId, kind: PlayerErrorKind ) {
        self.with_signals( handle, |s| s.error( kind ) );
    }


    fn playing_handle( &self ) -> HandleId {
        self.states().into_iter()
            .find( |( _, s )| s.playing && !s.released )
            .map( |( h, _ )| h )
            .expect( "nothing is playing" )
    }


    /// Makes the playing handle report the end of its track.
    pub fn complete_playing( &self ) {
        self.complete( self.playing_handle() );
    }


    /// Makes the playing handle report an error.
    pub fn fail_playing( &self, kind: PlayerErrorKind ) {
        self.fail( self.playing_handle(), kind );
    }
}


impl PlayerFactory for FakeFactory {
    fn create( &self, signals: PlayerSignals ) -> Box<dyn TrackPlayer> {
        let state = Arc::new( Mutex::new( HandleState { volume: 1.0, ..HandleState::default() } ) );
        self.shared.handles.lock().unwrap().push( Handle {
            signals,
            state: Arc::clone( &state ),
        });
        Box::new( FakePlayer {
            shared: Arc::clone( &self.shared ),
            state,
        })
    }
}


struct FakePlayer {
    shared: Arc<Shared>,
    state: Arc<Mutex<HandleState>>,
}


impl TrackPlayer for FakePlayer {
    fn prepare( &mut self, uri: &str ) -> Result<(), PlayerError> {
        if thread::current().name() == Some( "segue-stage" ) {
            let mut closed = self.shared.gate_closed.lock().unwrap();
            while *closed {
                closed = self.shared.gate.wait( closed ).unwrap();
            }
        }
        if self.shared.failing.lock().unwrap().contains( uri ) {
            return Err( PlayerError::FileOpen( uri.to_string() ) );
        }
        self.state.lock().unwrap().uri = Some( uri.to_string() );
        Ok(())
    }

    fn start( &mut self ) {
        self.state.lock().unwrap().playing = true;
    }

    fn pause( &mut self ) {
        self.state.lock().unwrap().playing = false;
    }

    fn stop( &mut self ) {
        self.state.lock().unwrap().playing = false;
    }

    fn seek( &mut self, position_ms: u64 ) {
        self.state.lock().unwrap().position = position_ms;
    }

    fn position( &self ) -> u64 {
        self.state.lock().unwrap().position
    }

    fn duration( &self ) -> u64 {
        TRACK_MS
    }

    fn is_playing( &self ) -> bool {
        self.state.lock().unwrap().playing
    }

    fn set_volume( &mut self, volume: f32 ) {
        self.state.lock().unwrap().volume = volume;
    }

    fn release( &mut self ) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.released = true;
    }
}


/// Catalog of tracks named `track-<id>`.
#[derive( Default )]
pub struct FakeCatalog {
    tracks: BTreeMap<TrackId, TrackInfo>,
    pub bookmarks: Mutex<Vec<( TrackId, u64 )>>,
}


impl FakeCatalog {
    pub fn new( ids: &[u64] ) -> Self {
        let tracks = ids.iter()
            .map( |&id| ( TrackId( id ), Self::info( id ) ) )
            .collect();
        Self { tracks, bookmarks: Mutex::new( Vec::new() ) }
    }


    fn info( id: u64 ) -> TrackInfo {
        TrackInfo {
            id: TrackId( id ),
            title: format!( "Track {}", id ),
            uri: uri( id ),
            duration_ms: Some( TRACK_MS ),
            ..TrackInfo::default()
        }
    }


    pub fn with_podcast( mut self, id: u64, bookmark_ms: u64 ) -> Self {
        let mut info = Self::info( id );
        info.podcast = true;
        info.bookmark_ms = bookmark_ms;
        self.tracks.insert( TrackId( id ), info );
        self
    }
}


impl TrackCatalog for FakeCatalog {
    fn lookup( &self, id: TrackId ) -> Option<TrackInfo> {
        self.tracks.get( &id ).cloned()
    }

    fn library( &self ) -> Vec<TrackId> {
        self.tracks.keys().copied().collect()
    }

    fn save_bookmark( &self, id: TrackId, position_ms: u64 ) {
        self.bookmarks.lock().unwrap().push(( id, position_ms ));
    }
}


pub fn uri( id: u64 ) -> String {
    format!( "track-{}", id )
}


pub fn ids( values: &[u64] ) -> Vec<TrackId> {
    values.iter().copied().map( TrackId ).collect()
}


pub fn service( factory: &Arc<FakeFactory>, catalog: Arc<FakeCatalog> ) -> PlaybackService {
    PlaybackService::new( factory.clone(), catalog, EngineConfig::default() )
        .unwrap()
        .with_seed( 42 )
}


/// Handles control messages until no staging is in flight.
pub fn settle( service: &mut PlaybackService ) {
    for _ in 0..200 {
        service.run_once( Duration::from_millis( 10 ) );
        if !service.is_staging() {
            break;
        }
    }
    service.pump();
}


pub fn drain( rx: &mut broadcast::Receiver<PlaybackEvent> ) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Ok( event ) = rx.try_recv() {
        events.push( event );
    }
    events
}
