//! Simulated track player
//!
//! Stands in for a decoder: a loaded file "plays" for a fixed stretch of
//! wall-clock time and then reports completion. Nothing is decoded and
//! nothing reaches an audio device.

use std::path::{ Path, PathBuf };
use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::Arc;
use std::thread;
use std::time::{ Duration, Instant };

use segue_core::{ PlayerError, PlayerFactory, PlayerSignals, TrackPlayer };


/// Creates [`SimulatedPlayer`] handles that all play for `track_length`.
#[derive( Debug, Clone )]
pub struct SimulatedFactory {
    track_ms: u64,
}


impl SimulatedFactory {
    pub fn new( track_length: Duration ) -> Self {
        Self { track_ms: track_length.as_millis().max( 1 ) as u64 }
    }
}


impl PlayerFactory for SimulatedFactory {
    fn create( &self, signals: PlayerSignals ) -> Box<dyn TrackPlayer> {
        Box::new( SimulatedPlayer {
            signals,
            duration_ms: self.track_ms,
            loaded: None,
            base_ms: 0,
            started_at: None,
            epoch: Arc::new( AtomicU64::new( 0 ) ),
        })
    }
}


/// Timer-driven player handle.
///
/// Every start or seek arms a completion timer; anything that changes the
/// play position bumps the epoch so that earlier timers fire into nothing.
pub struct SimulatedPlayer {
    signals: PlayerSignals,
    duration_ms: u64,
    loaded: Option<PathBuf>,
    base_ms: u64,
    started_at: Option<Instant>,
    epoch: Arc<AtomicU64>,
}


impl SimulatedPlayer {
    fn invalidate( &self ) -> u64 {
        self.epoch.fetch_add( 1, Ordering::SeqCst ) + 1
    }


    fn elapsed_ms( &self ) -> u64 {
        let running = self.started_at.map_or( 0, |t| t.elapsed().as_millis() as u64 );
        ( self.base_ms + running ).min( self.duration_ms )
    }


    fn arm( &self ) {
        let epoch = self.invalidate();
        let remaining = Duration::from_millis( self.duration_ms.saturating_sub( self.base_ms ) );
        let current = Arc::clone( &self.epoch );
        let signals = self.signals.clone();

        let spawned = thread::Builder::new()
            .name( "segue-sim".into() )
            .spawn( move || {
                thread::sleep( remaining );
                if current.load( Ordering::SeqCst ) == epoch {
                    signals.completed();
                }
            });
        if let Err( e ) = spawned {
            tracing::warn!( "Failed to arm completion timer for {}: {}", self.signals.handle(), e );
        }
    }
}


impl TrackPlayer for SimulatedPlayer {
    fn prepare( &mut self, uri: &str ) -> Result<(), PlayerError> {
        let path = Path::new( uri );
        if !path.is_file() {
            return Err( PlayerError::FileOpen( uri.to_string() ) );
        }
        self.invalidate();
        self.loaded = Some( path.to_path_buf() );
        self.base_ms = 0;
        self.started_at = None;
        tracing::trace!( "{} loaded {}", self.signals.handle(), uri );
        Ok(())
    }

    fn start( &mut self ) {
        if self.loaded.is_none() || self.started_at.is_some() {
            return;
        }
        self.started_at = Some( Instant::now() );
        self.arm();
    }

    fn pause( &mut self ) {
        if self.started_at.is_some() {
            self.base_ms = self.elapsed_ms();
            self.started_at = None;
            self.invalidate();
        }
    }

    fn stop( &mut self ) {
        self.invalidate();
        self.started_at = None;
        self.base_ms = 0;
    }

    fn seek( &mut self, position_ms: u64 ) {
        self.base_ms = position_ms.min( self.duration_ms );
        if self.started_at.is_some() {
            self.started_at = Some( Instant::now() );
            self.arm();
        }
    }

    fn position( &self ) -> u64 {
        self.elapsed_ms()
    }

    fn duration( &self ) -> u64 {
        if self.loaded.is_some() { self.duration_ms } else { 0 }
    }

    fn is_playing( &self ) -> bool {
        self.started_at.is_some()
    }

    fn set_volume( &mut self, volume: f32 ) {
        tracing::trace!( "{} volume {:.2}", self.signals.handle(), volume );
    }

    fn release( &mut self ) {
        self.stop();
        self.loaded = None;
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;

    use segue_core::{ EngineConfig, LibraryCatalog, PlaybackService, TrackId };


    fn library( dir: &Path, count: usize ) -> LibraryCatalog {
        let files = ( 0..count )
            .map( |i| {
                let path = dir.join( format!( "{:02}.ogg", i ) );
                fs::write( &path, b"" ).unwrap();
                path
            })
            .collect();
        LibraryCatalog::from_files( files )
    }


    fn service( track: Duration, catalog: LibraryCatalog ) -> PlaybackService {
        PlaybackService::new(
            Arc::new( SimulatedFactory::new( track ) ),
            Arc::new( catalog ),
            EngineConfig::default(),
        ).unwrap()
    }


    #[test]
    fn test_missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = library( dir.path(), 2 );
        fs::remove_file( dir.path().join( "00.ogg" ) ).unwrap();

        let mut service = service( Duration::from_secs( 5 ), catalog );
        service.open( &[ TrackId( 0 ), TrackId( 1 ) ], Some( 0 ) );
        assert_eq!( service.current_track(), Some( TrackId( 1 ) ) );
    }


    #[test]
    fn test_tracks_play_through_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service( Duration::from_millis( 40 ), library( dir.path(), 3 ) );
        service.open( &[ TrackId( 0 ), TrackId( 1 ), TrackId( 2 ) ], Some( 0 ) );
        service.play();

        let deadline = Instant::now() + Duration::from_secs( 5 );
        while service.queue_position() != Some( 2 ) && Instant::now() < deadline {
            service.run_once( Duration::from_millis( 20 ) );
        }
        assert_eq!( service.queue_position(), Some( 2 ) );

        while service.is_playing() && Instant::now() < deadline {
            service.run_once( Duration::from_millis( 20 ) );
        }
        assert!( !service.is_playing() );
    }


    #[test]
    fn test_pause_freezes_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service( Duration::from_secs( 60 ), library( dir.path(), 1 ) );
        service.open( &[ TrackId( 0 ) ], Some( 0 ) );
        service.seek( 10_000 );
        service.play();
        service.pause();

        let paused_at = service.position_ms().unwrap();
        thread::sleep( Duration::from_millis( 30 ) );
        assert_eq!( service.position_ms(), Some( paused_at ) );
        assert!( paused_at >= 10_000 );
    }
}
