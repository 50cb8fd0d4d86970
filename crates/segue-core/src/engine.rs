//! Gapless transition engine
//!
//! Holds at most two player handles: the current one and a pre-staged
//! successor. Staging runs on a dedicated worker thread so decoder
//! preparation never blocks the control thread; the worker posts the
//! prepared handle back through the control inbox and the engine decides
//! there whether it is still wanted.
//!
//! Every staging request gets a new generation number. A prepared handle
//! is registered as successor only if its generation is still the pending
//! one and the current handle is playing; anything else is released.

use std::fmt;
use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::mpsc::{ self, Receiver, Sender };
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::player::{
    HandleId, PlayerError, PlayerErrorKind, PlayerFactory, PlayerSignal, PlayerSignals, TrackPlayer,
};
use crate::types::TrackId;


/// Messages processed on the control thread.
pub enum ControlMessage {
    /// Completion or error reported by a player handle.
    Player { handle: HandleId, signal: PlayerSignal },

    /// A staged handle finished preparing.
    StagedReady {
        generation: u64,
        handle: HandleId,
        track: TrackId,
        player: Box<dyn TrackPlayer>,
    },

    /// A staged handle failed to prepare.
    StagedFailed { generation: u64, track: TrackId, error: PlayerError },
}


impl fmt::Debug for ControlMessage {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        match self {
            ControlMessage::Player { handle, signal } => {
                write!( f, "Player {{ handle: {}, signal: {:?} }}", handle, signal )
            }
            ControlMessage::StagedReady { generation, handle, track, .. } => {
                write!( f, "StagedReady {{ generation: {}, handle: {}, track: {} }}", generation, handle, track )
            }
            ControlMessage::StagedFailed { generation, track, error } => {
                write!( f, "StagedFailed {{ generation: {}, track: {}, error: {} }}", generation, track, error )
            }
        }
    }
}


/// What the caller should do after a player event.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Transition {
    /// The staged successor took over; commit the planned position.
    Advanced { track: TrackId },
    /// Nothing was staged in time; open the next track synchronously.
    EndedWithoutSuccessor,
    /// The handle was torn down; reopen the same track after the delay.
    RetryAfterDelay( Duration ),
    /// The track failed to decode; skip forward after the delay.
    SkipAfterDelay( Duration ),
    /// Do not skip a pinned track; pause and surface the failure.
    PauseAndReport,
}


struct Slot {
    handle: HandleId,
    track: TrackId,
    player: Box<dyn TrackPlayer>,
}


impl Slot {
    fn release( mut self ) {
        self.player.release();
    }
}


#[derive( Debug, Clone, Copy )]
struct StagingTicket {
    generation: u64,
    track: TrackId,
}


struct StageJob {
    generation: u64,
    handle: HandleId,
    track: TrackId,
    uri: String,
    player: Box<dyn TrackPlayer>,
}


/// Background preparer for staged handles.
struct StagingWorker {
    tx: Option<Sender<StageJob>>,
    latest: Arc<AtomicU64>,
    thread: Option<thread::JoinHandle<()>>,
}


impl StagingWorker {
    fn spawn( inbox: Sender<ControlMessage> ) -> std::io::Result<Self> {
        let ( tx, rx ) = mpsc::channel();
        let latest = Arc::new( AtomicU64::new( 0 ) );
        let latest_clone = Arc::clone( &latest );

        let thread = thread::Builder::new()
            .name( "segue-stage".into() )
            .spawn( move || Self::stage_loop( rx, inbox, latest_clone ) )?;

        Ok( Self {
            tx: Some( tx ),
            latest,
            thread: Some( thread ),
        })
    }


    /// Marks every generation below `generation` as unwanted.
    fn supersede( &self, generation: u64 ) {
        self.latest.store( generation, Ordering::Relaxed );
    }


    fn submit( &self, job: StageJob ) -> Result<(), StageJob> {
        match &self.tx {
            Some( tx ) => tx.send( job ).map_err( |e| e.0 ),
            None => Err( job ),
        }
    }


    fn stage_loop( rx: Receiver<StageJob>, inbox: Sender<ControlMessage>, latest: Arc<AtomicU64> ) {
        while let Ok( mut job ) = rx.recv() {
            // Jobs that were superseded while queued are never prepared.
            // One already preparing runs to completion and is judged by
            // the control thread.
            if job.generation < latest.load( Ordering::Relaxed ) {
                tracing::debug!( "Staging: skipping superseded job for {}", job.track );
                job.player.release();
                continue;
            }

            tracing::debug!( "Staging: preparing {} on {}", job.track, job.handle );
            let message = match job.player.prepare( &job.uri ) {
                Ok(()) => ControlMessage::StagedReady {
                    generation: job.generation,
                    handle: job.handle,
                    track: job.track,
                    player: job.player,
                },
                Err( error ) => {
                    job.player.release();
                    ControlMessage::StagedFailed {
                        generation: job.generation,
                        track: job.track,
                        error,
                    }
                }
            };

            if inbox.send( message ).is_err() {
                break;
            }
        }

        tracing::debug!( "Staging worker: exiting" );
    }
}


impl Drop for StagingWorker {
    fn drop( &mut self ) {
        self.tx.take();
        if let Some( thread ) = self.thread.take() {
            let _ = thread.join();
        }
    }
}


/// Owner of the current and staged player handles.
pub struct TransitionEngine {
    factory: Arc<dyn PlayerFactory>,
    inbox: Sender<ControlMessage>,
    worker: StagingWorker,
    current: Option<Slot>,
    successor: Option<Slot>,
    pending: Option<StagingTicket>,
    generation: u64,
    next_handle: u64,
    initialized: bool,
    volume: f32,
    session_id: Option<i32>,
    retry_delay: Duration,
}


impl TransitionEngine {
    /// Creates the engine and its staging worker. Player events and
    /// staging results are posted to `inbox`.
    pub fn new(
        factory: Arc<dyn PlayerFactory>,
        inbox: Sender<ControlMessage>,
        retry_delay: Duration,
    ) -> std::io::Result<Self> {
        let worker = StagingWorker::spawn( inbox.clone() )?;

        Ok( Self {
            factory,
            inbox,
            worker,
            current: None,
            successor: None,
            pending: None,
            generation: 0,
            next_handle: 0,
            initialized: false,
            volume: 1.0,
            session_id: None,
            retry_delay,
        })
    }


    fn allocate( &mut self ) -> ( HandleId, Box<dyn TrackPlayer> ) {
        self.next_handle += 1;
        let handle = HandleId( self.next_handle );
        let mut player = self.factory.create( PlayerSignals::new( handle, self.inbox.clone() ) );
        player.set_volume( self.volume );
        if let Some( session_id ) = self.session_id {
            player.set_audio_session_id( session_id );
        }
        ( handle, player )
    }


    /// Loads `uri` into a fresh current handle, synchronously.
    ///
    /// Any previous current handle and any staged successor are released
    /// first. On failure the engine is left uninitialized.
    pub fn open_current( &mut self, track: TrackId, uri: &str ) -> Result<(), PlayerError> {
        self.retire_staging();
        if let Some( old ) = self.current.take() {
            old.release();
        }
        self.initialized = false;

        let ( handle, mut player ) = self.allocate();
        match player.prepare( uri ) {
            Ok(()) => {
                tracing::info!( "Opened {} on {}", track, handle );
                self.current = Some( Slot { handle, track, player } );
                self.initialized = true;
                Ok(())
            }
            Err( e ) => {
                player.release();
                Err( e )
            }
        }
    }


    /// Starts preparing `next` in the background, replacing any staged or
    /// in-flight successor. `None` only clears the successor.
    pub fn stage_next( &mut self, next: Option<( TrackId, &str )> ) {
        self.retire_staging();
        if !self.initialized {
            return;
        }
        let Some(( track, uri )) = next else {
            return;
        };

        let ( handle, player ) = self.allocate();
        let job = StageJob {
            generation: self.generation,
            handle,
            track,
            uri: uri.to_string(),
            player,
        };

        match self.worker.submit( job ) {
            Ok(()) => {
                tracing::debug!( "Staging {} on {} (generation {})", track, handle, self.generation );
                self.pending = Some( StagingTicket { generation: self.generation, track } );
            }
            Err( mut job ) => {
                tracing::warn!( "Staging worker unavailable, {} will open without gapless handoff", track );
                job.player.release();
            }
        }
    }


    /// Cancels any in-flight staging and releases the registered successor.
    fn retire_staging( &mut self ) {
        self.generation += 1;
        self.worker.supersede( self.generation );
        self.pending = None;
        if let Some( successor ) = self.successor.take() {
            tracing::debug!( "Releasing staged {} on {}", successor.track, successor.handle );
            successor.release();
        }
    }


    /// Handles a prepared handle coming back from the worker.
    ///
    /// Returns true if it was registered as the gapless successor.
    pub fn on_staged_ready(
        &mut self,
        generation: u64,
        handle: HandleId,
        track: TrackId,
        mut player: Box<dyn TrackPlayer>,
    ) -> bool {
        let wanted = matches!( self.pending, Some( t ) if t.generation == generation && t.track == track );
        let current_playing = self.initialized
            && self.current.as_ref().is_some_and( |c| c.player.is_playing() );

        if wanted {
            self.pending = None;
        }

        if wanted && current_playing {
            tracing::debug!( "Registered {} on {} as gapless successor", track, handle );
            self.successor = Some( Slot { handle, track, player } );
            true
        } else {
            tracing::debug!( "Discarding staged {} on {} (wanted: {}, playing: {})", track, handle, wanted, current_playing );
            player.release();
            false
        }
    }


    /// Handles a staged handle that failed to prepare. The transition to
    /// that track will happen synchronously instead.
    pub fn on_staged_failed( &mut self, generation: u64, track: TrackId, error: &PlayerError ) {
        if matches!( self.pending, Some( t ) if t.generation == generation ) {
            tracing::warn!( "Failed to stage {}: {}", track, error );
            self.pending = None;
        }
    }


    /// Current handle finished. Promotes the successor if there is one.
    pub fn on_current_completed( &mut self ) -> Transition {
        match self.successor.take() {
            Some( mut next ) => {
                if let Some( old ) = self.current.take() {
                    old.release();
                }
                next.player.start();
                let track = next.track;
                tracing::info!( "Gapless handoff to {} on {}", track, next.handle );
                self.current = Some( next );
                Transition::Advanced { track }
            }
            None => {
                tracing::debug!( "Track ended with no successor staged" );
                Transition::EndedWithoutSuccessor
            }
        }
    }


    /// Current handle reported an error.
    pub fn on_error( &mut self, kind: PlayerErrorKind, repeat_current: bool ) -> Transition {
        match kind {
            PlayerErrorKind::ServerDied => {
                tracing::warn!( "Player backend died, retrying in {:?}", self.retry_delay );
                self.tear_down();
                Transition::RetryAfterDelay( self.retry_delay )
            }
            PlayerErrorKind::Decode if repeat_current => {
                tracing::warn!( "Decode error while repeating current track" );
                Transition::PauseAndReport
            }
            PlayerErrorKind::Decode => {
                tracing::warn!( "Decode error, skipping in {:?}", self.retry_delay );
                self.tear_down();
                Transition::SkipAfterDelay( self.retry_delay )
            }
        }
    }


    fn tear_down( &mut self ) {
        self.initialized = false;
        self.retire_staging();
        if let Some( current ) = self.current.take() {
            current.release();
        }
    }


    /// Stops playback and cancels staging. With `release_completely` the
    /// current handle is freed as well.
    pub fn stop( &mut self, release_completely: bool ) {
        self.retire_staging();
        self.initialized = false;
        if release_completely {
            if let Some( current ) = self.current.take() {
                current.release();
            }
        } else if let Some( current ) = self.current.as_mut() {
            current.player.stop();
        }
    }


    /// True if `handle` is the current handle.
    pub fn is_current( &self, handle: HandleId ) -> bool {
        self.current.as_ref().is_some_and( |c| c.handle == handle )
    }


    /// True if `handle` is the registered successor.
    pub fn is_successor( &self, handle: HandleId ) -> bool {
        self.successor.as_ref().is_some_and( |s| s.handle == handle )
    }


    /// Drops the registered successor, e.g. after it reported an error.
    pub fn discard_successor( &mut self ) {
        if let Some( successor ) = self.successor.take() {
            successor.release();
        }
    }


    pub fn is_initialized( &self ) -> bool {
        self.initialized
    }


    /// Track loaded in the current handle.
    pub fn current_track( &self ) -> Option<TrackId> {
        self.current.as_ref().filter( |_| self.initialized ).map( |c| c.track )
    }


    /// Track of the registered successor.
    pub fn staged_track( &self ) -> Option<TrackId> {
        self.successor.as_ref().map( |s| s.track )
    }


    /// True while a staging request is in flight.
    pub fn is_staging( &self ) -> bool {
        self.pending.is_some()
    }


    /// Track that is staged or being staged.
    pub fn target_track( &self ) -> Option<TrackId> {
        self.staged_track().or( self.pending.map( |t| t.track ) )
    }


    pub fn start( &mut self ) {
        if let Some( current ) = self.initialized_mut() {
            current.player.start();
        }
    }


    pub fn pause( &mut self ) {
        if let Some( current ) = self.initialized_mut() {
            current.player.pause();
        }
    }


    pub fn is_playing( &self ) -> bool {
        self.initialized_ref().is_some_and( |c| c.player.is_playing() )
    }


    /// Seeks within the current track, clamped to its duration.
    pub fn seek( &mut self, position_ms: u64 ) -> Option<u64> {
        let current = self.initialized_mut()?;
        let target = position_ms.min( current.player.duration() );
        current.player.seek( target );
        Some( target )
    }


    pub fn position( &self ) -> Option<u64> {
        self.initialized_ref().map( |c| c.player.position() )
    }


    pub fn duration( &self ) -> Option<u64> {
        self.initialized_ref().map( |c| c.player.duration() )
    }


    /// Sets the volume of the current handle and of every handle created
    /// from now on.
    pub fn set_volume( &mut self, volume: f32 ) {
        self.volume = volume;
        if let Some( current ) = self.initialized_mut() {
            current.player.set_volume( volume );
        }
        if let Some( successor ) = self.successor.as_mut() {
            successor.player.set_volume( volume );
        }
    }


    pub fn volume( &self ) -> f32 {
        self.volume
    }


    pub fn set_audio_session_id( &mut self, session_id: i32 ) {
        self.session_id = Some( session_id );
        if let Some( current ) = self.current.as_mut() {
            current.player.set_audio_session_id( session_id );
        }
    }


    fn initialized_ref( &self ) -> Option<&Slot> {
        self.current.as_ref().filter( |_| self.initialized )
    }


    fn initialized_mut( &mut self ) -> Option<&mut Slot> {
        if self.initialized {
            self.current.as_mut()
        } else {
            None
        }
    }
}


impl Drop for TransitionEngine {
    fn drop( &mut self ) {
        self.stop( true );
    }
}
