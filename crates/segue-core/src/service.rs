//! Playback service
//!
//! Ties the [`PlayQueue`] to the [`TransitionEngine`] and runs the control
//! state machine. Every method must be called from one control thread;
//! player callbacks and staging results arrive through the control inbox
//! and are handled by [`PlaybackService::pump`] or
//! [`PlaybackService::run_once`].
//!
//! The queue itself sits behind a mutex so that metadata refresh and
//! persistence code on other threads can read it through
//! [`PlaybackService::queue_handle`].

use std::sync::mpsc::{ self, Receiver, RecvTimeoutError };
use std::sync::{ Arc, Mutex, MutexGuard };
use std::time::{ Duration, Instant };

use thiserror::Error;
use tokio::sync::broadcast;

use crate::catalog::{ TrackCatalog, TrackInfo };
use crate::codec::QueueState;
use crate::config::EngineConfig;
use crate::engine::{ ControlMessage, Transition, TransitionEngine };
use crate::events::{ EventBus, PlaybackEvent };
use crate::player::{ PlayerError, PlayerErrorKind, PlayerFactory, PlayerSignal };
use crate::queue::{ moved_index, PlayQueue, Removal };
use crate::store::{ PersistWriter, StateStore, StoreError };
use crate::types::{ EnqueueAction, PlaybackState, RepeatMode, ShuffleMode, TrackId };


/// Errors raised while setting the service up.
#[derive( Debug, Error )]
pub enum ServiceError {
    #[error( "Failed to start worker thread: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "State store error: {0}" )]
    Store( #[from] StoreError ),
}


/// Inputs of the control state machine.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum ControlEvent {
    /// The current track played to its end.
    Completed,
    /// The current handle failed.
    Error( PlayerErrorKind ),
    /// User skipped forward.
    UserAdvance,
    /// User skipped back.
    UserReverse,
    /// Shuffle or repeat changed.
    ModeChanged,
}


#[derive( Debug, Clone, Copy, PartialEq, Eq )]
enum TimerAction {
    /// Reopen the current track after the backend came back.
    RetryCurrent { resume: bool },
    /// Move past a track that failed to decode.
    SkipForward,
}


/// Queue plus gapless engine, driven from a single control thread.
pub struct PlaybackService {
    config: EngineConfig,
    queue: Arc<Mutex<PlayQueue>>,
    engine: TransitionEngine,
    catalog: Arc<dyn TrackCatalog>,
    inbox: Receiver<ControlMessage>,
    events: EventBus,
    store: Option<Arc<dyn StateStore>>,
    writer: Option<PersistWriter>,
    generation: Option<i64>,

    supposed_to_be_playing: bool,
    open_failed_counter: u32,
    decode_failures: u32,
    quiet: bool,
    saveable: bool,
    current: Option<TrackInfo>,
    next_position: Option<usize>,
    timers: Vec<( Instant, TimerAction )>,
}


impl PlaybackService {
    /// Creates a service with an empty queue and no persistence.
    pub fn new(
        factory: Arc<dyn PlayerFactory>,
        catalog: Arc<dyn TrackCatalog>,
        config: EngineConfig,
    ) -> Result<Self, ServiceError> {
        let ( tx, inbox ) = mpsc::channel();
        let engine = TransitionEngine::new( factory, tx, config.retry_delay )?;
        let queue = PlayQueue::new( config.history_capacity );
        let events = EventBus::new( config.event_capacity );

        Ok( Self {
            config,
            queue: Arc::new( Mutex::new( queue ) ),
            engine,
            catalog,
            inbox,
            events,
            store: None,
            writer: None,
            generation: None,
            supposed_to_be_playing: false,
            open_failed_counter: 0,
            decode_failures: 0,
            quiet: false,
            saveable: true,
            current: None,
            next_position: None,
            timers: Vec::new(),
        })
    }


    /// Persists state to `store`. Queues saved against a different
    /// `generation` are not restored.
    pub fn with_store( mut self, store: Arc<dyn StateStore>, generation: Option<i64> ) -> Result<Self, ServiceError> {
        self.writer = Some( PersistWriter::spawn( Arc::clone( &store ) )? );
        self.store = Some( store );
        self.generation = generation;
        Ok( self )
    }


    /// Uses a deterministic random source for shuffle.
    pub fn with_seed( self, seed: u64 ) -> Self {
        *self.lock_queue() = PlayQueue::with_seed( self.config.history_capacity, seed );
        self
    }


    fn lock_queue( &self ) -> MutexGuard<'_, PlayQueue> {
        self.queue.lock().unwrap_or_else( |poisoned| poisoned.into_inner() )
    }


    fn with_queue<R>( &self, f: impl FnOnce( &mut PlayQueue ) -> R ) -> R {
        f( &mut self.lock_queue() )
    }


    // ===== Events and persistence =====


    /// Subscribes to playback events.
    pub fn subscribe( &self ) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }


    fn notify( &self, event: PlaybackEvent ) {
        match &event {
            PlaybackEvent::PlaybackFailed { .. } => {}
            e => self.save( e.is_structural() ),
        }
        self.events.emit( event );
    }


    fn notify_modes( &self, before: ( ShuffleMode, RepeatMode ) ) {
        let ( shuffle, repeat ) = self.with_queue( |q| ( q.shuffle(), q.repeat() ) );
        if shuffle != before.0 {
            self.notify( PlaybackEvent::ShuffleChanged { mode: shuffle } );
        }
        if repeat != before.1 {
            self.notify( PlaybackEvent::RepeatChanged { mode: repeat } );
        }
    }


    /// Queues a save. A full save includes the track list, the history and
    /// the storage generation; a light one only position and modes.
    pub fn save( &self, full: bool ) {
        if !self.saveable {
            return;
        }
        let Some( writer ) = &self.writer else {
            return;
        };
        writer.submit( self.queue_state().to_entries( full ) );
    }


    /// Snapshot of what a save would write.
    pub fn queue_state( &self ) -> QueueState {
        let seek_ms = self.engine.position().unwrap_or( 0 );
        self.with_queue( |q| q.to_state( seek_ms, self.generation ) )
    }


    /// Blocks until queued saves are written.
    pub fn flush( &self ) {
        if let Some( writer ) = &self.writer {
            writer.flush();
        }
    }


    /// Restores the queue saved in the attached store and opens its
    /// current track without starting playback.
    ///
    /// Nothing is restored from a corrupt or foreign-generation save, or
    /// when the saved current track can no longer be opened. Returns true
    /// if a queue was restored.
    pub fn restore( &mut self ) -> bool {
        let Some( store ) = self.store.clone() else {
            return false;
        };
        self.saveable = false;
        let restored = self.restore_from( store.as_ref() );
        self.saveable = true;
        restored
    }


    fn restore_from( &mut self, store: &dyn StateStore ) -> bool {
        let state = match QueueState::load( store, self.generation ) {
            Ok( Some( state ) ) => state,
            Ok( None ) => {
                tracing::debug!( "No saved queue to restore" );
                return false;
            }
            Err( e ) => {
                tracing::warn!( "Discarding saved queue: {}", e );
                return false;
            }
        };

        let library = if state.shuffle == ShuffleMode::Auto {
            self.catalog.library()
        } else {
            Vec::new()
        };
        self.with_queue( |q| q.restore( &state, library ) );

        // Quiet: no failure notice and no skipping past a missing track
        self.quiet = true;
        self.open_failed_counter = self.config.retry_budget.saturating_mul( 2 );
        let opened = self.open_current_and_stage_next();
        self.quiet = false;

        if !opened {
            tracing::warn!( "Saved current track could not be opened, discarding saved queue" );
            self.with_queue( |q| q.clear() );
            self.current = None;
            self.next_position = None;
            return false;
        }

        if let Some( duration ) = self.engine.duration() {
            if state.seek_ms <= duration {
                self.engine.seek( state.seek_ms );
            }
        }

        let ( len, position ) = self.with_queue( |q| ( q.len(), q.position() ) );
        tracing::info!( "Restored queue of {} tracks at {:?}", len, position );
        self.events.emit( PlaybackEvent::QueueChanged );
        true
    }


    // ===== Control inbox and timers =====


    /// Handles every pending inbox message and due timer without blocking.
    /// Returns the number handled.
    pub fn pump( &mut self ) -> usize {
        let mut handled = self.fire_due_timers( Instant::now() );
        while let Ok( message ) = self.inbox.try_recv() {
            self.handle_message( message );
            handled += 1;
        }
        handled
    }


    /// Waits up to `timeout` for a message or a timer, then handles
    /// everything pending. Returns true if anything was handled.
    pub fn run_once( &mut self, timeout: Duration ) -> bool {
        let timeout = match self.next_deadline() {
            Some( deadline ) => timeout.min( deadline.saturating_duration_since( Instant::now() ) ),
            None => timeout,
        };

        let received = match self.inbox.recv_timeout( timeout ) {
            Ok( message ) => {
                self.handle_message( message );
                true
            }
            Err( RecvTimeoutError::Timeout ) | Err( RecvTimeoutError::Disconnected ) => false,
        };

        let pumped = self.pump();
        received || pumped > 0
    }


    /// Earliest pending timer.
    pub fn next_deadline( &self ) -> Option<Instant> {
        self.timers.iter().map( |( at, _ )| *at ).min()
    }


    /// Runs every timer due at `now`. Returns the number fired.
    pub fn fire_due_timers( &mut self, now: Instant ) -> usize {
        let ( due, pending ): ( Vec<_>, Vec<_> ) = self.timers.drain( .. ).partition( |( at, _ )| *at <= now );
        self.timers = pending;

        for ( _, action ) in &due {
            tracing::debug!( "Timer fired: {:?}", action );
            match action {
                TimerAction::RetryCurrent { resume } => {
                    if self.open_current_and_stage_next() && *resume {
                        self.play();
                    }
                }
                TimerAction::SkipForward => {
                    if self.supposed_to_be_playing {
                        self.go_next( true );
                    } else {
                        self.open_current_and_stage_next();
                    }
                }
            }
        }
        due.len()
    }


    fn schedule( &mut self, delay: Duration, action: TimerAction ) {
        self.timers.push(( Instant::now() + delay, action ));
    }


    fn cancel_timers( &mut self ) {
        if !self.timers.is_empty() {
            tracing::debug!( "Cancelling {} pending timers", self.timers.len() );
            self.timers.clear();
        }
    }


    fn handle_message( &mut self, message: ControlMessage ) {
        match message {
            ControlMessage::Player { handle, signal } => {
                if self.engine.is_successor( handle ) {
                    if let PlayerSignal::Error( kind ) = signal {
                        tracing::warn!( "Staged handle {} failed ({:?}), dropping it", handle, kind );
                        self.engine.discard_successor();
                    }
                    return;
                }
                if !self.engine.is_current( handle ) {
                    tracing::debug!( "Ignoring {:?} from stale handle {}", signal, handle );
                    return;
                }
                match signal {
                    PlayerSignal::Completed => self.dispatch( ControlEvent::Completed ),
                    PlayerSignal::Error( kind ) => self.dispatch( ControlEvent::Error( kind ) ),
                }
            }
            ControlMessage::StagedReady { generation, handle, track, player } => {
                self.engine.on_staged_ready( generation, handle, track, player );
            }
            ControlMessage::StagedFailed { generation, track, error } => {
                self.engine.on_staged_failed( generation, track, &error );
            }
        }
    }


    /// Feeds one event to the control state machine.
    pub fn dispatch( &mut self, event: ControlEvent ) {
        tracing::debug!( "Control event: {:?}", event );
        match event {
            ControlEvent::Completed => self.on_completed(),
            ControlEvent::Error( kind ) => self.on_player_error( kind ),
            ControlEvent::UserAdvance => self.go_next( true ),
            ControlEvent::UserReverse => self.go_previous(),
            ControlEvent::ModeChanged => self.stage_successor(),
        }
    }


    fn on_completed( &mut self ) {
        self.decode_failures = 0;

        match self.engine.on_current_completed() {
            Transition::Advanced { track } => {
                let planned = self.next_position.take();
                let position = self.with_queue( |q| {
                    let position = planned
                        .filter( |&p| q.track_at( p ) == Some( track ) )
                        .or_else( || q.tracks().iter().position( |&t| t == track ) );
                    if let Some( p ) = position {
                        q.commit( p );
                    }
                    position
                });

                let Some( position ) = position else {
                    tracing::warn!( "Promoted track {} is no longer queued", track );
                    self.stage_successor();
                    return;
                };

                self.current = Some( self.catalog.lookup( track ).unwrap_or_else( || TrackInfo {
                    id: track,
                    ..TrackInfo::default()
                }));
                self.notify( PlaybackEvent::TrackChanged { track, position } );
                self.stage_successor();
            }
            Transition::EndedWithoutSuccessor => {
                let repeat = self.with_queue( |q| q.repeat() );
                if repeat == RepeatMode::Current {
                    if self.supposed_to_be_playing {
                        self.engine.seek( 0 );
                        self.engine.start();
                    }
                } else {
                    self.go_next( false );
                }
            }
            other => tracing::debug!( "Unexpected completion outcome {:?}", other ),
        }
    }


    fn on_player_error( &mut self, kind: PlayerErrorKind ) {
        let repeat_current = self.with_queue( |q| q.repeat() == RepeatMode::Current );

        match self.engine.on_error( kind, repeat_current ) {
            Transition::RetryAfterDelay( delay ) => {
                self.next_position = None;
                let resume = self.supposed_to_be_playing;
                self.schedule( delay, TimerAction::RetryCurrent { resume } );
            }
            Transition::SkipAfterDelay( delay ) => {
                self.next_position = None;
                self.decode_failures += 1;
                if self.decode_failures > self.config.retry_budget {
                    tracing::error!( "{} tracks in a row failed to decode, giving up", self.decode_failures );
                    self.decode_failures = 0;
                    self.fail( "Playback failed: too many tracks could not be decoded".to_string() );
                } else {
                    self.schedule( delay, TimerAction::SkipForward );
                }
            }
            Transition::PauseAndReport => {
                self.pause();
                let track = self.current_track().map( |t| t.to_string() ).unwrap_or_default();
                self.notify( PlaybackEvent::PlaybackFailed {
                    message: format!( "Could not play track {}", track ),
                });
            }
            other => tracing::debug!( "Unexpected error outcome {:?}", other ),
        }
    }


    /// Emits a failure notice and goes idle.
    fn fail( &mut self, message: String ) {
        if !self.quiet {
            self.notify( PlaybackEvent::PlaybackFailed { message } );
        }
        self.go_idle();
    }


    fn go_idle( &mut self ) {
        tracing::info!( "Going idle" );
        self.engine.stage_next( None );
        self.next_position = None;
        if self.supposed_to_be_playing {
            self.supposed_to_be_playing = false;
            self.notify( PlaybackEvent::PlaystateChanged { state: self.playback_state() } );
        }
    }


    // ===== Opening and staging =====


    fn open_track( &mut self, track: TrackId ) -> Result<TrackInfo, PlayerError> {
        let info = self.catalog.lookup( track )
            .ok_or_else( || PlayerError::FileOpen( format!( "track {} is not in the catalog", track ) ) )?;
        self.engine.open_current( track, &info.uri )?;
        Ok( info )
    }


    /// Opens the track under the play head and stages its successor.
    ///
    /// A track that fails to open is skipped, up to the retry budget. When
    /// the budget runs out, or the queue has a single entry, a failure is
    /// reported and playback goes idle. Returns true if a track was opened.
    fn open_current_and_stage_next( &mut self ) -> bool {
        let Some(( mut position, mut track )) = self.with_queue( |q| q.position().zip( q.current() ) ) else {
            return false;
        };
        self.engine.stop( false );

        let info = loop {
            match self.open_track( track ) {
                Ok( info ) => break info,
                Err( e ) => {
                    tracing::warn!( "Failed to open {} at {}: {}", track, position, e );
                    let len = self.with_queue( |q| q.len() );

                    if self.open_failed_counter < self.config.retry_budget && len > 1 {
                        self.open_failed_counter += 1;
                        let next = self.with_queue( |q| {
                            q.advance( false ).and_then( |p| q.track_at( p ).map( |t| ( p, t ) ) )
                        });
                        match next {
                            Some(( p, t )) => {
                                position = p;
                                track = t;
                            }
                            None => {
                                self.current = None;
                                self.go_idle();
                                return false;
                            }
                        }
                    } else {
                        self.open_failed_counter = 0;
                        self.current = None;
                        tracing::error!( "Failed to open file for playback" );
                        self.fail( format!( "Playback failed: could not open track {}", track ) );
                        return false;
                    }
                }
            }
        };

        self.open_failed_counter = 0;
        if info.podcast {
            // Resume a little before the bookmark
            self.engine.seek( info.bookmark_ms.saturating_sub( self.config.podcast_rewind_ms ) );
        }
        self.current = Some( info );
        self.notify( PlaybackEvent::TrackChanged { track, position } );
        self.stage_successor();
        true
    }


    /// Plans the next position and stages it.
    fn stage_successor( &mut self ) {
        let ( refilled, planned ) = self.with_queue( |q| {
            let refilled = q.shuffle() == ShuffleMode::Auto && q.refill_auto_window();
            let planned = q.plan_next().and_then( |p| q.track_at( p ).map( |t| ( p, t ) ) );
            ( refilled, planned )
        });
        if refilled {
            self.notify( PlaybackEvent::QueueChanged );
        }

        self.next_position = planned.map( |( p, _ )| p );
        let next = planned.and_then( |( _, track )| match self.catalog.lookup( track ) {
            Some( info ) => Some(( track, info.uri )),
            None => {
                tracing::warn!( "Next track {} is not in the catalog, not staging", track );
                None
            }
        });
        self.engine.stage_next( next.as_ref().map( |( t, uri )| ( *t, uri.as_str() ) ) );
    }


    /// Keeps the staged successor if `remapped` still holds it and is
    /// still what the queue would play next; re-plans otherwise.
    fn refresh_successor( &mut self, remapped: Option<usize> ) {
        let target = self.engine.target_track();
        let keep = match ( remapped, target ) {
            ( Some( p ), Some( t ) ) => self.with_queue( |q| {
                q.track_at( p ) == Some( t )
                    && ( q.shuffle() == ShuffleMode::Normal || q.peek_next() == Some( p ) )
            }),
            _ => false,
        };

        if keep {
            self.next_position = remapped;
        } else {
            self.stage_successor();
        }
    }


    fn save_bookmark_if_needed( &self ) {
        let Some( info ) = self.current.as_ref().filter( |i| i.podcast ) else {
            return;
        };
        let ( Some( position ), Some( duration ) ) = ( self.engine.position(), self.engine.duration() ) else {
            return;
        };

        let distance = position.abs_diff( info.bookmark_ms );
        if distance > 0 && distance < self.config.bookmark_min_change_ms {
            return;
        }

        let near_edge = position < self.config.bookmark_head_ms
            || position + self.config.bookmark_tail_ms > duration;
        let bookmark = if near_edge { 0 } else { position };
        self.catalog.save_bookmark( info.id, bookmark );
    }


    /// Stops the engine and reopens at the play head, keeping playback
    /// going if it was.
    fn reopen( &mut self, play: bool ) {
        if self.open_current_and_stage_next() && play {
            self.play();
        }
    }


    // ===== Queue operations =====


    /// Replaces the queue and opens `start`, or a random entry for
    /// `None`. Playback continues if it was running.
    pub fn open( &mut self, list: &[TrackId], start: Option<usize> ) {
        if list.is_empty() {
            tracing::warn!( "Refusing to open an empty list" );
            return;
        }
        self.cancel_timers();
        self.save_bookmark_if_needed();

        let before = self.modes();
        let changed = self.with_queue( |q| q.replace( list, start ) );
        if changed {
            self.notify( PlaybackEvent::QueueChanged );
        }
        self.notify_modes( before );

        let resume = self.supposed_to_be_playing;
        self.reopen( resume );
    }


    /// Adds tracks. `Now`, or adding to an empty queue, starts playing the
    /// first added track.
    pub fn enqueue( &mut self, list: &[TrackId], action: EnqueueAction ) {
        if list.is_empty() {
            return;
        }

        let inserted_at = self.with_queue( |q| match ( action, q.position() ) {
            ( EnqueueAction::Next, Some( p ) ) if p + 1 < q.len() => Some( p + 1 ),
            _ => None,
        });
        let jump = self.with_queue( |q| q.insert( list, action ) );
        self.notify( PlaybackEvent::QueueChanged );

        if jump.is_some() {
            self.cancel_timers();
            self.reopen( true );
            return;
        }

        let count = list.len();
        let remapped = self.next_position.map( |n| match inserted_at {
            Some( at ) if n >= at => n + count,
            _ => n,
        });
        self.refresh_successor( remapped );
    }


    /// Removes entries `first..=last`. Returns how many were removed.
    pub fn remove_range( &mut self, first: usize, last: usize ) -> usize {
        let removal = self.with_queue( |q| q.remove_range( first, last ) );
        if removal.removed > 0 {
            let last = first + removal.removed - 1;
            let remapped = self.next_position.and_then( |n| {
                if n < first {
                    Some( n )
                } else if n > last {
                    Some( n - removal.removed )
                } else {
                    None
                }
            });
            self.after_removal( removal, remapped );
        }
        removal.removed
    }


    /// Removes every entry holding `id`. Returns how many were removed.
    pub fn remove_id( &mut self, id: TrackId ) -> usize {
        let removal = self.with_queue( |q| q.remove_id( id ) );
        if removal.removed > 0 {
            self.after_removal( removal, None );
        }
        removal.removed
    }


    fn after_removal( &mut self, removal: Removal, remapped: Option<usize> ) {
        self.notify( PlaybackEvent::QueueChanged );

        if !removal.current_removed {
            self.refresh_successor( remapped );
            return;
        }

        if self.with_queue( |q| q.is_empty() ) {
            self.stop_completely();
        } else {
            let was_playing = self.supposed_to_be_playing;
            self.reopen( was_playing );
        }
    }


    /// Moves one entry; the play head follows its track.
    pub fn move_item( &mut self, from: usize, to: usize ) {
        let moved = self.with_queue( |q| {
            let len = q.len();
            if len == 0 {
                return None;
            }
            let ( from, to ) = ( from.min( len - 1 ), to.min( len - 1 ) );
            q.move_item( from, to ).then_some(( from, to ))
        });
        let Some(( from, to )) = moved else {
            return;
        };

        self.notify( PlaybackEvent::QueueChanged );
        let remapped = self.next_position.map( |n| moved_index( n, from, to ) );
        self.refresh_successor( remapped );
    }


    /// Jumps to `index` and plays it.
    pub fn set_queue_position( &mut self, index: usize ) -> bool {
        if !self.with_queue( |q| q.set_position( index ) ) {
            tracing::warn!( "Queue position {} out of range", index );
            return false;
        }
        self.cancel_timers();
        self.save_bookmark_if_needed();
        self.reopen( true );
        true
    }


    // ===== Transport =====


    /// Skips forward.
    pub fn next( &mut self ) {
        self.dispatch( ControlEvent::UserAdvance );
    }


    /// Skips back.
    pub fn prev( &mut self ) {
        self.dispatch( ControlEvent::UserReverse );
    }


    fn go_next( &mut self, force: bool ) {
        if self.with_queue( |q| q.is_empty() ) {
            tracing::debug!( "No play queue" );
            return;
        }
        self.cancel_timers();

        let ( refilled, next ) = self.with_queue( |q| {
            let refilled = q.shuffle() == ShuffleMode::Auto && q.refill_auto_window();
            ( refilled, q.advance( force ) )
        });
        if refilled {
            self.notify( PlaybackEvent::QueueChanged );
        }

        if next.is_none() {
            self.go_idle();
            return;
        }

        self.save_bookmark_if_needed();
        self.reopen( true );
    }


    fn go_previous( &mut self ) {
        self.cancel_timers();
        self.save_bookmark_if_needed();
        if self.with_queue( |q| q.previous() ).is_none() {
            return;
        }
        self.reopen( true );
    }


    /// Starts or resumes playback.
    ///
    /// With nothing loaded the track under the play head is opened first;
    /// with an empty queue auto shuffle is switched on.
    pub fn play( &mut self ) {
        if !self.engine.is_initialized() {
            if self.with_queue( |q| q.is_empty() ) {
                self.set_shuffle_mode( ShuffleMode::Auto );
                return;
            }
            if !self.open_current_and_stage_next() {
                return;
            }
        }

        self.engine.start();
        if !self.supposed_to_be_playing {
            self.supposed_to_be_playing = true;
            self.notify( PlaybackEvent::PlaystateChanged { state: PlaybackState::Playing } );
        }

        // A successor staged while paused was discarded
        if self.next_position.is_some() && self.engine.target_track().is_none() {
            self.stage_successor();
        }
    }


    /// Pauses playback.
    pub fn pause( &mut self ) {
        if !self.supposed_to_be_playing {
            return;
        }
        self.engine.pause();
        self.supposed_to_be_playing = false;
        self.notify( PlaybackEvent::PlaystateChanged { state: PlaybackState::Paused } );
        self.save_bookmark_if_needed();
    }


    /// Stops playback and unloads the current track. The queue is kept.
    pub fn stop( &mut self ) {
        self.cancel_timers();
        self.save_bookmark_if_needed();
        self.engine.stop( false );
        self.current = None;
        self.next_position = None;
        self.supposed_to_be_playing = false;
        self.notify( PlaybackEvent::PlaystateChanged { state: PlaybackState::Stopped } );
    }


    fn stop_completely( &mut self ) {
        self.cancel_timers();
        self.engine.stop( true );
        self.current = None;
        self.next_position = None;
        self.supposed_to_be_playing = false;
        self.notify( PlaybackEvent::PlaystateChanged { state: PlaybackState::Stopped } );
    }


    /// Saves state and releases every player handle.
    pub fn shutdown( &mut self ) {
        self.save( true );
        self.cancel_timers();
        self.engine.stop( true );
        self.supposed_to_be_playing = false;
        self.flush();
    }


    /// Seeks within the current track, clamped to its duration. Returns the
    /// applied position.
    pub fn seek( &mut self, position_ms: u64 ) -> Option<u64> {
        self.engine.seek( position_ms )
    }


    /// Sets the output volume, `0.0..=1.0`.
    pub fn set_volume( &mut self, volume: f32 ) {
        self.engine.set_volume( volume.clamp( 0.0, 1.0 ) );
    }


    pub fn volume( &self ) -> f32 {
        self.engine.volume()
    }


    // ===== Modes =====


    fn modes( &self ) -> ( ShuffleMode, RepeatMode ) {
        self.with_queue( |q| ( q.shuffle(), q.repeat() ) )
    }


    /// Changes the shuffle mode.
    ///
    /// Auto shuffle replaces the queue with a window drawn from the whole
    /// library and starts playing it; with an empty library shuffle is
    /// turned off instead.
    pub fn set_shuffle_mode( &mut self, mode: ShuffleMode ) {
        let before = self.modes();
        if before.0 == mode && !self.with_queue( |q| q.is_empty() ) {
            return;
        }

        if mode == ShuffleMode::Auto {
            let library = self.catalog.library();
            if self.with_queue( |q| q.enable_auto( library ) ) {
                self.notify( PlaybackEvent::QueueChanged );
                self.notify_modes( before );
                self.cancel_timers();
                self.reopen( true );
                return;
            }
        } else {
            self.with_queue( |q| q.set_shuffle( mode ) );
        }

        self.notify_modes( before );
        self.dispatch( ControlEvent::ModeChanged );
    }


    /// Changes the repeat mode.
    pub fn set_repeat_mode( &mut self, mode: RepeatMode ) {
        let before = self.modes();
        self.with_queue( |q| q.set_repeat( mode ) );
        self.notify_modes( before );
        self.dispatch( ControlEvent::ModeChanged );
    }


    pub fn shuffle_mode( &self ) -> ShuffleMode {
        self.modes().0
    }


    pub fn repeat_mode( &self ) -> RepeatMode {
        self.modes().1
    }


    // ===== Accessors =====


    /// Shared handle to the queue for readers on other threads.
    pub fn queue_handle( &self ) -> Arc<Mutex<PlayQueue>> {
        Arc::clone( &self.queue )
    }


    pub fn queue_snapshot( &self ) -> Vec<TrackId> {
        self.with_queue( |q| q.tracks().to_vec() )
    }


    pub fn queue_position( &self ) -> Option<usize> {
        self.with_queue( |q| q.position() )
    }


    /// Track loaded in the engine.
    pub fn current_track( &self ) -> Option<TrackId> {
        self.current.as_ref().map( |i| i.id )
    }


    pub fn current_info( &self ) -> Option<&TrackInfo> {
        self.current.as_ref()
    }


    /// Planned position of the staged successor.
    pub fn next_position( &self ) -> Option<usize> {
        self.next_position
    }


    /// Track registered as gapless successor.
    pub fn staged_track( &self ) -> Option<TrackId> {
        self.engine.staged_track()
    }


    /// Position in the current track, in ms.
    pub fn position_ms( &self ) -> Option<u64> {
        self.engine.position()
    }


    /// Duration of the current track, in ms.
    pub fn duration_ms( &self ) -> Option<u64> {
        self.engine.duration()
    }


    /// True while playback is wanted, including between tracks.
    pub fn is_playing( &self ) -> bool {
        self.supposed_to_be_playing
    }


    pub fn playback_state( &self ) -> PlaybackState {
        if self.supposed_to_be_playing {
            PlaybackState::Playing
        } else if self.engine.is_initialized() {
            PlaybackState::Paused
        } else {
            PlaybackState::Stopped
        }
    }


    /// True while the next track is being prepared in the background.
    pub fn is_staging( &self ) -> bool {
        self.engine.is_staging()
    }


    /// True while a retry or skip is scheduled.
    pub fn has_pending_timers( &self ) -> bool {
        !self.timers.is_empty()
    }
}
