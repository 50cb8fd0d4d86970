mod support;

use std::sync::Arc;
use std::time::{ Duration, Instant };

use segue_core::{
    Command, CommandError, CommandOutcome, EnqueueAction, MemoryStore, PlaybackEvent, PlaybackState, PlayerErrorKind, RepeatMode,
    ShuffleMode, StateStore, TrackId,
};
use support::{ drain, ids, service, settle, uri, FakeCatalog, FakeFactory };


const TICK: Duration = Duration::from_millis( 500 );


#[test]
fn test_gapless_handoff_to_staged_successor() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 3 ] ) ) );

    service.open( &ids( &[ 1, 2, 3 ] ), Some( 0 ) );
    service.play();
    settle( &mut service );
    assert_eq!( service.staged_track(), Some( TrackId( 2 ) ) );

    let mut rx = service.subscribe();
    factory.complete_playing();
    service.run_once( TICK );

    assert_eq!( service.queue_position(), Some( 1 ) );
    assert_eq!( service.current_track(), Some( TrackId( 2 ) ) );
    assert_eq!( factory.playing_uri(), Some( uri( 2 ) ) );
    assert!( factory.handles_for( &uri( 1 ) ).iter().all( |( _, s )| s.released ) );
    assert!( drain( &mut rx ).contains( &PlaybackEvent::TrackChanged { track: TrackId( 2 ), position: 1 } ) );

    settle( &mut service );
    assert_eq!( service.staged_track(), Some( TrackId( 3 ) ) );
}


#[test]
fn test_completion_before_staging_falls_back_and_discards_late_handle() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 3 ] ) ) );

    factory.hold_staging();
    service.open( &ids( &[ 1, 2, 3 ] ), Some( 0 ) );
    service.play();
    assert!( service.is_staging() );

    factory.complete_playing();
    service.run_once( TICK );

    assert_eq!( service.queue_position(), Some( 1 ) );
    assert_eq!( service.current_track(), Some( TrackId( 2 ) ) );
    assert_eq!( factory.playing_uri(), Some( uri( 2 ) ) );
    assert_eq!( service.staged_track(), None );

    factory.release_staging();
    settle( &mut service );

    // The late handle for track 2 was thrown away; only the synchronously
    // opened one survives
    let live: Vec<_> = factory.handles_for( &uri( 2 ) ).into_iter().filter( |( _, s )| !s.released ).collect();
    assert_eq!( live.len(), 1 );
    assert!( live[ 0 ].1.playing );
    assert_eq!( service.staged_track(), Some( TrackId( 3 ) ) );
}


#[test]
fn test_queue_change_during_staging_discards_stale_target() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 3 ] ) ) );

    factory.hold_staging();
    service.open( &ids( &[ 1, 2, 3 ] ), Some( 0 ) );
    service.play();
    service.move_item( 2, 1 );
    assert_eq!( service.queue_snapshot(), ids( &[ 1, 3, 2 ] ) );

    factory.release_staging();
    settle( &mut service );

    assert_eq!( service.staged_track(), Some( TrackId( 3 ) ) );
    assert_eq!( service.next_position(), Some( 1 ) );
    assert!( factory.handles_for( &uri( 2 ) ).iter().all( |( _, s )| s.released ) );
}


#[test]
fn test_unrelated_move_keeps_staged_successor() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 3, 4 ] ) ) );

    service.open( &ids( &[ 1, 2, 3, 4 ] ), Some( 0 ) );
    service.play();
    settle( &mut service );
    assert_eq!( service.staged_track(), Some( TrackId( 2 ) ) );

    service.move_item( 3, 2 );
    assert!( !service.is_staging() );
    assert_eq!( service.staged_track(), Some( TrackId( 2 ) ) );
}


#[test]
fn test_remove_under_play_head_reopens_next_survivor() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 10, 20, 30, 40 ] ) ) );

    service.open( &ids( &[ 10, 20, 30, 40 ] ), Some( 1 ) );
    service.play();
    let mut rx = service.subscribe();

    assert_eq!( service.remove_range( 1, 2 ), 2 );

    assert_eq!( service.queue_snapshot(), ids( &[ 10, 40 ] ) );
    assert_eq!( service.queue_position(), Some( 1 ) );
    assert_eq!( service.current_track(), Some( TrackId( 40 ) ) );
    assert_eq!( factory.playing_uri(), Some( uri( 40 ) ) );

    let events = drain( &mut rx );
    assert!( events.contains( &PlaybackEvent::QueueChanged ) );
    assert!( events.contains( &PlaybackEvent::TrackChanged { track: TrackId( 40 ), position: 1 } ) );
}


#[test]
fn test_removing_everything_stops() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2 ] ) ) );

    service.open( &ids( &[ 1, 2 ] ), Some( 0 ) );
    service.play();
    settle( &mut service );
    service.remove_id( TrackId( 1 ) );
    assert_eq!( service.current_track(), Some( TrackId( 2 ) ) );

    service.remove_id( TrackId( 2 ) );
    assert_eq!( service.queue_position(), None );
    assert_eq!( service.playback_state(), PlaybackState::Stopped );
    assert!( factory.live_handles().is_empty() );
}


#[test]
fn test_failed_open_skips_forward() {
    let factory = FakeFactory::new();
    factory.fail_uri( &uri( 2 ) );
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 3 ] ) ) );

    service.open( &ids( &[ 1, 2, 3 ] ), Some( 1 ) );

    assert_eq!( service.queue_position(), Some( 2 ) );
    assert_eq!( service.current_track(), Some( TrackId( 3 ) ) );
}


#[test]
fn test_missing_metadata_counts_as_failed_open() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 3 ] ) ) );

    service.open( &ids( &[ 1, 2, 3 ] ), Some( 1 ) );

    assert_eq!( service.current_track(), Some( TrackId( 3 ) ) );
}


#[test]
fn test_exhausted_retry_budget_goes_idle_with_notice() {
    let factory = FakeFactory::new();
    for id in 1..=3 {
        factory.fail_uri( &uri( id ) );
    }
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 3 ] ) ) );
    service.set_repeat_mode( RepeatMode::All );
    let mut rx = service.subscribe();

    service.open( &ids( &[ 1, 2, 3 ] ), Some( 0 ) );

    assert_eq!( service.current_track(), None );
    assert_eq!( service.playback_state(), PlaybackState::Stopped );
    assert!( drain( &mut rx ).iter().any( |e| matches!( e, PlaybackEvent::PlaybackFailed { .. } ) ) );
}


#[test]
fn test_end_of_queue_goes_idle() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1 ] ) ) );

    service.open( &ids( &[ 1 ] ), Some( 0 ) );
    service.play();
    settle( &mut service );
    assert_eq!( service.staged_track(), None );

    let mut rx = service.subscribe();
    factory.complete_playing();
    service.run_once( TICK );

    assert!( !service.is_playing() );
    assert!( drain( &mut rx ).iter().any( |e| matches!( e, PlaybackEvent::PlaystateChanged { .. } ) ) );
}


#[test]
fn test_decode_error_skips_after_delay() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 3 ] ) ) );

    service.open( &ids( &[ 1, 2, 3 ] ), Some( 0 ) );
    service.play();
    settle( &mut service );

    factory.fail_playing( PlayerErrorKind::Decode );
    service.run_once( TICK );
    assert!( service.has_pending_timers() );
    assert_eq!( service.queue_position(), Some( 0 ) );

    service.fire_due_timers( Instant::now() + Duration::from_secs( 3 ) );
    assert_eq!( service.queue_position(), Some( 1 ) );
    assert_eq!( factory.playing_uri(), Some( uri( 2 ) ) );
}


#[test]
fn test_decode_error_in_repeat_current_pauses() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2 ] ) ) );
    service.set_repeat_mode( RepeatMode::Current );

    service.open( &ids( &[ 1, 2 ] ), Some( 0 ) );
    service.play();
    let mut rx = service.subscribe();

    factory.fail_playing( PlayerErrorKind::Decode );
    service.run_once( TICK );

    assert!( !service.has_pending_timers() );
    assert_eq!( service.playback_state(), PlaybackState::Paused );
    assert_eq!( service.queue_position(), Some( 0 ) );
    assert!( drain( &mut rx ).iter().any( |e| matches!( e, PlaybackEvent::PlaybackFailed { .. } ) ) );
}


#[test]
fn test_backend_death_retries_same_track() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2 ] ) ) );

    service.open( &ids( &[ 1, 2 ] ), Some( 0 ) );
    service.play();
    settle( &mut service );

    factory.fail_playing( PlayerErrorKind::ServerDied );
    service.run_once( TICK );
    assert!( service.has_pending_timers() );
    assert_eq!( factory.playing_uri(), None );

    service.fire_due_timers( Instant::now() + Duration::from_secs( 3 ) );
    assert_eq!( service.queue_position(), Some( 0 ) );
    assert_eq!( factory.playing_uri(), Some( uri( 1 ) ) );
}


#[test]
fn test_signals_from_superseded_handle_are_ignored() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 3 ] ) ) );

    service.open( &ids( &[ 1, 2, 3 ] ), Some( 0 ) );
    service.play();
    let old = factory.handles_for( &uri( 1 ) )[ 0 ].0;

    service.next();
    assert_eq!( service.queue_position(), Some( 1 ) );

    factory.complete( old );
    factory.fail( old, PlayerErrorKind::Decode );
    service.pump();
    assert_eq!( service.queue_position(), Some( 1 ) );
    assert!( !service.has_pending_timers() );
}


#[test]
fn test_repeat_current_restarts_without_successor() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2 ] ) ) );
    service.set_repeat_mode( RepeatMode::Current );

    factory.hold_staging();
    service.open( &ids( &[ 1, 2 ] ), Some( 0 ) );
    service.play();
    service.seek( 90_000 );

    factory.complete_playing();
    service.run_once( TICK );

    assert_eq!( service.queue_position(), Some( 0 ) );
    assert_eq!( service.position_ms(), Some( 0 ) );
    assert_eq!( factory.playing_uri(), Some( uri( 1 ) ) );

    factory.release_staging();
    settle( &mut service );
}


#[test]
fn test_normal_shuffle_gapless_commit_records_history() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 3, 4, 5 ] ) ) );

    service.open( &ids( &[ 1, 2, 3, 4, 5 ] ), Some( 0 ) );
    service.set_shuffle_mode( ShuffleMode::Normal );
    service.play();
    settle( &mut service );

    let staged = service.staged_track().unwrap();
    let queue = service.queue_handle();
    assert!( queue.lock().unwrap().history().is_empty() );

    factory.complete_playing();
    service.run_once( TICK );

    assert_eq!( service.current_track(), Some( staged ) );
    assert_eq!( queue.lock().unwrap().history().to_vec(), vec![ 0 ] );
}


#[test]
fn test_prev_in_normal_shuffle_returns_to_previous_track() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 3, 4, 5 ] ) ) );

    service.open( &ids( &[ 1, 2, 3, 4, 5 ] ), Some( 3 ) );
    service.set_shuffle_mode( ShuffleMode::Normal );
    service.play();

    service.next();
    assert_ne!( service.queue_position(), Some( 3 ) );
    service.prev();
    assert_eq!( service.queue_position(), Some( 3 ) );
    assert_eq!( service.current_track(), Some( TrackId( 4 ) ) );
}


#[test]
fn test_mode_exclusion_is_reported() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2 ] ) ) );
    service.open( &ids( &[ 1, 2 ] ), Some( 0 ) );
    service.set_shuffle_mode( ShuffleMode::Normal );
    let mut rx = service.subscribe();

    service.set_repeat_mode( RepeatMode::Current );

    assert_eq!( service.shuffle_mode(), ShuffleMode::None );
    let events = drain( &mut rx );
    assert!( events.contains( &PlaybackEvent::ShuffleChanged { mode: ShuffleMode::None } ) );
    assert!( events.contains( &PlaybackEvent::RepeatChanged { mode: RepeatMode::Current } ) );

    service.set_shuffle_mode( ShuffleMode::Normal );
    assert_eq!( service.repeat_mode(), RepeatMode::All );
}


#[test]
fn test_play_with_empty_queue_starts_auto_shuffle() {
    let factory = FakeFactory::new();
    let library: Vec<u64> = ( 1..=30 ).collect();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &library ) ) );

    service.play();

    assert_eq!( service.shuffle_mode(), ShuffleMode::Auto );
    assert_eq!( service.queue_position(), Some( 0 ) );
    assert!( service.queue_snapshot().len() >= 6 );
    assert!( service.is_playing() );
}


#[test]
fn test_enqueue_into_empty_queue_starts_playback() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 5, 6 ] ) ) );

    service.enqueue( &ids( &[ 5, 6 ] ), EnqueueAction::Last );

    assert_eq!( service.current_track(), Some( TrackId( 5 ) ) );
    assert_eq!( factory.playing_uri(), Some( uri( 5 ) ) );
}


#[test]
fn test_enqueue_next_restages_successor() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 9 ] ) ) );

    service.open( &ids( &[ 1, 2 ] ), Some( 0 ) );
    service.play();
    settle( &mut service );
    assert_eq!( service.staged_track(), Some( TrackId( 2 ) ) );

    service.enqueue( &ids( &[ 9 ] ), EnqueueAction::Next );
    settle( &mut service );
    assert_eq!( service.staged_track(), Some( TrackId( 9 ) ) );
}


#[test]
fn test_podcast_resumes_before_bookmark_and_saves_it() {
    let factory = FakeFactory::new();
    let catalog = Arc::new( FakeCatalog::new( &[ 1, 2 ] ).with_podcast( 1, 60_000 ) );
    let mut service = service( &factory, catalog.clone() );

    service.open( &ids( &[ 1, 2 ] ), Some( 0 ) );
    assert_eq!( service.position_ms(), Some( 55_000 ) );

    service.seek( 120_000 );
    service.next();
    assert_eq!( catalog.bookmarks.lock().unwrap().as_slice(), &[ ( TrackId( 1 ), 120_000 ) ] );
}


#[test]
fn test_seek_is_clamped_to_duration() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1 ] ) ) );
    assert_eq!( service.seek( 1_000 ), None );

    service.open( &ids( &[ 1 ] ), Some( 0 ) );
    assert_eq!( service.seek( 10_000_000 ), Some( support::TRACK_MS ) );
}


#[test]
fn test_volume_applies_to_new_handles() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2 ] ) ) );
    service.set_volume( 0.25 );

    service.open( &ids( &[ 1, 2 ] ), Some( 0 ) );
    assert!( factory.live_handles().iter().all( |( _, s )| s.volume == 0.25 ) );
}


#[test]
fn test_state_survives_restart() {
    let store = Arc::new( MemoryStore::new() );
    let catalog = Arc::new( FakeCatalog::new( &[ 1, 2, 3, 4 ] ) );

    {
        let factory = FakeFactory::new();
        let mut first = service( &factory, catalog.clone() )
            .with_store( store.clone(), Some( 7 ) )
            .unwrap();
        first.open( &ids( &[ 4, 3, 2, 1 ] ), Some( 2 ) );
        first.set_repeat_mode( RepeatMode::All );
        first.seek( 30_000 );
        first.shutdown();
    }

    let factory = FakeFactory::new();
    let mut second = service( &factory, catalog.clone() )
        .with_store( store.clone(), Some( 7 ) )
        .unwrap();
    assert!( second.restore() );

    assert_eq!( second.queue_snapshot(), ids( &[ 4, 3, 2, 1 ] ) );
    assert_eq!( second.queue_position(), Some( 2 ) );
    assert_eq!( second.repeat_mode(), RepeatMode::All );
    assert_eq!( second.current_track(), Some( TrackId( 2 ) ) );
    assert_eq!( second.position_ms(), Some( 30_000 ) );
    assert!( !second.is_playing() );
}


#[test]
fn test_foreign_generation_is_not_restored() {
    let store = Arc::new( MemoryStore::new() );
    let catalog = Arc::new( FakeCatalog::new( &[ 1, 2 ] ) );

    {
        let factory = FakeFactory::new();
        let mut first = service( &factory, catalog.clone() ).with_store( store.clone(), Some( 1 ) ).unwrap();
        first.open( &ids( &[ 1, 2 ] ), Some( 0 ) );
        first.shutdown();
    }

    let factory = FakeFactory::new();
    let mut second = service( &factory, catalog ).with_store( store, Some( 2 ) ).unwrap();
    assert!( !second.restore() );
    assert!( second.queue_snapshot().is_empty() );
}


#[test]
fn test_unopenable_saved_track_discards_queue_quietly() {
    let store = Arc::new( MemoryStore::new() );

    {
        let factory = FakeFactory::new();
        let mut first = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2 ] ) ) )
            .with_store( store.clone(), None )
            .unwrap();
        first.open( &ids( &[ 1, 2 ] ), Some( 1 ) );
        first.shutdown();
    }

    let factory = FakeFactory::new();
    let mut second = service( &factory, Arc::new( FakeCatalog::new( &[ 1 ] ) ) )
        .with_store( store, None )
        .unwrap();
    let mut rx = second.subscribe();
    assert!( !second.restore() );
    assert!( second.queue_snapshot().is_empty() );
    assert!( !drain( &mut rx ).iter().any( |e| matches!( e, PlaybackEvent::PlaybackFailed { .. } ) ) );
}


#[test]
fn test_corrupt_state_starts_empty() {
    let store = Arc::new( MemoryStore::new() );
    store.put_all( &[
        ( "queue".to_string(), "1;zz;".to_string() ),
        ( "curpos".to_string(), "0".to_string() ),
    ]).unwrap();

    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1 ] ) ) )
        .with_store( store, None )
        .unwrap();
    assert!( !service.restore() );
    assert!( service.queue_snapshot().is_empty() );
    assert_eq!( service.queue_position(), None );
}


#[test]
fn test_text_commands_drive_the_service() {
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2, 3 ] ) ) );
    service.open( &ids( &[ 1, 2, 3 ] ), Some( 0 ) );

    let run = |service: &mut segue_core::PlaybackService, line: &str| {
        Command::parse( line ).unwrap().execute( service ).unwrap()
    };

    assert_eq!( run( &mut service, "repeat" ), CommandOutcome::Message( "Repeat: All".into() ) );
    assert_eq!( run( &mut service, "shuffle" ), CommandOutcome::Message( "Shuffle: Normal".into() ) );
    assert_eq!( run( &mut service, "goto 2" ), CommandOutcome::Done );
    assert_eq!( service.current_track(), Some( TrackId( 3 ) ) );
    assert_eq!( run( &mut service, "seek 1:00" ), CommandOutcome::Message( "Position: 1:00".into() ) );
    assert_eq!( run( &mut service, "queue" ), CommandOutcome::ShowQueue );
    assert_eq!( run( &mut service, "q" ), CommandOutcome::Quit );

    let result = Command::parse( "goto 9" ).unwrap().execute( &mut service );
    assert!( matches!( result, Err( CommandError::ExecutionFailed( _ ) ) ) );
}
