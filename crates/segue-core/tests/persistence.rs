mod support;

use std::sync::Arc;

use proptest::prelude::*;
use segue_core::{ FileStore, MemoryStore, QueueState, RepeatMode, ShuffleMode, StateStore, TrackId };
use support::{ ids, service, FakeCatalog, FakeFactory };


fn repeat_mode() -> impl Strategy<Value = RepeatMode> {
    prop_oneof![ Just( RepeatMode::None ), Just( RepeatMode::Current ), Just( RepeatMode::All ) ]
}


fn shuffle_mode() -> impl Strategy<Value = ShuffleMode> {
    prop_oneof![ Just( ShuffleMode::None ), Just( ShuffleMode::Normal ), Just( ShuffleMode::Auto ) ]
}


prop_compose! {
    fn queue_state()(
        tracks in prop::collection::vec( any::<u64>(), 1..1000 ),
        shuffle in shuffle_mode(),
        repeat in repeat_mode(),
        seek_ms in 0..i64::MAX as u64,
        generation in prop::option::of( any::<i64>() ),
    )(
        position in 0..tracks.len(),
        history in prop::collection::vec( 0..tracks.len(), 0..100 ),
        tracks in Just( tracks ),
        shuffle in Just( shuffle ),
        repeat in Just( repeat ),
        seek_ms in Just( seek_ms ),
        generation in Just( generation ),
    ) -> QueueState {
        QueueState {
            tracks: tracks.into_iter().map( TrackId ).collect(),
            history: if shuffle == ShuffleMode::None { Vec::new() } else { history },
            position: Some( position ),
            seek_ms,
            repeat,
            shuffle,
            generation,
        }
    }
}


proptest! {
    #[test]
    fn test_full_save_loads_back( state in queue_state() ) {
        let store = MemoryStore::new();
        store.put_all( &state.to_entries( true ) ).unwrap();

        let loaded = QueueState::load( &store, state.generation ).unwrap();
        prop_assert_eq!( loaded, Some( state ) );
    }


    #[test]
    fn test_light_save_keeps_track_list( state in queue_state(), moved in any::<prop::sample::Index>() ) {
        let store = MemoryStore::new();
        store.put_all( &state.to_entries( true ) ).unwrap();

        let mut later = state.clone();
        later.position = Some( moved.index( state.tracks.len() ) );
        later.tracks = Vec::new();
        store.put_all( &later.to_entries( false ) ).unwrap();

        let loaded = QueueState::load( &store, state.generation ).unwrap().unwrap();
        prop_assert_eq!( &loaded.tracks, &state.tracks );
        prop_assert_eq!( loaded.position, later.position );
    }


    #[test]
    fn test_garbage_never_panics(
        queue in ".{0,40}",
        position in ".{0,8}",
        history in ".{0,40}",
        shuffle in ".{0,3}",
    ) {
        let store = MemoryStore::new();
        store.put_all( &[
            ( "queue".to_string(), queue ),
            ( "curpos".to_string(), position ),
            ( "history".to_string(), history ),
            ( "shufflemode".to_string(), shuffle ),
        ]).unwrap();

        if let Ok( Some( state ) ) = QueueState::load( &store, None ) {
            prop_assert!( state.position.unwrap() < state.tracks.len() );
        }
    }
}


#[test]
fn test_queue_survives_restart_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join( "state.json" );
    let catalog = Arc::new( FakeCatalog::new( &[ 1, 2, 3 ] ) );

    {
        let store = Arc::new( FileStore::open( &path ).unwrap() );
        let factory = FakeFactory::new();
        let mut first = service( &factory, catalog.clone() ).with_store( store, Some( 3 ) ).unwrap();
        first.open( &ids( &[ 3, 1, 2 ] ), Some( 1 ) );
        first.set_shuffle_mode( ShuffleMode::Normal );
        first.shutdown();
    }

    let store = Arc::new( FileStore::open( &path ).unwrap() );
    let factory = FakeFactory::new();
    let mut second = service( &factory, catalog ).with_store( store, Some( 3 ) ).unwrap();
    assert!( second.restore() );
    assert_eq!( second.queue_snapshot(), ids( &[ 3, 1, 2 ] ) );
    assert_eq!( second.queue_position(), Some( 1 ) );
    assert_eq!( second.shuffle_mode(), ShuffleMode::Normal );
}


#[test]
fn test_corrupt_file_restores_empty_queue() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join( "state.json" );
    std::fs::write( &path, "not json{" ).unwrap();

    let store = Arc::new( FileStore::open( &path ).unwrap() );
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1, 2 ] ) ) )
        .with_store( store, None )
        .unwrap();
    assert!( !service.restore() );
    assert!( service.queue_snapshot().is_empty() );
    assert_eq!( service.queue_position(), None );

    service.open( &ids( &[ 2, 1 ] ), Some( 0 ) );
    service.shutdown();

    let reopened = FileStore::open( &path ).unwrap();
    assert!( reopened.get( "queue" ).unwrap().is_some() );
}


#[test]
fn test_empty_queue_saves_and_restores_empty() {
    let state = QueueState {
        shuffle: ShuffleMode::Normal,
        repeat: RepeatMode::All,
        ..Default::default()
    };
    let store = Arc::new( MemoryStore::new() );
    store.put_all( &state.to_entries( true ) ).unwrap();
    assert_eq!( store.get( "curpos" ).unwrap().as_deref(), Some( "-1" ) );
    assert_eq!( QueueState::load( store.as_ref(), None ).unwrap(), None );

    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1 ] ) ) )
        .with_store( store, None )
        .unwrap();
    assert!( !service.restore() );
    assert!( service.queue_snapshot().is_empty() );
    assert_eq!( service.queue_position(), None );
}


#[test]
fn test_missing_file_restores_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new( FileStore::open( dir.path().join( "absent.json" ) ).unwrap() );
    let factory = FakeFactory::new();
    let mut service = service( &factory, Arc::new( FakeCatalog::new( &[ 1 ] ) ) )
        .with_store( store, None )
        .unwrap();
    assert!( !service.restore() );
}
