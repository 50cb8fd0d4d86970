use proptest::prelude::*;
use segue_core::{ EnqueueAction, PlayQueue, RepeatMode, ShuffleMode, TrackId };


#[derive( Debug, Clone )]
enum Op {
    Replace( Vec<u64>, Option<usize> ),
    Insert( Vec<u64>, EnqueueAction ),
    Remove( usize, usize ),
    RemoveId( u64 ),
    Move( usize, usize ),
    Jump( usize ),
    Advance( bool ),
    Plan,
    Previous,
    Shuffle( ShuffleMode ),
    Repeat( RepeatMode ),
    Clear,
}


fn op() -> impl Strategy<Value = Op> {
    let list = || prop::collection::vec( 0u64..20, 0..8 );
    prop_oneof![
        ( list(), prop::option::of( 0usize..10 ) ).prop_map( |( l, s )| Op::Replace( l, s ) ),
        ( list(), prop_oneof![
            Just( EnqueueAction::Now ),
            Just( EnqueueAction::Next ),
            Just( EnqueueAction::Last ),
        ]).prop_map( |( l, a )| Op::Insert( l, a ) ),
        ( 0usize..12, 0usize..12 ).prop_map( |( a, b )| Op::Remove( a, b ) ),
        ( 0u64..20 ).prop_map( Op::RemoveId ),
        ( 0usize..12, 0usize..12 ).prop_map( |( a, b )| Op::Move( a, b ) ),
        ( 0usize..12 ).prop_map( Op::Jump ),
        any::<bool>().prop_map( Op::Advance ),
        Just( Op::Plan ),
        Just( Op::Previous ),
        prop_oneof![
            Just( ShuffleMode::None ),
            Just( ShuffleMode::Normal ),
            Just( ShuffleMode::Auto ),
        ].prop_map( Op::Shuffle ),
        prop_oneof![
            Just( RepeatMode::None ),
            Just( RepeatMode::Current ),
            Just( RepeatMode::All ),
        ].prop_map( Op::Repeat ),
        Just( Op::Clear ),
    ]
}


fn apply( queue: &mut PlayQueue, op: Op ) {
    let tracks = |l: Vec<u64>| l.into_iter().map( TrackId ).collect::<Vec<_>>();
    match op {
        Op::Replace( l, start ) => { queue.replace( &tracks( l ), start ); }
        Op::Insert( l, action ) => { queue.insert( &tracks( l ), action ); }
        Op::Remove( first, last ) => { queue.remove_range( first, last ); }
        Op::RemoveId( id ) => { queue.remove_id( TrackId( id ) ); }
        Op::Move( from, to ) => { queue.move_item( from, to ); }
        Op::Jump( index ) => { queue.set_position( index ); }
        Op::Advance( force ) => { queue.advance( force ); }
        Op::Plan => {
            if let Some( next ) = queue.plan_next() {
                assert!( next < queue.len() );
                queue.commit( next );
            }
        }
        Op::Previous => { queue.previous(); }
        Op::Shuffle( ShuffleMode::Auto ) => {
            queue.enable_auto( ( 100..130 ).map( TrackId ).collect() );
        }
        Op::Shuffle( mode ) => queue.set_shuffle( mode ),
        Op::Repeat( mode ) => queue.set_repeat( mode ),
        Op::Clear => queue.clear(),
    }
}


proptest! {
    #[test]
    fn test_play_head_stays_valid( seed in any::<u64>(), ops in prop::collection::vec( op(), 1..60 ) ) {
        let mut queue = PlayQueue::with_seed( 100, seed );

        for op in ops {
            apply( &mut queue, op );

            match queue.position() {
                None => prop_assert!( queue.is_empty() ),
                Some( p ) => prop_assert!( p < queue.len() ),
            }
            prop_assert!( queue.history().len() <= 100 );
            prop_assert!( !( queue.shuffle() != ShuffleMode::None && queue.repeat() == RepeatMode::Current ) );
            if queue.shuffle() == ShuffleMode::None {
                prop_assert!( queue.history().is_empty() );
            }
        }
    }


    #[test]
    fn test_sequential_advance_is_next_index( len in 2usize..50, start in 0usize..50 ) {
        let start = start % len;
        let list: Vec<TrackId> = ( 0..len as u64 ).map( TrackId ).collect();
        let mut queue = PlayQueue::with_seed( 100, 0 );
        queue.replace( &list, Some( start ) );

        let expected = if start + 1 < len { Some( start + 1 ) } else { None };
        prop_assert_eq!( queue.peek_next(), expected );
        prop_assert_eq!( queue.advance( false ), expected );
    }
}
