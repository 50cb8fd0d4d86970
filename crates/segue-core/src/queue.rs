//! Play queue
//!
//! Ordered list of track ids with a play head, shuffle and repeat modes and
//! the bounded history used by normal shuffle. All "what plays next"
//! decisions are made here; the queue never touches a player.

use crate::codec::QueueState;
use crate::history::{ History, MAX_HISTORY_SIZE };
use crate::shuffle::Shuffler;
use crate::types::{ EnqueueAction, RepeatMode, ShuffleMode, TrackId };


/// Auto shuffle trims entries behind the play head once it is past this index.
pub const AUTO_TRIM_THRESHOLD: usize = 10;

/// Entries kept behind the play head after an auto shuffle trim, plus one.
pub const AUTO_TRAILING: usize = 9;

/// Auto shuffle keeps the queue this long counting from one before the
/// play head.
pub const AUTO_WINDOW_TARGET: i64 = 7;


/// Result of a removal.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub struct Removal {
    /// Number of entries removed.
    pub removed: usize,
    /// True if the entry under the play head was among them.
    pub current_removed: bool,
}


/// Where an entry at `index` ends up after moving `from` to `to`.
pub fn moved_index( index: usize, from: usize, to: usize ) -> usize {
    if index == from {
        to
    } else if from < to && index > from && index <= to {
        index - 1
    } else if to < from && index >= to && index < from {
        index + 1
    } else {
        index
    }
}


/// The play queue.
#[derive( Debug )]
pub struct PlayQueue {
    tracks: Vec<TrackId>,
    position: Option<usize>,
    shuffle: ShuffleMode,
    repeat: RepeatMode,
    history: History,
    auto_source: Vec<TrackId>,
    shuffler: Shuffler,
}


impl PlayQueue {
    /// Creates an empty queue with the given history capacity.
    pub fn new( history_capacity: usize ) -> Self {
        Self::with_shuffler( history_capacity, Shuffler::new() )
    }


    /// Creates an empty queue with a deterministic random source.
    pub fn with_seed( history_capacity: usize, seed: u64 ) -> Self {
        Self::with_shuffler( history_capacity, Shuffler::with_seed( seed ) )
    }


    fn with_shuffler( history_capacity: usize, shuffler: Shuffler ) -> Self {
        Self {
            tracks: Vec::new(),
            position: None,
            shuffle: ShuffleMode::None,
            repeat: RepeatMode::None,
            history: History::new( history_capacity ),
            auto_source: Vec::new(),
            shuffler,
        }
    }


    pub fn tracks( &self ) -> &[TrackId] {
        &self.tracks
    }


    pub fn len( &self ) -> usize {
        self.tracks.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.tracks.is_empty()
    }


    /// Index of the play head; `None` iff the queue is empty.
    pub fn position( &self ) -> Option<usize> {
        self.position
    }


    /// Track under the play head.
    pub fn current( &self ) -> Option<TrackId> {
        self.position.and_then( |p| self.track_at( p ) )
    }


    pub fn track_at( &self, index: usize ) -> Option<TrackId> {
        self.tracks.get( index ).copied()
    }


    pub fn shuffle( &self ) -> ShuffleMode {
        self.shuffle
    }


    pub fn repeat( &self ) -> RepeatMode {
        self.repeat
    }


    pub fn history( &self ) -> &History {
        &self.history
    }


    /// Replaces the whole queue.
    ///
    /// `start` of `None` picks a random entry. Auto shuffle is downgraded to
    /// normal shuffle and the history is cleared. Returns true if the list
    /// differs from the previous contents; an empty list is rejected and
    /// leaves the queue untouched.
    pub fn replace( &mut self, list: &[TrackId], start: Option<usize> ) -> bool {
        if list.is_empty() {
            tracing::warn!( "Ignoring open of an empty list" );
            return false;
        }

        if self.shuffle == ShuffleMode::Auto {
            self.shuffle = ShuffleMode::Normal;
            self.auto_source.clear();
        }

        let changed = self.tracks != list;
        if changed {
            self.tracks = list.to_vec();
        }

        let position = match start {
            Some( index ) => index.min( list.len() - 1 ),
            None => self.shuffler.next_index( list.len() ),
        };
        self.position = Some( position );
        self.history.clear();
        changed
    }


    /// Adds tracks to the queue.
    ///
    /// Returns the position playback should jump to and start from, if
    /// any: the first new entry for [`EnqueueAction::Now`], or 0 when the
    /// queue was empty.
    pub fn insert( &mut self, list: &[TrackId], action: EnqueueAction ) -> Option<usize> {
        if list.is_empty() {
            return None;
        }

        let before = self.tracks.len();
        match ( action, self.position ) {
            ( EnqueueAction::Next, Some( pos ) ) if pos + 1 < before => {
                let at = pos + 1;
                self.tracks.splice( at..at, list.iter().copied() );
                if self.shuffle == ShuffleMode::Normal {
                    let count = list.len();
                    self.history.remap( |i| Some( if i >= at { i + count } else { i } ) );
                }
            }
            _ => {
                self.tracks.extend_from_slice( list );
                if action == EnqueueAction::Now {
                    self.position = Some( before );
                    return Some( before );
                }
            }
        }

        if self.position.is_none() {
            self.position = Some( 0 );
            return Some( 0 );
        }
        None
    }


    /// Removes entries `first..=last`, clamped to the queue.
    ///
    /// If the play head was inside the range it moves to the first
    /// surviving entry after it, wrapping to 0, or to `None` when the queue
    /// ends up empty.
    pub fn remove_range( &mut self, first: usize, last: usize ) -> Removal {
        let len = self.tracks.len();
        if last < first || first >= len {
            return Removal::default();
        }
        let last = last.min( len - 1 );
        let count = last - first + 1;

        let mut current_removed = false;
        if let Some( pos ) = self.position {
            if pos >= first && pos <= last {
                current_removed = true;
                self.position = Some( first );
            } else if pos > last {
                self.position = Some( pos - count );
            }
        }

        self.tracks.drain( first..=last );

        if current_removed {
            if self.tracks.is_empty() {
                self.position = None;
            } else if first >= self.tracks.len() {
                self.position = Some( 0 );
            }
        }

        if self.shuffle == ShuffleMode::Normal {
            self.history.remap( |i| {
                if i < first {
                    Some( i )
                } else if i > last {
                    Some( i - count )
                } else {
                    None
                }
            });
        }

        Removal { removed: count, current_removed }
    }


    /// Removes every entry holding `id`.
    pub fn remove_id( &mut self, id: TrackId ) -> Removal {
        let mut total = Removal::default();
        let mut i = 0;
        while i < self.tracks.len() {
            if self.tracks[ i ] == id {
                let removal = self.remove_range( i, i );
                total.removed += removal.removed;
                total.current_removed |= removal.current_removed;
            } else {
                i += 1;
            }
        }
        total
    }


    /// Moves one entry. Out of range indices are clamped to the last entry.
    /// The play head keeps pointing at the same track.
    pub fn move_item( &mut self, from: usize, to: usize ) -> bool {
        let len = self.tracks.len();
        if len == 0 {
            return false;
        }
        let from = from.min( len - 1 );
        let to = to.min( len - 1 );
        if from == to {
            return false;
        }

        let id = self.tracks.remove( from );
        self.tracks.insert( to, id );
        self.position = self.position.map( |p| moved_index( p, from, to ) );
        if self.shuffle == ShuffleMode::Normal {
            self.history.remap( |i| Some( moved_index( i, from, to ) ) );
        }
        true
    }


    /// Moves the play head to `index`. Returns false if out of range.
    pub fn set_position( &mut self, index: usize ) -> bool {
        if index >= self.tracks.len() {
            return false;
        }
        self.position = Some( index );
        true
    }


    /// Computes and commits the next position.
    ///
    /// `force` is set for user-initiated skips and error recovery: it
    /// overrides repeat-current and wraps past the end regardless of the
    /// repeat mode. Returns `None` when playback should go idle.
    pub fn advance( &mut self, force: bool ) -> Option<usize> {
        let next = self.next_position( force )?;
        self.position = Some( next );
        Some( next )
    }


    fn next_position( &mut self, force: bool ) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }

        if !force && self.repeat == RepeatMode::Current {
            return Some( self.position.unwrap_or( 0 ) );
        }

        match self.shuffle {
            ShuffleMode::Normal => {
                if let Some( pos ) = self.position {
                    self.history.push( pos );
                }
                let lookback = self.history.len();
                self.pick_unplayed( force, None, lookback )
            }
            ShuffleMode::Auto => {
                self.refill_auto_window();
                let next = self.position.map_or( 0, |p| p + 1 );
                ( next < self.tracks.len() ).then_some( next )
            }
            ShuffleMode::None => self.sequential_next( force ),
        }
    }


    /// Computes the position to pre-stage without committing to it.
    ///
    /// Normal shuffle history is left alone: the play head only counts as
    /// played once [`commit`](Self::commit) moves past it.
    pub fn plan_next( &mut self ) -> Option<usize> {
        if self.shuffle == ShuffleMode::Normal && self.repeat != RepeatMode::Current && !self.tracks.is_empty() {
            let lookback = self.history.capacity().saturating_sub( 1 );
            return self.pick_unplayed( false, self.position, lookback );
        }
        self.next_position( false )
    }


    /// Position a non-forced advance would pick, without side effects.
    /// Normal shuffle picks at random and has no such position.
    pub fn peek_next( &self ) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }
        if self.repeat == RepeatMode::Current {
            return self.position;
        }
        match self.shuffle {
            ShuffleMode::Normal => None,
            ShuffleMode::Auto => self.position
                .map( |p| p + 1 )
                .filter( |&next| next < self.tracks.len() ),
            ShuffleMode::None => self.sequential_next( false ),
        }
    }


    /// Moves the play head to a planned position after a gapless handoff.
    pub fn commit( &mut self, next: usize ) {
        if self.shuffle == ShuffleMode::Normal {
            if let Some( pos ) = self.position {
                self.history.push( pos );
            }
        }
        self.position = Some( next );
    }


    /// Picks a random index that is neither `playing` nor among the
    /// `lookback` most recent history entries. Once everything has been
    /// played the full set is used again, but only for repeat-all or a
    /// forced advance.
    fn pick_unplayed( &mut self, force: bool, playing: Option<usize>, lookback: usize ) -> Option<usize> {
        let len = self.tracks.len();
        let mut played = vec![ false; len ];
        for index in self.history.recent( lookback ).chain( playing ) {
            if index < len {
                played[ index ] = true;
            }
        }

        let mut candidates: Vec<usize> = ( 0..len ).filter( |&i| !played[ i ] ).collect();
        if candidates.is_empty() {
            if self.repeat != RepeatMode::All && !force {
                return None;
            }
            candidates = ( 0..len ).collect();
        }

        let pick = self.shuffler.next_index( candidates.len() );
        Some( candidates[ pick ] )
    }


    fn sequential_next( &self, force: bool ) -> Option<usize> {
        let len = self.tracks.len();
        match self.position {
            None => Some( 0 ),
            Some( pos ) if pos + 1 >= len => {
                if self.repeat == RepeatMode::None && !force {
                    None
                } else {
                    Some( 0 )
                }
            }
            Some( pos ) => Some( pos + 1 ),
        }
    }


    /// Steps back.
    ///
    /// Normal shuffle returns to the most recent history entry and is a
    /// no-op with an empty history. Otherwise the play head moves back one
    /// entry, wrapping from the first to the last.
    pub fn previous( &mut self ) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        let target = if self.shuffle == ShuffleMode::Normal {
            let mut index = self.history.pop()?;
            if index >= len {
                index = self.shuffler.next_index( len );
                self.history.clear();
            }
            index
        } else {
            match self.position {
                Some( pos ) if pos > 0 => pos - 1,
                _ => len - 1,
            }
        };

        self.position = Some( target );
        Some( target )
    }


    /// Keeps the auto shuffle window filled. Returns true if the queue
    /// changed.
    ///
    /// Entries far behind the play head are trimmed, then random library
    /// entries are appended. A pick that was used within the current
    /// lookback is rejected and the lookback halved, so the loop always
    /// terminates.
    pub fn refill_auto_window( &mut self ) -> bool {
        if self.auto_source.is_empty() {
            return false;
        }

        let mut changed = false;
        if let Some( pos ) = self.position {
            if pos > AUTO_TRIM_THRESHOLD {
                self.remove_range( 0, pos - AUTO_TRAILING );
                changed = true;
            }
        }

        let anchor = self.position.map_or( -1, |p| p as i64 );
        let to_add = AUTO_WINDOW_TARGET - ( self.tracks.len() as i64 - anchor );
        for _ in 0..to_add.max( 0 ) {
            let mut lookback = self.history.len();
            let index = loop {
                let candidate = self.shuffler.next_index( self.auto_source.len() );
                if !self.history.was_recently_used( candidate, lookback ) {
                    break candidate;
                }
                lookback /= 2;
            };
            self.history.push( index );
            self.tracks.push( self.auto_source[ index ] );
            changed = true;
        }

        changed
    }


    /// Switches shuffle mode.
    ///
    /// Leaving normal or auto shuffle clears the history. Any shuffle
    /// turns repeat-current into repeat-all. `Auto` reuses the library
    /// source from the last [`enable_auto`](Self::enable_auto).
    pub fn set_shuffle( &mut self, mode: ShuffleMode ) {
        if mode == ShuffleMode::Auto {
            let source = std::mem::take( &mut self.auto_source );
            self.enable_auto( source );
            return;
        }

        if self.shuffle != mode && self.shuffle != ShuffleMode::None {
            self.history.clear();
        }
        if self.shuffle == ShuffleMode::Auto {
            self.auto_source.clear();
        }
        self.shuffle = mode;

        if mode != ShuffleMode::None && self.repeat == RepeatMode::Current {
            self.repeat = RepeatMode::All;
        }
    }


    /// Switches repeat mode. Repeat-current turns shuffle off.
    pub fn set_repeat( &mut self, mode: RepeatMode ) {
        self.repeat = mode;
        if mode == RepeatMode::Current && self.shuffle != ShuffleMode::None {
            self.set_shuffle( ShuffleMode::None );
        }
    }


    /// Replaces the queue with a fresh auto shuffle window drawn from
    /// `source` and puts the play head on its first entry.
    ///
    /// An empty source turns shuffle off and returns false.
    pub fn enable_auto( &mut self, source: Vec<TrackId> ) -> bool {
        if source.is_empty() {
            tracing::warn!( "No tracks available for auto shuffle" );
            self.set_shuffle( ShuffleMode::None );
            return false;
        }

        self.auto_source = source;
        self.shuffle = ShuffleMode::Auto;
        if self.repeat == RepeatMode::Current {
            self.repeat = RepeatMode::All;
        }

        self.tracks.clear();
        self.position = None;
        self.history.clear();
        self.refill_auto_window();
        self.position = Some( 0 );
        true
    }


    /// Snapshot for persistence.
    pub fn to_state( &self, seek_ms: u64, generation: Option<i64> ) -> QueueState {
        QueueState {
            tracks: self.tracks.clone(),
            history: self.history.to_vec(),
            position: self.position,
            seek_ms,
            repeat: self.repeat,
            shuffle: self.shuffle,
            generation,
        }
    }


    /// Restores persisted state.
    ///
    /// Auto shuffle needs `auto_source`; without one the mode degrades to
    /// none. The repeat/shuffle exclusion is re-applied.
    pub fn restore( &mut self, state: &QueueState, auto_source: Vec<TrackId> ) {
        self.tracks = state.tracks.clone();
        self.position = state.position.filter( |&p| p < self.tracks.len() )
            .or( if self.tracks.is_empty() { None } else { Some( 0 ) } );
        self.history.restore( state.history.iter().copied() );
        self.repeat = state.repeat;
        self.shuffle = state.shuffle;
        self.auto_source.clear();

        if self.shuffle == ShuffleMode::Auto {
            if auto_source.is_empty() {
                tracing::warn!( "Auto shuffle restored without a library, turning shuffle off" );
                self.shuffle = ShuffleMode::None;
                self.history.clear();
            } else {
                self.auto_source = auto_source;
            }
        }
        if self.shuffle == ShuffleMode::None {
            self.history.clear();
        }

        if self.repeat == RepeatMode::Current && self.shuffle != ShuffleMode::None {
            self.set_shuffle( ShuffleMode::None );
        }
    }


    /// Empties the queue. Modes are kept.
    pub fn clear( &mut self ) {
        self.tracks.clear();
        self.position = None;
        self.history.clear();
    }
}


impl Default for PlayQueue {
    fn default() -> Self {
        Self::new( MAX_HISTORY_SIZE )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::collections::HashSet;


    fn ids( values: &[u64] ) -> Vec<TrackId> {
        values.iter().copied().map( TrackId ).collect()
    }


    fn queue_of( values: &[u64], position: usize ) -> PlayQueue {
        let mut queue = PlayQueue::with_seed( MAX_HISTORY_SIZE, 7 );
        queue.replace( &ids( values ), Some( position ) );
        queue
    }


    #[test]
    fn test_sequential_visits_in_order_then_stops() {
        let mut queue = queue_of( &[ 1, 2, 3, 4, 5 ], 0 );
        let mut visited = vec![ 0 ];
        while let Some( next ) = queue.advance( false ) {
            visited.push( next );
        }
        assert_eq!( visited, vec![ 0, 1, 2, 3, 4 ] );
        assert_eq!( queue.position(), Some( 4 ) );
    }


    #[test]
    fn test_repeat_all_wraps_to_start() {
        let mut queue = queue_of( &[ 1, 2, 3 ], 1 );
        queue.set_repeat( RepeatMode::All );
        assert_eq!( queue.advance( false ), Some( 2 ) );
        assert_eq!( queue.advance( false ), Some( 0 ) );
    }


    #[test]
    fn test_forced_advance_wraps_without_repeat() {
        let mut queue = queue_of( &[ 1, 2, 3 ], 2 );
        assert_eq!( queue.plan_next(), None );
        assert_eq!( queue.advance( true ), Some( 0 ) );
    }


    #[test]
    fn test_repeat_current_holds_position() {
        let mut queue = queue_of( &[ 1, 2, 3 ], 1 );
        queue.set_shuffle( ShuffleMode::Normal );
        queue.set_repeat( RepeatMode::Current );
        assert_eq!( queue.shuffle(), ShuffleMode::None );

        for _ in 0..5 {
            assert_eq!( queue.advance( false ), Some( 1 ) );
        }
        assert_eq!( queue.advance( true ), Some( 2 ) );
        assert_eq!( queue.advance( true ), Some( 0 ) );
    }


    #[test]
    fn test_normal_shuffle_covers_every_entry_once() {
        let len = 40;
        let values: Vec<u64> = ( 0..len ).collect();
        let mut queue = queue_of( &values, 13 );
        queue.set_shuffle( ShuffleMode::Normal );

        let mut seen = HashSet::new();
        seen.insert( 13 );
        for _ in 1..len {
            let next = queue.advance( false ).unwrap();
            assert!( seen.insert( next ), "index {} repeated", next );
        }
        assert_eq!( seen.len(), len as usize );
        assert_eq!( queue.advance( false ), None );
    }


    #[test]
    fn test_normal_shuffle_history_is_bounded() {
        let values: Vec<u64> = ( 0..150 ).collect();
        let mut queue = queue_of( &values, 0 );
        queue.set_shuffle( ShuffleMode::Normal );
        queue.set_repeat( RepeatMode::All );
        for _ in 0..400 {
            assert!( queue.advance( false ).is_some() );
            assert!( queue.history().len() <= MAX_HISTORY_SIZE );
        }
    }


    #[test]
    fn test_normal_shuffle_exhausted_falls_back_for_repeat_all() {
        let mut queue = queue_of( &[ 1, 2 ], 0 );
        queue.set_shuffle( ShuffleMode::Normal );
        assert_eq!( queue.advance( false ), Some( 1 ) );
        assert_eq!( queue.plan_next(), None );

        queue.set_repeat( RepeatMode::All );
        assert!( queue.advance( false ).is_some() );
    }


    #[test]
    fn test_plan_then_commit_records_history_once() {
        let mut queue = queue_of( &[ 1, 2, 3, 4 ], 0 );
        queue.set_shuffle( ShuffleMode::Normal );

        let planned = queue.plan_next().unwrap();
        assert_ne!( planned, 0 );
        assert!( queue.history().is_empty() );

        queue.commit( planned );
        assert_eq!( queue.history().to_vec(), vec![ 0 ] );
        assert_eq!( queue.position(), Some( planned ) );
    }


    #[test]
    fn test_previous_in_normal_shuffle_pops_history() {
        let mut queue = queue_of( &[ 1, 2, 3, 4 ], 2 );
        queue.set_shuffle( ShuffleMode::Normal );
        assert_eq!( queue.previous(), None );

        queue.advance( false );
        assert_eq!( queue.previous(), Some( 2 ) );
        assert!( queue.history().is_empty() );
    }


    #[test]
    fn test_previous_wraps_to_end() {
        let mut queue = queue_of( &[ 1, 2, 3 ], 0 );
        assert_eq!( queue.previous(), Some( 2 ) );
        assert_eq!( queue.previous(), Some( 1 ) );
    }


    #[test]
    fn test_remove_under_play_head_moves_to_next_survivor() {
        let mut queue = queue_of( &[ 10, 20, 30, 40 ], 1 );
        let removal = queue.remove_range( 1, 2 );
        assert_eq!( removal, Removal { removed: 2, current_removed: true } );
        assert_eq!( queue.tracks(), ids( &[ 10, 40 ] ).as_slice() );
        assert_eq!( queue.position(), Some( 1 ) );
        assert_eq!( queue.current(), Some( TrackId( 40 ) ) );
    }


    #[test]
    fn test_remove_tail_under_play_head_wraps() {
        let mut queue = queue_of( &[ 10, 20, 30 ], 2 );
        let removal = queue.remove_range( 1, 9 );
        assert_eq!( removal.removed, 2 );
        assert_eq!( queue.position(), Some( 0 ) );
    }


    #[test]
    fn test_remove_before_play_head_shifts_it() {
        let mut queue = queue_of( &[ 10, 20, 30, 40 ], 3 );
        let removal = queue.remove_range( 0, 1 );
        assert!( !removal.current_removed );
        assert_eq!( queue.position(), Some( 1 ) );
        assert_eq!( queue.current(), Some( TrackId( 40 ) ) );
    }


    #[test]
    fn test_remove_everything_empties_queue() {
        let mut queue = queue_of( &[ 10, 20 ], 0 );
        queue.remove_range( 0, 1 );
        assert!( queue.is_empty() );
        assert_eq!( queue.position(), None );
    }


    #[test]
    fn test_remove_id_removes_duplicates() {
        let mut queue = queue_of( &[ 5, 6, 5, 7, 5 ], 3 );
        let removal = queue.remove_id( TrackId( 5 ) );
        assert_eq!( removal.removed, 3 );
        assert_eq!( queue.tracks(), ids( &[ 6, 7 ] ).as_slice() );
        assert_eq!( queue.current(), Some( TrackId( 7 ) ) );
    }


    #[test]
    fn test_move_keeps_play_head_on_track() {
        let mut queue = queue_of( &[ 1, 2, 3, 4 ], 2 );
        assert!( queue.move_item( 0, 2 ) );
        assert_eq!( queue.tracks(), ids( &[ 2, 3, 1, 4 ] ).as_slice() );
        assert_eq!( queue.position(), Some( 1 ) );
        assert_eq!( queue.current(), Some( TrackId( 3 ) ) );

        assert!( queue.move_item( 1, 0 ) );
        assert_eq!( queue.position(), Some( 0 ) );
        assert_eq!( queue.current(), Some( TrackId( 3 ) ) );
    }


    #[test]
    fn test_move_clamps_indices() {
        let mut queue = queue_of( &[ 1, 2, 3 ], 0 );
        assert!( queue.move_item( 0, 99 ) );
        assert_eq!( queue.tracks(), ids( &[ 2, 3, 1 ] ).as_slice() );
        assert_eq!( queue.position(), Some( 2 ) );
    }


    #[test]
    fn test_enqueue_next_inserts_after_play_head() {
        let mut queue = queue_of( &[ 1, 2, 3 ], 0 );
        assert_eq!( queue.insert( &ids( &[ 9 ] ), EnqueueAction::Next ), None );
        assert_eq!( queue.tracks(), ids( &[ 1, 9, 2, 3 ] ).as_slice() );
    }


    #[test]
    fn test_enqueue_next_at_end_appends() {
        let mut queue = queue_of( &[ 1, 2 ], 1 );
        queue.insert( &ids( &[ 9 ] ), EnqueueAction::Next );
        assert_eq!( queue.tracks(), ids( &[ 1, 2, 9 ] ).as_slice() );
    }


    #[test]
    fn test_enqueue_now_jumps_to_first_new_entry() {
        let mut queue = queue_of( &[ 1, 2 ], 0 );
        assert_eq!( queue.insert( &ids( &[ 8, 9 ] ), EnqueueAction::Now ), Some( 2 ) );
        assert_eq!( queue.current(), Some( TrackId( 8 ) ) );
    }


    #[test]
    fn test_enqueue_into_empty_queue_starts_at_zero() {
        let mut queue = PlayQueue::with_seed( MAX_HISTORY_SIZE, 1 );
        assert_eq!( queue.insert( &ids( &[ 4, 5 ] ), EnqueueAction::Last ), Some( 0 ) );
        assert_eq!( queue.position(), Some( 0 ) );
    }


    #[test]
    fn test_replace_detects_identical_list() {
        let mut queue = queue_of( &[ 1, 2, 3 ], 0 );
        assert!( !queue.replace( &ids( &[ 1, 2, 3 ] ), Some( 2 ) ) );
        assert_eq!( queue.position(), Some( 2 ) );
        assert!( queue.replace( &ids( &[ 1, 2 ] ), Some( 0 ) ) );
        assert!( !queue.replace( &[], Some( 0 ) ) );
        assert_eq!( queue.len(), 2 );
    }


    #[test]
    fn test_replace_with_random_start_stays_in_range() {
        let mut queue = PlayQueue::with_seed( MAX_HISTORY_SIZE, 3 );
        for _ in 0..20 {
            queue.replace( &ids( &[ 1, 2, 3, 4 ] ), None );
            assert!( queue.position().unwrap() < 4 );
        }
    }


    #[test]
    fn test_shuffle_forces_repeat_all() {
        let mut queue = queue_of( &[ 1, 2, 3 ], 0 );
        queue.set_repeat( RepeatMode::Current );
        queue.set_shuffle( ShuffleMode::Normal );
        assert_eq!( queue.repeat(), RepeatMode::All );
        assert_eq!( queue.shuffle(), ShuffleMode::Normal );
    }


    #[test]
    fn test_auto_shuffle_keeps_window_around_play_head() {
        let mut queue = PlayQueue::with_seed( MAX_HISTORY_SIZE, 11 );
        let library: Vec<TrackId> = ( 100..150 ).map( TrackId ).collect();
        assert!( queue.enable_auto( library.clone() ) );
        assert_eq!( queue.position(), Some( 0 ) );
        assert_eq!( queue.len(), 6 );

        for _ in 0..50 {
            let next = queue.advance( false ).unwrap();
            assert!( next <= AUTO_TRIM_THRESHOLD + 1 );
            assert!( queue.len() - next >= 5 );
            assert!( library.contains( &queue.current().unwrap() ) );
        }
    }


    #[test]
    fn test_auto_shuffle_with_single_track_terminates() {
        let mut queue = PlayQueue::with_seed( MAX_HISTORY_SIZE, 2 );
        assert!( queue.enable_auto( vec![ TrackId( 1 ) ] ) );
        for _ in 0..20 {
            assert!( queue.advance( false ).is_some() );
        }
        assert!( queue.tracks().iter().all( |&t| t == TrackId( 1 ) ) );
    }


    #[test]
    fn test_auto_shuffle_without_library_turns_off() {
        let mut queue = queue_of( &[ 1, 2 ], 0 );
        assert!( !queue.enable_auto( Vec::new() ) );
        assert_eq!( queue.shuffle(), ShuffleMode::None );
        assert_eq!( queue.len(), 2 );
    }


    #[test]
    fn test_open_downgrades_auto_to_normal() {
        let mut queue = PlayQueue::with_seed( MAX_HISTORY_SIZE, 5 );
        queue.enable_auto( ( 0..20 ).map( TrackId ).collect() );
        queue.replace( &ids( &[ 1, 2, 3 ] ), Some( 0 ) );
        assert_eq!( queue.shuffle(), ShuffleMode::Normal );
        assert!( queue.history().is_empty() );
    }


    #[test]
    fn test_restore_reapplies_exclusion() {
        let state = QueueState {
            tracks: ids( &[ 1, 2, 3 ] ),
            history: vec![ 0 ],
            position: Some( 1 ),
            seek_ms: 0,
            repeat: RepeatMode::Current,
            shuffle: ShuffleMode::Normal,
            generation: None,
        };
        let mut queue = PlayQueue::with_seed( MAX_HISTORY_SIZE, 5 );
        queue.restore( &state, Vec::new() );
        assert_eq!( queue.shuffle(), ShuffleMode::None );
        assert!( queue.history().is_empty() );
        assert_eq!( queue.current(), Some( TrackId( 2 ) ) );
    }
}
