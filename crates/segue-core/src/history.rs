//! Bounded play history
//!
//! Records previously played entries, most recent last. In normal shuffle
//! the entries are queue positions; in auto shuffle they are indices into
//! the library source.

use std::collections::VecDeque;


/// Default number of entries kept.
pub const MAX_HISTORY_SIZE: usize = 100;


/// Bounded FIFO of indices.
#[derive( Debug, Clone )]
pub struct History {
    entries: VecDeque<usize>,
    capacity: usize,
}


impl History {
    /// Creates an empty history holding at most `capacity` entries.
    pub fn new( capacity: usize ) -> Self {
        Self {
            entries: VecDeque::with_capacity( capacity + 1 ),
            capacity,
        }
    }


    /// Records an entry, discarding the oldest one when full.
    pub fn push( &mut self, index: usize ) {
        self.entries.push_back( index );
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }


    /// Removes and returns the most recent entry.
    pub fn pop( &mut self ) -> Option<usize> {
        self.entries.pop_back()
    }


    /// Returns true if `index` is among the `lookback` most recent entries.
    ///
    /// A lookback of zero never matches, which is what lets the auto
    /// shuffle collision loop terminate.
    pub fn was_recently_used( &self, index: usize, lookback: usize ) -> bool {
        if lookback == 0 {
            return false;
        }
        self.entries.iter()
            .rev()
            .take( lookback )
            .any( |&entry| entry == index )
    }


    /// Iterates the most recent `count` entries, newest first.
    pub fn recent( &self, count: usize ) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().rev().take( count ).copied()
    }


    /// Keeps only the entries for which `f` returns a new index.
    pub fn remap( &mut self, mut f: impl FnMut( usize ) -> Option<usize> ) {
        self.entries = self.entries.iter().filter_map( |&i| f( i ) ).collect();
    }


    /// Replaces the contents, keeping at most `capacity` of the newest entries.
    pub fn restore( &mut self, entries: impl IntoIterator<Item = usize> ) {
        self.entries.clear();
        for entry in entries {
            self.push( entry );
        }
    }


    pub fn clear( &mut self ) {
        self.entries.clear();
    }


    pub fn len( &self ) -> usize {
        self.entries.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.entries.is_empty()
    }


    pub fn capacity( &self ) -> usize {
        self.capacity
    }


    /// All entries, oldest first.
    pub fn to_vec( &self ) -> Vec<usize> {
        self.entries.iter().copied().collect()
    }
}


impl Default for History {
    fn default() -> Self {
        Self::new( MAX_HISTORY_SIZE )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_push_discards_oldest() {
        let mut history = History::new( 3 );
        for i in 1..=4 {
            history.push( i );
        }
        assert_eq!( history.to_vec(), vec![ 2, 3, 4 ] );
    }


    #[test]
    fn test_pop_returns_most_recent() {
        let mut history = History::new( 10 );
        history.push( 5 );
        history.push( 8 );
        assert_eq!( history.pop(), Some( 8 ) );
        assert_eq!( history.pop(), Some( 5 ) );
        assert_eq!( history.pop(), None );
    }


    #[test]
    fn test_was_recently_used_respects_lookback() {
        let mut history = History::new( 10 );
        for i in [ 1, 2, 3, 4 ] {
            history.push( i );
        }
        assert!( history.was_recently_used( 4, 1 ) );
        assert!( !history.was_recently_used( 1, 3 ) );
        assert!( history.was_recently_used( 1, 4 ) );
        assert!( history.was_recently_used( 1, 100 ) );
        assert!( !history.was_recently_used( 4, 0 ) );
    }


    #[test]
    fn test_remap_drops_and_shifts() {
        let mut history = History::new( 10 );
        for i in [ 0, 3, 5, 1 ] {
            history.push( i );
        }
        history.remap( |i| if i == 3 { None } else if i > 3 { Some( i - 1 ) } else { Some( i ) } );
        assert_eq!( history.to_vec(), vec![ 0, 4, 1 ] );
    }


    #[test]
    fn test_restore_trims_to_capacity() {
        let mut history = History::new( 2 );
        history.restore( [ 7, 8, 9 ] );
        assert_eq!( history.to_vec(), vec![ 8, 9 ] );
    }
}
