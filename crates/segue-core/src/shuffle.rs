//! Random sources for shuffle and random start positions

use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };


/// Uniform generator that never yields the same value twice in a row
/// unless the interval is 1.
#[derive( Debug )]
pub struct Shuffler {
    rng: StdRng,
    previous: Option<usize>,
}


impl Shuffler {
    /// Creates a shuffler seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            previous: None,
        }
    }


    /// Creates a deterministic shuffler.
    pub fn with_seed( seed: u64 ) -> Self {
        Self {
            rng: StdRng::seed_from_u64( seed ),
            previous: None,
        }
    }


    /// Returns a value in `0..interval`.
    ///
    /// `interval` must be non-zero.
    pub fn next_index( &mut self, interval: usize ) -> usize {
        debug_assert!( interval > 0 );
        let value = loop {
            let candidate = self.rng.gen_range( 0..interval );
            if interval <= 1 || Some( candidate ) != self.previous {
                break candidate;
            }
        };
        self.previous = Some( value );
        value
    }
}


impl Default for Shuffler {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_never_repeats_consecutively() {
        let mut shuffler = Shuffler::with_seed( 42 );
        let mut last = shuffler.next_index( 3 );
        for _ in 0..1000 {
            let value = shuffler.next_index( 3 );
            assert_ne!( value, last );
            assert!( value < 3 );
            last = value;
        }
    }


    #[test]
    fn test_interval_of_one_always_zero() {
        let mut shuffler = Shuffler::with_seed( 7 );
        for _ in 0..10 {
            assert_eq!( shuffler.next_index( 1 ), 0 );
        }
    }


    #[test]
    fn test_covers_whole_interval() {
        let mut shuffler = Shuffler::with_seed( 1 );
        let mut seen = [ false; 5 ];
        for _ in 0..500 {
            seen[ shuffler.next_index( 5 ) ] = true;
        }
        assert!( seen.iter().all( |&s| s ) );
    }
}
