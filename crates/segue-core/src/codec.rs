//! Persisted queue state encoding
//!
//! Id lists are stored as "reverse hexadecimal": each number is written
//! least significant nibble first, followed by `;`. Zero is `0;`.
//!
//! Layout (all values are strings in the [`StateStore`]):
//!
//! | key           | value                                            |
//! |---------------|--------------------------------------------------|
//! | `queue`       | encoded track ids                                |
//! | `history`     | encoded positions, only while shuffling          |
//! | `curpos`      | current position                                 |
//! | `seekpos`     | playback position in ms                          |
//! | `repeatmode`  | [`RepeatMode::as_i32`]                           |
//! | `shufflemode` | [`ShuffleMode::as_i32`]                          |
//! | `cardid`      | storage generation the queue was saved against   |

use serde::Serialize;
use thiserror::Error;

use crate::store::{ StateStore, StoreError };
use crate::types::{ RepeatMode, ShuffleMode, TrackId };


pub const KEY_QUEUE: &str = "queue";
pub const KEY_HISTORY: &str = "history";
pub const KEY_POSITION: &str = "curpos";
pub const KEY_SEEK: &str = "seekpos";
pub const KEY_REPEAT: &str = "repeatmode";
pub const KEY_SHUFFLE: &str = "shufflemode";
pub const KEY_GENERATION: &str = "cardid";

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";


/// Errors raised while decoding persisted state.
#[derive( Debug, Error )]
pub enum CodecError {
    #[error( "Invalid character {0:?} in encoded list" )]
    InvalidDigit( char ),

    #[error( "Encoded number does not fit in 64 bits" )]
    Overflow,

    #[error( "Encoded list is not terminated" )]
    Unterminated,

    #[error( "Invalid integer value for {key}: {value:?}" )]
    InvalidInteger { key: &'static str, value: String },

    #[error( "Position {position} outside queue of {len} entries" )]
    PositionOutOfRange { position: i64, len: usize },

    #[error( "Store error: {0}" )]
    Store( #[from] StoreError ),
}


/// Appends the reverse-hex encoding of `n` plus terminator.
fn encode_number( mut n: u64, out: &mut String ) {
    if n == 0 {
        out.push( '0' );
    }
    while n != 0 {
        out.push( HEX_DIGITS[ ( n & 0xf ) as usize ] as char );
        n >>= 4;
    }
    out.push( ';' );
}


/// Encodes a list of numbers.
pub fn encode_list( values: impl IntoIterator<Item = u64> ) -> String {
    let mut out = String::new();
    for value in values {
        encode_number( value, &mut out );
    }
    out
}


/// Decodes a list produced by [`encode_list`].
///
/// Any malformed input rejects the whole list.
pub fn decode_list( encoded: &str ) -> Result<Vec<u64>, CodecError> {
    let mut values = Vec::new();
    let mut n: u64 = 0;
    let mut shift = 0u32;
    let mut digits = 0usize;

    for c in encoded.chars() {
        if c == ';' {
            values.push( n );
            n = 0;
            shift = 0;
            digits = 0;
            continue;
        }

        let digit = c.to_digit( 16 )
            .filter( |_| !c.is_ascii_uppercase() )
            .ok_or( CodecError::InvalidDigit( c ) )? as u64;

        if shift >= 64 {
            return Err( CodecError::Overflow );
        }
        n |= digit << shift;
        shift += 4;
        digits += 1;
    }

    if digits > 0 {
        return Err( CodecError::Unterminated );
    }
    Ok( values )
}


/// Snapshot of everything the play queue persists.
#[derive( Debug, Clone, PartialEq, Eq, Default, Serialize )]
pub struct QueueState {
    pub tracks: Vec<TrackId>,
    pub history: Vec<usize>,
    pub position: Option<usize>,
    pub seek_ms: u64,
    pub repeat: RepeatMode,
    pub shuffle: ShuffleMode,
    pub generation: Option<i64>,
}


impl QueueState {
    /// Builds the key-value entries to write.
    ///
    /// A light save (`full == false`) only carries position and modes.
    pub fn to_entries( &self, full: bool ) -> Vec<( String, String )> {
        let mut entries = Vec::with_capacity( 7 );

        if full {
            entries.push(( KEY_QUEUE.to_string(), encode_list( self.tracks.iter().map( |t| t.0 ) ) ));
            if let Some( generation ) = self.generation {
                entries.push(( KEY_GENERATION.to_string(), generation.to_string() ));
            }
            if self.shuffle != ShuffleMode::None {
                entries.push(( KEY_HISTORY.to_string(), encode_list( self.history.iter().map( |&h| h as u64 ) ) ));
            }
        }

        let position = self.position.map( |p| p as i64 ).unwrap_or( -1 );
        entries.push(( KEY_POSITION.to_string(), position.to_string() ));
        entries.push(( KEY_SEEK.to_string(), self.seek_ms.to_string() ));
        entries.push(( KEY_REPEAT.to_string(), self.repeat.as_i32().to_string() ));
        entries.push(( KEY_SHUFFLE.to_string(), self.shuffle.as_i32().to_string() ));
        entries
    }


    /// Loads persisted state.
    ///
    /// Returns `Ok(None)` when nothing usable is stored: no queue, an empty
    /// queue, or a queue saved against another storage generation. A
    /// corrupt queue or position is an error; callers discard it and start
    /// empty. A corrupt history only drops the history.
    pub fn load( store: &dyn StateStore, generation: Option<i64> ) -> Result<Option<Self>, CodecError> {
        if let Some( current ) = generation {
            if let Some( saved ) = read_int( store, KEY_GENERATION )? {
                if saved != current {
                    tracing::info!( "Storage generation changed ({} -> {}), not restoring queue", saved, current );
                    return Ok( None );
                }
            }
        }

        let encoded = store.get( KEY_QUEUE )?.unwrap_or_default();
        let tracks: Vec<TrackId> = decode_list( &encoded )?.into_iter().map( TrackId ).collect();
        if tracks.is_empty() {
            return Ok( None );
        }

        let position = read_int( store, KEY_POSITION )?.unwrap_or( 0 );
        if position < 0 || position as usize >= tracks.len() {
            return Err( CodecError::PositionOutOfRange { position, len: tracks.len() } );
        }

        let seek_ms = read_int( store, KEY_SEEK )?.filter( |&s| s >= 0 ).unwrap_or( 0 ) as u64;
        let repeat = read_mode( store, KEY_REPEAT )?.map_or( RepeatMode::None, RepeatMode::from_i32 );
        let shuffle = read_mode( store, KEY_SHUFFLE )?.map_or( ShuffleMode::None, ShuffleMode::from_i32 );

        let mut history = Vec::new();
        if shuffle != ShuffleMode::None {
            let encoded = store.get( KEY_HISTORY )?.unwrap_or_default();
            match decode_list( &encoded ) {
                // Auto shuffle history indexes the library, not the queue
                Ok( entries ) if shuffle == ShuffleMode::Auto
                    || entries.iter().all( |&h| ( h as usize ) < tracks.len() ) =>
                {
                    history = entries.into_iter().map( |h| h as usize ).collect();
                }
                Ok( _ ) => tracing::warn!( "Discarding out of range shuffle history" ),
                Err( e ) => tracing::warn!( "Discarding corrupt shuffle history: {}", e ),
            }
        }

        Ok( Some( Self {
            tracks,
            history,
            position: Some( position as usize ),
            seek_ms,
            repeat,
            shuffle,
            generation,
        }))
    }
}


fn read_int( store: &dyn StateStore, key: &'static str ) -> Result<Option<i64>, CodecError> {
    match store.get( key )? {
        None => Ok( None ),
        Some( value ) => value.trim().parse::<i64>()
            .map( Some )
            .map_err( |_| CodecError::InvalidInteger { key, value } ),
    }
}


/// Reads a mode value. Values outside `i32` count as unknown.
fn read_mode( store: &dyn StateStore, key: &'static str ) -> Result<Option<i32>, CodecError> {
    Ok( read_int( store, key )?.and_then( |v| i32::try_from( v ).ok() ) )
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::store::MemoryStore;


    #[test]
    fn test_encode_reverse_hex() {
        assert_eq!( encode_list( [ 0, 1, 0x1f, 0xabc ] ), "0;1;f1;cba;" );
    }


    #[test]
    fn test_decode_reverse_hex() {
        assert_eq!( decode_list( "0;1;f1;cba;" ).unwrap(), vec![ 0, 1, 0x1f, 0xabc ] );
        assert_eq!( decode_list( "" ).unwrap(), Vec::<u64>::new() );
    }


    #[test]
    fn test_decode_extremes() {
        let encoded = encode_list( [ u64::MAX ] );
        assert_eq!( decode_list( &encoded ).unwrap(), vec![ u64::MAX ] );
        assert!( matches!( decode_list( "00000000000000001;" ), Err( CodecError::Overflow ) ) );
    }


    #[test]
    fn test_decode_rejects_bogus_data() {
        assert!( matches!( decode_list( "12;x;" ), Err( CodecError::InvalidDigit( 'x' ) ) ) );
        assert!( matches!( decode_list( "12;A;" ), Err( CodecError::InvalidDigit( 'A' ) ) ) );
        assert!( matches!( decode_list( "12;34" ), Err( CodecError::Unterminated ) ) );
    }


    #[test]
    fn test_light_save_omits_queue() {
        let state = QueueState {
            tracks: vec![ TrackId( 1 ) ],
            position: Some( 0 ),
            ..Default::default()
        };
        let keys: Vec<String> = state.to_entries( false ).into_iter().map( |( k, _ )| k ).collect();
        assert!( !keys.iter().any( |k| k == KEY_QUEUE ) );
        assert!( keys.iter().any( |k| k == KEY_POSITION ) );
    }


    #[test]
    fn test_load_round_trip() {
        let store = MemoryStore::new();
        let state = QueueState {
            tracks: vec![ TrackId( 10 ), TrackId( 20 ), TrackId( 30 ) ],
            history: vec![ 0, 2 ],
            position: Some( 1 ),
            seek_ms: 1234,
            repeat: RepeatMode::All,
            shuffle: ShuffleMode::Normal,
            generation: Some( 9 ),
        };
        store.put_all( &state.to_entries( true ) ).unwrap();
        assert_eq!( QueueState::load( &store, Some( 9 ) ).unwrap(), Some( state ) );
    }


    #[test]
    fn test_load_other_generation_is_empty() {
        let store = MemoryStore::new();
        let state = QueueState {
            tracks: vec![ TrackId( 10 ) ],
            position: Some( 0 ),
            generation: Some( 1 ),
            ..Default::default()
        };
        store.put_all( &state.to_entries( true ) ).unwrap();
        assert_eq!( QueueState::load( &store, Some( 2 ) ).unwrap(), None );
    }


    #[test]
    fn test_load_rejects_bad_position() {
        let store = MemoryStore::new();
        store.put_all( &[
            ( KEY_QUEUE.to_string(), "1;2;".to_string() ),
            ( KEY_POSITION.to_string(), "5".to_string() ),
        ]).unwrap();
        assert!( matches!(
            QueueState::load( &store, None ),
            Err( CodecError::PositionOutOfRange { position: 5, len: 2 } )
        ));
    }


    #[test]
    fn test_load_drops_bad_history_only() {
        let store = MemoryStore::new();
        store.put_all( &[
            ( KEY_QUEUE.to_string(), "1;2;".to_string() ),
            ( KEY_POSITION.to_string(), "1".to_string() ),
            ( KEY_SHUFFLE.to_string(), "1".to_string() ),
            ( KEY_HISTORY.to_string(), "0;9;".to_string() ),
        ]).unwrap();
        let state = QueueState::load( &store, None ).unwrap().unwrap();
        assert_eq!( state.tracks.len(), 2 );
        assert!( state.history.is_empty() );
        assert_eq!( state.shuffle, ShuffleMode::Normal );
    }


    #[test]
    fn test_load_oversized_modes_degrade_to_none() {
        let store = MemoryStore::new();
        store.put_all( &[
            ( KEY_QUEUE.to_string(), "1;2;".to_string() ),
            ( KEY_POSITION.to_string(), "0".to_string() ),
            ( KEY_REPEAT.to_string(), "4294967297".to_string() ),
            ( KEY_SHUFFLE.to_string(), "4294967298".to_string() ),
        ]).unwrap();
        let state = QueueState::load( &store, None ).unwrap().unwrap();
        assert_eq!( state.repeat, RepeatMode::None );
        assert_eq!( state.shuffle, ShuffleMode::None );
    }
}
