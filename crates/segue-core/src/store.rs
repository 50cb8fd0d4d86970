//! Key-value state storage
//!
//! Persisted queue state is a flat map of string keys to string values.
//! Writes go through a [`PersistWriter`], which runs on its own thread so
//! the control path never blocks on I/O, and coalesces bursts of writes
//! (last write wins per key).

use std::collections::BTreeMap;
use std::fs;
use std::path::{ Path, PathBuf };
use std::sync::mpsc::{ self, Receiver, Sender };
use std::sync::{ Arc, Mutex };
use std::thread;

use thiserror::Error;


/// Errors raised by state stores.
#[derive( Debug, Error )]
pub enum StoreError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Invalid state file: {0}" )]
    Json( #[from] serde_json::Error ),

    #[error( "Store lock poisoned" )]
    Poisoned,
}


/// Flat string key-value storage.
pub trait StateStore: Send + Sync {
    /// Reads a single value.
    fn get( &self, key: &str ) -> Result<Option<String>, StoreError>;

    /// Writes a batch of values atomically with respect to readers.
    fn put_all( &self, entries: &[( String, String )] ) -> Result<(), StoreError>;
}


/// In-memory store, used by tests and as a fallback when no state file
/// location is available.
#[derive( Debug, Default )]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}


impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }


    /// Returns a copy of everything stored.
    pub fn snapshot( &self ) -> BTreeMap<String, String> {
        self.values.lock().map( |v| v.clone() ).unwrap_or_default()
    }
}


impl StateStore for MemoryStore {
    fn get( &self, key: &str ) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().map_err( |_| StoreError::Poisoned )?;
        Ok( values.get( key ).cloned() )
    }


    fn put_all( &self, entries: &[( String, String )] ) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err( |_| StoreError::Poisoned )?;
        for ( key, value ) in entries {
            values.insert( key.clone(), value.clone() );
        }
        Ok(())
    }
}


/// JSON-object file store. The file stays human-inspectable.
#[derive( Debug )]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}


impl FileStore {
    /// Opens (or lazily creates) the store at `path`.
    ///
    /// A missing or corrupt file is an empty store, overwritten by the next
    /// write. A file that cannot be read at all is an error.
    pub fn open( path: impl Into<PathBuf> ) -> Result<Self, StoreError> {
        let path = path.into();
        let values = if path.exists() {
            let contents = fs::read_to_string( &path )?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str( &contents ).unwrap_or_else( |e| {
                    tracing::warn!( "Ignoring corrupt state file {}: {}", path.display(), e );
                    BTreeMap::new()
                })
            }
        } else {
            BTreeMap::new()
        };

        Ok( Self {
            path,
            values: Mutex::new( values ),
        })
    }


    /// Default location of the state file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map( |d| d.join( "segue" ).join( "state.json" ) )
    }


    pub fn path( &self ) -> &Path {
        &self.path
    }


    fn flush( &self, values: &BTreeMap<String, String> ) -> Result<(), StoreError> {
        if let Some( parent ) = self.path.parent() {
            fs::create_dir_all( parent )?;
        }

        // Write next to the target and rename so readers never see a torn file
        let tmp = self.path.with_extension( "json.tmp" );
        fs::write( &tmp, serde_json::to_string_pretty( values )? )?;
        fs::rename( &tmp, &self.path )?;
        Ok(())
    }
}


impl StateStore for FileStore {
    fn get( &self, key: &str ) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().map_err( |_| StoreError::Poisoned )?;
        Ok( values.get( key ).cloned() )
    }


    fn put_all( &self, entries: &[( String, String )] ) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err( |_| StoreError::Poisoned )?;
        for ( key, value ) in entries {
            values.insert( key.clone(), value.clone() );
        }
        self.flush( &values )
    }
}


enum WriterMessage {
    Write( Vec<( String, String )> ),
    Flush( Sender<()> ),
}


/// Fire-and-forget writer in front of a [`StateStore`].
pub struct PersistWriter {
    tx: Option<Sender<WriterMessage>>,
    thread: Option<thread::JoinHandle<()>>,
}


impl PersistWriter {
    /// Spawns the writer thread.
    pub fn spawn( store: Arc<dyn StateStore> ) -> Result<Self, StoreError> {
        let ( tx, rx ) = mpsc::channel();
        let thread = thread::Builder::new()
            .name( "segue-persist".into() )
            .spawn( move || Self::write_loop( store, rx ) )?;

        Ok( Self {
            tx: Some( tx ),
            thread: Some( thread ),
        })
    }


    /// Queues entries for writing. Never blocks.
    pub fn submit( &self, entries: Vec<( String, String )> ) {
        if let Some( tx ) = &self.tx {
            if tx.send( WriterMessage::Write( entries ) ).is_err() {
                tracing::warn!( "Persist writer is gone, state not saved" );
            }
        }
    }


    /// Blocks until everything submitted so far has been written.
    pub fn flush( &self ) {
        let Some( tx ) = &self.tx else { return };
        let ( ack_tx, ack_rx ) = mpsc::channel();
        if tx.send( WriterMessage::Flush( ack_tx ) ).is_ok() {
            let _ = ack_rx.recv();
        }
    }


    fn write_loop( store: Arc<dyn StateStore>, rx: Receiver<WriterMessage> ) {
        while let Ok( message ) = rx.recv() {
            let mut pending = BTreeMap::new();
            let mut acks = Vec::new();

            let mut next = Some( message );
            while let Some( message ) = next {
                match message {
                    WriterMessage::Write( entries ) => pending.extend( entries ),
                    WriterMessage::Flush( ack ) => acks.push( ack ),
                }
                next = rx.try_recv().ok();
            }

            if !pending.is_empty() {
                let entries: Vec<_> = pending.into_iter().collect();
                tracing::debug!( "Persisting {} keys", entries.len() );
                if let Err( e ) = store.put_all( &entries ) {
                    tracing::warn!( "Failed to persist state: {}", e );
                }
            }

            for ack in acks {
                let _ = ack.send(());
            }
        }

        tracing::debug!( "Persist writer: exiting" );
    }
}


impl Drop for PersistWriter {
    fn drop( &mut self ) {
        // Closing the channel ends the loop after the backlog is written
        self.tx.take();
        if let Some( thread ) = self.thread.take() {
            let _ = thread.join();
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn entry( key: &str, value: &str ) -> ( String, String ) {
        ( key.to_string(), value.to_string() )
    }


    #[test]
    fn test_memory_store_put_and_get() {
        let store = MemoryStore::new();
        store.put_all( &[ entry( "curpos", "3" ) ] ).unwrap();
        assert_eq!( store.get( "curpos" ).unwrap().as_deref(), Some( "3" ) );
        assert_eq!( store.get( "queue" ).unwrap(), None );
    }


    #[test]
    fn test_writer_last_write_wins() {
        let store = Arc::new( MemoryStore::new() );
        let writer = PersistWriter::spawn( store.clone() ).unwrap();
        writer.submit( vec![ entry( "curpos", "1" ), entry( "queue", "1;" ) ] );
        writer.submit( vec![ entry( "curpos", "2" ) ] );
        writer.flush();

        let snapshot = store.snapshot();
        assert_eq!( snapshot.get( "curpos" ).map( String::as_str ), Some( "2" ) );
        assert_eq!( snapshot.get( "queue" ).map( String::as_str ), Some( "1;" ) );
    }


    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "state.json" );

        let store = FileStore::open( &path ).unwrap();
        store.put_all( &[ entry( "queue", "a;b;" ), entry( "curpos", "1" ) ] ).unwrap();

        let reopened = FileStore::open( &path ).unwrap();
        assert_eq!( reopened.get( "queue" ).unwrap().as_deref(), Some( "a;b;" ) );
        assert_eq!( reopened.get( "curpos" ).unwrap().as_deref(), Some( "1" ) );
    }


    #[test]
    fn test_file_store_replaces_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "state.json" );
        fs::write( &path, "not json{" ).unwrap();

        let store = FileStore::open( &path ).unwrap();
        assert_eq!( store.get( "queue" ).unwrap(), None );

        store.put_all( &[ entry( "queue", "1;" ) ] ).unwrap();
        let reopened = FileStore::open( &path ).unwrap();
        assert_eq!( reopened.get( "queue" ).unwrap().as_deref(), Some( "1;" ) );
    }
}
