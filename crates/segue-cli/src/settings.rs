//! Application settings management
//!
//! Persistent settings for the command-line front end: where the library
//! lives, where queue state is kept and how the simulated player behaves.

use std::fs;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use serde::{ Deserialize, Serialize };


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Directories scanned for audio files
    pub library_roots: Vec<PathBuf>,

    /// Queue state file; the platform data directory when unset
    pub state_file: Option<PathBuf>,

    /// Fixed storage generation. When unset the generation is derived from
    /// the scanned file set, so a changed library drops the saved queue.
    pub generation: Option<i64>,

    /// Length of every simulated track, in seconds
    pub track_secs: u64,

    /// Delay before retrying after a player failure, in milliseconds
    pub retry_delay_ms: u64,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            library_roots: Vec::new(),
            state_file: None,
            generation: None,
            track_secs: 5,
            retry_delay_ms: 2000,
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "segue" ).join( "settings.json" ) )
    }


    /// Loads settings from `path`, or returns defaults if it is missing or
    /// unreadable.
    pub fn load_from( path: &Path ) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string( path ) {
            Ok( contents ) => {
                serde_json::from_str( &contents ).unwrap_or_else( |e| {
                    tracing::warn!( "Ignoring malformed settings in {}: {}", path.display(), e );
                    Self::default()
                })
            }
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        }
    }


    /// Saves settings to `path`.
    pub fn save_to( &self, path: &Path ) {
        // Create parent directory if needed
        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                if let Err( e ) = fs::create_dir_all( parent ) {
                    tracing::warn!( "Failed to create settings directory: {}", e );
                    return;
                }
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => {
                if let Err( e ) = fs::write( path, json ) {
                    tracing::warn!( "Failed to save settings: {}", e );
                }
            }
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }


    pub fn track_length( &self ) -> Duration {
        Duration::from_secs( self.track_secs.max( 1 ) )
    }


    pub fn retry_delay( &self ) -> Duration {
        Duration::from_millis( self.retry_delay_ms )
    }


    /// Adds a library root unless it is already present.
    pub fn add_root( &mut self, root: PathBuf ) -> bool {
        if self.library_roots.contains( &root ) {
            return false;
        }
        self.library_roots.push( root );
        true
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!( Settings::load_from( &dir.path().join( "nope.json" ) ), Settings::default() );
    }


    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, r#"{ "track_secs": 12 }"# ).unwrap();

        let settings = Settings::load_from( &path );
        assert_eq!( settings.track_secs, 12 );
        assert_eq!( settings.retry_delay_ms, 2000 );
        assert!( settings.library_roots.is_empty() );
    }


    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "settings.json" );

        let mut settings = Settings::default();
        assert!( settings.add_root( PathBuf::from( "/music" ) ) );
        assert!( !settings.add_root( PathBuf::from( "/music" ) ) );
        settings.generation = Some( 4 );
        settings.save_to( &path );

        assert_eq!( Settings::load_from( &path ), settings );
    }


    #[test]
    fn test_garbage_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, "{{{" ).unwrap();
        assert_eq!( Settings::load_from( &path ), Settings::default() );
    }
}
