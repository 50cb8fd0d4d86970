//! Library scanning
//!
//! Discovers audio files under a set of roots and serves them as a
//! [`TrackCatalog`]. Track ids are assigned by sorted path, so they stay
//! stable for as long as the set of files does not change.

use std::path::{ Path, PathBuf };

use thiserror::Error;

use crate::catalog::{ TrackCatalog, TrackInfo };
use crate::types::TrackId;


/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav", "m4a", "aac", "opus", "wma", "aiff", "alac",
];


const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;


/// Errors that can occur during library operations.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),
}


/// Library scanner for discovering audio files.
#[derive( Debug, Default )]
pub struct LibraryScanner {
    roots: Vec<PathBuf>,
}


impl LibraryScanner {
    /// Creates a new scanner with no root directories.
    pub fn new() -> Self {
        Self { roots: Vec::new() }
    }


    /// Adds a root directory to scan.
    pub fn add_root( &mut self, path: PathBuf ) {
        if !self.roots.contains( &path ) {
            self.roots.push( path );
        }
    }


    /// Gets all root directories.
    pub fn roots( &self ) -> &[PathBuf] {
        &self.roots
    }


    /// Scans all roots and returns discovered audio files, sorted and
    /// deduplicated.
    pub fn scan( &self ) -> Result<Vec<PathBuf>, LibraryError> {
        let mut files = Vec::new();

        for root in &self.roots {
            tracing::info!( "Scanning: {:?}", root );
            if root.is_file() {
                if Self::is_audio_file( root ) {
                    files.push( root.clone() );
                }
                continue;
            }
            Self::scan_recursive( root, &mut files )?;
        }

        files.sort();
        files.dedup();
        tracing::info!( "Found {} tracks", files.len() );
        Ok( files )
    }


    fn scan_recursive( dir: &Path, files: &mut Vec<PathBuf> ) -> Result<(), LibraryError> {
        let entries = match std::fs::read_dir( dir ) {
            Ok( e ) => e,
            Err( e ) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                tracing::warn!( "Access denied: {:?}", dir );
                return Ok(()); // Skip inaccessible directories
            }
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err( LibraryError::NotFound( dir.to_path_buf() ) );
            }
            Err( e ) => return Err( LibraryError::Io( e ) ),
        };

        for entry in entries.flatten() {
            let path = entry.path();

            if path.is_dir() {
                Self::scan_recursive( &path, files )?;
            } else if Self::is_audio_file( &path ) {
                files.push( path );
            }
        }

        Ok(())
    }


    /// Checks if a file has a supported audio extension.
    fn is_audio_file( path: &Path ) -> bool {
        path.extension()
            .and_then( |e| e.to_str() )
            .map( |e| SUPPORTED_EXTENSIONS.contains( &e.to_lowercase().as_str() ) )
            .unwrap_or( false )
    }
}


/// Catalog over a scanned set of files.
#[derive( Debug, Clone, Default )]
pub struct LibraryCatalog {
    files: Vec<PathBuf>,
}


impl LibraryCatalog {
    /// Scans the scanner's roots.
    pub fn scan( scanner: &LibraryScanner ) -> Result<Self, LibraryError> {
        Ok( Self::from_files( scanner.scan()? ) )
    }


    /// Builds a catalog from an already sorted file list.
    pub fn from_files( files: Vec<PathBuf> ) -> Self {
        Self { files }
    }


    pub fn len( &self ) -> usize {
        self.files.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.files.is_empty()
    }


    /// Path of a track, if the id is known.
    pub fn path( &self, id: TrackId ) -> Option<&Path> {
        usize::try_from( id.0 ).ok()
            .and_then( |i| self.files.get( i ) )
            .map( PathBuf::as_path )
    }


    /// Tag identifying this exact set of files. A queue saved against one
    /// generation is not restored against another.
    ///
    /// FNV-1a over the path bytes, each path terminated by a zero byte. The
    /// value is stored on disk, so it must not depend on the toolchain.
    pub fn generation( &self ) -> i64 {
        let mut hash = FNV_OFFSET;
        for file in &self.files {
            for &byte in file.as_os_str().as_encoded_bytes().iter().chain( &[ 0u8 ] ) {
                hash ^= u64::from( byte );
                hash = hash.wrapping_mul( FNV_PRIME );
            }
        }
        hash as i64
    }
}


impl TrackCatalog for LibraryCatalog {
    fn lookup( &self, id: TrackId ) -> Option<TrackInfo> {
        let path = self.path( id )?;
        let title = path.file_stem()
            .map( |s| s.to_string_lossy().into_owned() )
            .unwrap_or_else( || path.display().to_string() );
        let album = path.parent()
            .and_then( |p| p.file_name() )
            .map( |s| s.to_string_lossy().into_owned() );

        Some( TrackInfo {
            id,
            title,
            artist: None,
            album,
            uri: path.display().to_string(),
            duration_ms: None,
            podcast: false,
            bookmark_ms: 0,
        })
    }


    fn library( &self ) -> Vec<TrackId> {
        ( 0..self.files.len() as u64 ).map( TrackId ).collect()
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;


    #[test]
    fn test_scan_finds_audio_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all( dir.path().join( "b" ) ).unwrap();
        fs::write( dir.path().join( "b" ).join( "two.flac" ), b"" ).unwrap();
        fs::write( dir.path().join( "a.mp3" ), b"" ).unwrap();
        fs::write( dir.path().join( "notes.txt" ), b"" ).unwrap();

        let mut scanner = LibraryScanner::new();
        scanner.add_root( dir.path().to_path_buf() );
        let catalog = LibraryCatalog::scan( &scanner ).unwrap();

        assert_eq!( catalog.len(), 2 );
        let first = catalog.lookup( TrackId( 0 ) ).unwrap();
        assert_eq!( first.title, "a" );
        let second = catalog.lookup( TrackId( 1 ) ).unwrap();
        assert_eq!( second.title, "two" );
        assert_eq!( second.album.as_deref(), Some( "b" ) );
        assert!( catalog.lookup( TrackId( 2 ) ).is_none() );
    }


    #[test]
    fn test_missing_root_is_an_error() {
        let mut scanner = LibraryScanner::new();
        scanner.add_root( PathBuf::from( "/definitely/not/here" ) );
        assert!( matches!( scanner.scan(), Err( LibraryError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_generation_tracks_file_set() {
        let a = LibraryCatalog::from_files( vec![ PathBuf::from( "/m/a.mp3" ) ] );
        let b = LibraryCatalog::from_files( vec![ PathBuf::from( "/m/a.mp3" ), PathBuf::from( "/m/b.mp3" ) ] );
        assert_eq!( a.generation(), a.clone().generation() );
        assert_ne!( a.generation(), b.generation() );
    }


    #[test]
    fn test_generation_is_pinned() {
        assert_eq!( LibraryCatalog::default().generation(), -3_750_763_034_362_895_579 );

        let files = vec![ PathBuf::from( "/m/a.mp3" ), PathBuf::from( "/m/b.mp3" ) ];
        assert_eq!( LibraryCatalog::from_files( files ).generation(), -2_905_886_663_092_231_846 );
    }
}
