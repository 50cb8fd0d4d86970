//! Segue CLI - play queue and gapless transitions from the shell
//!
//! Every subcommand loads the saved queue, applies one operation through
//! the playback service and saves the result. `segue play` keeps the
//! control loop running with a simulated player and takes control
//! commands from stdin.

mod cli;
mod settings;
mod simulated;

use std::io::{ self, BufRead };
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{ bail, Context, Result };
use clap::Parser;
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::EnvFilter;

use segue_core::command::format_ms;
use segue_core::{
    Command, CommandOutcome, EngineConfig, FileStore, LibraryCatalog, LibraryScanner,
    PlaybackEvent, PlaybackService, TrackCatalog, TrackId,
};

use cli::{ Args, Commands };
use settings::Settings;
use simulated::SimulatedFactory;


/// How long the control loop waits for player signals per turn.
const CONTROL_TICK: Duration = Duration::from_millis( 100 );


fn main() -> Result<()> {
    let args = Args::parse();
    init_logging( args.verbose );

    let config_path = args.config.clone().or_else( Settings::settings_path );
    let mut settings = match &config_path {
        Some( path ) => Settings::load_from( path ),
        None => Settings::default(),
    };

    if let Commands::Scan { roots } = &args.command {
        return scan( &mut settings, config_path, roots );
    }

    let catalog = Arc::new( scan_library( &settings )? );
    let mut service = start_service( &settings, args.state.clone(), Arc::clone( &catalog ) )?;

    match args.command {
        Commands::Scan { .. } | Commands::Show => {}
        Commands::Open { ids, start } => {
            let list = if ids.is_empty() {
                catalog.library()
            } else {
                resolve( &catalog, &ids )?
            };
            if list.is_empty() {
                bail!( "The library is empty; add a directory with `segue scan <dir>`" );
            }
            service.open( &list, start.position() );
        }
        Commands::Enqueue { ids, mode } => {
            let list = resolve( &catalog, &ids )?;
            service.enqueue( &list, mode.into() );
        }
        Commands::Remove { first, last } => {
            let last = last.unwrap_or( first );
            if last < first {
                bail!( "Range end {} is before its start {}", last, first );
            }
            let removed = service.remove_range( first, last );
            println!( "Removed {} entries", removed );
        }
        Commands::RemoveId { id } => {
            let removed = service.remove_id( TrackId( id ) );
            println!( "Removed {} entries", removed );
        }
        Commands::Move { from, to } => service.move_item( from, to ),
        Commands::Goto { position } => {
            if !service.set_queue_position( position ) {
                bail!( "No queue entry at position {}", position );
            }
        }
        Commands::Next => service.next(),
        Commands::Prev => service.prev(),
        Commands::Shuffle { mode } => service.set_shuffle_mode( mode.into() ),
        Commands::Repeat { mode } => service.set_repeat_mode( mode.into() ),
        Commands::Play { tracks } => run_player( &mut service, &catalog, tracks, args.json ),
    }

    service.shutdown();
    print_queue( &service, &catalog, args.json )
}


fn init_logging( verbose: u8 ) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new( level ) );

    tracing_subscriber::fmt()
        .with_env_filter( filter )
        .with_writer( io::stderr )
        .init();
}


/// Adds `roots` to the settings, saves them and lists the library.
fn scan( settings: &mut Settings, config_path: Option<PathBuf>, roots: &[PathBuf] ) -> Result<()> {
    let mut changed = false;
    for root in roots {
        let root = root.canonicalize()
            .with_context( || format!( "Cannot add {}", root.display() ) )?;
        changed |= settings.add_root( root );
    }

    if changed {
        match &config_path {
            Some( path ) => {
                settings.save_to( path );
                tracing::info!( "Saved library roots to {}", path.display() );
            }
            None => tracing::warn!( "No configuration directory, library roots were not saved" ),
        }
    }

    let catalog = scan_library( settings )?;
    for id in catalog.library() {
        if let Some( path ) = catalog.path( id ) {
            println!( "{:>6}  {}", id, path.display() );
        }
    }
    println!( "{} tracks", catalog.len() );
    Ok(())
}


fn scan_library( settings: &Settings ) -> Result<LibraryCatalog> {
    let mut scanner = LibraryScanner::new();
    for root in &settings.library_roots {
        scanner.add_root( root.clone() );
    }
    LibraryCatalog::scan( &scanner ).context( "Failed to scan the library" )
}


/// Builds the service over the state file and restores the saved queue.
fn start_service( settings: &Settings, state: Option<PathBuf>, catalog: Arc<LibraryCatalog> ) -> Result<PlaybackService> {
    let path = state
        .or_else( || settings.state_file.clone() )
        .or_else( FileStore::default_path )
        .context( "No location for the queue state file" )?;
    let store = FileStore::open( &path )
        .with_context( || format!( "Failed to open state file {}", path.display() ) )?;

    let generation = settings.generation.unwrap_or_else( || catalog.generation() );
    let config = EngineConfig {
        retry_delay: settings.retry_delay(),
        ..EngineConfig::default()
    };
    let factory = Arc::new( SimulatedFactory::new( settings.track_length() ) );

    let mut service = PlaybackService::new( factory, catalog, config )?
        .with_store( Arc::new( store ), Some( generation ) )?;
    if !service.restore() {
        tracing::info!( "Starting with an empty queue" );
    }
    Ok( service )
}


/// Maps raw ids to library tracks, rejecting unknown ones.
fn resolve( catalog: &LibraryCatalog, ids: &[u64] ) -> Result<Vec<TrackId>> {
    ids.iter()
        .map( |&id| {
            let track = TrackId( id );
            match catalog.path( track ) {
                Some( _ ) => Ok( track ),
                None => bail!( "No track {} in the library", id ),
            }
        })
        .collect()
}


fn title( catalog: &LibraryCatalog, track: TrackId ) -> String {
    catalog.lookup( track )
        .map( |info| info.title )
        .unwrap_or_else( || format!( "<missing track {}>", track ) )
}


fn print_queue( service: &PlaybackService, catalog: &LibraryCatalog, json: bool ) -> Result<()> {
    if json {
        println!( "{}", serde_json::to_string_pretty( &service.queue_state() )? );
        return Ok(());
    }

    let tracks = service.queue_snapshot();
    println!( "Shuffle: {:?}  Repeat: {:?}", service.shuffle_mode(), service.repeat_mode() );
    if tracks.is_empty() {
        println!( "Queue is empty" );
        return Ok(());
    }

    let position = service.queue_position();
    let next = service.next_position();
    for ( i, &track ) in tracks.iter().enumerate() {
        let marker = if Some( i ) == position {
            '>'
        } else if Some( i ) == next {
            '+'
        } else {
            ' '
        };
        println!( "{} {:>4}  [{}] {}", marker, i, track, title( catalog, track ) );
    }
    Ok(())
}


fn report( event: &PlaybackEvent, catalog: &LibraryCatalog, service: &PlaybackService, json: bool ) {
    if json {
        match serde_json::to_string( event ) {
            Ok( line ) => println!( "{}", line ),
            Err( e ) => tracing::warn!( "Failed to serialize {:?}: {}", event, e ),
        }
        return;
    }

    match event {
        PlaybackEvent::TrackChanged { track, position } => {
            let length = service.duration_ms().map( format_ms ).unwrap_or_default();
            println!( "> {:>4}  {} ({})", position, title( catalog, *track ), length );
        }
        PlaybackEvent::PlaystateChanged { state } => println!( "[{:?}]", state ),
        PlaybackEvent::ShuffleChanged { mode } => println!( "Shuffle: {:?}", mode ),
        PlaybackEvent::RepeatChanged { mode } => println!( "Repeat: {:?}", mode ),
        PlaybackEvent::QueueChanged => tracing::debug!( "Queue changed" ),
        PlaybackEvent::PlaybackFailed { message } => eprintln!( "{}", message ),
    }
}


/// Reads control commands from stdin on a separate thread.
fn spawn_stdin_reader() -> mpsc::Receiver<Command> {
    let ( tx, rx ) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name( "segue-stdin".into() )
        .spawn( move || {
            for line in io::stdin().lock().lines() {
                let Ok( line ) = line else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse( &line ) {
                    Ok( command ) => {
                        if tx.send( command ).is_err() {
                            break;
                        }
                    }
                    Err( e ) => eprintln!( "{}", e ),
                }
            }
        });
    if let Err( e ) = spawned {
        tracing::warn!( "No interactive control, stdin reader failed to start: {}", e );
    }
    rx
}


/// Runs the control loop until the queue ends, `limit` track changes
/// happened or the user quits.
fn run_player( service: &mut PlaybackService, catalog: &LibraryCatalog, limit: Option<usize>, json: bool ) {
    let mut events = service.subscribe();
    let commands = spawn_stdin_reader();
    if !json {
        println!( "Type `help` for commands" );
    }

    service.play();
    let mut changes = 0;
    let mut held = false;

    loop {
        service.run_once( CONTROL_TICK );

        loop {
            match events.try_recv() {
                Ok( event ) => {
                    if matches!( event, PlaybackEvent::TrackChanged { .. } ) {
                        changes += 1;
                    }
                    report( &event, catalog, service, json );
                }
                Err( TryRecvError::Lagged( missed ) ) => tracing::warn!( "Missed {} playback events", missed ),
                Err( _ ) => break,
            }
        }

        if limit.is_some_and( |n| changes >= n ) {
            tracing::info!( "Played {} tracks, stopping", changes );
            break;
        }

        while let Ok( command ) = commands.try_recv() {
            tracing::debug!( "Command: {}", command.description() );
            let outcome = command.execute( service );
            held = matches!( command, Command::Pause | Command::Stop ) || ( held && !service.is_playing() );

            match outcome {
                Ok( CommandOutcome::Done ) => {}
                Ok( CommandOutcome::ShowQueue ) => {
                    if let Err( e ) = print_queue( service, catalog, json ) {
                        eprintln!( "{}", e );
                    }
                }
                Ok( CommandOutcome::Message( text ) ) => println!( "{}", text ),
                Ok( CommandOutcome::Quit ) => return,
                Err( e ) => eprintln!( "{}", e ),
            }
        }

        if !held && !service.is_playing() && !service.has_pending_timers() {
            tracing::info!( "Queue finished" );
            break;
        }
    }
}
