//! Command-line argument parsing for Segue.

use std::path::PathBuf;

use clap::{ Args as ClapArgs, Parser, Subcommand, ValueEnum };
use segue_core::{ EnqueueAction, RepeatMode, ShuffleMode };


/// Segue - play queue with gapless transitions, driven from the shell.
#[derive( Parser, Debug )]
#[command( name = "segue" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// More logging (-v info, -vv debug, -vvv trace). RUST_LOG wins if set.
    #[arg( short, long, action = clap::ArgAction::Count, global = true )]
    pub verbose: u8,

    /// Settings file to use instead of the default one.
    #[arg( long, global = true )]
    pub config: Option<PathBuf>,

    /// Queue state file to use instead of the configured one.
    #[arg( long, global = true )]
    pub state: Option<PathBuf>,

    /// Print the queue and playback events as JSON.
    #[arg( long, global = true )]
    pub json: bool,

    #[command( subcommand )]
    pub command: Commands,
}


#[derive( Subcommand, Debug )]
pub enum Commands {
    /// Scan the library, optionally adding new root directories first.
    Scan {
        /// Directories to add to the library.
        roots: Vec<PathBuf>,
    },

    /// Print the saved queue.
    Show,

    /// Replace the queue with library tracks.
    Open {
        /// Track ids; the whole library when empty.
        ids: Vec<u64>,

        #[command( flatten )]
        start: StartArgs,
    },

    /// Add library tracks to the queue.
    Enqueue {
        /// Track ids.
        #[arg( required = true )]
        ids: Vec<u64>,

        /// Where the tracks go.
        #[arg( short, long, value_enum, default_value_t = EnqueueMode::Last )]
        mode: EnqueueMode,
    },

    /// Remove queue entries first..=last.
    Remove {
        first: usize,
        last: Option<usize>,
    },

    /// Remove every entry holding a track id.
    RemoveId {
        id: u64,
    },

    /// Move one queue entry.
    Move {
        from: usize,
        to: usize,
    },

    /// Move the play head to a queue position.
    Goto {
        position: usize,
    },

    /// Skip to the next track.
    Next,

    /// Skip to the previous track.
    Prev,

    /// Set the shuffle mode.
    Shuffle {
        #[arg( value_enum )]
        mode: ShuffleArg,
    },

    /// Set the repeat mode.
    Repeat {
        #[arg( value_enum )]
        mode: RepeatArg,
    },

    /// Play the queue with the simulated player, reading control commands
    /// from stdin.
    Play {
        /// Stop after this many track changes.
        #[arg( short, long )]
        tracks: Option<usize>,
    },
}


#[derive( ClapArgs, Debug, Clone, Copy, Default )]
#[group( multiple = false )]
pub struct StartArgs {
    /// Queue position to start from.
    #[arg( short, long )]
    pub start: Option<usize>,

    /// Start from a random position.
    #[arg( short, long )]
    pub random: bool,
}


impl StartArgs {
    /// Start position for the queue replace; `None` picks at random.
    pub fn position( &self ) -> Option<usize> {
        if self.random {
            None
        } else {
            Some( self.start.unwrap_or( 0 ) )
        }
    }
}


#[derive( ValueEnum, Debug, Clone, Copy, PartialEq, Eq )]
pub enum EnqueueMode {
    Now,
    Next,
    Last,
}


impl From<EnqueueMode> for EnqueueAction {
    fn from( mode: EnqueueMode ) -> Self {
        match mode {
            EnqueueMode::Now => EnqueueAction::Now,
            EnqueueMode::Next => EnqueueAction::Next,
            EnqueueMode::Last => EnqueueAction::Last,
        }
    }
}


#[derive( ValueEnum, Debug, Clone, Copy, PartialEq, Eq )]
pub enum ShuffleArg {
    None,
    Normal,
    Auto,
}


impl From<ShuffleArg> for ShuffleMode {
    fn from( arg: ShuffleArg ) -> Self {
        match arg {
            ShuffleArg::None => ShuffleMode::None,
            ShuffleArg::Normal => ShuffleMode::Normal,
            ShuffleArg::Auto => ShuffleMode::Auto,
        }
    }
}


#[derive( ValueEnum, Debug, Clone, Copy, PartialEq, Eq )]
pub enum RepeatArg {
    None,
    All,
    Current,
}


impl From<RepeatArg> for RepeatMode {
    fn from( arg: RepeatArg ) -> Self {
        match arg {
            RepeatArg::None => RepeatMode::None,
            RepeatArg::All => RepeatMode::All,
            RepeatArg::Current => RepeatMode::Current,
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_open_with_start() {
        let args = Args::try_parse_from([ "segue", "open", "3", "4", "--start", "1" ]).unwrap();
        match args.command {
            Commands::Open { ids, start } => {
                assert_eq!( ids, vec![ 3, 4 ] );
                assert_eq!( start.position(), Some( 1 ) );
            }
            other => panic!( "unexpected {:?}", other ),
        }
    }


    #[test]
    fn test_start_and_random_conflict() {
        assert!( Args::try_parse_from([ "segue", "open", "--start", "1", "--random" ]).is_err() );
    }


    #[test]
    fn test_enqueue_mode_and_verbosity() {
        let args = Args::try_parse_from([ "segue", "-vv", "enqueue", "7", "--mode", "next" ]).unwrap();
        assert_eq!( args.verbose, 2 );
        match args.command {
            Commands::Enqueue { ids, mode } => {
                assert_eq!( ids, vec![ 7 ] );
                assert_eq!( EnqueueAction::from( mode ), EnqueueAction::Next );
            }
            other => panic!( "unexpected {:?}", other ),
        }
    }


    #[test]
    fn test_modes_parse() {
        let args = Args::try_parse_from([ "segue", "shuffle", "auto" ]).unwrap();
        assert!( matches!( args.command, Commands::Shuffle { mode: ShuffleArg::Auto } ) );

        let args = Args::try_parse_from([ "segue", "repeat", "current" ]).unwrap();
        assert!( matches!( args.command, Commands::Repeat { mode: RepeatArg::Current } ) );
    }
}
