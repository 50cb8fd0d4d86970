//! Control command parsing and execution.
//!
//! Text commands for driving a [`PlaybackService`] interactively, e.g.
//! from a terminal while playback runs.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::service::PlaybackService;
use crate::types::{ RepeatMode, ShuffleMode };


/// Errors that can occur during command parsing or execution.
#[derive( Debug, Error )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),

    #[error( "Execution failed: {0}" )]
    ExecutionFailed( String ),
}


/// Parsed control command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Queue commands
    Goto { position: usize },
    Remove { first: usize, last: usize },
    Move { from: usize, to: usize },
    Shuffle { mode: Option<ShuffleMode> },
    Repeat { mode: Option<RepeatMode> },
    Queue,

    // Playback commands
    Play,
    Pause,
    Stop,
    Next,
    Prev,
    Seek { position: Duration },
    Volume { level: u32 },

    Help,
    Quit,
}


/// What the caller should do after a command ran.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum CommandOutcome {
    Done,
    /// Print the queue.
    ShowQueue,
    /// Print this text.
    Message( String ),
    Quit,
}


/// Shuffle mode argument.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct ShuffleArg( pub ShuffleMode );


impl FromStr for ShuffleArg {
    type Err = CommandError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "off" | "0" => Ok( ShuffleArg( ShuffleMode::None ) ),
            "normal" | "on" | "1" => Ok( ShuffleArg( ShuffleMode::Normal ) ),
            "auto" | "party" | "2" => Ok( ShuffleArg( ShuffleMode::Auto ) ),
            _ => Err( CommandError::InvalidArgument(
                format!( "Invalid shuffle mode: '{}'. Use 'none', 'normal', or 'auto'", s )
            )),
        }
    }
}


/// Repeat mode argument.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct RepeatArg( pub RepeatMode );


impl FromStr for RepeatArg {
    type Err = CommandError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "off" | "0" => Ok( RepeatArg( RepeatMode::None ) ),
            "current" | "one" | "1" => Ok( RepeatArg( RepeatMode::Current ) ),
            "all" | "2" => Ok( RepeatArg( RepeatMode::All ) ),
            _ => Err( CommandError::InvalidArgument(
                format!( "Invalid repeat mode: '{}'. Use 'none', 'current', or 'all'", s )
            )),
        }
    }
}


impl Command {
    /// Parses a command line.
    ///
    /// @param input - The command string to parse
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args: Vec<&str> = parts.collect();

        match cmd.as_str() {
            // Queue commands
            "goto" | "go" | "g" => {
                let position = parse_index( args.first().copied(), "queue position" )?;
                Ok( Command::Goto { position } )
            }
            "remove" | "rm" | "del" => {
                let first = parse_index( args.first().copied(), "first position" )?;
                let last = match args.get( 1 ) {
                    Some( s ) => parse_index( Some( s ), "last position" )?,
                    None => first,
                };
                Ok( Command::Remove { first, last } )
            }
            "move" | "mv" => {
                let from = parse_index( args.first().copied(), "source position" )?;
                let to = parse_index( args.get( 1 ).copied(), "target position" )?;
                Ok( Command::Move { from, to } )
            }
            "shuffle" | "sh" => {
                let mode = args.first().map( |s| s.parse::<ShuffleArg>() ).transpose()?;
                Ok( Command::Shuffle { mode: mode.map( |a| a.0 ) } )
            }
            "repeat" | "rep" => {
                let mode = args.first().map( |s| s.parse::<RepeatArg>() ).transpose()?;
                Ok( Command::Repeat { mode: mode.map( |a| a.0 ) } )
            }
            "queue" | "ls" => Ok( Command::Queue ),

            // Playback commands
            "play" | "p" => Ok( Command::Play ),
            "pause" | "pa" => Ok( Command::Pause ),
            "stop" | "st" => Ok( Command::Stop ),
            "next" | "n" => Ok( Command::Next ),
            "prev" | "previous" | "pr" => Ok( Command::Prev ),
            "seek" | "sk" => {
                let time_str = args.first()
                    .ok_or_else( || CommandError::MissingArgument( "time position".into() ) )?;
                let position = parse_time( time_str )?;
                Ok( Command::Seek { position } )
            }
            "vol" | "volume" => {
                let level_str = args.first()
                    .ok_or_else( || CommandError::MissingArgument( "volume level".into() ) )?;
                let level: u32 = level_str.parse()
                    .map_err( |_| CommandError::InvalidArgument( format!( "Invalid volume: {}", level_str ) ) )?;
                Ok( Command::Volume { level: level.min( 100 ) } )
            }
            "help" | "h" | "?" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }


    /// Runs the command against `service`.
    pub fn execute( &self, service: &mut PlaybackService ) -> Result<CommandOutcome, CommandError> {
        match self {
            Command::Goto { position } => {
                if !service.set_queue_position( *position ) {
                    return Err( CommandError::ExecutionFailed(
                        format!( "No entry at position {}", position )
                    ));
                }
            }
            Command::Remove { first, last } => {
                if last < first {
                    return Err( CommandError::InvalidArgument( format!( "{} is before {}", last, first ) ) );
                }
                let removed = service.remove_range( *first, *last );
                return Ok( CommandOutcome::Message( format!( "Removed {} tracks", removed ) ) );
            }
            Command::Move { from, to } => service.move_item( *from, *to ),
            Command::Shuffle { mode } => {
                let mode = mode.unwrap_or( match service.shuffle_mode() {
                    ShuffleMode::None => ShuffleMode::Normal,
                    ShuffleMode::Normal | ShuffleMode::Auto => ShuffleMode::None,
                });
                service.set_shuffle_mode( mode );
                return Ok( CommandOutcome::Message( format!( "Shuffle: {:?}", service.shuffle_mode() ) ) );
            }
            Command::Repeat { mode } => {
                let mode = mode.unwrap_or( match service.repeat_mode() {
                    RepeatMode::None => RepeatMode::All,
                    RepeatMode::All => RepeatMode::Current,
                    RepeatMode::Current => RepeatMode::None,
                });
                service.set_repeat_mode( mode );
                return Ok( CommandOutcome::Message( format!( "Repeat: {:?}", service.repeat_mode() ) ) );
            }
            Command::Queue => return Ok( CommandOutcome::ShowQueue ),
            Command::Play => service.play(),
            Command::Pause => service.pause(),
            Command::Stop => service.stop(),
            Command::Next => service.next(),
            Command::Prev => service.prev(),
            Command::Seek { position } => {
                let applied = service.seek( position.as_millis() as u64 )
                    .ok_or_else( || CommandError::ExecutionFailed( "Nothing is loaded".into() ) )?;
                return Ok( CommandOutcome::Message( format!( "Position: {}", format_ms( applied ) ) ) );
            }
            Command::Volume { level } => service.set_volume( *level as f32 / 100.0 ),
            Command::Help => return Ok( CommandOutcome::Message( help_text().to_string() ) ),
            Command::Quit => return Ok( CommandOutcome::Quit ),
        }
        Ok( CommandOutcome::Done )
    }


    /// Returns a brief description of the command for help text.
    pub fn description( &self ) -> &'static str {
        match self {
            Command::Goto { .. } => "Jump to queue position",
            Command::Remove { .. } => "Remove queue entries",
            Command::Move { .. } => "Move a queue entry",
            Command::Shuffle { .. } => "Set shuffle mode",
            Command::Repeat { .. } => "Set repeat mode",
            Command::Queue => "Show the queue",
            Command::Play => "Start or resume playback",
            Command::Pause => "Pause playback",
            Command::Stop => "Stop playback",
            Command::Next => "Next track",
            Command::Prev => "Previous track",
            Command::Seek { .. } => "Seek to position",
            Command::Volume { .. } => "Set volume (0-100)",
            Command::Help => "Show help",
            Command::Quit => "Quit",
        }
    }
}


fn parse_index( arg: Option<&str>, what: &str ) -> Result<usize, CommandError> {
    let arg = arg.ok_or_else( || CommandError::MissingArgument( what.into() ) )?;
    arg.parse()
        .map_err( |_| CommandError::InvalidArgument( format!( "Invalid {}: {}", what, arg ) ) )
}


/// Parses a time string like "1:30" or "90" into a Duration.
///
/// @param s - Time string in format "MM:SS", "M:SS", or just seconds
///
/// @returns Duration or error
fn parse_time( s: &str ) -> Result<Duration, CommandError> {
    let s = s.trim();

    if let Some(( min, sec )) = s.split_once( ':' ) {
        let minutes: u64 = min.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid minutes: {}", min ) ) )?;
        let seconds: u64 = sec.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid seconds: {}", sec ) ) )?;
        Ok( Duration::from_secs( minutes * 60 + seconds ) )
    } else {
        let seconds: u64 = s.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) )?;
        Ok( Duration::from_secs( seconds ) )
    }
}


/// Formats milliseconds as `m:ss`.
pub fn format_ms( ms: u64 ) -> String {
    let secs = ms / 1000;
    format!( "{}:{:02}", secs / 60, secs % 60 )
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Queue Commands:
  goto <pos>           Jump to queue position
  remove <first> [last] Remove entries
  move <from> <to>     Move an entry
  shuffle [mode]       Set shuffle (none/normal/auto)
  repeat [mode]        Set repeat (none/current/all)
  queue                Show the queue

Playback Commands:
  play                 Start or resume
  pause                Pause playback
  stop                 Stop playback
  next                 Next track
  prev                 Previous track
  seek <time>          Seek to position (e.g., 1:30)
  vol <0-100>          Set volume

Other Commands:
  help                 Show this help
  quit                 Exit segue"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_seek() {
        let cmd = Command::parse( "seek 1:30" ).unwrap();
        assert_eq!( cmd, Command::Seek { position: Duration::from_secs( 90 ) } );
    }


    #[test]
    fn test_parse_seek_seconds() {
        let cmd = Command::parse( "seek 45" ).unwrap();
        assert_eq!( cmd, Command::Seek { position: Duration::from_secs( 45 ) } );
    }


    #[test]
    fn test_parse_repeat_with_mode() {
        let cmd = Command::parse( "repeat current" ).unwrap();
        assert_eq!( cmd, Command::Repeat { mode: Some( RepeatMode::Current ) } );
    }


    #[test]
    fn test_parse_repeat_toggle() {
        let cmd = Command::parse( "repeat" ).unwrap();
        assert_eq!( cmd, Command::Repeat { mode: None } );
    }


    #[test]
    fn test_parse_shuffle_auto() {
        let cmd = Command::parse( "sh auto" ).unwrap();
        assert_eq!( cmd, Command::Shuffle { mode: Some( ShuffleMode::Auto ) } );
    }


    #[test]
    fn test_parse_remove_single_and_range() {
        assert_eq!( Command::parse( "rm 3" ).unwrap(), Command::Remove { first: 3, last: 3 } );
        assert_eq!( Command::parse( "remove 1 4" ).unwrap(), Command::Remove { first: 1, last: 4 } );
    }


    #[test]
    fn test_parse_move() {
        assert_eq!( Command::parse( "move 0 2" ).unwrap(), Command::Move { from: 0, to: 2 } );
        assert!( matches!( Command::parse( "move 0" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_volume_is_capped() {
        assert_eq!( Command::parse( "vol 250" ).unwrap(), Command::Volume { level: 100 } );
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "foobar" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_invalid_index() {
        let result = Command::parse( "goto x" );
        assert!( matches!( result, Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_format_ms() {
        assert_eq!( format_ms( 95_000 ), "1:35" );
    }
}
