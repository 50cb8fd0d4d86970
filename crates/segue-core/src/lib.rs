//! Segue Core - Play queue and gapless transition engine
//!
//! This crate provides the playback queue model, the shuffle/repeat state
//! machine, gapless handoff between two player handles, and persistence
//! of queue state to a flat key-value store. Decoding and audio output are
//! left to a [`TrackPlayer`] implementation.

pub mod catalog;
pub mod codec;
pub mod command;
pub mod config;
pub mod engine;
pub mod events;
pub mod history;
pub mod library;
pub mod player;
pub mod queue;
pub mod service;
pub mod shuffle;
pub mod store;
pub mod types;

pub use catalog::{ TrackCatalog, TrackInfo };
pub use codec::{ CodecError, QueueState };
pub use command::{ Command, CommandError, CommandOutcome };
pub use config::EngineConfig;
pub use engine::{ ControlMessage, Transition, TransitionEngine };
pub use events::PlaybackEvent;
pub use library::{ LibraryCatalog, LibraryError, LibraryScanner };
pub use player::{ HandleId, PlayerError, PlayerErrorKind, PlayerFactory, PlayerSignals, TrackPlayer };
pub use queue::PlayQueue;
pub use service::{ ControlEvent, PlaybackService, ServiceError };
pub use store::{ FileStore, MemoryStore, StateStore, StoreError };
pub use types::{ EnqueueAction, PlaybackState, RepeatMode, ShuffleMode, TrackId };
