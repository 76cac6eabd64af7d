//! # Audio Module
//!
//! Per-guild playback for the bard bot.
//!
//! ## Architecture
//!
//! ### [`player`] - Playback state machine
//! - One actor task per guild, fed through a [`player::PlayerHandle`]
//! - Idle / Playing / Paused transitions, auto-advance on track end
//! - Stop and disconnect handling that cancels in-flight requests
//!
//! ### [`queue`] - Track queue
//! - Strict FIFO of resolved tracks, owned by the player task
//!
//! ### [`transcode`] - ffmpeg pipeline
//! - Builds the `volume`/`atempo` filter chain from the guild settings
//! - Owns the child process and kills it when the stream is released
//!
//! ### [`voice`] - Voice transport
//! - songbird session wrapper behind a small trait, plus the one-shot
//!   "track finished" notification
//!
//! ### [`registry`] - Guild registry
//! - Lazily creates exactly one player per guild

pub mod error;
pub mod pcm;
pub mod player;
pub mod queue;
pub mod registry;
pub mod track;
pub mod transcode;
pub mod voice;

#[cfg(test)]
pub mod testing;

pub use error::{PlayerError, PlayerResult};
pub use player::{EnqueueOutcome, Phase, PlayerHandle, PlayerSnapshot};
pub use registry::PlayerRegistry;
pub use track::{PlaybackSettings, TrackDescriptor};
