//! # Playback Coordination Module
//!
//! Loads a selected stream, assembles it into a playable item and keeps two
//! interchangeable engines, picture-in-picture, watch history and the host's
//! observers in agreement about what is playing.
//!
//! ## Overview
//!
//! This module handles:
//! - Asset loading and audio/video composition assembly
//! - The playback state machine and its generation guard
//! - Time-preserving switches between the hardware and alternate engines
//! - Picture-in-picture start retries and presentation hand-off
//! - Throttled watch-progress writes and one-time leading segment skips
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{Player, Video, Stream};
//!
//! let player = Player::spawn(config)?;
//! player.play_stream(video, stream, false)?;
//! let mut events = player.subscribe();
//! ```

pub mod backend;
pub mod composition;
pub mod error;
pub mod intent;
pub mod loader;
pub mod model;
pub mod pip;
pub mod player;
pub mod sampler;
pub mod segments;
pub mod selection;
pub mod switch;
pub mod watch;

pub use backend::{Backends, EngineBackend, PlaybackBackend};
pub use composition::{CompositionAssembler, CompositionBuildState};
pub use core_runtime::events::PlaybackState;
pub use error::{PlaybackError, Result};
pub use intent::{Generation, IntentTracker, PlaybackIntent};
pub use loader::AssetLoader;
pub use model::{ContainerFormat, Resolution, Stream, StreamAssets, StreamKind, Video};
pub use pip::{PipController, PipStatus};
pub use player::{Player, PlayerHandle, PlayerSnapshot};
pub use segments::SegmentSkipEvaluator;
pub use selection::{best_playable, can_play};
pub use switch::PreservedTime;
pub use watch::{WatchReporter, WatchSample};
