//! Playback intents and the generation guard.
//!
//! Every selection creates a new [`PlaybackIntent`] with a strictly larger
//! [`Generation`]. Asynchronous work captures the generation it was issued for
//! and the owner loop drops any completion whose generation is no longer live.

use crate::model::{Stream, Video};
use bridge_traits::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonically increasing selection counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    /// Identity of the player item built for this generation.
    pub fn item_id(self) -> ItemId {
        ItemId(self.0)
    }

    fn next(self) -> Generation {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// The live selection: what to play and which generation it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackIntent {
    pub video: Video,
    pub stream: Stream,
    pub generation: Generation,
    /// Restore the preserved position before playing.
    pub preserving_time: bool,
}

/// Owns the generation counter and the single live intent.
#[derive(Debug, Default)]
pub struct IntentTracker {
    current: Generation,
    live: Option<PlaybackIntent>,
}

impl IntentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersedes whatever is live and returns the new intent.
    pub fn begin(&mut self, video: Video, stream: Stream, preserving_time: bool) -> &PlaybackIntent {
        self.current = self.current.next();
        self.live.insert(PlaybackIntent {
            video,
            stream,
            generation: self.current,
            preserving_time,
        })
    }

    /// Supersedes the live intent without starting a new one (stop, close).
    pub fn supersede(&mut self) -> Option<PlaybackIntent> {
        self.current = self.current.next();
        self.live.take()
    }

    pub fn current(&self) -> Generation {
        self.current
    }

    pub fn live(&self) -> Option<&PlaybackIntent> {
        self.live.as_ref()
    }

    /// The live intent, only if it belongs to `generation`.
    pub fn live_for(&self, generation: Generation) -> Option<&PlaybackIntent> {
        self.live.as_ref().filter(|i| i.generation == generation)
    }

    pub fn is_live(&self, generation: Generation) -> bool {
        self.live_for(generation).is_some()
    }
}
