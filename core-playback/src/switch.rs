//! # Backend Switch Coordinator
//!
//! Moves playback from one backend to the other without losing position.
//!
//! The handoff is strictly sequential:
//!
//! 1. Capture the outgoing backend's position into [`PreservedTime`].
//! 2. Pause and detach the outgoing item.
//! 3. Make the other backend active and restart the live selection on it with
//!    `preserving_time` set.
//! 4. The new item seeks to the preserved position before it starts playing.
//!    The position is cleared only once that seek's completion arrives for the
//!    live generation, so a teardown racing the restore cannot lose it.
//!
//! A failure on the new backend surfaces as a failed state; there is no
//! fallback to the previous backend.

use crate::backend::PlaybackBackend;
use crate::error::Result;
use crate::intent::Generation;
use std::time::Duration;
use tracing::{debug, info};

/// A position carried across an item replacement, consumed once.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PreservedTime {
    position: Option<Duration>,
    restoring: Option<Generation>,
}

impl PreservedTime {
    /// Stores `position` unless one is already preserved.
    pub fn capture(&mut self, position: Option<Duration>) -> bool {
        if self.position.is_some() {
            return false;
        }
        self.position = position;
        self.position.is_some()
    }

    pub fn get(&self) -> Option<Duration> {
        self.position
    }

    /// Starts restoring for `generation`, returning the seek target.
    pub fn begin_restore(&mut self, generation: Generation) -> Option<Duration> {
        let position = self.position?;
        self.restoring = Some(generation);
        Some(position)
    }

    /// Consumes the position once the restore seek of `generation` completed.
    ///
    /// Completions of any other generation leave it untouched.
    pub fn finish_restore(&mut self, generation: Generation) -> bool {
        if self.restoring != Some(generation) {
            return false;
        }
        self.restoring = None;
        self.position.take().is_some()
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring.is_some()
    }

    pub fn discard(&mut self) {
        self.position = None;
        self.restoring = None;
    }
}

/// Tears down `outgoing` for a switch.
///
/// With `capture` set, the backend's current position is preserved first.
pub fn tear_down(outgoing: &dyn PlaybackBackend, preserved: &mut PreservedTime, capture: bool) -> Result<()> {
    if capture {
        let position = outgoing.current_time();
        if preserved.capture(position) {
            info!(backend = %outgoing.kind(), ?position, "preserved position for backend switch");
        } else {
            debug!(backend = %outgoing.kind(), kept = ?preserved.get(), "keeping previously preserved position");
        }
    }

    outgoing.pause();
    outgoing.clear_item()
}
