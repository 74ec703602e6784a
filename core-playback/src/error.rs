//! # Playback Error Types
//!
//! Errors surfaced by the playback core.
//!
//! Only [`PlaybackError::LoadFailure`] and [`PlaybackError::PlaybackFailure`]
//! ever reach the user. The rest are bookkeeping: seeks on live streams report
//! `false` through their completion, and an exhausted PiP schedule is simply
//! abandoned.

use bridge_traits::{BackendKind, BridgeError, MediaType};
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Terminal failures (user-visible)
    // ========================================================================
    /// Asset or composition could not be resolved.
    #[error("Failed to load media: {0}")]
    LoadFailure(String),

    /// Engine-level failure while the item was ready or playing.
    #[error("Playback failed: {0}")]
    PlaybackFailure(String),

    // ========================================================================
    // Bookkeeping
    // ========================================================================
    /// Seek attempted on a live (unbounded) stream.
    #[error("Seeking is not available for live streams")]
    SeekRejected,

    /// Picture-in-picture never became possible within the attempt window.
    #[error("Picture-in-picture unavailable")]
    PipUnavailable,

    /// A loaded asset had no track of the expected media type.
    #[error("Asset has no {0} track")]
    MissingTrack(MediaType),

    #[error("No item loaded")]
    NoItemLoaded,

    /// No engine is registered for the requested backend.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(BackendKind),

    /// The player task has shut down.
    #[error("Player is closed")]
    PlayerClosed,

    // ========================================================================
    // Conversions
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

impl PlaybackError {
    /// Returns `true` if this error should be shown to the user.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            PlaybackError::LoadFailure(_) | PlaybackError::PlaybackFailure(_)
        )
    }

    /// Collapses any error into the user-visible load failure it causes.
    pub(crate) fn into_load_failure(self) -> PlaybackError {
        match self {
            PlaybackError::LoadFailure(_) | PlaybackError::PlaybackFailure(_) => self,
            other => PlaybackError::LoadFailure(other.to_string()),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
