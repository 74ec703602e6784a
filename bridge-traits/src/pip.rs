//! Picture-in-picture capability bridge.
//!
//! The system floating-video facility is asynchronous on every platform: the
//! host reports `is_possible()` as soon as the current engine layer can be
//! detached, and delivers lifecycle callbacks later. Lifecycle callbacks are
//! forwarded to the core as [`PipLifecycle`] values.

/// System picture-in-picture facility.
pub trait PipCapability: Send + Sync {
    /// Whether a start request would currently be honoured.
    fn is_possible(&self) -> bool;

    /// Ask the system to enter picture-in-picture.
    fn start(&self);

    /// Ask the system to leave picture-in-picture.
    fn stop(&self);
}

/// Lifecycle callbacks delivered by the host's picture-in-picture delegate.
///
/// `RestoreUserInterface` carries no completion here; the core exposes a
/// dedicated request that answers through a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipLifecycle {
    WillStart,
    DidStart,
    WillStop,
    DidStop,
    FailedToStart { message: String },
}
