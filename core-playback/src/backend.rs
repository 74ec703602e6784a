//! # Playback Backends
//!
//! A uniform play/pause/seek surface over the host's interchangeable engines.
//!
//! The player never holds a concrete engine. It holds a [`Backends`] registry
//! and a [`BackendKind`] tag naming the active one; every control call goes
//! through [`PlaybackBackend`]. Both engine flavours are wrapped by the same
//! [`EngineBackend`] adapter.
//!
//! ## Threading Model
//!
//! Control calls are synchronous and cheap. Only [`PlaybackBackend::seek`]
//! suspends, and the player always awaits it on a spawned task so the owner
//! loop keeps processing commands.

use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::{
    BackendKind, EngineSignal, ItemId, MediaEngine, PlayerItem, SeekTolerance, SignalHandler,
    TimeControlStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Capability interface every playback backend implements.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Forwards the engine's signals to `forward`, tagged with this backend.
    fn install_signal_handler(&self, forward: Arc<dyn Fn(BackendKind, EngineSignal) + Send + Sync>);

    /// Replaces the current item with `item`.
    fn load_item(&self, item: PlayerItem) -> Result<()>;

    /// Detaches the current item, if any.
    fn clear_item(&self) -> Result<()>;

    fn current_item(&self) -> Option<ItemId>;

    fn play(&self);

    fn pause(&self);

    fn rate(&self) -> f32;

    fn set_rate(&self, rate: f32);

    fn current_time(&self) -> Option<Duration>;

    fn time_control_status(&self) -> TimeControlStatus;

    /// Resolves to `true` once the seek finished, `false` if interrupted.
    async fn seek(&self, to: Duration, tolerance: SeekTolerance) -> bool;

    fn set_visual_tracks_enabled(&self, enabled: bool);
}

/// [`PlaybackBackend`] over a host [`MediaEngine`].
pub struct EngineBackend {
    kind: BackendKind,
    engine: Arc<dyn MediaEngine>,
}

impl EngineBackend {
    pub fn new(kind: BackendKind, engine: Arc<dyn MediaEngine>) -> Self {
        Self { kind, engine }
    }
}

#[async_trait]
impl PlaybackBackend for EngineBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn install_signal_handler(&self, forward: Arc<dyn Fn(BackendKind, EngineSignal) + Send + Sync>) {
        let kind = self.kind;
        let handler: SignalHandler = Arc::new(move |signal| forward(kind, signal));
        self.engine.set_signal_handler(handler);
    }

    fn load_item(&self, item: PlayerItem) -> Result<()> {
        debug!(backend = %self.kind, item = %item.id, "replacing current item");
        self.engine
            .replace_current_item(Some(item))
            .map_err(PlaybackError::from)
    }

    fn clear_item(&self) -> Result<()> {
        if self.engine.current_item().is_none() {
            return Ok(());
        }
        debug!(backend = %self.kind, "clearing current item");
        self.engine.pause();
        self.engine
            .replace_current_item(None)
            .map_err(PlaybackError::from)
    }

    fn current_item(&self) -> Option<ItemId> {
        self.engine.current_item()
    }

    fn play(&self) {
        self.engine.play();
    }

    fn pause(&self) {
        self.engine.pause();
    }

    fn rate(&self) -> f32 {
        self.engine.rate()
    }

    fn set_rate(&self, rate: f32) {
        self.engine.set_rate(rate);
    }

    fn current_time(&self) -> Option<Duration> {
        self.engine.current_time()
    }

    fn time_control_status(&self) -> TimeControlStatus {
        self.engine.time_control_status()
    }

    async fn seek(&self, to: Duration, tolerance: SeekTolerance) -> bool {
        self.engine.seek(to, tolerance).await
    }

    fn set_visual_tracks_enabled(&self, enabled: bool) {
        self.engine.set_visual_tracks_enabled(enabled);
    }
}

/// The registered backends, keyed by [`BackendKind`].
#[derive(Clone)]
pub struct Backends {
    hardware: Arc<dyn PlaybackBackend>,
    alternate: Option<Arc<dyn PlaybackBackend>>,
}

impl Backends {
    /// Wraps the engines of a player configuration.
    pub fn from_engines(hardware: Arc<dyn MediaEngine>, alternate: Option<Arc<dyn MediaEngine>>) -> Self {
        Self {
            hardware: Arc::new(EngineBackend::new(BackendKind::Hardware, hardware)),
            alternate: alternate.map(|engine| {
                Arc::new(EngineBackend::new(BackendKind::Alternate, engine)) as Arc<dyn PlaybackBackend>
            }),
        }
    }

    pub fn get(&self, kind: BackendKind) -> Result<Arc<dyn PlaybackBackend>> {
        match kind {
            BackendKind::Hardware => Ok(Arc::clone(&self.hardware)),
            BackendKind::Alternate => self
                .alternate
                .clone()
                .ok_or(PlaybackError::BackendUnavailable(kind)),
        }
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.get(kind).is_ok()
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn PlaybackBackend>> {
        std::iter::once(&self.hardware).chain(self.alternate.iter())
    }
}
