//! # Player Configuration Module
//!
//! Builder-based configuration for the video playback core.
//!
//! ## Overview
//!
//! [`PlayerConfig`] holds every host bridge the player talks to plus the
//! [`PlaybackSettings`] tunables. The builder validates fail-fast: a missing
//! required bridge is reported as [`Error::CapabilityMissing`] with a message
//! telling the host what to inject.
//!
//! ## Required Dependencies
//!
//! - `AssetSource` - resolves stream URLs into loaded assets
//! - `MediaEngine` (hardware) - the primary playback backend
//!
//! ## Optional Dependencies
//!
//! - `MediaEngine` (alternate) - second backend for [`BackendKind::Alternate`]
//! - `PipCapability` - system picture-in-picture
//! - `WatchStore` - watch-history persistence
//! - `SegmentSource` - skip-segment metadata
//! - `NowPlayingSink`, `ScreenSaverControl`, `PresentationHost` - host UI hooks
//! - `Clock` - defaults to [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{PlayerConfig, PlaybackSettings};
//! use std::sync::Arc;
//!
//! let config = PlayerConfig::builder()
//!     .asset_source(Arc::new(MyAssetSource))
//!     .hardware_engine(Arc::new(MyEngine::hardware()))
//!     .alternate_engine(Arc::new(MyEngine::software()))
//!     .watch_store(Arc::new(MyHistory))
//!     .settings(PlaybackSettings::default().with_save_history(false))
//!     .build()?;
//! ```
//!
//! [`BackendKind::Alternate`]: bridge_traits::media::BackendKind::Alternate

use crate::error::{Error, Result};
use bridge_traits::{
    AssetSource, BackendKind, Clock, MediaEngine, NowPlayingSink, PipCapability,
    PresentationHost, ScreenSaverControl, SegmentSource, SystemClock, WatchStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// What happens after the current item plays to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfPlaybackAction {
    /// Stay on the ended item.
    #[default]
    Stop,
    /// Seek back to zero and keep playing.
    Loop,
    /// Detach the item from the engine and return to idle.
    CloseItem,
    /// Ask the queue owner for the next item (`AdvanceRequested`).
    Advance,
}

/// Timing and policy tunables for the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Period of the frequent sampler (UI refresh, segment skip).
    pub frequent_interval: Duration,
    /// Period of the infrequent sampler (watch progress).
    pub infrequent_interval: Duration,
    /// At most one watch write per window.
    pub watch_throttle: Duration,
    /// No watch record is created below this position.
    pub min_watch_seconds: f64,
    /// Delay between item start and autoplay / leading segment skip.
    pub autoplay_delay: Duration,
    /// A leading segment must start before this offset to be skipped.
    pub segment_skip_threshold: Duration,
    /// PiP start attempts, measured from the request.
    pub pip_retry_delays: Vec<Duration>,
    pub forward_buffer: Duration,
    pub seek_tolerance_before: Duration,
    pub save_history: bool,
    pub reset_watched_status_on_playing: bool,
    pub close_last_item_on_playback_end: bool,
    pub close_player_on_opening_pip: bool,
    pub resume_from_history: bool,
    pub end_of_playback: EndOfPlaybackAction,
    pub event_buffer: usize,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            frequent_interval: Duration::from_millis(500),
            infrequent_interval: Duration::from_secs(5),
            watch_throttle: Duration::from_secs(2),
            min_watch_seconds: 1.0,
            autoplay_delay: Duration::from_millis(300),
            segment_skip_threshold: Duration::from_secs(3),
            pip_retry_delays: [100, 300, 500, 1_000, 2_000, 3_000, 5_000]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
            forward_buffer: Duration::from_secs(5),
            seek_tolerance_before: Duration::from_secs(1),
            save_history: true,
            reset_watched_status_on_playing: false,
            close_last_item_on_playback_end: true,
            close_player_on_opening_pip: false,
            resume_from_history: false,
            end_of_playback: EndOfPlaybackAction::Stop,
            event_buffer: crate::events::DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl PlaybackSettings {
    pub fn with_save_history(mut self, enabled: bool) -> Self {
        self.save_history = enabled;
        self
    }

    pub fn with_end_of_playback(mut self, action: EndOfPlaybackAction) -> Self {
        self.end_of_playback = action;
        self
    }

    pub fn with_resume_from_history(mut self, enabled: bool) -> Self {
        self.resume_from_history = enabled;
        self
    }

    pub fn with_pip_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.pip_retry_delays = delays;
        self
    }

    pub fn with_close_player_on_opening_pip(mut self, enabled: bool) -> Self {
        self.close_player_on_opening_pip = enabled;
        self
    }

    /// Validates the tunables.
    ///
    /// Checks:
    /// - Sampler periods are non-zero
    /// - PiP retry delays are non-empty and non-decreasing
    /// - The event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        if self.frequent_interval.is_zero() {
            return Err(invalid("frequent_interval", "must be greater than zero"));
        }
        if self.infrequent_interval.is_zero() {
            return Err(invalid("infrequent_interval", "must be greater than zero"));
        }
        if self.min_watch_seconds < 0.0 || !self.min_watch_seconds.is_finite() {
            return Err(invalid("min_watch_seconds", "must be a non-negative number"));
        }
        if self.pip_retry_delays.is_empty() {
            return Err(invalid(
                "pip_retry_delays",
                "at least one attempt is required",
            ));
        }
        if self.pip_retry_delays.windows(2).any(|w| w[1] < w[0]) {
            return Err(invalid("pip_retry_delays", "delays must not decrease"));
        }
        if self.event_buffer == 0 {
            return Err(invalid("event_buffer", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(name: &str, message: &str) -> Error {
    Error::InvalidSetting {
        name: name.to_string(),
        message: message.to_string(),
    }
}

/// Player configuration: bridges plus settings.
///
/// Use [`PlayerConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct PlayerConfig {
    /// Resolves stream URLs into loaded assets (required)
    pub asset_source: Arc<dyn AssetSource>,

    /// Hardware-accelerated engine (required)
    pub hardware_engine: Arc<dyn MediaEngine>,

    /// Alternate decoder engine (optional)
    pub alternate_engine: Option<Arc<dyn MediaEngine>>,

    pub pip: Option<Arc<dyn PipCapability>>,
    pub watch_store: Option<Arc<dyn WatchStore>>,
    pub segment_source: Option<Arc<dyn SegmentSource>>,
    pub now_playing: Option<Arc<dyn NowPlayingSink>>,
    pub screen_saver: Option<Arc<dyn ScreenSaverControl>>,
    pub presentation: Option<Arc<dyn PresentationHost>>,

    /// Calendar time for watch records
    pub clock: Arc<dyn Clock>,

    /// Backend active when the player starts
    pub initial_backend: BackendKind,

    pub settings: PlaybackSettings,
}

impl std::fmt::Debug for PlayerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerConfig")
            .field("asset_source", &"AssetSource { ... }")
            .field("hardware_engine", &"MediaEngine { ... }")
            .field(
                "alternate_engine",
                &self.alternate_engine.as_ref().map(|_| "MediaEngine { ... }"),
            )
            .field("pip", &self.pip.as_ref().map(|_| "PipCapability { ... }"))
            .field(
                "watch_store",
                &self.watch_store.as_ref().map(|_| "WatchStore { ... }"),
            )
            .field(
                "segment_source",
                &self.segment_source.as_ref().map(|_| "SegmentSource { ... }"),
            )
            .field(
                "now_playing",
                &self.now_playing.as_ref().map(|_| "NowPlayingSink { ... }"),
            )
            .field(
                "screen_saver",
                &self
                    .screen_saver
                    .as_ref()
                    .map(|_| "ScreenSaverControl { ... }"),
            )
            .field(
                "presentation",
                &self.presentation.as_ref().map(|_| "PresentationHost { ... }"),
            )
            .field("initial_backend", &self.initial_backend)
            .field("settings", &self.settings)
            .finish()
    }
}

impl PlayerConfig {
    /// Creates a new builder for constructing a `PlayerConfig`.
    pub fn builder() -> PlayerConfigBuilder {
        PlayerConfigBuilder::default()
    }

    /// Engine registered for `kind`, if any.
    pub fn engine(&self, kind: BackendKind) -> Option<&Arc<dyn MediaEngine>> {
        match kind {
            BackendKind::Hardware => Some(&self.hardware_engine),
            BackendKind::Alternate => self.alternate_engine.as_ref(),
        }
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;

        if self.initial_backend == BackendKind::Alternate && self.alternate_engine.is_none() {
            return Err(Error::Config(
                "Initial backend is Alternate but no alternate MediaEngine was provided. \
                 Inject one with .alternate_engine() or start on the hardware backend."
                    .to_string(),
            ));
        }

        if self.settings.save_history && self.watch_store.is_none() {
            tracing::debug!("save_history is enabled without a WatchStore; progress is not persisted");
        }

        Ok(())
    }
}

/// Builder for constructing [`PlayerConfig`] instances.
#[derive(Default)]
pub struct PlayerConfigBuilder {
    asset_source: Option<Arc<dyn AssetSource>>,
    hardware_engine: Option<Arc<dyn MediaEngine>>,
    alternate_engine: Option<Arc<dyn MediaEngine>>,
    pip: Option<Arc<dyn PipCapability>>,
    watch_store: Option<Arc<dyn WatchStore>>,
    segment_source: Option<Arc<dyn SegmentSource>>,
    now_playing: Option<Arc<dyn NowPlayingSink>>,
    screen_saver: Option<Arc<dyn ScreenSaverControl>>,
    presentation: Option<Arc<dyn PresentationHost>>,
    clock: Option<Arc<dyn Clock>>,
    initial_backend: Option<BackendKind>,
    settings: Option<PlaybackSettings>,
}

impl PlayerConfigBuilder {
    /// Sets the asset source (required).
    pub fn asset_source(mut self, source: Arc<dyn AssetSource>) -> Self {
        self.asset_source = Some(source);
        self
    }

    /// Sets the hardware-accelerated engine (required).
    pub fn hardware_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.hardware_engine = Some(engine);
        self
    }

    /// Sets the alternate decoder engine.
    ///
    /// Without it, switching to [`BackendKind::Alternate`] fails with
    /// `BackendUnavailable`.
    pub fn alternate_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.alternate_engine = Some(engine);
        self
    }

    pub fn pip(mut self, pip: Arc<dyn PipCapability>) -> Self {
        self.pip = Some(pip);
        self
    }

    pub fn watch_store(mut self, store: Arc<dyn WatchStore>) -> Self {
        self.watch_store = Some(store);
        self
    }

    pub fn segment_source(mut self, source: Arc<dyn SegmentSource>) -> Self {
        self.segment_source = Some(source);
        self
    }

    pub fn now_playing(mut self, sink: Arc<dyn NowPlayingSink>) -> Self {
        self.now_playing = Some(sink);
        self
    }

    pub fn screen_saver(mut self, control: Arc<dyn ScreenSaverControl>) -> Self {
        self.screen_saver = Some(control);
        self
    }

    pub fn presentation(mut self, host: Arc<dyn PresentationHost>) -> Self {
        self.presentation = Some(host);
        self
    }

    /// Overrides the wall clock (tests use [`bridge_traits::FixedClock`]).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Backend to start on. Default: [`BackendKind::Hardware`].
    pub fn initial_backend(mut self, kind: BackendKind) -> Self {
        self.initial_backend = Some(kind);
        self
    }

    pub fn settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Builds the final `PlayerConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(PlayerConfig)` on success, or an error if:
    /// - Required bridges are missing (AssetSource, hardware MediaEngine)
    /// - Settings are invalid
    /// - The initial backend has no engine
    pub fn build(self) -> Result<PlayerConfig> {
        let asset_source = self.asset_source.ok_or_else(|| Error::CapabilityMissing {
            capability: "AssetSource".to_string(),
            message: "AssetSource implementation is required to resolve stream URLs. \
                      Inject the platform asset loader with .asset_source()."
                .to_string(),
        })?;

        let hardware_engine = self
            .hardware_engine
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "MediaEngine".to_string(),
                message: "A hardware MediaEngine is required as the primary playback backend. \
                          Inject it with .hardware_engine()."
                    .to_string(),
            })?;

        let config = PlayerConfig {
            asset_source,
            hardware_engine,
            alternate_engine: self.alternate_engine,
            pip: self.pip,
            watch_store: self.watch_store,
            segment_source: self.segment_source,
            now_playing: self.now_playing,
            screen_saver: self.screen_saver,
            presentation: self.presentation,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            initial_backend: self.initial_backend.unwrap_or(BackendKind::Hardware),
            settings: self.settings.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        AssetLoadReport, AssetProperty, ItemId, PlayerItem, SeekTolerance, SignalHandler,
        TimeControlStatus,
    };
    use url::Url;

    struct NullSource;

    #[async_trait]
    impl AssetSource for NullSource {
        async fn load(
            &self,
            url: &Url,
            _properties: &[AssetProperty],
        ) -> BridgeResult<AssetLoadReport> {
            Err(bridge_traits::BridgeError::NotAvailable(url.to_string()))
        }
    }

    struct NullEngine;

    #[async_trait]
    impl MediaEngine for NullEngine {
        fn set_signal_handler(&self, _handler: SignalHandler) {}
        fn replace_current_item(&self, _item: Option<PlayerItem>) -> BridgeResult<()> {
            Ok(())
        }
        fn current_item(&self) -> Option<ItemId> {
            None
        }
        fn play(&self) {}
        fn pause(&self) {}
        fn rate(&self) -> f32 {
            0.0
        }
        fn set_rate(&self, _rate: f32) {}
        fn current_time(&self) -> Option<Duration> {
            None
        }
        fn time_control_status(&self) -> TimeControlStatus {
            TimeControlStatus::Paused
        }
        async fn seek(&self, _to: Duration, _tolerance: SeekTolerance) -> bool {
            false
        }
    }

    fn complete_builder() -> PlayerConfigBuilder {
        PlayerConfig::builder()
            .asset_source(Arc::new(NullSource))
            .hardware_engine(Arc::new(NullEngine))
    }

    #[test]
    fn test_builder_requires_asset_source() {
        let err = PlayerConfig::builder()
            .hardware_engine(Arc::new(NullEngine))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::CapabilityMissing { ref capability, .. } if capability == "AssetSource"));
        assert!(err.to_string().contains(".asset_source()"));
    }

    #[test]
    fn test_builder_requires_hardware_engine() {
        let err = PlayerConfig::builder()
            .asset_source(Arc::new(NullSource))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("MediaEngine"));
    }

    #[test]
    fn test_builder_with_required_bridges_uses_defaults() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.initial_backend, BackendKind::Hardware);
        assert_eq!(config.settings, PlaybackSettings::default());
        assert!(config.alternate_engine.is_none());
        assert!(config.engine(BackendKind::Alternate).is_none());
        assert!(config.engine(BackendKind::Hardware).is_some());
    }

    #[test]
    fn test_alternate_initial_backend_requires_engine() {
        let err = complete_builder()
            .initial_backend(BackendKind::Alternate)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("alternate MediaEngine"));

        let config = complete_builder()
            .alternate_engine(Arc::new(NullEngine))
            .initial_backend(BackendKind::Alternate)
            .build()
            .unwrap();
        assert!(config.engine(BackendKind::Alternate).is_some());
    }

    #[test]
    fn test_default_settings() {
        let settings = PlaybackSettings::default();
        assert_eq!(settings.frequent_interval, Duration::from_millis(500));
        assert_eq!(settings.infrequent_interval, Duration::from_secs(5));
        assert_eq!(settings.watch_throttle, Duration::from_secs(2));
        assert_eq!(settings.pip_retry_delays.len(), 7);
        assert_eq!(settings.pip_retry_delays[3], Duration::from_secs(1));
        assert_eq!(settings.end_of_playback, EndOfPlaybackAction::Stop);
        assert!(settings.save_history);
        assert!(!settings.resume_from_history);
    }

    #[test]
    fn test_validate_rejects_decreasing_pip_delays() {
        let settings = PlaybackSettings::default()
            .with_pip_retry_delays(vec![Duration::from_secs(1), Duration::from_millis(10)]);
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("pip_retry_delays"));

        let empty = PlaybackSettings::default().with_pip_retry_delays(Vec::new());
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let settings = PlaybackSettings {
            frequent_interval: Duration::ZERO,
            ..PlaybackSettings::default()
        };
        assert!(complete_builder().settings(settings).build().is_err());
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: PlaybackSettings =
            serde_json::from_str(r#"{"end_of_playback":"loop","save_history":false}"#).unwrap();
        assert_eq!(settings.end_of_playback, EndOfPlaybackAction::Loop);
        assert!(!settings.save_history);
        assert_eq!(settings.watch_throttle, Duration::from_secs(2));
    }

    #[test]
    fn test_config_is_cloneable_and_debuggable() {
        let config = complete_builder().build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.settings, config.settings);
        assert!(format!("{:?}", config).contains("PlayerConfig"));
    }
}
