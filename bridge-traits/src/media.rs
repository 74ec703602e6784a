//! Media engine bridge traits and supporting item types.
//!
//! The host owns the actual decoding engines (a hardware-accelerated one and,
//! optionally, an alternate decoder). The core only ever talks to them through
//! [`MediaEngine`] and resolves URLs through [`AssetSource`]. Engines report
//! asynchronous changes (item status, end of item, time-control status) by
//! calling the [`SignalHandler`] installed by the core; they never mutate core
//! state directly.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Media type of a track inside an asset or composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
    Subtitle,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Audio => write!(f, "audio"),
            MediaType::Video => write!(f, "video"),
            MediaType::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// Which of the host's engines a signal or item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Platform engine with hardware decoding and PiP support.
    Hardware,
    /// Alternate software decoder engine.
    Alternate,
}

impl BackendKind {
    pub fn other(self) -> BackendKind {
        match self {
            BackendKind::Hardware => BackendKind::Alternate,
            BackendKind::Alternate => BackendKind::Hardware,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Hardware => write!(f, "hardware"),
            BackendKind::Alternate => write!(f, "alternate"),
        }
    }
}

/// Asset properties the core asks an [`AssetSource`] to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetProperty {
    Duration,
    Tracks,
    Playable,
}

/// Every property required before an asset can back a player item.
pub const REQUIRED_ASSET_PROPERTIES: [AssetProperty; 3] = [
    AssetProperty::Tracks,
    AssetProperty::Playable,
    AssetProperty::Duration,
];

/// Per-property outcome reported by an [`AssetSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyStatus {
    Loaded,
    Failed(String),
    Cancelled,
    Unknown,
}

/// A track discovered while loading an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTrack {
    /// Engine-specific track identifier inside the asset.
    pub track_id: u32,
    pub media_type: MediaType,
}

/// An asset whose properties have been resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAsset {
    pub url: Url,
    /// Duration as reported by the container, when known.
    pub duration: Option<Duration>,
    pub tracks: Vec<AssetTrack>,
    pub playable: bool,
}

impl LoadedAsset {
    /// Create an empty, playable asset description for `url`.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            duration: None,
            tracks: Vec::new(),
            playable: true,
        }
    }

    /// Attach the container duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Append a track of the given media type.
    pub fn with_track(mut self, media_type: MediaType, track_id: u32) -> Self {
        self.tracks.push(AssetTrack {
            track_id,
            media_type,
        });
        self
    }

    /// Mark the asset as (not) playable.
    pub fn with_playable(mut self, playable: bool) -> Self {
        self.playable = playable;
        self
    }

    /// First track of `media_type`, if the asset has one.
    pub fn first_track(&self, media_type: MediaType) -> Option<&AssetTrack> {
        self.tracks.iter().find(|t| t.media_type == media_type)
    }
}

/// Result of an [`AssetSource::load`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetLoadReport {
    pub asset: LoadedAsset,
    pub properties: Vec<(AssetProperty, PropertyStatus)>,
}

impl AssetLoadReport {
    /// Report where every property in `properties` loaded successfully.
    pub fn loaded(asset: LoadedAsset, properties: &[AssetProperty]) -> Self {
        Self {
            asset,
            properties: properties
                .iter()
                .map(|p| (*p, PropertyStatus::Loaded))
                .collect(),
        }
    }

    /// Override the status of one property.
    pub fn with_status(mut self, property: AssetProperty, status: PropertyStatus) -> Self {
        if let Some(entry) = self.properties.iter_mut().find(|(p, _)| *p == property) {
            entry.1 = status;
        } else {
            self.properties.push((property, status));
        }
        self
    }

    /// Status of `property`; `Unknown` if the source never reported it.
    pub fn status(&self, property: AssetProperty) -> PropertyStatus {
        self.properties
            .iter()
            .find(|(p, _)| *p == property)
            .map(|(_, s)| s.clone())
            .unwrap_or(PropertyStatus::Unknown)
    }
}

/// Resolves URLs into loaded assets.
///
/// Implementations may perform network and container work on background
/// threads; the returned future must not touch any core state.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Load `properties` of the asset at `url`.
    ///
    /// An `Err` means the asset could not be opened at all. Individual property
    /// failures are reported through [`AssetLoadReport::properties`].
    async fn load(&self, url: &Url, properties: &[AssetProperty]) -> Result<AssetLoadReport>;
}

/// A range on a media timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Duration,
    pub duration: Duration,
}

impl TimeRange {
    pub fn new(start: Duration, duration: Duration) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// One track inserted into a [`Composition`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionTrack {
    pub media_type: MediaType,
    /// Asset the track is taken from.
    pub source: Url,
    pub source_track_id: u32,
    /// Portion of the source track used.
    pub source_range: TimeRange,
    /// Offset on the composition timeline.
    pub insert_at: Duration,
}

/// A synthetic timeline assembled from separately loaded tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    pub tracks: Vec<CompositionTrack>,
}

impl Composition {
    /// Length of the composition timeline.
    pub fn duration(&self) -> Duration {
        self.tracks
            .iter()
            .map(|t| t.insert_at + t.source_range.duration)
            .max()
            .unwrap_or_default()
    }

    pub fn track(&self, media_type: MediaType) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.media_type == media_type)
    }
}

/// What a player item plays.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemSource {
    Asset(LoadedAsset),
    Composition(Composition),
}

/// Opaque identity of a player item, assigned by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// External metadata attached to an item (lock screen, remote controls).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemMetadata {
    pub title: String,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub artwork_url: Option<Url>,
}

/// A playable item handed to a [`MediaEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerItem {
    pub id: ItemId,
    pub source: ItemSource,
    pub metadata: ItemMetadata,
    /// How far ahead the engine should try to buffer.
    pub preferred_forward_buffer: Duration,
}

impl PlayerItem {
    /// Duration of the underlying asset or composition, when known.
    pub fn duration(&self) -> Option<Duration> {
        match &self.source {
            ItemSource::Asset(asset) => asset.duration,
            ItemSource::Composition(composition) => Some(composition.duration()),
        }
    }
}

/// Whether the engine is playing, paused, or waiting (buffering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeControlStatus {
    Paused,
    WaitingToPlay,
    Playing,
}

/// Readiness of the engine's current item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    ReadyToPlay,
    Failed(String),
}

/// Acceptable distance from a seek target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekTolerance {
    pub before: Duration,
    pub after: Duration,
}

impl SeekTolerance {
    /// Frame-exact seek.
    pub const EXACT: SeekTolerance = SeekTolerance {
        before: Duration::ZERO,
        after: Duration::ZERO,
    };

    /// May land up to `before` ahead of the target, never past it.
    pub fn before_only(before: Duration) -> Self {
        Self {
            before,
            after: Duration::ZERO,
        }
    }
}

/// Asynchronous notifications emitted by a [`MediaEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    ItemStatusChanged { item: ItemId, status: ItemStatus },
    ItemDidPlayToEnd { item: ItemId },
    TimeControlStatusChanged { status: TimeControlStatus, rate: f32 },
}

/// Callback the core installs on each engine.
pub type SignalHandler = Arc<dyn Fn(EngineSignal) + Send + Sync>;

/// Host playback engine surface.
///
/// Control calls are expected to return immediately; only [`seek`] suspends.
///
/// [`seek`]: MediaEngine::seek
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Install the callback that receives [`EngineSignal`]s. Replaces any
    /// previously installed handler.
    fn set_signal_handler(&self, handler: SignalHandler);

    /// Replace the current item. `None` clears the engine.
    fn replace_current_item(&self, item: Option<PlayerItem>) -> Result<()>;

    fn current_item(&self) -> Option<ItemId>;

    fn play(&self);

    fn pause(&self);

    fn rate(&self) -> f32;

    fn set_rate(&self, rate: f32);

    fn current_time(&self) -> Option<Duration>;

    fn time_control_status(&self) -> TimeControlStatus;

    /// Seek the current item. Resolves to `true` when the seek finished, or
    /// `false` when it was interrupted (e.g. by another seek or an item change).
    async fn seek(&self, to: Duration, tolerance: SeekTolerance) -> bool;

    /// Enable or disable visual tracks of the current item (music mode).
    fn set_visual_tracks_enabled(&self, _enabled: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://media.example.com/{}", path)).unwrap()
    }

    #[test]
    fn first_track_picks_matching_media_type() {
        let asset = LoadedAsset::new(url("muxed.mp4"))
            .with_track(MediaType::Video, 1)
            .with_track(MediaType::Audio, 2)
            .with_track(MediaType::Audio, 3);

        assert_eq!(asset.first_track(MediaType::Audio).unwrap().track_id, 2);
        assert!(asset.first_track(MediaType::Subtitle).is_none());
    }

    #[test]
    fn report_status_defaults_to_unknown() {
        let report = AssetLoadReport::loaded(
            LoadedAsset::new(url("a.mp4")),
            &[AssetProperty::Tracks, AssetProperty::Playable],
        )
        .with_status(
            AssetProperty::Playable,
            PropertyStatus::Failed("drm".to_string()),
        );

        assert_eq!(report.status(AssetProperty::Tracks), PropertyStatus::Loaded);
        assert_eq!(
            report.status(AssetProperty::Playable),
            PropertyStatus::Failed("drm".to_string())
        );
        assert_eq!(report.status(AssetProperty::Duration), PropertyStatus::Unknown);
    }

    #[test]
    fn composition_duration_is_longest_track() {
        let composition = Composition {
            tracks: vec![
                CompositionTrack {
                    media_type: MediaType::Audio,
                    source: url("audio.m4a"),
                    source_track_id: 1,
                    source_range: TimeRange::new(Duration::ZERO, Duration::from_secs(60)),
                    insert_at: Duration::ZERO,
                },
                CompositionTrack {
                    media_type: MediaType::Video,
                    source: url("video.mp4"),
                    source_track_id: 1,
                    source_range: TimeRange::new(Duration::ZERO, Duration::from_secs(61)),
                    insert_at: Duration::ZERO,
                },
            ],
        };

        assert_eq!(composition.duration(), Duration::from_secs(61));
        assert!(composition.track(MediaType::Video).is_some());
        assert_eq!(Composition::default().duration(), Duration::ZERO);
    }

    #[test]
    fn before_only_tolerance_never_overshoots() {
        let tolerance = SeekTolerance::before_only(Duration::from_secs(1));
        assert_eq!(tolerance.after, Duration::ZERO);
        assert_eq!(tolerance.before, Duration::from_secs(1));
        assert_eq!(SeekTolerance::EXACT.before, Duration::ZERO);
    }
}
