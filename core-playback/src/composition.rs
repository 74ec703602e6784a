//! # Composition Assembler
//!
//! Merges an independently loaded audio asset and video asset into one
//! [`Composition`] sharing a single timeline.
//!
//! Both loads run concurrently. Each completion extracts the first track of
//! its media type and inserts it at offset zero with its length clamped to the
//! caller's [`Video::duration`](crate::model::Video), so audio and video stay
//! aligned even when container metadata disagrees. The composition is ready
//! only once both tracks are present for the same generation.

use crate::error::{PlaybackError, Result};
use crate::intent::Generation;
use crate::loader::load_asset;
use bridge_traits::{AssetSource, Composition, CompositionTrack, LoadedAsset, MediaType, TimeRange};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Media types a composition needs before it is ready.
const REQUIRED_MEDIA_TYPES: [MediaType; 2] = [MediaType::Audio, MediaType::Video];

/// Builds the composition track for `media_type` out of `asset`.
///
/// The inserted range is `[0, clamp)` where `clamp` is the video's declared
/// length, falling back to the asset's own duration when the video has none.
pub fn extract_track(
    asset: &LoadedAsset,
    media_type: MediaType,
    clamp: Duration,
) -> Result<CompositionTrack> {
    let track = asset
        .first_track(media_type)
        .ok_or(PlaybackError::MissingTrack(media_type))?;

    let length = if clamp.is_zero() {
        asset.duration.unwrap_or_default()
    } else {
        clamp
    };

    Ok(CompositionTrack {
        media_type,
        source: asset.url.clone(),
        source_track_id: track.track_id,
        source_range: TimeRange::new(Duration::ZERO, length),
        insert_at: Duration::ZERO,
    })
}

/// Progress of a composition after a track arrives.
#[derive(Debug, PartialEq)]
pub enum BuildProgress {
    /// The track belongs to a superseded build and was dropped.
    Stale,
    /// Still waiting for the other track.
    Pending,
    Ready(Composition),
}

/// Accumulator of loaded tracks for the in-flight composition.
#[derive(Debug, Default)]
pub struct CompositionBuildState {
    generation: Option<Generation>,
    tracks: Vec<CompositionTrack>,
}

impl CompositionBuildState {
    /// Empties the accumulator and binds it to `generation`.
    pub fn reset(&mut self, generation: Generation) {
        self.generation = Some(generation);
        self.tracks.clear();
    }

    /// Drops the accumulator without binding it to anything.
    pub fn discard(&mut self) {
        self.generation = None;
        self.tracks.clear();
    }

    pub fn is_building_for(&self, generation: Generation) -> bool {
        self.generation == Some(generation)
    }

    pub fn loaded_media_types(&self) -> Vec<MediaType> {
        self.tracks.iter().map(|t| t.media_type).collect()
    }

    /// Adds `track` and reports whether the composition is complete.
    pub fn record(&mut self, generation: Generation, track: CompositionTrack) -> BuildProgress {
        if !self.is_building_for(generation) {
            return BuildProgress::Stale;
        }

        self.tracks.retain(|t| t.media_type != track.media_type);
        self.tracks.push(track);

        let complete = REQUIRED_MEDIA_TYPES
            .iter()
            .all(|m| self.tracks.iter().any(|t| t.media_type == *m));
        if !complete {
            return BuildProgress::Pending;
        }

        self.generation = None;
        BuildProgress::Ready(Composition {
            tracks: std::mem::take(&mut self.tracks),
        })
    }
}

/// What the owner loop should do after a track completion.
#[derive(Debug)]
pub enum AssemblyOutcome {
    Stale,
    Pending,
    Ready(Composition),
    Failed(PlaybackError),
}

/// Runs the two track loads and owns the build state.
pub struct CompositionAssembler {
    source: Arc<dyn AssetSource>,
    tasks: Vec<JoinHandle<()>>,
    state: CompositionBuildState,
}

impl CompositionAssembler {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            tasks: Vec::new(),
            state: CompositionBuildState::default(),
        }
    }

    /// Starts loading both assets for `generation`.
    ///
    /// `on_track` is called once per media type from the load tasks and should
    /// only forward the result to the owner loop.
    pub fn assemble<F>(
        &mut self,
        generation: Generation,
        audio: Url,
        video: Url,
        clamp: Duration,
        on_track: F,
    ) where
        F: Fn(Generation, MediaType, Result<CompositionTrack>) + Clone + Send + 'static,
    {
        self.cancel();
        self.state.reset(generation);

        info!(
            %generation,
            audio = %redact_url(&audio),
            video = %redact_url(&video),
            "assembling composition"
        );

        for (media_type, url) in [(MediaType::Audio, audio), (MediaType::Video, video)] {
            let source = Arc::clone(&self.source);
            let on_track = on_track.clone();
            self.tasks.push(tokio::spawn(async move {
                let result = load_asset(source.as_ref(), &url)
                    .await
                    .and_then(|asset| extract_track(&asset, media_type, clamp));
                on_track(generation, media_type, result);
            }));
        }
    }

    /// Folds one track completion into the build state.
    pub fn on_track_loaded(
        &mut self,
        generation: Generation,
        media_type: MediaType,
        result: Result<CompositionTrack>,
    ) -> AssemblyOutcome {
        if !self.state.is_building_for(generation) {
            debug!(%generation, %media_type, "ignoring track for superseded composition");
            return AssemblyOutcome::Stale;
        }

        match result {
            Ok(track) => match self.state.record(generation, track) {
                BuildProgress::Stale => AssemblyOutcome::Stale,
                BuildProgress::Pending => {
                    debug!(%generation, %media_type, "composition track loaded, waiting for the other");
                    AssemblyOutcome::Pending
                }
                BuildProgress::Ready(composition) => {
                    info!(%generation, duration = ?composition.duration(), "composition ready");
                    self.tasks.clear();
                    AssemblyOutcome::Ready(composition)
                }
            },
            Err(err) => {
                warn!(%generation, %media_type, error = %err, "composition track failed");
                self.cancel();
                AssemblyOutcome::Failed(err.into_load_failure())
            }
        }
    }

    /// Aborts both loads and discards the accumulator.
    pub fn cancel(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.state.discard();
    }

    pub fn state(&self) -> &CompositionBuildState {
        &self.state
    }
}

impl Drop for CompositionAssembler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(name: &str) -> Url {
        Url::parse(&format!("https://cdn.example.com/{}", name)).unwrap()
    }

    fn track(media_type: MediaType) -> CompositionTrack {
        CompositionTrack {
            media_type,
            source: url("x"),
            source_track_id: 1,
            source_range: TimeRange::new(Duration::ZERO, Duration::from_secs(30)),
            insert_at: Duration::ZERO,
        }
    }

    #[test]
    fn extract_track_clamps_to_video_length() {
        let asset = LoadedAsset::new(url("v.mp4"))
            .with_duration(Duration::from_secs(31))
            .with_track(MediaType::Video, 4);

        let track = extract_track(&asset, MediaType::Video, Duration::from_secs(30)).unwrap();
        assert_eq!(track.source_track_id, 4);
        assert_eq!(track.source_range.duration, Duration::from_secs(30));
        assert_eq!(track.insert_at, Duration::ZERO);

        let unclamped = extract_track(&asset, MediaType::Video, Duration::ZERO).unwrap();
        assert_eq!(unclamped.source_range.duration, Duration::from_secs(31));
    }

    #[test]
    fn extract_track_requires_matching_media_type() {
        let asset = LoadedAsset::new(url("a.m4a")).with_track(MediaType::Audio, 1);
        assert!(matches!(
            extract_track(&asset, MediaType::Video, Duration::from_secs(1)),
            Err(PlaybackError::MissingTrack(MediaType::Video))
        ));
    }

    #[test]
    fn single_track_never_completes() {
        let mut state = CompositionBuildState::default();
        state.reset(Generation(1));

        assert_eq!(state.record(Generation(1), track(MediaType::Audio)), BuildProgress::Pending);
        // A duplicate audio completion does not count as the video track.
        assert_eq!(state.record(Generation(1), track(MediaType::Audio)), BuildProgress::Pending);
        assert_eq!(state.loaded_media_types(), vec![MediaType::Audio]);
    }

    #[test]
    fn both_tracks_for_same_generation_complete() {
        let mut state = CompositionBuildState::default();
        state.reset(Generation(2));

        state.record(Generation(2), track(MediaType::Video));
        match state.record(Generation(2), track(MediaType::Audio)) {
            BuildProgress::Ready(composition) => {
                assert!(composition.track(MediaType::Audio).is_some());
                assert!(composition.track(MediaType::Video).is_some());
                assert_eq!(composition.duration(), Duration::from_secs(30));
            }
            other => panic!("expected ready, got {:?}", other),
        }
        assert!(!state.is_building_for(Generation(2)));
    }

    #[test]
    fn tracks_from_another_generation_are_stale() {
        let mut state = CompositionBuildState::default();
        state.reset(Generation(1));
        state.record(Generation(1), track(MediaType::Audio));

        state.reset(Generation(2));
        assert_eq!(state.record(Generation(1), track(MediaType::Video)), BuildProgress::Stale);
        assert!(state.loaded_media_types().is_empty());
    }
}
