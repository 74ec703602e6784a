//! Video and stream descriptors handed to the player by the caller.
//!
//! Both are immutable values. The player keeps a clone for the lifetime of the
//! playback intent that selected them.

use bridge_traits::ItemMetadata;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// A video as fetched by the caller's API client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub genre: Option<String>,
    /// Length reported by the API; compositions are clamped to it.
    pub duration: Duration,
    pub thumbnail: Option<Url>,
    /// Live (unbounded) streams reject seeks.
    pub live: bool,
}

impl Video {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            genre: None,
            duration,
            thumbnail: None,
            live: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_thumbnail(mut self, url: Url) -> Self {
        self.thumbnail = Some(url);
        self
    }

    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }

    /// Metadata attached to every player item built for this video.
    pub fn item_metadata(&self) -> ItemMetadata {
        ItemMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            genre: self.genre.clone(),
            artwork_url: self.thumbnail.clone(),
        }
    }
}

/// How a stream is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Separate audio and video assets (DASH-style).
    Adaptive,
    /// Progressive muxed stream.
    Stream,
    Hls,
}

/// Container format of the stream's assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Mp4,
    Webm,
    Av1,
    Hls,
    Unknown,
}

/// Vertical resolution in lines, e.g. `Resolution(1080)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Resolution(pub u32);

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.0)
    }
}

/// Where the stream's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamAssets {
    /// One muxed (or HLS) asset.
    Single { url: Url },
    /// Independent audio and video assets merged into a composition.
    Separate { audio: Url, video: Url },
}

/// One playable option for a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stream {
    pub kind: StreamKind,
    pub resolution: Resolution,
    pub format: ContainerFormat,
    pub assets: StreamAssets,
}

impl Stream {
    pub fn single(kind: StreamKind, resolution: Resolution, format: ContainerFormat, url: Url) -> Self {
        Self {
            kind,
            resolution,
            format,
            assets: StreamAssets::Single { url },
        }
    }

    pub fn separate(resolution: Resolution, format: ContainerFormat, audio: Url, video: Url) -> Self {
        Self {
            kind: StreamKind::Adaptive,
            resolution,
            format,
            assets: StreamAssets::Separate { audio, video },
        }
    }

    pub fn hls(url: Url) -> Self {
        Self::single(StreamKind::Hls, Resolution(0), ContainerFormat::Hls, url)
    }

    pub fn single_asset_url(&self) -> Option<&Url> {
        match &self.assets {
            StreamAssets::Single { url } => Some(url),
            StreamAssets::Separate { .. } => None,
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {} {:?}", self.kind, self.resolution, self.format)
    }
}
