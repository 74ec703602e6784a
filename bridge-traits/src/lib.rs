//! # Host Bridge Traits
//!
//! Capabilities the playback core needs but each host platform implements
//! differently.
//!
//! ## Traits
//!
//! ### Media
//! - [`MediaEngine`](media::MediaEngine) - A concrete playback engine (hardware-accelerated or alternate decoder)
//! - [`AssetSource`](media::AssetSource) - Resolves stream URLs into loaded assets
//! - [`PipCapability`](pip::PipCapability) - System picture-in-picture facility
//!
//! ### Collaborators
//! - [`WatchStore`](history::WatchStore) - Watch-history persistence
//! - [`SegmentSource`](segments::SegmentSource) - Skip-segment metadata
//! - [`NowPlayingSink`](host::NowPlayingSink) - Now-playing center updates
//! - [`ScreenSaverControl`](host::ScreenSaverControl) - Display-sleep suppression
//! - [`PresentationHost`](host::PresentationHost) - Player UI visibility
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Wall-clock source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Threading
//!
//! Every trait requires `Send + Sync`. Engines and PiP capabilities may invoke
//! their callbacks from any thread; the core funnels them back onto its single
//! owner task before touching playback state.
//!
//! ## Error Handling
//!
//! Fallible bridge calls return [`BridgeError`](error::BridgeError). Hosts
//! should convert platform errors into it with an actionable message.

pub mod error;
pub mod history;
pub mod host;
pub mod media;
pub mod pip;
pub mod segments;
pub mod time;

pub use error::BridgeError;

pub use history::{WatchRecord, WatchStore};
pub use host::{NowPlayingInfo, NowPlayingSink, PresentationHost, ScreenSaverControl};
pub use media::{
    AssetLoadReport, AssetProperty, AssetSource, AssetTrack, BackendKind, Composition,
    CompositionTrack, EngineSignal, ItemId, ItemMetadata, ItemSource, ItemStatus, LoadedAsset,
    MediaEngine, MediaType, PlayerItem, PropertyStatus, SeekTolerance, SignalHandler,
    TimeControlStatus, TimeRange, REQUIRED_ASSET_PROPERTIES,
};
pub use pip::{PipCapability, PipLifecycle};
pub use segments::{SegmentSource, SkipSegment};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
