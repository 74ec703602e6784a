//! # Event Bus System
//!
//! Observer notifications for the playback core, carried over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The player never renders anything itself. Transport controls, now-playing
//! metadata, buffering indicators and the PiP button all learn about playback
//! through [`CoreEvent`]s published on an [`EventBus`]:
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐    subscribe    ┌───────────────────┐
//! │  PlayerCore  ├──────────────>│           ├────────────────>│ transport controls│
//! └──────────────┘               │ EventBus  │                 └───────────────────┘
//! ┌──────────────┐     emit      │ (broadcast│    subscribe    ┌───────────────────┐
//! │ PiP control  ├──────────────>│  channel) ├────────────────>│ buffering overlay │
//! └──────────────┘               └───────────┘                 └───────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::ItemEnded {
//!     video_id: "dQw4w9WgXcQ".to_string(),
//! }))
//! .ok();
//!
//! assert!(matches!(rx.recv().await, Ok(CoreEvent::Playback(_))));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - `RecvError::Lagged(n)`: the subscriber missed `n` events. Non-fatal;
//!   playback observers should re-read the player snapshot and carry on.
//! - `RecvError::Closed`: the player shut down.

use bridge_traits::media::{BackendKind, TimeControlStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// The frequent sampler publishes roughly twice a second, so 100 events cover
/// close to a minute of a stalled subscriber.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Playback state
// ============================================================================

/// Observable lifecycle state of the player.
///
/// `idle → loading → ready → playing ⇄ paused → ended`, with `failed`
/// reachable from `loading` and `ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Failed { message: String },
}

impl PlaybackState {
    /// Whether an item is attached to the active engine in this state.
    pub fn has_item(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Ended
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PlaybackState::Failed { .. })
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the [`EventBus`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    PictureInPicture(PipEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::PictureInPicture(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::ItemFailed { .. }) => EventSeverity::Error,
            CoreEvent::PictureInPicture(PipEvent::FailedToStart { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::ItemReady { .. })
            | CoreEvent::Playback(PlaybackEvent::ItemEnded { .. })
            | CoreEvent::Playback(PlaybackEvent::BackendSwitched { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events describing the player and its current item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },
    TimeControlStatusChanged {
        status: TimeControlStatus,
    },
    /// Buffering indicator should be shown (`waiting = true`) or hidden.
    Buffering {
        waiting: bool,
    },
    ItemReady {
        video_id: String,
        generation: u64,
    },
    /// Terminal failure for the current selection. `message` is user-facing.
    ItemFailed {
        video_id: Option<String>,
        message: String,
    },
    ItemEnded {
        video_id: String,
    },
    /// Now-playing info (lock screen, title bar) should be refreshed.
    NowPlayingRefresh {
        video_id: String,
        position_ms: u64,
        duration_ms: Option<u64>,
    },
    SegmentSkipped {
        video_id: String,
        segment_id: String,
        from_ms: u64,
        to_ms: u64,
    },
    RateChanged {
        rate: f32,
    },
    BackendSwitched {
        from: BackendKind,
        to: BackendKind,
    },
    /// The end-of-playback action asks the queue owner for the next item.
    AdvanceRequested {
        video_id: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::TimeControlStatusChanged { .. } => "Time control status changed",
            PlaybackEvent::Buffering { .. } => "Buffering state changed",
            PlaybackEvent::ItemReady { .. } => "Item ready",
            PlaybackEvent::ItemFailed { .. } => "Item failed",
            PlaybackEvent::ItemEnded { .. } => "Item ended",
            PlaybackEvent::NowPlayingRefresh { .. } => "Now-playing info refresh",
            PlaybackEvent::SegmentSkipped { .. } => "Segment skipped",
            PlaybackEvent::RateChanged { .. } => "Playback rate changed",
            PlaybackEvent::BackendSwitched { .. } => "Playback backend switched",
            PlaybackEvent::AdvanceRequested { .. } => "Queue advance requested",
        }
    }
}

// ============================================================================
// Picture-in-Picture Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PipEvent {
    Started,
    Stopped,
    FailedToStart { message: String },
    /// Every scheduled start attempt ran without the capability becoming possible.
    AttemptsExhausted { attempts: usize },
}

impl PipEvent {
    fn description(&self) -> &str {
        match self {
            PipEvent::Started => "Picture-in-picture started",
            PipEvent::Stopped => "Picture-in-picture stopped",
            PipEvent::FailedToStart { .. } => "Picture-in-picture failed to start",
            PipEvent::AttemptsExhausted { .. } => "Picture-in-picture attempts exhausted",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
///
/// Cloning the bus clones the sender; every [`subscribe`](EventBus::subscribe)
/// creates an independent receiver that sees events emitted afterwards.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event. Errors only when nobody is subscribed, which
    /// publishers are expected to ignore.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate, e.g. to follow only
/// PiP events or only state changes.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Receives the next event passing the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](EventStream::recv). `None` when no
    /// matching event is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
