//! # Picture-in-Picture Controller
//!
//! Coordinates the system floating-video facility with the player.
//!
//! The capability rarely reports itself possible right after an item change
//! or backend switch, so a start request schedules a series of attempts at
//! fixed offsets from the request (0.1 s up to 5 s by default). Each attempt
//! arrives back at the owner loop as a message; the first one that finds the
//! capability possible calls `start()` once and every later attempt of that
//! sequence becomes a no-op. When the schedule runs out the request is simply
//! abandoned.

use bridge_traits::{PipCapability, PipLifecycle};
use core_runtime::events::PipEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Delay before hiding the player after PiP opened.
pub const HIDE_PLAYER_DELAY: Duration = Duration::from_millis(100);

/// Observable PiP flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipStatus {
    /// The system reported did-start and no did-stop since.
    pub active: bool,
    /// A start sequence or system transition is under way.
    pub transitioning: bool,
    /// Start as soon as the loading item reports ready.
    pub start_on_play: bool,
    /// Start once the backend switch to the hardware engine is ready.
    pub start_on_switch: bool,
}

/// Result of one scheduled attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Superseded sequence, or the session already opened.
    Stale,
    Started,
    NotPossible,
    /// Last attempt of the schedule found the capability unavailable.
    Exhausted { attempts: usize },
}

pub struct PipController {
    capability: Option<Arc<dyn PipCapability>>,
    delays: Vec<Duration>,
    sequence: u64,
    opened: bool,
    schedule: Option<JoinHandle<()>>,
    status: PipStatus,
}

impl PipController {
    pub fn new(capability: Option<Arc<dyn PipCapability>>, delays: Vec<Duration>) -> Self {
        Self {
            capability,
            delays,
            sequence: 0,
            opened: false,
            schedule: None,
            status: PipStatus::default(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.capability.is_some()
    }

    pub fn status(&self) -> PipStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status.active
    }

    pub fn is_transitioning(&self) -> bool {
        self.status.transitioning
    }

    pub fn defer_until_play(&mut self) {
        self.status.start_on_play = true;
    }

    pub fn defer_until_switch(&mut self) {
        self.status.start_on_switch = true;
    }

    /// Takes the pending start flags, returning whether one was set.
    pub fn take_pending_start(&mut self) -> bool {
        let pending = self.status.start_on_play || self.status.start_on_switch;
        self.status.start_on_play = false;
        self.status.start_on_switch = false;
        pending
    }

    /// Starts a new attempt sequence. `notify(sequence, index)` runs on the
    /// timer task at each scheduled offset and should forward to the owner.
    pub fn try_start<F>(&mut self, notify: F) -> Option<u64>
    where
        F: Fn(u64, usize) -> bool + Send + 'static,
    {
        if !self.is_supported() {
            debug!("picture-in-picture requested without capability");
            return None;
        }

        self.cancel_attempts();
        self.sequence += 1;
        self.opened = false;
        self.status.transitioning = true;

        let sequence = self.sequence;
        let offsets = self.delays.clone();
        debug!(sequence, attempts = offsets.len(), "scheduling picture-in-picture attempts");

        self.schedule = Some(tokio::spawn(async move {
            let requested = Instant::now();
            for (index, offset) in offsets.into_iter().enumerate() {
                tokio::time::sleep_until(requested + offset).await;
                if !notify(sequence, index) {
                    break;
                }
            }
        }));
        Some(sequence)
    }

    /// Runs attempt `index` of `sequence`.
    pub fn on_attempt(&mut self, sequence: u64, index: usize) -> AttemptOutcome {
        if sequence != self.sequence || self.opened {
            return AttemptOutcome::Stale;
        }
        let Some(capability) = self.capability.as_ref() else {
            return AttemptOutcome::Stale;
        };

        if capability.is_possible() {
            self.opened = true;
            info!(sequence, attempt = index + 1, "starting picture-in-picture");
            capability.start();
            self.abort_schedule();
            return AttemptOutcome::Started;
        }

        let waited = self.delays.get(index).copied().unwrap_or_default();
        debug!(sequence, ?waited, "picture-in-picture not possible yet");

        if index + 1 >= self.delays.len() {
            warn!(sequence, attempts = self.delays.len(), "picture-in-picture never became possible");
            self.status.transitioning = false;
            self.schedule = None;
            return AttemptOutcome::Exhausted {
                attempts: self.delays.len(),
            };
        }
        AttemptOutcome::NotPossible
    }

    /// Cancels the in-flight sequence; queued attempts become stale.
    pub fn cancel_attempts(&mut self) {
        if self.schedule.is_some() {
            self.abort_schedule();
            self.sequence += 1;
            if !self.status.active {
                self.status.transitioning = false;
            }
        }
    }

    fn abort_schedule(&mut self) {
        if let Some(schedule) = self.schedule.take() {
            schedule.abort();
        }
    }

    /// Asks the system to leave PiP.
    pub fn stop(&mut self) {
        self.cancel_attempts();
        self.status.start_on_play = false;
        self.status.start_on_switch = false;
        if self.status.active {
            if let Some(capability) = &self.capability {
                capability.stop();
            }
        }
    }

    /// Folds a lifecycle callback into the flags, returning the event to publish.
    pub fn on_lifecycle(&mut self, lifecycle: PipLifecycle) -> Option<PipEvent> {
        match lifecycle {
            PipLifecycle::WillStart => {
                self.status.transitioning = true;
                None
            }
            PipLifecycle::DidStart => {
                self.status.active = true;
                self.status.transitioning = false;
                self.status.start_on_play = false;
                self.status.start_on_switch = false;
                self.opened = true;
                self.abort_schedule();
                Some(PipEvent::Started)
            }
            PipLifecycle::WillStop => None,
            PipLifecycle::DidStop => {
                self.status.active = false;
                self.status.transitioning = false;
                self.opened = false;
                Some(PipEvent::Stopped)
            }
            PipLifecycle::FailedToStart { message } => {
                warn!(%message, "picture-in-picture failed to start");
                self.status.transitioning = false;
                self.opened = false;
                Some(PipEvent::FailedToStart { message })
            }
        }
    }

    /// Marks PiP as closed after the user interface was restored.
    pub fn finish_restore(&mut self) {
        self.status.active = false;
        self.status.transitioning = false;
    }
}

impl Drop for PipController {
    fn drop(&mut self) {
        self.abort_schedule();
    }
}

/// How long to wait before answering a restore-user-interface request.
///
/// An item that was cleared during PiP waits longest, a hidden player a bit
/// less, a visible player not at all.
pub fn restore_delay(has_item: bool, presenting: bool) -> Duration {
    if !has_item {
        Duration::from_secs(1)
    } else if !presenting {
        Duration::from_millis(500)
    } else {
        Duration::ZERO
    }
}
