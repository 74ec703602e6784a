//! # Watch-Progress Reporter
//!
//! Turns position samples into [`WatchRecord`] upserts.
//!
//! Samples from the infrequent sampler and the time-control observer pass a
//! leading-edge [`Throttle`], so at most one write lands per throttle window.
//! End-of-item and close bypass the throttle. Writes run one at a time on a
//! dedicated task so a slow store never blocks the owner loop and two writes
//! for the same video never interleave.
//!
//! ## Write policy
//!
//! - No record exists and the position is below the minimum: skip.
//! - The record is finished and re-watching does not reset it: skip.
//! - `finished` forces `stopped_at` to the full duration.
//! - Otherwise a positive position becomes `stopped_at`.

use bridge_traits::{Clock, WatchRecord, WatchStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Leading-edge throttle: the first call of each window passes.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// One observation of the current item's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSample {
    pub video_id: String,
    pub position: Option<Duration>,
    /// Duration of the loaded item, when known.
    pub duration: Option<Duration>,
    pub finished: bool,
}

/// Policy knobs for [`apply_policy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchPolicy {
    pub min_watch_seconds: f64,
    pub reset_watched_status_on_playing: bool,
}

/// Computes the record to write for `sample`, or `None` to skip the write.
pub fn apply_policy(
    existing: Option<WatchRecord>,
    sample: &WatchSample,
    policy: WatchPolicy,
    now: DateTime<Utc>,
) -> Option<WatchRecord> {
    let seconds = sample.position.map(|p| p.as_secs_f64()).unwrap_or(0.0);

    let mut record = match existing {
        None if seconds < policy.min_watch_seconds && !sample.finished => return None,
        None => WatchRecord::new(sample.video_id.clone(), now),
        Some(record) if record.finished && !policy.reset_watched_status_on_playing => return None,
        Some(record) => record,
    };

    if let Some(duration) = sample.duration {
        record.duration = duration.as_secs_f64();
    }

    if sample.finished {
        // A finish without any known duration has no meaningful stop point.
        if record.duration <= 0.0 {
            return None;
        }
        record.stopped_at = record.duration;
        record.finished = true;
    } else {
        if seconds.is_finite() && seconds > 0.0 {
            record.stopped_at = seconds;
        }
        record.finished = false;
    }

    record.watched_at = now;
    Some(record)
}

/// Throttled, sequential writer of watch progress.
pub struct WatchReporter {
    throttle: Throttle,
    enabled: bool,
    writes: Option<mpsc::UnboundedSender<WatchSample>>,
    writer: Option<JoinHandle<()>>,
}

impl WatchReporter {
    /// Starts the writer task. Without a store, or with history disabled,
    /// every sample is dropped.
    pub fn spawn(
        store: Option<Arc<dyn WatchStore>>,
        clock: Arc<dyn Clock>,
        policy: WatchPolicy,
        throttle: Duration,
        enabled: bool,
    ) -> Self {
        let (writes, writer) = match store {
            Some(store) if enabled => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Some(tx), Some(tokio::spawn(run_writer(store, clock, policy, rx))))
            }
            _ => (None, None),
        };

        Self {
            throttle: Throttle::new(throttle),
            enabled,
            writes,
            writer,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.writes.is_some()
    }

    /// Submits a sample through the throttle. Returns whether it was queued.
    pub fn sample(&mut self, sample: WatchSample) -> bool {
        if !self.is_enabled() || !self.throttle.try_acquire(Instant::now()) {
            return false;
        }
        self.enqueue(sample)
    }

    /// Submits a sample bypassing the throttle (item end, close).
    pub fn force(&mut self, sample: WatchSample) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.enqueue(sample)
    }

    /// Starts a fresh throttle window for a new item.
    pub fn reset_throttle(&mut self) {
        self.throttle.reset();
    }

    fn enqueue(&self, sample: WatchSample) -> bool {
        match &self.writes {
            Some(tx) => tx.send(sample).is_ok(),
            None => false,
        }
    }

    /// Stops accepting samples and waits for queued writes to land.
    pub async fn close(&mut self) {
        self.writes.take();
        if let Some(writer) = self.writer.take() {
            if let Err(err) = writer.await {
                warn!(error = %err, "watch writer task ended abnormally");
            }
        }
    }
}

impl Drop for WatchReporter {
    fn drop(&mut self) {
        // Dropping the sender lets the writer drain and exit on its own.
        self.writes.take();
    }
}

async fn run_writer(
    store: Arc<dyn WatchStore>,
    clock: Arc<dyn Clock>,
    policy: WatchPolicy,
    mut rx: mpsc::UnboundedReceiver<WatchSample>,
) {
    while let Some(sample) = rx.recv().await {
        let existing = match store.fetch_record(&sample.video_id).await {
            Ok(existing) => existing,
            Err(err) => {
                warn!(video_id = %sample.video_id, error = %err, "failed to read watch record");
                continue;
            }
        };

        let Some(record) = apply_policy(existing, &sample, policy, clock.now()) else {
            debug!(video_id = %sample.video_id, "watch sample skipped by policy");
            continue;
        };

        debug!(
            video_id = %record.video_id,
            stopped_at = record.stopped_at,
            finished = record.finished,
            "recording watch progress"
        );
        if let Err(err) = store.record_progress(record).await {
            warn!(video_id = %sample.video_id, error = %err, "failed to record watch progress");
        }
    }
}
