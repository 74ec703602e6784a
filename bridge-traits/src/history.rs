//! Watch-history persistence bridge.
//!
//! The on-disk format is owned by the host. The core only reads and upserts
//! [`WatchRecord`]s keyed by video id.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted watch progress for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchRecord {
    pub video_id: String,
    /// Last recorded position, in seconds.
    pub stopped_at: f64,
    /// Item duration, in seconds (0 when never known).
    pub duration: f64,
    pub finished: bool,
    pub watched_at: DateTime<Utc>,
}

impl WatchRecord {
    pub fn new(video_id: impl Into<String>, watched_at: DateTime<Utc>) -> Self {
        Self {
            video_id: video_id.into(),
            stopped_at: 0.0,
            duration: 0.0,
            finished: false,
            watched_at,
        }
    }

    /// Fraction watched in `0.0..=1.0`, or `None` without a duration.
    pub fn progress(&self) -> Option<f64> {
        if self.duration > 0.0 {
            Some((self.stopped_at / self.duration).clamp(0.0, 1.0))
        } else {
            None
        }
    }
}

/// Host store for [`WatchRecord`]s.
#[async_trait]
pub trait WatchStore: Send + Sync {
    /// Fetch the record for `video_id`.
    async fn fetch_record(&self, video_id: &str) -> Result<Option<WatchRecord>>;

    /// Insert or replace the record with the same video id.
    async fn record_progress(&self, record: WatchRecord) -> Result<()>;

    async fn delete_record(&self, video_id: &str) -> Result<()>;

    async fn delete_all(&self) -> Result<()>;

    /// Last stopped position of an unfinished record, in seconds.
    async fn fetch_last_position(&self, video_id: &str) -> Result<Option<f64>> {
        Ok(self
            .fetch_record(video_id)
            .await?
            .filter(|r| !r.finished)
            .map(|r| r.stopped_at))
    }
}
