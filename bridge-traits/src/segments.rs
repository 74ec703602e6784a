//! Skip-segment metadata bridge.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A time range eligible for automatic seek-past (sponsor, intro, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipSegment {
    /// Provider-assigned identifier.
    pub id: String,
    /// Free-form category, e.g. `"sponsor"` or `"intro"`.
    pub category: String,
    pub start: Duration,
    pub end: Duration,
}

impl SkipSegment {
    pub fn new(id: impl Into<String>, start: Duration, end: Duration) -> Self {
        Self {
            id: id.into(),
            category: "sponsor".to_string(),
            start,
            end,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn contains(&self, position: Duration) -> bool {
        position >= self.start && position < self.end
    }
}

/// Read-only supplier of ordered skip segments for a video.
#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// Segments for `video_id`, ordered by start time.
    async fn segments(&self, video_id: &str) -> Result<Vec<SkipSegment>>;
}
