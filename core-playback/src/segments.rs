//! # Segment-Skip Evaluator
//!
//! Decides when to seek past a leading skip segment (sponsor, intro).
//!
//! Only the first segment of a video is ever skipped automatically, and only
//! when it starts within the threshold of the item start. The marker lives
//! per generation: a restart of the same video gets a fresh evaluator state.
//! Generations that carry a preserved position over from a backend switch
//! never skip.

use crate::intent::Generation;
use bridge_traits::SkipSegment;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug)]
pub struct SegmentSkipEvaluator {
    threshold: Duration,
    generation: Option<Generation>,
    segments: Vec<SkipSegment>,
    preserving_time: bool,
    /// Seek to the segment end is in flight.
    pending: bool,
    skipped: bool,
}

impl SegmentSkipEvaluator {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            generation: None,
            segments: Vec::new(),
            preserving_time: false,
            pending: false,
            skipped: false,
        }
    }

    /// Forgets everything and binds to `generation`.
    pub fn reset(&mut self, generation: Generation, preserving_time: bool) {
        self.generation = Some(generation);
        self.segments.clear();
        self.preserving_time = preserving_time;
        self.pending = false;
        self.skipped = false;
    }

    pub fn clear(&mut self) {
        self.generation = None;
        self.segments.clear();
        self.preserving_time = false;
        self.pending = false;
        self.skipped = false;
    }

    /// Installs the fetched segments. Returns `false` for a stale fetch.
    pub fn set_segments(&mut self, generation: Generation, mut segments: Vec<SkipSegment>) -> bool {
        if self.generation != Some(generation) {
            return false;
        }
        segments.sort_by_key(|s| s.start);
        debug!(%generation, count = segments.len(), "skip segments loaded");
        self.segments = segments;
        true
    }

    pub fn segments(&self) -> &[SkipSegment] {
        &self.segments
    }

    /// The leading segment to skip at `position`, if one qualifies.
    pub fn evaluate(&self, generation: Generation, position: Duration) -> Option<&SkipSegment> {
        if self.generation != Some(generation) || self.preserving_time || self.pending || self.skipped {
            return None;
        }

        let first = self.segments.first()?;
        if first.start >= self.threshold || position >= first.end {
            trace!(%generation, segment = %first.id, "leading segment does not qualify");
            return None;
        }
        Some(first)
    }

    /// Marks the seek past the leading segment as issued.
    pub fn begin_skip(&mut self, generation: Generation) {
        if self.generation == Some(generation) {
            self.pending = true;
        }
    }

    /// Records the seek completion. A finished seek marks the segment skipped
    /// for the rest of the item; an interrupted one allows another attempt.
    pub fn finish_skip(&mut self, generation: Generation, finished: bool) -> bool {
        if self.generation != Some(generation) {
            return false;
        }
        self.pending = false;
        self.skipped |= finished;
        finished
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn evaluator_with(segments: Vec<SkipSegment>) -> SegmentSkipEvaluator {
        let mut evaluator = SegmentSkipEvaluator::new(secs(3.0));
        evaluator.reset(Generation(1), false);
        assert!(evaluator.set_segments(Generation(1), segments));
        evaluator
    }

    #[test]
    fn leading_segment_is_skipped_once() {
        let mut evaluator = evaluator_with(vec![SkipSegment::new("intro", secs(1.5), secs(8.0))]);

        let target = evaluator.evaluate(Generation(1), secs(0.0)).unwrap().end;
        assert_eq!(target, secs(8.0));

        evaluator.begin_skip(Generation(1));
        assert!(evaluator.evaluate(Generation(1), secs(0.5)).is_none());

        assert!(evaluator.finish_skip(Generation(1), true));
        assert!(evaluator.evaluate(Generation(1), secs(1.0)).is_none());
    }

    #[test]
    fn interrupted_skip_can_retry() {
        let mut evaluator = evaluator_with(vec![SkipSegment::new("intro", secs(0.0), secs(5.0))]);
        evaluator.begin_skip(Generation(1));
        assert!(!evaluator.finish_skip(Generation(1), false));
        assert!(evaluator.evaluate(Generation(1), secs(0.5)).is_some());
    }

    #[test]
    fn late_or_passed_segments_do_not_qualify() {
        let late = evaluator_with(vec![SkipSegment::new("s", secs(3.0), secs(9.0))]);
        assert!(late.evaluate(Generation(1), secs(4.0)).is_none());

        let early = evaluator_with(vec![SkipSegment::new("s", secs(1.0), secs(9.0))]);
        assert!(early.evaluate(Generation(1), secs(9.0)).is_none());
    }

    #[test]
    fn preserving_generation_never_skips() {
        let mut evaluator = SegmentSkipEvaluator::new(secs(3.0));
        evaluator.reset(Generation(4), true);
        evaluator.set_segments(Generation(4), vec![SkipSegment::new("intro", secs(1.5), secs(8.0))]);

        assert!(evaluator.evaluate(Generation(4), secs(0.0)).is_none());
        assert!(evaluator.evaluate(Generation(4), secs(4.0)).is_none());

        evaluator.reset(Generation(5), false);
        evaluator.set_segments(Generation(5), vec![SkipSegment::new("intro", secs(1.5), secs(8.0))]);
        assert!(evaluator.evaluate(Generation(5), secs(4.0)).is_some());
    }

    #[test]
    fn only_first_segment_is_considered() {
        let evaluator = evaluator_with(vec![
            SkipSegment::new("late", secs(60.0), secs(90.0)),
            SkipSegment::new("early", secs(1.0), secs(4.0)),
        ]);
        assert_eq!(evaluator.evaluate(Generation(1), secs(0.0)).unwrap().id, "early");
        assert!(evaluator.evaluate(Generation(1), secs(61.0)).is_none());
    }

    #[test]
    fn new_generation_resets_marker() {
        let mut evaluator = evaluator_with(vec![SkipSegment::new("intro", secs(1.5), secs(8.0))]);
        evaluator.begin_skip(Generation(1));
        evaluator.finish_skip(Generation(1), true);

        evaluator.reset(Generation(2), false);
        assert!(!evaluator.set_segments(Generation(1), vec![]));
        evaluator.set_segments(Generation(2), vec![SkipSegment::new("intro", secs(1.5), secs(8.0))]);
        assert!(!evaluator.is_skipped());
        assert!(evaluator.evaluate(Generation(2), secs(0.0)).is_some());
        assert!(evaluator.evaluate(Generation(1), secs(0.0)).is_none());
    }
}
