mod common;

use bridge_traits::{FixedClock, WatchStore};
use chrono::{TimeZone, Utc};
use common::MemoryWatchStore;
use core_playback::watch::WatchPolicy;
use core_playback::{WatchReporter, WatchSample};
use std::sync::Arc;
use std::time::Duration;

const THROTTLE: Duration = Duration::from_secs(2);

fn reporter(store: &Arc<MemoryWatchStore>, enabled: bool) -> WatchReporter {
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    WatchReporter::spawn(
        Some(store.clone() as Arc<dyn WatchStore>),
        Arc::new(clock),
        WatchPolicy {
            min_watch_seconds: 1.0,
            reset_watched_status_on_playing: false,
        },
        THROTTLE,
        enabled,
    )
}

fn sample(position: f64, finished: bool) -> WatchSample {
    WatchSample {
        video_id: "v".to_string(),
        position: Some(Duration::from_secs_f64(position)),
        duration: Some(Duration::from_secs(90)),
        finished,
    }
}

#[tokio::test(start_paused = true)]
async fn test_short_positions_create_a_single_record() {
    let store = MemoryWatchStore::new();
    let mut reporter = reporter(&store, true);

    for position in [0.4, 0.9, 1.2, 1.3] {
        assert!(reporter.sample(sample(position, false)));
        tokio::time::sleep(THROTTLE).await;
    }
    reporter.close().await;

    assert_eq!(store.len(), 1);
    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].stopped_at, 1.2);
    assert_eq!(store.record("v").unwrap().stopped_at, 1.3);
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_write_per_window() {
    let store = MemoryWatchStore::new();
    let mut reporter = reporter(&store, true);

    assert!(reporter.sample(sample(5.0, false)));
    assert!(!reporter.sample(sample(6.0, false)));
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(!reporter.sample(sample(7.0, false)));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(reporter.sample(sample(8.0, false)));
    reporter.close().await;

    let positions: Vec<f64> = store.writes().iter().map(|r| r.stopped_at).collect();
    assert_eq!(positions, vec![5.0, 8.0]);
}

#[tokio::test(start_paused = true)]
async fn test_forced_finish_records_full_duration() {
    let store = MemoryWatchStore::new();
    let mut reporter = reporter(&store, true);

    assert!(reporter.sample(sample(30.0, false)));
    // Bypasses the window opened by the sample above.
    assert!(reporter.force(sample(31.0, true)));
    reporter.close().await;

    let record = store.record("v").unwrap();
    assert!(record.finished);
    assert_eq!(record.stopped_at, 90.0);
    assert_eq!(record.stopped_at, record.duration);
}

#[tokio::test(start_paused = true)]
async fn test_finished_record_is_not_reopened() {
    let store = MemoryWatchStore::new();
    let mut reporter = reporter(&store, true);

    reporter.force(sample(90.0, true));
    tokio::time::sleep(THROTTLE).await;
    reporter.sample(sample(3.0, false));
    reporter.close().await;

    let record = store.record("v").unwrap();
    assert!(record.finished);
    assert_eq!(store.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_history_drops_every_sample() {
    let store = MemoryWatchStore::new();
    let mut reporter = reporter(&store, false);

    assert!(!reporter.is_enabled());
    assert!(!reporter.sample(sample(10.0, false)));
    assert!(!reporter.force(sample(10.0, true)));
    reporter.close().await;

    assert_eq!(store.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_throttle_opens_new_window() {
    let store = MemoryWatchStore::new();
    let mut reporter = reporter(&store, true);

    assert!(reporter.sample(sample(4.0, false)));
    reporter.reset_throttle();
    assert!(reporter.sample(sample(4.5, false)));
    reporter.close().await;

    assert_eq!(store.writes().len(), 2);
}
