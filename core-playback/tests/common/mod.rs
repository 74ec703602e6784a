//! Recording fakes for the host bridges.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AssetLoadReport, AssetProperty, AssetSource, BridgeError, EngineSignal, ItemId, ItemStatus,
    LoadedAsset, MediaEngine, MediaType, NowPlayingInfo, NowPlayingSink, PipCapability,
    PlayerItem, PresentationHost, ScreenSaverControl, SeekTolerance, SegmentSource,
    SignalHandler, SkipSegment, TimeControlStatus, WatchRecord, WatchStore,
};
use bridge_traits::{BackendKind, FixedClock};
use chrono::{TimeZone, Utc};
use core_playback::{
    ContainerFormat, Player, PlayerHandle, PlayerSnapshot, Resolution, Stream, StreamKind, Video,
};
use core_runtime::config::{PlayerConfig, PlaybackSettings};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

// ============================================================================
// Media engine
// ============================================================================

#[derive(Default)]
struct EngineState {
    handler: Option<SignalHandler>,
    item: Option<PlayerItem>,
    loaded: Vec<PlayerItem>,
    position: Duration,
    rate: f32,
    status: Option<TimeControlStatus>,
    plays: usize,
    pauses: usize,
    seeks: Vec<(Duration, SeekTolerance)>,
    visual_tracks: Option<bool>,
}

pub struct FakeEngine {
    state: Mutex<EngineState>,
    seek_delay: Mutex<Duration>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(EngineState {
                rate: 1.0,
                ..Default::default()
            }),
            seek_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn set_seek_delay(&self, delay: Duration) {
        *self.seek_delay.lock() = delay;
    }

    pub fn set_position(&self, position: Duration) {
        self.state.lock().position = position;
    }

    pub fn position(&self) -> Duration {
        self.state.lock().position
    }

    pub fn item_id(&self) -> Option<ItemId> {
        self.state.lock().item.as_ref().map(|i| i.id)
    }

    pub fn item(&self) -> Option<PlayerItem> {
        self.state.lock().item.clone()
    }

    pub fn loaded(&self) -> Vec<PlayerItem> {
        self.state.lock().loaded.clone()
    }

    pub fn plays(&self) -> usize {
        self.state.lock().plays
    }

    pub fn pauses(&self) -> usize {
        self.state.lock().pauses
    }

    pub fn seeks(&self) -> Vec<(Duration, SeekTolerance)> {
        self.state.lock().seeks.clone()
    }

    pub fn current_rate(&self) -> f32 {
        self.state.lock().rate
    }

    pub fn visual_tracks(&self) -> Option<bool> {
        self.state.lock().visual_tracks
    }

    /// Delivers `signal` through the installed handler.
    pub fn emit(&self, signal: EngineSignal) {
        let handler = self.state.lock().handler.clone();
        if let Some(handler) = handler {
            handler(signal);
        }
    }

    /// Some engines drop back to 1.0 on internal transitions.
    pub fn reset_rate_while_playing(&self) {
        self.state.lock().rate = 1.0;
        self.emit(EngineSignal::TimeControlStatusChanged {
            status: TimeControlStatus::Playing,
            rate: 1.0,
        });
    }

    pub fn play_to_end(&self) {
        if let Some(item) = self.item_id() {
            self.emit(EngineSignal::ItemDidPlayToEnd { item });
        }
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    fn set_signal_handler(&self, handler: SignalHandler) {
        self.state.lock().handler = Some(handler);
    }

    fn replace_current_item(&self, item: Option<PlayerItem>) -> BridgeResult<()> {
        let ready = {
            let mut state = self.state.lock();
            state.position = Duration::ZERO;
            if let Some(item) = &item {
                state.loaded.push(item.clone());
            }
            state.item = item;
            state.item.as_ref().map(|i| i.id)
        };
        if let Some(item) = ready {
            self.emit(EngineSignal::ItemStatusChanged {
                item,
                status: ItemStatus::ReadyToPlay,
            });
        }
        Ok(())
    }

    fn current_item(&self) -> Option<ItemId> {
        self.item_id()
    }

    fn play(&self) {
        let rate = {
            let mut state = self.state.lock();
            state.plays += 1;
            state.status = Some(TimeControlStatus::Playing);
            state.rate
        };
        self.emit(EngineSignal::TimeControlStatusChanged {
            status: TimeControlStatus::Playing,
            rate,
        });
    }

    fn pause(&self) {
        let was_playing = {
            let mut state = self.state.lock();
            state.pauses += 1;
            state.status.replace(TimeControlStatus::Paused) == Some(TimeControlStatus::Playing)
        };
        if was_playing {
            self.emit(EngineSignal::TimeControlStatusChanged {
                status: TimeControlStatus::Paused,
                rate: 0.0,
            });
        }
    }

    fn rate(&self) -> f32 {
        self.state.lock().rate
    }

    fn set_rate(&self, rate: f32) {
        self.state.lock().rate = rate;
    }

    fn current_time(&self) -> Option<Duration> {
        let state = self.state.lock();
        state.item.as_ref().map(|_| state.position)
    }

    fn time_control_status(&self) -> TimeControlStatus {
        self.state.lock().status.unwrap_or(TimeControlStatus::Paused)
    }

    async fn seek(&self, to: Duration, tolerance: SeekTolerance) -> bool {
        self.state.lock().seeks.push((to, tolerance));
        let delay = *self.seek_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        if state.item.is_none() {
            return false;
        }
        state.position = to;
        true
    }

    fn set_visual_tracks_enabled(&self, enabled: bool) {
        self.state.lock().visual_tracks = Some(enabled);
    }
}

// ============================================================================
// Asset source
// ============================================================================

/// Resolves every URL to a playable asset unless told otherwise.
pub struct FakeSource {
    delays: Mutex<HashMap<String, Duration>>,
    missing_tracks: Mutex<HashMap<String, MediaType>>,
    failing: AtomicBool,
    asset_duration: Mutex<Duration>,
    loads: Mutex<Vec<Url>>,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            delays: Mutex::new(HashMap::new()),
            missing_tracks: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            asset_duration: Mutex::new(Duration::from_secs(60)),
            loads: Mutex::new(Vec::new()),
        })
    }

    pub fn delay(&self, url: &Url, delay: Duration) {
        self.delays.lock().insert(url.to_string(), delay);
    }

    pub fn without_track(&self, url: &Url, media_type: MediaType) {
        self.missing_tracks.lock().insert(url.to_string(), media_type);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_asset_duration(&self, duration: Duration) {
        *self.asset_duration.lock() = duration;
    }

    pub fn loads(&self) -> Vec<Url> {
        self.loads.lock().clone()
    }
}

#[async_trait]
impl AssetSource for FakeSource {
    async fn load(&self, url: &Url, properties: &[AssetProperty]) -> BridgeResult<AssetLoadReport> {
        self.loads.lock().push(url.clone());
        let delay = self.delays.lock().get(url.as_str()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("network unreachable".into()));
        }

        let missing = self.missing_tracks.lock().get(url.as_str()).copied();
        let mut asset = LoadedAsset::new(url.clone()).with_duration(*self.asset_duration.lock());
        for (id, media_type) in [(1, MediaType::Video), (2, MediaType::Audio)] {
            if Some(media_type) != missing {
                asset = asset.with_track(media_type, id);
            }
        }
        Ok(AssetLoadReport::loaded(asset, properties))
    }
}

// ============================================================================
// Picture-in-picture
// ============================================================================

/// Reports itself possible from the `possible_from`-th check on.
pub struct FakePip {
    possible_from: usize,
    checks: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakePip {
    pub fn new(possible_from: usize) -> Arc<Self> {
        Arc::new(Self {
            possible_from,
            checks: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl PipCapability for FakePip {
    fn is_possible(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst) + 1 >= self.possible_from
    }

    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Watch store
// ============================================================================

#[derive(Default)]
pub struct MemoryWatchStore {
    records: Mutex<HashMap<String, WatchRecord>>,
    writes: Mutex<Vec<WatchRecord>>,
}

impl MemoryWatchStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, video_id: &str) -> Option<WatchRecord> {
        self.records.lock().get(video_id).cloned()
    }

    pub fn insert(&self, record: WatchRecord) {
        self.records.lock().insert(record.video_id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn writes(&self) -> Vec<WatchRecord> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl WatchStore for MemoryWatchStore {
    async fn fetch_record(&self, video_id: &str) -> BridgeResult<Option<WatchRecord>> {
        Ok(self.record(video_id))
    }

    async fn record_progress(&self, record: WatchRecord) -> BridgeResult<()> {
        self.writes.lock().push(record.clone());
        self.insert(record);
        Ok(())
    }

    async fn delete_record(&self, video_id: &str) -> BridgeResult<()> {
        self.records.lock().remove(video_id);
        Ok(())
    }

    async fn delete_all(&self) -> BridgeResult<()> {
        self.records.lock().clear();
        Ok(())
    }
}

// ============================================================================
// Segments and host hooks
// ============================================================================

#[derive(Default)]
pub struct StaticSegments {
    segments: Mutex<HashMap<String, Vec<SkipSegment>>>,
}

impl StaticSegments {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, video_id: &str, segments: Vec<SkipSegment>) {
        self.segments.lock().insert(video_id.to_string(), segments);
    }
}

#[async_trait]
impl SegmentSource for StaticSegments {
    async fn segments(&self, video_id: &str) -> BridgeResult<Vec<SkipSegment>> {
        Ok(self.segments.lock().get(video_id).cloned().unwrap_or_default())
    }
}

/// Records every host presentation call.
#[derive(Default)]
pub struct FakeHost {
    pub now_playing: Mutex<Vec<NowPlayingInfo>>,
    pub playing: Mutex<Vec<bool>>,
    pub cleared: AtomicUsize,
    pub inhibited: AtomicBool,
    pub inhibits: AtomicUsize,
    pub shows: AtomicUsize,
    pub hides: AtomicUsize,
    pub presenting: AtomicBool,
    reasons: Mutex<HashSet<String>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl NowPlayingSink for FakeHost {
    fn update(&self, info: NowPlayingInfo) {
        self.now_playing.lock().push(info);
    }

    fn set_playing(&self, playing: bool) {
        self.playing.lock().push(playing);
    }

    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScreenSaverControl for FakeHost {
    fn inhibit(&self, reason: &str) {
        self.reasons.lock().insert(reason.to_string());
        self.inhibits.fetch_add(1, Ordering::SeqCst);
        self.inhibited.store(true, Ordering::SeqCst);
    }

    fn release(&self) {
        self.inhibited.store(false, Ordering::SeqCst);
    }
}

impl PresentationHost for FakeHost {
    fn show_player(&self) {
        self.shows.fetch_add(1, Ordering::SeqCst);
        self.presenting.store(true, Ordering::SeqCst);
    }

    fn hide_player(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
        self.presenting.store(false, Ordering::SeqCst);
    }

    fn is_presenting(&self) -> bool {
        self.presenting.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn url(path: &str) -> Url {
    Url::parse(&format!("https://cdn.example.com/{}", path)).unwrap()
}

pub fn video(id: &str) -> Video {
    Video::new(id, format!("Video {}", id), Duration::from_secs(60))
}

pub fn muxed(name: &str) -> Stream {
    Stream::single(StreamKind::Stream, Resolution(720), ContainerFormat::Mp4, url(name))
}

pub fn separate(audio: &str, video: &str) -> Stream {
    Stream::separate(Resolution(1080), ContainerFormat::Mp4, url(audio), url(video))
}

/// Lets every ready task run, then advances the paused clock by 1 ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Waits until a published snapshot satisfies `predicate`.
pub async fn wait_for<F>(player: &PlayerHandle, predicate: F) -> PlayerSnapshot
where
    F: FnMut(&PlayerSnapshot) -> bool,
{
    let mut snapshots = player.snapshots();
    let snapshot = tokio::time::timeout(Duration::from_secs(60), snapshots.wait_for(predicate))
        .await
        .expect("timed out waiting for player snapshot")
        .expect("player shut down")
        .clone();
    snapshot
}

// ============================================================================
// Rig
// ============================================================================

/// A running player wired to a full set of fakes.
pub struct Rig {
    pub player: PlayerHandle,
    pub hardware: Arc<FakeEngine>,
    pub alternate: Arc<FakeEngine>,
    pub source: Arc<FakeSource>,
    pub pip: Arc<FakePip>,
    pub store: Arc<MemoryWatchStore>,
    pub segments: Arc<StaticSegments>,
    pub host: Arc<FakeHost>,
}

impl Rig {
    pub fn start(settings: PlaybackSettings) -> Self {
        Self::start_on(BackendKind::Hardware, settings, 1)
    }

    pub fn start_on(backend: BackendKind, settings: PlaybackSettings, pip_possible_from: usize) -> Self {
        let hardware = FakeEngine::new();
        let alternate = FakeEngine::new();
        let source = FakeSource::new();
        let pip = FakePip::new(pip_possible_from);
        let store = MemoryWatchStore::new();
        let segments = StaticSegments::new();
        let host = FakeHost::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        let config = PlayerConfig::builder()
            .asset_source(source.clone())
            .hardware_engine(hardware.clone())
            .alternate_engine(alternate.clone())
            .pip(pip.clone())
            .watch_store(store.clone())
            .segment_source(segments.clone())
            .now_playing(host.clone())
            .screen_saver(host.clone())
            .presentation(host.clone())
            .clock(Arc::new(clock))
            .initial_backend(backend)
            .settings(settings)
            .build()
            .expect("valid config");

        let player = Player::spawn(config).expect("player starts");
        Self {
            player,
            hardware,
            alternate,
            source,
            pip,
            store,
            segments,
            host,
        }
    }

    /// Plays `video` from a muxed stream and waits until it is playing.
    pub async fn play_muxed(&self, video: Video, name: &str) -> PlayerSnapshot {
        self.play(video, muxed(name)).await
    }

    /// Plays `stream` and waits until its generation is playing.
    pub async fn play(&self, video: Video, stream: Stream) -> PlayerSnapshot {
        let before = self.player.snapshot().generation;
        self.player.play_stream(video, stream, false).unwrap();
        wait_for(&self.player, |s| {
            s.generation > before && s.state == core_playback::PlaybackState::Playing
        })
        .await
    }
}
