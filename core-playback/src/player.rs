//! # Player
//!
//! The single-owner playback state machine and its public handle.
//!
//! ## Overview
//!
//! [`Player::spawn`] moves the player core onto one tokio task and returns a
//! cloneable [`PlayerHandle`]. Every mutation of playback state happens on
//! that task. Commands from the handle, asset and track completions, seek
//! completions, engine signals, PiP timers and sampler ticks all arrive on the
//! same channel as one message type.
//!
//! Work that completes asynchronously captures the [`Generation`] it was
//! issued for. The core compares it against the live intent before acting, so
//! a completion for a superseded selection is dropped without side effects.
//!
//! ```text
//!   PlayerHandle ──┐
//!  engine signals ─┤            ┌────────────────────────────┐
//!   load / seek ───┼── mpsc ──> │ PlayerCore (owner task)    │ ──> EventBus
//!   PiP timers ────┤            │  intents, backends, pip,   │ ──> watch::Sender<PlayerSnapshot>
//!   samplers ──────┘            │  segments, watch reporter  │ ──> WatchStore (writer task)
//!                               └────────────────────────────┘
//! ```
//!
//! ## States
//!
//! `idle → loading → ready → playing ⇄ paused → ended`, with `failed`
//! reachable from `loading` and `ready`. `stop()` returns to `idle` from
//! anywhere.

use crate::backend::{Backends, PlaybackBackend};
use crate::composition::{AssemblyOutcome, CompositionAssembler};
use crate::error::{PlaybackError, Result};
use crate::intent::{Generation, IntentTracker, PlaybackIntent};
use crate::loader::AssetLoader;
use crate::model::{Stream, StreamAssets, Video};
use crate::pip::{restore_delay, AttemptOutcome, PipController, PipStatus, HIDE_PLAYER_DELAY};
use crate::sampler::{SamplerKind, Samplers};
use crate::segments::SegmentSkipEvaluator;
use crate::switch::{tear_down, PreservedTime};
use crate::watch::{WatchPolicy, WatchReporter, WatchSample};
use bridge_traits::{
    BackendKind, CompositionTrack, EngineSignal, ItemId, ItemSource, ItemStatus, LoadedAsset,
    MediaType, NowPlayingInfo, NowPlayingSink, PipLifecycle, PlayerItem, PresentationHost,
    ScreenSaverControl, SeekTolerance, SegmentSource, SkipSegment, TimeControlStatus, WatchStore,
};
use core_runtime::config::{EndOfPlaybackAction, PlaybackSettings, PlayerConfig};
use core_runtime::events::{
    CoreEvent, EventBus, EventStream, PipEvent, PlaybackEvent, PlaybackState,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

const SCREEN_SAVER_REASON: &str = "video is playing";

// ============================================================================
// Messages
// ============================================================================

/// Requests accepted by the owner loop.
#[derive(Debug)]
pub(crate) enum PlayerCommand {
    PlayStream {
        video: Video,
        stream: Stream,
        preserving_time: bool,
    },
    Play,
    Pause,
    TogglePlay,
    Stop,
    CloseItem,
    Seek {
        to: Duration,
        reply: oneshot::Sender<bool>,
    },
    SetRate(f32),
    SwitchBackend {
        kind: BackendKind,
        reply: oneshot::Sender<Result<()>>,
    },
    StartPip,
    StopPip,
    PipLifecycle(PipLifecycle),
    RestoreUserInterface {
        reply: oneshot::Sender<bool>,
    },
    SetMusicMode(bool),
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Why a seek was issued; decides what happens on completion.
#[derive(Debug)]
pub(crate) enum SeekPurpose {
    User(oneshot::Sender<bool>),
    /// Restoring the preserved position of a backend switch.
    Restore,
    /// Resuming from the watch history.
    Resume,
    SegmentSkip {
        segment_id: String,
        from: Duration,
        to: Duration,
        then_play: bool,
    },
    /// Back to zero after the item ended (loop, replay).
    Restart,
}

/// Everything the owner loop reacts to.
pub(crate) enum CoreMessage {
    Command(PlayerCommand),
    AssetLoaded {
        generation: Generation,
        result: Result<LoadedAsset>,
    },
    TrackLoaded {
        generation: Generation,
        media_type: MediaType,
        result: Result<CompositionTrack>,
    },
    Engine {
        backend: BackendKind,
        signal: EngineSignal,
    },
    SeekFinished {
        generation: Generation,
        purpose: SeekPurpose,
        finished: bool,
    },
    AutoplayDue {
        generation: Generation,
    },
    ResumePosition {
        generation: Generation,
        position: Option<Duration>,
    },
    SegmentsFetched {
        generation: Generation,
        segments: Vec<SkipSegment>,
    },
    PipAttempt {
        sequence: u64,
        index: usize,
    },
    PipHidePlayer,
    PipRestoreDue {
        reply: oneshot::Sender<bool>,
    },
    Tick(SamplerKind),
}

type WeakSender = mpsc::WeakUnboundedSender<CoreMessage>;

fn post(tx: &WeakSender, message: CoreMessage) -> bool {
    match tx.upgrade() {
        Some(tx) => tx.send(message).is_ok(),
        None => false,
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Latest observable player state, published after every message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub generation: Generation,
    pub backend: BackendKind,
    pub video_id: Option<String>,
    pub item: Option<u64>,
    pub position: Option<Duration>,
    pub duration: Option<Duration>,
    /// Rate requested through the API.
    pub rate: f32,
    pub time_control: TimeControlStatus,
    pub live: bool,
    pub music_mode: bool,
    pub pip: PipStatus,
    pub preserved_time: Option<Duration>,
}

impl PlayerSnapshot {
    fn initial(backend: BackendKind) -> Self {
        Self {
            state: PlaybackState::Idle,
            generation: Generation::default(),
            backend,
            video_id: None,
            item: None,
            position: None,
            duration: None,
            rate: 1.0,
            time_control: TimeControlStatus::Paused,
            live: false,
            music_mode: false,
            pip: PipStatus::default(),
            preserved_time: None,
        }
    }
}

// ============================================================================
// Player
// ============================================================================

pub struct Player;

impl Player {
    /// Validates `config`, starts the owner task and the samplers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: PlayerConfig) -> Result<PlayerHandle> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let weak = tx.downgrade();

        let backends = Backends::from_engines(
            Arc::clone(&config.hardware_engine),
            config.alternate_engine.clone(),
        );
        for backend in backends.all() {
            let weak = weak.clone();
            backend.install_signal_handler(Arc::new(move |kind, signal| {
                post(&weak, CoreMessage::Engine { backend: kind, signal });
            }));
        }

        let events = EventBus::new(config.settings.event_buffer);
        let (snapshot_tx, snapshot_rx) = watch::channel(PlayerSnapshot::initial(config.initial_backend));

        let sampler_tx = weak.clone();
        let samplers = Samplers::spawn(
            config.settings.frequent_interval,
            config.settings.infrequent_interval,
            CancellationToken::new(),
            move |kind| post(&sampler_tx, CoreMessage::Tick(kind)),
        );

        let watch_store = config.watch_store.clone();
        let core = PlayerCore::new(config, backends, weak, events.clone(), snapshot_tx, samplers)?;

        info!(backend = %core.active.kind(), "player started");
        tokio::spawn(core.run(rx));

        Ok(PlayerHandle {
            tx,
            snapshot: snapshot_rx,
            events,
            watch_store,
        })
    }
}

/// Cloneable front door to a running player.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<CoreMessage>,
    snapshot: watch::Receiver<PlayerSnapshot>,
    events: EventBus,
    watch_store: Option<Arc<dyn WatchStore>>,
}

impl PlayerHandle {
    fn send(&self, command: PlayerCommand) -> Result<()> {
        self.tx
            .send(CoreMessage::Command(command))
            .map_err(|_| PlaybackError::PlayerClosed)
    }

    /// Plays `stream` for `video`, superseding the current selection.
    ///
    /// With `preserving_time` the current position is restored on the new item.
    pub fn play_stream(&self, video: Video, stream: Stream, preserving_time: bool) -> Result<()> {
        self.send(PlayerCommand::PlayStream {
            video,
            stream,
            preserving_time,
        })
    }

    pub fn play(&self) -> Result<()> {
        self.send(PlayerCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(PlayerCommand::Pause)
    }

    pub fn toggle_play(&self) -> Result<()> {
        self.send(PlayerCommand::TogglePlay)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(PlayerCommand::Stop)
    }

    /// Stops and records the watch position before detaching the item.
    pub fn close_item(&self) -> Result<()> {
        self.send(PlayerCommand::CloseItem)
    }

    /// Seeks the current item. `false` when nothing is loaded, the stream is
    /// live, or the seek was interrupted.
    pub async fn seek(&self, to: Duration) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.send(PlayerCommand::Seek { to, reply }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub fn set_rate(&self, rate: f32) -> Result<()> {
        self.send(PlayerCommand::SetRate(rate))
    }

    /// Moves playback to `kind`, preserving the position of the live item.
    pub async fn switch_backend(&self, kind: BackendKind) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(PlayerCommand::SwitchBackend { kind, reply })?;
        rx.await.map_err(|_| PlaybackError::PlayerClosed)?
    }

    pub fn start_pip(&self) -> Result<()> {
        self.send(PlayerCommand::StartPip)
    }

    pub fn stop_pip(&self) -> Result<()> {
        self.send(PlayerCommand::StopPip)
    }

    /// Forwards a lifecycle callback of the host's PiP delegate.
    pub fn pip_lifecycle(&self, lifecycle: PipLifecycle) -> Result<()> {
        self.send(PlayerCommand::PipLifecycle(lifecycle))
    }

    /// Answers the system's restore-user-interface request.
    pub async fn restore_user_interface(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.send(PlayerCommand::RestoreUserInterface { reply }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub fn set_music_mode(&self, enabled: bool) -> Result<()> {
        self.send(PlayerCommand::SetMusicMode(enabled))
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that wakes on every published snapshot.
    pub fn snapshots(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Deletes the watch record of `video_id`. No-op without a store.
    pub async fn remove_watch(&self, video_id: &str) -> Result<()> {
        match &self.watch_store {
            Some(store) => Ok(store.delete_record(video_id).await?),
            None => Ok(()),
        }
    }

    pub async fn remove_all_watches(&self) -> Result<()> {
        match &self.watch_store {
            Some(store) => Ok(store.delete_all().await?),
            None => Ok(()),
        }
    }

    /// Stops playback, drains pending watch writes and ends the owner task.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(PlayerCommand::Shutdown { reply })?;
        rx.await.map_err(|_| PlaybackError::PlayerClosed)
    }
}

// ============================================================================
// Core
// ============================================================================

pub(crate) struct PlayerCore {
    settings: PlaybackSettings,
    backends: Backends,
    active: Arc<dyn PlaybackBackend>,

    intents: IntentTracker,
    loader: AssetLoader,
    assembler: CompositionAssembler,
    segments: SegmentSkipEvaluator,
    preserved: PreservedTime,
    pip: PipController,
    watch: WatchReporter,
    samplers: Option<Samplers>,

    watch_store: Option<Arc<dyn WatchStore>>,
    segment_source: Option<Arc<dyn SegmentSource>>,
    now_playing: Option<Arc<dyn NowPlayingSink>>,
    screen_saver: Option<Arc<dyn ScreenSaverControl>>,
    presentation: Option<Arc<dyn PresentationHost>>,

    state: PlaybackState,
    item: Option<ItemId>,
    item_duration: Option<Duration>,
    requested_rate: f32,
    time_control: TimeControlStatus,
    music_mode: bool,
    screen_saver_inhibited: bool,

    tx: WeakSender,
    events: EventBus,
    snapshot: watch::Sender<PlayerSnapshot>,
}

impl PlayerCore {
    fn new(
        config: PlayerConfig,
        backends: Backends,
        tx: WeakSender,
        events: EventBus,
        snapshot: watch::Sender<PlayerSnapshot>,
        samplers: Samplers,
    ) -> Result<Self> {
        let settings = config.settings.clone();
        let active = backends.get(config.initial_backend)?;

        let watch = WatchReporter::spawn(
            config.watch_store.clone(),
            Arc::clone(&config.clock),
            WatchPolicy {
                min_watch_seconds: settings.min_watch_seconds,
                reset_watched_status_on_playing: settings.reset_watched_status_on_playing,
            },
            settings.watch_throttle,
            settings.save_history,
        );

        Ok(Self {
            loader: AssetLoader::new(Arc::clone(&config.asset_source)),
            assembler: CompositionAssembler::new(Arc::clone(&config.asset_source)),
            segments: SegmentSkipEvaluator::new(settings.segment_skip_threshold),
            pip: PipController::new(config.pip.clone(), settings.pip_retry_delays.clone()),
            watch,
            samplers: Some(samplers),
            intents: IntentTracker::new(),
            preserved: PreservedTime::default(),
            watch_store: config.watch_store,
            segment_source: config.segment_source,
            now_playing: config.now_playing,
            screen_saver: config.screen_saver,
            presentation: config.presentation,
            state: PlaybackState::Idle,
            item: None,
            item_duration: None,
            requested_rate: 1.0,
            time_control: TimeControlStatus::Paused,
            music_mode: false,
            screen_saver_inhibited: false,
            settings,
            backends,
            active,
            tx,
            events,
            snapshot,
        })
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<CoreMessage>) {
        while let Some(message) = rx.recv().await {
            if let CoreMessage::Command(PlayerCommand::Shutdown { reply }) = message {
                self.shutdown().await;
                let _ = reply.send(());
                return;
            }
            self.handle(message);
            self.publish_snapshot();
        }

        debug!("every player handle dropped");
        self.shutdown().await;
    }

    fn handle(&mut self, message: CoreMessage) {
        match message {
            CoreMessage::Command(command) => self.handle_command(command),
            CoreMessage::AssetLoaded { generation, result } => self.on_asset_loaded(generation, result),
            CoreMessage::TrackLoaded {
                generation,
                media_type,
                result,
            } => self.on_track_loaded(generation, media_type, result),
            CoreMessage::Engine { backend, signal } => self.on_engine_signal(backend, signal),
            CoreMessage::SeekFinished {
                generation,
                purpose,
                finished,
            } => self.on_seek_finished(generation, purpose, finished),
            CoreMessage::AutoplayDue { generation } => self.on_autoplay_due(generation),
            CoreMessage::ResumePosition { generation, position } => {
                self.on_resume_position(generation, position)
            }
            CoreMessage::SegmentsFetched { generation, segments } => {
                if !self.segments.set_segments(generation, segments) {
                    trace!(%generation, "discarding stale skip segments");
                }
            }
            CoreMessage::PipAttempt { sequence, index } => self.on_pip_attempt(sequence, index),
            CoreMessage::PipHidePlayer => {
                if self.pip.is_active() {
                    if let Some(presentation) = &self.presentation {
                        presentation.hide_player();
                    }
                }
            }
            CoreMessage::PipRestoreDue { reply } => {
                self.pip.finish_restore();
                let _ = reply.send(true);
            }
            CoreMessage::Tick(kind) => self.on_tick(kind),
        }
    }

    fn handle_command(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::PlayStream {
                video,
                stream,
                preserving_time,
            } => self.play_stream(video, stream, preserving_time),
            PlayerCommand::Play => self.play(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::TogglePlay => {
                if self.state == PlaybackState::Playing {
                    self.pause();
                } else {
                    self.play();
                }
            }
            PlayerCommand::Stop => self.stop(),
            PlayerCommand::CloseItem => self.close_item(),
            PlayerCommand::Seek { to, reply } => self.seek(to, reply),
            PlayerCommand::SetRate(rate) => self.set_rate(rate),
            PlayerCommand::SwitchBackend { kind, reply } => {
                let _ = reply.send(self.switch_backend(kind));
            }
            PlayerCommand::StartPip => self.request_pip(),
            PlayerCommand::StopPip => self.pip.stop(),
            PlayerCommand::PipLifecycle(lifecycle) => self.on_pip_lifecycle(lifecycle),
            PlayerCommand::RestoreUserInterface { reply } => self.restore_user_interface(reply),
            PlayerCommand::SetMusicMode(enabled) => self.set_music_mode(enabled),
            PlayerCommand::Shutdown { reply } => {
                // Intercepted by the run loop.
                let _ = reply.send(());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Selection and loading
    // ------------------------------------------------------------------------

    #[instrument(skip(self, video, stream), fields(video_id = %video.id, stream = %stream))]
    fn play_stream(&mut self, video: Video, stream: Stream, preserving_time: bool) {
        if preserving_time {
            if !video.live && self.preserved.capture(self.active.current_time()) {
                debug!(preserved = ?self.preserved.get(), "preserving current position");
            }
        } else {
            self.preserved.discard();
        }

        self.loader.cancel();
        self.assembler.cancel();
        self.pip.cancel_attempts();

        let intent = self.intents.begin(video, stream, preserving_time).clone();
        let generation = intent.generation;
        info!(%generation, "starting playback");

        self.item = None;
        self.item_duration = None;
        self.segments.reset(generation, intent.preserving_time);
        self.watch.reset_throttle();
        self.set_state(PlaybackState::Loading);
        self.fetch_segments(&intent);

        match intent.stream.assets {
            StreamAssets::Single { url } => {
                let tx = self.tx.clone();
                self.loader.load(generation, url, move |generation, result| {
                    post(&tx, CoreMessage::AssetLoaded { generation, result });
                });
            }
            StreamAssets::Separate { audio, video } => {
                let tx = self.tx.clone();
                self.assembler.assemble(
                    generation,
                    audio,
                    video,
                    intent.video.duration,
                    move |generation, media_type, result| {
                        post(
                            &tx,
                            CoreMessage::TrackLoaded {
                                generation,
                                media_type,
                                result,
                            },
                        );
                    },
                );
            }
        }
    }

    fn fetch_segments(&self, intent: &PlaybackIntent) {
        let Some(source) = self.segment_source.clone() else {
            return;
        };
        let tx = self.tx.clone();
        let generation = intent.generation;
        let video_id = intent.video.id.clone();

        tokio::spawn(async move {
            match source.segments(&video_id).await {
                Ok(segments) => {
                    post(&tx, CoreMessage::SegmentsFetched { generation, segments });
                }
                Err(err) => warn!(%video_id, error = %err, "failed to fetch skip segments"),
            }
        });
    }

    fn on_asset_loaded(&mut self, generation: Generation, result: Result<LoadedAsset>) {
        if !self.intents.is_live(generation) {
            trace!(%generation, "discarding stale asset load");
            return;
        }
        match result {
            Ok(asset) => self.install_item(generation, ItemSource::Asset(asset)),
            Err(err) => self.fail(err.into_load_failure()),
        }
    }

    fn on_track_loaded(&mut self, generation: Generation, media_type: MediaType, result: Result<CompositionTrack>) {
        if !self.intents.is_live(generation) {
            trace!(%generation, %media_type, "discarding stale composition track");
            return;
        }
        match self.assembler.on_track_loaded(generation, media_type, result) {
            AssemblyOutcome::Ready(composition) => {
                self.install_item(generation, ItemSource::Composition(composition))
            }
            AssemblyOutcome::Failed(err) => self.fail(err),
            AssemblyOutcome::Pending | AssemblyOutcome::Stale => {}
        }
    }

    /// `loading → ready`: builds the item and decides how playback starts.
    fn install_item(&mut self, generation: Generation, source: ItemSource) {
        let Some(intent) = self.intents.live_for(generation).cloned() else {
            return;
        };

        let item = PlayerItem {
            id: generation.item_id(),
            source,
            metadata: intent.video.item_metadata(),
            preferred_forward_buffer: self.settings.forward_buffer,
        };
        let duration = item.duration().filter(|d| !d.is_zero());

        if let Err(err) = self.active.load_item(item) {
            self.fail(err.into_load_failure());
            return;
        }

        self.item = Some(generation.item_id());
        self.item_duration = duration;
        if self.music_mode {
            self.active.set_visual_tracks_enabled(false);
        }

        self.set_state(PlaybackState::Ready);
        self.emit(PlaybackEvent::ItemReady {
            video_id: intent.video.id.clone(),
            generation: generation.0,
        });
        self.refresh_now_playing();

        if intent.video.live {
            self.preserved.discard();
            self.start_playing(generation);
            return;
        }

        if let Some(position) = self.preserved.begin_restore(generation) {
            debug!(%generation, ?position, "restoring preserved position");
            let tolerance = SeekTolerance::before_only(self.settings.seek_tolerance_before);
            self.spawn_seek(generation, position, tolerance, SeekPurpose::Restore);
            return;
        }

        if self.settings.resume_from_history && !intent.preserving_time {
            if let Some(store) = self.watch_store.clone() {
                let tx = self.tx.clone();
                let video_id = intent.video.id;
                tokio::spawn(async move {
                    let position = match store.fetch_last_position(&video_id).await {
                        Ok(seconds) => seconds
                            .filter(|s| s.is_finite() && *s > 0.0)
                            .map(Duration::from_secs_f64),
                        Err(err) => {
                            warn!(%video_id, error = %err, "failed to fetch last watch position");
                            None
                        }
                    };
                    post(&tx, CoreMessage::ResumePosition { generation, position });
                });
                return;
            }
        }

        self.start_playing(generation);
    }

    fn on_resume_position(&mut self, generation: Generation, position: Option<Duration>) {
        if !self.intents.is_live(generation) {
            return;
        }
        let resumable = position.filter(|p| self.item_duration.map_or(true, |d| *p < d));
        match resumable {
            Some(position) => {
                debug!(%generation, ?position, "resuming from history");
                let tolerance = SeekTolerance::before_only(self.settings.seek_tolerance_before);
                self.spawn_seek(generation, position, tolerance, SeekPurpose::Resume);
            }
            None => self.start_playing(generation),
        }
    }

    /// Re-asserts the rate and schedules autoplay.
    fn start_playing(&mut self, generation: Generation) {
        self.active.set_rate(self.requested_rate);

        let tx = self.tx.clone();
        let delay = self.settings.autoplay_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            post(&tx, CoreMessage::AutoplayDue { generation });
        });
    }

    fn on_autoplay_due(&mut self, generation: Generation) {
        if !self.intents.is_live(generation) {
            return;
        }
        if self.active.current_item() != Some(generation.item_id()) {
            debug!(%generation, "autoplay target is no longer the current item");
            return;
        }

        if !self.pip.is_transitioning() && self.try_skip_leading_segment(generation, true) {
            return;
        }
        self.play();
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    fn play(&mut self) {
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Ready | PlaybackState::Paused => self.resume_engine(),
            PlaybackState::Ended => {
                let generation = self.intents.current();
                if self.intents.is_live(generation) {
                    self.spawn_seek(generation, Duration::ZERO, SeekTolerance::EXACT, SeekPurpose::Restart);
                }
            }
            PlaybackState::Idle | PlaybackState::Loading | PlaybackState::Failed { .. } => {
                debug!(state = %self.state, "play ignored without a ready item");
            }
        }
    }

    fn resume_engine(&mut self) {
        self.active.play();
        if (self.active.rate() - self.requested_rate).abs() > f32::EPSILON {
            self.active.set_rate(self.requested_rate);
        }
        self.set_state(PlaybackState::Playing);
        if let Some(sink) = &self.now_playing {
            sink.set_playing(true);
        }
    }

    fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.active.pause();
        self.set_state(PlaybackState::Paused);
        if let Some(sink) = &self.now_playing {
            sink.set_playing(false);
        }
    }

    fn seek(&mut self, to: Duration, reply: oneshot::Sender<bool>) {
        let Some(intent) = self.intents.live() else {
            let _ = reply.send(false);
            return;
        };
        if self.item.is_none() {
            debug!(error = %PlaybackError::NoItemLoaded, "seek ignored");
            let _ = reply.send(false);
            return;
        }
        if intent.video.live {
            debug!(error = %PlaybackError::SeekRejected, "seek rejected");
            let _ = reply.send(false);
            return;
        }

        let generation = intent.generation;
        self.spawn_seek(generation, to, SeekTolerance::EXACT, SeekPurpose::User(reply));
    }

    fn spawn_seek(&self, generation: Generation, to: Duration, tolerance: SeekTolerance, purpose: SeekPurpose) {
        let backend = Arc::clone(&self.active);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let finished = backend.seek(to, tolerance).await;
            post(
                &tx,
                CoreMessage::SeekFinished {
                    generation,
                    purpose,
                    finished,
                },
            );
        });
    }

    fn on_seek_finished(&mut self, generation: Generation, purpose: SeekPurpose, finished: bool) {
        let live = self.intents.is_live(generation);
        match purpose {
            SeekPurpose::User(reply) => {
                // Seeking away from the end leaves a paused item to resume from.
                if finished && live && self.state == PlaybackState::Ended {
                    self.set_state(PlaybackState::Paused);
                }
                let _ = reply.send(finished && live);
            }
            SeekPurpose::Restore => {
                if self.preserved.finish_restore(generation) {
                    debug!(%generation, finished, "preserved position consumed");
                }
                if live {
                    self.start_playing(generation);
                }
            }
            SeekPurpose::Resume => {
                if live {
                    self.start_playing(generation);
                }
            }
            SeekPurpose::SegmentSkip {
                segment_id,
                from,
                to,
                then_play,
            } => {
                if self.segments.finish_skip(generation, finished) {
                    if let Some(intent) = self.intents.live_for(generation) {
                        info!(%generation, %segment_id, "skipped leading segment");
                        let video_id = intent.video.id.clone();
                        self.emit(PlaybackEvent::SegmentSkipped {
                            video_id,
                            segment_id,
                            from_ms: from.as_millis() as u64,
                            to_ms: to.as_millis() as u64,
                        });
                    }
                }
                if live && then_play {
                    self.play();
                }
            }
            SeekPurpose::Restart => {
                if live && finished {
                    self.resume_engine();
                }
            }
        }
    }

    fn set_rate(&mut self, rate: f32) {
        if !rate.is_finite() || rate <= 0.0 {
            warn!(rate, "ignoring invalid playback rate");
            return;
        }
        self.requested_rate = rate;
        if self.state == PlaybackState::Playing {
            self.active.set_rate(rate);
        }
        self.emit(PlaybackEvent::RateChanged { rate });
    }

    /// Any state back to `idle`. Supersedes the live intent.
    fn stop(&mut self) {
        if let Some(stopped) = self.intents.supersede() {
            info!(generation = %stopped.generation, "stopping playback");
        }
        self.loader.cancel();
        self.assembler.cancel();
        self.segments.clear();
        self.pip.cancel_attempts();
        self.pip.take_pending_start();
        self.preserved.discard();

        if let Err(err) = self.active.clear_item() {
            warn!(error = %err, "failed to clear the current item");
        }
        self.item = None;
        self.item_duration = None;

        self.set_state(PlaybackState::Idle);
        self.release_screen_saver();
    }

    fn close_item(&mut self) {
        if self.item.is_some() {
            self.sample_watch(true, false);
        }
        self.stop();
        if let Some(sink) = &self.now_playing {
            sink.clear();
        }
    }

    fn fail(&mut self, err: PlaybackError) {
        let message = err.to_string();
        let video_id = self.intents.live().map(|i| i.video.id.clone());
        error!(video_id = ?video_id, error = %message, "playback failed");

        self.loader.cancel();
        self.assembler.cancel();
        self.pip.cancel_attempts();
        self.pip.take_pending_start();

        if let Err(err) = self.active.clear_item() {
            warn!(error = %err, "failed to clear the failed item");
        }
        self.item = None;
        self.item_duration = None;

        self.set_state(PlaybackState::Failed {
            message: message.clone(),
        });
        self.emit(PlaybackEvent::ItemFailed { video_id, message });
        self.release_screen_saver();
    }

    // ------------------------------------------------------------------------
    // Engine signals
    // ------------------------------------------------------------------------

    fn on_engine_signal(&mut self, backend: BackendKind, signal: EngineSignal) {
        if backend != self.active.kind() {
            trace!(%backend, ?signal, "ignoring signal from inactive backend");
            return;
        }

        match signal {
            EngineSignal::ItemStatusChanged { item, status } => {
                if Some(item) != self.item {
                    return;
                }
                match status {
                    ItemStatus::ReadyToPlay => {
                        if self.pip.is_active() {
                            self.pip.take_pending_start();
                        } else if self.pip.take_pending_start() {
                            debug!("item ready, starting deferred picture-in-picture");
                            self.begin_pip_attempts();
                        }
                    }
                    ItemStatus::Failed(reason) => self.fail(PlaybackError::PlaybackFailure(reason)),
                }
            }
            EngineSignal::ItemDidPlayToEnd { item } => {
                if Some(item) == self.item {
                    self.on_item_ended();
                }
            }
            EngineSignal::TimeControlStatusChanged { status, rate } => self.on_time_control(status, rate),
        }
    }

    fn on_time_control(&mut self, status: TimeControlStatus, rate: f32) {
        let previous = std::mem::replace(&mut self.time_control, status);
        if previous != status {
            self.emit(PlaybackEvent::TimeControlStatusChanged { status });
            if status == TimeControlStatus::WaitingToPlay {
                self.emit(PlaybackEvent::Buffering { waiting: true });
            } else if previous == TimeControlStatus::WaitingToPlay {
                self.emit(PlaybackEvent::Buffering { waiting: false });
            }
        }

        if self.item.is_none() {
            return;
        }

        match status {
            TimeControlStatus::Playing => {
                if (rate - self.requested_rate).abs() > f32::EPSILON {
                    debug!(engine_rate = rate, requested = self.requested_rate, "re-asserting playback rate");
                    self.active.set_rate(self.requested_rate);
                }
                if matches!(self.state, PlaybackState::Ready | PlaybackState::Paused) {
                    self.set_state(PlaybackState::Playing);
                }
                self.inhibit_screen_saver();
            }
            TimeControlStatus::Paused => {
                if self.state == PlaybackState::Playing {
                    self.set_state(PlaybackState::Paused);
                }
                self.release_screen_saver();
            }
            TimeControlStatus::WaitingToPlay => self.release_screen_saver(),
        }

        if let Some(sink) = &self.now_playing {
            sink.set_playing(status == TimeControlStatus::Playing);
        }
        self.sample_watch(false, false);
    }

    fn on_item_ended(&mut self) {
        let Some(intent) = self.intents.live().cloned() else {
            return;
        };
        info!(generation = %intent.generation, video_id = %intent.video.id, "item played to end");

        self.set_state(PlaybackState::Ended);
        self.emit(PlaybackEvent::ItemEnded {
            video_id: intent.video.id.clone(),
        });
        self.release_screen_saver();

        if self.settings.close_last_item_on_playback_end {
            self.sample_watch(true, true);
        }

        match self.settings.end_of_playback {
            EndOfPlaybackAction::Stop => {}
            EndOfPlaybackAction::Loop => {
                self.spawn_seek(intent.generation, Duration::ZERO, SeekTolerance::EXACT, SeekPurpose::Restart);
            }
            EndOfPlaybackAction::CloseItem => {
                self.stop();
                if let Some(sink) = &self.now_playing {
                    sink.clear();
                }
            }
            EndOfPlaybackAction::Advance => {
                self.emit(PlaybackEvent::AdvanceRequested {
                    video_id: intent.video.id,
                });
            }
        }
    }

    // ------------------------------------------------------------------------
    // Sampling
    // ------------------------------------------------------------------------

    fn on_tick(&mut self, kind: SamplerKind) {
        if self.item.is_none() {
            return;
        }
        match kind {
            SamplerKind::Frequent => {
                self.refresh_now_playing();
                let generation = self.intents.current();
                self.try_skip_leading_segment(generation, false);
            }
            SamplerKind::Infrequent => self.sample_watch(false, false),
        }
    }

    /// Seeks past the leading segment if it qualifies at the current position.
    fn try_skip_leading_segment(&mut self, generation: Generation, then_play: bool) -> bool {
        let position = self.active.current_time().unwrap_or_default();
        let Some(segment) = self
            .segments
            .evaluate(generation, position)
        else {
            return false;
        };

        let purpose = SeekPurpose::SegmentSkip {
            segment_id: segment.id.clone(),
            from: position,
            to: segment.end,
            then_play,
        };
        let target = segment.end;
        debug!(%generation, ?position, ?target, "skipping leading segment");

        self.segments.begin_skip(generation);
        let tolerance = SeekTolerance::before_only(self.settings.seek_tolerance_before);
        self.spawn_seek(generation, target, tolerance, purpose);
        true
    }

    fn sample_watch(&mut self, force: bool, finished: bool) {
        // The new backend still reports its pre-restore position.
        if !force && self.preserved.is_restoring() {
            return;
        }
        let Some(intent) = self.intents.live() else {
            return;
        };
        let sample = WatchSample {
            video_id: intent.video.id.clone(),
            position: self.active.current_time(),
            duration: self
                .item_duration
                .filter(|d| !d.is_zero())
                .or_else(|| Some(intent.video.duration).filter(|d| !d.is_zero())),
            finished,
        };
        if force {
            self.watch.force(sample);
        } else {
            self.watch.sample(sample);
        }
    }

    fn refresh_now_playing(&self) {
        let Some(intent) = self.intents.live() else {
            return;
        };
        let position = self.active.current_time().unwrap_or_default();

        if let Some(sink) = &self.now_playing {
            sink.update(NowPlayingInfo {
                video_id: intent.video.id.clone(),
                title: intent.video.title.clone(),
                artwork_url: intent.video.thumbnail.clone(),
                duration: self.item_duration,
                position,
                rate: self.requested_rate,
                live: intent.video.live,
            });
        }

        self.emit(PlaybackEvent::NowPlayingRefresh {
            video_id: intent.video.id.clone(),
            position_ms: position.as_millis() as u64,
            duration_ms: self.item_duration.map(|d| d.as_millis() as u64),
        });
    }

    // ------------------------------------------------------------------------
    // Backend switching
    // ------------------------------------------------------------------------

    #[instrument(skip(self))]
    fn switch_backend(&mut self, to: BackendKind) -> Result<()> {
        let from = self.active.kind();
        if from == to {
            return Ok(());
        }
        let target = self.backends.get(to)?;
        let live = self.intents.live().cloned();

        let capture = live.as_ref().is_some_and(|i| !i.video.live && self.item.is_some());
        self.loader.cancel();
        self.assembler.cancel();
        if let Err(err) = tear_down(self.active.as_ref(), &mut self.preserved, capture) {
            warn!(error = %err, "failed to detach item from outgoing backend");
        }
        self.item = None;
        self.item_duration = None;

        self.active = target;
        info!(%from, %to, "playback backend switched");
        self.emit(PlaybackEvent::BackendSwitched { from, to });

        if self.pip.is_transitioning() && !self.pip.is_active() {
            self.pip.cancel_attempts();
            self.pip.defer_until_switch();
        }
        self.apply_music_mode();

        match live {
            Some(intent) => self.play_stream(intent.video, intent.stream, true),
            None => self.set_state(PlaybackState::Idle),
        }
        Ok(())
    }

    fn set_music_mode(&mut self, enabled: bool) {
        self.music_mode = enabled;
        if enabled && self.pip.is_active() {
            self.pip.stop();
        }
        self.apply_music_mode();
    }

    fn apply_music_mode(&self) {
        self.active.set_visual_tracks_enabled(!self.music_mode);
    }

    // ------------------------------------------------------------------------
    // Picture-in-picture
    // ------------------------------------------------------------------------

    fn request_pip(&mut self) {
        if !self.pip.is_supported() {
            warn!("picture-in-picture requested but the host has no capability");
            return;
        }
        if self.pip.is_active() {
            return;
        }

        if self.active.kind() == BackendKind::Alternate {
            self.pip.defer_until_switch();
            if let Err(err) = self.switch_backend(BackendKind::Hardware) {
                warn!(error = %err, "cannot switch to the hardware backend for picture-in-picture");
                self.pip.take_pending_start();
            }
            return;
        }

        if self.state == PlaybackState::Loading {
            self.pip.defer_until_play();
            return;
        }
        if self.item.is_none() {
            debug!("picture-in-picture requested without an item");
            return;
        }
        self.begin_pip_attempts();
    }

    fn begin_pip_attempts(&mut self) {
        let tx = self.tx.clone();
        self.pip
            .try_start(move |sequence, index| post(&tx, CoreMessage::PipAttempt { sequence, index }));
    }

    fn on_pip_attempt(&mut self, sequence: u64, index: usize) {
        if let AttemptOutcome::Exhausted { attempts } = self.pip.on_attempt(sequence, index) {
            self.emit_pip(PipEvent::AttemptsExhausted { attempts });
        }
    }

    fn on_pip_lifecycle(&mut self, lifecycle: PipLifecycle) {
        let did_start = lifecycle == PipLifecycle::DidStart;
        if let Some(event) = self.pip.on_lifecycle(lifecycle) {
            self.emit_pip(event);
        }

        if did_start && self.settings.close_player_on_opening_pip {
            let tx = self.tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(HIDE_PLAYER_DELAY).await;
                post(&tx, CoreMessage::PipHidePlayer);
            });
        }
    }

    fn restore_user_interface(&mut self, reply: oneshot::Sender<bool>) {
        let has_item = self.item.is_some();
        let presenting = self
            .presentation
            .as_ref()
            .map_or(true, |p| p.is_presenting());

        if has_item && !self.music_mode {
            if let Some(presentation) = &self.presentation {
                presentation.show_player();
            }
        }

        let delay = restore_delay(has_item, presenting);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            post(&tx, CoreMessage::PipRestoreDue { reply });
        });
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    fn set_state(&mut self, to: PlaybackState) {
        if self.state == to {
            return;
        }
        let from = std::mem::replace(&mut self.state, to.clone());
        debug!(%from, %to, "playback state changed");
        self.emit(PlaybackEvent::StateChanged { from, to });
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.emit(CoreEvent::Playback(event));
    }

    fn emit_pip(&self, event: PipEvent) {
        let _ = self.events.emit(CoreEvent::PictureInPicture(event));
    }

    fn inhibit_screen_saver(&mut self) {
        if self.screen_saver_inhibited {
            return;
        }
        if let Some(control) = &self.screen_saver {
            control.inhibit(SCREEN_SAVER_REASON);
        }
        self.screen_saver_inhibited = true;
    }

    fn release_screen_saver(&mut self) {
        if !self.screen_saver_inhibited {
            return;
        }
        if let Some(control) = &self.screen_saver {
            control.release();
        }
        self.screen_saver_inhibited = false;
    }

    fn publish_snapshot(&self) {
        let intent = self.intents.live();
        let snapshot = PlayerSnapshot {
            state: self.state.clone(),
            generation: self.intents.current(),
            backend: self.active.kind(),
            video_id: intent.map(|i| i.video.id.clone()),
            item: self.item.map(|id| id.0),
            position: self.item.and(self.active.current_time()),
            duration: self.item_duration,
            rate: self.requested_rate,
            time_control: self.time_control,
            live: intent.is_some_and(|i| i.video.live),
            music_mode: self.music_mode,
            pip: self.pip.status(),
            preserved_time: self.preserved.get(),
        };
        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    async fn shutdown(&mut self) {
        info!("shutting down player");
        if self.item.is_some() {
            self.sample_watch(true, false);
        }
        self.stop();
        self.publish_snapshot();

        if let Some(samplers) = self.samplers.take() {
            samplers.shutdown().await;
        }
        self.watch.close().await;
    }
}
