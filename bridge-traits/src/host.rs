//! Host presentation hooks: now-playing info, screen-saver suppression and
//! player visibility. All calls are fire-and-forget.

use std::time::Duration;
use url::Url;

/// Snapshot pushed to the system now-playing center.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingInfo {
    pub video_id: String,
    pub title: String,
    pub artwork_url: Option<Url>,
    pub duration: Option<Duration>,
    pub position: Duration,
    pub rate: f32,
    pub live: bool,
}

/// System now-playing center (lock screen, media keys).
pub trait NowPlayingSink: Send + Sync {
    fn update(&self, info: NowPlayingInfo);

    fn set_playing(&self, playing: bool);

    fn clear(&self);
}

/// Screen-saver / display-sleep suppression.
pub trait ScreenSaverControl: Send + Sync {
    fn inhibit(&self, reason: &str);

    fn release(&self);
}

/// Visibility of the full player UI.
pub trait PresentationHost: Send + Sync {
    fn show_player(&self);

    fn hide_player(&self);

    fn is_presenting(&self) -> bool;
}
