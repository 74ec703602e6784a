//! # Asset Loader
//!
//! Resolves a single-asset stream URL into a [`LoadedAsset`] through the
//! host's [`AssetSource`].
//!
//! A load is considered successful only when every required property
//! (tracks, playability, duration) reports `Loaded` and the asset says it is
//! playable. Anything else is a [`PlaybackError::LoadFailure`], never a
//! silent stall.
//!
//! Starting a new load aborts the task of the previous one. The owner loop
//! still compares generations, because a completion may already be queued
//! when the abort lands.

use crate::error::{PlaybackError, Result};
use crate::intent::Generation;
use bridge_traits::{
    AssetLoadReport, AssetSource, LoadedAsset, PropertyStatus, REQUIRED_ASSET_PROPERTIES,
};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use url::Url;

/// Loads `url` and validates the report.
#[instrument(skip(source, url), fields(url = %redact_url(url)))]
pub async fn load_asset(source: &dyn AssetSource, url: &Url) -> Result<LoadedAsset> {
    let report = source
        .load(url, &REQUIRED_ASSET_PROPERTIES)
        .await
        .map_err(|e| PlaybackError::LoadFailure(e.to_string()))?;

    validate_report(report)
}

/// Checks every required property and the playable flag.
pub fn validate_report(report: AssetLoadReport) -> Result<LoadedAsset> {
    for property in REQUIRED_ASSET_PROPERTIES {
        match report.status(property) {
            PropertyStatus::Loaded => {}
            PropertyStatus::Failed(reason) => {
                return Err(PlaybackError::LoadFailure(format!(
                    "{:?} failed to load: {}",
                    property, reason
                )));
            }
            PropertyStatus::Cancelled => {
                return Err(PlaybackError::LoadFailure(format!(
                    "{:?} loading was cancelled",
                    property
                )));
            }
            PropertyStatus::Unknown => {
                return Err(PlaybackError::LoadFailure(format!(
                    "{:?} was never reported",
                    property
                )));
            }
        }
    }

    if !report.asset.playable {
        return Err(PlaybackError::LoadFailure(format!(
            "asset is not playable: {}",
            redact_url(&report.asset.url)
        )));
    }

    if report.asset.duration.is_none() {
        debug!(url = %redact_url(&report.asset.url), "asset reports an indefinite duration");
    }

    Ok(report.asset)
}

/// Spawns asset loads, keeping at most one in flight.
pub struct AssetLoader {
    source: Arc<dyn AssetSource>,
    in_flight: Option<(Generation, JoinHandle<()>)>,
}

impl AssetLoader {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            in_flight: None,
        }
    }

    /// Starts loading `url` for `generation`, superseding any earlier load.
    ///
    /// `on_done` runs on the load task and should only forward the result to
    /// the owner loop.
    pub fn load<F>(&mut self, generation: Generation, url: Url, on_done: F)
    where
        F: FnOnce(Generation, Result<LoadedAsset>) + Send + 'static,
    {
        self.cancel();

        debug!(%generation, url = %redact_url(&url), "starting asset load");
        let source = Arc::clone(&self.source);
        let handle = tokio::spawn(async move {
            let result = load_asset(source.as_ref(), &url).await;
            if let Err(err) = &result {
                warn!(%generation, error = %err, "asset load failed");
            }
            on_done(generation, result);
        });

        self.in_flight = Some((generation, handle));
    }

    /// Aborts the in-flight load, if any.
    pub fn cancel(&mut self) {
        if let Some((generation, handle)) = self.in_flight.take() {
            if !handle.is_finished() {
                debug!(%generation, "aborting superseded asset load");
                handle.abort();
            }
        }
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}
