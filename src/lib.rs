//! Workspace facade crate.
//!
//! Host applications depend on `vpc-workspace` and enable the `playback`
//! feature instead of wiring `core-playback`, `core-runtime` and
//! `bridge-traits` one by one.

#[cfg(feature = "playback")]
pub use bridge_traits;
#[cfg(feature = "playback")]
pub use core_playback;
#[cfg(feature = "playback")]
pub use core_runtime;
