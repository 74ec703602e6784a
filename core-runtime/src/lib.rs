//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the video playback core:
//! - Logging and tracing infrastructure
//! - Player configuration and bridge wiring
//! - Event bus for playback observers
//!
//! ## Overview
//!
//! `core-playback` depends on this crate for everything that is not playback
//! logic proper: how it is configured, how it logs, and how it tells
//! transport controls, buffering UI and other observers what happened.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
