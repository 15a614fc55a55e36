//! # replay-core
//!
//! `replay-core` is the engine behind an instant-replay screen recorder: a
//! cross-device hardware encode pipeline, rolling video/audio sample stores
//! bounded by a configurable retention window, and a supervisor that drives
//! capture, encoding, and on-demand saves.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use replay_core::capture::{PassthroughConverter, SyntheticCaptureAdapter};
//! use replay_core::mux::Mp4Muxer;
//! use replay_core::supervisor::Supervisor;
//! use replay_core::types::config::ReplayConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let supervisor = Supervisor::new(Arc::new(Mp4Muxer::new()));
//!
//! let adapter = Box::new(SyntheticCaptureAdapter::new(1920, 1080));
//! let converter = Box::new(PassthroughConverter::new());
//! supervisor.start(ReplayConfig::default(), adapter, converter)?;
//!
//! // ... let it run ...
//!
//! supervisor.save("clip.mp4".into())?;
//! supervisor.stop()?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod audio;
pub mod capture;
pub mod mux;
pub mod pipeline;
pub mod stores;
pub mod supervisor;
pub mod types;

pub use supervisor::{estimate_ram_mb, Supervisor, SupervisorState};
pub use types::config::{QualityPreset, ReplayConfig};
pub use types::error::{ReplayError, Result};
