use std::error::Error;
use std::fmt;
use std::io;

/// Errors surfaced by the core. Non-fatal kinds are folded into logs at the
/// observing site (see `Supervisor`); only `Init`/fatal device loss propagate
/// as a state-machine transition.
#[derive(Debug)]
pub enum ReplayError {
    /// Errors from FFmpeg (encoder/muxer context setup, send/receive packet).
    FFmpeg(ffmpeg_next::Error),
    /// I/O errors (file writes, temp-file rename during save).
    Io(io::Error),
    /// Encoder/pipeline construction failed; terminal for the current start attempt.
    Init(String),
    /// Supplied configuration failed validation after clamping.
    Config(String),
    /// Public-API preconditions violated (e.g. asking for a receiver before start).
    Validation(String),
    /// GPU/device-level failure. `sticky` mirrors the pipeline's `device_lost` flag:
    /// once true, the pipeline instance is unusable until torn down and recreated.
    Device { message: String, sticky: bool },
    /// Desktop-duplication / capture-adapter failure, recoverable via `reinit_duplication`.
    AccessLost(String),
    /// Transient condition the caller should retry on the next tick (pipeline full,
    /// mutex-wait timeout, momentary capture miss).
    Transient(String),
    /// `save()` was rejected: not in `Capturing`, or fewer than `MIN_FRAMES_FOR_SAVE` units.
    SaveRejected(String),
    /// The muxer reported failure, or `save_complete` timed out. Buffer is left intact.
    SaveFailed(String),
    /// Muxer-specific failure distinct from a generic I/O error.
    Mux(String),
    /// Catch-all for anything that doesn't fit the above.
    Other(String),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::FFmpeg(err) => write!(f, "FFmpeg error: {err}"),
            ReplayError::Io(err) => write!(f, "I/O error: {err}"),
            ReplayError::Init(msg) => write!(f, "Initialization error: {msg}"),
            ReplayError::Config(msg) => write!(f, "Configuration error: {msg}"),
            ReplayError::Validation(msg) => write!(f, "Validation error: {msg}"),
            ReplayError::Device { message, sticky } => {
                write!(f, "Device error ({}): {message}", if *sticky { "lost" } else { "transient" })
            }
            ReplayError::AccessLost(msg) => write!(f, "Capture access lost: {msg}"),
            ReplayError::Transient(msg) => write!(f, "Transient error: {msg}"),
            ReplayError::SaveRejected(msg) => write!(f, "Save rejected: {msg}"),
            ReplayError::SaveFailed(msg) => write!(f, "Save failed: {msg}"),
            ReplayError::Mux(msg) => write!(f, "Mux error: {msg}"),
            ReplayError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl Error for ReplayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReplayError::FFmpeg(err) => Some(err),
            ReplayError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ffmpeg_next::Error> for ReplayError {
    fn from(err: ffmpeg_next::Error) -> Self {
        ReplayError::FFmpeg(err)
    }
}

impl From<io::Error> for ReplayError {
    fn from(err: io::Error) -> Self {
        ReplayError::Io(err)
    }
}

impl From<String> for ReplayError {
    fn from(err: String) -> Self {
        ReplayError::Other(err)
    }
}

impl From<&str> for ReplayError {
    fn from(err: &str) -> Self {
        ReplayError::Other(err.to_string())
    }
}

impl ReplayError {
    /// True for errors the caller should retry on the next tick rather than tear anything down.
    pub fn is_transient(&self) -> bool {
        matches!(self, ReplayError::Transient(_))
            || matches!(self, ReplayError::Device { sticky: false, .. })
    }

    /// True for errors that make the encode pipeline instance permanently unusable.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, ReplayError::Device { sticky: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, ReplayError>;
