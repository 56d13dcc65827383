// Audio error types and constants

use crate::error::ErrorCode;
use std::fmt;
use tracing::error;

/// Audio error code constants
///
/// Single source of truth for the numeric codes surfaced to API
/// consumers. Error code range: 1001-1007.
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// BPM value is invalid (must be > 0, typically 40-240)
    pub const BPM_INVALID: i32 = 1001;

    /// Scheduler or capture is already running
    pub const ALREADY_RUNNING: i32 = 1002;

    /// Scheduler or capture is not running
    pub const NOT_RUNNING: i32 = 1003;

    /// No usable audio device exists in this environment
    pub const DEVICE_UNAVAILABLE: i32 = 1004;

    /// Microphone permission denied
    pub const PERMISSION_DENIED: i32 = 1005;

    /// Failed to open an audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1006;

    /// Audio stream failed after it was opened
    pub const STREAM_FAILURE: i32 = 1007;
}

/// Log an audio error with structured context
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioDevice, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-device errors
///
/// Cover device discovery, stream management, and scheduling. Permission
/// and device errors are non-recoverable for the session: report them and
/// stay stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// BPM value is invalid (must be > 0, typically 40-240)
    BpmInvalid { bpm: u32 },

    /// Already running
    AlreadyRunning,

    /// Not running
    NotRunning,

    /// No usable audio device exists in this environment
    DeviceUnavailable { details: String },

    /// Microphone permission denied
    PermissionDenied,

    /// Failed to open an audio stream
    StreamOpenFailed { reason: String },

    /// Stream failed after it was opened
    StreamFailure { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::BpmInvalid { .. } => AudioErrorCodes::BPM_INVALID,
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::DeviceUnavailable { .. } => AudioErrorCodes::DEVICE_UNAVAILABLE,
            AudioError::PermissionDenied => AudioErrorCodes::PERMISSION_DENIED,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::BpmInvalid { bpm } => {
                format!("BPM must be greater than 0 (got {})", bpm)
            }
            AudioError::AlreadyRunning => {
                "Audio already running. Call stop() first.".to_string()
            }
            AudioError::NotRunning => "Audio not running. Call start() first.".to_string(),
            AudioError::DeviceUnavailable { details } => {
                format!("Audio device unavailable: {}", details)
            }
            AudioError::PermissionDenied => {
                "Microphone permission denied. Please grant microphone access.".to_string()
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::StreamFailure {
            reason: err.to_string(),
        }
    }
}
