// Practice-session error types and constants

use crate::error::ErrorCode;
use std::fmt;
use tracing::error;

/// Session error code constants
///
/// Error code range: 2001-2004.
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// A practice session is already running
    pub const ALREADY_RUNNING: i32 = 2001;

    /// No practice session is running
    pub const NOT_RUNNING: i32 = 2002;

    /// The lesson tablature has no notes to practice
    pub const EMPTY_TAB: i32 = 2003;

    /// The requested chunk index does not exist in the tablature
    pub const CHUNK_OUT_OF_RANGE: i32 = 2004;

    /// An audio-device error prevented the session from running
    pub const AUDIO_FAILURE: i32 = 2005;
}

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=PracticeSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Practice-session lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A practice session is already running
    AlreadyRunning,

    /// No practice session is running
    NotRunning,

    /// The lesson tablature has no notes to practice
    EmptyTab,

    /// The requested chunk index does not exist in the tablature
    ChunkOutOfRange { chunk: usize, available: usize },

    /// An audio-device error prevented the session from running
    Audio { source: crate::error::AudioError },
}

impl From<crate::error::AudioError> for SessionError {
    fn from(source: crate::error::AudioError) -> Self {
        SessionError::Audio { source }
    }
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::AlreadyRunning => SessionErrorCodes::ALREADY_RUNNING,
            SessionError::NotRunning => SessionErrorCodes::NOT_RUNNING,
            SessionError::EmptyTab => SessionErrorCodes::EMPTY_TAB,
            SessionError::ChunkOutOfRange { .. } => SessionErrorCodes::CHUNK_OUT_OF_RANGE,
            SessionError::Audio { .. } => SessionErrorCodes::AUDIO_FAILURE,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::AlreadyRunning => {
                "Practice session already running. Call stop() first.".to_string()
            }
            SessionError::NotRunning => {
                "No practice session running. Call start() first.".to_string()
            }
            SessionError::EmptyTab => "Lesson tablature has no notes.".to_string(),
            SessionError::ChunkOutOfRange { chunk, available } => {
                format!(
                    "Chunk {} does not exist ({} chunks available)",
                    chunk, available
                )
            }
            SessionError::Audio { source } => {
                format!("Audio failure: {}", source.message())
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}
