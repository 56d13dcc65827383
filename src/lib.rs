// Legato Trainer Core - guitar practice analysis engine
// Pitch detection, onset tracking, metronome scheduling, and practice scoring

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod remote;
pub mod session;
pub mod tab;
pub mod testing;

// Re-exports for convenience
pub use analysis::hps::PitchEstimate;
pub use analysis::onset::NoteOnset;
pub use analysis::scoring::{score_session, ScoreResult};
pub use analysis::{analyze_recording, FrameAnalyzer, RecordingAnalysis};
pub use config::AppConfig;
pub use error::{AudioError, ErrorCode, SessionError};
pub use remote::{PracticeRecord, ScoringClient};
pub use session::{PracticeSession, SessionEvent};
pub use tab::{ExpectedNote, Tablature, Technique};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Verify the re-exported surface is reachable; this pins the
        // crate's public module hierarchy.
        let _ = AppConfig::default();
        let _ = ScoreResult::default();
        let _ = PitchEstimate::Undetected;
    }
}
