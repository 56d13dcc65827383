// Analysis module - DSP pipeline for pitch and onset detection
//
// Orchestrates the per-frame pipeline: a fixed-size sample frame goes
// through the spectrum analyzer once, and the resulting magnitudes feed
// both the HPS pitch estimator and the energy onset detector.
//
// Pipeline: frame -> SpectrumAnalyzer -> (HpsEstimator | EnergyOnsetDetector)

pub mod hps;
pub mod onset;
pub mod scoring;
pub mod spectrum;

use crate::config::{AnalysisConfig, OnsetConfig};

use hps::{HpsEstimator, PitchEstimate};
use onset::{EnergyOnsetDetector, NoteOnset};
use spectrum::SpectrumAnalyzer;

/// Result of analyzing one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Pitch estimate for the frame
    pub pitch: PitchEstimate,
    /// Onset detected in this frame, if any
    pub onset: Option<NoteOnset>,
    /// Normalized spectral RMS of the frame (level-meter datum)
    pub rms: f32,
    /// Audio-clock time the frame ends at, in seconds
    pub clock: f64,
}

/// Per-frame analysis pipeline
///
/// Sample rate and FFT size are fixed for the lifetime of the analyzer;
/// changing either means tearing it down and building a new one.
pub struct FrameAnalyzer {
    analyzer: SpectrumAnalyzer,
    estimator: HpsEstimator,
    onset_detector: EnergyOnsetDetector,
    fft_size: usize,
}

impl FrameAnalyzer {
    /// Build the pipeline for one analysis session.
    pub fn new(sample_rate: u32, analysis: &AnalysisConfig, onset: &OnsetConfig) -> Self {
        let fft_size = analysis.fft_size;
        Self {
            analyzer: SpectrumAnalyzer::new(fft_size),
            estimator: HpsEstimator::new(sample_rate, fft_size),
            onset_detector: EnergyOnsetDetector::new(fft_size, onset),
            fft_size,
        }
    }

    /// Frame length this pipeline consumes.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Reset session-scoped state; onsets reported after this are timed
    /// relative to `session_start`.
    pub fn reset(&mut self, session_start: f64) {
        self.onset_detector.reset(session_start);
    }

    /// Analyze one frame ending at `clock` seconds on the audio clock.
    pub fn process(&mut self, frame: &[f32], clock: f64) -> FrameReport {
        let magnitudes = self.analyzer.magnitudes(frame);
        let pitch = self.estimator.estimate(&magnitudes);
        let rms = self.onset_detector.normalized_rms(&magnitudes);
        let onset = self.onset_detector.poll(&magnitudes, clock);

        FrameReport {
            pitch,
            onset,
            rms,
            clock,
        }
    }
}

/// One point of the offline pitch track
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchTrackPoint {
    /// Seconds from the start of the recording
    pub time: f64,
    pub estimate: PitchEstimate,
    pub rms: f32,
}

/// Full analysis of a recording
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingAnalysis {
    pub onsets: Vec<NoteOnset>,
    pub pitch_track: Vec<PitchTrackPoint>,
}

/// Run the frame pipeline over a whole recording.
///
/// The clock is synthetic: each frame's timestamp is its end position in
/// samples divided by the sample rate, which makes offline analysis
/// deterministic and aligned with what a live session would have seen.
pub fn analyze_recording(
    samples: &[f32],
    sample_rate: u32,
    analysis: &AnalysisConfig,
    onset: &OnsetConfig,
) -> RecordingAnalysis {
    let mut pipeline = FrameAnalyzer::new(sample_rate, analysis, onset);
    pipeline.reset(0.0);

    let fft_size = pipeline.fft_size();
    let mut result = RecordingAnalysis::default();
    let mut processed = 0usize;

    for frame in samples.chunks_exact(fft_size) {
        processed += fft_size;
        let clock = processed as f64 / sample_rate as f64;
        let report = pipeline.process(frame, clock);

        result.pitch_track.push(PitchTrackPoint {
            time: clock,
            estimate: report.pitch,
            rms: report.rms,
        });
        if let Some(onset) = report.onset {
            result.onsets.push(onset);
        }
    }

    tracing::debug!(
        "[Analysis] Recording analyzed: {} frames, {} onsets",
        result.pitch_track.len(),
        result.onsets.len()
    );

    result
}
