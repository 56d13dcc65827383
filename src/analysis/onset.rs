// Onset module - RMS energy onset detection
//
// Detects note onsets from frequency-domain energy. Each poll maps the
// magnitude spectrum onto a [0, 1] decibel scale, computes the RMS across
// bins, and records an onset when the energy crosses a fixed threshold. A
// refractory gap keeps one pluck's sustained energy from registering as
// several onsets.
//
// The dB mapping matters: a pluck's attack transient is broadband and
// lifts many bins at once, so its RMS clears the threshold, while a
// sustained tone concentrates energy in a few bins and stays below it.
// This makes the detector an attack detector, not a loudness gate.

use crate::config::OnsetConfig;

/// Bin level mapped to 0.0 on the normalized scale
const MIN_DB: f32 = -100.0;

/// Bin level mapped to 1.0 on the normalized scale
const MAX_DB: f32 = -30.0;

/// A detected note onset within one practice session
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteOnset {
    /// Seconds since the session started
    pub relative_time: f64,
    /// Normalized RMS energy at the moment of detection, in [0, 1]
    pub energy: f32,
    /// Audio-clock timestamp the onset was observed at
    pub clock_timestamp: f64,
}

/// Energy-threshold onset detector with a refractory gap
///
/// State is reset at session start; onsets come out in strictly
/// non-decreasing time order because the clock is monotonic and each
/// accepted onset pushes the earliest possible next one out by the
/// refractory interval.
pub struct EnergyOnsetDetector {
    /// Normalized RMS threshold an onset must exceed
    threshold: f32,
    /// Minimum seconds between two accepted onsets
    refractory_gap: f64,
    /// Full-scale magnitude reference used for normalization
    magnitude_reference: f32,
    /// Audio-clock time the current session started at
    session_start: f64,
    /// Clock timestamp of the last accepted onset
    last_onset_clock: Option<f64>,
}

impl EnergyOnsetDetector {
    /// Create a detector for spectra of the given FFT size.
    ///
    /// The 0 dB reference is the peak magnitude a full-scale sine produces
    /// under a Hann window (about N/4), so the configured threshold keeps
    /// its meaning across window sizes.
    pub fn new(fft_size: usize, config: &OnsetConfig) -> Self {
        Self {
            threshold: config.energy_threshold,
            refractory_gap: config.refractory_gap_s,
            magnitude_reference: (fft_size as f32 / 4.0).max(1.0),
            session_start: 0.0,
            last_onset_clock: None,
        }
    }

    /// Reset detector state for a new session starting at `session_start`
    /// on the audio clock.
    pub fn reset(&mut self, session_start: f64) {
        self.session_start = session_start;
        self.last_onset_clock = None;
    }

    /// Examine one magnitude spectrum; return an onset if the energy
    /// crosses the threshold outside the refractory window.
    ///
    /// # Arguments
    /// * `magnitudes` - Magnitude spectrum from the analyzer
    /// * `clock_now` - Current audio-clock time in seconds
    pub fn poll(&mut self, magnitudes: &[f32], clock_now: f64) -> Option<NoteOnset> {
        let rms = self.normalized_rms(magnitudes);

        if rms <= self.threshold {
            return None;
        }

        if let Some(last) = self.last_onset_clock {
            if clock_now - last < self.refractory_gap {
                return None;
            }
        }

        self.last_onset_clock = Some(clock_now);
        let onset = NoteOnset {
            relative_time: clock_now - self.session_start,
            energy: rms,
            clock_timestamp: clock_now,
        };
        tracing::debug!(
            "[OnsetDetector] Onset at {:.3}s (energy {:.3})",
            onset.relative_time,
            onset.energy
        );
        Some(onset)
    }

    /// RMS of the spectrum after normalizing each bin to [0, 1].
    pub fn normalized_rms(&self, magnitudes: &[f32]) -> f32 {
        if magnitudes.is_empty() {
            return 0.0;
        }

        let sum_squares: f32 = magnitudes
            .iter()
            .map(|&m| {
                let normalized = self.normalize(m);
                normalized * normalized
            })
            .sum();

        (sum_squares / magnitudes.len() as f32).sqrt()
    }

    /// Map one magnitude onto the [0, 1] dB scale.
    fn normalize(&self, magnitude: f32) -> f32 {
        if magnitude <= 0.0 {
            return 0.0;
        }
        let db = 20.0 * (magnitude / self.magnitude_reference).log10();
        ((db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0)
    }
}
