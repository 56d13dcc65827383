// HPS module - Harmonic Product Spectrum fundamental-frequency estimation
//
// Plain spectral peak-picking confuses harmonics of low notes with
// fundamentals of high notes. The HPS multiplies downsampled copies of the
// magnitude spectrum so that bins where several harmonics align are
// emphasized, then a guitar-specific octave correction cleans up the
// residual octave errors.
//
// Algorithm:
// 1. hps[i] = prod_{h=1..H} magnitude[i*h], product truncated at the array bound
// 2. argmax(hps) -> frequency = bin * sample_rate / fft_size
// 3. Reject outside [50, 2000] Hz
// 4. Octave correction tuned to guitar string fundamentals (~70-500 Hz)
// 5. Confidence from peak prominence over the HPS vector

/// Number of harmonics folded into the product
const NUM_HARMONICS: usize = 4;

/// A candidate fundamental must itself carry at least this fraction of the
/// strongest bin's magnitude. A bin whose HPS product is large only because
/// its harmonic multiples ride the true peak is a subharmonic artifact, not
/// a fundamental.
const SPECTRAL_PRESENCE_RATIO: f32 = 1e-3;

/// Any estimate outside this range is reported as undetected
const MIN_VALID_HZ: f32 = 50.0;
const MAX_VALID_HZ: f32 = 2000.0;

// Correction bands for standard 6-string guitar tuning. These constants
// encode the instrument's string fundamentals and do not transfer to other
// instruments without re-derivation.
const LOW_STRING_LO: f32 = 70.0;
const LOW_STRING_HI: f32 = 120.0;
const HALVED_TARGET_HI: f32 = 130.0;
const FIRST_HARMONIC_LO: f32 = 150.0;
const FIRST_HARMONIC_HI: f32 = 250.0;
const UPPER_TARGET_LO: f32 = 120.0;
const UPPER_TARGET_HI: f32 = 500.0;

/// Outcome of one pitch estimation pass over a spectral frame
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PitchEstimate {
    /// A reliable fundamental was found
    Detected {
        /// Estimated fundamental frequency in Hz (octave-corrected)
        frequency: f32,
        /// Peak-prominence measure in [0, 1]; not a calibrated probability
        confidence: f32,
    },
    /// No reliable peak in the analyzed frame
    Undetected,
}

impl PitchEstimate {
    /// Detected frequency, if any.
    pub fn frequency(&self) -> Option<f32> {
        match self {
            PitchEstimate::Detected { frequency, .. } => Some(*frequency),
            PitchEstimate::Undetected => None,
        }
    }
}

/// HPS-based fundamental-frequency estimator
///
/// Holds the transform geometry (sample rate and FFT size) needed to map
/// spectrum bins back to frequencies. Stateless between frames.
pub struct HpsEstimator {
    sample_rate: u32,
    fft_size: usize,
}

impl HpsEstimator {
    /// Create an estimator for spectra produced with the given geometry.
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz (e.g., 48000)
    /// * `fft_size` - FFT window size the spectra were computed with
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            sample_rate,
            fft_size,
        }
    }

    /// Estimate the fundamental frequency of one magnitude spectrum.
    ///
    /// # Arguments
    /// * `magnitudes` - Magnitude spectrum (fft_size / 2 bins)
    ///
    /// # Returns
    /// `Detected` with corrected frequency and confidence, or `Undetected`
    /// when no peak passes the validity gate.
    pub fn estimate(&self, magnitudes: &[f32]) -> PitchEstimate {
        if magnitudes.is_empty() {
            return PitchEstimate::Undetected;
        }

        let spectrum_max = magnitudes.iter().cloned().fold(0.0_f32, f32::max);
        if spectrum_max <= 0.0 || !spectrum_max.is_finite() {
            return PitchEstimate::Undetected;
        }
        let presence_gate = spectrum_max * SPECTRAL_PRESENCE_RATIO;

        let hps = harmonic_product_spectrum(magnitudes, NUM_HARMONICS);

        let (peak_index, peak_value) = match hps
            .iter()
            .enumerate()
            .skip(1) // bin 0 is DC
            .filter(|&(i, _)| magnitudes[i] >= presence_gate)
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        {
            Some((i, &v)) => (i, v),
            None => return PitchEstimate::Undetected,
        };

        let raw_freq = peak_index as f32 * self.sample_rate as f32 / self.fft_size as f32;

        if !raw_freq.is_finite() || !(MIN_VALID_HZ..=MAX_VALID_HZ).contains(&raw_freq) {
            return PitchEstimate::Undetected;
        }
        if peak_value <= 0.0 || !peak_value.is_finite() {
            return PitchEstimate::Undetected;
        }

        let frequency = correct_octave(raw_freq);

        let mean_value = hps.iter().sum::<f32>() / hps.len() as f32;
        let confidence = ((peak_value - mean_value) / peak_value).min(1.0).max(0.0);

        PitchEstimate::Detected {
            frequency,
            confidence,
        }
    }
}

/// Compute the harmonic product spectrum of a magnitude spectrum.
///
/// For each bin the magnitudes at integer multiples of its index are
/// multiplied together; multiples past the end of the spectrum are left
/// out of the product, so tail bins fold fewer harmonics.
pub fn harmonic_product_spectrum(magnitudes: &[f32], num_harmonics: usize) -> Vec<f32> {
    let mut hps = vec![1.0_f32; magnitudes.len()];

    for (i, value) in hps.iter_mut().enumerate() {
        for h in 1..=num_harmonics {
            let idx = i * h;
            if idx >= magnitudes.len() {
                break;
            }
            *value *= magnitudes[idx];
        }
    }

    hps
}

/// Apply the guitar-range octave correction to a raw HPS peak frequency.
///
/// Three cases, checked in order:
/// - `[70, 120]` Hz: a true low-string fundamental, accepted as-is.
/// - `[150, 250]` Hz: possibly the first harmonic of a bass string; if the
///   halved frequency lands in `[70, 130]` Hz the half is taken instead.
/// - below 120 Hz: possibly an under-detected higher string; the first of
///   x2/x3/x4 that lands in `[120, 500]` Hz replaces the estimate.
///
/// Anything else passes through unchanged. A wrong correction is silent;
/// there is no detection mechanism for it.
pub fn correct_octave(freq: f32) -> f32 {
    if (LOW_STRING_LO..=LOW_STRING_HI).contains(&freq) {
        return freq;
    }

    if (FIRST_HARMONIC_LO..=FIRST_HARMONIC_HI).contains(&freq) {
        let halved = freq / 2.0;
        if (LOW_STRING_LO..=HALVED_TARGET_HI).contains(&halved) {
            return halved;
        }
        return freq;
    }

    if freq < LOW_STRING_HI {
        for multiple in 2..=4 {
            let raised = freq * multiple as f32;
            if (UPPER_TARGET_LO..=UPPER_TARGET_HI).contains(&raised) {
                return raised;
            }
        }
    }

    freq
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::spectrum::SpectrumAnalyzer;

    fn generate_sine_wave(sample_rate: u32, frequency: f32, duration_samples: usize) -> Vec<f32> {
        (0..duration_samples)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_correct_octave_halves_first_harmonic() {
        // 200 Hz is in [150, 250] and 100 Hz lands in [70, 130]
        assert_eq!(correct_octave(200.0), 100.0);
    }

    #[test]
    fn test_correct_octave_keeps_low_string_fundamental() {
        // 90 Hz is a true low-string fundamental
        assert_eq!(correct_octave(90.0), 90.0);
    }

    #[test]
    fn test_correct_octave_raises_under_detection() {
        // 60 Hz is below 120 and 60 * 2 = 120 lands in [120, 500]
        assert_eq!(correct_octave(60.0), 120.0);
    }

    #[test]
    fn test_correct_octave_passthrough_high() {
        // Well above every correction band
        assert_eq!(correct_octave(600.0), 600.0);
    }

    #[test]
    fn test_hps_partial_products_at_tail() {
        let magnitudes = vec![2.0, 2.0, 2.0, 2.0];
        let hps = harmonic_product_spectrum(&magnitudes, 4);
        assert_eq!(hps.len(), 4);
        // Bin 3: only h=1 stays in range -> product of a single term
        assert_eq!(hps[3], 2.0);
        // Bin 1: h=1..3 in range (indices 1, 2, 3)
        assert_eq!(hps[1], 8.0);
    }

    #[test]
    fn test_estimate_pure_sine_within_one_bin() {
        let sample_rate = 48000;
        let fft_size = 2048;
        let bin_width = sample_rate as f32 / fft_size as f32;
        let analyzer = SpectrumAnalyzer::new(fft_size);
        let estimator = HpsEstimator::new(sample_rate, fft_size);

        // Frequencies chosen away from the octave-correction boundary zones
        for &frequency in &[600.0_f32, 750.0, 1000.0, 1500.0] {
            let signal = generate_sine_wave(sample_rate, frequency, fft_size);
            let spectrum = analyzer.magnitudes(&signal);

            match estimator.estimate(&spectrum) {
                PitchEstimate::Detected {
                    frequency: detected,
                    confidence,
                } => {
                    assert!(
                        (detected - frequency).abs() <= bin_width,
                        "Detected {} Hz, expected within {} Hz of {} Hz",
                        detected,
                        bin_width,
                        frequency
                    );
                    assert!((0.0..=1.0).contains(&confidence));
                }
                PitchEstimate::Undetected => {
                    panic!("Expected detection for {} Hz sine", frequency)
                }
            }
        }
    }

    #[test]
    fn test_estimate_rejects_silence() {
        let estimator = HpsEstimator::new(48000, 2048);
        let spectrum = vec![0.0; 1024];
        assert_eq!(estimator.estimate(&spectrum), PitchEstimate::Undetected);
    }

    #[test]
    fn test_estimate_rejects_out_of_range_peak() {
        let sample_rate = 48000;
        let fft_size = 2048;
        let analyzer = SpectrumAnalyzer::new(fft_size);
        let estimator = HpsEstimator::new(sample_rate, fft_size);

        // 5 kHz is far above the 2 kHz validity ceiling
        let signal = generate_sine_wave(sample_rate, 5000.0, fft_size);
        let spectrum = analyzer.magnitudes(&signal);
        assert_eq!(estimator.estimate(&spectrum), PitchEstimate::Undetected);
    }

    #[test]
    fn test_estimate_detects_harmonic_rich_tone() {
        let sample_rate = 48000;
        let fft_size = 2048;
        let analyzer = SpectrumAnalyzer::new(fft_size);
        let estimator = HpsEstimator::new(sample_rate, fft_size);

        // Fundamental plus two harmonics, as a plucked string produces
        let fundamental = 660.0_f32;
        let signal: Vec<f32> = (0..fft_size)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let w = 2.0 * std::f32::consts::PI * fundamental * t;
                w.sin() + 0.5 * (2.0 * w).sin() + 0.25 * (3.0 * w).sin()
            })
            .collect();
        let spectrum = analyzer.magnitudes(&signal);

        let bin_width = sample_rate as f32 / fft_size as f32;
        match estimator.estimate(&spectrum) {
            PitchEstimate::Detected { frequency, .. } => {
                assert!(
                    (frequency - fundamental).abs() <= bin_width,
                    "Detected {} Hz for {} Hz tone",
                    frequency,
                    fundamental
                );
            }
            PitchEstimate::Undetected => panic!("Expected detection"),
        }
    }
}
