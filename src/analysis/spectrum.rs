// Spectrum module - windowed FFT magnitude computation
//
// This module turns a fixed-size time-domain buffer into a magnitude
// spectrum. A Hann window is applied before the transform to reduce
// spectral leakage; only the positive-frequency half of the spectrum is
// returned since the input is real-valued.

use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::{Arc, Mutex};

/// Default FFT window size (about 43 ms at 48 kHz, 46 ms at 44.1 kHz)
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Spectrum analyzer that computes magnitude spectra from audio windows
pub struct SpectrumAnalyzer {
    fft_planner: Arc<Mutex<FftPlanner<f32>>>,
    fft_size: usize,
    /// Hann window (pre-computed)
    window: Vec<f32>,
}

impl SpectrumAnalyzer {
    /// Create a new analyzer for a fixed window size.
    ///
    /// # Arguments
    /// * `fft_size` - FFT window size in samples; must be a power of two
    ///
    /// # Panics
    /// Panics if `fft_size` is not a power of two. Buffer sizing is the
    /// caller's responsibility; a non-power-of-two size is a programming
    /// error, not a runtime condition.
    pub fn new(fft_size: usize) -> Self {
        assert!(
            fft_size.is_power_of_two(),
            "fft_size must be a power of two, got {}",
            fft_size
        );

        // Pre-compute Hann window to reduce spectral leakage
        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - ((2.0 * std::f32::consts::PI * i as f32) / (fft_size as f32 - 1.0)).cos())
            })
            .collect();

        Self {
            fft_planner: Arc::new(Mutex::new(FftPlanner::new())),
            fft_size,
            window,
        }
    }

    /// Window size this analyzer was built for.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Compute the magnitude spectrum of one audio window.
    ///
    /// Applies the Hann window, performs the forward FFT, and returns the
    /// magnitudes of the positive-frequency bins. Input shorter than the
    /// window is zero-padded; extra samples are ignored.
    ///
    /// # Arguments
    /// * `audio` - Audio window (length <= fft_size)
    ///
    /// # Returns
    /// Magnitude spectrum covering 0 Hz to Nyquist (size = fft_size / 2)
    pub fn magnitudes(&self, audio: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = Vec::with_capacity(self.fft_size);

        for (i, &sample) in audio.iter().enumerate() {
            if i < self.fft_size {
                let windowed = sample * self.window[i];
                buffer.push(Complex::new(windowed, 0.0));
            }
        }

        while buffer.len() < self.fft_size {
            buffer.push(Complex::new(0.0, 0.0));
        }

        let mut planner = self.fft_planner.lock().expect("fft planner poisoned");
        let fft = planner.plan_fft_forward(self.fft_size);
        drop(planner);
        fft.process(&mut buffer);

        buffer[..self.fft_size / 2].iter().map(|c| c.norm()).collect()
    }
}
