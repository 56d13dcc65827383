//! Deterministic test doubles and signal builders
//!
//! The timing-sensitive parts of the crate are tested against devices
//! whose clocks are advanced by hand: `MockOutput` records every scheduled
//! tone, and `ScriptedInput` replays a prepared sample buffer through the
//! same capture plumbing the live device uses.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::audio::buffer_pool::{capture_pair, CaptureReader};
use crate::audio::device::{InputDevice, OutputDevice, ToneSpec};
use crate::error::AudioError;

/// Output double with a manually advanced clock
///
/// `schedule_tone` records the `ToneSpec` instead of rendering audio, so
/// tests can assert on the exact beat plan.
pub struct MockOutput {
    clock: Mutex<f64>,
    scheduled: Mutex<Vec<ToneSpec>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self {
            clock: Mutex::new(0.0),
            scheduled: Mutex::new(Vec::new()),
        }
    }

    /// Move the device clock to an absolute time.
    pub fn set_clock(&self, now: f64) {
        *self.clock.lock().expect("mock clock poisoned") = now;
    }

    /// Every tone scheduled so far, in scheduling order.
    pub fn scheduled(&self) -> Vec<ToneSpec> {
        self.scheduled.lock().expect("mock schedule poisoned").clone()
    }
}

impl Default for MockOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDevice for MockOutput {
    fn clock_now(&self) -> f64 {
        *self.clock.lock().expect("mock clock poisoned")
    }

    fn schedule_tone(&self, tone: ToneSpec) -> Result<(), AudioError> {
        self.scheduled
            .lock()
            .expect("mock schedule poisoned")
            .push(tone);
        Ok(())
    }
}

/// Input double that replays a prepared recording
///
/// The samples are pre-split into capture buffers and loaded into the same
/// queue pair the cpal callback feeds, so the session worker exercises the
/// real read/recycle path.
pub struct ScriptedInput {
    sample_rate: u32,
    reader: Option<CaptureReader>,
}

impl ScriptedInput {
    pub fn new(samples: &[f32], sample_rate: u32, buffer_size: usize) -> Self {
        let buffer_count = samples.len().div_ceil(buffer_size).max(1) + 1;
        let (mut writer, reader) = capture_pair(buffer_count, buffer_size);

        for chunk in samples.chunks(buffer_size) {
            writer.write(chunk, 1);
        }

        Self {
            sample_rate,
            reader: Some(reader),
        }
    }
}

impl InputDevice for ScriptedInput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn take_reader(&mut self) -> Result<CaptureReader, AudioError> {
        self.reader.take().ok_or(AudioError::StreamFailure {
            reason: "capture reader already taken".to_string(),
        })
    }
}

/// Pure sine wave at full scale
pub fn sine_wave(sample_rate: u32, frequency: f32, duration_samples: usize) -> Vec<f32> {
    (0..duration_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// A plucked-note burst: a broadband attack transient followed by a
/// harmonic-rich tone with an exponential decay
///
/// The attack transient is 5 ms of seeded white noise, mirroring the wide
/// spectral splatter a real pluck produces; without it the burst would be
/// purely tonal and no energy-based attack detector would see it.
pub fn pluck_burst(sample_rate: u32, frequency: f32, duration_samples: usize) -> Vec<f32> {
    let decay_tau = duration_samples as f32 / 4.0;
    let attack_samples = (sample_rate as usize * 5 / 1000).min(duration_samples);
    let mut rng = StdRng::seed_from_u64(42);

    (0..duration_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let w = 2.0 * std::f32::consts::PI * frequency * t;
            let envelope = (-(i as f32) / decay_tau).exp();
            let tone = envelope * (w.sin() + 0.5 * (2.0 * w).sin() + 0.25 * (3.0 * w).sin()) / 1.75;
            let transient = if i < attack_samples {
                rng.gen_range(-0.45..0.45)
            } else {
                0.0
            };
            (tone + transient).clamp(-1.0, 1.0)
        })
        .collect()
}

/// Silence of the given length
pub fn silence(duration_samples: usize) -> Vec<f32> {
    vec![0.0; duration_samples]
}

/// A recording with pluck bursts at the given sample offsets
pub fn recording_with_plucks(
    total_samples: usize,
    sample_rate: u32,
    frequency: f32,
    pluck_offsets: &[usize],
    pluck_samples: usize,
) -> Vec<f32> {
    let mut signal = silence(total_samples);
    let burst = pluck_burst(sample_rate, frequency, pluck_samples);

    for &offset in pluck_offsets {
        for (i, &sample) in burst.iter().enumerate() {
            if let Some(slot) = signal.get_mut(offset + i) {
                *slot += sample;
            }
        }
    }

    signal
}
