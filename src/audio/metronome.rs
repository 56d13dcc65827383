//! Metronome - click timing math and tone synthesis
//!
//! Deterministic click generation for tempo training:
//! - Beat interval arithmetic shared by the scheduler and the scorer
//! - Accent selection (beat 0 of each bar is accented)
//! - Click tone rendering: a short sine with a linear attack and an
//!   exponential decay, pitched higher on the accented beat
//!
//! All functions are pure and allocation is confined to `render_click`.

/// Attack portion of the click envelope in seconds
const CLICK_ATTACK_S: f64 = 0.005;

/// Decay time constant as a fraction of the click duration
const CLICK_DECAY_FRACTION: f64 = 0.2;

/// Seconds between consecutive beats at the given tempo.
///
/// # Examples
/// ```
/// use legato_trainer::audio::metronome::beat_interval;
/// assert_eq!(beat_interval(120), 0.5);
/// assert_eq!(beat_interval(60), 1.0);
/// ```
#[inline]
pub fn beat_interval(bpm: u32) -> f64 {
    60.0 / bpm as f64
}

/// Whether the given beat is the accented first beat of a bar.
///
/// # Examples
/// ```
/// use legato_trainer::audio::metronome::is_accent;
/// assert!(is_accent(0, 4));
/// assert!(!is_accent(1, 4));
/// assert!(is_accent(4, 4));
/// ```
#[inline]
pub fn is_accent(beat_index: u64, beats_per_bar: u32) -> bool {
    beats_per_bar > 0 && beat_index % beats_per_bar as u64 == 0
}

/// Click frequency for a beat: the accent frequency on bar starts, the
/// regular beat frequency otherwise.
#[inline]
pub fn click_frequency(
    beat_index: u64,
    beats_per_bar: u32,
    accent_hz: f32,
    beat_hz: f32,
) -> f32 {
    if is_accent(beat_index, beats_per_bar) {
        accent_hz
    } else {
        beat_hz
    }
}

/// Render a click tone as mono samples.
///
/// The envelope rises linearly over the first 5 ms and then decays
/// exponentially, so the click has a defined attack without an audible
/// discontinuity at either end.
///
/// # Arguments
/// * `sample_rate` - Sample rate in Hz (typically 48000)
/// * `frequency` - Tone frequency in Hz
/// * `duration_s` - Total click length in seconds (typically 0.1-0.2)
pub fn render_click(sample_rate: u32, frequency: f32, duration_s: f64) -> Vec<f32> {
    let num_samples = (sample_rate as f64 * duration_s) as usize;
    let attack_samples = ((sample_rate as f64 * CLICK_ATTACK_S) as usize).max(1);
    let decay_tau = (duration_s * CLICK_DECAY_FRACTION).max(f64::EPSILON);

    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let envelope = if i < attack_samples {
                i as f64 / attack_samples as f64
            } else {
                let since_attack = t - CLICK_ATTACK_S;
                (-since_attack / decay_tau).exp()
            };
            let phase = 2.0 * std::f64::consts::PI * frequency as f64 * t;
            (envelope * phase.sin()) as f32
        })
        .collect()
}
