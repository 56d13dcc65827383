// Audio device boundary
//
// The analysis and scheduling code never touches a platform audio API
// directly; it talks to the two traits below. Production implementations
// are cpal-backed. Deterministic doubles live in crate::testing.
//
// Clocks are the devices' own: both sides count the samples they have
// moved and report time as samples / rate. That clock is monotonic,
// unaffected by wall-clock jitter, and is the timeline every scheduled
// tone and detected onset is expressed in.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::buffer_pool::{capture_pair, CaptureReader};
use super::metronome::render_click;
use crate::config::AudioConfig;
use crate::error::AudioError;

/// A tone to be played at a precise future time on the output clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    /// Tone frequency in Hz
    pub frequency: f32,
    /// Start time in seconds on the output device's clock
    pub start_time: f64,
    /// Tone length in seconds
    pub duration: f64,
}

/// Output side: a monotonic clock plus sample-accurate tone scheduling
pub trait OutputDevice: Send + Sync {
    /// Current time on the device's own clock, in seconds
    fn clock_now(&self) -> f64;

    /// Queue a tone for playback at `tone.start_time`. Times in the past
    /// play immediately; the device never reorders or mutates queued
    /// tones.
    fn schedule_tone(&self, tone: ToneSpec) -> Result<(), AudioError>;
}

/// Input side: a capture stream the session worker drains
///
/// The stream itself stays with its owning thread; `take_reader` hands
/// out the `Send` half that crosses into the worker.
pub trait InputDevice {
    /// Capture sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Take the worker-side reader. Returns an error on the second call;
    /// one session consumes one device.
    fn take_reader(&mut self) -> Result<CaptureReader, AudioError>;
}

// ---------------------------------------------------------------------------
// cpal input
// ---------------------------------------------------------------------------

/// Microphone capture through the default cpal input device
///
/// The callback de-interleaves the first channel into pooled buffers; no
/// allocation or locking happens on the audio thread. Dropping the device
/// stops the stream and releases the hardware, so a session that drops it
/// on stop cannot leak OS audio resources.
pub struct CpalInput {
    _stream: cpal::Stream,
    sample_rate: u32,
    reader: Option<CaptureReader>,
}

impl CpalInput {
    /// Open the default input device and start capturing.
    ///
    /// # Errors
    /// `DeviceUnavailable` when the host has no input device;
    /// `StreamOpenFailed` when the stream cannot be configured or built.
    pub fn open(config: &AudioConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceUnavailable {
                details: "no default input device".to_string(),
            })?;

        let device_config = device
            .default_input_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("failed to get default input config: {:?}", e),
            })?;

        let stream_config: cpal::StreamConfig = device_config.clone().into();
        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels as usize;

        let (mut writer, reader) = capture_pair(config.buffer_count, config.buffer_size);

        let err_fn = |err| tracing::warn!("[CpalInput] stream error: {}", err);

        let stream = match device_config.sample_format() {
            cpal::SampleFormat::F32 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        writer.write(data, channels);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AudioError::StreamOpenFailed {
                    reason: format!("{:?}", e),
                })?,
            other => {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!("unsupported input sample format {:?}", other),
                })
            }
        };

        stream.play().map_err(|e| AudioError::StreamFailure {
            reason: format!("input start failed: {}", e),
        })?;

        tracing::info!(
            "[CpalInput] capturing at {} Hz ({} channel(s))",
            sample_rate,
            channels
        );

        Ok(Self {
            _stream: stream,
            sample_rate,
            reader: Some(reader),
        })
    }
}

impl InputDevice for CpalInput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn take_reader(&mut self) -> Result<CaptureReader, AudioError> {
        self.reader.take().ok_or(AudioError::StreamFailure {
            reason: "capture reader already taken".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// cpal output
// ---------------------------------------------------------------------------

/// One tone queued for mixing, pre-rendered to samples
struct PendingTone {
    start_frame: u64,
    samples: Vec<f32>,
    cursor: usize,
}

/// Shared state between the output callback and the scheduler thread
///
/// Implements [`OutputDevice`]: the frame counter advanced by the callback
/// is the clock, and scheduling a tone pre-renders it and queues it at its
/// start frame. The callback uses `try_lock` on the queue; a contended
/// poll is skipped rather than blocking the audio thread.
pub struct ToneMixer {
    sample_rate: u32,
    frames: AtomicU64,
    tones: Mutex<Vec<PendingTone>>,
}

impl ToneMixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frames: AtomicU64::new(0),
            tones: Mutex::new(Vec::new()),
        }
    }

    /// Mix all due tones into an interleaved output block and advance the
    /// clock. Called from the output callback.
    pub fn mix_into(&self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frame_count = data.len() / channels;
        let block_start = self.frames.load(Ordering::Relaxed);

        data.fill(0.0);

        if let Ok(mut tones) = self.tones.try_lock() {
            for tone in tones.iter_mut() {
                for i in 0..frame_count {
                    let frame = block_start + i as u64;
                    if frame < tone.start_frame || tone.cursor >= tone.samples.len() {
                        continue;
                    }
                    let value = tone.samples[tone.cursor];
                    tone.cursor += 1;
                    for ch in 0..channels {
                        data[i * channels + ch] += value;
                    }
                }
            }
            tones.retain(|t| t.cursor < t.samples.len());
        }

        self.frames.fetch_add(frame_count as u64, Ordering::Relaxed);
    }
}

impl OutputDevice for ToneMixer {
    fn clock_now(&self) -> f64 {
        self.frames.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    fn schedule_tone(&self, tone: ToneSpec) -> Result<(), AudioError> {
        let samples = render_click(self.sample_rate, tone.frequency, tone.duration);
        let start_frame = (tone.start_time.max(0.0) * self.sample_rate as f64) as u64;

        let mut tones = self.tones.lock().map_err(|_| AudioError::StreamFailure {
            reason: "tone queue lock poisoned".to_string(),
        })?;
        tones.push(PendingTone {
            start_frame,
            samples,
            cursor: 0,
        });
        Ok(())
    }
}

/// Click playback through the default cpal output device
///
/// Owns the stream; hands out an `Arc<ToneMixer>` handle that the
/// scheduler thread talks to. Dropping the device stops playback.
pub struct CpalOutput {
    _stream: cpal::Stream,
    mixer: Arc<ToneMixer>,
}

impl CpalOutput {
    /// Open the default output device and start the mixing stream.
    pub fn open() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceUnavailable {
                details: "no default output device".to_string(),
            })?;

        let device_config = device
            .default_output_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("failed to get default output config: {:?}", e),
            })?;

        let stream_config: cpal::StreamConfig = device_config.clone().into();
        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels as usize;

        let mixer = Arc::new(ToneMixer::new(sample_rate));
        let callback_mixer = Arc::clone(&mixer);

        let err_fn = |err| tracing::warn!("[CpalOutput] stream error: {}", err);

        let stream = match device_config.sample_format() {
            cpal::SampleFormat::F32 => device
                .build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        callback_mixer.mix_into(data, channels);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AudioError::StreamOpenFailed {
                    reason: format!("{:?}", e),
                })?,
            other => {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!("unsupported output sample format {:?}", other),
                })
            }
        };

        stream.play().map_err(|e| AudioError::StreamFailure {
            reason: format!("output start failed: {}", e),
        })?;

        tracing::info!("[CpalOutput] playing at {} Hz", sample_rate);

        Ok(Self {
            _stream: stream,
            mixer,
        })
    }

    /// Scheduler-facing handle; `Send + Sync`, unlike the stream itself.
    pub fn mixer(&self) -> Arc<ToneMixer> {
        Arc::clone(&self.mixer)
    }
}
