//! Look-ahead click scheduler
//!
//! Scheduling sounds directly from a coarse wall-clock timer produces
//! audible jitter. Instead, a ~25 ms poll loop schedules every beat that
//! falls inside a short look-ahead window onto the output device's own
//! sample clock, so playback timing is decoupled from timer granularity.
//!
//! State machine: Stopped -> Running (start: reset beat index, prime the
//! next beat just past "now", spawn the poll loop) -> Stopped (stop:
//! cancel the loop; idempotent). BPM changes apply only to beats scheduled
//! after the change; beats already inside the look-ahead window keep
//! their times.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::device::{OutputDevice, ToneSpec};
use super::metronome::{beat_interval, click_frequency};
use crate::config::SchedulerConfig;
use crate::error::{log_audio_error, AudioError};

/// Offset of the first beat past the clock reading at start, in seconds
const START_EPSILON_S: f64 = 0.005;

/// A beat that has been handed to the output device
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledBeat {
    /// Zero-based beat number since start
    pub beat_index: u64,
    /// Scheduled click time on the output device's clock, in seconds
    pub time: f64,
}

/// Scheduling state advanced by each poll
///
/// Separated from the thread management so tests can drive it against a
/// manual clock, one poll at a time.
pub struct SchedulerCore {
    device: Arc<dyn OutputDevice>,
    config: SchedulerConfig,
    bpm: Arc<AtomicU32>,
    next_beat_time: f64,
    beat_index: u64,
}

impl SchedulerCore {
    pub fn new(device: Arc<dyn OutputDevice>, config: SchedulerConfig, bpm: Arc<AtomicU32>) -> Self {
        Self {
            device,
            config,
            bpm,
            next_beat_time: 0.0,
            beat_index: 0,
        }
    }

    /// Reset for a fresh run: beat 0 lands just past the current clock.
    pub fn prime(&mut self) {
        self.beat_index = 0;
        self.next_beat_time = self.device.clock_now() + START_EPSILON_S;
    }

    /// Schedule every beat inside the look-ahead window.
    ///
    /// Returns the beats scheduled by this poll, strictly increasing in
    /// time and advancing by `60/bpm` from one to the next.
    pub fn poll(&mut self) -> Result<Vec<ScheduledBeat>, AudioError> {
        let horizon = self.device.clock_now() + self.config.lookahead_s;
        let mut scheduled = Vec::new();

        while self.next_beat_time < horizon {
            let frequency = click_frequency(
                self.beat_index,
                self.config.beats_per_bar,
                self.config.accent_frequency_hz,
                self.config.beat_frequency_hz,
            );

            self.device.schedule_tone(ToneSpec {
                frequency,
                start_time: self.next_beat_time,
                duration: self.config.click_duration_s,
            })?;

            scheduled.push(ScheduledBeat {
                beat_index: self.beat_index,
                time: self.next_beat_time,
            });

            // Read BPM per beat so a tempo change takes effect on the next
            // scheduled beat, never on already-scheduled ones
            let bpm = self.bpm.load(Ordering::Relaxed).max(1);
            self.next_beat_time += beat_interval(bpm);
            self.beat_index += 1;
        }

        Ok(scheduled)
    }
}

/// Metronome click scheduler with its own poll thread
pub struct ClickScheduler {
    device: Arc<dyn OutputDevice>,
    config: SchedulerConfig,
    bpm: Arc<AtomicU32>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ClickScheduler {
    /// Create a scheduler in the `Stopped` state.
    pub fn new(device: Arc<dyn OutputDevice>, config: SchedulerConfig, bpm: u32) -> Self {
        Self {
            device,
            config,
            bpm: Arc::new(AtomicU32::new(bpm)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Start clicking. Fails if already running or the BPM is invalid; a
    /// failed start leaves the scheduler stopped.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }
        let bpm = self.bpm.load(Ordering::Relaxed);
        if bpm == 0 {
            return Err(AudioError::BpmInvalid { bpm });
        }

        self.running.store(true, Ordering::SeqCst);

        let mut core = SchedulerCore::new(
            Arc::clone(&self.device),
            self.config.clone(),
            Arc::clone(&self.bpm),
        );
        let running = Arc::clone(&self.running);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        let handle = thread::spawn(move || {
            tracing::info!("[ClickScheduler] poll loop started");
            core.prime();
            while running.load(Ordering::SeqCst) {
                if let Err(err) = core.poll() {
                    log_audio_error(&err, "scheduler poll");
                    running.store(false, Ordering::SeqCst);
                    break;
                }
                thread::sleep(poll_interval);
            }
            tracing::info!("[ClickScheduler] poll loop stopped");
        });

        self.worker = Some(handle);
        Ok(())
    }

    /// Stop clicking. Safe to call repeatedly or when never started.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::warn!("[ClickScheduler] poll thread panicked");
            }
        }
    }

    /// Change the tempo for subsequently scheduled beats. Beats already
    /// inside the look-ahead window keep their times; callers that need
    /// an immediate change must stop and restart.
    pub fn set_bpm(&self, bpm: u32) -> Result<(), AudioError> {
        if bpm == 0 {
            return Err(AudioError::BpmInvalid { bpm });
        }
        self.bpm.store(bpm, Ordering::Relaxed);
        Ok(())
    }

    pub fn bpm(&self) -> u32 {
        self.bpm.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for ClickScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockOutput;

    fn test_config() -> SchedulerConfig {
        SchedulerConfig::default()
    }

    #[test]
    fn test_ten_seconds_at_120_bpm_schedules_twenty_beats() {
        let device = Arc::new(MockOutput::new());
        let bpm = Arc::new(AtomicU32::new(120));
        let mut core = SchedulerCore::new(device.clone(), test_config(), bpm);

        core.prime();
        let mut beats = Vec::new();

        // Simulate 10 seconds of 25 ms polls
        let mut clock = 0.0;
        while clock < 9.85 {
            clock += 0.025;
            device.set_clock(clock);
            beats.extend(core.poll().unwrap());
        }

        assert_eq!(beats.len(), 20, "expected exactly 20 beats in 10 s");
        for pair in beats.windows(2) {
            assert!(pair[1].time > pair[0].time, "beat times must increase");
            assert!(
                (pair[1].time - pair[0].time - 0.5).abs() < 1e-9,
                "beats at 120 BPM must be exactly 0.5 s apart"
            );
        }
        assert_eq!(beats.last().unwrap().beat_index, 19);
        assert_eq!(device.scheduled().len(), 20);
    }

    #[test]
    fn test_poll_stays_inside_lookahead_window() {
        let device = Arc::new(MockOutput::new());
        let bpm = Arc::new(AtomicU32::new(120));
        let mut core = SchedulerCore::new(device.clone(), test_config(), bpm);

        core.prime();
        let beats = core.poll().unwrap();

        // At clock 0 with a 0.1 s window only beat 0 fits
        assert_eq!(beats.len(), 1);
        assert!(beats[0].time < 0.1);
    }

    #[test]
    fn test_bpm_change_applies_to_later_beats_only() {
        let device = Arc::new(MockOutput::new());
        let bpm = Arc::new(AtomicU32::new(120));
        let mut core = SchedulerCore::new(device.clone(), test_config(), Arc::clone(&bpm));

        core.prime();
        device.set_clock(1.0);
        let before = core.poll().unwrap();
        assert!(before.len() >= 2);
        for pair in before.windows(2) {
            assert!((pair[1].time - pair[0].time - 0.5).abs() < 1e-9);
        }

        bpm.store(60, Ordering::Relaxed);
        device.set_clock(3.0);
        let after = core.poll().unwrap();
        assert!(after.len() >= 2);
        for pair in after.windows(2) {
            assert!(
                (pair[1].time - pair[0].time - 1.0).abs() < 1e-9,
                "beats after the change must use the 60 BPM interval"
            );
        }
    }

    #[test]
    fn test_accent_frequency_on_bar_starts() {
        let device = Arc::new(MockOutput::new());
        let bpm = Arc::new(AtomicU32::new(120));
        let mut core = SchedulerCore::new(device.clone(), test_config(), bpm);

        core.prime();
        device.set_clock(3.0);
        core.poll().unwrap();

        let tones = device.scheduled();
        assert!(tones.len() >= 5);
        let config = test_config();
        assert_eq!(tones[0].frequency, config.accent_frequency_hz);
        assert_eq!(tones[1].frequency, config.beat_frequency_hz);
        assert_eq!(tones[4].frequency, config.accent_frequency_hz);
    }

    #[test]
    fn test_start_rejects_zero_bpm() {
        let device = Arc::new(MockOutput::new());
        let mut scheduler = ClickScheduler::new(device, test_config(), 0);
        assert_eq!(scheduler.start(), Err(AudioError::BpmInvalid { bpm: 0 }));
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_double_start_fails() {
        let device = Arc::new(MockOutput::new());
        let mut scheduler = ClickScheduler::new(device, test_config(), 120);
        scheduler.start().unwrap();
        assert_eq!(scheduler.start(), Err(AudioError::AlreadyRunning));
        scheduler.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let device = Arc::new(MockOutput::new());
        let mut scheduler = ClickScheduler::new(device, test_config(), 120);

        // Stopping a never-started scheduler is safe
        scheduler.stop();

        scheduler.start().unwrap();
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());

        // And it can start again after a stop
        scheduler.start().unwrap();
        scheduler.stop();
    }

    #[test]
    fn test_set_bpm_validation() {
        let device = Arc::new(MockOutput::new());
        let scheduler = ClickScheduler::new(device, test_config(), 120);
        assert_eq!(scheduler.set_bpm(0), Err(AudioError::BpmInvalid { bpm: 0 }));
        scheduler.set_bpm(90).unwrap();
        assert_eq!(scheduler.bpm(), 90);
    }
}
