//! Practice session - lifecycle and event streaming
//!
//! One `PracticeSession` owns everything a practice take needs: the
//! metronome scheduler, the analysis worker draining the input device, the
//! session's onset log, and the broadcast channel UI layers subscribe to.
//! Nothing is shared across sessions; devices are created by the caller
//! for one session and released at stop, so repeated start/stop cycles
//! cannot leak OS audio resources.
//!
//! Lifecycle: `Stopped -> Running` via `start()` (fails without side
//! effects when already running or a device cannot be prepared) and back
//! via `stop()`, which is idempotent: it cancels the worker, stops the
//! scheduler, and drops the capture reader, in that order, no matter how
//! often it is called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::analysis::hps::PitchEstimate;
use crate::analysis::onset::NoteOnset;
use crate::analysis::scoring::{score_session, ScoreResult};
use crate::analysis::FrameAnalyzer;
use crate::audio::buffer_pool::CaptureReader;
use crate::audio::device::{InputDevice, OutputDevice};
use crate::audio::scheduler::ClickScheduler;
use crate::config::AppConfig;
use crate::error::SessionError;
use crate::tab::Tablature;

/// Broadcast capacity for session events
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted while a session runs
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// One analysis frame completed
    Frame {
        pitch: PitchEstimate,
        rms: f32,
        clock: f64,
    },
    /// A note onset was recorded
    Onset(NoteOnset),
}

/// A single practice take against one lesson tablature
pub struct PracticeSession {
    config: AppConfig,
    tab: Tablature,
    bpm: u32,
    chunk: Option<usize>,
    onsets: Arc<Mutex<Vec<NoteOnset>>>,
    event_tx: broadcast::Sender<SessionEvent>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    scheduler: Option<ClickScheduler>,
    started_at: Option<Instant>,
    practice_duration_s: f64,
}

impl PracticeSession {
    /// Create a session in the `Stopped` state.
    ///
    /// # Errors
    /// `EmptyTab` when the tablature has no notes; `ChunkOutOfRange` when
    /// a chunk index is given that the tablature does not define.
    pub fn new(
        config: AppConfig,
        tab: Tablature,
        bpm: u32,
        chunk: Option<usize>,
    ) -> Result<Self, SessionError> {
        if tab.notes.is_empty() {
            return Err(SessionError::EmptyTab);
        }
        if let Some(index) = chunk {
            if index >= tab.chunks.len() {
                return Err(SessionError::ChunkOutOfRange {
                    chunk: index,
                    available: tab.chunks.len(),
                });
            }
        }

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            tab,
            bpm,
            chunk,
            onsets: Arc::new(Mutex::new(Vec::new())),
            event_tx,
            shutdown: Arc::new(AtomicBool::new(false)),
            worker: None,
            scheduler: None,
            started_at: None,
            practice_duration_s: 0.0,
        })
    }

    /// Start the take: begin the metronome and the analysis worker.
    ///
    /// The input device hands over its capture reader; the output device
    /// handle drives the click scheduler. A failure at any step leaves the
    /// session stopped with nothing running.
    pub fn start(
        &mut self,
        input: &mut dyn InputDevice,
        output: Arc<dyn OutputDevice>,
    ) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }

        let reader = input.take_reader()?;
        let sample_rate = input.sample_rate();

        let mut scheduler = ClickScheduler::new(output, self.config.scheduler.clone(), self.bpm);
        scheduler.start()?;

        self.onsets.lock().expect("onset log poisoned").clear();
        self.shutdown.store(false, Ordering::SeqCst);

        let worker = spawn_analysis_worker(
            reader,
            sample_rate,
            self.config.clone(),
            Arc::clone(&self.onsets),
            self.event_tx.clone(),
            Arc::clone(&self.shutdown),
        );

        self.worker = Some(worker);
        self.scheduler = Some(scheduler);
        self.started_at = Some(Instant::now());

        tracing::info!(
            "[Session] started at {} BPM, {} expected notes{}",
            self.bpm,
            self.expected_notes().len(),
            self.tab
                .chunk_name(self.chunk)
                .map(|n| format!(" (chunk '{}')", n))
                .unwrap_or_default()
        );

        Ok(())
    }

    /// Stop the take. Idempotent: safe to call repeatedly and before any
    /// start. Tears down in order: analysis worker, scheduler, devices
    /// (the capture reader dies with the worker; the caller drops the
    /// device structs themselves).
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::warn!("[Session] analysis worker panicked");
            }
        }

        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }

        if let Some(started) = self.started_at.take() {
            self.practice_duration_s += started.elapsed().as_secs_f64();
            tracing::info!(
                "[Session] stopped after {:.1}s, {} onsets recorded",
                self.practice_duration_s,
                self.onset_count()
            );
        }
    }

    /// Whether the take is currently running.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Subscribe to live session events.
    pub fn events(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.event_tx.subscribe())
    }

    /// Snapshot of the onset log so far.
    pub fn onsets(&self) -> Vec<NoteOnset> {
        self.onsets.lock().expect("onset log poisoned").clone()
    }

    /// Number of onsets recorded so far.
    pub fn onset_count(&self) -> usize {
        self.onsets.lock().expect("onset log poisoned").len()
    }

    /// Expected notes for this take (chunk-restricted when one is set).
    pub fn expected_notes(&self) -> &[crate::tab::ExpectedNote] {
        self.tab.chunk_notes(self.chunk)
    }

    /// Name of the practiced chunk, if one is set.
    pub fn chunk_name(&self) -> Option<&str> {
        self.tab.chunk_name(self.chunk)
    }

    /// Session tempo.
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Total seconds spent running, accumulated across start/stop cycles.
    pub fn practice_duration_s(&self) -> f64 {
        match self.started_at {
            Some(started) => self.practice_duration_s + started.elapsed().as_secs_f64(),
            None => self.practice_duration_s,
        }
    }

    /// Grade the take with the on-device scorer.
    pub fn score(&self) -> ScoreResult {
        let onsets = self.onsets();
        score_session(&onsets, self.expected_notes(), self.bpm)
    }
}

impl Drop for PracticeSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the analysis worker: drains capture buffers, accumulates them to
/// FFT-size frames, and runs the frame pipeline on each.
fn spawn_analysis_worker(
    mut reader: CaptureReader,
    sample_rate: u32,
    config: AppConfig,
    onsets: Arc<Mutex<Vec<NoteOnset>>>,
    event_tx: broadcast::Sender<SessionEvent>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        tracing::info!("[Session] analysis worker started");

        let mut pipeline = FrameAnalyzer::new(sample_rate, &config.analysis, &config.onset);
        pipeline.reset(0.0);

        let fft_size = pipeline.fft_size();
        let mut accumulator: Vec<f32> = Vec::with_capacity(fft_size * 2);
        let mut samples_processed: u64 = 0;

        while !shutdown.load(Ordering::SeqCst) {
            let Some(buffer) = reader.read() else {
                thread::sleep(Duration::from_millis(1));
                continue;
            };

            accumulator.extend_from_slice(&buffer);
            reader.recycle(buffer);

            while accumulator.len() >= fft_size {
                let frame: Vec<f32> = accumulator.drain(..fft_size).collect();
                samples_processed += fft_size as u64;
                let clock = samples_processed as f64 / sample_rate as f64;

                let report = pipeline.process(&frame, clock);

                let _ = event_tx.send(SessionEvent::Frame {
                    pitch: report.pitch,
                    rms: report.rms,
                    clock,
                });

                if let Some(onset) = report.onset {
                    onsets.lock().expect("onset log poisoned").push(onset);
                    let _ = event_tx.send(SessionEvent::Onset(onset));
                }
            }
        }

        tracing::info!("[Session] analysis worker stopped");
    })
}
