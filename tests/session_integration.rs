//! Integration tests over the public session surface
//!
//! These drive a full practice take end-to-end with deterministic devices:
//! a scripted input replaying a synthetic recording through the real
//! capture plumbing, and a mock output that records the metronome's beat
//! plan. No audio hardware is touched.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;

use legato_trainer::config::AppConfig;
use legato_trainer::error::SessionError;
use legato_trainer::session::{PracticeSession, SessionEvent};
use legato_trainer::tab::{Chunk, ExpectedNote, Tablature, Technique};
use legato_trainer::testing::{recording_with_plucks, MockOutput, ScriptedInput};

const SAMPLE_RATE: u32 = 48000;

fn lesson_tab() -> Tablature {
    Tablature {
        strings: vec![40, 45, 50, 55, 59, 64],
        notes: vec![
            ExpectedNote {
                time: 0.0,
                string: 1,
                fret: 5,
                technique: Technique::None,
            },
            ExpectedNote {
                time: 1.0,
                string: 1,
                fret: 7,
                technique: Technique::HammerOn,
            },
        ],
        chunks: vec![Chunk {
            start: 0,
            end: 2,
            name: "bar 1".to_string(),
        }],
    }
}

/// Two plucks half a second apart, landing on the 120 BPM grid
fn two_note_take() -> Vec<f32> {
    recording_with_plucks(72000, SAMPLE_RATE, 220.0, &[1024, 25600], 9600)
}

/// Poll until the session has seen `count` onsets or the timeout passes.
fn wait_for_onsets(session: &PracticeSession, count: usize, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while session.onset_count() < count && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_full_take_detects_and_scores() {
    let mut session =
        PracticeSession::new(AppConfig::default(), lesson_tab(), 120, None).unwrap();
    let mut input = ScriptedInput::new(&two_note_take(), SAMPLE_RATE, 2048);
    let output = Arc::new(MockOutput::new());

    session.start(&mut input, output.clone()).unwrap();
    assert!(session.is_running());

    wait_for_onsets(&session, 2, Duration::from_secs(5));
    session.stop();
    assert!(!session.is_running());

    let onsets = session.onsets();
    assert_eq!(onsets.len(), 2, "expected one onset per pluck");
    assert!(onsets[0].relative_time < onsets[1].relative_time);
    assert!((onsets[1].relative_time - onsets[0].relative_time - 0.5).abs() < 0.1);

    let score = session.score();
    assert!(
        (score.timing_score - 1.0).abs() < 1e-6,
        "both notes land on the grid: {:?}",
        score
    );
    assert!(score.accuracy > 0.9, "near-perfect take: {:?}", score);

    // The metronome scheduled at least the first beat
    assert!(!output.scheduled().is_empty());
}

#[test]
fn test_double_start_is_rejected() {
    let mut session =
        PracticeSession::new(AppConfig::default(), lesson_tab(), 120, None).unwrap();
    let mut input = ScriptedInput::new(&two_note_take(), SAMPLE_RATE, 2048);
    let output = Arc::new(MockOutput::new());

    session.start(&mut input, output.clone()).unwrap();

    let mut second_input = ScriptedInput::new(&[0.0; 4096], SAMPLE_RATE, 2048);
    let result = session.start(&mut second_input, output);
    assert!(matches!(result, Err(SessionError::AlreadyRunning)));

    session.stop();
}

#[test]
fn test_stop_is_idempotent_and_restartable() {
    let mut session =
        PracticeSession::new(AppConfig::default(), lesson_tab(), 120, None).unwrap();

    // Stop before any start is a no-op
    session.stop();

    let mut input = ScriptedInput::new(&two_note_take(), SAMPLE_RATE, 2048);
    let output = Arc::new(MockOutput::new());
    session.start(&mut input, output).unwrap();
    session.stop();
    session.stop();
    assert!(!session.is_running());

    // A fresh device allows another take with the same session
    let mut input = ScriptedInput::new(&two_note_take(), SAMPLE_RATE, 2048);
    let output = Arc::new(MockOutput::new());
    session.start(&mut input, output).unwrap();
    session.stop();
}

#[test]
fn test_restart_clears_onset_log() {
    let mut session =
        PracticeSession::new(AppConfig::default(), lesson_tab(), 120, None).unwrap();

    let mut input = ScriptedInput::new(&two_note_take(), SAMPLE_RATE, 2048);
    let output = Arc::new(MockOutput::new());
    session.start(&mut input, output).unwrap();
    wait_for_onsets(&session, 2, Duration::from_secs(5));
    session.stop();
    assert_eq!(session.onset_count(), 2);

    // Silence take: the log starts empty again
    let mut input = ScriptedInput::new(&vec![0.0; 8192], SAMPLE_RATE, 2048);
    let output = Arc::new(MockOutput::new());
    session.start(&mut input, output).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    session.stop();
    assert_eq!(session.onset_count(), 0);
}

#[test]
fn test_chunked_session_scores_against_chunk() {
    // Chunk "bar 1" spans only the first note
    let mut tab = lesson_tab();
    tab.chunks[0].end = 1;

    let session = PracticeSession::new(AppConfig::default(), tab, 120, Some(0)).unwrap();
    assert_eq!(session.expected_notes().len(), 1);
    assert_eq!(session.chunk_name(), Some("bar 1"));
}

#[tokio::test]
async fn test_event_stream_carries_frames_and_onsets() {
    let mut session =
        PracticeSession::new(AppConfig::default(), lesson_tab(), 120, None).unwrap();
    let mut input = ScriptedInput::new(&two_note_take(), SAMPLE_RATE, 2048);
    let output = Arc::new(MockOutput::new());

    let mut events = session.events();
    session.start(&mut input, output).unwrap();

    let mut saw_frame = false;
    let mut saw_onset = false;
    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);

    while !(saw_frame && saw_onset) {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(SessionEvent::Frame { .. })) => saw_frame = true,
                Some(Ok(SessionEvent::Onset(_))) => saw_onset = true,
                Some(Err(_)) => {} // lagged receiver, keep draining
                None => break,
            },
            _ = &mut deadline => break,
        }
    }

    session.stop();
    assert!(saw_frame, "expected at least one frame event");
    assert!(saw_onset, "expected at least one onset event");
}

#[test]
fn test_practice_duration_accumulates() {
    let mut session =
        PracticeSession::new(AppConfig::default(), lesson_tab(), 120, None).unwrap();

    let mut input = ScriptedInput::new(&vec![0.0; 4096], SAMPLE_RATE, 2048);
    let output = Arc::new(MockOutput::new());
    session.start(&mut input, output).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    session.stop();

    assert!(session.practice_duration_s() >= 0.05);
}
