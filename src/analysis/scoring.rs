// Scoring module - practice grading against an expected note sequence
//
// Grades a session's detected onsets against the tablature's expected
// notes. Alignment is positional: the i-th detected onset is compared to
// the i-th expected note. A missed or extra onset therefore desynchronizes
// every later comparison; the comparison window still bounds each pairwise
// error.

use crate::analysis::onset::NoteOnset;
use crate::tab::ExpectedNote;

/// Fraction of a beat a detected onset may deviate and still match
const MATCH_WINDOW_BEATS: f64 = 0.2;

/// Mean onset energy that counts as fully clear
const CLARITY_REFERENCE: f32 = 0.3;

/// Sub-scores and aggregate accuracy for one practice take
///
/// All fields are in [0, 1]. An empty detected or expected sequence yields
/// the all-zero result.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub accuracy: f32,
    pub timing_score: f32,
    pub clarity_score: f32,
    pub speed_score: f32,
    pub consistency: f32,
}

/// Score a take locally.
///
/// # Arguments
/// * `detected` - Onsets recorded during the session, in time order
/// * `expected` - Expected notes (already restricted to the practiced
///   chunk), times in beats
/// * `bpm` - Session tempo
///
/// # Returns
/// A `ScoreResult`; all-zero when either sequence is empty or `bpm` is 0.
pub fn score_session(detected: &[NoteOnset], expected: &[ExpectedNote], bpm: u32) -> ScoreResult {
    if detected.is_empty() || expected.is_empty() || bpm == 0 {
        return ScoreResult::default();
    }

    let beat_duration = 60.0 / bpm as f64;

    let timing_score = timing_score(detected, expected, beat_duration);
    let clarity_score = clarity_score(detected);
    let speed_score = speed_score(detected, expected, beat_duration);
    let consistency = consistency(detected);

    let accuracy = 0.4 * timing_score + 0.3 * clarity_score + 0.3 * speed_score;

    ScoreResult {
        accuracy,
        timing_score,
        clarity_score,
        speed_score,
        consistency,
    }
}

/// Fraction of expected notes whose positional counterpart landed within
/// the match window.
fn timing_score(detected: &[NoteOnset], expected: &[ExpectedNote], beat_duration: f64) -> f32 {
    let window = MATCH_WINDOW_BEATS * beat_duration;
    let mut matches = 0usize;

    for (i, note) in expected.iter().enumerate() {
        let Some(onset) = detected.get(i) else {
            break;
        };
        let expected_time = note.time as f64 * beat_duration;
        if (onset.relative_time - expected_time).abs() < window {
            matches += 1;
        }
    }

    matches as f32 / expected.len() as f32
}

/// Mean onset energy against the clarity reference, capped at 1.
fn clarity_score(detected: &[NoteOnset]) -> f32 {
    let mean_energy: f32 =
        detected.iter().map(|o| o.energy).sum::<f32>() / detected.len() as f32;
    (mean_energy / CLARITY_REFERENCE).min(1.0)
}

/// Ratio of the expected span to the played span, capped at 1.
///
/// A degenerate detected span (single onset) saturates the ratio, so it
/// scores 1.0 rather than dividing by zero.
fn speed_score(detected: &[NoteOnset], expected: &[ExpectedNote], beat_duration: f64) -> f32 {
    let expected_duration =
        (expected[expected.len() - 1].time - expected[0].time) as f64 * beat_duration;
    let detected_duration = detected[detected.len() - 1].relative_time - detected[0].relative_time;

    if detected_duration <= f64::EPSILON {
        return 1.0;
    }

    (expected_duration / detected_duration).min(1.0) as f32
}

/// Coefficient-of-variation smoothness over inter-onset intervals.
///
/// Fewer than two intervals gives no evidence of consistency and scores
/// 0.0.
fn consistency(detected: &[NoteOnset]) -> f32 {
    let intervals: Vec<f64> = detected
        .windows(2)
        .map(|pair| pair[1].relative_time - pair[0].relative_time)
        .collect();

    if intervals.len() < 2 {
        return 0.0;
    }

    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    if mean <= f64::EPSILON {
        return 0.0;
    }

    let variance = intervals
        .iter()
        .map(|&x| (x - mean) * (x - mean))
        .sum::<f64>()
        / intervals.len() as f64;

    (1.0 - variance / (mean * mean)).max(0.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tab::Technique;

    fn onset(time: f64, energy: f32) -> NoteOnset {
        NoteOnset {
            relative_time: time,
            energy,
            clock_timestamp: time,
        }
    }

    fn note(time: f32) -> ExpectedNote {
        ExpectedNote {
            time,
            string: 1,
            fret: 5,
            technique: Technique::None,
        }
    }

    #[test]
    fn test_empty_sequences_yield_zero_result() {
        let zero = ScoreResult::default();
        assert_eq!(score_session(&[], &[note(0.0)], 120), zero);
        assert_eq!(score_session(&[onset(0.0, 0.4)], &[], 120), zero);
        assert_eq!(score_session(&[], &[], 120), zero);
    }

    #[test]
    fn test_perfect_take_scores_full_accuracy() {
        // Spec scenario: two onsets exactly on the expected grid at 120 BPM
        let detected = vec![onset(0.0, 0.4), onset(0.5, 0.35)];
        let expected = vec![note(0.0), note(1.0)];

        let score = score_session(&detected, &expected, 120);

        assert!((score.timing_score - 1.0).abs() < 1e-6);
        assert!((score.clarity_score - 1.0).abs() < 1e-6);
        assert!((score.speed_score - 1.0).abs() < 1e-6);
        assert!((score.accuracy - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scorer_is_idempotent() {
        let detected = vec![onset(0.02, 0.31), onset(0.53, 0.22), onset(1.07, 0.4)];
        let expected = vec![note(0.0), note(1.0), note(2.0)];

        let first = score_session(&detected, &expected, 120);
        let second = score_session(&detected, &expected, 120);
        assert_eq!(first, second);
    }

    #[test]
    fn test_timing_mismatch_outside_window() {
        // Beat duration 0.5 s, window 0.1 s; second onset is 0.2 s late
        let detected = vec![onset(0.0, 0.4), onset(0.7, 0.4)];
        let expected = vec![note(0.0), note(1.0)];

        let score = score_session(&detected, &expected, 120);
        assert!((score.timing_score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_missing_onset_desynchronizes_positional_alignment() {
        // The player missed the second note; the third onset is compared
        // against the second expected note and misses its window too.
        let detected = vec![onset(0.0, 0.4), onset(1.0, 0.4)];
        let expected = vec![note(0.0), note(1.0), note(2.0)];

        let score = score_session(&detected, &expected, 120);
        assert!((score.timing_score - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_clarity_scales_with_energy() {
        let expected = vec![note(0.0), note(1.0)];

        let quiet = vec![onset(0.0, 0.06), onset(0.5, 0.06)];
        let score = score_session(&quiet, &expected, 120);
        assert!((score.clarity_score - 0.2).abs() < 1e-6);

        let loud = vec![onset(0.0, 0.9), onset(0.5, 0.9)];
        let score = score_session(&loud, &expected, 120);
        assert!((score.clarity_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_speed_penalizes_slow_playing() {
        // Expected span 0.5 s, played span 1.0 s
        let detected = vec![onset(0.0, 0.4), onset(1.0, 0.4)];
        let expected = vec![note(0.0), note(1.0)];

        let score = score_session(&detected, &expected, 120);
        assert!((score.speed_score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_speed_caps_fast_playing_at_one() {
        // Played faster than expected
        let detected = vec![onset(0.0, 0.4), onset(0.25, 0.4)];
        let expected = vec![note(0.0), note(1.0)];

        let score = score_session(&detected, &expected, 120);
        assert!((score.speed_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_onset_speed_saturates() {
        let detected = vec![onset(0.0, 0.4)];
        let expected = vec![note(0.0)];

        let score = score_session(&detected, &expected, 120);
        assert!((score.speed_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_even_intervals_are_consistent() {
        let detected = vec![
            onset(0.0, 0.4),
            onset(0.5, 0.4),
            onset(1.0, 0.4),
            onset(1.5, 0.4),
        ];
        let expected = vec![note(0.0), note(1.0), note(2.0), note(3.0)];

        let score = score_session(&detected, &expected, 120);
        assert!((score.consistency - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_uneven_intervals_lose_consistency() {
        let detected = vec![
            onset(0.0, 0.4),
            onset(0.2, 0.4),
            onset(1.0, 0.4),
            onset(1.1, 0.4),
        ];
        let expected = vec![note(0.0), note(1.0), note(2.0), note(3.0)];

        let score = score_session(&detected, &expected, 120);
        assert!(score.consistency < 0.8);
    }

    #[test]
    fn test_fewer_than_two_intervals_score_zero_consistency() {
        let detected = vec![onset(0.0, 0.4), onset(0.5, 0.4)];
        let expected = vec![note(0.0), note(1.0)];

        let score = score_session(&detected, &expected, 120);
        assert_eq!(score.consistency, 0.0);
    }

    #[test]
    fn test_accuracy_weighting() {
        let detected = vec![onset(0.0, 0.15), onset(0.7, 0.15)];
        let expected = vec![note(0.0), note(1.0)];

        let score = score_session(&detected, &expected, 120);
        let recombined = 0.4 * score.timing_score + 0.3 * score.clarity_score
            + 0.3 * score.speed_score;
        assert!((score.accuracy - recombined).abs() < 1e-6);
    }

    #[test]
    fn test_zero_bpm_yields_zero_result() {
        let detected = vec![onset(0.0, 0.4)];
        let expected = vec![note(0.0)];
        assert_eq!(score_session(&detected, &expected, 0), ScoreResult::default());
    }
}
