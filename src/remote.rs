//! Remote scoring and practice-history client
//!
//! Talks to the lesson backend's scoring endpoints. Remote analysis is an
//! accuracy upgrade, never a requirement: any transport error, non-OK
//! status, or undecodable body falls back transparently to the on-device
//! scorer, and the caller only ever sees a `ScoreResult`. History is
//! best-effort and token-gated; without a credential it is skipped
//! silently.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::analysis::onset::NoteOnset;
use crate::analysis::scoring::{score_session, ScoreResult};
use crate::config::RemoteConfig;
use crate::tab::ExpectedNote;

/// Shared HTTP client; connection pooling across calls
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Detected note as the wire expects it
#[derive(Debug, Clone, Copy, Serialize)]
struct WireNote {
    time: f64,
    energy: f32,
}

impl From<&NoteOnset> for WireNote {
    fn from(onset: &NoteOnset) -> Self {
        Self {
            time: onset.relative_time,
            energy: onset.energy,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    detected_notes: Vec<WireNote>,
    expected_notes: &'a [ExpectedNote],
    bpm: u32,
    lesson_id: &'a str,
}

/// One persisted practice record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeRecord {
    pub lesson_id: String,
    pub lesson_title: String,
    pub level: String,
    pub scores: ScoreResult,
    pub bpm: u32,
    pub target_bpm: u32,
    pub practice_duration: f64,
    pub notes_detected: usize,
    pub notes_expected: usize,
    pub chunk_used: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    records: Vec<PracticeRecord>,
}

/// Client for the `/legato/*` endpoints
pub struct ScoringClient {
    config: RemoteConfig,
}

impl ScoringClient {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    /// Score a take, preferring the remote service.
    ///
    /// Falls back to the local scorer on any failure; the user is never
    /// shown an error for this path, only a potentially less precise
    /// score.
    pub async fn analyze(
        &self,
        detected: &[NoteOnset],
        expected: &[ExpectedNote],
        bpm: u32,
        lesson_id: &str,
    ) -> ScoreResult {
        match self.analyze_remote(detected, expected, bpm, lesson_id).await {
            Ok(score) => score,
            Err(err) => {
                tracing::debug!("[Remote] analyze failed ({err:#}), using local scorer");
                score_session(detected, expected, bpm)
            }
        }
    }

    async fn analyze_remote(
        &self,
        detected: &[NoteOnset],
        expected: &[ExpectedNote],
        bpm: u32,
        lesson_id: &str,
    ) -> Result<ScoreResult> {
        if self.config.base_url.is_empty() {
            return Err(anyhow!("no remote base URL configured"));
        }

        let body = AnalyzeRequest {
            detected_notes: detected.iter().map(WireNote::from).collect(),
            expected_notes: expected,
            bpm,
            lesson_id,
        };

        let mut request = HTTP_CLIENT
            .post(format!("{}/legato/analyze", self.config.base_url))
            .timeout(Duration::from_secs(self.config.timeout_s))
            .json(&body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let score = request
            .send()
            .await
            .context("sending analyze request")?
            .error_for_status()
            .context("analyze response status")?
            .json::<ScoreResult>()
            .await
            .context("decoding analyze response")?;

        Ok(score)
    }

    /// Persist a practice record, best-effort.
    ///
    /// Skipped silently when no token is configured. Failures are logged
    /// and swallowed; the practice flow never stops for history.
    pub async fn save(&self, record: &PracticeRecord) {
        let Some(token) = &self.config.token else {
            tracing::debug!("[Remote] no credential, skipping history save");
            return;
        };
        if self.config.base_url.is_empty() {
            tracing::debug!("[Remote] no base URL, skipping history save");
            return;
        }

        let result = HTTP_CLIENT
            .post(format!("{}/legato/save", self.config.base_url))
            .timeout(Duration::from_secs(self.config.timeout_s))
            .bearer_auth(token)
            .json(record)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => tracing::debug!("[Remote] practice record saved"),
            Err(err) => tracing::warn!("[Remote] history save failed: {err}"),
        }
    }

    /// Fetch up to `limit` prior practice records.
    ///
    /// Returns an empty list without touching the network when no token is
    /// configured.
    pub async fn history(&self, limit: usize) -> Result<Vec<PracticeRecord>> {
        let Some(token) = &self.config.token else {
            return Ok(Vec::new());
        };
        if self.config.base_url.is_empty() {
            return Ok(Vec::new());
        }

        let response = HTTP_CLIENT
            .get(format!("{}/legato/history", self.config.base_url))
            .query(&[("limit", limit)])
            .timeout(Duration::from_secs(self.config.timeout_s))
            .bearer_auth(token)
            .send()
            .await
            .context("sending history request")?
            .error_for_status()
            .context("history response status")?
            .json::<HistoryResponse>()
            .await
            .context("decoding history response")?;

        Ok(response.records)
    }
}
