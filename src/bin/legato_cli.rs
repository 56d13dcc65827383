use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use legato_trainer::analysis::{analyze_recording, RecordingAnalysis};
use legato_trainer::audio::device::{CpalInput, CpalOutput};
use legato_trainer::audio::metronome::beat_interval;
use legato_trainer::audio::scheduler::{ScheduledBeat, SchedulerCore};
use legato_trainer::config::AppConfig;
use legato_trainer::error::log_session_error;
use legato_trainer::remote::ScoringClient;
use legato_trainer::score_session;
use legato_trainer::session::PracticeSession;
use legato_trainer::tab::Tablature;
use legato_trainer::testing::MockOutput;
use legato_trainer::ScoreResult;

#[derive(Parser, Debug)]
#[command(
    name = "legato_cli",
    about = "Offline practice analysis for Legato Trainer"
)]
struct Cli {
    /// Path to a JSON config file (defaults apply when absent)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a recorded take against a lesson tablature
    Score {
        /// WAV recording of the take
        #[arg(long)]
        wav: PathBuf,
        /// Lesson tablature JSON
        #[arg(long)]
        tab: PathBuf,
        #[arg(long, default_value_t = 120)]
        bpm: u32,
        /// Restrict scoring to one chunk of the tablature
        #[arg(long)]
        chunk: Option<usize>,
        /// Consult the remote scoring endpoint (falls back locally)
        #[arg(long)]
        remote: bool,
        /// Lesson identifier sent to the remote endpoint
        #[arg(long, default_value = "ad-hoc")]
        lesson_id: String,
        /// Write the JSON report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print per-frame pitch estimates for a recording
    Pitch {
        #[arg(long)]
        wav: PathBuf,
    },
    /// Dry-run the metronome scheduler and print the beat plan
    Beats {
        #[arg(long, default_value_t = 120)]
        bpm: u32,
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,
    },
    /// Fetch prior practice records from the history endpoint
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Run a live practice take against the default audio devices
    Live {
        /// Lesson tablature JSON
        #[arg(long)]
        tab: PathBuf,
        #[arg(long, default_value_t = 120)]
        bpm: u32,
        /// How long to practice, in seconds
        #[arg(long, default_value_t = 30.0)]
        seconds: f64,
        /// Restrict practice to one chunk of the tablature
        #[arg(long)]
        chunk: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_ref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Score {
            wav,
            tab,
            bpm,
            chunk,
            remote,
            lesson_id,
            output,
        } => run_score(&config, &wav, &tab, bpm, chunk, remote, &lesson_id, output).await,
        Commands::Pitch { wav } => run_pitch(&config, &wav),
        Commands::Beats { bpm, seconds } => run_beats(&config, bpm, seconds),
        Commands::History { limit } => run_history(&config, limit).await,
        Commands::Live {
            tab,
            bpm,
            seconds,
            chunk,
        } => run_live(&config, &tab, bpm, seconds, chunk),
    }
}

fn run_live(
    config: &AppConfig,
    tab_path: &PathBuf,
    bpm: u32,
    seconds: f64,
    chunk: Option<usize>,
) -> Result<ExitCode> {
    if seconds <= 0.0 {
        bail!("practice duration must be positive");
    }

    let tab = Tablature::load_from_file(tab_path)?;
    let mut session = PracticeSession::new(config.clone(), tab, bpm, chunk)?;

    let mut input = CpalInput::open(&config.audio)?;
    let output = CpalOutput::open()?;

    if let Err(err) = session.start(&mut input, output.mixer()) {
        log_session_error(&err, "live start");
        return Err(err.into());
    }

    eprintln!("Practicing for {seconds:.0}s at {bpm} BPM... play along with the click");
    std::thread::sleep(std::time::Duration::from_secs_f64(seconds));
    session.stop();
    drop(input);
    drop(output);

    let scores = session.score();
    eprintln!(
        "{} of {} expected notes detected",
        session.onset_count(),
        session.expected_notes().len()
    );
    println!("{}", serde_json::to_string_pretty(&scores)?);
    Ok(ExitCode::from(0))
}

/// Decode a WAV file to mono f32 samples.
fn load_wav(path: &PathBuf) -> Result<(Vec<f32>, u32)> {
    let reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .context("decoding float samples")?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .context("decoding integer samples")?
        }
    };

    // Average channels down to mono
    let samples = if channels <= 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

#[allow(clippy::too_many_arguments)]
async fn run_score(
    config: &AppConfig,
    wav: &PathBuf,
    tab_path: &PathBuf,
    bpm: u32,
    chunk: Option<usize>,
    remote: bool,
    lesson_id: &str,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    if bpm == 0 {
        bail!("BPM must be greater than 0");
    }

    let (samples, sample_rate) = load_wav(wav)?;
    let tab = Tablature::load_from_file(tab_path)?;
    if let Some(index) = chunk {
        if index >= tab.chunks.len() {
            bail!(
                "chunk {} does not exist ({} chunks available)",
                index,
                tab.chunks.len()
            );
        }
    }
    let expected = tab.chunk_notes(chunk);

    let analysis = analyze_recording(&samples, sample_rate, &config.analysis, &config.onset);

    let scores = if remote {
        ScoringClient::new(config.remote.clone())
            .analyze(&analysis.onsets, expected, bpm, lesson_id)
            .await
    } else {
        score_session(&analysis.onsets, expected, bpm)
    };

    let report = ScoreReport {
        wav: wav.display().to_string(),
        sample_rate,
        bpm,
        chunk: tab.chunk_name(chunk).map(str::to_string),
        notes_detected: analysis.onsets.len(),
        notes_expected: expected.len(),
        scores,
    };
    emit_report(&report, output)?;
    Ok(ExitCode::from(0))
}

fn run_pitch(config: &AppConfig, wav: &PathBuf) -> Result<ExitCode> {
    let (samples, sample_rate) = load_wav(wav)?;
    let analysis: RecordingAnalysis =
        analyze_recording(&samples, sample_rate, &config.analysis, &config.onset);

    for point in &analysis.pitch_track {
        println!("{}", serde_json::to_string(point)?);
    }
    Ok(ExitCode::from(0))
}

fn run_beats(config: &AppConfig, bpm: u32, seconds: f64) -> Result<ExitCode> {
    if bpm == 0 {
        bail!("BPM must be greater than 0");
    }

    let device = std::sync::Arc::new(MockOutput::new());
    let bpm_atomic = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(bpm));
    let mut core = SchedulerCore::new(device.clone(), config.scheduler.clone(), bpm_atomic);

    core.prime();
    let mut beats: Vec<ScheduledBeat> = Vec::new();
    let poll_step = config.scheduler.poll_interval_ms as f64 / 1000.0;
    let mut clock = 0.0;
    while clock < seconds - config.scheduler.lookahead_s {
        clock += poll_step;
        device.set_clock(clock);
        beats.extend(core.poll()?);
    }

    eprintln!(
        "{} beats over {:.1}s at {} BPM (interval {:.3}s)",
        beats.len(),
        seconds,
        bpm,
        beat_interval(bpm)
    );
    for beat in &beats {
        println!("{}", serde_json::to_string(beat)?);
    }
    Ok(ExitCode::from(0))
}

async fn run_history(config: &AppConfig, limit: usize) -> Result<ExitCode> {
    let client = ScoringClient::new(config.remote.clone());
    let records = client.history(limit).await?;

    if records.is_empty() {
        eprintln!("No practice history available");
        return Ok(ExitCode::from(0));
    }

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(ExitCode::from(0))
}

fn emit_report(report: &ScoreReport, output: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(path) = output {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreReport {
    wav: String,
    sample_rate: u32,
    bpm: u32,
    chunk: Option<String>,
    notes_detected: usize,
    notes_expected: usize,
    scores: ScoreResult,
}
