use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use visit_scribe::api::SpeakerRole;
use visit_scribe::audio::{
    AudioBackendFactory, AudioFile, AudioSource, CaptureConfig, RecordedAudio, VoiceRecorder,
};
use visit_scribe::{BackendApi, Config, VisitSession};

#[derive(Parser)]
#[command(name = "visit-scribe", about = "Clinical visit transcription client")]
struct Cli {
    /// Configuration file (without extension)
    #[arg(long, default_value = "config/visit-scribe")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a visit and stream microphone audio for live transcription
    Visit {
        #[arg(long)]
        doctor_id: i64,
        #[arg(long)]
        patient_id: i64,
        #[arg(long, default_value = "Clinical visit")]
        title: String,
    },
    /// Record or upload a reference sample for speaker voice enrollment
    Enroll {
        #[arg(long, value_enum)]
        role: SpeakerRole,
        /// Seconds of microphone audio to record
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        /// Upload an existing WAV file instead of recording
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    info!("{} starting", cfg.service.name);

    match cli.command {
        Command::Visit {
            doctor_id,
            patient_id,
            title,
        } => run_visit(&cfg, doctor_id, patient_id, &title).await,
        Command::Enroll {
            role,
            seconds,
            file,
        } => run_enroll(&cfg, role, seconds, file).await,
    }
}

async fn run_visit(cfg: &Config, doctor_id: i64, patient_id: i64, title: &str) -> Result<()> {
    let api = BackendApi::new(cfg.service.backend_url.clone());
    let started = api.start_session(patient_id, title).await?;
    info!(session_id = started.session_id, "session created");

    let session_config = cfg.session_config(started.session_id, doctor_id, patient_id);
    let (mut session, mut feed) = VisitSession::new(session_config);
    session.start().await?;

    println!("Recording. Press Ctrl-C to stop the visit.");

    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = feed.transcript.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = feed.transcript.borrow().clone();
                    if let Some(entry) = snapshot.entries.last() {
                        println!("[{:?}] {}", entry.speaker, entry.text);
                    }
                }
                error = feed.errors.recv() => match error {
                    Some(message) => eprintln!("error: {}", message),
                    None => break,
                }
            }
        }
    });

    signal::ctrl_c().await?;
    info!("stop requested");

    let summary = session.stop().await?;
    printer.abort();

    match summary {
        Some(summary) => println!(
            "Visit ended. Summary {} queued for review.",
            summary.summary_id
        ),
        None => println!("Visit ended. Summary will be available once finalization completes."),
    }

    Ok(())
}

async fn run_enroll(
    cfg: &Config,
    role: SpeakerRole,
    seconds: u64,
    file: Option<PathBuf>,
) -> Result<()> {
    let api = BackendApi::new(cfg.service.backend_url.clone());

    let recording = match file {
        Some(path) => {
            let audio = AudioFile::open(&path)?;
            RecordedAudio {
                samples: audio.samples,
                sample_rate: audio.sample_rate,
                channels: audio.channels,
            }
        }
        None => {
            let capture = CaptureConfig {
                sample_rate: cfg.audio.sample_rate,
                channels: cfg.audio.channels,
                frame_samples: cfg.audio.frame_samples,
                ..CaptureConfig::default()
            };
            let mut backend = AudioBackendFactory::create(AudioSource::Microphone, capture)?;
            let mut frames = backend.start().await?;

            println!("Recording {}s enrollment sample, speak normally...", seconds);

            let mut recorder = VoiceRecorder::new(cfg.audio.sample_rate, cfg.audio.channels);
            let deadline = tokio::time::Instant::now() + Duration::from_secs(seconds);
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break,
                    frame = frames.recv() => match frame {
                        Some(frame) => recorder.push(&frame),
                        None => break,
                    }
                }
            }
            backend.stop().await?;
            recorder.finish()
        }
    };

    anyhow::ensure!(!recording.is_empty(), "no audio captured");
    info!(
        "uploading {:.1}s enrollment sample for {}",
        recording.duration_seconds(),
        role.as_str()
    );

    let response = api.enroll_voice(role, &recording).await?;
    if response.success {
        println!(
            "Enrollment complete for {} ({}).",
            role.as_str(),
            response.speaker_id.as_deref().unwrap_or("id pending")
        );
    } else {
        println!(
            "Enrollment rejected: {}",
            response.message.as_deref().unwrap_or("no reason given")
        );
    }

    Ok(())
}
