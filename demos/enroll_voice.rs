// Voice enrollment demo: record a short microphone sample, save it locally,
// and upload it to the enrollment endpoint when BACKEND_URL is set.
//
// Usage: cargo run --example enroll_voice

use anyhow::Result;
use std::time::Duration;
use tracing::info;

use visit_scribe::api::{BackendApi, SpeakerRole};
use visit_scribe::audio::{AudioBackendFactory, AudioSource, CaptureConfig, VoiceRecorder};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let capture = CaptureConfig::default();
    let mut backend = AudioBackendFactory::create(AudioSource::Microphone, capture.clone())?;
    let mut frames = backend.start().await?;

    println!("Recording a 5 second enrollment sample, speak normally...");

    let mut recorder = VoiceRecorder::new(capture.sample_rate, capture.channels);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
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

    let recording = recorder.finish();
    anyhow::ensure!(!recording.is_empty(), "no audio captured");
    info!("captured {:.1}s of audio", recording.duration_seconds());

    recording.save("enrollment.wav")?;
    println!("saved enrollment.wav");

    if let Ok(base_url) = std::env::var("BACKEND_URL") {
        let api = BackendApi::new(base_url);
        let response = api.enroll_voice(SpeakerRole::Doctor, &recording).await?;
        println!(
            "enrollment upload: success={} speaker={}",
            response.success,
            response.speaker_id.as_deref().unwrap_or("pending")
        );
    }

    Ok(())
}
