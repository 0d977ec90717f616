// Live visit demo: stream microphone audio to the transcription backend and
// print the assembled conversation in real time.
//
// Prerequisites:
// - A reachable visit backend (BACKEND_URL, default http://localhost:8080)
// - A working microphone
//
// Usage: cargo run --example live_visit

use anyhow::Result;
use std::time::Duration;
use tracing::info;

use visit_scribe::session::{SessionConfig, VisitSession};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let base_url =
        std::env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

    // Demo participants; a real deployment gets the session id from the
    // start-session endpoint.
    let config = SessionConfig::new(1001, 1, 1, &base_url);
    let (mut session, mut feed) = VisitSession::new(config);

    session.start().await?;
    info!("recording for 15 seconds, speak into the microphone");

    let deadline = tokio::time::sleep(Duration::from_secs(15));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,

            changed = feed.transcript.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = feed.transcript.borrow().clone();
                if let Some(entry) = snapshot.entries.last() {
                    println!("[{:?}] {}", entry.speaker, entry.text);
                }
                if let Some(status) = snapshot.status {
                    println!("  ({})", status);
                }
            }

            error = feed.errors.recv() => match error {
                Some(message) => eprintln!("error: {}", message),
                None => break,
            }
        }
    }

    let summary = session.stop().await?;
    let stats = session.stats().await;
    println!(
        "visit ended: {} frames sent, {} transcript entries",
        stats.frames_sent, stats.entry_count
    );
    if let Some(summary) = summary {
        println!("summary {} queued for review", summary.summary_id);
    }

    Ok(())
}
