/// Transcription service binary
///
/// Demo service that replays a scripted recognition session through the
/// wake-word gated transcription engine and logs every consumer update.

use anyhow::{Context, Result};
use gated_transcriber::{
    CapabilityEvent, ControllerConfig, ControllerEvent, RecognitionController, ResultBatch,
    ScriptedCapability,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gated_transcriber=debug".parse().unwrap()),
        )
        .init();

    info!("Starting transcriber service v{}", gated_transcriber::VERSION);

    // Load configuration
    let config = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Load the session script (built-in demo script unless overridden)
    let sessions = match load_script() {
        Ok(sessions) => sessions,
        Err(e) => {
            error!("Failed to load session script: {}", e);
            std::process::exit(1);
        }
    };

    let (capability, events) = ScriptedCapability::new(sessions);
    let controller = Arc::new(RecognitionController::new(config, Arc::new(capability)));

    if let Err(e) = controller.start_listening().await {
        error!("Failed to start listening: {}", e);
        std::process::exit(1);
    }

    // Drive every scripted capability event through the controller
    let driver = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run(events).await })
    };

    if let Err(e) = driver.await {
        error!("Event driver failed: {}", e);
    }

    // Surface what the consumer would have observed
    while let Some(event) = controller.try_recv_event().await {
        match event {
            ControllerEvent::Transcript(text) => info!("Transcript update: {:?}", text),
            ControllerEvent::Listening(listening) => info!("Listening: {}", listening),
        }
    }

    let stats = controller.stats().await;
    info!(
        "Session complete: {} batches, {} restarts, armed={}",
        stats.batches_processed, stats.restarts, stats.is_armed
    );
    info!("Final transcript: {:?}", controller.transcript().await);
}

/// Load configuration from environment variables
fn load_config() -> Result<ControllerConfig> {
    // WAKE_WORD="" disables gating entirely
    let wake_word = std::env::var("WAKE_WORD").unwrap_or_else(|_| "computer".to_string());
    let wake_word = if wake_word.trim().is_empty() {
        None
    } else {
        Some(wake_word)
    };

    let continuous = std::env::var("TRANSCRIBER_CONTINUOUS")
        .unwrap_or_else(|_| "true".to_string())
        .parse::<bool>()
        .context("parsing TRANSCRIBER_CONTINUOUS")?;

    let interim_results = std::env::var("TRANSCRIBER_INTERIM_RESULTS")
        .unwrap_or_else(|_| "true".to_string())
        .parse::<bool>()
        .context("parsing TRANSCRIBER_INTERIM_RESULTS")?;

    Ok(ControllerConfig {
        wake_word,
        continuous,
        interim_results,
    })
}

/// Load scripted sessions from TRANSCRIBER_SCRIPT, or fall back to the
/// built-in demo script
fn load_script() -> Result<Vec<Vec<CapabilityEvent>>> {
    match std::env::var("TRANSCRIBER_SCRIPT") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading session script {}", path))?;
            serde_json::from_str(&raw).context("parsing session script")
        }
        Err(_) => Ok(default_script()),
    }
}

/// Built-in demo: wake word, some speech, a platform timeout mid-session
/// (exercising the auto-restart), then a platform error ending the session
fn default_script() -> Vec<Vec<CapabilityEvent>> {
    vec![
        vec![
            CapabilityEvent::Result(ResultBatch::of_final("hey computer ")),
            CapabilityEvent::Result(ResultBatch::of_final("turn on the hallway lights ")),
        ],
        vec![
            CapabilityEvent::Result(ResultBatch::of_final("and the kitchen ones too")),
            CapabilityEvent::Error {
                code: "no-speech".to_string(),
            },
        ],
    ]
}
