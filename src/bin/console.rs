//! Terminal driver for a widget conversation.
//!
//! Reads typed messages from stdin, sends them through the orchestrator and
//! prints the transcript as it grows. Replies are spoken through the voice
//! endpoint (with `--features native-audio`) or on-device speech.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voicewidget::capture::{RecognitionEngine, RecognitionOptions};
use voicewidget::embed::EmbedConfig;
use voicewidget::playback::system::SystemSpeech;
use voicewidget::playback::{AudioSink, NullAudioSink, VoiceSettings};
use voicewidget::session::{FileStorage, Role};
use voicewidget::{ConversationMode, ConversationOrchestrator, WidgetConfig, WidgetEvent};

/// Drive a voice widget conversation from the terminal.
#[derive(Parser)]
#[command(name = "voicewidget-console", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a JSON file holding the host page's embed object.
    #[arg(long)]
    embed: Option<PathBuf>,

    /// Tenant identifier (overrides config and embed).
    #[arg(long)]
    business_id: Option<String>,

    /// Write the effective config to the default location and exit.
    #[arg(long)]
    save_config: bool,
}

/// The terminal has no speech recognizer.
struct NoRecognizer;

impl RecognitionEngine for NoRecognizer {
    fn start(&mut self, _options: &RecognitionOptions) -> voicewidget::Result<()> {
        Err(voicewidget::WidgetError::Unsupported(
            "no speech recognizer in the console".to_owned(),
        ))
    }

    fn stop(&mut self) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("voicewidget=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if cli.save_config {
        let path = WidgetConfig::default_config_path();
        config.save_to_file(&path)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    if let Err(e) = config.validate() {
        warn!(error = %e, "configuration problem");
    }

    let orchestrator = Arc::new(ConversationOrchestrator::from_config(
        &config,
        Arc::new(FileStorage::at_default_location()),
        Box::new(NoRecognizer),
        audio_sink(),
        Arc::new(SystemSpeech::detect()),
    ));
    info!(session_id = orchestrator.session_id(), "session started");

    let printer = tokio::spawn(print_events(orchestrator.subscribe()));

    println!("voicewidget v{}", env!("CARGO_PKG_VERSION"));
    println!("Type a message, or /voice /text /mic /open /close /lang <code> /quit");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/voice", _) => orchestrator.set_mode(ConversationMode::Voice),
            ("/text", _) => orchestrator.set_mode(ConversationMode::Text),
            ("/open", _) => orchestrator.set_open(true),
            ("/close", _) => orchestrator.set_open(false),
            ("/mic", _) => {
                let state = orchestrator.toggle_listening();
                println!("[{state}]");
            }
            ("/lang", code) if !code.trim().is_empty() => {
                let settings = VoiceSettings {
                    language: code.trim().to_owned(),
                    ..orchestrator.voice_settings()
                };
                orchestrator.set_voice_settings(settings);
            }
            _ => {
                orchestrator.submit(line).await;
            }
        }
    }

    orchestrator.set_open(false);
    printer.abort();
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<WidgetConfig> {
    let default_path = WidgetConfig::default_config_path();
    let mut config = match &cli.config {
        Some(path) => WidgetConfig::from_file(path)?,
        None if default_path.exists() => WidgetConfig::from_file(&default_path)?,
        None => WidgetConfig::default(),
    };
    if let Some(path) = &cli.embed {
        let raw = std::fs::read_to_string(path)?;
        config.apply_embed(&EmbedConfig::from_json(&raw)?);
    }
    if let Some(id) = &cli.business_id {
        config.business_id = Some(id.clone());
    }
    Ok(config)
}

#[cfg(feature = "native-audio")]
fn audio_sink() -> Arc<dyn AudioSink> {
    match voicewidget::playback::native::CpalAudioSink::new() {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            warn!(error = %e, "speaker unavailable, replies will use on-device speech");
            Arc::new(NullAudioSink)
        }
    }
}

#[cfg(not(feature = "native-audio"))]
fn audio_sink() -> Arc<dyn AudioSink> {
    Arc::new(NullAudioSink)
}

async fn print_events(mut rx: tokio::sync::broadcast::Receiver<WidgetEvent>) {
    loop {
        match rx.recv().await {
            Ok(WidgetEvent::TurnAppended(turn)) => match turn.role {
                Role::User => println!("you: {}", turn.text),
                Role::Assistant => println!("assistant: {}", turn.text),
            },
            Ok(WidgetEvent::Notice(notice)) => println!("! {}", notice.message()),
            Ok(WidgetEvent::ModeChanged(mode)) => println!("[mode: {mode:?}]"),
            Ok(WidgetEvent::TranscriptCleared { removed }) => {
                println!("[transcript cleared: {removed} turns]");
            }
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event printer lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
