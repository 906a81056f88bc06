//! On-device speech through the platform's command-line synthesizer.
//!
//! Uses `say` on macOS and `espeak-ng` / `espeak` elsewhere, located on
//! `PATH` at construction time.

use super::{LocalSynthesizer, LocalVoiceParams};
use crate::error::{Result, WidgetError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Words per minute at rate 1.0.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Supported command-line synthesizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechCommand {
    /// macOS `say`.
    Say,
    /// `espeak-ng` or classic `espeak`.
    Espeak,
}

/// [`LocalSynthesizer`] backed by a speech command.
#[derive(Debug)]
pub struct SystemSpeech {
    program: Option<(SpeechCommand, PathBuf)>,
    current: Mutex<Option<CancellationToken>>,
}

impl SystemSpeech {
    /// Locate a synthesizer on `PATH`. Speaking fails with
    /// [`WidgetError::Unsupported`] if none is found.
    pub fn detect() -> Self {
        let program = ["say", "espeak-ng", "espeak"]
            .into_iter()
            .find_map(|name| which::which(name).ok().map(|path| (name, path)))
            .map(|(name, path)| {
                let kind = if name == "say" {
                    SpeechCommand::Say
                } else {
                    SpeechCommand::Espeak
                };
                (kind, path)
            });
        match &program {
            Some((kind, path)) => debug!(?kind, path = %path.display(), "on-device speech available"),
            None => warn!("no on-device speech command found on PATH"),
        }
        Self {
            program,
            current: Mutex::new(None),
        }
    }

    /// Use an explicit program.
    pub fn with_program(kind: SpeechCommand, path: impl Into<PathBuf>) -> Self {
        Self {
            program: Some((kind, path.into())),
            current: Mutex::new(None),
        }
    }

    /// Whether a synthesizer was found.
    pub fn is_available(&self) -> bool {
        self.program.is_some()
    }

    fn replace_token(&self, token: Option<CancellationToken>) {
        let previous = match self.current.lock() {
            Ok(mut current) => std::mem::replace(&mut *current, token),
            Err(_) => None,
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}

/// Command-line arguments for speaking with `params`.
///
/// The text itself is written to the program's stdin, never passed as an
/// argument, so reply text cannot be parsed as an option.
pub fn speech_args(kind: SpeechCommand, params: &LocalVoiceParams) -> Vec<String> {
    let wpm = (BASE_WORDS_PER_MINUTE * params.rate).round() as u32;
    match kind {
        SpeechCommand::Say => vec![
            "-r".to_owned(),
            wpm.to_string(),
            "-f".to_owned(),
            "-".to_owned(),
        ],
        SpeechCommand::Espeak => {
            let variant = if params.gender == "male" { "m3" } else { "f3" };
            // espeak pitch is 0..=99 with 50 as normal
            let pitch = (params.pitch * 50.0).round().clamp(0.0, 99.0) as u32;
            vec![
                "-v".to_owned(),
                format!("{}+{variant}", params.locale.to_lowercase()),
                "-s".to_owned(),
                wpm.to_string(),
                "-p".to_owned(),
                pitch.to_string(),
                "--stdin".to_owned(),
            ]
        }
    }
}

async fn run(
    program: &Path,
    args: Vec<String>,
    input: &str,
    token: CancellationToken,
) -> Result<()> {
    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            WidgetError::Playback(format!("failed to start {}: {e}", program.display()))
        })?;

    let stdin = child.stdin.take();
    let speak = async {
        if let Some(mut stdin) = stdin {
            // A program that exits early closes the pipe; its status says why.
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                debug!(error = %e, "speech command stopped reading input");
            }
            drop(stdin);
        }
        child.wait().await
    };

    let status = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        status = speak => Some(status),
    };

    match status {
        Some(status) => {
            let status = status?;
            if status.success() {
                Ok(())
            } else {
                Err(WidgetError::Playback(format!("{} exited with {status}", program.display())))
            }
        }
        None => {
            let _ = child.start_kill();
            Ok(())
        }
    }
}

#[async_trait]
impl LocalSynthesizer for SystemSpeech {
    async fn speak(&self, text: &str, params: &LocalVoiceParams) -> Result<()> {
        let Some((kind, program)) = &self.program else {
            return Err(WidgetError::Unsupported(
                "no on-device speech synthesizer".to_owned(),
            ));
        };
        let token = CancellationToken::new();
        self.replace_token(Some(token.clone()));
        run(program, speech_args(*kind, params), text, token).await
    }

    fn cancel(&self) {
        self.replace_token(None);
    }
}
