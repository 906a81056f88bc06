//! Shared helpers for integration tests: scripted recognition engine,
//! recording audio outputs, and orchestrator builders.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use voicewidget::capture::{RecognitionEngine, RecognitionOptions};
use voicewidget::error::{Result, WidgetError};
use voicewidget::playback::{AudioClip, AudioSink, LocalSynthesizer, LocalVoiceParams};
use voicewidget::session::{KeyValueStorage, MemoryStorage};
use voicewidget::{ConversationOrchestrator, WidgetConfig, WidgetEvent};

/// What the scripted engine has been asked to do.
#[derive(Debug, Default)]
pub(crate) struct EngineLog {
    pub starts: Vec<RecognitionOptions>,
    pub stops: usize,
}

/// Recognition engine driven by the test through the event channel.
#[derive(Clone, Default)]
pub(crate) struct ScriptedEngine {
    pub log: Arc<Mutex<EngineLog>>,
    pub running: Arc<AtomicBool>,
}

impl ScriptedEngine {
    pub(crate) fn start_count(&self) -> usize {
        self.log.lock().unwrap().starts.len()
    }

    /// Generation of the most recent start.
    pub(crate) fn generation(&self) -> u64 {
        self.log
            .lock()
            .unwrap()
            .starts
            .last()
            .map(|o| o.generation)
            .expect("engine was never started")
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn start(&mut self, options: &RecognitionOptions) -> Result<()> {
        self.log.lock().unwrap().starts.push(options.clone());
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stops += 1;
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Sink that records clips and whether the microphone was open at the time.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub clips: Mutex<Vec<AudioClip>>,
    pub mic_open_during_playback: AtomicBool,
    pub mic: Option<Arc<AtomicBool>>,
    pub fail: bool,
}

impl RecordingSink {
    pub(crate) fn watching(mic: Arc<AtomicBool>) -> Self {
        Self {
            mic: Some(mic),
            ..Self::default()
        }
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, clip: &AudioClip) -> Result<()> {
        let mic_open = self.mic.as_ref().is_some_and(|mic| mic.load(Ordering::SeqCst));
        if mic_open {
            self.mic_open_during_playback.store(true, Ordering::SeqCst);
        }
        if self.fail {
            return Err(WidgetError::Playback("output device busy".into()));
        }
        self.clips.lock().unwrap().push(clip.clone());
        Ok(())
    }

    fn stop(&self) {}
}

/// On-device synthesizer that records what it was asked to say.
#[derive(Default)]
pub(crate) struct RecordingLocal {
    pub spoken: Mutex<Vec<(String, LocalVoiceParams)>>,
}

impl RecordingLocal {
    pub(crate) fn texts(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }
}

#[async_trait]
impl LocalSynthesizer for RecordingLocal {
    async fn speak(&self, text: &str, params: &LocalVoiceParams) -> Result<()> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_owned(), params.clone()));
        Ok(())
    }

    fn cancel(&self) {}
}

/// Config pointing both endpoints at a mock server.
pub(crate) fn config_for(server_uri: &str) -> WidgetConfig {
    let mut config = WidgetConfig {
        business_id: Some("biz_test".into()),
        ..WidgetConfig::default()
    };
    config.endpoints.chat_url = format!("{server_uri}/api/chat");
    config.endpoints.voice_url = Some(format!("{server_uri}/api/voice"));
    config.endpoints.chat_timeout_ms = 2_000;
    config.endpoints.voice_timeout_ms = 2_000;
    config
}

/// Everything a conversation test needs to observe.
pub(crate) struct Harness {
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub engine: ScriptedEngine,
    pub sink: Arc<RecordingSink>,
    pub local: Arc<RecordingLocal>,
}

pub(crate) fn harness(config: &WidgetConfig) -> Harness {
    harness_with_storage(config, Arc::new(MemoryStorage::new()))
}

pub(crate) fn harness_with_storage(
    config: &WidgetConfig,
    storage: Arc<dyn KeyValueStorage>,
) -> Harness {
    let engine = ScriptedEngine::default();
    let sink = Arc::new(RecordingSink::watching(Arc::clone(&engine.running)));
    let local = Arc::new(RecordingLocal::default());
    let orchestrator = Arc::new(ConversationOrchestrator::from_config(
        config,
        storage,
        Box::new(engine.clone()),
        sink.clone(),
        local.clone(),
    ));
    Harness {
        orchestrator,
        engine,
        sink,
        local,
    }
}

/// URL on a local port nothing is listening on.
pub(crate) fn refused_url(path: &str) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}{path}")
}

/// Drain all pending events from the broadcast receiver into a Vec.
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<WidgetEvent>) -> Vec<WidgetEvent> {
    let mut events = Vec::new();
    while let Ok(evt) = rx.try_recv() {
        events.push(evt);
    }
    events
}

/// Poll `condition` every 20 ms for up to 5 s.
pub(crate) async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}
