//! Voice endpoint contract and the playback fallback paths.

use crate::helpers::{RecordingLocal, RecordingSink};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use voicewidget::config::PlaybackConfig;
use voicewidget::playback::http::HttpVoiceClient;
use voicewidget::playback::{
    PlaybackController, PlaybackOutcome, PlaybackSource, SpeechSynthesizer, SynthesisOutcome,
    SynthesisRequest, VoiceSettings,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MP3_STUB: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00";

fn client_for(server: &MockServer) -> HttpVoiceClient {
    HttpVoiceClient::new(format!("{}/api/voice", server.uri()), Duration::from_secs(2))
}

fn controller(
    server: &MockServer,
    sink: Arc<RecordingSink>,
    local: Arc<RecordingLocal>,
) -> PlaybackController {
    PlaybackController::new(
        Some(Arc::new(client_for(server))),
        sink,
        local,
        &PlaybackConfig::default(),
        Duration::from_secs(2),
    )
}

#[tokio::test]
async fn request_body_carries_text_and_settings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/voice"))
        .and(body_json(json!({
            "text": "Hello there",
            "language": "es",
            "gender": "male",
            "style": "friendly",
            "speakingSpeed": 1.25
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(MP3_STUB, "audio/mpeg"))
        .expect(1)
        .mount(&server)
        .await;

    let settings = VoiceSettings {
        language: "es".into(),
        gender: "male".into(),
        style: "friendly".into(),
        speaking_speed: Some(1.25),
        pitch: None,
    };
    let outcome = client_for(&server)
        .synthesize(&SynthesisRequest::new("Hello there", &settings))
        .await
        .unwrap();
    match outcome {
        SynthesisOutcome::Audio(clip) => {
            assert_eq!(clip.content_type, "audio/mpeg");
            assert_eq!(clip.bytes.as_ref(), MP3_STUB);
        }
        other => panic!("expected audio, got {other:?}"),
    }
}

#[tokio::test]
async fn json_response_is_a_fallback_with_voice_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fallback": true,
            "voiceId": "fr-FR",
            "provider": "browser",
            "language": "fr"
        })))
        .mount(&server)
        .await;

    let outcome = client_for(&server)
        .synthesize(&SynthesisRequest::new("Bonjour", &VoiceSettings::default()))
        .await
        .unwrap();
    match outcome {
        SynthesisOutcome::Fallback(hint) => {
            assert_eq!(hint.voice_id.as_deref(), Some("fr-FR"));
            assert_eq!(hint.provider.as_deref(), Some("browser"));
        }
        other => panic!("expected fallback, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_maps_to_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let err = client_for(&server)
        .synthesize(&SynthesisRequest::new("hi", &VoiceSettings::default()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "HTTP_STATUS");
}

#[tokio::test]
async fn audio_reply_plays_remotely() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(MP3_STUB, "audio/mpeg"))
        .mount(&server)
        .await;
    let sink = Arc::new(RecordingSink::default());
    let local = Arc::new(RecordingLocal::default());

    let outcome = controller(&server, sink.clone(), local.clone())
        .speak("hello", &VoiceSettings::default())
        .await;
    assert_eq!(outcome, PlaybackOutcome::Completed(PlaybackSource::Remote));
    assert_eq!(sink.clips.lock().unwrap().len(), 1);
    assert!(local.texts().is_empty());
}

#[tokio::test]
async fn json_reply_falls_back_to_local_speech_with_hinted_locale() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"fallback": true, "voiceId": "es-MX"})),
        )
        .mount(&server)
        .await;
    let sink = Arc::new(RecordingSink::default());
    let local = Arc::new(RecordingLocal::default());

    let outcome = controller(&server, sink.clone(), local.clone())
        .speak("hola", &VoiceSettings::default())
        .await;
    assert_eq!(outcome, PlaybackOutcome::Completed(PlaybackSource::Local));
    assert!(sink.clips.lock().unwrap().is_empty());
    let spoken = local.spoken.lock().unwrap();
    assert_eq!(spoken[0].0, "hola");
    assert_eq!(spoken[0].1.locale, "es-MX");
}

#[tokio::test]
async fn empty_audio_body_falls_back_to_local_speech() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(Vec::<u8>::new(), "audio/mpeg"))
        .mount(&server)
        .await;
    let sink = Arc::new(RecordingSink::default());
    let local = Arc::new(RecordingLocal::default());

    let outcome = controller(&server, sink.clone(), local.clone())
        .speak("hello", &VoiceSettings::default())
        .await;
    assert_eq!(outcome, PlaybackOutcome::Completed(PlaybackSource::Local));
    assert!(sink.clips.lock().unwrap().is_empty());
    assert_eq!(local.texts(), vec!["hello"]);
}

#[tokio::test]
async fn playback_failure_falls_back_to_local_speech() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(MP3_STUB, "audio/mpeg"))
        .mount(&server)
        .await;
    let sink = Arc::new(RecordingSink {
        fail: true,
        ..RecordingSink::default()
    });
    let local = Arc::new(RecordingLocal::default());

    let outcome = controller(&server, sink, local.clone())
        .speak("hello", &VoiceSettings::default())
        .await;
    assert_eq!(outcome, PlaybackOutcome::Completed(PlaybackSource::Local));
    assert_eq!(local.texts(), vec!["hello"]);
}

#[tokio::test]
async fn unreachable_voice_service_falls_back_with_mapped_locale() {
    let local = Arc::new(RecordingLocal::default());
    let playback = PlaybackController::new(
        Some(Arc::new(HttpVoiceClient::new(
            crate::helpers::refused_url("/api/voice"),
            Duration::from_secs(2),
        ))),
        Arc::new(RecordingSink::default()),
        local.clone(),
        &PlaybackConfig::default(),
        Duration::from_secs(2),
    );
    let settings = VoiceSettings {
        language: "german".into(),
        speaking_speed: Some(3.0),
        ..VoiceSettings::default()
    };

    let outcome = playback.speak("Guten Tag", &settings).await;
    assert_eq!(outcome, PlaybackOutcome::Completed(PlaybackSource::Local));
    let spoken = local.spoken.lock().unwrap();
    assert_eq!(spoken[0].1.locale, "de-DE");
    assert_eq!(spoken[0].1.rate, 2.0);
}

#[tokio::test]
async fn slow_voice_service_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(MP3_STUB, "audio/mpeg")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let local = Arc::new(RecordingLocal::default());
    let playback = PlaybackController::new(
        Some(Arc::new(client_for(&server))),
        Arc::new(RecordingSink::default()),
        local.clone(),
        &PlaybackConfig::default(),
        Duration::from_millis(200),
    );

    let started = std::time::Instant::now();
    let outcome = playback.speak("hello", &VoiceSettings::default()).await;
    assert_eq!(outcome, PlaybackOutcome::Completed(PlaybackSource::Local));
    assert!(started.elapsed() < Duration::from_secs(3));
}
