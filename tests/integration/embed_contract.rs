//! Host embed object and config file feeding a live conversation.

use crate::helpers::harness;
use serde_json::json;
use voicewidget::WidgetConfig;
use voicewidget::embed::EmbedConfig;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn embed_overlay_routes_requests_to_host_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant/chat"))
        .and(body_partial_json(json!({
            "businessId": "shop-7",
            "persona": "concierge",
            "language": "fr"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "Bonjour" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
        [conversation]
        speak_replies_in_text_mode = false

        [endpoints]
        chat_url = "http://127.0.0.1:9/unused"
        chat_timeout_ms = 2000
        "#,
    )
    .unwrap();

    let mut config = WidgetConfig::from_file(&config_path).unwrap();
    assert!(config.validate().is_err());

    let embed = EmbedConfig::from_json(
        &json!({
            "businessId": "shop-7",
            "backendUrl": format!("{}/tenant/chat", server.uri()),
            "persona": "concierge",
            "language": "fr"
        })
        .to_string(),
    )
    .unwrap();
    config.apply_embed(&embed);
    config.validate().unwrap();

    let h = harness(&config);
    let outcome = h.orchestrator.submit("Salut").await;
    assert!(outcome.was_sent());
    assert_eq!(h.orchestrator.transcript()[1].text, "Bonjour");
    assert!(h.local.texts().is_empty());
    assert_eq!(h.orchestrator.voice_settings().language, "fr");
}

#[test]
fn saved_config_reloads_with_embed_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("voicewidget").join("config.toml");

    let mut config = WidgetConfig::default();
    config.apply_embed(&EmbedConfig::from_json(r#"{"businessId":"acme"}"#).unwrap());
    config.save_to_file(&path).unwrap();

    let loaded = WidgetConfig::from_file(&path).unwrap();
    assert_eq!(loaded.business_id(), Some("acme"));
    assert_eq!(loaded.endpoints.chat_url, config.endpoints.chat_url);
    loaded.validate().unwrap();
}
