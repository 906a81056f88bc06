//! Chat endpoint contract: request shape, reply extraction, error mapping.

use serde_json::json;
use std::time::Duration;
use voicewidget::chat::{ChatRequest, ChatService, HttpChatClient, RecentMessage};
use voicewidget::session::{Role, Turn};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(message: &str) -> ChatRequest {
    ChatRequest {
        session_id: "sess_abc".into(),
        business_id: "biz_1".into(),
        message: message.into(),
        recent_messages: vec![
            RecentMessage::from(&Turn::user("earlier question")),
            RecentMessage::from(&Turn::assistant("earlier answer")),
            RecentMessage::from(&Turn::user(message)),
        ],
        persona: None,
        language: None,
    }
}

fn client_for(server: &MockServer) -> HttpChatClient {
    HttpChatClient::new(format!("{}/api/chat", server.uri()), Duration::from_secs(2))
}

async fn mount_reply(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn request_body_matches_wire_contract() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({
            "sessionId": "sess_abc",
            "businessId": "biz_1",
            "message": "What are your hours?",
            "recentMessages": [
                {"role": "user", "text": "earlier question"},
                {"role": "assistant", "text": "earlier answer"},
                {"role": "user", "text": "What are your hours?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "9-5"})))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server)
        .send(&request("What are your hours?"))
        .await
        .unwrap();
    assert_eq!(reply, "9-5");
}

#[tokio::test]
async fn optional_persona_and_language_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"persona": "concierge", "language": "es"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "hola"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut req = request("hola");
    req.persona = Some("concierge".into());
    req.language = Some("es".into());
    assert_eq!(client_for(&server).send(&req).await.unwrap(), "hola");
}

#[tokio::test]
async fn reply_key_has_priority_over_text() {
    let server = MockServer::start().await;
    mount_reply(&server, json!({"text": "from text", "reply": "from reply", "success": true})).await;
    let reply = client_for(&server).send(&request("hi")).await.unwrap();
    assert_eq!(reply, "from reply");
}

#[tokio::test]
async fn response_key_is_accepted() {
    let server = MockServer::start().await;
    mount_reply(&server, json!({"response": "from response"})).await;
    let reply = client_for(&server).send(&request("hi")).await.unwrap();
    assert_eq!(reply, "from response");
}

#[tokio::test]
async fn message_key_alone_is_accepted() {
    let server = MockServer::start().await;
    mount_reply(&server, json!({"message": "from message"})).await;
    let reply = client_for(&server).send(&request("hi")).await.unwrap();
    assert_eq!(reply, "from message");
}

#[tokio::test]
async fn empty_object_is_protocol_error() {
    let server = MockServer::start().await;
    mount_reply(&server, json!({})).await;
    let err = client_for(&server).send(&request("hi")).await.unwrap_err();
    assert_eq!(err.code(), "PROTOCOL_ERROR");
}

#[tokio::test]
async fn non_json_body_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    let err = client_for(&server).send(&request("hi")).await.unwrap_err();
    assert!(err.is_protocol());
}

#[tokio::test]
async fn server_error_maps_to_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal failure"))
        .mount(&server)
        .await;
    let err = client_for(&server).send(&request("hi")).await.unwrap_err();
    match err {
        voicewidget::WidgetError::Http { status, ref body } => {
            assert_eq!(status, 500);
            assert!(body.contains("internal failure"));
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"reply": "late"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let client = HttpChatClient::new(
        format!("{}/api/chat", server.uri()),
        Duration::from_millis(200),
    );
    let err = client.send(&request("hi")).await.unwrap_err();
    assert_eq!(err.code(), "TIMEOUT_ERROR");
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let err = HttpChatClient::new(crate::helpers::refused_url("/api/chat"), Duration::from_secs(2))
        .send(&request("hi"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NETWORK_FAILED");
    assert!(err.is_transient());
}

#[test]
fn recent_message_keeps_role() {
    let message = RecentMessage::from(&Turn::assistant("ok"));
    assert_eq!(message.role, Role::Assistant);
}
