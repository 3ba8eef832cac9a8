// Wire format expected by the web client. These must not drift.

use parley_protocol::{ChatMessage, ClientFrame, CompletePayload, StreamFrame};
use parley_stream::parse_complete;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn typing_frame_on_websocket() {
    let text = StreamFrame::Typing { status: true }.to_ws_text();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, json!({ "event": "chat:typing", "payload": { "status": true } }));
}

#[test]
fn chunk_and_display_frames() {
    let chunk = StreamFrame::Chunk { content: "<thi".into() };
    assert_eq!(chunk.payload(), json!({ "content": "<thi" }));
    assert!(chunk.to_ws_text().contains(r#""event":"chat:response:chunk""#));

    let display = StreamFrame::Display { delta: "Hi ".into() };
    assert_eq!(display.name(), "display");
    assert_eq!(display.payload(), json!({ "delta": "Hi " }));
}

#[test]
fn artifact_payload_uses_camel_case() {
    let parsed = parse_complete("<CODE_ARTIFACT>```py\nprint(1)\n```</CODE_ARTIFACT>");
    let frame = StreamFrame::Artifact(parsed.artifacts[0].clone());
    let payload = frame.payload();
    assert_eq!(payload["language"], "py");
    assert_eq!(payload["content"], "print(1)");
    assert!(payload.get("createdAt").is_some());
    assert!(payload.get("created_at").is_none());
}

#[test]
fn complete_payload_fields() {
    let frame = StreamFrame::Complete(Box::new(CompletePayload {
        id: "m1".into(),
        content: "Answer".into(),
        thinking: "why".into(),
        artifacts: Vec::new(),
        session_id: "s1".into(),
        session_title: "Chat 1".into(),
    }));
    assert!(frame.is_terminal());
    assert_eq!(
        frame.payload(),
        json!({
            "id": "m1",
            "content": "Answer",
            "thinking": "why",
            "artifacts": [],
            "sessionId": "s1",
            "sessionTitle": "Chat 1",
        })
    );
}

#[test]
fn error_frame_event_name() {
    let value: serde_json::Value =
        serde_json::from_str(&StreamFrame::error("rate limited").to_ws_text()).unwrap();
    assert_eq!(value["event"], "chat:error");
    assert_eq!(value["payload"]["message"], "rate limited");
}

#[test]
fn inbound_message_object() {
    let frame = ClientFrame::parse(
        r#"{"event":"chat:message","payload":{"message":"hi","sessionId":"s1","promptType":"backend"}}"#,
    )
    .unwrap();
    assert_eq!(
        frame.into_message(),
        ChatMessage {
            message: "hi".into(),
            session_id: Some("s1".into()),
            prompt_type: Some("backend".into()),
        }
    );
}

#[test]
fn inbound_message_bare_string() {
    let frame = ClientFrame::parse(r#"{"event":"chat:message","payload":"hello"}"#).unwrap();
    let message = frame.into_message();
    assert_eq!(message.message, "hello");
    assert_eq!(message.session_id, None);
}

#[test]
fn unknown_inbound_event_is_rejected() {
    assert!(ClientFrame::parse(r#"{"event":"chat:join","payload":{}}"#).is_err());
}

#[test]
fn stream_frames_round_trip() {
    let frame = StreamFrame::Thinking { content: "a".into(), active: false };
    let back: StreamFrame = serde_json::from_str(&frame.to_ws_text()).unwrap();
    assert_eq!(back, frame);
}
