// Wire-format tests for inbound message parsing and the plain-text
// classification heuristics.

use visit_scribe::transport::{
    classify_text, parse_frame, ControlMessage, Inbound, ServerEvent, TextClass,
};

#[test]
fn parses_turn_final_event() {
    let json = r#"{"type":"turn-final","speaker":"Doctor","text":"Take a deep breath.","t0":3.2,"t1":5.9,"turnId":12}"#;

    match parse_frame(json) {
        Some(Inbound::Event(ServerEvent::TurnFinal {
            speaker,
            text,
            t0,
            t1,
            turn_id,
        })) => {
            assert_eq!(speaker.as_deref(), Some("Doctor"));
            assert_eq!(text, "Take a deep breath.");
            assert_eq!(t0, Some(3.2));
            assert_eq!(t1, Some(5.9));
            assert_eq!(turn_id, Some(12));
        }
        other => panic!("expected turn-final event, got {:?}", other),
    }
}

#[test]
fn parses_status_event_with_msg_alias() {
    let json = r#"{"type":"status","msg":"diarizing speakers"}"#;

    match parse_frame(json) {
        Some(Inbound::Event(ServerEvent::Status { text })) => {
            assert_eq!(text, "diarizing speakers");
        }
        other => panic!("expected status event, got {:?}", other),
    }
}

#[test]
fn parses_structured_error_event() {
    let json = r#"{"type":"error","text":"model unavailable"}"#;

    match parse_frame(json) {
        Some(Inbound::Event(ServerEvent::Error { text })) => {
            assert_eq!(text, "model unavailable");
        }
        other => panic!("expected error event, got {:?}", other),
    }
}

#[test]
fn heartbeat_envelope_is_a_typed_json_object() {
    let msg = ControlMessage::Heartbeat {
        timestamp: 1730000000000,
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(json, r#"{"type":"heartbeat","timestamp":1730000000000}"#);
}

#[test]
fn empty_frames_are_dropped() {
    assert_eq!(parse_frame(""), None);
    assert_eq!(parse_frame("   \n"), None);
}

#[test]
fn malformed_json_degrades_to_text_classification() {
    // Truncated JSON must not be fatal; it flows through the heuristics.
    let parsed = parse_frame(r#"{"type":"turn-final","text":"#).unwrap();
    assert!(matches!(parsed, Inbound::Text(_, _)));
}

#[test]
fn unrecognized_json_shape_is_not_an_event() {
    let parsed = parse_frame(r#"{"kind":"metrics","latency_ms":12}"#).unwrap();
    assert!(matches!(parsed, Inbound::Text(TextClass::Utterance, _)));
}

#[test]
fn error_keyword_beats_status_keyword() {
    // Ambiguous lines mentioning both kinds of markers are errors.
    assert_eq!(
        classify_text("error while processing the audio stream"),
        TextClass::Error
    );
    assert_eq!(classify_text("upload failed, buffering"), TextClass::Error);
}

#[test]
fn status_markers_classify_as_status() {
    for line in [
        "buffering audio...",
        "transcribing...",
        "connecting to backend",
        "initializing model",
        "loading vocabulary",
        "...please wait",
    ] {
        assert_eq!(classify_text(line), TextClass::Status, "line: {}", line);
    }
}

#[test]
fn plain_speech_defaults_to_doctor_utterance() {
    assert_eq!(
        classify_text("Hello, how are you today?"),
        TextClass::Utterance
    );
}
