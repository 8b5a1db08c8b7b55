use serde_json::json;

use weft_api::protocol::{self, ProtocolError, UnitFault, UnitReply, UnitRequest};
use weft_api::{CallId, FunctionDefinition, FunctionId};

#[test]
fn test_request_frames_are_tagged_by_kind() {
    let register = UnitRequest::Register {
        function_id: FunctionId::from("f1"),
        definition: FunctionDefinition::new("add", 2, "add"),
    };
    let frame: serde_json::Value =
        serde_json::from_str(&protocol::encode_request(&register).unwrap()).unwrap();
    assert_eq!(
        frame,
        json!({
            "kind": "register",
            "function_id": "f1",
            "definition": { "name": "add", "arity": 2, "body": "add" }
        })
    );

    let invoke = UnitRequest::Invoke {
        function_id: FunctionId::from("f1"),
        call_id: CallId::from("c1"),
        args: vec![json!(2), json!("x")],
    };
    let frame: serde_json::Value =
        serde_json::from_str(&protocol::encode_request(&invoke).unwrap()).unwrap();
    assert_eq!(frame["kind"], "invoke");
    assert_eq!(frame["call_id"], "c1");
    assert_eq!(frame["args"], json!([2, "x"]));
}

#[test]
fn test_faults_are_tagged_on_the_wire() {
    let reply = UnitReply::RegisterFailed {
        function_id: FunctionId::from("f1"),
        error: UnitFault::Definition("no such function".to_string()),
    };
    let frame: serde_json::Value =
        serde_json::from_str(&protocol::encode_reply(&reply).unwrap()).unwrap();
    assert_eq!(
        frame,
        json!({
            "kind": "register_failed",
            "function_id": "f1",
            "error": { "fault": "definition", "detail": "no such function" }
        })
    );
}

#[test]
fn test_reply_decodes_from_handwritten_frame() {
    let frame = r#"{"kind":"invoke_failed","call_id":"c9","error":{"fault":"function_not_found","detail":"f2"}}"#;
    assert_eq!(
        protocol::decode_reply(frame).unwrap(),
        UnitReply::InvokeFailed {
            call_id: CallId::from("c9"),
            error: UnitFault::FunctionNotFound(FunctionId::from("f2")),
        }
    );

    let frame = r#"{"kind":"invoke_succeeded","call_id":"c1","value":{"sum":5}}"#;
    assert_eq!(
        protocol::decode_reply(frame).unwrap(),
        UnitReply::InvokeSucceeded {
            call_id: CallId::from("c1"),
            value: json!({ "sum": 5 }),
        }
    );
}

#[test]
fn test_unknown_or_malformed_frames_are_unrecognized() {
    let frames = [
        r#"{"kind":"reboot"}"#,
        r#"{"kind":"invoke","call_id":"c1"}"#,
        r#"{"function_id":"f1"}"#,
        "not json at all",
    ];
    for frame in frames {
        assert!(
            matches!(protocol::decode_request(frame), Err(ProtocolError::Unrecognized(_))),
            "decoded {}",
            frame
        );
    }

    // A request is not a reply
    let register = protocol::encode_request(&UnitRequest::Register {
        function_id: FunctionId::from("f1"),
        definition: FunctionDefinition::named("add", 2),
    })
    .unwrap();
    assert!(protocol::decode_reply(&register).is_err());
}

#[test]
fn test_kind_names_match_the_tags() {
    let reply = UnitReply::InvokeSucceeded {
        call_id: CallId::from("c1"),
        value: json!(null),
    };
    let frame: serde_json::Value =
        serde_json::from_str(&protocol::encode_reply(&reply).unwrap()).unwrap();
    assert_eq!(frame["kind"], reply.kind());
}
