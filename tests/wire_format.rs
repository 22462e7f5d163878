use serde_json::json;

use viewsync::props;
use viewsync::protocol::{
    decode, decode_payload, encode, encode_payload, Envelope, NotifyPayload, Patch, PatchPayload,
    RenderPayload, ServiceRequest, ServiceResponse,
};
use viewsync::tree::{ChildSlot, Modifier, ModifierKind, Node};
use viewsync::value::Value;

fn as_json(envelope: &Envelope) -> serde_json::Value {
    let payload = encode_payload(envelope).expect("encodes");
    serde_json::from_slice(&payload).expect("valid json")
}

#[test]
fn test_render_envelope_shape() {
    let root = Node::new("root", "Stack")
        .with_modifier(Modifier::new(ModifierKind::Padding).with_arg("all", 8))
        .with_child(Node::new("t1", "Text").with_prop("text", "hi"))
        .with_auxiliary(Node::new("bg", "Rect"));
    let envelope = Envelope::Render(RenderPayload { revision: 1, root });

    assert_eq!(
        as_json(&envelope),
        json!({
            "type": "render",
            "payload": {
                "revision": 1,
                "root": {
                    "id": "root",
                    "type": "Stack",
                    "modifiers": [{"kind": "padding", "args": {"all": 8}}],
                    "children": [{"id": "t1", "type": "Text", "props": {"text": "hi"}}],
                    "auxiliaryViews": [{"id": "bg", "type": "Rect"}]
                }
            }
        })
    );
}

#[test]
fn test_patch_tags_and_field_names() {
    let envelope = Envelope::Patch(PatchPayload {
        revision: 7,
        patches: vec![
            Patch::RemoveNode {
                target_id: "t1".into(),
            },
            Patch::InsertNode {
                parent_id: "root".into(),
                index: 0,
                slot: ChildSlot::Children,
                node: Node::new("t2", "Text"),
            },
            Patch::UpdateProps {
                target_id: "t2".into(),
                props: props! { "text" => "1" },
                removed: vec!["color".into()],
            },
            Patch::UpdateModifiers {
                target_id: "t2".into(),
                modifiers: Vec::new(),
            },
            Patch::MoveNode {
                target_id: "bg".into(),
                parent_id: "root".into(),
                slot: ChildSlot::Auxiliary,
                index: 0,
            },
            Patch::ReplaceTree {
                target_id: "root".into(),
                node: Node::new("root", "List"),
            },
        ],
    });

    assert_eq!(
        as_json(&envelope),
        json!({
            "type": "patch",
            "payload": {
                "revision": 7,
                "patches": [
                    {"op": "remove", "targetId": "t1"},
                    {"op": "insert", "parentId": "root", "index": 0, "slot": "children",
                     "node": {"id": "t2", "type": "Text"}},
                    {"op": "props", "targetId": "t2", "props": {"text": "1"}, "removed": ["color"]},
                    {"op": "modifiers", "targetId": "t2", "modifiers": []},
                    {"op": "move", "targetId": "bg", "parentId": "root", "slot": "auxiliary", "index": 0},
                    {"op": "replace", "targetId": "root", "node": {"id": "root", "type": "List"}}
                ]
            }
        })
    );
}

#[test]
fn test_service_envelopes_shape() {
    let request = Envelope::ServiceRequest(ServiceRequest {
        action: "battery.get".into(),
        params: Default::default(),
        request_id: "r1".into(),
    });
    assert_eq!(
        as_json(&request),
        json!({"type": "serviceRequest", "payload": {"action": "battery.get", "requestId": "r1"}})
    );

    let reply = Envelope::ServiceResponse(ServiceResponse::err("r1", "no battery"));
    assert_eq!(
        as_json(&reply),
        json!({"type": "serviceResponse", "payload": {"requestId": "r1", "error": "no battery"}})
    );

    assert_eq!(as_json(&Envelope::Quit), json!({"type": "quit"}));
}

#[test]
fn test_producer_json_decodes() {
    let payload = br#"{
        "type": "notify",
        "payload": {"nodeId": "inc", "action": "tap", "params": {"x": 1.5}},
        "sentAt": "ignored"
    }"#;
    assert_eq!(
        decode_payload(payload).expect("decodes"),
        Envelope::Notify(NotifyPayload {
            node_id: "inc".into(),
            action: "tap".into(),
            params: props! { "x" => 1.5 },
        })
    );

    let patch = br#"{"type":"patch","payload":{"revision":2,"patches":[
        {"op":"insert","parentId":"root","index":1,"node":{"id":"x","type":"Text"}}]}}"#;
    let Envelope::Patch(body) = decode_payload(patch).expect("decodes") else {
        panic!("expected patch");
    };
    assert!(matches!(
        &body.patches[0],
        Patch::InsertNode { slot: ChildSlot::Children, index: 1, .. }
    ));
}

#[test]
fn test_frame_header_is_big_endian_length() {
    let envelope = Envelope::ServiceResponse(ServiceResponse::ok("r9", Value::Bool(true)));
    let frame = encode(&envelope).expect("encodes");
    let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;

    assert_eq!(len, frame.len() - 4);
    assert_eq!(decode(&frame).expect("decodes"), envelope);
}

#[test]
fn test_unknown_and_malformed_envelopes_are_errors() {
    let unknown = decode_payload(br#"{"type":"telemetry","payload":{}}"#).expect_err("unknown");
    assert!(unknown.is_unknown_type());

    let missing = decode_payload(br#"{"type":"render"}"#).expect_err("no payload");
    assert!(!missing.is_unknown_type());

    assert!(decode_payload(b"not json").is_err());
    assert!(decode(&[0, 0, 0, 9, b'{']).is_err());
}
