//! Envelope codec: JSON payloads behind a 4-byte big-endian length prefix.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use super::envelope::{Envelope, EnvelopeKind};

pub const FRAME_HEADER_LEN: usize = 4;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("frame too large: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unknown envelope type '{tag}'")]
    UnknownType { tag: String },

    #[error("'{envelope}' envelope is missing required field '{field}'")]
    MissingField { envelope: EnvelopeKind, field: &'static str },

    #[error("invalid '{envelope}' payload: {source}")]
    InvalidPayload {
        envelope: EnvelopeKind,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Unknown tags come from newer peers and are dropped quietly.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, DecodeError::UnknownType { .. })
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame too large: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    tag: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

/// Serializes an envelope to its JSON payload, without framing.
pub fn encode_payload(envelope: &Envelope) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(envelope)?)
}

/// Serializes an envelope into a complete length-prefixed frame.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, EncodeError> {
    let payload = encode_payload(envelope)?;
    let len = u32::try_from(payload.len()).map_err(|_| EncodeError::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes one complete length-prefixed frame.
pub fn decode(frame: &[u8]) -> Result<Envelope, DecodeError> {
    if frame.len() < FRAME_HEADER_LEN {
        return Err(DecodeError::Truncated {
            expected: FRAME_HEADER_LEN,
            actual: frame.len(),
        });
    }
    let mut header = [0_u8; FRAME_HEADER_LEN];
    header.copy_from_slice(&frame[..FRAME_HEADER_LEN]);
    let expected = u32::from_be_bytes(header) as usize;
    let payload = &frame[FRAME_HEADER_LEN..];
    if payload.len() != expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: payload.len(),
        });
    }
    decode_payload(payload)
}

/// Decodes an unframed JSON payload. Unknown top-level fields are ignored.
pub fn decode_payload(payload: &[u8]) -> Result<Envelope, DecodeError> {
    let raw: RawEnvelope = serde_json::from_slice(payload).map_err(DecodeError::Malformed)?;
    let Some(kind) = EnvelopeKind::from_tag(&raw.tag) else {
        return Err(DecodeError::UnknownType { tag: raw.tag });
    };

    let body = raw.payload;
    Ok(match kind {
        EnvelopeKind::Render => Envelope::Render(payload_as(kind, body)?),
        EnvelopeKind::Patch => Envelope::Patch(payload_as(kind, body)?),
        EnvelopeKind::Notify => Envelope::Notify(payload_as(kind, body)?),
        EnvelopeKind::Clipboard => Envelope::Clipboard(payload_as(kind, body)?),
        EnvelopeKind::FileDialog => Envelope::FileDialog(payload_as(kind, body)?),
        EnvelopeKind::ServiceRequest => Envelope::ServiceRequest(payload_as(kind, body)?),
        EnvelopeKind::ServiceResponse => Envelope::ServiceResponse(payload_as(kind, body)?),
        EnvelopeKind::Quit => Envelope::Quit,
    })
}

fn payload_as<T: DeserializeOwned>(
    envelope: EnvelopeKind,
    payload: Option<serde_json::Value>,
) -> Result<T, DecodeError> {
    let payload = match payload {
        Some(serde_json::Value::Null) | None => {
            return Err(DecodeError::MissingField {
                envelope,
                field: "payload",
            })
        }
        Some(payload) => payload,
    };
    serde_json::from_value(payload).map_err(|source| DecodeError::InvalidPayload { envelope, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use crate::protocol::{
        NotifyPayload, Patch, PatchPayload, RenderPayload, ServiceRequest, ServiceResponse,
    };
    use crate::tree::Node;
    use crate::value::Value;

    #[test]
    fn frame_prefix_is_big_endian_length() {
        let frame = encode(&Envelope::Quit).expect("encode");
        let payload = br#"{"type":"quit"}"#;
        assert_eq!(&frame[..4], &(payload.len() as u32).to_be_bytes());
        assert_eq!(&frame[4..], payload);
    }

    #[test]
    fn render_frame_decodes_to_same_envelope() {
        let envelope = Envelope::Render(RenderPayload {
            revision: 1,
            root: Node::new("root", "Stack")
                .with_child(Node::new("t1", "Text").with_prop("text", "0")),
        });
        let frame = encode(&envelope).expect("encode");
        assert_eq!(decode(&frame).expect("decode"), envelope);
    }

    #[test]
    fn patch_envelope_uses_wire_tags() {
        let envelope = Envelope::Patch(PatchPayload {
            revision: 2,
            patches: vec![Patch::UpdateProps {
                target_id: "t1".into(),
                props: props! { "text" => "1" },
                removed: Vec::new(),
            }],
        });
        let json: serde_json::Value =
            serde_json::from_slice(&encode_payload(&envelope).expect("encode")).expect("json");
        assert_eq!(json["type"], "patch");
        assert_eq!(json["payload"]["patches"][0]["op"], "props");
        assert_eq!(json["payload"]["patches"][0]["targetId"], "t1");
    }

    #[test]
    fn unknown_type_is_reported_separately() {
        let err = decode_payload(br#"{"type":"hologram","payload":{}}"#).expect_err("unknown");
        assert!(err.is_unknown_type());
        assert!(err.to_string().contains("hologram"));
    }

    #[test]
    fn unknown_top_level_fields_are_ignored() {
        let decoded = decode_payload(
            br#"{"type":"notify","version":9,"payload":{"nodeId":"b1","action":"click","extra":true}}"#,
        )
        .expect("decode");
        assert_eq!(
            decoded,
            Envelope::Notify(NotifyPayload {
                node_id: "b1".into(),
                action: "click".into(),
                params: Default::default(),
            })
        );
    }

    #[test]
    fn missing_payload_and_missing_field_fail() {
        let err = decode_payload(br#"{"type":"render"}"#).expect_err("no payload");
        assert!(matches!(err, DecodeError::MissingField { field: "payload", .. }));

        let err = decode_payload(br#"{"type":"serviceRequest","payload":{"action":"battery.get"}}"#)
            .expect_err("no request id");
        assert!(matches!(
            err,
            DecodeError::InvalidPayload {
                envelope: EnvelopeKind::ServiceRequest,
                ..
            }
        ));
        assert!(err.to_string().contains("requestId"));
    }

    #[test]
    fn malformed_nested_value_fails() {
        let err = decode_payload(br#"{"type":"render","payload":{"root":{"id":"r","type":"Stack","props":{"a":[1,}}}}"#)
            .expect_err("malformed");
        assert!(matches!(err, DecodeError::Malformed(_)));

        let err = decode_payload(br#"{"type":"render","payload":{"root":{"id":5,"type":"Stack"}}}"#)
            .expect_err("bad id");
        assert!(matches!(err, DecodeError::InvalidPayload { .. }));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let mut frame = encode(&Envelope::Quit).expect("encode");
        frame.pop();
        assert!(matches!(decode(&frame), Err(DecodeError::Truncated { .. })));
        assert!(matches!(decode(&[0, 0]), Err(DecodeError::Truncated { expected: 4, actual: 2 })));
    }

    #[test]
    fn service_messages_carry_request_id() {
        let request = Envelope::ServiceRequest(ServiceRequest {
            action: "battery.get".into(),
            params: props! {},
            request_id: "r1".into(),
        });
        let decoded = decode(&encode(&request).expect("encode")).expect("decode");
        assert_eq!(decoded.request_id(), Some("r1"));

        let response = Envelope::ServiceResponse(ServiceResponse::ok("r1", Value::Int(87)));
        let json: serde_json::Value =
            serde_json::from_slice(&encode_payload(&response).expect("encode")).expect("json");
        assert_eq!(json["payload"]["requestId"], "r1");
        assert_eq!(json["payload"]["result"], 87);
        assert!(json["payload"].get("error").is_none());
    }

    #[test]
    fn error_response_round_trips_to_err() {
        let frame = encode(&Envelope::ServiceResponse(ServiceResponse::err("r2", "denied")))
            .expect("encode");
        match decode(&frame).expect("decode") {
            Envelope::ServiceResponse(resp) => assert_eq!(resp.into_result(), Err("denied".into())),
            other => panic!("expected response, got {other:?}"),
        }
    }
}
