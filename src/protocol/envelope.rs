use serde::{Deserialize, Serialize};

use crate::tree::Node;
use crate::value::{Props, Value};

use super::Patch;

/// Top-level message exchanged between producer and renderer.
///
/// Encoded as `{"type": <tag>, "payload": {...}}`; `quit` has no payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Envelope {
    Render(RenderPayload),
    Patch(PatchPayload),
    Notify(NotifyPayload),
    Clipboard(ClipboardRequest),
    FileDialog(FileDialogRequest),
    ServiceRequest(ServiceRequest),
    ServiceResponse(ServiceResponse),
    Quit,
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Render(_) => EnvelopeKind::Render,
            Envelope::Patch(_) => EnvelopeKind::Patch,
            Envelope::Notify(_) => EnvelopeKind::Notify,
            Envelope::Clipboard(_) => EnvelopeKind::Clipboard,
            Envelope::FileDialog(_) => EnvelopeKind::FileDialog,
            Envelope::ServiceRequest(_) => EnvelopeKind::ServiceRequest,
            Envelope::ServiceResponse(_) => EnvelopeKind::ServiceResponse,
            Envelope::Quit => EnvelopeKind::Quit,
        }
    }

    /// Correlation id of request-style envelopes and their replies.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Envelope::Clipboard(req) => Some(&req.request_id),
            Envelope::FileDialog(req) => Some(&req.request_id),
            Envelope::ServiceRequest(req) => Some(&req.request_id),
            Envelope::ServiceResponse(resp) => Some(&resp.request_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Render,
    Patch,
    Notify,
    Clipboard,
    FileDialog,
    ServiceRequest,
    ServiceResponse,
    Quit,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::Render => "render",
            EnvelopeKind::Patch => "patch",
            EnvelopeKind::Notify => "notify",
            EnvelopeKind::Clipboard => "clipboard",
            EnvelopeKind::FileDialog => "fileDialog",
            EnvelopeKind::ServiceRequest => "serviceRequest",
            EnvelopeKind::ServiceResponse => "serviceResponse",
            EnvelopeKind::Quit => "quit",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "render" => EnvelopeKind::Render,
            "patch" => EnvelopeKind::Patch,
            "notify" => EnvelopeKind::Notify,
            "clipboard" => EnvelopeKind::Clipboard,
            "fileDialog" => EnvelopeKind::FileDialog,
            "serviceRequest" => EnvelopeKind::ServiceRequest,
            "serviceResponse" => EnvelopeKind::ServiceResponse,
            "quit" => EnvelopeKind::Quit,
            _ => return None,
        })
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full tree replacement; starts a tree or replaces it on hot reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPayload {
    #[serde(default)]
    pub revision: u64,
    pub root: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchPayload {
    #[serde(default)]
    pub revision: u64,
    pub patches: Vec<Patch>,
}

/// A renderer-originated event routed to the producer's handler for `node_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyPayload {
    pub node_id: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub params: Props,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClipboardOp {
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardRequest {
    pub request_id: String,
    pub op: ClipboardOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileDialogMode {
    Open,
    Save,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDialogRequest {
    pub request_id: String,
    pub mode: FileDialogMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_extensions: Vec<String>,
    #[serde(default)]
    pub allow_multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub action: String,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub params: Props,
    pub request_id: String,
}

/// Reply to any request-style envelope. Carries either `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceResponse {
    pub fn ok(request_id: impl Into<String>, result: Value) -> Self {
        Self {
            request_id: request_id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn err(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            result: None,
            error: Some(error.into()),
        }
    }

    /// An absent `result` without `error` is a successful `null`.
    pub fn into_result(self) -> Result<Value, String> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}
