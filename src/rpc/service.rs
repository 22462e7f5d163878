use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::protocol::{
    ClipboardOp, ClipboardRequest, Envelope, FileDialogMode, FileDialogRequest, ServiceResponse,
};
use crate::registry::RegistryError;
use crate::transport::EnvelopeSender;
use crate::value::{Props, Value};

pub const CLIPBOARD_ACTION: &str = "clipboard";
pub const FILE_DIALOG_ACTION: &str = "fileDialog";

/// Renderer-side implementation of one service action.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    async fn call(&self, params: Props) -> Result<Value, String>;
}

pub struct FnService<F>(F);

/// Wraps a synchronous closure as a service.
pub fn service_fn<F>(f: F) -> FnService<F>
where
    F: Fn(Props) -> Result<Value, String> + Send + Sync,
{
    FnService(f)
}

#[async_trait]
impl<F> ServiceHandler for FnService<F>
where
    F: Fn(Props) -> Result<Value, String> + Send + Sync,
{
    async fn call(&self, params: Props) -> Result<Value, String> {
        (self.0)(params)
    }
}

#[derive(Default)]
pub struct ServiceRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ServiceHandler>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&self, action: impl Into<String>, handler: H) -> Result<(), RegistryError>
    where
        H: ServiceHandler + 'static,
    {
        let action = action.into();
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&action) {
            return Err(RegistryError::DuplicateService { action });
        }
        handlers.insert(action, Arc::new(handler));
        Ok(())
    }

    pub fn contains(&self, action: &str) -> bool {
        self.handlers.read().contains_key(action)
    }

    pub fn actions(&self) -> Vec<String> {
        let mut actions: Vec<String> = self.handlers.read().keys().cloned().collect();
        actions.sort();
        actions
    }

    pub async fn handle(&self, action: &str, params: Props) -> Result<Value, String> {
        let handler = self.handlers.read().get(action).cloned();
        match handler {
            Some(handler) => handler.call(params).await,
            None => Err(format!("unknown service action: {action}")),
        }
    }

    /// Serves a request-style envelope on its own task and queues the
    /// `serviceResponse` on `reply`. Returns `None` for other envelopes.
    pub fn serve(self: Arc<Self>, envelope: Envelope, reply: EnvelopeSender) -> Option<JoinHandle<()>> {
        let (request_id, action, params) = match envelope {
            Envelope::ServiceRequest(req) => (req.request_id, req.action, req.params),
            Envelope::Clipboard(req) => {
                let params = clipboard_params(&req);
                (req.request_id, CLIPBOARD_ACTION.to_string(), params)
            }
            Envelope::FileDialog(req) => {
                let params = file_dialog_params(&req);
                (req.request_id, FILE_DIALOG_ACTION.to_string(), params)
            }
            _ => return None,
        };

        Some(tokio::spawn(async move {
            let response = match self.handle(&action, params).await {
                Ok(result) => ServiceResponse::ok(&request_id, result),
                Err(error) => {
                    tracing::debug!(request_id = %request_id, action = %action, error = %error, "Service call failed");
                    ServiceResponse::err(&request_id, error)
                }
            };
            if reply.send(Envelope::ServiceResponse(response)).is_err() {
                tracing::debug!(request_id = %request_id, "Session ended before the service replied");
            }
        }))
    }
}

pub fn clipboard_params(req: &ClipboardRequest) -> Props {
    let mut params = Props::new();
    let op = match req.op {
        ClipboardOp::Get => "get",
        ClipboardOp::Set => "set",
    };
    params.insert("op".into(), op.into());
    if let Some(text) = &req.text {
        params.insert("text".into(), text.as_str().into());
    }
    params
}

pub fn file_dialog_params(req: &FileDialogRequest) -> Props {
    let mode = match req.mode {
        FileDialogMode::Open => "open",
        FileDialogMode::Save => "save",
        FileDialogMode::Directory => "directory",
    };
    let mut params = Props::new();
    params.insert("mode".into(), mode.into());
    if let Some(title) = &req.title {
        params.insert("title".into(), title.as_str().into());
    }
    params.insert(
        "allowedExtensions".into(),
        req.allowed_extensions.clone().into(),
    );
    params.insert("allowMultiple".into(), req.allow_multiple.into());
    params
}

/// The system clipboard, reached through `arboard` on a blocking thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClipboardService;

#[async_trait]
impl ServiceHandler for ClipboardService {
    async fn call(&self, params: Props) -> Result<Value, String> {
        let op = params
            .get("op")
            .and_then(Value::as_str)
            .unwrap_or("get")
            .to_string();
        let text = params
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string);

        tokio::task::spawn_blocking(move || {
            let mut clipboard =
                arboard::Clipboard::new().map_err(|e| format!("clipboard unavailable: {e}"))?;
            match op.as_str() {
                "get" => match clipboard.get_text() {
                    Ok(text) => Ok(Value::String(text)),
                    Err(arboard::Error::ContentNotAvailable) => Ok(Value::Null),
                    Err(e) => Err(format!("failed to read clipboard: {e}")),
                },
                "set" => {
                    let text = text.ok_or("clipboard set requires 'text'")?;
                    clipboard
                        .set_text(text)
                        .map(|()| Value::Null)
                        .map_err(|e| format!("failed to set clipboard text: {e}"))
                }
                other => Err(format!("unknown clipboard op: {other}")),
            }
        })
        .await
        .map_err(|e| format!("clipboard task failed: {e}"))?
    }
}
