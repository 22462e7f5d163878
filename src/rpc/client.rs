use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use super::{PendingRequests, RpcError};
use crate::protocol::{
    ClipboardOp, ClipboardRequest, Envelope, FileDialogMode, FileDialogRequest, ServiceRequest,
    ServiceResponse,
};
use crate::shutdown::ShutdownHandle;
use crate::transport::EnvelopeSender;
use crate::value::{Props, Value};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct FileDialogOptions {
    pub mode: FileDialogMode,
    pub title: Option<String>,
    pub allowed_extensions: Vec<String>,
    pub allow_multiple: bool,
}

impl FileDialogOptions {
    pub fn open() -> Self {
        Self::with_mode(FileDialogMode::Open)
    }

    pub fn save() -> Self {
        Self::with_mode(FileDialogMode::Save)
    }

    pub fn directory() -> Self {
        Self::with_mode(FileDialogMode::Directory)
    }

    fn with_mode(mode: FileDialogMode) -> Self {
        Self {
            mode,
            title: None,
            allowed_extensions: Vec::new(),
            allow_multiple: false,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }
}

/// Producer-side handle for request/response calls to the renderer.
///
/// Cheap to clone; all clones share one pending table. Any number of calls
/// may be outstanding at once, each under its own request id.
#[derive(Clone)]
pub struct RpcClient {
    sender: EnvelopeSender,
    pending: Arc<PendingRequests>,
    timeout: Duration,
    closed: ShutdownHandle,
}

impl RpcClient {
    pub fn new(sender: EnvelopeSender, timeout: Duration) -> Self {
        Self {
            sender,
            pending: Arc::new(PendingRequests::new()),
            timeout,
            closed: ShutdownHandle::new(),
        }
    }

    /// Signaled by `disconnect`. Calls made afterwards fail at once.
    pub fn closed(&self) -> ShutdownHandle {
        self.closed.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Requests still waiting for a response.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Calls a renderer service such as `battery.get`.
    pub async fn call(&self, action: impl Into<String>, params: Props) -> Result<Value, RpcError> {
        let action = action.into();
        self.request(move |request_id| {
            Envelope::ServiceRequest(ServiceRequest {
                action,
                params,
                request_id,
            })
        })
        .await
    }

    pub async fn clipboard_get(&self) -> Result<Option<String>, RpcError> {
        let result = self
            .request(|request_id| {
                Envelope::Clipboard(ClipboardRequest {
                    request_id,
                    op: ClipboardOp::Get,
                    text: None,
                })
            })
            .await?;
        match result {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(text)),
            _ => Err(RpcError::UnexpectedResult {
                expected: "string or null",
            }),
        }
    }

    pub async fn clipboard_set(&self, text: impl Into<String>) -> Result<(), RpcError> {
        let text = text.into();
        self.request(move |request_id| {
            Envelope::Clipboard(ClipboardRequest {
                request_id,
                op: ClipboardOp::Set,
                text: Some(text),
            })
        })
        .await
        .map(|_| ())
    }

    /// Shows a file dialog. An empty list means the user cancelled.
    pub async fn file_dialog(&self, options: FileDialogOptions) -> Result<Vec<PathBuf>, RpcError> {
        let result = self
            .request(move |request_id| {
                Envelope::FileDialog(FileDialogRequest {
                    request_id,
                    mode: options.mode,
                    title: options.title,
                    allowed_extensions: options.allowed_extensions,
                    allow_multiple: options.allow_multiple,
                })
            })
            .await?;
        match result {
            Value::Null => Ok(Vec::new()),
            Value::String(path) => Ok(vec![PathBuf::from(path)]),
            Value::List(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(path) => Ok(PathBuf::from(path)),
                    _ => Err(RpcError::UnexpectedResult {
                        expected: "list of paths",
                    }),
                })
                .collect(),
            _ => Err(RpcError::UnexpectedResult {
                expected: "list of paths",
            }),
        }
    }

    /// Blocks the current thread until `call` completes.
    ///
    /// Only safe from plain threads outside the runtime. Calling it from an
    /// async task panics, and calling it from the tree owner stalls every
    /// patch and event until the response or the timeout arrives.
    pub fn call_blocking(
        &self,
        runtime: &Handle,
        action: impl Into<String>,
        params: Props,
    ) -> Result<Value, RpcError> {
        runtime.block_on(self.call(action, params))
    }

    /// Routes an inbound `serviceResponse` to its caller. Late responses
    /// (after a timeout) and unknown ids are dropped.
    pub fn resolve(&self, response: ServiceResponse) -> bool {
        let request_id = response.request_id.clone();
        let delivered = self.pending.complete(response);
        if !delivered {
            tracing::debug!(request_id = %request_id, "Dropping response with no pending request");
        }
        delivered
    }

    /// Fails every outstanding call, and every later one, with
    /// `Disconnected`.
    pub fn disconnect(&self) {
        self.closed.signal();
        let failed = self.pending.fail_all();
        if failed > 0 {
            tracing::info!(failed, "Transport closed with requests in flight");
        }
    }

    async fn request<F>(&self, build: F) -> Result<Value, RpcError>
    where
        F: FnOnce(String) -> Envelope,
    {
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = self.pending.insert(&request_id);

        // Frees the slot on every exit path, including the caller dropping
        // this future mid-wait.
        let pending = Arc::clone(&self.pending);
        let _slot = scopeguard::guard(request_id.clone(), move |id| {
            pending.cancel(&id);
        });

        // Checked after the slot exists: a concurrent `disconnect` either
        // drains it or has already set the flag.
        if self.closed.is_shutting_down() {
            return Err(RpcError::Disconnected);
        }

        let envelope = build(request_id.clone());
        tracing::debug!(request_id = %request_id, kind = %envelope.kind(), "Sending request");
        self.sender
            .send(envelope)
            .map_err(|_| RpcError::Disconnected)?;

        match tokio::time::timeout(self.timeout, response).await {
            Ok(Ok(response)) => response.into_result().map_err(RpcError::Remote),
            Ok(Err(_)) => Err(RpcError::Disconnected),
            Err(_) => {
                tracing::warn!(request_id = %request_id, timeout_ms = self.timeout.as_millis() as u64, "Request timed out");
                Err(RpcError::Timeout {
                    request_id,
                    after: self.timeout,
                })
            }
        }
    }
}
