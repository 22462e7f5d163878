//! Request/response calls layered on the envelope transport.
//!
//! The producer issues `serviceRequest`, `clipboard` and `fileDialog`
//! envelopes through [`RpcClient`]; the renderer answers each with a
//! `serviceResponse` echoing the request id, served by [`ServiceRegistry`].

mod client;
mod pending;
mod service;

pub use client::{FileDialogOptions, RpcClient, DEFAULT_TIMEOUT};
pub use pending::PendingRequests;
pub use service::{
    clipboard_params, file_dialog_params, service_fn, ClipboardService, FnService, ServiceHandler,
    ServiceRegistry, CLIPBOARD_ACTION, FILE_DIALOG_ACTION,
};

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    #[error("request '{request_id}' timed out after {after:?}")]
    Timeout { request_id: String, after: Duration },

    #[error("transport closed before a response arrived")]
    Disconnected,

    #[error("remote error: {0}")]
    Remote(String),

    #[error("unexpected result, expected {expected}")]
    UnexpectedResult { expected: &'static str },
}
