//! Wire protocol: envelopes, patches and the framed JSON codec.

pub mod codec;
mod envelope;
mod patch;

pub use codec::{decode, decode_payload, encode, encode_payload, DecodeError, EncodeError};
pub use envelope::{
    ClipboardOp, ClipboardRequest, Envelope, EnvelopeKind, FileDialogMode, FileDialogRequest,
    NotifyPayload, PatchPayload, RenderPayload, ServiceRequest, ServiceResponse,
};
pub use patch::Patch;
