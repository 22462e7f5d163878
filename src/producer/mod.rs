//! Producer process side: builds view trees, publishes them as renders and
//! patch batches, and receives events and service responses back.

pub mod demo;
mod session;
mod view;

pub use session::ProducerSession;
pub use view::{Commit, ViewPublisher};

use thiserror::Error;

use crate::protocol::EncodeError;
use crate::transport::TransportError;
use crate::tree::TreeError;

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("invalid view tree: {0}")]
    InvalidTree(#[from] TreeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("cannot publish revision: {0}")]
    Encode(#[from] EncodeError),
}
