//! Lock-guarded registries shared between the tree owner and I/O tasks.
//!
//! Each registry is an owned value passed around explicitly (usually behind
//! an `Arc`), never a process-wide global, so tests build isolated instances.
//! Lookups copy the entry out and release the lock before calling into it.

mod action;
mod node_type;
mod resource;

pub use action::{ActionEvent, ActionHandler, ActionRegistry, DispatchOutcome};
pub use node_type::{BuildContext, BuildError, NodeBuilder, NodeTypeRegistry};
pub use resource::{
    HttpFetcher, Registration, ResourceError, ResourceFetcher, ResourceKind, ResourceRegistry,
    ResourceSource,
};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("node type '{node_type}' is already registered")]
    DuplicateType { node_type: String },

    #[error("service action '{action}' is already registered")]
    DuplicateService { action: String },
}
