//! View tree model: nodes with stable ids, and the renderer-side store that
//! keeps the canonical copy indexed by id.

mod modifier;
mod node;
mod store;

pub use modifier::{Modifier, ModifierKind};
pub use node::{ChildSlot, Node};
pub use store::{ChangeSet, NodeEntry, PatchError, TreeStore};

use thiserror::Error;

/// Violations of the tree-wide invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("duplicate node id '{id}'")]
    DuplicateId { id: String },

    #[error("node of type '{node_type}' has an empty id")]
    EmptyId { node_type: String },

    #[error("node '{id}' carries more than one '{kind}' modifier")]
    DuplicateModifier { id: String, kind: ModifierKind },
}
