use serde::{Deserialize, Serialize};

use crate::tree::{ChildSlot, Modifier, Node};
use crate::value::Props;

/// A single mutation of the renderer's tree, addressed by node id.
///
/// Patches in one batch are applied in order; later patches may refer to
/// ids introduced by earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all_fields = "camelCase")]
pub enum Patch {
    /// Replace the subtree rooted at `target_id` (or the whole tree when the
    /// target is the root or the store is empty).
    #[serde(rename = "replace")]
    ReplaceTree { target_id: String, node: Node },

    #[serde(rename = "insert")]
    InsertNode {
        parent_id: String,
        index: usize,
        #[serde(default)]
        slot: ChildSlot,
        node: Node,
    },

    #[serde(rename = "remove")]
    RemoveNode { target_id: String },

    /// Sets every entry of `props` and deletes every key in `removed`.
    #[serde(rename = "props")]
    UpdateProps {
        target_id: String,
        props: Props,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        removed: Vec<String>,
    },

    /// Replaces the node's modifier list.
    #[serde(rename = "modifiers")]
    UpdateModifiers {
        target_id: String,
        modifiers: Vec<Modifier>,
    },

    /// Repositions an existing node without rebuilding its subtree.
    #[serde(rename = "move")]
    MoveNode {
        target_id: String,
        parent_id: String,
        #[serde(default)]
        slot: ChildSlot,
        index: usize,
    },
}

impl Patch {
    /// Wire tag of the operation.
    pub fn op(&self) -> &'static str {
        match self {
            Patch::ReplaceTree { .. } => "replace",
            Patch::InsertNode { .. } => "insert",
            Patch::RemoveNode { .. } => "remove",
            Patch::UpdateProps { .. } => "props",
            Patch::UpdateModifiers { .. } => "modifiers",
            Patch::MoveNode { .. } => "move",
        }
    }

    /// The id the applier looks up first: the parent for inserts, the
    /// target for everything else.
    pub fn target_id(&self) -> &str {
        match self {
            Patch::InsertNode { parent_id, .. } => parent_id,
            Patch::ReplaceTree { target_id, .. }
            | Patch::RemoveNode { target_id }
            | Patch::UpdateProps { target_id, .. }
            | Patch::UpdateModifiers { target_id, .. }
            | Patch::MoveNode { target_id, .. } => target_id,
        }
    }
}
