//! Renderer-side canonical tree.
//!
//! Nodes live in an arena keyed by id; each entry keeps its parent link and
//! the ordered id lists of its children and auxiliary views, so a patch is
//! resolved with a single map lookup instead of a tree walk.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::{ChildSlot, Modifier, Node, TreeError};
use crate::protocol::Patch;
use crate::value::Props;

/// Reasons a single patch could not be applied. None of them is fatal for
/// the batch the patch belongs to.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    #[error("node '{id}' not found")]
    NodeNotFound { id: String },

    #[error("node id '{id}' is already present in the tree")]
    DuplicateId { id: String },

    #[error("index {index} out of range for '{parent_id}' ({len} entries)")]
    IndexOutOfRange {
        parent_id: String,
        index: usize,
        len: usize,
    },

    #[error("invalid target '{id}': {reason}")]
    InvalidTarget { id: String, reason: String },

    #[error("invalid subtree: {0}")]
    InvalidTree(#[from] TreeError),
}

/// What a patch (or a batch of them) changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Nodes whose own view must be rebuilt: the target of a props or
    /// modifiers update, the parent of a structural change.
    pub rebuilt: Vec<String>,
    /// Every id that entered the index.
    pub inserted: Vec<String>,
    /// Every id that left the index.
    pub removed: Vec<String>,
    /// The root itself was replaced or removed.
    pub root_replaced: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.rebuilt.is_empty()
            && self.inserted.is_empty()
            && self.removed.is_empty()
            && !self.root_replaced
    }

    pub fn merge(&mut self, other: ChangeSet) {
        for id in other.rebuilt {
            if !self.rebuilt.contains(&id) {
                self.rebuilt.push(id);
            }
        }
        self.inserted.extend(other.inserted);
        self.removed.extend(other.removed);
        self.root_replaced |= other.root_replaced;
    }
}

/// Read-only view of one indexed node.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    node_type: String,
    props: Props,
    modifiers: Vec<Modifier>,
    parent: Option<(String, ChildSlot)>,
    children: Vec<String>,
    auxiliary: Vec<String>,
}

impl NodeEntry {
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn parent(&self) -> Option<(&str, ChildSlot)> {
        self.parent.as_ref().map(|(id, slot)| (id.as_str(), *slot))
    }

    pub fn slot(&self, slot: ChildSlot) -> &[String] {
        match slot {
            ChildSlot::Children => &self.children,
            ChildSlot::Auxiliary => &self.auxiliary,
        }
    }

    fn slot_mut(&mut self, slot: ChildSlot) -> &mut Vec<String> {
        match slot {
            ChildSlot::Children => &mut self.children,
            ChildSlot::Auxiliary => &mut self.auxiliary,
        }
    }
}

#[derive(Debug, Default)]
pub struct TreeStore {
    root: Option<String>,
    nodes: HashMap<String, NodeEntry>,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&NodeEntry> {
        self.nodes.get(id)
    }

    /// Replaces the whole tree and rebuilds the index.
    pub fn set_root(&mut self, root: Node) -> Result<ChangeSet, TreeError> {
        root.validate()?;
        let removed = self.clear();
        let mut inserted = Vec::with_capacity(root.subtree_len());
        self.root = Some(root.id.clone());
        self.index_subtree(root, None, &mut inserted);
        Ok(ChangeSet {
            rebuilt: Vec::new(),
            inserted,
            removed,
            root_replaced: true,
        })
    }

    /// Drops every node, returning the ids that were indexed.
    pub fn clear(&mut self) -> Vec<String> {
        self.root = None;
        self.nodes.drain().map(|(id, _)| id).collect()
    }

    /// Rebuilds the owned subtree rooted at `id`.
    pub fn subtree(&self, id: &str) -> Option<Node> {
        let entry = self.nodes.get(id)?;
        let mut node = Node::new(id, entry.node_type.clone());
        node.props = entry.props.clone();
        node.modifiers = entry.modifiers.clone();
        node.children = entry
            .children
            .iter()
            .filter_map(|child| self.subtree(child))
            .collect();
        node.auxiliary_views = entry
            .auxiliary
            .iter()
            .filter_map(|child| self.subtree(child))
            .collect();
        Some(node)
    }

    pub fn snapshot(&self) -> Option<Node> {
        self.root.as_deref().and_then(|root| self.subtree(root))
    }

    /// True when `ancestor` is `id` itself or lies on its parent chain.
    pub fn is_within(&self, id: &str, ancestor: &str) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            current = self
                .nodes
                .get(node_id)
                .and_then(|entry| entry.parent.as_ref())
                .map(|(parent, _)| parent.as_str());
        }
        false
    }

    /// Applies every patch in order. A failing patch is logged and skipped;
    /// the rest of the batch still applies.
    pub fn apply_batch(&mut self, patches: &[Patch]) -> (ChangeSet, Vec<PatchError>) {
        let mut changes = ChangeSet::default();
        let mut errors = Vec::new();
        for patch in patches {
            match self.apply_patch(patch) {
                Ok(change) => changes.merge(change),
                Err(err) => {
                    tracing::warn!(
                        op = patch.op(),
                        target = %patch.target_id(),
                        error = %err,
                        "Skipping patch"
                    );
                    errors.push(err);
                }
            }
        }
        (changes, errors)
    }

    pub fn apply_patch(&mut self, patch: &Patch) -> Result<ChangeSet, PatchError> {
        match patch {
            Patch::ReplaceTree { target_id, node } => self.replace(target_id, node),
            Patch::InsertNode {
                parent_id,
                index,
                slot,
                node,
            } => self.insert(parent_id, *index, *slot, node),
            Patch::RemoveNode { target_id } => self.remove(target_id),
            Patch::UpdateProps {
                target_id,
                props,
                removed,
            } => self.update_props(target_id, props, removed),
            Patch::UpdateModifiers {
                target_id,
                modifiers,
            } => self.update_modifiers(target_id, modifiers),
            Patch::MoveNode {
                target_id,
                parent_id,
                slot,
                index,
            } => self.move_node(target_id, parent_id, *slot, *index),
        }
    }

    fn replace(&mut self, target_id: &str, node: &Node) -> Result<ChangeSet, PatchError> {
        if self.root.is_none() || self.root.as_deref() == Some(target_id) {
            return Ok(self.set_root(node.clone())?);
        }

        let (parent_id, slot) = self
            .nodes
            .get(target_id)
            .ok_or_else(|| not_found(target_id))?
            .parent
            .clone()
            .ok_or_else(|| PatchError::InvalidTarget {
                id: target_id.to_string(),
                reason: "detached node".to_string(),
            })?;

        node.validate()?;
        let outgoing: HashSet<String> = self.collect_subtree_ids(target_id).into_iter().collect();
        self.check_fresh_ids(node, &outgoing)?;

        let position = self.position_in_parent(&parent_id, slot, target_id)?;
        let mut removed = Vec::new();
        self.deindex_subtree(target_id, &mut removed);

        let mut inserted = Vec::new();
        let new_id = node.id.clone();
        self.index_subtree(node.clone(), Some((parent_id.clone(), slot)), &mut inserted);
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.slot_mut(slot)[position] = new_id;
        }

        Ok(ChangeSet {
            rebuilt: vec![parent_id],
            inserted,
            removed,
            root_replaced: false,
        })
    }

    fn insert(
        &mut self,
        parent_id: &str,
        index: usize,
        slot: ChildSlot,
        node: &Node,
    ) -> Result<ChangeSet, PatchError> {
        let len = self
            .nodes
            .get(parent_id)
            .ok_or_else(|| not_found(parent_id))?
            .slot(slot)
            .len();
        if index > len {
            return Err(PatchError::IndexOutOfRange {
                parent_id: parent_id.to_string(),
                index,
                len,
            });
        }

        node.validate()?;
        self.check_fresh_ids(node, &HashSet::new())?;

        let mut inserted = Vec::new();
        let new_id = node.id.clone();
        self.index_subtree(
            node.clone(),
            Some((parent_id.to_string(), slot)),
            &mut inserted,
        );
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.slot_mut(slot).insert(index, new_id);
        }

        Ok(ChangeSet {
            rebuilt: vec![parent_id.to_string()],
            inserted,
            removed: Vec::new(),
            root_replaced: false,
        })
    }

    fn remove(&mut self, target_id: &str) -> Result<ChangeSet, PatchError> {
        let parent = self
            .nodes
            .get(target_id)
            .ok_or_else(|| not_found(target_id))?
            .parent
            .clone();

        let mut removed = Vec::new();
        let rebuilt = match parent {
            Some((parent_id, slot)) => {
                if let Some(entry) = self.nodes.get_mut(&parent_id) {
                    entry.slot_mut(slot).retain(|child| child != target_id);
                }
                self.deindex_subtree(target_id, &mut removed);
                vec![parent_id]
            }
            None => {
                self.deindex_subtree(target_id, &mut removed);
                self.root = None;
                Vec::new()
            }
        };

        Ok(ChangeSet {
            root_replaced: rebuilt.is_empty(),
            rebuilt,
            inserted: Vec::new(),
            removed,
        })
    }

    fn update_props(
        &mut self,
        target_id: &str,
        props: &Props,
        removed: &[String],
    ) -> Result<ChangeSet, PatchError> {
        let entry = self
            .nodes
            .get_mut(target_id)
            .ok_or_else(|| not_found(target_id))?;
        for (key, value) in props {
            entry.props.insert(key.clone(), value.clone());
        }
        for key in removed {
            entry.props.remove(key);
        }
        Ok(rebuild_only(target_id))
    }

    fn update_modifiers(
        &mut self,
        target_id: &str,
        modifiers: &[Modifier],
    ) -> Result<ChangeSet, PatchError> {
        let mut kinds = HashSet::new();
        for modifier in modifiers {
            if !kinds.insert(modifier.kind) {
                return Err(TreeError::DuplicateModifier {
                    id: target_id.to_string(),
                    kind: modifier.kind,
                }
                .into());
            }
        }
        let entry = self
            .nodes
            .get_mut(target_id)
            .ok_or_else(|| not_found(target_id))?;
        entry.modifiers = modifiers.to_vec();
        Ok(rebuild_only(target_id))
    }

    fn move_node(
        &mut self,
        target_id: &str,
        parent_id: &str,
        slot: ChildSlot,
        index: usize,
    ) -> Result<ChangeSet, PatchError> {
        let (old_parent, old_slot) = self
            .nodes
            .get(target_id)
            .ok_or_else(|| not_found(target_id))?
            .parent
            .clone()
            .ok_or_else(|| PatchError::InvalidTarget {
                id: target_id.to_string(),
                reason: "the root cannot be moved".to_string(),
            })?;
        if !self.nodes.contains_key(parent_id) {
            return Err(not_found(parent_id));
        }
        if self.is_within(parent_id, target_id) {
            return Err(PatchError::InvalidTarget {
                id: target_id.to_string(),
                reason: format!("cannot move a node under its own subtree '{parent_id}'"),
            });
        }

        let same_list = old_parent == parent_id && old_slot == slot;
        let len = self.nodes[parent_id].slot(slot).len();
        let max_index = if same_list { len - 1 } else { len };
        if index > max_index {
            return Err(PatchError::IndexOutOfRange {
                parent_id: parent_id.to_string(),
                index,
                len: max_index,
            });
        }

        if let Some(entry) = self.nodes.get_mut(&old_parent) {
            entry.slot_mut(old_slot).retain(|child| child != target_id);
        }
        if let Some(entry) = self.nodes.get_mut(parent_id) {
            entry.slot_mut(slot).insert(index, target_id.to_string());
        }
        if let Some(entry) = self.nodes.get_mut(target_id) {
            entry.parent = Some((parent_id.to_string(), slot));
        }

        let mut rebuilt = vec![parent_id.to_string()];
        if old_parent != parent_id {
            rebuilt.push(old_parent);
        }
        Ok(ChangeSet {
            rebuilt,
            ..ChangeSet::default()
        })
    }

    fn index_subtree(
        &mut self,
        node: Node,
        parent: Option<(String, ChildSlot)>,
        inserted: &mut Vec<String>,
    ) {
        let Node {
            id,
            node_type,
            props,
            modifiers,
            children,
            auxiliary_views,
        } = node;

        let entry = NodeEntry {
            node_type,
            props,
            modifiers,
            parent,
            children: children.iter().map(|c| c.id.clone()).collect(),
            auxiliary: auxiliary_views.iter().map(|c| c.id.clone()).collect(),
        };
        self.nodes.insert(id.clone(), entry);
        inserted.push(id.clone());

        for child in children {
            self.index_subtree(child, Some((id.clone(), ChildSlot::Children)), inserted);
        }
        for view in auxiliary_views {
            self.index_subtree(view, Some((id.clone(), ChildSlot::Auxiliary)), inserted);
        }
    }

    fn deindex_subtree(&mut self, id: &str, removed: &mut Vec<String>) {
        let Some(entry) = self.nodes.remove(id) else {
            return;
        };
        removed.push(id.to_string());
        for child in entry.children.iter().chain(entry.auxiliary.iter()) {
            self.deindex_subtree(child, removed);
        }
    }

    fn collect_subtree_ids(&self, id: &str) -> Vec<String> {
        let mut ids = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(entry) = self.nodes.get(&current) {
                stack.extend(entry.children.iter().cloned());
                stack.extend(entry.auxiliary.iter().cloned());
                ids.push(current);
            }
        }
        ids
    }

    /// Fails when any id of `node` is already indexed outside `leaving`.
    fn check_fresh_ids(&self, node: &Node, leaving: &HashSet<String>) -> Result<(), PatchError> {
        let mut clash = None;
        node.walk(&mut |n| {
            if clash.is_none() && self.nodes.contains_key(&n.id) && !leaving.contains(&n.id) {
                clash = Some(n.id.clone());
            }
        });
        match clash {
            Some(id) => Err(PatchError::DuplicateId { id }),
            None => Ok(()),
        }
    }

    fn position_in_parent(
        &self,
        parent_id: &str,
        slot: ChildSlot,
        child_id: &str,
    ) -> Result<usize, PatchError> {
        self.nodes
            .get(parent_id)
            .and_then(|parent| parent.slot(slot).iter().position(|id| id == child_id))
            .ok_or_else(|| PatchError::InvalidTarget {
                id: child_id.to_string(),
                reason: format!("not listed under parent '{parent_id}'"),
            })
    }
}

fn not_found(id: &str) -> PatchError {
    PatchError::NodeNotFound { id: id.to_string() }
}

fn rebuild_only(id: &str) -> ChangeSet {
    ChangeSet {
        rebuilt: vec![id.to_string()],
        ..ChangeSet::default()
    }
}
