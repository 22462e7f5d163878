use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::modifier::{Modifier, ModifierKind};
use super::TreeError;
use crate::value::{Props, Value};

/// One element of a view tree.
///
/// `auxiliary_views` hold secondary trees (backgrounds, overlays) that are
/// not layout children but share the id space and are diffed the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub props: Props,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<Modifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auxiliary_views: Vec<Node>,
}

/// Which child list of a parent a node lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChildSlot {
    #[default]
    Children,
    Auxiliary,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            props: Props::new(),
            modifiers: Vec::new(),
            children: Vec::new(),
            auxiliary_views: Vec::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props.extend(props);
        self
    }

    /// Adds a modifier, replacing any existing modifier of the same kind.
    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        match self.modifiers.iter_mut().find(|m| m.kind == modifier.kind) {
            Some(existing) => *existing = modifier,
            None => self.modifiers.push(modifier),
        }
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_auxiliary(mut self, view: Node) -> Self {
        self.auxiliary_views.push(view);
        self
    }

    pub fn slot(&self, slot: ChildSlot) -> &[Node] {
        match slot {
            ChildSlot::Children => &self.children,
            ChildSlot::Auxiliary => &self.auxiliary_views,
        }
    }

    pub fn slot_mut(&mut self, slot: ChildSlot) -> &mut Vec<Node> {
        match slot {
            ChildSlot::Children => &mut self.children,
            ChildSlot::Auxiliary => &mut self.auxiliary_views,
        }
    }

    pub fn modifier(&self, kind: ModifierKind) -> Option<&Modifier> {
        self.modifiers.iter().find(|m| m.kind == kind)
    }

    /// Depth-first walk over this node, its children and auxiliary views.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in self.children.iter().chain(self.auxiliary_views.iter()) {
            child.walk(visit);
        }
    }

    /// Finds a node by id anywhere in this subtree.
    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter()
            .chain(self.auxiliary_views.iter())
            .find_map(|child| child.find(id))
    }

    /// Number of nodes in this subtree, auxiliary views included.
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    /// Checks the tree-wide invariants: ids are unique across children and
    /// auxiliary views, and no node carries two modifiers of one kind.
    pub fn validate(&self) -> Result<(), TreeError> {
        let mut seen = HashSet::new();
        let mut result = Ok(());
        self.walk(&mut |node| {
            if result.is_err() {
                return;
            }
            if node.id.is_empty() {
                result = Err(TreeError::EmptyId {
                    node_type: node.node_type.clone(),
                });
                return;
            }
            if !seen.insert(node.id.as_str()) {
                result = Err(TreeError::DuplicateId {
                    id: node.id.clone(),
                });
                return;
            }
            let mut kinds = HashSet::new();
            for modifier in &node.modifiers {
                if !kinds.insert(modifier.kind) {
                    result = Err(TreeError::DuplicateModifier {
                        id: node.id.clone(),
                        kind: modifier.kind,
                    });
                    return;
                }
            }
        });
        result
    }
}
