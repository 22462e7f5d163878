use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use super::RegistryError;
use crate::tree::Node;

/// Composite types nest deeper than this only by mistake.
const MAX_BUILD_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("no builder registered for type '{node_type}' (node '{id}')")]
    UnknownType { node_type: String, id: String },

    #[error("failed to build node '{id}': {reason}")]
    Failed { id: String, reason: String },

    #[error("node '{id}' is nested deeper than {max} levels", max = MAX_BUILD_DEPTH)]
    TooDeep { id: String },
}

impl BuildError {
    pub fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        BuildError::Failed {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Turns a node of one type into the external view representation `V`.
pub trait NodeBuilder<V>: Send + Sync {
    fn build(&self, node: &Node, ctx: &mut BuildContext<'_, V>) -> Result<V, BuildError>;

    /// Nodes for which this returns true receive UI events; the renderer
    /// registers an action handler for their id.
    fn is_interactive(&self, _node: &Node) -> bool {
        false
    }
}

impl<V, F> NodeBuilder<V> for F
where
    F: Fn(&Node, &mut BuildContext<'_, V>) -> Result<V, BuildError> + Send + Sync,
{
    fn build(&self, node: &Node, ctx: &mut BuildContext<'_, V>) -> Result<V, BuildError> {
        self(node, ctx)
    }
}

/// Handed to builders so composite types can build their children without
/// knowing the children's types.
pub struct BuildContext<'r, V> {
    registry: &'r NodeTypeRegistry<V>,
    depth: usize,
}

impl<V> BuildContext<'_, V> {
    pub fn build_child(&mut self, child: &Node) -> Result<V, BuildError> {
        self.registry.build_at(child, self.depth + 1)
    }

    /// Builds every layout child in order.
    pub fn build_children(&mut self, node: &Node) -> Result<Vec<V>, BuildError> {
        node.children
            .iter()
            .map(|child| self.build_child(child))
            .collect()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

pub struct NodeTypeRegistry<V> {
    builders: RwLock<HashMap<String, Arc<dyn NodeBuilder<V>>>>,
    fallback: RwLock<Option<Arc<dyn NodeBuilder<V>>>>,
}

impl<V> Default for NodeTypeRegistry<V> {
    fn default() -> Self {
        Self {
            builders: RwLock::new(HashMap::new()),
            fallback: RwLock::new(None),
        }
    }
}

impl<V> NodeTypeRegistry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `builder` for `node_type`. A type can be registered once;
    /// plugins cannot shadow core types.
    pub fn register<B>(&self, node_type: impl Into<String>, builder: B) -> Result<(), RegistryError>
    where
        B: NodeBuilder<V> + 'static,
    {
        let node_type = node_type.into();
        let mut builders = self.builders.write();
        if builders.contains_key(&node_type) {
            return Err(RegistryError::DuplicateType { node_type });
        }
        tracing::debug!(node_type = %node_type, "Registered node type");
        builders.insert(node_type, Arc::new(builder));
        Ok(())
    }

    /// Builder for types nobody registered.
    pub fn set_fallback<B>(&self, builder: B)
    where
        B: NodeBuilder<V> + 'static,
    {
        *self.fallback.write() = Some(Arc::new(builder));
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.builders.read().contains_key(node_type)
    }

    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.builders.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// The builder responsible for `node_type`, falling back when unregistered.
    pub fn builder(&self, node_type: &str) -> Option<Arc<dyn NodeBuilder<V>>> {
        let registered = self.builders.read().get(node_type).cloned();
        registered.or_else(|| self.fallback.read().clone())
    }

    pub fn is_interactive(&self, node: &Node) -> bool {
        self.builder(&node.node_type)
            .is_some_and(|builder| builder.is_interactive(node))
    }

    pub fn build(&self, node: &Node) -> Result<V, BuildError> {
        self.build_at(node, 0)
    }

    fn build_at(&self, node: &Node, depth: usize) -> Result<V, BuildError> {
        if depth > MAX_BUILD_DEPTH {
            return Err(BuildError::TooDeep {
                id: node.id.clone(),
            });
        }
        // The lock is released before the builder runs; builders recurse.
        let builder = self
            .builder(&node.node_type)
            .ok_or_else(|| BuildError::UnknownType {
                node_type: node.node_type.clone(),
                id: node.id.clone(),
            })?;
        let mut ctx = BuildContext {
            registry: self,
            depth,
        };
        builder.build(node, &mut ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Label;

    impl NodeBuilder<String> for Label {
        fn build(&self, node: &Node, _ctx: &mut BuildContext<'_, String>) -> Result<String, BuildError> {
            let text = node
                .props
                .get("text")
                .and_then(|value| value.as_str())
                .unwrap_or_default();
            Ok(format!("label({text})"))
        }
    }

    struct Button;

    impl NodeBuilder<String> for Button {
        fn build(&self, node: &Node, _ctx: &mut BuildContext<'_, String>) -> Result<String, BuildError> {
            Ok(format!("button#{}", node.id))
        }

        fn is_interactive(&self, _node: &Node) -> bool {
            true
        }
    }

    fn stack(node: &Node, ctx: &mut BuildContext<'_, String>) -> Result<String, BuildError> {
        Ok(format!("stack[{}]", ctx.build_children(node)?.join(",")))
    }

    fn registry() -> NodeTypeRegistry<String> {
        let registry = NodeTypeRegistry::new();
        registry.register("Text", Label).expect("text");
        registry.register("Button", Button).expect("button");
        registry.register("Stack", stack).expect("stack");
        registry
    }

    #[test]
    fn composite_builders_delegate_to_children() {
        let tree = Node::new("root", "Stack")
            .with_child(Node::new("t", "Text").with_prop("text", "hi"))
            .with_child(Node::new("b", "Button"));
        assert_eq!(
            registry().build(&tree).expect("build"),
            "stack[label(hi),button#b]"
        );
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let registry = registry();
        assert_eq!(
            registry.register("Text", Label),
            Err(RegistryError::DuplicateType {
                node_type: "Text".into()
            })
        );
    }

    #[test]
    fn unknown_type_fails_without_fallback() {
        let err = registry()
            .build(&Node::new("x", "Chart"))
            .expect_err("unknown");
        assert!(matches!(err, BuildError::UnknownType { ref node_type, .. } if node_type == "Chart"));
    }

    #[test]
    fn fallback_covers_unregistered_types() {
        let registry = registry();
        registry.set_fallback(|node: &Node, _ctx: &mut BuildContext<'_, String>| {
            Ok(format!("?{}", node.node_type))
        });
        assert_eq!(registry.build(&Node::new("x", "Chart")).expect("build"), "?Chart");
        assert!(!registry.contains("Chart"));
    }

    #[test]
    fn interactivity_comes_from_the_builder() {
        let registry = registry();
        assert!(registry.is_interactive(&Node::new("b", "Button")));
        assert!(!registry.is_interactive(&Node::new("t", "Text")));
        assert!(!registry.is_interactive(&Node::new("x", "Chart")));
    }

    #[test]
    fn runaway_nesting_is_cut_off() {
        let mut node = Node::new("leaf", "Text");
        for depth in 0..=MAX_BUILD_DEPTH {
            node = Node::new(format!("s{depth}"), "Stack").with_child(node);
        }
        assert!(matches!(registry().build(&node), Err(BuildError::TooDeep { .. })));
    }
}
