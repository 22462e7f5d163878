//! A renderer without a screen: views are one-line descriptions written to
//! the log. Used by `viewsync host` and in tests.

use std::fmt::Write as _;

use super::ViewSink;
use crate::registry::{BuildContext, BuildError, NodeBuilder, NodeTypeRegistry};
use crate::rpc::{service_fn, ClipboardService, ServiceRegistry, CLIPBOARD_ACTION};
use crate::tree::Node;
use crate::value::{Props, Value};

/// Node types whose nodes receive taps.
pub const INTERACTIVE_TYPES: [&str; 3] = ["Button", "Toggle", "TextField"];

struct Interactive;

impl NodeBuilder<String> for Interactive {
    fn build(&self, node: &Node, ctx: &mut BuildContext<'_, String>) -> Result<String, BuildError> {
        describe(node, ctx)
    }

    fn is_interactive(&self, _node: &Node) -> bool {
        true
    }
}

/// `Type#id{key=value,...}[child,...]`, with modifiers as `+kind`.
pub fn describe(node: &Node, ctx: &mut BuildContext<'_, String>) -> Result<String, BuildError> {
    let mut out = format!("{}#{}", node.node_type, node.id);
    if !node.props.is_empty() {
        let props: Vec<String> = node
            .props
            .iter()
            .map(|(key, value)| format!("{key}={}", brief(value)))
            .collect();
        let _ = write!(out, "{{{}}}", props.join(","));
    }
    for modifier in &node.modifiers {
        let _ = write!(out, "+{}", modifier.kind);
    }
    let children = ctx.build_children(node)?;
    if !children.is_empty() {
        let _ = write!(out, "[{}]", children.join(","));
    }
    if !node.auxiliary_views.is_empty() {
        let aux = node
            .auxiliary_views
            .iter()
            .map(|view| ctx.build_child(view))
            .collect::<Result<Vec<_>, _>>()?;
        let _ = write!(out, "<{}>", aux.join(","));
    }
    Ok(out)
}

fn brief(value: &Value) -> String {
    match value {
        Value::String(text) => format!("{text:?}"),
        Value::List(items) => format!("[{} items]", items.len()),
        Value::Map(map) => format!("{{{} keys}}", map.len()),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

pub fn node_types() -> NodeTypeRegistry<String> {
    let registry = NodeTypeRegistry::new();
    for node_type in INTERACTIVE_TYPES {
        // The registry is fresh, so these cannot collide.
        let _ = registry.register(node_type, Interactive);
    }
    registry.set_fallback(describe);
    registry
}

/// Services of the headless host: the system clipboard and a battery stub.
pub fn services() -> ServiceRegistry {
    let registry = ServiceRegistry::new();
    let _ = registry.register(CLIPBOARD_ACTION, ClipboardService);
    let _ = registry.register(
        "battery.get",
        service_fn(|_params: Props| {
            let mut status = Props::new();
            status.insert("level".into(), Value::Null);
            status.insert("state".into(), "unknown".into());
            Ok(Value::Map(status))
        }),
    );
    registry
}

/// Writes every view change to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ViewSink<String> for LogSink {
    fn mount_root(&mut self, root_id: &str, view: String) {
        tracing::info!(node_id = %root_id, view = %view, "mount");
    }

    fn replace(&mut self, node_id: &str, view: String) {
        tracing::info!(node_id = %node_id, view = %view, "update");
    }

    fn unmount(&mut self, node_id: &str) {
        tracing::info!(node_id = %node_id, "unmount");
    }

    fn clear(&mut self) {
        tracing::debug!("clear");
    }
}
