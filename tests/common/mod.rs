//! Shared test utilities: a seeded generator and random view trees.

#![allow(dead_code, unused_imports)]

use std::sync::Arc;

use parking_lot::Mutex;
use viewsync::renderer::ViewSink;
use viewsync::tree::{Modifier, ModifierKind, Node};
use viewsync::value::{Props, Value};

/// xorshift64*; reproducible across runs for a given seed.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform in `0..n`; `n` must be non-zero.
    pub fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    pub fn chance(&mut self, percent: u64) -> bool {
        self.next_u64() % 100 < percent
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len())]
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }
}

const TYPES: [&str; 4] = ["Text", "Button", "Stack", "Image"];
const PROP_KEYS: [&str; 5] = ["text", "color", "size", "enabled", "tags"];
const MODIFIER_KINDS: [ModifierKind; 4] = [
    ModifierKind::Padding,
    ModifierKind::Opacity,
    ModifierKind::Background,
    ModifierKind::Hidden,
];

fn random_value(rng: &mut Rng) -> Value {
    match rng.below(6) {
        0 => Value::Null,
        1 => Value::Bool(rng.chance(50)),
        2 => Value::Int(rng.below(1000) as i64 - 500),
        3 => Value::Float(rng.below(1000) as f64 / 8.0),
        4 => Value::String(format!("s{}", rng.below(5))),
        _ => Value::List(vec![Value::Int(rng.below(3) as i64), Value::from("x")]),
    }
}

fn random_props(rng: &mut Rng) -> Props {
    PROP_KEYS
        .iter()
        .filter_map(|key| rng.chance(40).then(|| (key.to_string(), random_value(rng))))
        .collect()
}

fn random_modifiers(rng: &mut Rng) -> Vec<Modifier> {
    let mut kinds = MODIFIER_KINDS.to_vec();
    rng.shuffle(&mut kinds);
    kinds
        .into_iter()
        .filter_map(|kind| rng.chance(30).then(|| Modifier::new(kind).with_arg("v", rng.below(4) as i64)))
        .collect()
}

struct Slot {
    node: Node,
    parent: Option<usize>,
    auxiliary: bool,
}

/// A random tree rooted at `root` (type `Stack`) whose other ids are drawn
/// from `n0..n{pool}`. Trees drawn from the same pool share ids, so diffs
/// between them contain updates, moves, re-parenting and type changes.
pub fn random_tree(rng: &mut Rng, pool: usize, max_nodes: usize) -> Node {
    let mut ids: Vec<usize> = (0..pool).collect();
    rng.shuffle(&mut ids);
    let count = rng.below(max_nodes.min(pool) + 1);

    let mut slots = vec![Slot {
        node: Node::new("root", "Stack").with_props(random_props(rng)),
        parent: None,
        auxiliary: false,
    }];
    for &id in &ids[..count] {
        let mut node = Node::new(format!("n{id}"), *rng.pick(&TYPES)).with_props(random_props(rng));
        node.modifiers = random_modifiers(rng);
        let parent = rng.below(slots.len());
        slots.push(Slot {
            node,
            parent: Some(parent),
            auxiliary: rng.chance(15),
        });
    }

    // Children always come after their parent, so fold from the back.
    while slots.len() > 1 {
        let Some(slot) = slots.pop() else { break };
        let Some(parent) = slot.parent else { break };
        let target = &mut slots[parent].node;
        let list = if slot.auxiliary {
            &mut target.auxiliary_views
        } else {
            &mut target.children
        };
        list.insert(0, slot.node);
    }
    let mut root = slots.pop().map(|slot| slot.node).unwrap_or_else(|| Node::new("root", "Stack"));
    shuffle_children(rng, &mut root);
    root
}

fn shuffle_children(rng: &mut Rng, node: &mut Node) {
    rng.shuffle(&mut node.children);
    for child in node.children.iter_mut().chain(node.auxiliary_views.iter_mut()) {
        shuffle_children(rng, child);
    }
}

/// What a [`RecordingSink`] saw.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Mount(String, String),
    Replace(String, String),
    Unmount(String),
    Clear,
}

/// A view sink that records every call for later inspection.
#[derive(Clone, Default)]
pub struct RecordingSink(pub Arc<Mutex<Vec<SinkEvent>>>);

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.0.lock().clone()
    }

    pub fn saw(&self, predicate: impl Fn(&SinkEvent) -> bool) -> bool {
        self.0.lock().iter().any(predicate)
    }
}

impl ViewSink<String> for RecordingSink {
    fn mount_root(&mut self, root_id: &str, view: String) {
        self.0.lock().push(SinkEvent::Mount(root_id.into(), view));
    }

    fn replace(&mut self, node_id: &str, view: String) {
        self.0.lock().push(SinkEvent::Replace(node_id.into(), view));
    }

    fn unmount(&mut self, node_id: &str) {
        self.0.lock().push(SinkEvent::Unmount(node_id.into()));
    }

    fn clear(&mut self) {
        self.0.lock().push(SinkEvent::Clear);
    }
}

/// `node` with every modifier list sorted by kind, for comparing trees whose
/// modifiers only differ in order.
pub fn canonical(node: &Node) -> Node {
    let mut node = node.clone();
    node.modifiers.sort_by_key(|modifier| modifier.kind);
    node.children = node.children.iter().map(canonical).collect();
    node.auxiliary_views = node.auxiliary_views.iter().map(canonical).collect();
    node
}
