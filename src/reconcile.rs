//! Producer-side diff between two tree revisions.
//!
//! Nodes are matched by id, never by position. A node "survives" into the
//! new revision when an old node with the same id and type sits under the
//! same (surviving) parent in the same slot; every other node of the new
//! tree arrives through an `insert` (or a `replace` at the root). Removals
//! are emitted first so that an id leaving one parent can be inserted under
//! another within the same batch.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::protocol::Patch;
use crate::tree::{ChildSlot, Modifier, ModifierKind, Node};
use crate::value::Props;

const SLOTS: [ChildSlot; 2] = [ChildSlot::Children, ChildSlot::Auxiliary];

struct OldEntry<'a> {
    node: &'a Node,
    parent: Option<(&'a str, ChildSlot)>,
}

/// Computes the ordered patch list that turns `old` into `new`.
///
/// Pure and repeatable; `diff(Some(a), a)` is always empty.
pub fn diff(old: Option<&Node>, new: &Node) -> Vec<Patch> {
    let Some(old) = old else {
        return vec![Patch::ReplaceTree {
            target_id: new.id.clone(),
            node: new.clone(),
        }];
    };

    if old.id != new.id || old.node_type != new.node_type {
        return vec![Patch::ReplaceTree {
            target_id: old.id.clone(),
            node: new.clone(),
        }];
    }

    let mut old_index = HashMap::new();
    index_old(old, None, &mut old_index);

    let mut survivors = HashSet::new();
    collect_survivors(new, &old_index, &mut survivors);

    let mut patches = Vec::new();
    emit_removals(old, &survivors, &mut patches);
    emit_updates(old, new, &old_index, &survivors, &mut patches);
    patches
}

/// Ids present in `old` that the patches for `new` take out of the tree.
/// Handler registrations keyed by these ids are stale after the commit.
pub fn departed_ids(old: &Node, new: &Node) -> Vec<String> {
    let mut remaining = HashSet::new();
    new.walk(&mut |node| {
        remaining.insert(node.id.as_str());
    });
    let mut departed = Vec::new();
    old.walk(&mut |node| {
        if !remaining.contains(node.id.as_str()) {
            departed.push(node.id.clone());
        }
    });
    departed
}

fn index_old<'a>(
    node: &'a Node,
    parent: Option<(&'a str, ChildSlot)>,
    index: &mut HashMap<&'a str, OldEntry<'a>>,
) {
    index.insert(node.id.as_str(), OldEntry { node, parent });
    for slot in SLOTS {
        for child in node.slot(slot) {
            index_old(child, Some((node.id.as_str(), slot)), index);
        }
    }
}

/// Marks the nodes of `new` that keep their identity. Called on a node
/// already known to survive.
fn collect_survivors<'a>(
    new: &'a Node,
    old_index: &HashMap<&str, OldEntry<'_>>,
    survivors: &mut HashSet<&'a str>,
) {
    survivors.insert(new.id.as_str());
    for slot in SLOTS {
        for child in new.slot(slot) {
            let keeps_identity = old_index.get(child.id.as_str()).is_some_and(|entry| {
                entry.node.node_type == child.node_type
                    && entry.parent == Some((new.id.as_str(), slot))
            });
            if keeps_identity {
                collect_survivors(child, old_index, survivors);
            }
        }
    }
}

/// Removes every old node that does not survive and whose parent does;
/// descendants leave the tree with their topmost removed ancestor.
fn emit_removals(old: &Node, survivors: &HashSet<&str>, patches: &mut Vec<Patch>) {
    for slot in SLOTS {
        for child in old.slot(slot) {
            if survivors.contains(child.id.as_str()) {
                emit_removals(child, survivors, patches);
            } else {
                patches.push(Patch::RemoveNode {
                    target_id: child.id.clone(),
                });
            }
        }
    }
}

fn emit_updates(
    old: &Node,
    new: &Node,
    old_index: &HashMap<&str, OldEntry<'_>>,
    survivors: &HashSet<&str>,
    patches: &mut Vec<Patch>,
) {
    if let Some(patch) = diff_props(&new.id, &old.props, &new.props) {
        patches.push(patch);
    }
    if !same_modifiers(&old.modifiers, &new.modifiers) {
        patches.push(Patch::UpdateModifiers {
            target_id: new.id.clone(),
            modifiers: new.modifiers.clone(),
        });
    }

    for slot in SLOTS {
        // Old list as it stands once the removals have been applied.
        let mut working: Vec<&str> = old
            .slot(slot)
            .iter()
            .map(|child| child.id.as_str())
            .filter(|id| survivors.contains(id))
            .collect();

        for (index, child) in new.slot(slot).iter().enumerate() {
            if survivors.contains(child.id.as_str()) {
                if working.get(index) != Some(&child.id.as_str()) {
                    working.retain(|id| *id != child.id);
                    working.insert(index, child.id.as_str());
                    patches.push(Patch::MoveNode {
                        target_id: child.id.clone(),
                        parent_id: new.id.clone(),
                        slot,
                        index,
                    });
                }
                if let Some(entry) = old_index.get(child.id.as_str()) {
                    emit_updates(entry.node, child, old_index, survivors, patches);
                }
            } else {
                working.insert(index, child.id.as_str());
                patches.push(Patch::InsertNode {
                    parent_id: new.id.clone(),
                    index,
                    slot,
                    node: child.clone(),
                });
            }
        }
    }
}

/// Modifiers apply as a set keyed by kind; list order carries no meaning.
fn same_modifiers(old: &[Modifier], new: &[Modifier]) -> bool {
    old.len() == new.len() && by_kind(old) == by_kind(new)
}

fn by_kind(modifiers: &[Modifier]) -> BTreeMap<ModifierKind, &Props> {
    modifiers.iter().map(|m| (m.kind, &m.args)).collect()
}

fn diff_props(id: &str, old: &Props, new: &Props) -> Option<Patch> {
    let changed: Props = new
        .iter()
        .filter(|(key, value)| old.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let removed: Vec<String> = old
        .keys()
        .filter(|key| !new.contains_key(*key))
        .cloned()
        .collect();

    if changed.is_empty() && removed.is_empty() {
        return None;
    }
    Some(Patch::UpdateProps {
        target_id: id.to_string(),
        props: changed,
        removed,
    })
}
