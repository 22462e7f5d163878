mod common;

use common::{canonical, random_tree, Rng};
use viewsync::props;
use viewsync::protocol::Patch;
use viewsync::reconcile::{departed_ids, diff};
use viewsync::tree::{ChildSlot, Node, TreeStore};

fn store_with(root: &Node) -> TreeStore {
    let mut store = TreeStore::new();
    store.set_root(root.clone()).expect("valid root");
    store
}

fn stack(children: Vec<Node>) -> Node {
    Node::new("root", "Stack").with_children(children)
}

fn text(id: &str, value: &str) -> Node {
    Node::new(id, "Text").with_prop("text", value)
}

#[test]
fn test_random_trees_converge() {
    for seed in 0..500 {
        let mut rng = Rng::new(seed);
        let old = random_tree(&mut rng, 24, 18);
        let new = random_tree(&mut rng, 24, 18);
        old.validate().expect("generated tree is valid");
        new.validate().expect("generated tree is valid");

        let patches = diff(Some(&old), &new);
        let mut store = store_with(&old);
        let (_, errors) = store.apply_batch(&patches);

        assert!(errors.is_empty(), "seed {seed}: {errors:?}");
        let snapshot = store.snapshot().expect("root");
        assert_eq!(canonical(&snapshot), canonical(&new), "seed {seed}");
        assert_eq!(store.len(), new.subtree_len(), "seed {seed}");
    }
}

#[test]
fn test_chained_revisions_converge() {
    let mut rng = Rng::new(0xC0FFEE);
    let mut current = random_tree(&mut rng, 30, 20);
    let mut store = store_with(&current);

    for step in 0..200 {
        let next = random_tree(&mut rng, 30, 20);
        let (_, errors) = store.apply_batch(&diff(Some(&current), &next));
        assert!(errors.is_empty(), "step {step}: {errors:?}");
        let snapshot = store.snapshot().expect("root");
        assert_eq!(canonical(&snapshot), canonical(&next), "step {step}");
        current = next;
    }
}

#[test]
fn test_diff_of_identical_trees_is_empty() {
    for seed in 0..200 {
        let mut rng = Rng::new(seed);
        let tree = random_tree(&mut rng, 20, 20);
        assert!(diff(Some(&tree), &tree).is_empty(), "seed {seed}");
    }
}

#[test]
fn test_departed_ids_leave_the_store() {
    for seed in 0..200 {
        let mut rng = Rng::new(seed);
        let old = random_tree(&mut rng, 16, 12);
        let new = random_tree(&mut rng, 16, 12);
        let mut store = store_with(&old);
        store.apply_batch(&diff(Some(&old), &new));

        for id in departed_ids(&old, &new) {
            assert!(!store.contains(&id), "seed {seed}: '{id}' still indexed");
        }
    }
}

#[test]
fn test_props_update_is_idempotent() {
    let old = stack(vec![text("t1", "0").with_prop("color", "red")]);
    let patch = Patch::UpdateProps {
        target_id: "t1".into(),
        props: props! { "text" => "1" },
        removed: vec!["color".into()],
    };

    let mut once = store_with(&old);
    once.apply_patch(&patch).expect("applies");
    let mut twice = store_with(&old);
    twice.apply_patch(&patch).expect("applies");
    twice.apply_patch(&patch).expect("applies again");

    assert_eq!(once.snapshot(), twice.snapshot());
    assert_eq!(once.snapshot(), Some(stack(vec![text("t1", "1")])));
}

#[test]
fn test_text_change_yields_one_props_patch() {
    let old = stack(vec![text("t1", "0")]);
    let new = stack(vec![text("t1", "1")]);

    assert_eq!(
        diff(Some(&old), &new),
        vec![Patch::UpdateProps {
            target_id: "t1".into(),
            props: props! { "text" => "1" },
            removed: Vec::new(),
        }]
    );
}

#[test]
fn test_swap_in_place_yields_remove_and_insert() {
    let old = stack(vec![text("t1", "0")]);
    let new = stack(vec![text("t2", "0")]);

    assert_eq!(
        diff(Some(&old), &new),
        vec![
            Patch::RemoveNode {
                target_id: "t1".into()
            },
            Patch::InsertNode {
                parent_id: "root".into(),
                index: 0,
                slot: ChildSlot::Children,
                node: text("t2", "0"),
            },
        ]
    );
}

#[test]
fn test_duplicate_id_is_rejected_before_transmission() {
    let tree = stack(vec![text("t1", "0"), text("t1", "1")]);
    assert!(tree.validate().is_err());
    assert!(TreeStore::new().set_root(tree).is_err());
}
