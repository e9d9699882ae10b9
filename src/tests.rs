extern crate std;

use std::{ops::Range, prelude::v1::*};

use cordyceps::Linked;
use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn insert_find_all(keys: &[i32]) {
    let mut tree: SkewTree<TestNode> = SkewTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

// Visits every permutation of `keys` in lexicographic order of positions.
fn for_each_permutation(keys: &[i32], f: &mut dyn FnMut(&[i32])) {
    fn go(prefix: &mut Vec<i32>, rest: &mut Vec<i32>, f: &mut dyn FnMut(&[i32])) {
        if rest.is_empty() {
            f(prefix);
            return;
        }

        for i in 0..rest.len() {
            let key = rest.remove(i);
            prefix.push(key);
            go(prefix, rest, f);
            prefix.pop();
            rest.insert(i, key);
        }
    }

    go(&mut Vec::new(), &mut keys.to_vec(), f);
}

#[test]
fn six_elems_find() {
    for_each_permutation(&[0, 1, 2, 3, 4, 5], &mut |keys| insert_find_all(keys));
}

fn insert_remove_all(keys: &[i32]) {
    let mut tree: SkewTree<TestNode> = SkewTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.remove(key).expect("item not found");
        assert_eq!(node.key, *key);
        assert!(!tree.contains_key(key));
        tree.assert_invariants();
    }

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        tree.remove(key).expect("item not found");
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_six() {
    for_each_permutation(&[0, 1, 2, 3, 4, 5], &mut |keys| insert_remove_all(keys));
}

#[test]
fn ascending_and_descending_runs() {
    let ascending: Vec<i32> = (0..200).collect();
    let descending: Vec<i32> = (0..200).rev().collect();

    insert_remove_all(&ascending);
    insert_remove_all(&descending);
}

// Structural helpers ======================================================

fn key_of(node: Link<TestNode>) -> Option<i32> {
    node.map(|n| unsafe { n.as_ref().key })
}

fn root_key(tree: &SkewTree<TestNode>) -> Option<i32> {
    key_of(tree.root)
}

fn kids(tree: &SkewTree<TestNode>, key: i32) -> (Option<i32>, Option<i32>) {
    let node = tree.get_raw(&key).expect("item not found");
    unsafe {
        let links = tree.links(node);
        (key_of(links.left()), key_of(links.right()))
    }
}

fn level(tree: &SkewTree<TestNode>, key: i32) -> i32 {
    let node = tree.get_raw(&key).expect("item not found");
    unsafe { tree.links(node).level() }
}

fn skew(tree: &SkewTree<TestNode>, key: i32) -> i32 {
    let node = tree.get_raw(&key).expect("item not found");
    unsafe { tree.skew(node) }
}

fn node(tree: &SkewTree<TestNode>, key: i32) -> NonNull<TestNode> {
    tree.get_raw(&key).expect("item not found")
}

// Builds a tree by plain BST insertion: levels are maintained, but nothing is rotated.
fn unbalanced(keys: &[i32]) -> SkewTree<TestNode> {
    let mut tree: SkewTree<TestNode> = SkewTree::new();

    for &key in keys {
        let ptr = TestNode::into_ptr(TestNode::new(key));

        let Some(mut parent) = tree.root else {
            tree.root = Some(ptr);
            tree.len += 1;
            continue;
        };

        unsafe {
            loop {
                let dir = if key < parent.as_ref().key {
                    Dir::Left
                } else {
                    Dir::Right
                };

                match tree.links(parent).child(dir) {
                    Some(child) => parent = child,
                    None => {
                        tree.links_mut(parent).set_child(dir, Some(ptr));
                        tree.links_mut(ptr).set_parent(Some(parent));
                        break;
                    }
                }
            }

            let mut opt_cur = Some(parent);
            while let Some(cur) = opt_cur {
                tree.update_level(cur);
                opt_cur = tree.links(cur).parent();
            }
        }

        tree.len += 1;
    }

    tree.assert_invariants();
    tree
}

// Levels and skew =========================================================

#[test]
fn levels_and_skew_of_each_shape() {
    // 10 has both children, 5 only a left child, 20 only a right child.
    let tree = unbalanced(&[10, 5, 20, 3, 30, 40]);

    assert_eq!(level(&tree, 3), 0);
    assert_eq!(skew(&tree, 3), 0);

    assert_eq!(level(&tree, 5), 1);
    assert_eq!(skew(&tree, 5), -1);

    assert_eq!(level(&tree, 30), 1);
    assert_eq!(level(&tree, 20), 2);
    assert_eq!(skew(&tree, 20), 2);

    assert_eq!(level(&tree, 10), 3);
    assert_eq!(skew(&tree, 10), (2 + 1) - (1 + 1));
    assert_eq!(tree.root_skew(), Some(1));
}

// Rotations ===============================================================

#[test]
fn rotate_left_at_root_moves_inner_subtree() {
    let mut tree = unbalanced(&[10, 5, 20, 15, 25]);

    tree.rotate_left(node(&tree, 10), node(&tree, 20));
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(20));
    assert_eq!(kids(&tree, 20), (Some(10), Some(25)));
    assert_eq!(kids(&tree, 10), (Some(5), Some(15)));
    assert_eq!(level(&tree, 10), 1);
    assert_eq!(level(&tree, 20), 2);

    tree.rotate_right(node(&tree, 20), node(&tree, 10));
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(10));
    assert_eq!(kids(&tree, 10), (Some(5), Some(20)));
    assert_eq!(kids(&tree, 20), (Some(15), Some(25)));
}

#[test]
fn rotate_below_root_relinks_parent() {
    let mut tree = unbalanced(&[50, 10, 60, 5, 20, 15, 25]);

    tree.rotate_left(node(&tree, 10), node(&tree, 20));
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(50));
    assert_eq!(kids(&tree, 50), (Some(20), Some(60)));
    assert_eq!(kids(&tree, 20), (Some(10), Some(25)));
    assert_eq!(kids(&tree, 10), (Some(5), Some(15)));
    assert_eq!(level(&tree, 50), 3);
}

// Rebalancing table =======================================================

#[test]
fn right_chain_rotates_left() {
    let mut tree = unbalanced(&[1, 2, 3, 4]);
    assert_eq!(skew(&tree, 1), 3);

    tree.rebalance(node(&tree, 1));
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(2));
    assert_eq!(kids(&tree, 2), (Some(1), Some(3)));
    assert_eq!(kids(&tree, 3), (None, Some(4)));
}

#[test]
fn left_chain_rotates_right() {
    let mut tree = unbalanced(&[4, 3, 2, 1]);
    assert_eq!(skew(&tree, 4), -3);

    tree.rebalance(node(&tree, 4));
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(3));
    assert_eq!(kids(&tree, 3), (Some(2), Some(4)));
    assert_eq!(kids(&tree, 2), (Some(1), None));
}

#[test]
fn skew_of_two_is_tolerated() {
    let mut tree = unbalanced(&[1, 2, 3]);
    assert_eq!(skew(&tree, 1), 2);

    tree.rebalance(node(&tree, 1));
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(1));
}

#[test]
fn right_heavy_with_left_leaning_left_child_rotates_twice() {
    // 10's left child 5 leans left (skew -2); its right subtree 30 has inner child 20.
    let mut tree = unbalanced(&[10, 5, 3, 1, 30, 20, 31, 32, 33, 34, 35]);
    assert_eq!(skew(&tree, 10), 3);
    assert_eq!(skew(&tree, 5), -2);

    tree.rebalance(node(&tree, 10));
    tree.assert_invariants();

    // 20 is rotated up twice. 10 is then left-heavy with no right child, so the second half of the
    // table rotates it right as well.
    assert_eq!(root_key(&tree), Some(20));
    assert_eq!(kids(&tree, 20), (Some(5), Some(30)));
    assert_eq!(kids(&tree, 5), (Some(3), Some(10)));
    assert_eq!(kids(&tree, 10), (None, None));
    assert_eq!(kids(&tree, 30), (None, Some(31)));
    assert_eq!(level(&tree, 20), 6);
}

#[test]
fn left_heavy_with_right_leaning_right_child_rotates_twice() {
    let mut tree = unbalanced(&[50, 60, 65, 70, 20, 30, 19, 18, 17, 16, 15]);
    assert_eq!(skew(&tree, 50), -3);
    assert_eq!(skew(&tree, 60), 2);

    tree.rebalance(node(&tree, 50));
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(30));
    assert_eq!(kids(&tree, 30), (Some(20), Some(50)));
    assert_eq!(kids(&tree, 20), (Some(19), None));
    assert_eq!(kids(&tree, 50), (None, Some(60)));
    // The right half of the table was already evaluated, so 50 stays right-heavy.
    assert_eq!(skew(&tree, 50), 3);
}

#[test]
fn right_heavy_with_balanced_left_child_is_left_alone() {
    let mut tree = unbalanced(&[10, 5, 20, 30, 40, 50]);
    assert_eq!(skew(&tree, 10), 3);
    assert_eq!(skew(&tree, 5), 0);

    tree.rebalance(node(&tree, 10));
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(10));
    assert_eq!(kids(&tree, 10), (Some(5), Some(20)));
    assert_eq!(skew(&tree, 10), 3);
}

#[test]
fn double_rotation_without_inner_grandchild_is_skipped() {
    // 10 is right-heavy, its left child leans left, but 30 has no left child to rotate up.
    let mut tree = unbalanced(&[10, 5, 3, 1, 30, 31, 32, 33, 34, 35]);
    assert_eq!(skew(&tree, 10), 3);

    tree.rebalance(node(&tree, 10));
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(10));
    assert_eq!(kids(&tree, 10), (Some(5), Some(30)));
}

// Scenarios ===============================================================

#[test]
fn ascending_inserts_rotate_on_fourth_key() {
    let mut tree: SkewTree<TestNode> = SkewTree::new();

    for key in [5, 7, 9] {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.assert_invariants();
    }

    // A root skew of exactly 2 is inside the window.
    assert_eq!(tree.root_skew(), Some(2));
    assert_eq!(root_key(&tree), Some(5));
    assert_eq!(kids(&tree, 5), (None, Some(7)));
    assert_eq!(kids(&tree, 7), (None, Some(9)));

    assert!(tree.insert(TestNode::new(11)).is_none());
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(7));
    assert_eq!(kids(&tree, 7), (Some(5), Some(9)));
    assert_eq!(kids(&tree, 9), (None, Some(11)));
    assert_eq!(tree.root_skew(), Some(1));
}

#[test]
fn build_then_remove_sequence() {
    let mut tree: SkewTree<TestNode> = SkewTree::new();

    for key in [5, 7, 9, 11, 4, 3, 2, 1] {
        assert!(tree.insert(TestNode::new(key)).is_none());
        assert!(tree.parent_links_consistent());
        tree.assert_invariants();
    }

    assert_eq!(root_key(&tree), Some(7));
    assert_eq!(kids(&tree, 7), (Some(4), Some(9)));
    assert_eq!(kids(&tree, 4), (Some(3), Some(5)));

    for key in [5, 4, 11] {
        assert!(tree.remove(&key).is_some());
        assert!(tree.parent_links_consistent());
        tree.assert_invariants();
    }

    let keys: Vec<i32> = tree.iter().map(|node| node.key).collect();
    assert_eq!(keys, [1, 2, 3, 7, 9]);

    assert_eq!(root_key(&tree), Some(7));
    assert_eq!(kids(&tree, 7), (Some(3), Some(9)));
    assert_eq!(kids(&tree, 3), (Some(2), None));
    assert_eq!(kids(&tree, 2), (Some(1), None));
    assert_eq!(tree.root_skew(), Some(-2));
}

#[test]
fn remove_with_two_children_promotes_successor() {
    let mut tree: SkewTree<TestNode> = SkewTree::new();
    for key in [4, 2, 6, 1, 3, 5, 7] {
        tree.insert(TestNode::new(key));
    }

    // Successor 5 sits below 6.
    assert_eq!(tree.remove(&4).map(|n| n.key), Some(4));
    tree.assert_invariants();
    assert_eq!(root_key(&tree), Some(5));
    assert_eq!(kids(&tree, 5), (Some(2), Some(6)));
    assert_eq!(kids(&tree, 6), (None, Some(7)));

    // Successor 3 is the right child itself.
    assert_eq!(tree.remove(&2).map(|n| n.key), Some(2));
    tree.assert_invariants();
    assert_eq!(kids(&tree, 5), (Some(3), Some(6)));
    assert_eq!(kids(&tree, 3), (Some(1), None));
}

#[test]
fn rejected_operations_leave_tree_untouched() {
    let mut tree: SkewTree<TestNode> = SkewTree::new();
    for key in [10, 5, 20, 30, 40, 50] {
        tree.insert(TestNode::new(key));
    }

    let mut before = String::new();
    tree.print_levels(&mut before).unwrap();

    let rejected = tree.insert(TestNode::new(30)).expect("duplicate accepted");
    assert_eq!(rejected.key, 30);
    assert!(tree.remove(&35).is_none());

    let mut after = String::new();
    tree.print_levels(&mut after).unwrap();
    assert_eq!(before, after);
    assert_eq!(tree.len(), 6);
    tree.assert_invariants();
}

#[test]
fn extremes() {
    let mut tree: SkewTree<TestNode> = SkewTree::new();
    assert!(tree.first().is_none());
    assert!(tree.last().is_none());
    assert!(tree.pop_first().is_none());

    for key in [8, 3, 12, -4, 9] {
        tree.insert(TestNode::new(key));
    }

    assert_eq!(tree.first().map(|n| n.key), Some(-4));
    assert_eq!(tree.last().map(|n| n.key), Some(12));

    assert_eq!(tree.pop_first().map(|n| n.key), Some(-4));
    assert_eq!(tree.pop_last().map(|n| n.key), Some(12));
    tree.assert_invariants();
    assert_eq!(tree.len(), 3);
}

#[test]
fn clear_empties_tree() {
    let mut tree: SkewTree<TestNode> = SkewTree::new();
    for key in 0..50 {
        tree.insert(TestNode::new((key * 37) % 101));
    }

    tree.clear();
    tree.assert_invariants();
    assert!(tree.is_empty());
    assert!(tree.iter().next().is_none());

    tree.insert(TestNode::new(1));
    assert_eq!(tree.len(), 1);
}

#[test]
fn iteration_is_sorted() {
    let mut tree: SkewTree<TestNode> = SkewTree::new();
    for key in [15, 3, 99, -7, 42, 8, 16, 0] {
        tree.insert(TestNode::new(key));
    }

    let iter = tree.iter();
    assert_eq!(iter.len(), 8);

    let keys: Vec<i32> = iter.map(|node| node.key).collect();
    assert_eq!(keys, [-7, 0, 3, 8, 15, 16, 42, 99]);

    let from_into_iter: Vec<i32> = (&tree).into_iter().map(|node| node.key).collect();
    assert_eq!(keys, from_into_iter);
}

// Debug output ============================================================

#[test]
fn draw_tree_indents_pre_order() {
    let mut tree: SkewTree<TestNode> = SkewTree::new();
    for key in [5, 7, 9, 11] {
        tree.insert(TestNode::new(key));
    }

    let mut out = String::new();
    tree.draw_tree(&mut out).unwrap();

    assert_eq!(out, "7\n  |5\n  |9\n  |  |11\n");
}

#[test]
fn print_levels_is_sideways() {
    let mut tree: SkewTree<TestNode> = SkewTree::new();
    for key in [5, 7, 9, 11] {
        tree.insert(TestNode::new(key));
    }

    let mut out = String::new();
    tree.print_levels(&mut out).unwrap();

    assert_eq!(out, "      11 , 0\n   9 , 1\n7 , 2\n   5 , 0\n");
}

#[test]
fn dotgraph_labels_levels() {
    let mut empty = String::new();
    SkewTree::<TestNode>::new()
        .dotgraph("empty", &mut empty)
        .unwrap();
    assert_eq!(empty, "digraph \"graph-empty\" {}");

    let mut tree: SkewTree<TestNode> = SkewTree::new();
    for key in [2, 1, 3] {
        tree.insert(TestNode::new(key));
    }

    let mut out = String::new();
    tree.dotgraph("t", &mut out).unwrap();

    assert!(out.starts_with("digraph \"graph-t\" {"));
    assert!(out.contains("\"grapht-2\" [label=\"2:1\"]"));
    assert!(out.contains("\"grapht-2\" -> \"grapht-1\";"));
    assert!(out.contains("\"grapht-2\" -> \"grapht-3\";"));
    assert!(out.contains("\"grapht-1\" [label=\"1:0\"]"));
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }
}
