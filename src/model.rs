extern crate std;

use std::{collections::BTreeSet, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{BalancedTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: i32,
}

impl TestNode {
    pub fn new(key: i32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = i32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

/// A key picked either by position among the keys already present or at random.
///
/// Picking by position makes duplicate inserts and successful removals common.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(i32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in -500i32..500,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Contains(ItemValue),
    Remove(ItemValue),
    Minimum,
    PopFirst,
    Maximum,
    PopLast,
}

impl Op {
    fn finalize(self, sorted: &[i32]) -> FinalOp {
        fn get_value(v: &[i32], i: ItemValue) -> i32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        i32::try_from(idx).unwrap_or(i32::MAX)
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Contains(item) => FinalOp::Contains(get_value(sorted, item)),
            Op::Remove(item) => FinalOp::Remove(get_value(sorted, item)),
            Op::Minimum => FinalOp::Minimum,
            Op::PopFirst => FinalOp::PopFirst,
            Op::Maximum => FinalOp::Maximum,
            Op::PopLast => FinalOp::PopLast,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(i32),
    Contains(i32),
    Remove(i32),
    Minimum,
    PopFirst,
    Maximum,
    PopLast,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Contains),
        value_strategy().prop_map(Op::Remove),
        Just(Op::Minimum),
        Just(Op::PopFirst),
        Just(Op::Maximum),
        Just(Op::PopLast),
    ]
}

/// Applies `ops` to a [`BalancedTree`] and a [`BTreeSet`], asserting after every step that both
/// agree and that the tree's invariants hold.
pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut sorted_values = Vec::with_capacity(ops.len());
    let mut btree = BTreeSet::new();
    let mut tree = BalancedTree::new();

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(value) => {
                let from_btree = btree.insert(value);
                let from_tree = tree.insert(value);

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Contains(value) => {
                let from_btree = btree.contains(&value);
                let from_tree = tree.contains(value);

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(value) => {
                let from_btree = btree.remove(&value);
                let from_tree = tree.remove(value);

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Minimum => {
                let from_btree = btree.first().copied();
                let from_tree = tree.minimum();

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopFirst => {
                let from_btree = btree.pop_first();
                let from_tree = tree.pop_first();

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Maximum => {
                let from_btree = btree.last().copied();
                let from_tree = tree.maximum();

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopLast => {
                let from_btree = btree.pop_last();
                let from_tree = tree.pop_last();

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }
        }

        sorted_values.clear();
        sorted_values.extend(btree.iter().copied());

        tree.assert_invariants();
        assert!(tree.parent_links_consistent());
        assert_eq!(btree.len(), tree.len());
        assert!(btree.iter().copied().eq(tree.iter()));
    }
}
