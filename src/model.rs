//! A reference model for [`AvlTree`], shared by the unit tests and the fuzz targets.

use std::{collections::BTreeSet, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(r))
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
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
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
        random in 0u32..1000,
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
    Get(ItemValue),
    Remove(ItemValue),
    First,
    PopFirst,
    Last,
    PopLast,
    LevelOrder,
}

impl Op {
    // Resolves index-based values against the keys currently in the tree, so that lookups and
    // removals hit existing keys as often as they miss.
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Get(item) => FinalOp::Get(get_value(sorted, item)),
            Op::Remove(item) => FinalOp::Remove(get_value(sorted, item)),
            Op::First => FinalOp::First,
            Op::PopFirst => FinalOp::PopFirst,
            Op::Last => FinalOp::Last,
            Op::PopLast => FinalOp::PopLast,
            Op::LevelOrder => FinalOp::LevelOrder,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Get(u32),
    Remove(u32),
    First,
    PopFirst,
    Last,
    PopLast,
    LevelOrder,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Get),
        value_strategy().prop_map(Op::Remove),
        Just(Op::First),
        Just(Op::PopFirst),
        Just(Op::Last),
        Just(Op::PopLast),
        Just(Op::LevelOrder),
    ]
}

/// Applies `ops` to both an [`AvlTree`] and a [`BTreeSet`], asserting that they agree after every
/// operation and that the tree's invariants hold throughout.
pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut sorted_values = Vec::with_capacity(ops.len());
    let mut btree = BTreeSet::new();
    let mut avl: AvlTree<TestNode> = AvlTree::new();

    fn insert_sorted(v: &mut Vec<u32>, value: u32) {
        if let Err(idx) = v.binary_search(&value) {
            v.insert(idx, value);
        }
    }

    fn remove_sorted(v: &mut Vec<u32>, value: u32) {
        if let Ok(idx) = v.binary_search(&value) {
            v.remove(idx);
        }
    }

    #[inline]
    #[allow(clippy::boxed_local)]
    fn node_key(node: Box<TestNode>) -> u32 {
        node.key
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(value) => {
                insert_sorted(&mut sorted_values, value);

                let from_btree = if btree.insert(value) {
                    None
                } else {
                    Some(value)
                };
                let from_avl = avl.insert(TestNode::new(value)).map(node_key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Get(value) => {
                let from_btree = btree.get(&value).copied();
                let from_avl = avl.get(&value).map(|node| node.key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(value) => {
                remove_sorted(&mut sorted_values, value);

                let from_btree = btree.remove(&value).then_some(value);
                let from_avl = avl.remove(&value).map(node_key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::First => {
                let from_btree = btree.first().copied();
                let from_avl = avl.first().map(|node| node.key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopFirst => {
                let from_btree = btree.pop_first();
                let from_avl = avl.pop_first().map(node_key);

                if let Some(value) = from_btree {
                    remove_sorted(&mut sorted_values, value);
                }

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Last => {
                let from_btree = btree.last().copied();
                let from_avl = avl.last().map(|node| node.key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopLast => {
                let from_btree = btree.pop_last();
                let from_avl = avl.pop_last().map(node_key);

                if let Some(value) = from_btree {
                    remove_sorted(&mut sorted_values, value);
                }

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::LevelOrder => {
                let mut from_avl: Vec<u32> = avl.level_order().map(|node| node.key).collect();
                assert_eq!(from_avl.len(), btree.len(), "FinalOp #{op_id}: {final_op:?}");

                // The root comes first; every key appears exactly once.
                assert_eq!(
                    from_avl.first(),
                    avl.root.map(|root| unsafe { &root.as_ref().key }),
                    "FinalOp #{op_id}: {final_op:?}"
                );
                from_avl.sort_unstable();
                assert!(
                    from_avl.iter().eq(btree.iter()),
                    "FinalOp #{op_id}: {final_op:?}"
                );
            }
        }

        avl.assert_invariants();
        assert_eq!(btree.len(), avl.len());
        assert!(btree.iter().eq(avl.iter().map(|node| &node.key)));
    }
}
