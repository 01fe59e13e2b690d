//! Reference-model harness comparing [`AvlTree`] against the standard library collections.
//!
//! Shared by the property tests and the fuzz targets.

extern crate std;

use std::{collections::BTreeSet, ops::Bound, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlTree, Links, NotFound, TreeNode};

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
    Successor(ItemValue),
    Predecessor(ItemValue),
    First,
    PopFirst,
    Last,
    PopLast,
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        // `Index` picks an existing value when there is one, so that lookups and removals hit.
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
            Op::Successor(item) => FinalOp::Successor(get_value(sorted, item)),
            Op::Predecessor(item) => FinalOp::Predecessor(get_value(sorted, item)),
            Op::First => FinalOp::First,
            Op::PopFirst => FinalOp::PopFirst,
            Op::Last => FinalOp::Last,
            Op::PopLast => FinalOp::PopLast,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Get(u32),
    Remove(u32),
    Successor(u32),
    Predecessor(u32),
    First,
    PopFirst,
    Last,
    PopLast,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Get),
        value_strategy().prop_map(Op::Remove),
        value_strategy().prop_map(Op::Successor),
        value_strategy().prop_map(Op::Predecessor),
        Just(Op::First),
        Just(Op::PopFirst),
        Just(Op::Last),
        Just(Op::PopLast),
    ]
}

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

    #[inline]
    fn ref_key(node: &TestNode) -> &u32 {
        &node.key
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(value) => {
                insert_sorted(&mut sorted_values, value);

                let from_btree = btree.insert(value);
                let height_before = avl.height();
                let from_avl = avl.insert(TestNode::new(value));

                assert_eq!(from_btree, from_avl.is_ok(), "FinalOp #{op_id}: {op:?}");

                // A rejected duplicate hands back the very node and leaves the shape alone.
                if let Err(dup) = from_avl {
                    assert_eq!(node_key(dup.0), value, "FinalOp #{op_id}: {op:?}");
                    assert_eq!(avl.height(), height_before, "FinalOp #{op_id}: {op:?}");
                }
            }

            FinalOp::Get(value) => {
                let from_btree = btree.get(&value);
                let from_avl = avl.get(&value).map(|node| ref_key(node.get_ref()));

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
                assert_eq!(btree.contains(&value), avl.contains(&value));
            }

            FinalOp::Remove(value) => {
                remove_sorted(&mut sorted_values, value);

                let from_btree = btree.remove(&value).then_some(value).ok_or(NotFound);
                let from_avl = avl.remove(&value).map(node_key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::Successor(value) => {
                let from_btree = btree
                    .contains(&value)
                    .then(|| {
                        btree
                            .range((Bound::Excluded(value), Bound::Unbounded))
                            .next()
                    })
                    .ok_or(NotFound);
                let from_avl = avl
                    .successor(&value)
                    .map(|next| next.map(|node| ref_key(node.get_ref())));

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::Predecessor(value) => {
                let from_btree = btree
                    .contains(&value)
                    .then(|| btree.range(..value).next_back())
                    .ok_or(NotFound);
                let from_avl = avl
                    .predecessor(&value)
                    .map(|prev| prev.map(|node| ref_key(node.get_ref())));

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::First => {
                let from_btree = btree.first();
                let from_avl = avl.first().map(|node| ref_key(node.get_ref()));

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::PopFirst => {
                let from_btree = btree.pop_first();
                let from_avl = avl.pop_first().map(node_key);

                if let Some(value) = from_btree {
                    remove_sorted(&mut sorted_values, value);
                }

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::Last => {
                let from_btree = btree.last();
                let from_avl = avl.last().map(|node| ref_key(node.get_ref()));

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::PopLast => {
                let from_btree = btree.pop_last();
                let from_avl = avl.pop_last().map(node_key);

                if let Some(value) = from_btree {
                    remove_sorted(&mut sorted_values, value);
                }

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
            }
        }

        avl.assert_invariants();
        assert_eq!(btree.len(), avl.len());
        assert!(btree.iter().zip(avl.iter()).all(|(&a, b)| a == b.key));
    }
}

/// Which way a cursor operation moves.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Toward {
    Larger,
    Smaller,
}

// The current element is compared after every operation, so there is no `Get`.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum CursorOp {
    Step(Toward),
    Peek(Toward),
    Remove(Toward),
}

pub fn cursor_op_strategy() -> impl Strategy<Value = CursorOp> {
    let toward = proptest::prop_oneof![Just(Toward::Larger), Just(Toward::Smaller)];

    (0u8..3, toward).prop_map(|(kind, toward)| match kind {
        0 => CursorOp::Step(toward),
        1 => CursorOp::Peek(toward),
        _ => CursorOp::Remove(toward),
    })
}

#[derive(Clone, Debug, Arbitrary)]
pub struct CursorEquivalenceInput {
    pub values: Vec<u32>,
    pub ops: Vec<CursorOp>,
}

// Where a cursor at `at` lands after one step, with `None` standing for the empty slot.
fn model_step(set: &BTreeSet<u32>, at: Option<u32>, toward: Toward) -> Option<u32> {
    match (at, toward) {
        (Some(key), Toward::Larger) => set
            .range((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .copied(),
        (Some(key), Toward::Smaller) => set.range(..key).next_back().copied(),
        (None, Toward::Larger) => set.first().copied(),
        (None, Toward::Smaller) => set.last().copied(),
    }
}

pub fn run_cursor_equivalence(values: Vec<u32>, ops: Vec<CursorOp>) {
    let mut set = BTreeSet::new();
    let mut avl: AvlTree<TestNode> = AvlTree::new();

    for value in values {
        assert_eq!(set.insert(value), avl.insert(TestNode::new(value)).is_ok());
    }

    let mut at = set.first().copied();
    let mut cursor = avl.cursor_first_mut();

    for (op_id, op) in ops.into_iter().enumerate() {
        assert_eq!(
            cursor.get().map(|node| node.key),
            at,
            "CursorOp #{op_id}: {op:?}"
        );

        match op {
            CursorOp::Step(toward) => {
                match toward {
                    Toward::Larger => cursor.move_next(),
                    Toward::Smaller => cursor.move_prev(),
                }
                at = model_step(&set, at, toward);
            }

            CursorOp::Peek(toward) => {
                let view = cursor.as_cursor();
                let peeked = match toward {
                    Toward::Larger => view.peek_next(),
                    Toward::Smaller => view.peek_prev(),
                };

                assert_eq!(
                    peeked.map(|node| node.key),
                    model_step(&set, at, toward),
                    "CursorOp #{op_id}: {op:?}"
                );
            }

            CursorOp::Remove(toward) => {
                let removed = match toward {
                    Toward::Larger => cursor.remove_current(),
                    Toward::Smaller => cursor.remove_current_and_move_prev(),
                };

                // Removing from the empty slot is a no-op.
                let expected = at;
                if let Some(key) = expected {
                    at = model_step(&set, at, toward);
                    set.remove(&key);
                }

                assert_eq!(
                    removed.map(|node| node.key),
                    expected,
                    "CursorOp #{op_id}: {op:?}"
                );
            }
        }
    }

    assert_eq!(cursor.get().map(|node| node.key), at);
    drop(cursor);

    avl.assert_invariants();
    assert!(set.iter().eq(avl.iter().map(TestNode::key)));
}
