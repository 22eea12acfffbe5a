//! Rebalancing: heights, imbalance detection and rotations.

use core::ptr::NonNull;

use crate::{AvlTree, Dir, Link, Links, TreeNode};

/// The four ways a subtree can be out of balance, named by the path from the unbalanced node `z`
/// down through its taller child `y` to the grandchild `x`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// LL: `y` is the left child of `z` and `x` the left child of `y`. Fixed by a single right
    /// rotation lifting `y`.
    LeftLeft,
    /// RR: `y` is the right child of `z` and `x` the right child of `y`. Fixed by a single left
    /// rotation lifting `y`.
    RightRight,
    /// LR: `y` is the left child of `z` and `x` the right child of `y`. Fixed by a left rotation
    /// followed by a right rotation, both lifting `x`.
    LeftRight,
    /// RL: `y` is the right child of `z` and `x` the left child of `y`. Fixed by a right rotation
    /// followed by a left rotation, both lifting `x`.
    RightLeft,
}

impl Rotation {
    fn classify(y_dir: Dir, x_dir: Dir) -> Rotation {
        match (y_dir, x_dir) {
            (Dir::Left, Dir::Left) => Rotation::LeftLeft,
            (Dir::Right, Dir::Right) => Rotation::RightRight,
            (Dir::Left, Dir::Right) => Rotation::LeftRight,
            (Dir::Right, Dir::Left) => Rotation::RightLeft,
        }
    }
}

// An imbalance found by the scanner, along with the node the rotation lifts.
pub(crate) struct Imbalance<T: ?Sized> {
    pub(crate) rotation: Rotation,
    pub(crate) pivot: NonNull<T>,
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns the cached height of the pointed-to node, or 0 if there is no node.
    #[inline]
    pub(crate) unsafe fn height_of(&self, node: Link<T>) -> u8 {
        node.map(|n| unsafe { T::links(n).as_ref().height() })
            .unwrap_or(0)
    }

    // Recomputes the height of a subtree from scratch without consulting cached heights.
    pub(crate) unsafe fn subtree_height(&self, node: Link<T>) -> u8 {
        let Some(node) = node else {
            return 0;
        };

        unsafe {
            let left = self.subtree_height(T::links(node).as_ref().left());
            let right = self.subtree_height(T::links(node).as_ref().right());

            left.max(right) + 1
        }
    }

    // Recomputes the cached height of `node` from its children. Returns `true` if it changed.
    #[inline]
    unsafe fn update_height(&mut self, node: NonNull<T>) -> bool {
        unsafe {
            let left = self.height_of(T::links(node).as_ref().left());
            let right = self.height_of(T::links(node).as_ref().right());
            let height = left.max(right) + 1;

            let old = T::links(node).as_ref().height();
            T::links(node).as_mut().set_height(height);

            old != height
        }
    }

    #[inline]
    unsafe fn balance_factor(&self, node: NonNull<T>) -> i16 {
        unsafe {
            let left = self.height_of(T::links(node).as_ref().left());
            let right = self.height_of(T::links(node).as_ref().right());

            i16::from(left) - i16::from(right)
        }
    }

    // Classifies the imbalance at `z`, given the path `z -> y -> x`.
    unsafe fn classify(&self, x: NonNull<T>, y: NonNull<T>, z: NonNull<T>) -> Imbalance<T> {
        let rotation = unsafe { Rotation::classify(self.which_child(z, y), self.which_child(y, x)) };

        let pivot = match rotation {
            Rotation::LeftLeft | Rotation::RightRight => y,
            Rotation::LeftRight | Rotation::RightLeft => x,
        };

        Imbalance { rotation, pivot }
    }

    // Walks upward from the freshly attached leaf `node`, refreshing heights, and returns the
    // lowest imbalance on the path to the root.
    //
    // Returns `None` if the tree is balanced. Heights above the returned imbalance are left as they
    // were before the insertion; restoring balance there also restores their old heights.
    pub(crate) unsafe fn scan_inserted(&mut self, node: NonNull<T>) -> Option<Imbalance<T>> {
        unsafe {
            let mut x = node;
            let mut parent = T::links(x).as_ref().parent()?;

            // `parent` gained a child, so it may have grown. Nothing can be unbalanced until there
            // is a grandparent to inspect.
            if !self.update_height(parent) {
                return None;
            }

            let mut grandparent = T::links(parent).as_ref().parent()?;

            loop {
                if self.balance_factor(grandparent).abs() > 1 {
                    return Some(self.classify(x, parent, grandparent));
                }

                // Once a height stops changing, nothing above it can have changed either.
                if !self.update_height(grandparent) {
                    return None;
                }

                (x, parent) = (parent, grandparent);
                grandparent = T::links(parent).as_ref().parent()?;
            }
        }
    }

    // Performs a bottom-up rebalance of the tree after the insertion of the leaf `node`.
    //
    // A single insertion raises heights by at most one along one path, so at most one rotation is
    // needed.
    pub(crate) unsafe fn rebalance_inserted(&mut self, node: NonNull<T>) -> Option<Rotation> {
        unsafe {
            let Imbalance { rotation, pivot } = self.scan_inserted(node)?;
            self.rotate(rotation, pivot);

            debug_assert!(
                T::links(pivot)
                    .as_ref()
                    .parent()
                    .map(|p| !self.update_height_dry(p))
                    .unwrap_or(true),
                "rotation after insertion changed the subtree height"
            );

            Some(rotation)
        }
    }

    // Returns `true` if `update_height` would change the cached height of `node`.
    unsafe fn update_height_dry(&self, node: NonNull<T>) -> bool {
        unsafe {
            let left = self.height_of(T::links(node).as_ref().left());
            let right = self.height_of(T::links(node).as_ref().right());

            T::links(node).as_ref().height() != left.max(right) + 1
        }
    }

    // Walks upward from `start`, the lowest node whose subtree lost height, refreshing heights and
    // rotating at every node whose balance factor reached 2.
    //
    // A rotation after removal may shrink the rotated subtree, so the walk continues from the new
    // subtree root's parent until a height stops changing or the root is reached.
    pub(crate) unsafe fn rebalance_removed(&mut self, start: Link<T>) {
        let mut opt_cur = start;

        while let Some(cur) = opt_cur {
            unsafe {
                let changed = self.update_height(cur);

                let top = match self.balance_factor(cur) {
                    -1..=1 if !changed => break,
                    -1..=1 => cur,
                    balance => {
                        debug_assert_eq!(balance.abs(), 2);

                        let Imbalance { rotation, pivot } = self.pivot_for(cur);
                        self.rotate(rotation, pivot)
                    }
                };

                opt_cur = T::links(top).as_ref().parent();
            }
        }
    }

    // Chooses the rotation that rebalances `z`, whose balance factor is 2 or -2.
    //
    // `y` is the taller child of `z`, and `x` is the taller child of `y`. On a tie `x` is the outer
    // grandchild, which a single rotation can lift.
    unsafe fn pivot_for(&self, z: NonNull<T>) -> Imbalance<T> {
        unsafe {
            let dir = if self.balance_factor(z) > 0 {
                Dir::Left
            } else {
                Dir::Right
            };

            let y = T::links(z)
                .as_ref()
                .child(dir)
                .expect("taller side of an unbalanced node must be present");

            let outer = T::links(y).as_ref().child(dir);
            let inner = T::links(y).as_ref().child(!dir);

            let x = if self.height_of(inner) > self.height_of(outer) {
                inner
            } else {
                outer
            };
            let x = x.expect("taller child of an unbalanced node must have a child");

            self.classify(x, y, z)
        }
    }

    // Applies `rotation`, lifting `pivot`, and returns the new root of the rotated subtree.
    pub(crate) unsafe fn rotate(&mut self, rotation: Rotation, pivot: NonNull<T>) -> NonNull<T> {
        log::debug!("{rotation:?} rotation at {:?}", unsafe {
            pivot.as_ref().key()
        });

        unsafe {
            match rotation {
                Rotation::LeftLeft => self.rotate_right(pivot),
                Rotation::RightRight => self.rotate_left(pivot),
                Rotation::LeftRight => {
                    self.rotate_left(pivot);
                    self.rotate_right(pivot);
                }
                Rotation::RightLeft => {
                    self.rotate_right(pivot);
                    self.rotate_left(pivot);
                }
            }
        }

        pivot
    }

    // Lifts `up`, a left child, above its parent.
    unsafe fn rotate_right(&mut self, up: NonNull<T>) {
        unsafe {
            let down = T::links(up)
                .as_ref()
                .parent()
                .expect("rotated node must have a parent");

            debug_assert_eq!(self.which_child(down, up), Dir::Left);
            self.rotate_at(down, up);
        }
    }

    // Lifts `up`, a right child, above its parent.
    unsafe fn rotate_left(&mut self, up: NonNull<T>) {
        unsafe {
            let down = T::links(up)
                .as_ref()
                .parent()
                .expect("rotated node must have a parent");

            debug_assert_eq!(self.which_child(down, up), Dir::Right);
            self.rotate_at(down, up);
        }
    }

    // Performs a rotation, moving `up` up and its parent `down` down.
    //
    // The heights of `down` and `up` are refreshed; the heights of their ancestors are not.
    unsafe fn rotate_at(&mut self, down: NonNull<T>, up: NonNull<T>) {
        unsafe {
            // - `down` becomes the `dir` child of `up`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let dir = if T::links(down).as_ref().right() == Some(up) {
                Dir::Left
            } else {
                Dir::Right
            };

            let across = T::links(up).as_ref().child(dir);
            T::links(down).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            T::links(up).as_mut().set_child(dir, Some(down));
            let parent = T::links(down).as_mut().set_parent(Some(up));
            T::links(up).as_mut().set_parent(parent);

            match parent {
                Some(parent) => self.replace_child(parent, down, Some(up)),
                None => self.root = Some(up),
            }

            self.update_height(down);
            self.update_height(up);
        }
    }
}

#[cfg(test)]
mod tests {
    use cordyceps::Linked;

    use super::*;
    use crate::model::TestNode;

    fn tree_of(keys: &[u32]) -> AvlTree<TestNode> {
        let mut tree: AvlTree<TestNode> = AvlTree::new();

        for &key in keys {
            assert!(tree.insert(TestNode::new(key)).is_none());
        }

        tree.assert_invariants();
        tree
    }

    fn node(tree: &AvlTree<TestNode>, key: u32) -> NonNull<TestNode> {
        tree.get_raw(&key).expect("item not found")
    }

    fn level_keys(tree: &AvlTree<TestNode>) -> Vec<u32> {
        tree.level_order().map(|node| node.key).collect()
    }

    #[test]
    fn classify_paths() {
        assert_eq!(Rotation::classify(Dir::Left, Dir::Left), Rotation::LeftLeft);
        assert_eq!(
            Rotation::classify(Dir::Right, Dir::Right),
            Rotation::RightRight
        );
        assert_eq!(Rotation::classify(Dir::Left, Dir::Right), Rotation::LeftRight);
        assert_eq!(Rotation::classify(Dir::Right, Dir::Left), Rotation::RightLeft);
    }

    #[test]
    fn oracle_matches_cached_heights() {
        let tree = tree_of(&[8, 4, 12, 2, 6, 10, 14, 1, 3]);

        for key in [8, 4, 12, 2, 1] {
            let n = Some(node(&tree, key));
            unsafe { assert_eq!(tree.height_of(n), tree.subtree_height(n)) };
        }

        assert_eq!(unsafe { tree.subtree_height(None) }, 0);
        assert_eq!(tree.height(), 4);
    }

    #[test]
    fn scan_balanced_without_grandparent() {
        let mut tree = tree_of(&[2]);
        tree.insert(TestNode::new(1));

        let one = node(&tree, 1);
        assert!(unsafe { tree.scan_inserted(one) }.is_none());
    }

    #[test]
    fn single_rotations_relink_root() {
        // 3 -> 2 -> 1 leans left; lifting 2 makes it the root.
        let mut tree: AvlTree<TestNode> = AvlTree::new();
        assert_eq!(tree.insert_rebalanced(TestNode::new(3)).ok(), Some(None));
        assert_eq!(tree.insert_rebalanced(TestNode::new(2)).ok(), Some(None));
        assert_eq!(
            tree.insert_rebalanced(TestNode::new(1)).ok(),
            Some(Some(Rotation::LeftLeft))
        );
        tree.assert_invariants();
        assert_eq!(level_keys(&tree), [2, 1, 3]);

        let mut tree: AvlTree<TestNode> = AvlTree::new();
        tree.insert(TestNode::new(1));
        tree.insert(TestNode::new(2));
        assert_eq!(
            tree.insert_rebalanced(TestNode::new(3)).ok(),
            Some(Some(Rotation::RightRight))
        );
        tree.assert_invariants();
        assert_eq!(level_keys(&tree), [2, 1, 3]);
    }

    #[test]
    fn double_rotations_relink_root() {
        let mut tree: AvlTree<TestNode> = AvlTree::new();
        tree.insert(TestNode::new(3));
        tree.insert(TestNode::new(1));
        assert_eq!(
            tree.insert_rebalanced(TestNode::new(2)).ok(),
            Some(Some(Rotation::LeftRight))
        );
        tree.assert_invariants();
        assert_eq!(level_keys(&tree), [2, 1, 3]);

        let mut tree: AvlTree<TestNode> = AvlTree::new();
        tree.insert(TestNode::new(1));
        tree.insert(TestNode::new(3));
        assert_eq!(
            tree.insert_rebalanced(TestNode::new(2)).ok(),
            Some(Some(Rotation::RightLeft))
        );
        tree.assert_invariants();
        assert_eq!(level_keys(&tree), [2, 1, 3]);
    }

    #[test]
    fn rotation_below_root_relinks_grandparent() {
        // 5(2(1, 4), 8): inserting 3 unbalances 2 via 2 -> 4 -> 3.
        let mut tree = tree_of(&[5, 2, 8, 1, 4, 9]);
        assert_eq!(
            tree.insert_rebalanced(TestNode::new(3)).ok(),
            Some(None),
            "5 is still within balance"
        );

        let mut tree = tree_of(&[5, 2, 8, 4]);
        assert_eq!(
            tree.insert_rebalanced(TestNode::new(3)).ok(),
            Some(Some(Rotation::RightLeft))
        );
        tree.assert_invariants();
        assert_eq!(level_keys(&tree), [5, 3, 8, 2, 4]);

        let three = node(&tree, 3);
        let five = node(&tree, 5);
        assert_eq!(unsafe { TestNode::links(three).as_ref().parent() }, Some(five));
    }

    #[test_log::test]
    fn removal_rotates_at_several_levels() {
        // Both 11 and the root lean left, so removing 12 unbalances 11 first and then the root.
        let mut tree = tree_of(&[8, 5, 11, 3, 7, 10, 12, 2, 4, 6, 9, 1]);
        assert_eq!(tree.height(), 5);

        assert!(tree.remove(&12).is_some());
        tree.assert_invariants();
        assert_eq!(tree.height(), 4);
        assert_eq!(
            tree.iter().map(|node| node.key).collect::<Vec<_>>(),
            [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]
        );
    }

    #[test]
    fn removal_prefers_single_rotation_on_tie() {
        let mut tree = tree_of(&[20, 10, 30, 5, 15]);
        assert!(tree.remove(&30).is_some());
        tree.assert_invariants();

        // 10's children 5 and 15 have equal height, so a single right rotation lifts 10.
        assert_eq!(level_keys(&tree), [10, 5, 20, 15]);
    }
}
