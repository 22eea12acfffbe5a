//! An intrusive AVL tree.
//!
//! [`AvlTree`] stores elements that embed their own [`Links`], so the tree never allocates.
//! Elements enter the tree as a [`Linked::Handle`] and leave it the same way. [`AvlSet`] is an
//! owning set of `i32` keys built on top of it.

// Conventions used in comments:
// - The height of a missing node is 0 and the height of a leaf is 1.
// - The balance factor of a node `x` is `h(left(x)) - h(right(x))`.
// - When rebalancing, `z` is the unbalanced node, `y` its child on the taller side and `x` the
//   child of `y` on the path being repaired.
//
// The invariants of an AVL tree are:
// 1. Every balance factor is -1, 0 or 1.
// 2. Keys in a left subtree are less than the node's key, keys in a right subtree are greater.
//
// Heights are cached in each node's links and must equal the recomputed height of the subtree
// once an operation returns.

use core::{
    cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not, pin::Pin,
    ptr::NonNull,
};
use std::borrow::Borrow;

use cordyceps::Linked;

mod balance;
mod debug;
mod error;
mod iter;
#[cfg(any(test, feature = "model"))]
pub mod model;
mod queue;
mod set;


pub use balance::Rotation;
pub use error::Error;
pub use iter::{Iter, LevelOrder};
pub use queue::WorkQueue;
pub use set::AvlSet;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// Every node keeps the heights of its two subtrees within one of each other. Insertion repairs
/// the tree with at most one single or double rotation; removal may rotate at every level on the
/// way back to the root.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    height: u8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the height of the tree. An empty tree has height 0.
    pub fn height(&self) -> usize {
        unsafe { self.height_of(self.root).into() }
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0, "empty tree has a nonzero length");
            return;
        };

        unsafe {
            assert_eq!(
                T::links(root).as_ref().parent(),
                None,
                "root has a parent pointer"
            );

            let (height, count) = self.assert_invariants_at(root, None, None);
            assert_eq!(count, self.len, "length does not match the number of nodes");
            assert_eq!(height, self.subtree_height(self.root));
        }
    }

    // Checks the subtree rooted at `node` and returns its height and node count.
    unsafe fn assert_invariants_at(
        &self,
        node: NonNull<T>,
        lower: Option<&T::Key>,
        upper: Option<&T::Key>,
    ) -> (u8, usize) {
        unsafe {
            let key = node.as_ref().key();

            if let Some(lower) = lower {
                assert!(lower < key, "{key:?} is in the right subtree of {lower:?}");
            }

            if let Some(upper) = upper {
                assert!(key < upper, "{key:?} is in the left subtree of {upper:?}");
            }

            let mut heights = [0; 2];
            let mut count = 1;

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = T::links(node).as_ref().child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    let (lower, upper) = match dir {
                        Dir::Left => (lower, Some(key)),
                        Dir::Right => (Some(key), upper),
                    };

                    let (height, child_count) = self.assert_invariants_at(child, lower, upper);
                    heights[dir as usize] = height;
                    count += child_count;
                }
            }

            let [left, right] = heights;
            assert!(
                left.abs_diff(right) <= 1,
                "{key:?} is unbalanced: left height {left}, right height {right}"
            );

            let height = left.max(right) + 1;
            assert_eq!(
                T::links(node).as_ref().height(),
                height,
                "stale cached height at {key:?}"
            );

            (height, count)
        }
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns `true` if the tree contains an element with the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let root = self.root?;

        unsafe {
            let (first, _) = self.min_in_subtree(root);
            Some(Pin::new_unchecked(first.as_ref()))
        }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let root = self.root?;

        unsafe {
            let (last, _) = self.max_in_subtree(root);
            Some(Pin::new_unchecked(last.as_ref()))
        }
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let root = self.root?;

        unsafe {
            let (first, _) = self.min_in_subtree(root);
            Some(self.remove_at(first))
        }
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let root = self.root?;

        unsafe {
            let (last, _) = self.max_in_subtree(root);
            Some(self.remove_at(last))
        }
    }

    /// Returns an iterator over the elements of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns an iterator over the elements of the tree in breadth-first order, starting at the
    /// root and visiting each level from left to right.
    pub fn level_order(&self) -> LevelOrder<'_, T> {
        LevelOrder::new(self)
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => self.replace_child(parent, old_child, new_child),
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that `old_child` is a child node of `parent`.
    #[inline]
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Option<NonNull<T>>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);
            T::links(parent).as_mut().set_child(dir, new_child);
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already holds an item with an equal key, the tree is left unchanged and `item`
    /// is handed back.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        self.insert_rebalanced(item).err()
    }

    // Inserts `item` and returns the rotation performed to rebalance the tree, if any.
    pub(crate) fn insert_rebalanced(
        &mut self,
        item: T::Handle,
    ) -> Result<Option<Rotation>, T::Handle> {
        let ptr = T::into_ptr(item);

        // Links may be stale if the item was previously part of a tree.
        unsafe { T::links(ptr).as_mut().clear() };

        let Some(root) = self.root else {
            // Tree is empty. Set `item` as the root and return.
            self.root = Some(ptr);
            self.len += 1;
            return Ok(None);
        };

        let mut parent = root;

        // Descend the tree, looking for an empty slot.
        loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Equal => {
                    log::trace!("rejecting duplicate key {:?}", unsafe { ptr.as_ref().key() });
                    return Err(unsafe { T::from_ptr(ptr) });
                }
                Ordering::Greater => Dir::Right,
            };

            unsafe {
                let parent_links = T::links(parent).as_mut();
                match parent_links.child(dir) {
                    // Descend.
                    Some(child) => parent = child,

                    // Set `item` as child.
                    None => {
                        parent_links.set_child(dir, Some(ptr));
                        T::links(ptr).as_mut().set_parent(Some(parent));
                        break;
                    }
                }
            }
        }

        self.len += 1;

        log::trace!(
            "attached {:?} below {:?}",
            unsafe { ptr.as_ref().key() },
            unsafe { parent.as_ref().key() }
        );

        Ok(unsafe { self.rebalance_inserted(ptr) })
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        self.extreme_in_subtree(root, Dir::Left)
    }

    // Returns the maximum node in the subtree.
    //
    // If the subtree root is not the maximum, also returns the maximum node's parent.
    #[inline]
    unsafe fn max_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        self.extreme_in_subtree(root, Dir::Right)
    }

    #[inline]
    unsafe fn extreme_in_subtree(
        &self,
        root: NonNull<T>,
        dir: Dir,
    ) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(child) = unsafe { T::links(cur).as_ref().child(dir) } {
            parent = Some(cur);
            cur = child;
        }

        (cur, parent)
    }

    /// Removes the element with the given key from the tree and returns it.
    ///
    /// Returns `None` and leaves the tree unchanged if no element has this key.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    // Unlinks `node` from the tree, rebalances and returns its handle.
    //
    // # Safety
    //
    // The caller must ensure that `node` is an element of `self`, and not any other tree.
    unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are three possible cases:
        //
        // 1. `node` is a leaf. It is detached from its parent.
        //
        // 2. `node` has one child. The child is elevated into `node`'s place.
        //
        // 3. `node` has two children. Its predecessor[^1] is removed from the left subtree and
        //    assumes `node`'s place. The predecessor by definition has no right child, so its left
        //    child (if any) is elevated to replace it.
        //
        // In every case the heights along the path from the lowest modified node up to the root
        // may have shrunk by one, which is repaired by `rebalance_removed`.
        //
        // [^1]: The predecessor of a node `a` is the greatest node in `a`'s left subtree.

        unsafe {
            let parent = T::links(node).as_ref().parent();
            let left = T::links(node).as_ref().left();
            let right = T::links(node).as_ref().right();

            let retrace_from = match (left, right) {
                (Some(left), Some(right)) => {
                    let (predecessor, predecessor_parent) = self.max_in_subtree(left);

                    let retrace_from = match predecessor_parent {
                        Some(predecessor_parent) => {
                            // Elevate the predecessor's left child to replace it.
                            let predecessor_left = T::links(predecessor).as_ref().left();
                            self.replace_child(predecessor_parent, predecessor, predecessor_left);
                            self.maybe_set_parent(predecessor_left, Some(predecessor_parent));

                            T::links(predecessor).as_mut().set_left(Some(left));
                            T::links(left).as_mut().set_parent(Some(predecessor));

                            log::trace!(
                                "spliced predecessor {:?} out from below {:?}",
                                predecessor.as_ref().key(),
                                predecessor_parent.as_ref().key()
                            );

                            predecessor_parent
                        }

                        // The predecessor is `left` and keeps its own left subtree.
                        None => predecessor,
                    };

                    self.replace_child_or_set_root(parent, node, Some(predecessor));

                    // Transfer the links of `node` to `predecessor`. The left link is updated
                    // above iff the predecessor is not `left`.
                    let node_height = T::links(node).as_ref().height();

                    T::links(predecessor).as_mut().set_parent(parent);
                    T::links(predecessor).as_mut().set_right(Some(right));
                    T::links(predecessor).as_mut().set_height(node_height);

                    T::links(right).as_mut().set_parent(Some(predecessor));

                    Some(retrace_from)
                }

                (Some(child), None) | (None, Some(child)) => {
                    self.replace_child_or_set_root(parent, node, Some(child));
                    T::links(child).as_mut().set_parent(parent);
                    parent
                }

                (None, None) => {
                    self.replace_child_or_set_root(parent, node, None);
                    parent
                }
            };

            log::trace!("detached {:?}", node.as_ref().key());

            T::links(node).as_mut().clear();
            self.len -= 1;

            self.rebalance_removed(retrace_from);

            T::from_ptr(node)
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| T::links(cur).as_ref().parent());

                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                T::links(cur).as_mut().clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        unsafe {
            if T::links(parent).as_ref().left() == Some(child) {
                Dir::Left
            } else {
                debug_assert_eq!(
                    T::links(parent).as_ref().right(),
                    Some(child),
                    "`child` must be a child of `parent`"
                );
                Dir::Right
            }
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 1,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn height(&self) -> u8 {
        unsafe { (*self.inner.get()).height }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_height(&mut self, height: u8) {
        self.inner.get_mut().height = height;
    }

    // Resets the links to those of a detached leaf.
    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.height = 1;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .finish()
    }
}
