use core::{fmt, marker::PhantomPinned, ptr::NonNull};

use cordyceps::Linked;

use crate::{AvlTree, Error, Links, TreeNode};

/// An ordered set of `i32` keys based on an [AVL tree].
///
/// Unlike [`AvlTree`], the set owns its nodes: each key is boxed on insertion and freed on
/// deletion.
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlSet {
    tree: AvlTree<KeyNode>,
}

struct KeyNode {
    links: Links<KeyNode>,
    key: i32,
    _unpin: PhantomPinned,
}

unsafe impl Linked<Links<KeyNode>> for KeyNode {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<KeyNode>> {
        let ptr = ptr.as_ptr();
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl TreeNode<Links<KeyNode>> for KeyNode {
    type Key = i32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

impl KeyNode {
    fn new(key: i32) -> Box<KeyNode> {
        Box::new(KeyNode {
            links: Links::new(),
            key,
            _unpin: PhantomPinned,
        })
    }
}

impl AvlSet {
    /// Creates a new, empty `AvlSet`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the set contains no keys.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of keys in the set.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree.
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    /// Adds `key` to the set.
    ///
    /// Returns [`Error::DuplicateKey`] and leaves the set unchanged if `key` is already present.
    pub fn insert(&mut self, key: i32) -> Result<(), Error> {
        match self.tree.insert(KeyNode::new(key)) {
            None => Ok(()),
            Some(_) => Err(Error::DuplicateKey(key)),
        }
    }

    /// Removes `key` from the set.
    ///
    /// Returns [`Error::KeyNotFound`] and leaves the set unchanged if `key` is not present.
    pub fn delete(&mut self, key: i32) -> Result<(), Error> {
        self.tree
            .remove(&key)
            .map(drop)
            .ok_or(Error::KeyNotFound(key))
    }

    /// Returns a reference to the stored key equal to `key`.
    pub fn search(&self, key: i32) -> Result<&i32, Error> {
        self.tree
            .get(&key)
            .map(|node| &node.get_ref().key)
            .ok_or(Error::KeyNotFound(key))
    }

    /// Returns `true` if the set contains `key`.
    #[inline]
    pub fn contains(&self, key: i32) -> bool {
        self.tree.contains_key(&key)
    }

    /// Returns the minimum key in the set.
    #[inline]
    pub fn first(&self) -> Option<i32> {
        self.tree.first().map(|node| node.key)
    }

    /// Returns the maximum key in the set.
    #[inline]
    pub fn last(&self) -> Option<i32> {
        self.tree.last().map(|node| node.key)
    }

    /// Removes and returns the minimum key in the set.
    #[inline]
    pub fn pop_first(&mut self) -> Option<i32> {
        self.tree.pop_first().map(|node| node.key)
    }

    /// Removes and returns the maximum key in the set.
    #[inline]
    pub fn pop_last(&mut self) -> Option<i32> {
        self.tree.pop_last().map(|node| node.key)
    }

    /// Returns the keys in ascending order.
    pub fn in_order(&self) -> impl Iterator<Item = i32> + '_ {
        self.tree.iter().map(|node| node.key)
    }

    /// Returns the keys in breadth-first order, level by level from the root.
    pub fn level_order(&self) -> impl Iterator<Item = i32> + '_ {
        self.tree.level_order().map(|node| node.key)
    }

    /// Writes the underlying tree to `w` in graphviz dot format.
    pub fn dotgraph<W: fmt::Write>(&self, name: &str, w: W) -> fmt::Result {
        self.tree.dotgraph(name, w)
    }

    /// Removes every key, freeing all nodes.
    #[inline]
    pub fn destroy(&mut self) {
        self.tree.clear();
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }
}

impl Default for AvlSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AvlSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.in_order()).finish()
    }
}

impl Extend<i32> for AvlSet {
    /// Inserts every key from `iter`, skipping keys already present.
    fn extend<I: IntoIterator<Item = i32>>(&mut self, iter: I) {
        for key in iter {
            // Duplicates are left as they are.
            let _ = self.insert(key);
        }
    }
}

impl FromIterator<i32> for AvlSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let mut set = AvlSet::new();
        set.extend(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn insert_search_delete() {
        let mut set = AvlSet::new();

        assert_eq!(set.insert(4), Ok(()));
        assert_eq!(set.search(4), Ok(&4));
        assert!(set.contains(4));

        assert_eq!(set.delete(4), Ok(()));
        assert_eq!(set.search(4), Err(Error::KeyNotFound(4)));
        assert!(set.is_empty());
    }

    #[test]
    fn duplicate_and_missing_keys_are_rejected() {
        let mut set: AvlSet = [1, 2, 3].into_iter().collect();

        assert_eq!(set.insert(2), Err(Error::DuplicateKey(2)));
        assert_eq!(set.len(), 3);

        assert_eq!(set.delete(7), Err(Error::KeyNotFound(7)));
        assert_eq!(set.len(), 3);
        assert_eq!(set.in_order().collect::<Vec<_>>(), [1, 2, 3]);
    }

    #[test]
    fn negative_keys() {
        let set: AvlSet = [0, -5, 5, i32::MIN, i32::MAX].into_iter().collect();

        assert_eq!(set.first(), Some(i32::MIN));
        assert_eq!(set.last(), Some(i32::MAX));
        assert_eq!(
            set.in_order().collect::<Vec<_>>(),
            [i32::MIN, -5, 0, 5, i32::MAX]
        );
    }

    #[test]
    fn pop_ends() {
        let mut set: AvlSet = (1..=10).collect();

        assert_eq!(set.pop_first(), Some(1));
        assert_eq!(set.pop_last(), Some(10));
        set.assert_invariants();
        assert_eq!(set.len(), 8);

        while set.pop_first().is_some() {
            set.assert_invariants();
        }
        assert_eq!(set.pop_last(), None);
        assert!(set.is_empty());
    }

    #[test]
    fn destroy_then_reuse() {
        let mut set: AvlSet = (0..100).collect();
        assert_eq!(set.len(), 100);

        set.destroy();
        assert!(set.is_empty());
        assert_eq!(set.height(), 0);
        assert_eq!(set.level_order().count(), 0);

        set.extend([3, 1, 2]);
        set.assert_invariants();
        assert_eq!(set.level_order().collect::<Vec<_>>(), [2, 1, 3]);
    }

    #[test]
    fn debug_lists_keys_in_order() {
        let set: AvlSet = [3, 1, 2].into_iter().collect();
        assert_eq!(format!("{set:?}"), "{1, 2, 3}");
    }
}
