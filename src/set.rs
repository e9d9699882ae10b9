extern crate alloc;

use alloc::{boxed::Box, string::String};
use core::{fmt, marker::PhantomPinned, ptr::NonNull};

use cordyceps::Linked;

use crate::{Error, Links, SkewTree, TreeNode};

/// An ordered set of `i32` keys backed by a [`SkewTree`].
///
/// Inserts and removals report whether they changed the set. The fallible variants
/// [`try_insert`](Self::try_insert) and [`try_remove`](Self::try_remove) report the same outcome as
/// an [`Error`].
pub struct BalancedTree {
    tree: SkewTree<KeyNode>,
}

struct KeyNode {
    links: Links<KeyNode>,
    key: i32,
    _unpin: PhantomPinned,
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

impl BalancedTree {
    /// Creates a new, empty `BalancedTree`.
    pub const fn new() -> Self {
        Self {
            tree: SkewTree::new(),
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

    /// Adds `key` to the set.
    ///
    /// Returns `false`, leaving the set untouched, if `key` was already present.
    #[inline]
    pub fn insert(&mut self, key: i32) -> bool {
        self.try_insert(key).is_ok()
    }

    /// Adds `key` to the set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateKey`] if `key` was already present.
    pub fn try_insert(&mut self, key: i32) -> Result<(), Error> {
        match self.tree.insert(KeyNode::new(key)) {
            None => Ok(()),
            Some(rejected) => Err(Error::DuplicateKey(rejected.key)),
        }
    }

    /// Returns `true` if the set contains `key`.
    #[inline]
    pub fn contains(&self, key: i32) -> bool {
        self.tree.contains_key(&key)
    }

    /// Removes `key` from the set.
    ///
    /// Returns `false`, leaving the set untouched, if `key` was not present.
    #[inline]
    pub fn remove(&mut self, key: i32) -> bool {
        self.try_remove(key).is_ok()
    }

    /// Removes `key` from the set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] if `key` was not present.
    pub fn try_remove(&mut self, key: i32) -> Result<(), Error> {
        self.tree
            .remove(&key)
            .map(drop)
            .ok_or(Error::KeyNotFound(key))
    }

    /// Returns the smallest key, or `None` if the set is empty.
    #[inline]
    pub fn minimum(&self) -> Option<i32> {
        self.tree.first().map(|node| node.key)
    }

    /// Returns the largest key, or `None` if the set is empty.
    #[inline]
    pub fn maximum(&self) -> Option<i32> {
        self.tree.last().map(|node| node.key)
    }

    /// Removes and returns the smallest key.
    #[inline]
    pub fn pop_first(&mut self) -> Option<i32> {
        self.tree.pop_first().map(|node| node.key)
    }

    /// Removes and returns the largest key.
    #[inline]
    pub fn pop_last(&mut self) -> Option<i32> {
        self.tree.pop_last().map(|node| node.key)
    }

    /// Returns an iterator over the keys in ascending order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = i32> + '_ {
        self.tree.iter().map(|node| node.key)
    }

    /// Clears the set, removing all keys.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns the skew of the root node, or `None` if the set is empty.
    #[inline]
    pub fn root_skew(&self) -> Option<i32> {
        self.tree.root_skew()
    }

    /// Returns `true` if every node's parent link matches the tree structure.
    #[inline]
    pub fn parent_links_consistent(&self) -> bool {
        self.tree.parent_links_consistent()
    }

    /// Renders the tree in pre-order, one key per line, indenting each level by `"  |"`.
    pub fn draw_tree(&self) -> String {
        let mut out = String::new();
        // Writing to a `String` cannot fail.
        let _ = self.tree.draw_tree(&mut out);
        out
    }

    /// Renders the tree sideways, right subtree first, with the cached level of every node.
    pub fn print_levels(&self) -> String {
        let mut out = String::new();
        let _ = self.tree.print_levels(&mut out);
        out
    }

    /// Renders the tree as a Graphviz digraph called `name`.
    pub fn dotgraph(&self, name: &str) -> String {
        let mut out = String::new();
        let _ = self.tree.dotgraph(name, &mut out);
        out
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }
}

impl Default for BalancedTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BalancedTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Extend<i32> for BalancedTree {
    fn extend<I: IntoIterator<Item = i32>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl FromIterator<i32> for BalancedTree {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let mut tree = BalancedTree::new();
        tree.extend(iter);
        tree
    }
}
