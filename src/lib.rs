//! An intrusive, level-balanced binary search tree with parent links.
//!
//! Every node caches its `level`, the height of the subtree rooted at it (0 for a leaf). After each
//! insertion or removal the nodes on the path to the root are visited bottom-up; each one has its
//! level recomputed and is then rebalanced by rotation if its skew leaves the allowed window.

// Conventions used in comments:
// - The level of a node `x` is denoted `l(x)`.
// - The skew of `x` is `s(x)`. With both children it is `l(right) - l(left)`. A unary node is
//   scored by its one child alone: `l(c) + 1` for a right child and `-(l(c) + 1)` for a left one.
//   Leaves have skew 0.
//
// The rebalancing window is deliberately looser than AVL:
// - `s(x) > 2` with no left child rotates `x` left.
// - `s(x) > 2` with a left child rotates only if `s(left) < -1`, in which case `x.right` is first
//   rotated right around its left child and `x` is then rotated left.
// - The `s(x) < -2` cases mirror the above with the inner threshold `s(right) > 1`.
// The two halves are checked in sequence, so a rotation made by the first may trigger the second.
//
// Consequently the tree is not height-balanced in the AVL sense: a node whose left child has skew
// `>= -1` is left alone no matter how right-heavy it is.

use core::{
    cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not, pin::Pin,
    ptr::NonNull,
};
use std::borrow::Borrow;

use cordyceps::Linked;

mod debug;
pub mod error;
mod iter;
#[cfg(any(test, feature = "model"))]
pub mod model;
mod set;
#[cfg(test)]
mod tests;

pub use error::Error;
pub use iter::Iter;
pub use set::BalancedTree;

/// Skew beyond which a node is rotated.
const MAX_SKEW: i32 = 2;

/// Skew the inner child must exceed before a double rotation is performed.
const MAX_INNER_SKEW: i32 = 1;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive level-balanced binary search tree.
///
/// Nodes carry their own [`Links`], including a pointer to their parent, so the bottom-up
/// rebalancing pass after a mutation needs no auxiliary stack.
pub struct SkewTree<T>
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
    level: i32,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> SkewTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> SkewTree<T> {
        SkewTree { root: None, len: 0 }
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

    /// Returns an iterator over the elements of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Checks BST ordering, parent links, cached levels and the element count.
    ///
    /// # Panics
    ///
    /// Panics if any of the invariants is violated.
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0, "empty tree must have length 0");
            return;
        };

        unsafe {
            assert_eq!(
                self.links(root).parent(),
                None,
                "root must not have a parent"
            );

            let (count, _) = self.assert_invariants_at(root, None, None);
            assert_eq!(count, self.len, "element count does not match `len`");
        }
    }

    // Returns the number of nodes and the level of the subtree rooted at `node`.
    unsafe fn assert_invariants_at<'a>(
        &'a self,
        node: NonNull<T>,
        lower: Option<&'a T::Key>,
        upper: Option<&'a T::Key>,
    ) -> (usize, i32) {
        unsafe {
            let key = node.as_ref().key();

            if let Some(lower) = lower {
                assert!(lower < key, "{lower:?} is left of {key:?}");
            }

            if let Some(upper) = upper {
                assert!(key < upper, "{upper:?} is right of {key:?}");
            }

            let mut count = 1;
            let mut level = 0;

            for dir in [Dir::Left, Dir::Right] {
                let Some(child) = self.links(node).child(dir) else {
                    continue;
                };

                // Ensure child's parent link points to this node.
                let parent = self
                    .links(child)
                    .parent()
                    .expect("child parent pointer not set");
                assert_eq!(node, parent, "child of {key:?} points at another parent");

                let (lower, upper) = match dir {
                    Dir::Left => (lower, Some(key)),
                    Dir::Right => (Some(key), upper),
                };

                let (child_count, child_level) = self.assert_invariants_at(child, lower, upper);
                count += child_count;
                level = level.max(child_level + 1);
            }

            assert_eq!(
                self.links(node).level(),
                level,
                "stale level cached at {key:?}"
            );

            (count, level)
        }
    }

    /// Returns `true` if every child points back at its parent and the root has no parent.
    ///
    /// Unlike [`assert_invariants`](Self::assert_invariants) this only inspects the links and
    /// reports rather than panics.
    pub fn parent_links_consistent(&self) -> bool {
        let Some(root) = self.root else {
            return true;
        };

        unsafe {
            if self.links(root).parent().is_some() {
                return false;
            }

            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                for child in self.links(node).children() {
                    if self.links(child).parent() != Some(node) {
                        return false;
                    }
                    stack.push(child);
                }
            }
        }

        true
    }

    /// Returns the skew of the root node, or `None` if the tree is empty.
    ///
    /// A positive skew means the right subtree is taller.
    pub fn root_skew(&self) -> Option<i32> {
        self.root.map(|root| unsafe { self.skew(root) })
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
                    Ordering::Less => opt_cur = self.links(cur).left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = self.links(cur).right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let first = self.extreme_raw(Dir::Left)?;
        unsafe { Some(Pin::new_unchecked(first.as_ref())) }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let last = self.extreme_raw(Dir::Right)?;
        unsafe { Some(Pin::new_unchecked(last.as_ref())) }
    }

    // Follows `dir` links from the root as far as they go.
    fn extreme_raw(&self, dir: Dir) -> Link<T> {
        let mut cur = self.root?;

        while let Some(next) = unsafe { self.links(cur).child(dir) } {
            cur = next;
        }

        Some(cur)
    }

    #[inline]
    unsafe fn links<'a>(&self, node: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(node).as_ref() }
    }

    #[inline]
    unsafe fn links_mut<'a>(&mut self, node: NonNull<T>) -> &'a mut Links<T> {
        unsafe { T::links(node).as_mut() }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { self.links_mut(node).set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Option<NonNull<T>>,
    ) {
        unsafe {
            let dir = self.which_child(parent, Some(old_child));

            debug_assert_eq!(
                self.links(parent).child(dir),
                Some(old_child),
                "`old_child` must be a child of `parent`"
            );

            if let Some(new_child) = new_child {
                debug_assert_ne!(
                    self.links(parent).child(!dir),
                    Some(new_child),
                    "`new_child` must not be a child of `parent`"
                );
            }

            self.links_mut(parent).set_child(dir, new_child);
        }
    }

    // Recomputes the cached level of `node` from its children.
    unsafe fn update_level(&mut self, node: NonNull<T>) {
        unsafe {
            let links = self.links(node);

            let level = match (links.left(), links.right()) {
                (None, None) => 0,
                (Some(left), Some(right)) => {
                    1 + self.links(left).level().max(self.links(right).level())
                }
                (Some(child), None) | (None, Some(child)) => 1 + self.links(child).level(),
            };

            self.links_mut(node).set_level(level);
        }
    }

    // Returns the skew of `node`. Positive when right-heavy, negative when left-heavy.
    unsafe fn skew(&self, node: NonNull<T>) -> i32 {
        unsafe {
            let links = self.links(node);

            match (links.left(), links.right()) {
                (None, None) => 0,
                (Some(left), Some(right)) => {
                    (self.links(right).level() + 1) - (self.links(left).level() + 1)
                }
                (Some(left), None) => -(self.links(left).level() + 1),
                (None, Some(right)) => self.links(right).level() + 1,
            }
        }
    }

    // Performs a rotation, moving `pivot` up into the place of its parent `top` and `top` down in
    // direction `dir`.
    //
    // Levels are refreshed for `top`, `pivot` and the new parent of `pivot`, in that order. Levels
    // further up are left to the caller.
    fn rotate(&mut self, top: NonNull<T>, pivot: NonNull<T>, dir: Dir) {
        unsafe {
            debug_assert_eq!(self.links(top).child(!dir), Some(pivot));

            tracing::trace!(
                top = ?top.as_ref().key(),
                pivot = ?pivot.as_ref().key(),
                ?dir,
                "rotating"
            );

            // - `top` becomes the `dir` child of `pivot`.
            // - `across` goes from the `dir` child of `pivot` to the `!dir` child of `top`.
            let across = self.links(pivot).child(dir);
            self.links_mut(top).set_child(!dir, across);
            self.maybe_set_parent(across, Some(top));

            self.links_mut(pivot).set_child(dir, Some(top));
            let parent = self.links_mut(top).set_parent(Some(pivot));
            self.links_mut(pivot).set_parent(parent);
            self.replace_child_or_set_root(parent, top, Some(pivot));

            self.update_level(top);
            self.update_level(pivot);
            if let Some(parent) = parent {
                self.update_level(parent);
            }
        }
    }

    // `pivot` must be the right child of `top`.
    #[inline]
    fn rotate_left(&mut self, top: NonNull<T>, pivot: NonNull<T>) {
        self.rotate(top, pivot, Dir::Left);
    }

    // `pivot` must be the left child of `top`.
    #[inline]
    fn rotate_right(&mut self, top: NonNull<T>, pivot: NonNull<T>) {
        self.rotate(top, pivot, Dir::Right);
    }

    // Rotates at `node` if its skew is outside the window. `node`'s level must be current.
    fn rebalance(&mut self, node: NonNull<T>) {
        unsafe {
            if self.skew(node) > MAX_SKEW {
                let links = self.links(node);

                match (links.left(), links.right()) {
                    (Some(left), Some(right)) => {
                        if self.skew(left) < -MAX_INNER_SKEW {
                            // A missing inner grandchild leaves nothing to rotate.
                            if let Some(inner) = self.links(right).left() {
                                tracing::debug!(node = ?node.as_ref().key(), "right-left rotation");
                                self.rotate_right(right, inner);
                                self.rotate_left(node, inner);
                            }
                        }
                    }

                    (None, Some(right)) => {
                        tracing::debug!(node = ?node.as_ref().key(), "left rotation");
                        self.rotate_left(node, right);
                    }

                    (_, None) => unreachable!("right-heavy node has no right child"),
                }
            }

            if self.skew(node) < -MAX_SKEW {
                let links = self.links(node);

                match (links.left(), links.right()) {
                    (Some(left), Some(right)) => {
                        if self.skew(right) > MAX_INNER_SKEW {
                            if let Some(inner) = self.links(left).right() {
                                tracing::debug!(node = ?node.as_ref().key(), "left-right rotation");
                                self.rotate_left(left, inner);
                                self.rotate_right(node, inner);
                            }
                        }
                    }

                    (Some(left), None) => {
                        tracing::debug!(node = ?node.as_ref().key(), "right rotation");
                        self.rotate_right(node, left);
                    }

                    (None, _) => unreachable!("left-heavy node has no left child"),
                }
            }
        }
    }

    // Updates the level of and rebalances `start` and each of its ancestors, bottom-up.
    //
    // The parent of each node is read before the node is rebalanced: a rotation at the node moves
    // it below its pivot, but never changes which node sits above the rotated subtree.
    fn rebalance_upward(&mut self, start: Link<T>) {
        let mut opt_node = start;

        while let Some(node) = opt_node {
            unsafe {
                opt_node = self.links(node).parent();
                self.update_level(node);
            }

            self.rebalance(node);
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains an item with an equal key, the tree is left untouched and
    /// `item` is handed back.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        unsafe { self.links_mut(ptr).clear() };

        let Some(root) = self.root else {
            // Tree is empty. Set `item` as the root and return.
            self.root = Some(ptr);
            self.len += 1;
            return None;
        };

        let mut parent = root;

        // Descend the tree, looking for a free slot.
        loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Equal => unsafe {
                    let key = ptr.as_ref().key();
                    tracing::trace!(?key, "duplicate key rejected");
                    return Some(T::from_ptr(ptr));
                },
                Ordering::Greater => Dir::Right,
            };

            unsafe {
                match self.links(parent).child(dir) {
                    // Descend.
                    Some(child) => parent = child,

                    // Set `item` as child.
                    None => {
                        self.links_mut(parent).set_child(dir, Some(ptr));
                        self.links_mut(ptr).set_parent(Some(parent));
                        break;
                    }
                }
            }
        }

        self.len += 1;
        self.rebalance_upward(Some(parent));

        None
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { self.links(cur).left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    /// Removes the item with the given key from the tree, if present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized + fmt::Debug,
    {
        let Some(node) = self.get_raw(key) else {
            tracing::trace!(?key, "key to remove not found");
            return None;
        };

        Some(unsafe { self.remove_at(node) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let node = self.extreme_raw(Dir::Left)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let node = self.extreme_raw(Dir::Right)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are two cases:
        //
        // 1. `node` has two children.
        //
        //    Its successor[^1] is unlinked from the right subtree (its right child, if any, is
        //    elevated to replace it) and then takes over `node`'s parent, children and level. The
        //    walk starts at the successor's former parent, or at the successor itself if it was
        //    `node`'s right child.
        //
        // 2. `node` has at most one child.
        //
        //    The child, if any, is elevated into `node`'s place. The walk starts at `node`'s
        //    parent.
        //
        // [^1]: The successor of a node `a` is the least node in `a`'s right subtree.

        unsafe {
            let parent = self.links(node).parent();
            let left = self.links(node).left();
            let right = self.links(node).right();

            let start = match (left, right) {
                (Some(left), Some(right)) => {
                    let (successor, successor_parent) = self.min_in_subtree(right);

                    if let Some(successor_parent) = successor_parent {
                        // Elevate the successor's right child to replace it.
                        let successor_right = self.links(successor).right();
                        self.replace_child(successor_parent, successor, successor_right);
                        self.maybe_set_parent(successor_right, Some(successor_parent));

                        self.links_mut(successor).set_right(Some(right));
                        self.links_mut(right).set_parent(Some(successor));
                    }

                    self.replace_child_or_set_root(parent, node, Some(successor));

                    let node_level = self.links(node).level();
                    self.links_mut(successor).set_parent(parent);
                    self.links_mut(successor).set_left(Some(left));
                    self.links_mut(successor).set_level(node_level);
                    // Right link is updated above iff successor != right.

                    self.links_mut(left).set_parent(Some(successor));

                    Some(successor_parent.unwrap_or(successor))
                }

                (Some(child), None) | (None, Some(child)) => {
                    self.replace_child_or_set_root(parent, node, Some(child));
                    self.links_mut(child).set_parent(parent);
                    parent
                }

                (None, None) => {
                    self.replace_child_or_set_root(parent, node, None);
                    parent
                }
            };

            self.rebalance_upward(start);

            self.len -= 1;
            self.links_mut(node).clear();

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
                let parent = parent.or_else(|| self.links(cur).parent());

                let right = self.links(cur).right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                self.links_mut(cur).clear();
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

    unsafe fn which_child(&self, parent: NonNull<T>, child: Link<T>) -> Dir {
        if unsafe { self.links(parent).left() } == child {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<T> Default for SkewTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for SkewTree<T>
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
                level: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    // Detaches the links from any tree.
    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.level = 0;
    }

    #[inline]
    fn level(&self) -> i32 {
        unsafe { (*self.inner.get()).level }
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
    fn children(&self) -> impl Iterator<Item = NonNull<T>> {
        unsafe { (*self.inner.get()).children }.into_iter().flatten()
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
    fn set_level(&mut self, level: i32) {
        self.inner.get_mut().level = level;
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
            .field("level", &self.level())
            .finish()
    }
}
