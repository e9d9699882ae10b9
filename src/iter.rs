use core::iter::FusedIterator;

use crate::{Dir, Link, Links, SkewTree, TreeNode};

/// An iterator over the elements of a [`SkewTree`] in ascending key order.
///
/// The iterator walks the tree through its parent links and keeps no stack.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    tree: &'tree SkewTree<T>,
    next: Link<T>,
    len: usize,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree SkewTree<T>) -> Self {
        Iter {
            tree,
            next: tree.extreme_raw(Dir::Left),
            len: tree.len(),
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;

        unsafe {
            self.next = match self.tree.links(cur).right() {
                // The successor is the minimum of the right subtree.
                Some(right) => Some(self.tree.min_in_subtree(right).0),

                // Otherwise it is the first ancestor reached from its left side.
                None => {
                    let mut child = cur;
                    loop {
                        match self.tree.links(child).parent() {
                            Some(parent)
                                if self.tree.which_child(parent, Some(child)) == Dir::Right =>
                            {
                                child = parent;
                            }
                            parent => break parent,
                        }
                    }
                }
            };

            self.len -= 1;

            Some(cur.as_ref())
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'_, T> {}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'_, T> {}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> IntoIterator for &'tree SkewTree<T> {
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
