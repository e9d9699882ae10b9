extern crate std;

use core::ptr::NonNull;
use std::{collections::VecDeque, fmt, prelude::v1::*};

use crate::{Links, SkewTree, TreeNode};

impl<T> SkewTree<T>
where
    T: TreeNode<Links<T>>,
{
    /// Writes the tree in pre-order, one key per line.
    ///
    /// Each line is prefixed with `"  |"` once per level of depth, so siblings line up.
    pub fn draw_tree<W: fmt::Write>(&self, mut w: W) -> fmt::Result {
        let mut stack: Vec<(NonNull<T>, usize)> = self.root.map(|r| (r, 0)).into_iter().collect();

        while let Some((node, depth)) = stack.pop() {
            for _ in 0..depth {
                w.write_str("  |")?;
            }

            unsafe {
                writeln!(w, "{:?}", node.as_ref().key())?;

                let links = self.links(node);
                if let Some(right) = links.right() {
                    stack.push((right, depth + 1));
                }
                if let Some(left) = links.left() {
                    stack.push((left, depth + 1));
                }
            }
        }

        Ok(())
    }

    /// Writes the tree sideways: right subtree first, three spaces of indentation per level, and
    /// each node as `"<key> , <level>"`.
    pub fn print_levels<W: fmt::Write>(&self, mut w: W) -> fmt::Result {
        let mut stack = Vec::new();
        let mut opt_cur = self.root.map(|r| (r, 0_usize));

        loop {
            // Descend along right links, stacking the nodes to come back to.
            while let Some((cur, depth)) = opt_cur {
                stack.push((cur, depth));
                opt_cur = unsafe { self.links(cur).right() }.map(|r| (r, depth + 1));
            }

            let Some((node, depth)) = stack.pop() else {
                break;
            };

            for _ in 0..depth {
                w.write_str("   ")?;
            }

            unsafe {
                let links = self.links(node);
                writeln!(w, "{:?} , {}", node.as_ref().key(), links.level())?;
                opt_cur = links.left().map(|l| (l, depth + 1));
            }
        }

        Ok(())
    }

    /// Writes a Graphviz digraph of the tree with one rank per depth.
    ///
    /// Nodes are labelled `key:level`; missing children are drawn as points.
    pub fn dotgraph<W: fmt::Write>(&self, name: &str, mut w: W) -> fmt::Result {
        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item<T: ?Sized> {
            Node(NonNull<T>),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut missing = 0;
        let mut links = String::new();

        while !queue.is_empty() {
            use fmt::Write;

            write!(w, "{{rank=same; ")?;

            for _ in 0..queue.len() {
                let Some(item) = queue.pop_front() else {
                    break;
                };

                let node = match item {
                    Item::Node(node) => node,
                    Item::Missing(id) => {
                        write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                };

                let key = unsafe { node.as_ref().key() };
                let level = unsafe { self.links(node).level() };
                write!(w, "\"graph{name}-{key:?}\" [label=\"{key:?}:{level}\"]; ")?;

                for child in unsafe { [self.links(node).left(), self.links(node).right()] } {
                    match child {
                        Some(child) => {
                            let child_key = unsafe { child.as_ref().key() };

                            queue.push_back(Item::Node(child));
                            writeln!(
                                links,
                                "\"graph{name}-{key:?}\" -> \"graph{name}-{child_key:?}\";"
                            )?;
                        }
                        None => {
                            queue.push_back(Item::Missing(missing));
                            writeln!(
                                links,
                                "\"graph{name}-{key:?}\" -> \"graph{name}-missing{missing}\";"
                            )?;
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&links)?;

        w.write_str(" }\n}")
    }
}
