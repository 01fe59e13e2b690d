use alloc::{collections::VecDeque, string::String};
use core::{fmt, ptr::NonNull};

use crate::{AvlTree, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Writes the shape of the tree as a Graphviz digraph.
    ///
    /// Nodes are labelled `key:height` and laid out one rank per tree level; absent children are
    /// drawn as points.
    pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
        T::Key: fmt::Display,
    {
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
                let height = unsafe { self.links(node).height() };
                write!(w, "\"graph{name}-{key}\" [label=\"{key}:{height}\"]; ")?;

                let children = unsafe { [self.links(node).left(), self.links(node).right()] };
                for child in children {
                    if let Some(child) = child {
                        let child_key = unsafe { child.as_ref().key() };

                        queue.push_back(Item::Node(child));
                        writeln!(
                            links,
                            "\"graph{name}-{key}\" -> \"graph{name}-{child_key}\";"
                        )?;
                    } else {
                        queue.push_back(Item::Missing(missing));
                        writeln!(
                            links,
                            "\"graph{name}-{key}\" -> \"graph{name}-missing{missing}\";"
                        )?;
                        missing += 1;
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&links)?;

        w.write_str(" }\n}")
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::{prelude::v1::*, string::String};

    use crate::{model::TestNode, AvlTree};

    #[test]
    fn empty_graph() {
        let tree: AvlTree<TestNode> = AvlTree::new();
        let mut out = String::new();

        tree.dotgraph("empty", &mut out).unwrap();
        assert_eq!(out, "digraph \"graph-empty\" {}");
    }

    #[test]
    fn labels_carry_heights() {
        let mut tree: AvlTree<TestNode> = AvlTree::new();
        for key in [10, 20, 30] {
            tree.insert(TestNode::new(key)).unwrap();
        }

        let mut out = String::new();
        tree.dotgraph("t", &mut out).unwrap();

        assert!(out.contains("\"grapht-20\" [label=\"20:1\"]"));
        assert!(out.contains("\"grapht-10\" [label=\"10:0\"]"));
        assert!(out.contains("\"grapht-20\" -> \"grapht-30\";"));
        assert_eq!(out.matches("shape=point").count(), 4);
    }
}
