use core::{fmt, ptr::NonNull};

use crate::{AvlTree, Links, TreeNode, WorkQueue};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>>,
    T::Key: fmt::Display,
{
    /// Writes the tree to `w` in graphviz dot format.
    ///
    /// Each node is labelled `key:height`. Nodes of the same depth share a rank, and missing
    /// children are drawn as points.
    pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
    {
        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item<T> {
            Node(NonNull<T>),
            Missing(u32),
        }

        let mut queue = WorkQueue::new();
        queue.push(Item::Node(root));

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
                let Ok(item) = queue.pop() else {
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
                let height = unsafe { T::links(node).as_ref().height() };
                write!(w, "\"graph{name}-{key}\" [label=\"{key}:{height}\"]; ")?;

                let children = unsafe {
                    let node_links = T::links(node).as_ref();
                    [node_links.left(), node_links.right()]
                };

                for child in children {
                    match child {
                        Some(child) => {
                            let child_key = unsafe { child.as_ref().key() };

                            queue.push(Item::Node(child));
                            writeln!(
                                links,
                                "\"graph{name}-{key}\" -> \"graph{name}-{child_key}\";"
                            )?;
                        }
                        None => {
                            queue.push(Item::Missing(missing));
                            writeln!(
                                links,
                                "\"graph{name}-{key}\" -> \"graph{name}-missing{missing}\";"
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

#[cfg(test)]
mod tests {
    use crate::AvlSet;

    #[test]
    fn empty_graph() {
        let set = AvlSet::new();
        let mut out = String::new();

        set.dotgraph("empty", &mut out).unwrap();
        assert_eq!(out, "digraph \"graph-empty\" {}");
    }

    #[test]
    fn graph_ranks_follow_levels() {
        let set: AvlSet = [2, 1, 3].into_iter().collect();
        let mut out = String::new();

        set.dotgraph("t", &mut out).unwrap();

        assert!(out.starts_with("digraph \"graph-t\" {\n subgraph \"subgraph-t\" {"));
        assert!(out.contains("{rank=same; \"grapht-2\" [label=\"2:2\"]; }\n"));
        assert!(out.contains(
            "{rank=same; \"grapht-1\" [label=\"1:1\"]; \"grapht-3\" [label=\"3:1\"]; }\n"
        ));
        assert!(out.contains("\"grapht-2\" -> \"grapht-1\";"));
        assert!(out.contains("\"grapht-2\" -> \"grapht-3\";"));
        assert!(out.contains("\"grapht-1\" -> \"grapht-missing0\";"));
        assert!(out.ends_with(" }\n}"));
    }
}
