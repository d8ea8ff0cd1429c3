//! Prefix tree over a flat key dump, used for hierarchical listing.

use std::collections::BTreeMap;

use crate::keys::SEPARATOR;
use crate::Error;

/// One path segment of a [`KeyTree`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    pub name: String,
    pub children: BTreeMap<String, Node>,
    /// Value stored at exactly this key, if any.
    pub value: Option<String>,
    /// Separator-joined names from the root down to this node, with a
    /// leading separator. Empty for the root.
    pub full_path: String,
}

impl Node {
    fn child(name: &str, parent_path: &str) -> Self {
        Self {
            name: name.to_string(),
            full_path: format!("{parent_path}{SEPARATOR}{name}"),
            ..Self::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Immutable tree built once from a store dump.
///
/// Keys are split on `/`; empty segments (the leading one of an absolute
/// key, doubled or trailing separators) are skipped, so `/a//b/` and `/a/b`
/// address the same node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyTree {
    root: Node,
}

impl KeyTree {
    /// Builds the tree from `(key, value)` pairs. A later duplicate key wins.
    pub fn build<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut root = Node::default();
        for (key, value) in entries {
            let mut current = &mut root;
            for segment in segments(key.as_ref()) {
                let parent_path = current.full_path.clone();
                current = current
                    .children
                    .entry(segment.to_string())
                    .or_insert_with(|| Node::child(segment, &parent_path));
            }
            current.value = Some(value.into());
        }
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Node at `path`, or `None` when some segment is absent.
    pub fn node(&self, path: &str) -> Option<&Node> {
        segments(path).try_fold(&self.root, |node, segment| node.get(segment))
    }

    /// Immediate children of the node at `path`, in name order.
    pub fn list_children(&self, path: &str) -> Result<Vec<&Node>, Error> {
        self.node(path)
            .map(|node| node.children.values().collect())
            .ok_or_else(|| Error::PathNotFound {
                path: path.to_string(),
            })
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}
