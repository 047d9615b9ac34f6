//! The hierarchical index: slash-delimited keys folded into nested mappings.
//!
//! Every root-to-leaf path spells exactly one indexed key, and a name is
//! never both a leaf and a branch at the same level. Children keep the order
//! in which they were first inserted.

use indexmap::IndexMap;
use rimg_store::KEY_SEPARATOR;

/// Children of a branch, in first-insertion order.
pub type Branch = IndexMap<String, TreeNode>;

/// A node of the index tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeNode {
    /// An indexed object; the value is its rendered upload time.
    Leaf(String),
    /// A directory-like segment.
    Branch(Branch),
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// Number of leaves at or below this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Branch(children) => children.values().map(TreeNode::leaf_count).sum(),
        }
    }

    /// Levels at and below this node; a leaf is one level.
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Branch(children) => 1 + children.values().map(TreeNode::depth).max().unwrap_or(0),
        }
    }
}

/// A key could not be inserted because one of its segments is already used
/// with the other shape (leaf versus branch).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("key {key:?} collides with existing {existing} at {at:?}")]
pub struct TreeConflict {
    pub key: String,
    /// Path of the clashing node.
    pub at: String,
    /// Shape of the node already present: `"leaf"` or `"branch"`.
    pub existing: &'static str,
}

/// Whether an insert created a leaf or refreshed an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inserted {
    New,
    Replaced,
}

/// Root of the index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexTree {
    root: Branch,
}

impl IndexTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_root(root: Branch) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Branch {
        &self.root
    }

    pub fn into_root(self) -> Branch {
        self.root
    }

    /// Returns `true` if the tree holds no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Total number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.root.values().map(TreeNode::leaf_count).sum()
    }

    /// Segment count of the deepest path, `0` for an empty tree.
    pub fn depth(&self) -> usize {
        self.root.values().map(TreeNode::depth).max().unwrap_or(0)
    }

    /// Insert `key` with the rendered upload time `timestamp`.
    ///
    /// Intermediate branches are created as needed. Inserting an existing key
    /// replaces its timestamp in place. A collision with a node of the other
    /// shape leaves the tree untouched: nodes are only created below the last
    /// existing one, and nothing new can collide.
    pub fn insert(&mut self, key: &str, timestamp: impl Into<String>) -> Result<Inserted, TreeConflict> {
        let mut segments: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        let name = segments.pop().unwrap_or(key);

        let mut level = &mut self.root;
        for (depth, segment) in segments.iter().enumerate() {
            let node = level
                .entry((*segment).to_string())
                .or_insert_with(|| TreeNode::Branch(Branch::new()));
            level = match node {
                TreeNode::Branch(children) => children,
                TreeNode::Leaf(_) => {
                    return Err(TreeConflict {
                        key: key.to_string(),
                        at: segments[..=depth].join("/"),
                        existing: "leaf",
                    })
                }
            };
        }

        match level.get_mut(name) {
            Some(TreeNode::Leaf(existing)) => {
                *existing = timestamp.into();
                Ok(Inserted::Replaced)
            }
            Some(TreeNode::Branch(_)) => Err(TreeConflict {
                key: key.to_string(),
                at: key.to_string(),
                existing: "branch",
            }),
            None => {
                level.insert(name.to_string(), TreeNode::Leaf(timestamp.into()));
                Ok(Inserted::New)
            }
        }
    }

    /// Follow `segments` from the root.
    pub fn node_at<'a, I>(&self, segments: I) -> Option<&TreeNode>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut segments = segments.into_iter();
        let first = segments.next()?;
        let mut node = self.root.get(first)?;
        for segment in segments {
            match node {
                TreeNode::Branch(children) => node = children.get(segment)?,
                TreeNode::Leaf(_) => return None,
            }
        }
        Some(node)
    }

    /// The rendered upload time of `key`, if it is a leaf.
    pub fn timestamp(&self, key: &str) -> Option<&str> {
        match self.node_at(key.split(KEY_SEPARATOR))? {
            TreeNode::Leaf(ts) => Some(ts.as_str()),
            TreeNode::Branch(_) => None,
        }
    }
}
