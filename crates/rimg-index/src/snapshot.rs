//! JSON encoding of the index tree.
//!
//! A snapshot is a nested JSON object: keys are segment names in first-seen
//! order, terminal values are timestamp strings. Decoding rejects anything
//! that would not round-trip into a well-formed [`IndexTree`]: non-object
//! roots, values that are neither strings nor objects, and a name repeated
//! within one object (which would make it ambiguous whether that name is a
//! leaf or a branch).

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{IndexError, IndexResult};
use crate::tree::{Branch, IndexTree, TreeNode};

/// Content type the snapshot is tagged with when persisted.
pub const SNAPSHOT_CONTENT_TYPE: &str = "application/json";

/// Deepest tree a snapshot may hold, in key segments.
///
/// Each segment nests one JSON object, and `serde_json` refuses input nested
/// more than 128 levels, so anything deeper would encode but never decode.
pub const MAX_DEPTH: usize = 100;

impl Serialize for TreeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TreeNode::Leaf(ts) => serializer.serialize_str(ts),
            TreeNode::Branch(children) => serialize_branch(children, serializer),
        }
    }
}

impl Serialize for IndexTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_branch(self.root(), serializer)
    }
}

fn serialize_branch<S: Serializer>(children: &Branch, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(children.len()))?;
    for (name, node) in children {
        map.serialize_entry(name, node)?;
    }
    map.end()
}

struct BranchVisitor;

impl<'de> Visitor<'de> for BranchVisitor {
    type Value = Branch;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping of segment names to subtrees or timestamps")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Branch, A::Error> {
        let mut children = Branch::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(name) = access.next_key::<String>()? {
            if children.contains_key(&name) {
                return Err(de::Error::custom(format!("duplicate segment name {name:?}")));
            }
            let node = access.next_value::<TreeNode>()?;
            children.insert(name, node);
        }
        Ok(children)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = TreeNode;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a timestamp string or a nested mapping")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<TreeNode, E> {
        Ok(TreeNode::Leaf(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<TreeNode, E> {
        Ok(TreeNode::Leaf(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<TreeNode, A::Error> {
        BranchVisitor.visit_map(access).map(TreeNode::Branch)
    }
}

impl<'de> Deserialize<'de> for TreeNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

impl<'de> Deserialize<'de> for IndexTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(BranchVisitor).map(IndexTree::from_root)
    }
}

/// Encode a tree as pretty-printed JSON (two-space indent).
///
/// Fails with [`IndexError::Serialization`] for a tree deeper than
/// [`MAX_DEPTH`], so an undecodable snapshot is never produced.
pub fn encode(tree: &IndexTree) -> IndexResult<Vec<u8>> {
    let depth = tree.depth();
    if depth > MAX_DEPTH {
        return Err(IndexError::Serialization(format!(
            "tree is {depth} segments deep, at most {MAX_DEPTH} can be decoded"
        )));
    }
    serde_json::to_vec_pretty(tree).map_err(|e| IndexError::Serialization(e.to_string()))
}

/// Decode a snapshot read from `key`.
pub fn decode(key: &str, bytes: &[u8]) -> IndexResult<IndexTree> {
    serde_json::from_slice(bytes).map_err(|e| IndexError::SnapshotCorrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
