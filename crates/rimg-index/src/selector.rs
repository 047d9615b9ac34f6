//! Scope resolution, flattening and uniform random selection.
//!
//! A scope is a category path such as `dogs` or `cats/orange`. Selection
//! descends to the scope node first and only walks that subtree, so a deep
//! scope never pays for flattening the whole tree.

use indexmap::map::Iter;
use rand::Rng;
use rimg_store::KEY_SEPARATOR;

use crate::error::{IndexError, IndexResult};
use crate::tree::{IndexTree, TreeNode};

/// A picked leaf: its full key and rendered upload time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub key: String,
    pub uploaded: String,
}

/// Depth-first, insertion-ordered iterator over `(key, timestamp)` leaves.
#[derive(Clone)]
pub struct Leaves<'a> {
    // `None` prefix marks the root, so a leading empty segment still
    // rejoins as `/name`.
    stack: Vec<(Option<String>, Iter<'a, String, TreeNode>)>,
    single: Option<(String, &'a str)>,
}

fn join(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        None => name.to_string(),
        Some(p) => format!("{p}{KEY_SEPARATOR}{name}"),
    }
}

impl<'a> Iterator for Leaves<'a> {
    type Item = (String, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(leaf) = self.single.take() {
            return Some(leaf);
        }
        loop {
            let (prefix, iter) = self.stack.last_mut()?;
            match iter.next() {
                None => {
                    self.stack.pop();
                }
                Some((name, TreeNode::Leaf(ts))) => {
                    return Some((join(prefix.as_deref(), name), ts.as_str()));
                }
                Some((name, TreeNode::Branch(children))) => {
                    let path = join(prefix.as_deref(), name);
                    self.stack.push((Some(path), children.iter()));
                }
            }
        }
    }
}

/// Split a scope into segments; `None`, `""` and `"/"` all mean the whole tree.
fn scope_segments(scope: Option<&str>) -> Option<Vec<&str>> {
    let trimmed = scope?.trim_matches(KEY_SEPARATOR);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.split(KEY_SEPARATOR).collect())
    }
}

fn scope_label(scope: Option<&str>) -> String {
    scope.unwrap_or("").to_string()
}

/// Leaves under `scope`, without materializing them.
///
/// Fails with [`IndexError::NoMatch`] when the scope names no node. A scope
/// that names a leaf yields exactly that leaf.
pub fn leaves<'a>(tree: &'a IndexTree, scope: Option<&str>) -> IndexResult<Leaves<'a>> {
    let Some(segments) = scope_segments(scope) else {
        return Ok(Leaves {
            stack: vec![(None, tree.root().iter())],
            single: None,
        });
    };
    let path = segments.join("/");
    match tree.node_at(segments.iter().copied()) {
        Some(TreeNode::Branch(children)) => Ok(Leaves {
            stack: vec![(Some(path), children.iter())],
            single: None,
        }),
        Some(TreeNode::Leaf(ts)) => Ok(Leaves {
            stack: Vec::new(),
            single: Some((path, ts.as_str())),
        }),
        None => Err(IndexError::NoMatch(scope_label(scope))),
    }
}

/// Every leaf key under `scope`, in depth-first insertion order.
pub fn flatten(tree: &IndexTree, scope: Option<&str>) -> IndexResult<Vec<String>> {
    Ok(leaves(tree, scope)?.map(|(key, _)| key).collect())
}

/// Pick one leaf under `scope` uniformly at random.
///
/// Counts the candidates, draws an index in `[0, count)` and walks to it, so
/// every leaf has probability `1 / count` regardless of depth or position.
pub fn pick<R: Rng + ?Sized>(
    tree: &IndexTree,
    scope: Option<&str>,
    rng: &mut R,
) -> IndexResult<Selection> {
    let candidates = leaves(tree, scope)?;
    let count = candidates.clone().count();
    if count == 0 {
        return Err(IndexError::NoMatch(scope_label(scope)));
    }
    let index = rng.gen_range(0..count);
    let (key, uploaded) = candidates
        .into_iter()
        .nth(index)
        .ok_or_else(|| IndexError::NoMatch(scope_label(scope)))?;
    Ok(Selection {
        key,
        uploaded: uploaded.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::tree::Branch;

    fn pets() -> IndexTree {
        let mut tree = IndexTree::new();
        tree.insert("cats/orange.jpg", "t1").unwrap();
        tree.insert("dogs/a.jpg", "t2").unwrap();
        tree.insert("dogs/b.jpg", "t3").unwrap();
        tree
    }

    #[test]
    fn flatten_whole_tree_in_insertion_order() {
        let mut tree = pets();
        tree.insert("cats/deep/x/y.png", "t4").unwrap();
        tree.insert("root.gif", "t5").unwrap();
        assert_eq!(
            flatten(&tree, None).unwrap(),
            vec![
                "cats/orange.jpg",
                "cats/deep/x/y.png",
                "dogs/a.jpg",
                "dogs/b.jpg",
                "root.gif"
            ]
        );
    }

    #[test]
    fn flatten_scoped_subtree_only() {
        let tree = pets();
        assert_eq!(flatten(&tree, Some("dogs")).unwrap(), vec!["dogs/a.jpg", "dogs/b.jpg"]);
        assert_eq!(flatten(&tree, Some("/dogs/")).unwrap(), vec!["dogs/a.jpg", "dogs/b.jpg"]);
        assert_eq!(flatten(&tree, Some("")).unwrap().len(), 3);
    }

    #[test]
    fn scope_naming_a_leaf_yields_it() {
        let tree = pets();
        assert_eq!(flatten(&tree, Some("dogs/a.jpg")).unwrap(), vec!["dogs/a.jpg"]);
    }

    #[test]
    fn scope_is_segment_wise_not_string_prefix() {
        let mut tree = pets();
        tree.insert("dogsled/z.jpg", "t").unwrap();
        assert_eq!(flatten(&tree, Some("dogs")).unwrap().len(), 2);
    }

    #[test]
    fn leading_empty_segment_rejoins_exactly() {
        let mut tree = IndexTree::new();
        tree.insert("/lead.jpg", "t").unwrap();
        tree.insert("a//b.jpg", "t").unwrap();
        assert_eq!(flatten(&tree, None).unwrap(), vec!["/lead.jpg", "a//b.jpg"]);
    }

    #[test]
    fn unknown_scope_is_no_match() {
        let tree = pets();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(pick(&tree, Some("birds"), &mut rng), Err(IndexError::NoMatch(s)) if s == "birds"));
        assert!(matches!(flatten(&tree, Some("cats/orange.jpg/x")), Err(IndexError::NoMatch(_))));
    }

    #[test]
    fn empty_category_is_no_match() {
        let mut root = Branch::new();
        root.insert("empty".into(), TreeNode::Branch(Branch::new()));
        let tree = IndexTree::from_root(root);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(pick(&tree, Some("empty"), &mut rng), Err(IndexError::NoMatch(_))));
        assert!(matches!(pick(&tree, None, &mut rng), Err(IndexError::NoMatch(_))));
        assert!(flatten(&tree, Some("empty")).unwrap().is_empty());
    }

    #[test]
    fn empty_tree_is_no_match() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(pick(&IndexTree::new(), None, &mut rng), Err(IndexError::NoMatch(_))));
    }

    #[test]
    fn scoped_pick_stays_in_scope() {
        let tree = pets();
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = BTreeSet::new();
        for _ in 0..200 {
            let sel = pick(&tree, Some("dogs"), &mut rng).unwrap();
            assert!(sel.key == "dogs/a.jpg" || sel.key == "dogs/b.jpg");
            seen.insert(sel.key);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn pick_carries_timestamp() {
        let tree = pets();
        let mut rng = StdRng::seed_from_u64(3);
        let sel = pick(&tree, Some("cats"), &mut rng).unwrap();
        assert_eq!(sel, Selection { key: "cats/orange.jpg".into(), uploaded: "t1".into() });
    }

    #[test]
    fn pick_is_uniform_regardless_of_depth() {
        // One shallow leaf and two deep ones: a per-level draw would favour `a`.
        let mut tree = IndexTree::new();
        tree.insert("a.jpg", "t").unwrap();
        tree.insert("x/y/z/b.jpg", "t").unwrap();
        tree.insert("x/y/z/c.jpg", "t").unwrap();

        let trials = 30_000;
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..trials {
            *counts.entry(pick(&tree, None, &mut rng).unwrap().key).or_default() += 1;
        }
        assert_eq!(counts.len(), 3);
        for (key, n) in counts {
            let freq = n as f64 / trials as f64;
            assert!((freq - 1.0 / 3.0).abs() < 0.02, "{key} drawn with frequency {freq}");
        }
    }
}
