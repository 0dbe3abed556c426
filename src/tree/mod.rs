//! Generic hierarchical index shared by the menu and category trees.
//!
//! Nodes are loaded into a flat arena and addressed by position; adjacency is
//! kept as index vectors so no node ever holds a reference to another node.
//!
//! - `build` validates the parent chain (no orphans, no cycles) and fails
//!   closed: a malformed node set never yields a partial tree.
//! - Siblings are ordered by `sort_order` ascending, then by id.
//! - `prune` keeps a node if it passes the predicate or if any of its
//!   descendants survives, so paths to visible leaves stay connected.

mod cache;

pub use cache::TreeCache;

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// A node of a self-referencing tree (menu, category).
pub trait TreeNode {
    type Id: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display;

    fn id(&self) -> Self::Id;
    fn parent_id(&self) -> Option<Self::Id>;
    fn sort_order(&self) -> i64;
    /// The node's own enable flag, without regard to its ancestors.
    fn is_enabled(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("duplicate node id {0}")]
    DuplicateId(String),
    #[error("node {id} references missing parent {parent}")]
    Orphan { id: String, parent: String },
    #[error("cycle detected through node {0}")]
    Cycle(String),
    #[error("node {0} not found")]
    NotFound(String),
    #[error("node {id} still has {count} child node(s)")]
    HasChildren { id: String, count: usize },
}

#[derive(Debug, Clone)]
pub struct TreeIndex<N: TreeNode> {
    nodes: Vec<N>,
    positions: HashMap<N::Id, usize>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl<N: TreeNode> TreeIndex<N> {
    /// Validates the node set and builds the ordered adjacency.
    pub fn build(nodes: Vec<N>) -> Result<Self, TreeError> {
        let mut positions = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            if positions.insert(node.id(), idx).is_some() {
                return Err(TreeError::DuplicateId(node.id().to_string()));
            }
        }

        let mut parents = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let parent = match node.parent_id() {
                None => None,
                Some(parent_id) if parent_id == node.id() => {
                    return Err(TreeError::Cycle(node.id().to_string()));
                }
                Some(parent_id) => match positions.get(&parent_id) {
                    Some(&pos) => Some(pos),
                    None => {
                        return Err(TreeError::Orphan {
                            id: node.id().to_string(),
                            parent: parent_id.to_string(),
                        })
                    }
                },
            };
            parents.push(parent);
        }

        detect_cycle(&parents).map_err(|idx| TreeError::Cycle(nodes[idx].id().to_string()))?;

        Ok(Self::assemble(nodes, parents))
    }

    /// Builds adjacency for a node set whose parent links are already known to be valid.
    fn assemble(nodes: Vec<N>, parents: Vec<Option<usize>>) -> Self {
        let positions = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id(), idx))
            .collect();

        let mut children = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();
        for (idx, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(idx),
                None => roots.push(idx),
            }
        }

        let order = |a: &usize, b: &usize| {
            let (na, nb) = (&nodes[*a], &nodes[*b]);
            na.sort_order()
                .cmp(&nb.sort_order())
                .then_with(|| na.id().cmp(&nb.id()))
        };
        roots.sort_by(order);
        for list in &mut children {
            list.sort_by(order);
        }

        Self {
            nodes,
            positions,
            parents,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: N::Id) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn get(&self, id: N::Id) -> Option<&N> {
        self.positions.get(&id).map(|&idx| &self.nodes[idx])
    }

    fn position(&self, id: N::Id) -> Result<usize, TreeError> {
        self.positions
            .get(&id)
            .copied()
            .ok_or_else(|| TreeError::NotFound(id.to_string()))
    }

    pub fn roots(&self) -> Vec<&N> {
        self.roots.iter().map(|&idx| &self.nodes[idx]).collect()
    }

    pub fn children(&self, id: N::Id) -> Result<Vec<&N>, TreeError> {
        let idx = self.position(id)?;
        Ok(self.children[idx].iter().map(|&c| &self.nodes[c]).collect())
    }

    /// True when the node exists and has no children.
    pub fn is_leaf(&self, id: N::Id) -> bool {
        self.positions
            .get(&id)
            .map(|&idx| self.children[idx].is_empty())
            .unwrap_or(false)
    }

    /// Depth-first, pre-order traversal of the subtree rooted at `id` (inclusive).
    pub fn subtree(&self, id: N::Id) -> Result<Vec<&N>, TreeError> {
        let idx = self.position(id)?;
        Ok(self.preorder_from(&[idx]).into_iter().map(|i| &self.nodes[i]).collect())
    }

    /// Pre-order traversal of the whole forest, roots in sibling order.
    pub fn walk(&self) -> Vec<&N> {
        self.preorder_from(&self.roots)
            .into_iter()
            .map(|i| &self.nodes[i])
            .collect()
    }

    fn preorder_from(&self, starts: &[usize]) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = starts.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            out.push(idx);
            stack.extend(self.children[idx].iter().rev());
        }
        out
    }

    /// Root-to-node chain ending with `id` itself.
    pub fn path_to(&self, id: N::Id) -> Result<Vec<&N>, TreeError> {
        let mut idx = self.position(id)?;
        let mut path = vec![&self.nodes[idx]];
        while let Some(parent) = self.parents[idx] {
            path.push(&self.nodes[parent]);
            idx = parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Fails with `HasChildren` when removing `id` would orphan other nodes.
    pub fn ensure_leaf(&self, id: N::Id) -> Result<(), TreeError> {
        let idx = self.position(id)?;
        match self.children[idx].len() {
            0 => Ok(()),
            count => Err(TreeError::HasChildren {
                id: id.to_string(),
                count,
            }),
        }
    }

    /// Folds the forest bottom-up into a nested representation.
    pub fn fold_nested<T>(&self, f: &impl Fn(&N, Vec<T>) -> T) -> Vec<T> {
        self.roots.iter().map(|&idx| self.fold_node(idx, f)).collect()
    }

    fn fold_node<T>(&self, idx: usize, f: &impl Fn(&N, Vec<T>) -> T) -> T {
        let children = self.children[idx]
            .iter()
            .map(|&c| self.fold_node(c, f))
            .collect();
        f(&self.nodes[idx], children)
    }
}

impl<N: TreeNode + Clone> TreeIndex<N> {
    /// Removes every node for which `keep` is false and which has no surviving
    /// descendant. Sibling order is preserved.
    pub fn prune(&self, keep: impl Fn(&N) -> bool) -> Self {
        let mut survives = vec![false; self.nodes.len()];
        // Reverse pre-order visits every child before its parent.
        for idx in self.preorder_from(&self.roots).into_iter().rev() {
            survives[idx] =
                keep(&self.nodes[idx]) || self.children[idx].iter().any(|&c| survives[c]);
        }
        self.retain_marked(&survives)
    }

    /// Drops every node whose own flag or any ancestor's flag is off.
    pub fn retain_enabled(&self) -> Self {
        let mut active = vec![false; self.nodes.len()];
        // Pre-order visits every parent before its children.
        for idx in self.preorder_from(&self.roots) {
            let parent_active = self.parents[idx].map(|p| active[p]).unwrap_or(true);
            active[idx] = parent_active && self.nodes[idx].is_enabled();
        }
        self.retain_marked(&active)
    }

    /// Effective enable state: the node and all of its ancestors are enabled.
    pub fn is_effectively_enabled(&self, id: N::Id) -> bool {
        match self.path_to(id) {
            Ok(path) => path.iter().all(|node| node.is_enabled()),
            Err(_) => false,
        }
    }

    /// Copies out the marked nodes. Every marked node's parent must be marked.
    fn retain_marked(&self, marked: &[bool]) -> Self {
        let mut remap = vec![None; self.nodes.len()];
        let mut nodes = Vec::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            if marked[idx] {
                remap[idx] = Some(nodes.len());
                nodes.push(node.clone());
            }
        }

        let parents = self
            .parents
            .iter()
            .enumerate()
            .filter(|(idx, _)| marked[*idx])
            .map(|(_, parent)| parent.and_then(|p| remap[p]))
            .collect();

        Self::assemble(nodes, parents)
    }
}

/// Walks every parent chain; returns the index of a node on a cycle if one exists.
fn detect_cycle(parents: &[Option<usize>]) -> Result<(), usize> {
    const UNSEEN: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNSEEN; parents.len()];
    let mut path = Vec::new();

    for start in 0..parents.len() {
        let mut cursor = Some(start);
        while let Some(idx) = cursor {
            match state[idx] {
                DONE => break,
                ON_PATH => return Err(idx),
                _ => {
                    state[idx] = ON_PATH;
                    path.push(idx);
                    cursor = parents[idx];
                }
            }
        }
        for idx in path.drain(..) {
            state[idx] = DONE;
        }
    }

    Ok(())
}
