//! Tree module for rooted phylogenetic tree representation.
//!
//! This module provides the tree structure consumed by the pruning computation:
//! - [PhyloTree]: rooted tree using the arena pattern, tips numbered first and root last.
//! - [VertexIndex] is used to index vertices.

use crate::error::{PruningError, Result};
use crate::model::leaf_label_map::LeafLabelMap;
use crate::model::vertex::{BranchLength, Vertex};
use crate::traversal::{LabelledTips, NodeIndex, Topology};

/// Index of a vertex in a tree (arena).
pub type VertexIndex = usize;

/// *During construction only*, index for unset root.
const NO_ROOT_SET_INDEX: VertexIndex = usize::MAX;

// =#========================================================================#=
// TREE
// =#========================================================================#=
/// A rooted phylogenetic tree represented using the arena pattern on [Vertex].
///
/// Vertices are stored in a contiguous vector and referenced by [VertexIndex].
///
/// # Structure
/// - Tips occupy the indices `[0, num_tips)`, internal vertices follow and the
///   root is the last vertex; every child has a smaller index than its parent.
/// - Vertices may have any positive number of children.
/// - Every non-root vertex has a non-negative [BranchLength].
/// - Tips carry a label, stored in the tree's own [LeafLabelMap];
///   the label index of a tip equals its vertex index.
///
/// # Construction
/// Add all tips first, then internal vertices bottom-up, then the root.
/// Test validity with [PhyloTree::validate].
///
/// # Example
/// ```
/// use binpoisson::model::{BranchLength, PhyloTree};
/// use binpoisson::traversal::Topology;
///
/// // Create a tree: ((A:0.2,B:0.2):0.2,C:0.4);
/// let mut tree = PhyloTree::new(3);
/// let a = tree.add_tip("A", BranchLength::new(0.2));
/// let b = tree.add_tip("B", BranchLength::new(0.2));
/// let c = tree.add_tip("C", BranchLength::new(0.4));
/// let ab = tree.add_internal_vertex(vec![a, b], BranchLength::new(0.2));
/// tree.add_root(vec![ab, c]);
///
/// assert!(tree.validate().is_ok());
/// assert_eq!(tree.num_nodes(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct PhyloTree {
    /// Number of tips the tree was created for
    num_tips_init: usize,

    /// Vertices of this tree (arena pattern)
    vertices: Vec<Vertex>,

    /// Index of the root of this tree
    root_index: VertexIndex,

    /// Labels of the tips, in tip order
    labels: LeafLabelMap,
}

// ============================================================================
// New, Getters / Accessors, etc. (pub)
// ============================================================================
impl PhyloTree {
    /// Creates a new tree expected to hold `num_tips` tips.
    ///
    /// # Arguments
    /// `num_tips` - number of tips of the new tree; must be positive
    pub fn new(num_tips: usize) -> Self {
        assert!(num_tips > 0);
        PhyloTree {
            num_tips_init: num_tips,
            vertices: Vec::with_capacity(2 * num_tips - 1),
            root_index: NO_ROOT_SET_INDEX,
            labels: LeafLabelMap::new(num_tips),
        }
    }

    /// Adds a tip to the tree, assigning a unique index, which gets returned.
    ///
    /// # Panics
    /// Panics if an internal vertex or the root was already added, or if
    /// all `num_tips` tips exist already.
    pub fn add_tip(&mut self, label: &str, branch_length: BranchLength) -> VertexIndex {
        let index = self.vertices.len();
        assert!(
            index < self.num_tips_init,
            "Tips must be added before any other vertex (at most {} tips)",
            self.num_tips_init
        );

        // Duplicate labels share an index and are reported by `validate`
        self.labels.get_or_insert(label);
        self.vertices.push(Vertex::new_tip(index, branch_length));
        index
    }

    /// Adds an internal vertex above the given children, assigning a unique
    /// index, which gets returned.
    ///
    /// # Panics
    /// Panics if not all tips were added yet, the root is already set,
    /// `children` is empty, or a child index does not exist yet.
    pub fn add_internal_vertex(
        &mut self,
        children: Vec<VertexIndex>,
        branch_length: BranchLength,
    ) -> VertexIndex {
        let index = self.next_non_tip_index(&children);
        self.link_children(index, &children);
        self.vertices
            .push(Vertex::new_internal(index, children, branch_length));
        index
    }

    /// Adds the root above the given children, completing the tree.
    ///
    /// # Panics
    /// Same conditions as [PhyloTree::add_internal_vertex].
    pub fn add_root(&mut self, children: Vec<VertexIndex>) -> VertexIndex {
        let index = self.next_non_tip_index(&children);
        self.link_children(index, &children);
        self.vertices.push(Vertex::new_root(index, children));
        self.root_index = index;
        index
    }

    /// Validates the tree structure and all index references.
    ///
    /// Checks:
    /// - Root is set, is the last vertex and points to a Root vertex
    /// - All vertex indices match their position in the arena
    /// - Exactly `num_tips` tips, all with distinct labels
    /// - All children point back to their parent and all non-root vertices
    ///   have a parent listing them as child
    ///
    /// # Errors
    /// A [Precondition](PruningError::Precondition) error describing the first
    /// violation found, or [Shape](PruningError::Shape) if tips are missing.
    pub fn validate(&self) -> Result<()> {
        if !self.is_root_set() {
            return Err(PruningError::precondition("tree has no root"));
        }
        if self.root_index + 1 != self.vertices.len() || !self.vertices[self.root_index].is_root() {
            return Err(PruningError::precondition("root must be the last vertex"));
        }
        let num_tips = self.count_tips();
        if num_tips != self.num_tips_init {
            return Err(PruningError::shape_mismatch("tips of tree", self.num_tips_init, num_tips));
        }
        if self.labels.num_labels() != self.num_tips_init {
            return Err(PruningError::precondition("tip labels must be unique"));
        }

        for (index, vertex) in self.vertices.iter().enumerate() {
            if vertex.index() != index {
                return Err(PruningError::precondition(format!(
                    "vertex at position {index} claims index {}",
                    vertex.index()
                )));
            }

            for &child in vertex.children() {
                if self.vertices[child].parent_index() != Some(index) {
                    return Err(PruningError::precondition(format!(
                        "child {child} does not point back to parent {index}"
                    )));
                }
            }

            if !vertex.is_root() {
                match vertex.parent_index() {
                    Some(parent) if self.vertices[parent].children().contains(&index) => {}
                    _ => {
                        return Err(PruningError::precondition(format!(
                            "vertex {index} is not attached to the tree"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Construction helpers (private)
// ============================================================================
impl PhyloTree {
    fn is_root_set(&self) -> bool {
        self.root_index != NO_ROOT_SET_INDEX
    }

    fn count_tips(&self) -> usize {
        self.vertices.iter().filter(|&v| v.is_tip()).count()
    }

    fn next_non_tip_index(&self, children: &[VertexIndex]) -> VertexIndex {
        let index = self.vertices.len();
        assert!(
            index >= self.num_tips_init,
            "All {} tips must be added before internal vertices",
            self.num_tips_init
        );
        assert!(!self.is_root_set(), "Cannot add vertices after the root");
        assert!(!children.is_empty(), "Non-tip vertex needs at least one child");
        assert!(
            children.iter().all(|&c| c < index),
            "Children must be added before their parent"
        );
        index
    }

    fn link_children(&mut self, parent: VertexIndex, children: &[VertexIndex]) {
        for &child in children {
            self.vertices[child].set_parent(parent);
        }
    }
}

impl std::ops::Index<VertexIndex> for PhyloTree {
    type Output = Vertex;

    fn index(&self, index: VertexIndex) -> &Self::Output {
        &self.vertices[index]
    }
}

// ============================================================================
// Topology (pub)
// ============================================================================
impl Topology for PhyloTree {
    fn num_tips(&self) -> usize {
        self.num_tips_init
    }

    fn num_nodes(&self) -> usize {
        self.vertices.len()
    }

    fn root(&self) -> NodeIndex {
        self.root_index
    }

    fn children(&self, node: NodeIndex) -> &[NodeIndex] {
        self[node].children()
    }

    fn parent(&self, node: NodeIndex) -> Option<NodeIndex> {
        self[node].parent_index()
    }

    fn branch_length(&self, node: NodeIndex) -> f64 {
        self[node].branch_length().map_or(0.0, |bl| *bl)
    }

    fn is_tip(&self, node: NodeIndex) -> bool {
        self[node].is_tip()
    }
}

impl LabelledTips for PhyloTree {
    fn tip_labels(&self) -> &LeafLabelMap {
        &self.labels
    }
}
