//! Vertex module for rooted phylogenetic tree representation.

use crate::error::{PruningError, Result};
use crate::model::tree::VertexIndex;
use std::ops::Deref;

/// During construction, Internal and Tip vertex might not have parent set yet.
const NO_PARENT_SET: VertexIndex = usize::MAX;

// =#========================================================================#=
// VERTEX
// =#========================================================================#=
/// Represents a vertex (node) in a rooted phylogenetic tree.
///
/// A vertex can be either:
/// - **Root**: Has at least one child, no parent and no branch_length
/// - **Internal**: Has at least one child, a parent and a branch_length
/// - **Tip**: Has no children, a parent and a branch_length
///
/// Unlike strictly binary trees, internal vertices may have any positive
/// number of children (e.g. star trees or unresolved polytomies).
///
/// # Invariants
/// - `index` is index in arena
/// - `branch_length` is non-negative (enforced by [BranchLength])
/// - Internal vertices and tips have `parent` set to the [VertexIndex] of their
///   parent in the arena; `NO_PARENT_SET = usize::MAX` only during construction
/// - A tip's label is found in the tree's [LeafLabelMap](crate::model::LeafLabelMap)
///   under the tip's own index
#[derive(PartialEq, Debug, Clone)]
pub enum Vertex {
    /// Root vertex of the tree (has no parent, has children)
    Root {
        /// Index of this vertex in the tree arena
        index: VertexIndex,
        /// Indices of the child vertices
        children: Vec<VertexIndex>,
    },
    /// Internal vertex (has parent and children, no label)
    Internal {
        /// Index of this vertex in the tree arena
        index: VertexIndex,
        /// Index of the parent vertex
        parent: VertexIndex,
        /// Indices of the child vertices
        children: Vec<VertexIndex>,
        /// Distance to parent vertex
        branch_length: BranchLength,
    },
    /// Tip vertex (has parent, no children)
    Tip {
        /// Index of this vertex in the tree arena
        index: VertexIndex,
        /// Index of the parent vertex
        parent: VertexIndex,
        /// Distance to parent vertex
        branch_length: BranchLength,
    },
}

impl Vertex {
    /// Creates a new root vertex.
    ///
    /// # Arguments
    /// * `index` - The unique index of this vertex in the tree (arena)
    /// * `children` - Indices of the children
    pub fn new_root(index: VertexIndex, children: Vec<VertexIndex>) -> Self {
        Vertex::Root { index, children }
    }

    /// Creates a new internal (non-tip, non-root) vertex.
    ///
    /// # Arguments
    /// * `index` - The unique index of this vertex in the tree (arena)
    /// * `children` - Indices of the children
    /// * `branch_length` - Distance to parent vertex
    pub fn new_internal(
        index: VertexIndex,
        children: Vec<VertexIndex>,
        branch_length: BranchLength,
    ) -> Self {
        Vertex::Internal {
            index,
            parent: NO_PARENT_SET,
            children,
            branch_length,
        }
    }

    /// Creates a new tip vertex.
    ///
    /// # Arguments
    /// * `index` - The unique index of this vertex in the tree (arena)
    /// * `branch_length` - Distance to parent vertex
    pub fn new_tip(index: VertexIndex, branch_length: BranchLength) -> Self {
        Vertex::Tip {
            index,
            parent: NO_PARENT_SET,
            branch_length,
        }
    }

    /// Returns the index of this vertex.
    pub fn index(&self) -> VertexIndex {
        match self {
            Vertex::Root { index, .. } => *index,
            Vertex::Internal { index, .. } => *index,
            Vertex::Tip { index, .. } => *index,
        }
    }

    /// Returns the branch length if this is a non-root vertex, else `None`.
    pub fn branch_length(&self) -> Option<BranchLength> {
        match self {
            Vertex::Root { .. } => None,
            Vertex::Internal { branch_length, .. } => Some(*branch_length),
            Vertex::Tip { branch_length, .. } => Some(*branch_length),
        }
    }

    /// Returns `true` if this vertex is a tip.
    pub fn is_tip(&self) -> bool {
        matches!(self, Vertex::Tip { .. })
    }

    /// Returns `true` if this vertex is a root.
    pub fn is_root(&self) -> bool {
        matches!(self, Vertex::Root { .. })
    }

    /// Returns the children of this vertex; empty for tips.
    pub fn children(&self) -> &[VertexIndex] {
        match self {
            Vertex::Root { children, .. } => children,
            Vertex::Internal { children, .. } => children,
            Vertex::Tip { .. } => &[],
        }
    }

    /// Sets new parent for non-root vertex.
    ///
    /// # Panics
    /// Panics if called on root.
    pub fn set_parent(&mut self, parent: VertexIndex) {
        match self {
            Vertex::Root { .. } => panic!("Cannot set parent on root vertex"),
            Vertex::Internal { parent: p, .. } => *p = parent,
            Vertex::Tip { parent: p, .. } => *p = parent,
        }
    }

    /// Returns the index of parent if this a non-root vertex, else `None`.
    ///
    /// Note that parent might not be set yet during construction.
    pub fn parent_index(&self) -> Option<VertexIndex> {
        match self {
            Vertex::Internal { parent, .. } | Vertex::Tip { parent, .. } => {
                if *parent == NO_PARENT_SET {
                    None
                } else {
                    Some(*parent)
                }
            }
            Vertex::Root { .. } => None,
        }
    }
}

// =#========================================================================#=
// BRANCH LENGTH
// =#========================================================================#=
/// Branch length in a phylogenetic tree, enforced non-negative.
///
/// Represents the evolutionary time between a vertex and its parent.
/// The value is guaranteed to be non-negative and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct BranchLength(f64);

impl BranchLength {
    /// Creates a new branch length.
    ///
    /// # Arguments
    /// * `length` - The branch length value (must be non-negative)
    ///
    /// # Panics
    /// Panics if `length` is negative or not finite.
    /// Use [BranchLength::try_new] to handle such input gracefully.
    pub fn new(length: f64) -> Self {
        assert!(length >= 0.0, "Branch length must be non-negative, got {}", length);
        assert!(length.is_finite(), "Branch length must be finite, got {}", length);
        BranchLength(length)
    }

    /// Creates a new branch length, failing with
    /// [InvalidParameter](PruningError::InvalidParameter) if `length`
    /// is negative, NaN or infinite.
    pub fn try_new(length: f64) -> Result<Self> {
        if length.is_finite() && length >= 0.0 {
            Ok(BranchLength(length))
        } else {
            Err(PruningError::invalid_parameter(format!(
                "branch length must be non-negative and finite, got {length}"
            )))
        }
    }
}

impl Deref for BranchLength {
    type Target = f64;
    fn deref(&self) -> &f64 {
        &self.0
    }
}
