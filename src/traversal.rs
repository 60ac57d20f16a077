//! Traversal contract between tree topologies and per-node computations.
//!
//! The pruning computation never walks a tree by itself. Instead:
//! * a [Topology] describes what is known about the tree (tips, children,
//!   branch lengths, root),
//! * a [TraversalSpecification] supplies the per-node behaviour
//!   (`init_node`, `visit_node`, `prune_node`),
//! * a driver such as [PostOrderTraversal] calls the specification in an
//!   order where every node is finalized before it is pruned into its parent.
//!
//! Any external tree type can take part by implementing [Topology];
//! [PhyloTree](crate::model::PhyloTree) is the implementation shipped with this crate.
//!
//! # Driver contract
//! ```text
//! init_node(v)          for every vertex v
//! for v in post-order:
//!     visit_node(v)
//!     prune_node(v, parent(v))   unless v is the root
//! ```
//! Siblings may be pruned in any order, and disjoint subtrees may be handled
//! by different threads, since [TraversalSpecification] methods only take `&self`.

use crate::error::Result;
use crate::model::LeafLabelMap;
use tracing::debug;

/// Index of a node as seen by a traversal.
///
/// Nodes are numbered densely in `[0, num_nodes)`, tips occupying `[0, num_tips)`.
pub type NodeIndex = usize;

// =#========================================================================#=
// TOPOLOGY (trait)
// =#========================================================================#=
/// Read-only view of a rooted tree, as needed by a traversal.
pub trait Topology {
    /// Number of tips; tips are the nodes `[0, num_tips)`.
    fn num_tips(&self) -> usize;

    /// Number of nodes, including tips and the root.
    fn num_nodes(&self) -> usize;

    /// Index of the root.
    ///
    /// Only meaningful if [has_root](Topology::has_root) holds; traversals
    /// over a tree without root panic.
    fn root(&self) -> NodeIndex;

    /// Children of `node`; empty for tips.
    fn children(&self, node: NodeIndex) -> &[NodeIndex];

    /// Parent of `node`, or `None` for the root.
    fn parent(&self, node: NodeIndex) -> Option<NodeIndex>;

    /// Length of the branch above `node` (`0.0` for the root).
    fn branch_length(&self, node: NodeIndex) -> f64;

    /// Returns `true` if the root refers to an existing node.
    fn has_root(&self) -> bool {
        self.root() < self.num_nodes()
    }

    /// Returns `true` if `node` is a tip.
    fn is_tip(&self, node: NodeIndex) -> bool {
        node < self.num_tips()
    }

    /// Returns an iterator over the nodes in post-order (children before parents).
    fn post_order_iter(&self) -> PostOrderIter<'_, Self>
    where
        Self: Sized,
    {
        PostOrderIter::new(self)
    }
}

/// A [Topology] whose tips carry labels, fixing the tip numbering that
/// labelled observations are aligned to.
pub trait LabelledTips: Topology {
    /// Tip labels; the label with index `i` belongs to tip `i`.
    fn tip_labels(&self) -> &LeafLabelMap;
}

// =#========================================================================#=
// TRAVERSAL SPECIFICATION (trait)
// =#========================================================================#=
/// Per-node behaviour plugged into a traversal driver.
///
/// # Implementing this trait
/// The driver guarantees that `prune_node(child, parent)` is only called after
/// all of `child`'s own children were pruned into it. No guarantee is given
/// about the order of siblings.
pub trait TraversalSpecification {
    /// Sets up the state of `node` before any pruning touches it.
    fn init_node(&self, node: NodeIndex);

    /// Called once per node, after all its children were pruned into it.
    fn visit_node(&self, _node: NodeIndex) {}

    /// Combines the finalized state of `child` into the state of `parent`.
    fn prune_node(&self, child: NodeIndex, parent: NodeIndex) -> Result<()>;
}

// =#========================================================================#=
// DRIVER
// =#========================================================================#=
/// Sequential post-order driver for a [TraversalSpecification].
#[derive(Debug, Clone, Copy)]
pub struct PostOrderTraversal<'a, T: Topology> {
    tree: &'a T,
}

impl<'a, T: Topology> PostOrderTraversal<'a, T> {
    /// Creates a driver over the given tree.
    pub fn new(tree: &'a T) -> Self {
        PostOrderTraversal { tree }
    }

    /// Runs a full pass of `spec` over the tree.
    ///
    /// Stops at (and returns) the first error raised by `spec`.
    pub fn traverse<S: TraversalSpecification>(&self, spec: &S) -> Result<()> {
        debug!(
            num_nodes = self.tree.num_nodes(),
            num_tips = self.tree.num_tips(),
            "post-order traversal started"
        );

        for node in 0..self.tree.num_nodes() {
            spec.init_node(node);
        }

        for node in self.tree.post_order_iter() {
            spec.visit_node(node);
            if let Some(parent) = self.tree.parent(node) {
                spec.prune_node(node, parent)?;
            }
        }

        debug!("post-order traversal finished");
        Ok(())
    }
}

// =#========================================================================#=
// ITERATOR
// =#========================================================================#=
/// Iterator for post-order traversal (children before parents).
///
/// This iterator uses a stack-based approach to traverse the tree without recursion.
/// Each node is visited after all its descendants have been visited.
pub struct PostOrderIter<'a, T: Topology> {
    tree: &'a T,
    stack: Vec<(NodeIndex, bool)>, // (index, children_visited)
}

impl<'a, T: Topology> PostOrderIter<'a, T> {
    fn new(tree: &'a T) -> Self {
        let mut stack = Vec::new();
        if tree.num_nodes() > 0 {
            stack.push((tree.root(), false));
        }
        PostOrderIter { tree, stack }
    }
}

impl<'a, T: Topology> Iterator for PostOrderIter<'a, T> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((index, children_visited)) = self.stack.pop() {
            let children = self.tree.children(index);

            if children_visited || children.is_empty() {
                return Some(index);
            } else {
                self.stack.push((index, true));

                // Push in reverse, so first child is processed first
                for &child in children.iter().rev() {
                    self.stack.push((child, false));
                }
            }
        }
        None
    }
}
