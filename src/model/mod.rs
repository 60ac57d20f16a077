//! Data model for rooted phylogenetic trees with binary tip observations.
//!
//! # Tree representation
//! Trees are represented by [PhyloTree], which uses the arena pattern to store
//! [Vertex] nodes. Each vertex is either a `Root`, `Internal`, or `Tip`,
//! referenced by [VertexIndex]. Tips are numbered first and the root last,
//! which is the numbering the pruning computation expects.
//!
//! # Observations
//! [TipObservations] pair tip labels with a [TraitState] each; they are
//! permuted into tip order through the tree's [LeafLabelMap].

pub mod leaf_label_map;
pub mod observations;
pub mod tree;
pub mod vertex;

pub use leaf_label_map::LabelIndex;
pub use leaf_label_map::LeafLabelMap;
pub use observations::{TipObservations, TraitState};
pub use tree::PhyloTree;
pub use tree::VertexIndex;
pub use vertex::{BranchLength, Vertex};
