//! Tip label module for phylogenetic tree representation.
//!
//! - `LeafLabelMap`: Lookup from tip labels to tip indices, fixing the tip
//!   numbering that observations get aligned to.

use std::collections::HashMap;

/// Index of a tip label in a [LeafLabelMap].
pub type LabelIndex = usize;

// =#========================================================================#=
// LEAF LABEL MAP
// =#========================================================================#=
/// Maps tip labels to consecutive indices, in insertion order.
///
/// Inserting the same label twice returns the same index, so a map that holds
/// fewer labels than insertions have been made reveals duplicates. Since tips of a
/// [PhyloTree](crate::model::PhyloTree) get their labels inserted in the order
/// they are added, the label index of a tip coincides with its vertex index.
///
/// # Example
/// ```
/// use binpoisson::model::LeafLabelMap;
///
/// let mut labels = LeafLabelMap::new(3);
///
/// let idx_a = labels.get_or_insert("A");  // idx_a = 0
/// labels.get_or_insert("B");              // 1
/// let idx_a2 = labels.get_or_insert("A"); // idx_a2 = 0 (deduplicated)
///
/// assert_eq!(idx_a, idx_a2);
/// assert_eq!(labels.num_labels(), 2);
/// assert_eq!(labels.get_index("B"), Some(1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LeafLabelMap {
    map: HashMap<String, LabelIndex>,
}

impl LeafLabelMap {
    /// Creates an empty map with room for `num_tips` labels.
    pub fn new(num_tips: usize) -> Self {
        LeafLabelMap {
            map: HashMap::with_capacity(num_tips),
        }
    }

    /// Gets the index for a label, inserting it with the next free index if
    /// it is not known yet.
    pub fn get_or_insert(&mut self, label: &str) -> LabelIndex {
        if let Some(&index) = self.map.get(label) {
            return index;
        }
        let index = self.map.len();
        self.map.insert(label.to_string(), index);
        index
    }

    /// Retrieves the index for a given label, or `None` if unknown.
    pub fn get_index(&self, label: &str) -> Option<LabelIndex> {
        self.map.get(label).copied()
    }

    /// Returns the number of distinct labels.
    pub fn num_labels(&self) -> usize {
        self.map.len()
    }
}
