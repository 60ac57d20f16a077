//! Binary trait observations at the tips of a tree.
//!
//! - [TraitState]: the two states of the trait (0 = absent, 1 = present)
//! - [TipObservations]: tip labels paired one-to-one with observed states

use crate::error::{PruningError, Result};
use crate::model::leaf_label_map::LeafLabelMap;
use std::fmt;

// =#========================================================================#=
// TRAIT STATE
// =#========================================================================#=
/// State of a binary trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraitState {
    /// State 0
    Absent = 0,
    /// State 1
    Present = 1,
}

impl TraitState {
    /// Both states, in index order.
    pub const ALL: [TraitState; 2] = [TraitState::Absent, TraitState::Present];

    /// Returns the index of this state (0 or 1).
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for TraitState {
    type Error = PruningError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(TraitState::Absent),
            1 => Ok(TraitState::Present),
            other => Err(PruningError::invalid_parameter(format!(
                "binary trait value must be 0 or 1, got {other}"
            ))),
        }
    }
}

impl From<bool> for TraitState {
    fn from(present: bool) -> Self {
        if present {
            TraitState::Present
        } else {
            TraitState::Absent
        }
    }
}

impl fmt::Display for TraitState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

// =#========================================================================#=
// TIP OBSERVATIONS
// =#========================================================================#=
/// Observed trait states, keyed by tip label.
///
/// The order of the observations is arbitrary; [TipObservations::aligned_to]
/// permutes them into the tip numbering of a tree.
///
/// # Example
/// ```
/// use binpoisson::model::{LeafLabelMap, TipObservations, TraitState};
///
/// let observations = TipObservations::from_raw(vec!["B".into(), "A".into()], &[1, 0])?;
///
/// let mut tip_order = LeafLabelMap::new(2);
/// tip_order.get_or_insert("A");
/// tip_order.get_or_insert("B");
///
/// let states = observations.aligned_to(&tip_order)?;
/// assert_eq!(states, vec![TraitState::Absent, TraitState::Present]);
/// # Ok::<(), binpoisson::PruningError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TipObservations {
    names: Vec<String>,
    states: Vec<TraitState>,
}

impl TipObservations {
    /// Pairs tip `names` with `states`.
    ///
    /// # Errors
    /// [Shape](PruningError::Shape) if both have different lengths.
    pub fn new(names: Vec<String>, states: Vec<TraitState>) -> Result<Self> {
        if names.len() != states.len() {
            return Err(PruningError::shape_mismatch("observations", names.len(), states.len()));
        }
        Ok(TipObservations { names, states })
    }

    /// Pairs tip `names` with raw 0/1 `values`.
    ///
    /// # Errors
    /// [Shape](PruningError::Shape) on length mismatch,
    /// [InvalidParameter](PruningError::InvalidParameter) for values other than 0 and 1.
    pub fn from_raw(names: Vec<String>, values: &[u8]) -> Result<Self> {
        let states = values
            .iter()
            .map(|&v| TraitState::try_from(v))
            .collect::<Result<Vec<_>>>()?;
        Self::new(names, states)
    }

    /// Returns the number of observations.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if there are no observations.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Permutes the states into the tip order given by `tip_labels`,
    /// i.e. entry `i` of the result is the state of the tip labelled `tip_labels[i]`.
    ///
    /// # Errors
    /// [Shape](PruningError::Shape) if the number of observations differs from
    /// the number of tips, a name is not a tip label, or a tip is observed twice.
    pub fn aligned_to(&self, tip_labels: &LeafLabelMap) -> Result<Vec<TraitState>> {
        let num_tips = tip_labels.num_labels();
        if self.len() != num_tips {
            return Err(PruningError::shape_mismatch("observations", num_tips, self.len()));
        }

        let mut aligned: Vec<Option<TraitState>> = vec![None; num_tips];
        for (name, &state) in self.names.iter().zip(&self.states) {
            let tip = tip_labels.get_index(name).ok_or_else(|| {
                PruningError::Shape(format!("observed tip '{name}' is not a tip of the tree"))
            })?;
            if aligned[tip].replace(state).is_some() {
                return Err(PruningError::Shape(format!("tip '{name}' is observed twice")));
            }
        }

        // Equal lengths and no duplicates imply every tip is covered
        Ok(aligned.into_iter().flatten().collect())
    }
}
