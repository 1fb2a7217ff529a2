use super::MultiPatch;
use crate::StrError;
use std::collections::HashSet;

/// Holds a bijective mapping between flow patches and ALE (mesh-motion) patches
#[derive(Clone, Debug, PartialEq)]
pub struct PatchCorrespondence {
    /// (flow patch, ALE patch) pairs
    pairs: Vec<(usize, usize)>,
}

impl PatchCorrespondence {
    /// Allocates a new instance
    ///
    /// Returns an error if a flow patch or an ALE patch appears more than once.
    pub fn new(pairs: &[(usize, usize)]) -> Result<Self, StrError> {
        if pairs.len() == 0 {
            return Err("the patch correspondence must not be empty");
        }
        let mut flow = HashSet::new();
        let mut ale = HashSet::new();
        for (f, a) in pairs {
            if !flow.insert(*f) {
                return Err("flow patch appears more than once in the correspondence");
            }
            if !ale.insert(*a) {
                return Err("ALE patch appears more than once in the correspondence");
            }
        }
        Ok(PatchCorrespondence { pairs: pairs.to_vec() })
    }

    /// Returns all (flow patch, ALE patch) pairs
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// Returns the ALE patch corresponding to a flow patch
    pub fn ale_patch(&self, flow_patch: usize) -> Option<usize> {
        self.pairs.iter().find(|(f, _)| *f == flow_patch).map(|(_, a)| *a)
    }

    /// Returns the flow patch corresponding to an ALE patch
    pub fn flow_patch(&self, ale_patch: usize) -> Option<usize> {
        self.pairs.iter().find(|(_, a)| *a == ale_patch).map(|(f, _)| *f)
    }

    /// Returns the (flow node, ALE node) pairs of all corresponding patches
    ///
    /// Nodes shared by adjacent patches appear more than once.
    pub fn node_pairs(&self, flow: &MultiPatch, ale: &MultiPatch) -> Result<Vec<(usize, usize)>, StrError> {
        let mut pairs = Vec::new();
        for (f, a) in &self.pairs {
            let (fp, ap) = match (flow.patches.get(*f), ale.patches.get(*a)) {
                (Some(fp), Some(ap)) => (fp, ap),
                _ => return Err("the patch correspondence refers to a non-existent patch"),
            };
            if fp.nu != ap.nu || fp.nv != ap.nv {
                return Err("corresponding patches must have the same number of cells");
            }
            for j in 0..=fp.nv {
                for i in 0..=fp.nu {
                    pairs.push((fp.node(i, j), ap.node(i, j)));
                }
            }
        }
        Ok(pairs)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
